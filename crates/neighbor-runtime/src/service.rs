//! Method dispatch for the serving side
//!
//! Maps each protocol method to at most one [`ReplyHandler`]. Calls of
//! methods with no handler are answered with `Unimplemented`.

use std::collections::BTreeMap;
use std::sync::Arc;

use neighbor_core::{Method, ReplyHandler, Request, Response};
use tracing::{debug, warn};

#[derive(Default, Clone)]
pub struct ServiceTable {
    handlers: BTreeMap<Method, Arc<dyn ReplyHandler>>,
}

impl ServiceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for its method, replacing any previous one
    pub fn register(&mut self, handler: Arc<dyn ReplyHandler>) {
        let method = handler.method();
        if self.handlers.insert(method, handler).is_some() {
            warn!("Replaced existing {} handler", method);
        }
    }

    pub fn handles(&self, method: Method) -> bool {
        self.handlers.contains_key(&method)
    }

    /// Registered methods in protocol order
    pub fn methods(&self) -> Vec<Method> {
        self.handlers.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Route one inbound call
    pub fn dispatch(&self, request: &Request) -> Response {
        let method = request.method();
        match self.handlers.get(&method) {
            Some(handler) => handler.handle(request),
            None => {
                debug!("No handler for {}, answering unimplemented", method);
                Response::Unimplemented(method)
            }
        }
    }
}

impl std::fmt::Debug for ServiceTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceTable")
            .field("methods", &self.methods())
            .finish()
    }
}
