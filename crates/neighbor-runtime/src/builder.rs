//! Runtime Builder API
//!
//! Builder-style entry point for the CLI and tests: pick a scenario, give it
//! endpoints and configuration, and get back a [`LifecycleController`] with
//! fresh policy state. Everything that can be rejected up front (unknown
//! scenario, invalid configuration, missing endpoint) is rejected here,
//! before anything is bound or spawned.

use std::sync::Arc;

use neighbor_core::{Endpoint, NeighborConfig, NeighborError, NeighborResult, NeighborsClient};
use tracing::info;

use crate::lifecycle::{LifecycleController, StopSignal};
use crate::profile::PeerProfile;
use crate::scenarios;
use crate::transport::TcpNeighborsClient;

// ----------------------------------------------------------------------------
// Runtime Builder
// ----------------------------------------------------------------------------

/// Builder for one scenario run
pub struct RuntimeBuilder {
    scenario: String,
    config: NeighborConfig,
    listen: Option<Endpoint>,
    peer: Option<Endpoint>,
    client: Option<Arc<dyn NeighborsClient>>,
    stop: StopSignal,
}

impl RuntimeBuilder {
    /// Create a builder for the scenario with identifier `scenario`
    pub fn new(scenario: impl Into<String>) -> Self {
        Self {
            scenario: scenario.into(),
            config: NeighborConfig::default(),
            listen: None,
            peer: None,
            client: None,
            stop: StopSignal::new(),
        }
    }

    /// Set the scenario parameters
    pub fn with_config(mut self, config: NeighborConfig) -> Self {
        self.config = config;
        self
    }

    /// Local address to serve on and to advertise in Greet messages
    pub fn listen_on(mut self, endpoint: Endpoint) -> Self {
        self.listen = Some(endpoint);
        self
    }

    /// Remote peer to call
    pub fn peer_at(mut self, endpoint: Endpoint) -> Self {
        self.peer = Some(endpoint);
        self
    }

    /// Call the peer through `client` instead of TCP
    pub fn with_client(mut self, client: Arc<dyn NeighborsClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Share an externally owned stop signal (e.g. one wired to OS signals)
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Validate everything and wire the scenario
    pub fn build(self) -> NeighborResult<LifecycleController> {
        self.config.validate()?;
        let plan = scenarios::lookup(&self.scenario)?;

        if plan.serves() && self.listen.is_none() {
            return Err(NeighborError::validation(format!(
                "Scenario {} serves calls and needs a listen address",
                plan.id
            )));
        }

        let client = match (self.client, &self.peer) {
            (Some(client), _) => Some(client),
            (None, Some(peer)) => Some(Arc::new(TcpNeighborsClient::new(
                peer.clone(),
                self.config.call_timeout(),
            )) as Arc<dyn NeighborsClient>),
            (None, None) => None,
        };

        let advertised = self
            .listen
            .clone()
            .unwrap_or_else(|| Endpoint::new("0.0.0.0", 0));
        let profile = Arc::new(PeerProfile::from_config(&self.config, advertised));

        let wiring = plan.wire(&self.config, profile, &self.stop, client)?;
        info!(
            "Scenario {} ({}): {}",
            plan.id,
            plan.role(),
            plan.description
        );

        let listen = match (self.listen, wiring.table) {
            (Some(endpoint), Some(table)) => Some((endpoint, table)),
            _ => None,
        };

        Ok(LifecycleController::new(
            plan.id.to_string(),
            self.stop,
            self.config.drain_timeout(),
            listen,
            wiring.loops,
        ))
    }

    /// Build and start in one step
    pub async fn build_and_start(self) -> NeighborResult<LifecycleController> {
        let mut controller = self.build()?;
        controller.start().await?;
        Ok(controller)
    }
}
