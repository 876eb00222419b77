//! Scenario Registry
//!
//! The fixed catalog of behaviors the dummy neighbor can be dialed into.
//! Each scenario is data: which methods it answers and with what policy,
//! and which methods it calls and on what cadence. [`ScenarioPlan::wire`]
//! turns that data into fresh handlers and loops for one run.

use core::fmt;
use core::str::FromStr;
use std::sync::Arc;

use neighbor_core::{
    ConfigError, Method, NeighborConfig, NeighborError, NeighborResult, NeighborsClient,
};
use tokio::sync::mpsc;
use tracing::debug;

use crate::handlers::{PolicyReplyHandler, ReceiveHook, ReplyPolicy, ReplyVariant};
use crate::lifecycle::StopSignal;
use crate::loops::{OnExhausted, RequestCadence, RequestLoop};
use crate::profile::PeerProfile;
use crate::service::ServiceTable;

// ----------------------------------------------------------------------------
// Scenario Identifier
// ----------------------------------------------------------------------------

/// A "major.minor" catalog key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScenarioId {
    major: u8,
    minor: u8,
}

impl ScenarioId {
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    pub fn parse(id: &str) -> Result<Self, ConfigError> {
        let malformed = || ConfigError::MalformedScenario { id: id.to_string() };

        let (major, minor) = id.trim().split_once('.').ok_or_else(malformed)?;
        let major = major.parse::<u8>().map_err(|_| malformed())?;
        let minor = minor.parse::<u8>().map_err(|_| malformed())?;
        Ok(Self::new(major, minor))
    }

    pub fn major(&self) -> u8 {
        self.major
    }

    pub fn minor(&self) -> u8 {
        self.minor
    }
}

impl fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for ScenarioId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ----------------------------------------------------------------------------
// Scenario Data
// ----------------------------------------------------------------------------

/// Process role implied by a scenario's wiring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Server,
    Client,
    ServerAndClient,
    /// Neither serves nor calls; waits for the stop signal
    Idle,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Server => "server",
            Role::Client => "client",
            Role::ServerAndClient => "server+client",
            Role::Idle => "idle",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    Always,
    /// Limit taken from `reply_limit`
    CountThenStop,
    SequenceConditioned {
        first: ReplyVariant,
        duplicate: ReplyVariant,
    },
}

/// One answered method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplySpec {
    pub method: Method,
    pub kind: ReplyKind,
    /// Raise a trigger every `tell_every_nth_received` calls for an echo loop
    pub echo: bool,
}

/// Which configuration field bounds a bounded loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundSource {
    RequestBound,
    GreetAttempts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Periodic,
    Bounded {
        bound: BoundSource,
        until_first_reply: bool,
        on_exhausted: OnExhausted,
    },
    SingleShot,
    /// One call per trigger raised by an echoing reply handler
    Echo,
}

/// One called method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestSpec {
    pub method: Method,
    pub kind: RequestKind,
}

/// A catalog entry
#[derive(Debug)]
pub struct ScenarioPlan {
    pub id: ScenarioId,
    pub description: &'static str,
    pub replies: &'static [ReplySpec],
    pub requests: &'static [RequestSpec],
}

/// Handlers and loops built for one run
pub struct Wiring {
    /// `None` when the scenario answers nothing
    pub table: Option<ServiceTable>,
    pub loops: Vec<RequestLoop>,
}

impl ScenarioPlan {
    pub fn role(&self) -> Role {
        match (self.replies.is_empty(), self.requests.is_empty()) {
            (false, true) => Role::Server,
            (true, false) => Role::Client,
            (false, false) => Role::ServerAndClient,
            (true, true) => Role::Idle,
        }
    }

    pub fn serves(&self) -> bool {
        !self.replies.is_empty()
    }

    pub fn calls(&self) -> bool {
        !self.requests.is_empty()
    }

    /// Build fresh handlers and loops with their own policy state
    pub fn wire(
        &self,
        config: &NeighborConfig,
        profile: Arc<PeerProfile>,
        stop: &StopSignal,
        client: Option<Arc<dyn NeighborsClient>>,
    ) -> NeighborResult<Wiring> {
        let (echo_sender, mut echo_receiver) = mpsc::unbounded_channel();

        let table = if self.serves() {
            let mut table = ServiceTable::new();
            for spec in self.replies {
                let policy = match spec.kind {
                    ReplyKind::Always => ReplyPolicy::Always,
                    ReplyKind::CountThenStop => ReplyPolicy::count_then_stop(config.reply_limit),
                    ReplyKind::SequenceConditioned { first, duplicate } => {
                        ReplyPolicy::sequence_conditioned(first, duplicate)
                    }
                };
                let mut handler =
                    PolicyReplyHandler::new(spec.method, policy, profile.clone(), stop.clone());
                if spec.echo {
                    handler = handler.with_receive_hook(ReceiveHook::new(
                        config.tell_every_nth_received,
                        echo_sender.clone(),
                    ));
                }
                table.register(Arc::new(handler));
            }
            Some(table)
        } else {
            None
        };
        drop(echo_sender);

        let mut loops = Vec::with_capacity(self.requests.len());
        if self.calls() {
            let client = client.ok_or_else(|| {
                NeighborError::validation(format!(
                    "Scenario {} sends requests but no peer is configured",
                    self.id
                ))
            })?;

            for spec in self.requests {
                let interval = config.request_interval();
                let cadence = match spec.kind {
                    RequestKind::Periodic => RequestCadence::Periodic { interval },
                    RequestKind::Bounded {
                        bound,
                        until_first_reply,
                        on_exhausted,
                    } => {
                        let bound = match bound {
                            BoundSource::RequestBound => config.request_bound,
                            BoundSource::GreetAttempts => config.greet_attempts,
                        };
                        RequestCadence::bounded(interval, bound, until_first_reply, on_exhausted)
                    }
                    RequestKind::SingleShot => RequestCadence::SingleShot,
                    RequestKind::Echo => {
                        // Only one echo loop can own the receiver
                        let (_, spare) = mpsc::unbounded_channel();
                        RequestCadence::OnTrigger(std::mem::replace(&mut echo_receiver, spare))
                    }
                };
                loops.push(RequestLoop::new(
                    spec.method,
                    cadence,
                    client.clone(),
                    profile.clone(),
                    stop.clone(),
                ));
            }
        }

        debug!(
            "Scenario {} wired: {} handler(s), {} loop(s)",
            self.id,
            self.replies.len(),
            loops.len()
        );
        Ok(Wiring { table, loops })
    }
}

// ----------------------------------------------------------------------------
// Catalog
// ----------------------------------------------------------------------------

const fn reply(method: Method, kind: ReplyKind) -> ReplySpec {
    ReplySpec {
        method,
        kind,
        echo: false,
    }
}

const fn request(method: Method, kind: RequestKind) -> RequestSpec {
    RequestSpec { method, kind }
}

const WITHHOLD_FIRST: ReplyKind = ReplyKind::SequenceConditioned {
    first: ReplyVariant::Withhold,
    duplicate: ReplyVariant::Ack,
};

const fn idle(major: u8, minor: u8, description: &'static str) -> ScenarioPlan {
    ScenarioPlan {
        id: ScenarioId::new(major, minor),
        description,
        replies: &[],
        requests: &[],
    }
}

static CATALOG: [ScenarioPlan; 20] = [
    ScenarioPlan {
        id: ScenarioId::new(1, 1),
        description: "Always reply to Heartbeat",
        replies: &[reply(Method::Heartbeat, ReplyKind::Always)],
        requests: &[],
    },
    ScenarioPlan {
        id: ScenarioId::new(1, 2),
        description: "Reply to Heartbeat until the reply limit, then stop",
        replies: &[reply(Method::Heartbeat, ReplyKind::CountThenStop)],
        requests: &[],
    },
    idle(1, 3, "Never reply to Heartbeat"),
    ScenarioPlan {
        id: ScenarioId::new(2, 1),
        description: "Send Heartbeat every interval",
        replies: &[],
        requests: &[request(Method::Heartbeat, RequestKind::Periodic)],
    },
    idle(2, 2, "Never send Heartbeat"),
    ScenarioPlan {
        id: ScenarioId::new(3, 1),
        description: "Always reply to Greet",
        replies: &[reply(Method::Greet, ReplyKind::Always)],
        requests: &[],
    },
    idle(3, 2, "Never reply to Greet"),
    ScenarioPlan {
        id: ScenarioId::new(4, 1),
        description: "Send Greet every interval until the first reply or the attempt limit",
        replies: &[],
        requests: &[request(
            Method::Greet,
            RequestKind::Bounded {
                bound: BoundSource::GreetAttempts,
                until_first_reply: true,
                on_exhausted: OnExhausted::EndLoop,
            },
        )],
    },
    idle(4, 2, "Never send Greet"),
    ScenarioPlan {
        id: ScenarioId::new(5, 1),
        description: "Always reply to Tell",
        replies: &[reply(Method::Tell, ReplyKind::Always)],
        requests: &[],
    },
    ScenarioPlan {
        id: ScenarioId::new(5, 2),
        description: "Reply to a Tell only when its sequence number is repeated",
        replies: &[reply(Method::Tell, WITHHOLD_FIRST)],
        requests: &[],
    },
    idle(5, 3, "Never reply to Tell"),
    ScenarioPlan {
        id: ScenarioId::new(6, 1),
        description: "Always reply to Tell and send a Tell back every n-th received",
        replies: &[ReplySpec {
            method: Method::Tell,
            kind: ReplyKind::Always,
            echo: true,
        }],
        requests: &[request(Method::Tell, RequestKind::Echo)],
    },
    ScenarioPlan {
        id: ScenarioId::new(6, 2),
        description: "Send a bounded burst of Tells, then stop",
        replies: &[],
        requests: &[request(
            Method::Tell,
            RequestKind::Bounded {
                bound: BoundSource::RequestBound,
                until_first_reply: false,
                on_exhausted: OnExhausted::StopProcess,
            },
        )],
    },
    idle(6, 3, "Never send Tell"),
    ScenarioPlan {
        id: ScenarioId::new(7, 1),
        description: "Always reply to Narrate",
        replies: &[reply(Method::Narrate, ReplyKind::Always)],
        requests: &[],
    },
    ScenarioPlan {
        id: ScenarioId::new(7, 2),
        description: "Reply to a Narrate only when its first sequence number is repeated",
        replies: &[reply(Method::Narrate, WITHHOLD_FIRST)],
        requests: &[],
    },
    idle(7, 3, "Never reply to Narrate"),
    ScenarioPlan {
        id: ScenarioId::new(8, 1),
        description: "Send a single Narrate stream",
        replies: &[],
        requests: &[request(Method::Narrate, RequestKind::SingleShot)],
    },
    idle(8, 2, "Never send Narrate"),
];

/// Every scenario, in identifier order
pub fn catalog() -> &'static [ScenarioPlan] {
    &CATALOG
}

/// Find a scenario by its textual identifier
pub fn lookup(id: &str) -> Result<&'static ScenarioPlan, ConfigError> {
    let parsed = ScenarioId::parse(id)?;
    CATALOG
        .iter()
        .find(|plan| plan.id == parsed)
        .ok_or_else(|| ConfigError::UnknownScenario { id: id.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_identifiers() {
        assert_eq!(ScenarioId::parse("1.2").unwrap(), ScenarioId::new(1, 2));
        assert_eq!(ScenarioId::parse(" 8.1 ").unwrap().to_string(), "8.1");
        assert!(matches!(
            ScenarioId::parse("12"),
            Err(ConfigError::MalformedScenario { .. })
        ));
        assert!(matches!(
            "a.b".parse::<ScenarioId>(),
            Err(ConfigError::MalformedScenario { .. })
        ));
    }

    #[test]
    fn test_lookup_unknown() {
        assert!(matches!(
            lookup("9.9"),
            Err(ConfigError::UnknownScenario { .. })
        ));
        assert_eq!(lookup("6.2").unwrap().id, ScenarioId::new(6, 2));
    }

    #[test]
    fn test_catalog_is_sorted_and_unique() {
        let ids: Vec<ScenarioId> = catalog().iter().map(|plan| plan.id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(ids, sorted);
        assert_eq!(ids.len(), 20);
    }

    #[test]
    fn test_roles() {
        let role = |id| lookup(id).unwrap().role();
        assert_eq!(role("1.1"), Role::Server);
        assert_eq!(role("1.3"), Role::Idle);
        assert_eq!(role("2.1"), Role::Client);
        assert_eq!(role("6.1"), Role::ServerAndClient);
        assert_eq!(role("8.2"), Role::Idle);
    }

    #[test]
    fn test_at_most_one_loop_per_method() {
        for plan in catalog() {
            let mut methods: Vec<Method> = plan.requests.iter().map(|r| r.method).collect();
            let total = methods.len();
            methods.sort();
            methods.dedup();
            assert_eq!(methods.len(), total, "scenario {}", plan.id);
        }
    }
}
