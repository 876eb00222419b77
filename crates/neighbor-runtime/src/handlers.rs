//! Policy-driven reply handlers
//!
//! A [`PolicyReplyHandler`] answers one protocol method. On every inbound call
//! it consults its [`ReplyPolicy`] and either acknowledges with the canned
//! reply or withholds it. Count-limited policies additionally trigger the
//! process stop when their limit is reached.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use neighbor_core::{
    BoundedCounter, CounterDecision, EveryNth, Method, Policy, ReplyHandler, Request, Response,
    SequenceDecision, SequenceDedup,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::lifecycle::{StopReason, StopSignal};
use crate::profile::PeerProfile;

// ----------------------------------------------------------------------------
// Reply Policy
// ----------------------------------------------------------------------------

/// What to do with a call once the policy has decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyVariant {
    /// Send the canned reply
    Ack,
    /// Close the call without a reply
    Withhold,
}

/// Decision rule of one handler
#[derive(Debug)]
pub enum ReplyPolicy {
    /// Acknowledge every call
    Always,
    /// Acknowledge calls up to and including the limit-th, then stop the process
    CountThenStop(BoundedCounter),
    /// Pick a variant by whether the call's sequence number was seen before
    SequenceConditioned {
        dedup: SequenceDedup,
        first: ReplyVariant,
        duplicate: ReplyVariant,
    },
}

impl ReplyPolicy {
    pub fn count_then_stop(limit: u32) -> Self {
        ReplyPolicy::CountThenStop(BoundedCounter::new(limit))
    }

    pub fn sequence_conditioned(first: ReplyVariant, duplicate: ReplyVariant) -> Self {
        ReplyPolicy::SequenceConditioned {
            dedup: SequenceDedup::new(),
            first,
            duplicate,
        }
    }
}

/// Fires a trigger on every n-th received call
#[derive(Debug)]
pub struct ReceiveHook {
    every: EveryNth,
    trigger: mpsc::UnboundedSender<()>,
}

impl ReceiveHook {
    pub fn new(every: u32, trigger: mpsc::UnboundedSender<()>) -> Self {
        Self {
            every: EveryNth::new(every),
            trigger,
        }
    }

    fn observe(&self) {
        if self.every.decide() && self.trigger.send(()).is_err() {
            debug!("Receive hook fired but nobody is listening");
        }
    }
}

// ----------------------------------------------------------------------------
// Policy Reply Handler
// ----------------------------------------------------------------------------

/// Answers one method according to a [`ReplyPolicy`]
pub struct PolicyReplyHandler {
    method: Method,
    policy: ReplyPolicy,
    profile: Arc<PeerProfile>,
    stop: StopSignal,
    hook: Option<ReceiveHook>,
    invocations: AtomicU64,
}

impl PolicyReplyHandler {
    pub fn new(
        method: Method,
        policy: ReplyPolicy,
        profile: Arc<PeerProfile>,
        stop: StopSignal,
    ) -> Self {
        Self {
            method,
            policy,
            profile,
            stop,
            hook: None,
            invocations: AtomicU64::new(0),
        }
    }

    /// Attach a hook observing every received call
    pub fn with_receive_hook(mut self, hook: ReceiveHook) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Calls handled so far
    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::Acquire)
    }

    fn decide(&self, request: &Request) -> ReplyVariant {
        match &self.policy {
            ReplyPolicy::Always => ReplyVariant::Ack,

            ReplyPolicy::CountThenStop(counter) => match counter.check() {
                CounterDecision::Act => ReplyVariant::Ack,
                CounterDecision::LimitReached => {
                    info!(
                        "{} reply limit of {} reached, stopping",
                        self.method,
                        counter.limit()
                    );
                    self.stop
                        .trigger(StopReason::ReplyLimitReached(self.method));
                    ReplyVariant::Ack
                }
                CounterDecision::Exhausted => {
                    debug!("{} call after reply limit, withholding", self.method);
                    ReplyVariant::Withhold
                }
            },

            ReplyPolicy::SequenceConditioned {
                dedup,
                first,
                duplicate,
            } => match request.sequence() {
                Some(sequence) => match dedup.observe(sequence) {
                    SequenceDecision::FirstSeen => {
                        debug!("{} {} seen first time", self.method, sequence);
                        *first
                    }
                    SequenceDecision::Duplicate => {
                        debug!("{} {} is a repeat", self.method, sequence);
                        *duplicate
                    }
                },
                None => ReplyVariant::Ack,
            },
        }
    }
}

impl ReplyHandler for PolicyReplyHandler {
    fn method(&self) -> Method {
        self.method
    }

    fn handle(&self, request: &Request) -> Response {
        if request.method() != self.method {
            warn!(
                "{} handler received a {} call",
                self.method,
                request.method()
            );
            return Response::Unimplemented(request.method());
        }

        let invocation = self.invocations.fetch_add(1, Ordering::AcqRel) + 1;
        if let Some(hook) = &self.hook {
            hook.observe();
        }

        match self.decide(request) {
            ReplyVariant::Ack => {
                debug!("Acknowledging {} call #{}", self.method, invocation);
                Response::Reply(self.profile.reply_for(self.method))
            }
            ReplyVariant::Withhold => {
                debug!("Withholding reply to {} call #{}", self.method, invocation);
                Response::Withhold
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neighbor_core::{
        Endpoint, HeartbeatRequest, NarrateRequest, NeighborConfig, SequenceNumber, TellRequest,
        Timestamp,
    };

    fn profile() -> Arc<PeerProfile> {
        Arc::new(PeerProfile::from_config(
            &NeighborConfig::default(),
            Endpoint::new("127.0.0.1", 7001),
        ))
    }

    fn heartbeat() -> Request {
        Request::Heartbeat(HeartbeatRequest {
            identity: "engine".to_string(),
        })
    }

    fn tell(sequence: u64) -> Request {
        Request::Tell(TellRequest {
            identity: "engine".to_string(),
            message: "hi".to_string(),
            sequence: SequenceNumber::new(sequence),
            timestamp: Timestamp::new(0),
        })
    }

    #[test]
    fn test_always_acknowledges() {
        let handler = PolicyReplyHandler::new(
            Method::Heartbeat,
            ReplyPolicy::Always,
            profile(),
            StopSignal::new(),
        );
        for _ in 0..5 {
            assert!(matches!(handler.handle(&heartbeat()), Response::Reply(_)));
        }
        assert_eq!(handler.invocations(), 5);
    }

    #[test]
    fn test_count_then_stop_triggers_on_limit() {
        let stop = StopSignal::new();
        let handler = PolicyReplyHandler::new(
            Method::Heartbeat,
            ReplyPolicy::count_then_stop(10),
            profile(),
            stop.clone(),
        );

        for _ in 0..9 {
            assert!(matches!(handler.handle(&heartbeat()), Response::Reply(_)));
            assert!(!stop.is_triggered());
        }

        // The 10th call is still answered and stops the process
        assert!(matches!(handler.handle(&heartbeat()), Response::Reply(_)));
        assert_eq!(
            stop.reason(),
            Some(StopReason::ReplyLimitReached(Method::Heartbeat))
        );

        assert_eq!(handler.handle(&heartbeat()), Response::Withhold);
    }

    #[test]
    fn test_sequence_conditioned_tell() {
        let handler = PolicyReplyHandler::new(
            Method::Tell,
            ReplyPolicy::sequence_conditioned(ReplyVariant::Withhold, ReplyVariant::Ack),
            profile(),
            StopSignal::new(),
        );

        let responses: Vec<bool> = [1u64, 2, 1, 3, 2]
            .into_iter()
            .map(|s| matches!(handler.handle(&tell(s)), Response::Reply(_)))
            .collect();
        assert_eq!(responses, vec![false, false, true, false, true]);
    }

    #[test]
    fn test_sequence_conditioned_narrate_keys_on_first_item() {
        let handler = PolicyReplyHandler::new(
            Method::Narrate,
            ReplyPolicy::sequence_conditioned(ReplyVariant::Withhold, ReplyVariant::Ack),
            profile(),
            StopSignal::new(),
        );
        let item = |sequence| NarrateRequest {
            identity: "engine".to_string(),
            message: "line".to_string(),
            sequence: SequenceNumber::new(sequence),
            timestamp: Timestamp::new(0),
        };

        let first = Request::Narrate(vec![item(7), item(8)]);
        let retry = Request::Narrate(vec![item(7), item(9)]);
        assert_eq!(handler.handle(&first), Response::Withhold);
        assert!(matches!(handler.handle(&retry), Response::Reply(_)));

        // An empty stream has no key and is acknowledged
        assert!(matches!(
            handler.handle(&Request::Narrate(Vec::new())),
            Response::Reply(_)
        ));
    }

    #[test]
    fn test_receive_hook_fires_every_nth() {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let handler =
            PolicyReplyHandler::new(Method::Tell, ReplyPolicy::Always, profile(), StopSignal::new())
                .with_receive_hook(ReceiveHook::new(3, sender));

        for sequence in 1..=7 {
            handler.handle(&tell(sequence));
        }

        let mut fired = 0;
        while receiver.try_recv().is_ok() {
            fired += 1;
        }
        assert_eq!(fired, 2);
    }

    #[test]
    fn test_mismatched_method_is_unimplemented() {
        let handler = PolicyReplyHandler::new(
            Method::Tell,
            ReplyPolicy::Always,
            profile(),
            StopSignal::new(),
        );
        assert_eq!(
            handler.handle(&heartbeat()),
            Response::Unimplemented(Method::Heartbeat)
        );
        assert_eq!(handler.invocations(), 0);
    }
}
