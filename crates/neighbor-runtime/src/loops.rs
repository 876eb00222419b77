//! Request loops
//!
//! A [`RequestLoop`] issues calls of one method to the peer on a
//! [`RequestCadence`]. Failed calls are logged and counted; they never end a
//! loop. Every loop checks the stop signal before each send and while
//! waiting for its next tick.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use neighbor_core::{BoundedCounter, Method, NeighborsClient, SequenceNumber, TransportError};
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::lifecycle::{StopReason, StopSignal};
use crate::profile::PeerProfile;

// ----------------------------------------------------------------------------
// Cadence
// ----------------------------------------------------------------------------

/// What happens when a bounded loop runs out of attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnExhausted {
    /// Only this loop ends
    EndLoop,
    /// The whole process stops
    StopProcess,
}

/// When a loop sends
#[derive(Debug)]
pub enum RequestCadence {
    /// Forever, once per interval, starting immediately
    Periodic { interval: Duration },
    /// Once per interval until the counter is exhausted
    Bounded {
        interval: Duration,
        counter: BoundedCounter,
        /// End early on the first acknowledged call
        until_first_reply: bool,
        on_exhausted: OnExhausted,
    },
    /// Exactly one call
    SingleShot,
    /// One call per received trigger
    OnTrigger(mpsc::UnboundedReceiver<()>),
}

impl RequestCadence {
    /// Bounded cadence sending `bound` requests in total
    pub fn bounded(
        interval: Duration,
        bound: u32,
        until_first_reply: bool,
        on_exhausted: OnExhausted,
    ) -> Self {
        // Checked after each send, so exactly `bound` sends happen
        RequestCadence::Bounded {
            interval,
            counter: BoundedCounter::new(bound),
            until_first_reply,
            on_exhausted,
        }
    }
}

// ----------------------------------------------------------------------------
// Reporting
// ----------------------------------------------------------------------------

/// Why a loop finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopEnd {
    /// The stop signal was observed
    Stopped,
    /// A bounded loop used all its attempts
    BoundReached,
    /// A bounded loop received its first acknowledgement
    FirstReply,
    /// The single call of a single-shot loop was made
    SingleShotDone,
    /// The trigger source went away
    TriggerClosed,
}

/// Live counters of one loop, readable while it runs
#[derive(Debug)]
pub struct LoopStats {
    method: Method,
    attempts: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    last_sequence: AtomicU64,
}

impl LoopStats {
    fn new(method: Method) -> Self {
        Self {
            method,
            attempts: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            last_sequence: AtomicU64::new(0),
        }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Acquire)
    }

    /// Snapshot the counters; `ended_by` is `None` for loops that were aborted
    pub fn report(&self, ended_by: Option<LoopEnd>) -> LoopReport {
        let last = self.last_sequence.load(Ordering::Acquire);
        LoopReport {
            method: self.method,
            attempts: self.attempts(),
            successes: self.successes.load(Ordering::Acquire),
            failures: self.failures.load(Ordering::Acquire),
            last_sequence: (last > 0).then(|| SequenceNumber::new(last)),
            ended_by,
        }
    }
}

/// Final counters of one loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopReport {
    pub method: Method,
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    /// Highest sequence number sent, for sequenced methods
    pub last_sequence: Option<SequenceNumber>,
    pub ended_by: Option<LoopEnd>,
}

// ----------------------------------------------------------------------------
// Request Loop
// ----------------------------------------------------------------------------

/// Sends calls of one method on a cadence
pub struct RequestLoop {
    method: Method,
    cadence: RequestCadence,
    sender: RequestSender,
}

/// The sending half, separated so cadences can borrow it mutably
struct RequestSender {
    method: Method,
    client: Arc<dyn NeighborsClient>,
    profile: Arc<PeerProfile>,
    stop: StopSignal,
    next_sequence: SequenceNumber,
    stats: Arc<LoopStats>,
}

impl RequestLoop {
    pub fn new(
        method: Method,
        cadence: RequestCadence,
        client: Arc<dyn NeighborsClient>,
        profile: Arc<PeerProfile>,
        stop: StopSignal,
    ) -> Self {
        Self {
            method,
            cadence,
            sender: RequestSender {
                method,
                client,
                profile,
                stop,
                next_sequence: SequenceNumber::FIRST,
                stats: Arc::new(LoopStats::new(method)),
            },
        }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn stats(&self) -> Arc<LoopStats> {
        self.sender.stats.clone()
    }

    /// Run until the cadence ends or the stop signal fires
    pub async fn run(self) -> LoopReport {
        let RequestLoop {
            method,
            cadence,
            mut sender,
        } = self;
        info!("{} request loop started ({:?})", method, cadence);

        let ended_by = match cadence {
            RequestCadence::Periodic { interval } => sender.periodic(interval).await,
            RequestCadence::Bounded {
                interval,
                counter,
                until_first_reply,
                on_exhausted,
            } => {
                sender
                    .bounded(interval, counter, until_first_reply, on_exhausted)
                    .await
            }
            RequestCadence::SingleShot => sender.single_shot().await,
            RequestCadence::OnTrigger(trigger) => sender.on_trigger(trigger).await,
        };

        let report = sender.stats.report(Some(ended_by));
        info!(
            "{} request loop finished: {:?} after {} attempts ({} failed)",
            method, ended_by, report.attempts, report.failures
        );
        report
    }
}

impl RequestSender {
    async fn periodic(&mut self, period: Duration) -> LoopEnd {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.stop.wait() => return LoopEnd::Stopped,
                _ = ticker.tick() => {}
            }
            if self.stop.is_triggered() {
                return LoopEnd::Stopped;
            }
            self.send_once().await;
        }
    }

    async fn bounded(
        &mut self,
        period: Duration,
        counter: BoundedCounter,
        until_first_reply: bool,
        on_exhausted: OnExhausted,
    ) -> LoopEnd {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.stop.wait() => return LoopEnd::Stopped,
                _ = ticker.tick() => {}
            }
            if self.stop.is_triggered() {
                return LoopEnd::Stopped;
            }

            let acknowledged = self.send_once().await;
            if until_first_reply && acknowledged {
                return LoopEnd::FirstReply;
            }

            if counter.check().is_exhausted() {
                info!(
                    "{} request bound of {} reached",
                    self.method,
                    counter.limit()
                );
                if on_exhausted == OnExhausted::StopProcess {
                    self.stop
                        .trigger(StopReason::RequestBoundReached(self.method));
                }
                return LoopEnd::BoundReached;
            }
        }
    }

    async fn single_shot(&mut self) -> LoopEnd {
        if self.stop.is_triggered() {
            return LoopEnd::Stopped;
        }
        self.send_once().await;
        LoopEnd::SingleShotDone
    }

    async fn on_trigger(&mut self, mut trigger: mpsc::UnboundedReceiver<()>) -> LoopEnd {
        loop {
            tokio::select! {
                biased;
                _ = self.stop.wait() => return LoopEnd::Stopped,
                fired = trigger.recv() => {
                    if fired.is_none() {
                        return LoopEnd::TriggerClosed;
                    }
                }
            }
            if self.stop.is_triggered() {
                return LoopEnd::Stopped;
            }
            self.send_once().await;
        }
    }

    /// Issue one call; returns whether the peer acknowledged it
    async fn send_once(&mut self) -> bool {
        let attempt = self.stats.attempts.fetch_add(1, Ordering::AcqRel) + 1;

        match self.call().await {
            Ok(()) => {
                self.stats.successes.fetch_add(1, Ordering::AcqRel);
                debug!("{} request #{} acknowledged", self.method, attempt);
                true
            }
            Err(e) => {
                self.stats.failures.fetch_add(1, Ordering::AcqRel);
                warn!("{} request #{} failed: {}", self.method, attempt, e);
                false
            }
        }
    }

    async fn call(&mut self) -> Result<(), TransportError> {
        match self.method {
            Method::Heartbeat => {
                let reply = self
                    .client
                    .heartbeat(self.profile.heartbeat_request())
                    .await?;
                debug!("Heartbeat reply from {}", reply.identity);
            }
            Method::Greet => {
                let reply = self.client.greet(self.profile.greet_request()).await?;
                debug!(
                    "Greet reply from {} ({}) at {}",
                    reply.nickname, reply.identity, reply.ip_address_and_port
                );
            }
            Method::Tell => {
                let sequence = self.take_sequences(1);
                let reply = self.client.tell(self.profile.tell_request(sequence)).await?;
                debug!("Tell {} acknowledged by {}", sequence, reply.identity);
            }
            Method::Narrate => {
                let count = u64::from(self.profile.narrate_messages);
                let first = self.take_sequences(count);
                let stream = self.profile.narrate_stream(first);
                let reply = self.client.narrate(stream).await?;
                debug!(
                    "Narrate of {} items from {} acknowledged by {}",
                    count, first, reply.identity
                );
            }
        }
        Ok(())
    }

    /// Reserve `count` consecutive sequence numbers, returning the first
    fn take_sequences(&mut self, count: u64) -> SequenceNumber {
        let first = self.next_sequence;
        if count > 0 {
            let last = SequenceNumber::new(first.value().saturating_add(count - 1));
            self.stats
                .last_sequence
                .store(last.value(), Ordering::Release);
            self.next_sequence = last.next();
        }
        first
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_report_without_sends() {
        let stats = LoopStats::new(Method::Tell);
        let report = stats.report(None);
        assert_eq!(report.attempts, 0);
        assert_eq!(report.last_sequence, None);
        assert_eq!(report.ended_by, None);
    }

    #[test]
    fn test_bounded_constructor() {
        match RequestCadence::bounded(Duration::from_secs(2), 5, false, OnExhausted::StopProcess) {
            RequestCadence::Bounded {
                counter,
                on_exhausted,
                ..
            } => {
                assert_eq!(counter.limit(), 5);
                assert_eq!(on_exhausted, OnExhausted::StopProcess);
            }
            other => panic!("unexpected cadence {:?}", other),
        }
    }
}
