//! Lifecycle Controller
//!
//! Owns the process-wide stop signal and drives one scenario run:
//! - Binding the listening endpoint and spawning the serve task
//! - Spawning the scenario's request loops
//! - Waiting for the first stop trigger (OS signal or policy exhaustion)
//! - Draining in-flight work up to a deadline, then aborting what is left

use std::sync::Arc;

use neighbor_core::{Endpoint, Method, NeighborResult};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{timeout_at, Duration, Instant},
};
use tracing::{debug, error, info, warn};

use crate::loops::{LoopReport, LoopStats, RequestLoop};
use crate::service::ServiceTable;
use crate::transport::server::{NeighborServer, ServerStats, ServerStatsSnapshot};

// ----------------------------------------------------------------------------
// Stop Signal
// ----------------------------------------------------------------------------

/// Why the process is stopping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// SIGTERM, SIGINT or an explicit request from the embedding code
    External,
    /// A count-limited reply handler answered its last call
    ReplyLimitReached(Method),
    /// A bounded request loop sent its last request
    RequestBoundReached(Method),
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::External => write!(f, "external stop request"),
            StopReason::ReplyLimitReached(method) => write!(f, "{} reply limit reached", method),
            StopReason::RequestBoundReached(method) => {
                write!(f, "{} request bound reached", method)
            }
        }
    }
}

/// One-way, idempotent stop trigger shared by every component of a run
///
/// The first trigger wins and its reason is kept; later triggers are no-ops.
#[derive(Debug, Clone)]
pub struct StopSignal {
    sender: Arc<watch::Sender<Option<StopReason>>>,
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl StopSignal {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Trigger the stop; returns true only for the trigger that took effect
    pub fn trigger(&self, reason: StopReason) -> bool {
        self.sender.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        })
    }

    pub fn is_triggered(&self) -> bool {
        self.sender.borrow().is_some()
    }

    pub fn reason(&self) -> Option<StopReason> {
        *self.sender.borrow()
    }

    /// Resolve once the stop has been triggered
    pub async fn wait(&self) -> StopReason {
        let mut receiver = self.sender.subscribe();
        let outcome = receiver.wait_for(|reason| reason.is_some()).await;
        match outcome {
            Ok(reason) => (*reason).unwrap_or(StopReason::External),
            // The sender lives in `self`, so the channel cannot close under us
            Err(_) => StopReason::External,
        }
    }
}

// ----------------------------------------------------------------------------
// Lifecycle State
// ----------------------------------------------------------------------------

/// Monotonic run state: Starting -> Running -> Stopping -> Stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LifecycleState {
    Starting,
    Running,
    Stopping,
    Stopped,
}

/// Summary of one finished run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub scenario: String,
    pub final_state: LifecycleState,
    pub stop_reason: StopReason,
    pub loops: Vec<LoopReport>,
    pub server: Option<ServerStatsSnapshot>,
    /// Some task was still running at the drain deadline and was aborted
    pub drain_timed_out: bool,
}

impl RunReport {
    /// Report of the loop issuing `method`, if the scenario had one
    pub fn loop_for(&self, method: Method) -> Option<&LoopReport> {
        self.loops.iter().find(|report| report.method == method)
    }
}

// ----------------------------------------------------------------------------
// Lifecycle Controller
// ----------------------------------------------------------------------------

/// Sequences startup, steady state and shutdown of one scenario
pub struct LifecycleController {
    scenario: String,
    state: LifecycleState,
    stop: StopSignal,
    drain_timeout: Duration,

    // Pending until start()
    listen: Option<(Endpoint, ServiceTable)>,
    pending_loops: Vec<RequestLoop>,

    // Running
    local_endpoint: Option<Endpoint>,
    server_handle: Option<JoinHandle<()>>,
    server_stats: Option<Arc<ServerStats>>,
    loop_handles: Vec<(Arc<LoopStats>, JoinHandle<LoopReport>)>,

    // Stopped
    report: Option<RunReport>,
}

impl LifecycleController {
    pub fn new(
        scenario: impl Into<String>,
        stop: StopSignal,
        drain_timeout: Duration,
        listen: Option<(Endpoint, ServiceTable)>,
        loops: Vec<RequestLoop>,
    ) -> Self {
        Self {
            scenario: scenario.into(),
            state: LifecycleState::Starting,
            stop,
            drain_timeout,
            listen,
            pending_loops: loops,
            local_endpoint: None,
            server_handle: None,
            server_stats: None,
            loop_handles: Vec::new(),
            report: None,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }

    /// Address actually bound, once started
    pub fn local_endpoint(&self) -> Option<&Endpoint> {
        self.local_endpoint.as_ref()
    }

    /// Bind the listener (if any) and spawn every task of the scenario
    ///
    /// A bind failure leaves nothing running and is returned to the caller.
    pub async fn start(&mut self) -> NeighborResult<()> {
        if self.state != LifecycleState::Starting {
            warn!("Scenario {} already started", self.scenario);
            return Ok(());
        }
        info!("Starting scenario {}", self.scenario);

        if let Some((endpoint, table)) = self.listen.take() {
            let server = NeighborServer::bind(&endpoint, table).await?;
            self.local_endpoint = Some(server.local_endpoint().clone());
            self.server_stats = Some(server.stats());

            let stop = self.stop.clone();
            self.server_handle = Some(tokio::spawn(async move { server.serve(stop).await }));
        }

        for request_loop in self.pending_loops.drain(..) {
            let stats = request_loop.stats();
            let handle = tokio::spawn(request_loop.run());
            self.loop_handles.push((stats, handle));
        }

        self.transition(LifecycleState::Running);
        Ok(())
    }

    /// Block until the stop signal fires, then shut everything down
    ///
    /// Once stopped, later calls return the same report.
    pub async fn wait_for_stop(&mut self) -> RunReport {
        if let Some(report) = &self.report {
            warn!("Scenario {} already stopped", self.scenario);
            return report.clone();
        }
        let stop_reason = self.stop.wait().await;
        info!("Stop requested: {}", stop_reason);
        self.shutdown(stop_reason).await
    }

    /// `start` followed by `wait_for_stop`
    pub async fn run(&mut self) -> NeighborResult<RunReport> {
        self.start().await?;
        Ok(self.wait_for_stop().await)
    }

    async fn shutdown(&mut self, stop_reason: StopReason) -> RunReport {
        self.transition(LifecycleState::Stopping);

        let deadline = Instant::now() + self.drain_timeout;
        let mut drain_timed_out = false;

        // The serve task releases its listener as soon as it sees the stop
        if let Some(mut handle) = self.server_handle.take() {
            match timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => debug!("Serve task drained"),
                Ok(Err(e)) => error!("Serve task ended abnormally: {}", e),
                Err(_) => {
                    warn!(
                        "Connections still open after {:?}, aborting",
                        self.drain_timeout
                    );
                    handle.abort();
                    drain_timed_out = true;
                }
            }
        }

        let mut loops = Vec::with_capacity(self.loop_handles.len());
        for (stats, mut handle) in self.loop_handles.drain(..) {
            match timeout_at(deadline, &mut handle).await {
                Ok(Ok(report)) => loops.push(report),
                Ok(Err(e)) => {
                    error!("{} request loop ended abnormally: {}", stats.method(), e);
                    loops.push(stats.report(None));
                }
                Err(_) => {
                    warn!("{} request loop still busy at deadline, aborting", stats.method());
                    handle.abort();
                    drain_timed_out = true;
                    loops.push(stats.report(None));
                }
            }
        }

        self.transition(LifecycleState::Stopped);

        let report = RunReport {
            scenario: self.scenario.clone(),
            final_state: self.state,
            stop_reason,
            loops,
            server: self.server_stats.as_ref().map(|stats| stats.snapshot()),
            drain_timed_out,
        };
        self.report = Some(report.clone());
        report
    }

    fn transition(&mut self, next: LifecycleState) {
        debug_assert!(next > self.state, "lifecycle must move forward");
        info!("Scenario {}: {:?} -> {:?}", self.scenario, self.state, next);
        self.state = next;
    }
}

impl Drop for LifecycleController {
    fn drop(&mut self) {
        if let Some(handle) = self.server_handle.take() {
            handle.abort();
        }
        for (_, handle) in self.loop_handles.drain(..) {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stop_signal_first_trigger_wins() {
        let stop = StopSignal::new();
        assert!(!stop.is_triggered());
        assert_eq!(stop.reason(), None);

        assert!(stop.trigger(StopReason::ReplyLimitReached(Method::Heartbeat)));
        assert!(!stop.trigger(StopReason::External));

        assert!(stop.is_triggered());
        assert_eq!(
            stop.wait().await,
            StopReason::ReplyLimitReached(Method::Heartbeat)
        );
    }

    #[test]
    fn test_stop_signal_wait_pending_until_triggered() {
        let stop = StopSignal::new();
        let mut wait = tokio_test::task::spawn(stop.wait());
        tokio_test::assert_pending!(wait.poll());

        stop.trigger(StopReason::RequestBoundReached(Method::Tell));
        assert!(wait.is_woken());
        assert_eq!(
            tokio_test::assert_ready!(wait.poll()),
            StopReason::RequestBoundReached(Method::Tell)
        );
    }

    #[tokio::test]
    async fn test_stop_signal_wakes_waiters() {
        let stop = StopSignal::new();
        let waiter = {
            let stop = stop.clone();
            tokio::spawn(async move { stop.wait().await })
        };
        tokio::task::yield_now().await;

        stop.trigger(StopReason::External);
        assert_eq!(waiter.await.unwrap(), StopReason::External);
    }

    #[tokio::test]
    async fn test_idle_run_stops_on_external_trigger() {
        let stop = StopSignal::new();
        let mut controller = LifecycleController::new(
            "1.3",
            stop.clone(),
            Duration::from_millis(100),
            None,
            Vec::new(),
        );
        assert_eq!(controller.state(), LifecycleState::Starting);

        controller.start().await.unwrap();
        assert_eq!(controller.state(), LifecycleState::Running);
        assert!(controller.local_endpoint().is_none());

        stop.trigger(StopReason::External);
        let report = controller.wait_for_stop().await;
        assert_eq!(report.final_state, LifecycleState::Stopped);
        assert_eq!(report.stop_reason, StopReason::External);
        assert!(report.loops.is_empty());
        assert!(report.server.is_none());
        assert!(!report.drain_timed_out);
        assert_eq!(controller.state(), LifecycleState::Stopped);
    }

    #[tokio::test]
    async fn test_repeated_wait_returns_first_report() {
        let stop = StopSignal::new();
        let mut controller = LifecycleController::new(
            "1.3",
            stop.clone(),
            Duration::from_millis(100),
            None,
            Vec::new(),
        );
        controller.start().await.unwrap();
        stop.trigger(StopReason::External);

        let first = controller.wait_for_stop().await;
        let second = controller.wait_for_stop().await;
        assert_eq!(second.final_state, LifecycleState::Stopped);
        assert_eq!(second.stop_reason, first.stop_reason);
        assert_eq!(controller.state(), LifecycleState::Stopped);

        // Restarting a stopped controller is a no-op as well
        let rerun = controller.run().await.unwrap();
        assert_eq!(rerun.stop_reason, StopReason::External);
        assert_eq!(controller.state(), LifecycleState::Stopped);
    }

    #[test]
    fn test_lifecycle_states_are_ordered() {
        assert!(LifecycleState::Starting < LifecycleState::Running);
        assert!(LifecycleState::Running < LifecycleState::Stopping);
        assert!(LifecycleState::Stopping < LifecycleState::Stopped);
    }
}
