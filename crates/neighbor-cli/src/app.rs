//! Dummy neighbor application
//!
//! Turns parsed arguments into a running scenario: resolves configuration,
//! validates the scenario before anything is bound, wires OS signals to the
//! stop signal, and runs the lifecycle to completion.

use neighbor_runtime::{
    scenarios, LifecycleController, RunReport, RuntimeBuilder, StopReason, StopSignal,
};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::cli::Cli;
use crate::config::AppConfig;
use crate::error::{CliError, Result};

// ----------------------------------------------------------------------------
// Application
// ----------------------------------------------------------------------------

pub struct NeighborApp {
    cli: Cli,
    config: AppConfig,
    stop: StopSignal,
}

impl NeighborApp {
    pub fn new(cli: Cli, config: AppConfig) -> Self {
        Self {
            cli,
            config,
            stop: StopSignal::new(),
        }
    }

    /// Load configuration named on the command line, or defaults
    pub fn from_cli(cli: Cli) -> Result<Self> {
        let config = match &cli.config {
            Some(path) => {
                info!("Loading configuration from: {}", path);
                AppConfig::load_from_file(path)?
            }
            None => AppConfig::default(),
        };
        Ok(Self::new(cli, config))
    }

    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }

    /// Validate and wire the scenario without starting it
    pub fn build(&self) -> Result<LifecycleController> {
        let scenario = self
            .cli
            .scenario
            .as_deref()
            .ok_or_else(|| CliError::Config("No scenario given".to_string()))?;

        let mut builder = RuntimeBuilder::new(scenario)
            .with_config(self.config.neighbor.clone())
            .with_stop_signal(self.stop.clone());
        if let Some(src) = self.cli.src_endpoint() {
            builder = builder.listen_on(src);
        }
        if let Some(dst) = self.cli.dst_endpoint() {
            builder = builder.peer_at(dst);
        }
        Ok(builder.build()?)
    }

    /// Run the selected scenario until it stops
    pub async fn run(self) -> Result<RunReport> {
        let mut controller = self.build()?;
        let signals = spawn_signal_listener(self.stop.clone())?;

        let outcome = controller.run().await;
        signals.abort();

        let report = outcome?;
        log_report(&report);
        Ok(report)
    }
}

// ----------------------------------------------------------------------------
// Signals
// ----------------------------------------------------------------------------

/// Trigger `stop` on SIGTERM or SIGINT
#[cfg(unix)]
pub fn spawn_signal_listener(stop: StopSignal) -> Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| CliError::Signal(format!("Failed to register SIGTERM: {}", e)))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| CliError::Signal(format!("Failed to register SIGINT: {}", e)))?;

    Ok(tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigint.recv() => info!("Received SIGINT"),
        }
        stop.trigger(StopReason::External);
    }))
}

/// Trigger `stop` on Ctrl-C
#[cfg(not(unix))]
pub fn spawn_signal_listener(stop: StopSignal) -> Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl-C"),
            Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
        }
        stop.trigger(StopReason::External);
    }))
}

// ----------------------------------------------------------------------------
// Output
// ----------------------------------------------------------------------------

fn log_report(report: &RunReport) {
    info!(
        "Scenario {} {:?}: {}",
        report.scenario, report.final_state, report.stop_reason
    );
    if let Some(server) = &report.server {
        info!(
            "Served {} connection(s): {} replied, {} withheld, {} unimplemented, {} failed",
            server.connections, server.replied, server.withheld, server.unimplemented, server.failed
        );
    }
    for loop_report in &report.loops {
        info!(
            "{} requests: {} sent, {} acknowledged, {} failed",
            loop_report.method, loop_report.attempts, loop_report.successes, loop_report.failures
        );
    }
    if report.drain_timed_out {
        warn!("Drain timed out; remaining work was abandoned");
    }
}

/// Render the scenario catalog, one line per entry
pub fn render_catalog() -> String {
    let mut out = String::new();
    for plan in scenarios::catalog() {
        out.push_str(&format!(
            "{:<5} {:<14} {}\n",
            plan.id.to_string(),
            plan.role().to_string(),
            plan.description
        ));
    }
    out
}
