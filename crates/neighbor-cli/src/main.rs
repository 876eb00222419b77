//! Dummy Neighbor - main entry point

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use neighbor_cli::{
    app::{render_catalog, NeighborApp},
    cli::Cli,
    config::AppConfig,
    error::{CliError, EXIT_OK, EXIT_RUNTIME},
};

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command line arguments
    let cli = Cli::parse();

    if cli.list_scenarios {
        print!("{}", render_catalog());
        return ExitCode::from(EXIT_OK);
    }

    if cli.print_config {
        print!("{}", AppConfig::example_config());
        return ExitCode::from(EXIT_OK);
    }

    setup_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::from(EXIT_OK),
        Err(e) => {
            error!("{:#}", e);
            let code = e
                .downcast_ref::<CliError>()
                .map(CliError::exit_code)
                .unwrap_or(EXIT_RUNTIME);
            ExitCode::from(code)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let app = NeighborApp::from_cli(cli)?;
    app.run().await?;
    info!("Dummy neighbor exited cleanly");
    Ok(())
}

/// Setup logging; `RUST_LOG` overrides the verbosity flag
fn setup_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
