//! Dummy Neighbor CLI library
//!
//! Argument parsing, configuration loading and signal wiring for the
//! `dummy-neighbor` binary.

pub mod app;
pub mod cli;
pub mod config;
pub mod error;

pub use app::NeighborApp;
pub use cli::Cli;
pub use config::AppConfig;
pub use error::{CliError, Result};
