//! Command-line interface definitions and parsing

use clap::Parser;
use neighbor_core::Endpoint;

#[derive(Parser, Debug)]
#[command(
    name = "dummy-neighbor",
    author,
    version,
    about = "Scriptable neighbor peer for testing a chat engine",
    long_about = None
)]
pub struct Cli {
    /// Local address to listen on and advertise
    #[arg(long, required_unless_present_any = ["list_scenarios", "print_config"])]
    pub src_ip_address: Option<String>,

    /// Local port to listen on
    #[arg(long, required_unless_present_any = ["list_scenarios", "print_config"])]
    pub src_port: Option<u16>,

    /// Address of the engine under test
    #[arg(long, required_unless_present_any = ["list_scenarios", "print_config"])]
    pub dst_ip_address: Option<String>,

    /// Port of the engine under test
    #[arg(long, required_unless_present_any = ["list_scenarios", "print_config"])]
    pub dst_port: Option<u16>,

    /// Scenario identifier, e.g. 1.2
    #[arg(long, required_unless_present_any = ["list_scenarios", "print_config"])]
    pub scenario: Option<String>,

    /// Configuration file path (TOML)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Print the scenario catalog and exit
    #[arg(long)]
    pub list_scenarios: bool,

    /// Print an example configuration file and exit
    #[arg(long)]
    pub print_config: bool,
}

impl Cli {
    pub fn src_endpoint(&self) -> Option<Endpoint> {
        endpoint(&self.src_ip_address, self.src_port)
    }

    pub fn dst_endpoint(&self) -> Option<Endpoint> {
        endpoint(&self.dst_ip_address, self.dst_port)
    }
}

fn endpoint(host: &Option<String>, port: Option<u16>) -> Option<Endpoint> {
    match (host, port) {
        (Some(host), Some(port)) => Some(Endpoint::new(host.clone(), port)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_invocation() {
        let cli = Cli::try_parse_from([
            "dummy-neighbor",
            "--src-ip-address",
            "127.0.0.1",
            "--src-port",
            "50051",
            "--dst-ip-address",
            "127.0.0.2",
            "--dst-port",
            "50052",
            "--scenario",
            "1.2",
        ])
        .unwrap();

        assert_eq!(cli.scenario.as_deref(), Some("1.2"));
        assert_eq!(cli.src_endpoint(), Some(Endpoint::new("127.0.0.1", 50051)));
        assert_eq!(cli.dst_endpoint().unwrap().to_string(), "127.0.0.2:50052");
        assert!(!cli.verbose);
    }

    #[test]
    fn test_list_scenarios_needs_nothing_else() {
        let cli = Cli::try_parse_from(["dummy-neighbor", "--list-scenarios"]).unwrap();
        assert!(cli.list_scenarios);
        assert!(cli.src_endpoint().is_none());
    }

    #[test]
    fn test_print_config_needs_nothing_else() {
        let cli = Cli::try_parse_from(["dummy-neighbor", "--print-config"]).unwrap();
        assert!(cli.print_config);
        assert!(!cli.list_scenarios);
        assert!(cli.scenario.is_none());
    }

    #[test]
    fn test_missing_scenario_rejected() {
        let result = Cli::try_parse_from([
            "dummy-neighbor",
            "--src-ip-address",
            "127.0.0.1",
            "--src-port",
            "50051",
            "--dst-ip-address",
            "127.0.0.2",
            "--dst-port",
            "50052",
        ]);
        assert!(result.is_err());
    }
}
