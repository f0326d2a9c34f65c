use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
use commands::{execute_probe_command, execute_serve_command, ProbeArgs, ServeArgs};

// Use mimalloc for better performance
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "lbcheck")]
#[command(about = "Static HTTPS file server and load balancer distribution probe")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve a directory over HTTPS
    Serve(ServeArgs),
    /// Probe a load balancer and tally which backends answer
    Probe(ProbeArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so `probe` can keep stdout for its JSON report
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    // Both the server and reqwest use ring
    let _ = rustls::crypto::ring::default_provider().install_default();

    match cli.command {
        Commands::Serve(args) => execute_serve_command(args),
        Commands::Probe(args) => execute_probe_command(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_serve_defaults() {
        let cli = Cli::try_parse_from(["lbcheck", "serve"]).unwrap();
        match cli.command {
            Commands::Serve(args) => {
                assert_eq!(args.port, 443);
                assert_eq!(args.host, "0.0.0.0");
                assert_eq!(args.root.to_str(), Some("."));
                assert_eq!(args.cert.to_str(), Some("temporary.crt"));
                assert_eq!(args.key.to_str(), Some("temporary.key"));
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_probe_flags() {
        let cli = Cli::try_parse_from([
            "lbcheck",
            "probe",
            "--host-list",
            "web1",
            "--host-list",
            "web2",
            "--url",
            "https://lb/",
            "--test-delay",
            "1",
            "--check",
        ])
        .unwrap();
        match cli.command {
            Commands::Probe(args) => {
                assert_eq!(args.host_list, vec!["web1", "web2"]);
                assert_eq!(args.url.as_deref(), Some("https://lb/"));
                assert_eq!(args.test_delay, Some(1));
                assert_eq!(args.test_timeout, None);
                assert!(args.check);
            }
            _ => panic!("expected probe"),
        }
    }
}
