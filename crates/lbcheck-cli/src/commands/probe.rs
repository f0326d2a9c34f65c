//! `lbcheck probe`: load balancer distribution test
//!
//! Prints the JSON report on stdout. Parameters come from an optional JSON
//! args file, with command-line flags taking precedence.

use anyhow::{Context, Result};
use clap::Args;
use lbcheck_core::{check_mode_report, execute, HttpEndpoint, ProbeConfig, ProbeReport};
use std::path::PathBuf;
use tracing::warn;

#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Host expected behind the load balancer (repeatable)
    #[arg(long = "host-list", value_name = "HOST")]
    pub host_list: Vec<String>,
    /// Complete URL of the load balancer
    #[arg(long, visible_alias = "load-balancer-url")]
    pub url: Option<String>,
    /// Total seconds to keep probing [default: 30]
    #[arg(long)]
    pub test_timeout: Option<u64>,
    /// Seconds between probes [default: 0]
    #[arg(long)]
    pub test_delay: Option<u64>,
    /// Verify the load balancer's TLS certificate
    #[arg(long)]
    pub validate_certs: bool,
    /// Per-request timeout in seconds [default: 10]
    #[arg(long)]
    pub request_timeout: Option<u64>,
    /// Abort on the first failed probe
    #[arg(long)]
    pub fail_fast: bool,
    /// Report without sending any request
    #[arg(long)]
    pub check: bool,
    /// JSON file with probe parameters
    #[arg(long)]
    pub args_file: Option<PathBuf>,
    /// Pretty-print the JSON report
    #[arg(long)]
    pub pretty: bool,
}

impl ProbeArgs {
    /// Merge the args file (if any) with command-line overrides
    pub fn probe_config(&self) -> Result<ProbeConfig> {
        let mut config = match &self.args_file {
            Some(path) => ProbeConfig::from_json_file(path)
                .with_context(|| format!("Failed to load args file {}", path.display()))?,
            None => ProbeConfig::default(),
        };

        if !self.host_list.is_empty() {
            config.host_list = self.host_list.clone();
        }
        if let Some(url) = &self.url {
            config.load_balancer_url = url.clone();
        }
        if let Some(timeout) = self.test_timeout {
            config.test_timeout = timeout;
        }
        if let Some(delay) = self.test_delay {
            config.test_delay = delay;
        }
        if let Some(timeout) = self.request_timeout {
            config.request_timeout = timeout;
        }
        if self.validate_certs {
            config.validate_certs = true;
        }
        if self.fail_fast {
            config.fail_fast = true;
        }

        config.validate().context("Invalid probe parameters")?;
        Ok(config)
    }
}

/// Run the probe and print its report
pub fn execute_probe_command(args: ProbeArgs) -> Result<()> {
    let config = args.probe_config()?;

    let report = if args.check {
        check_mode_report()
    } else {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to start tokio runtime")?;

        runtime.block_on(async {
            let mut endpoint =
                HttpEndpoint::new(&config).context("Failed to build probe client")?;
            execute(&config, &mut endpoint, false)
                .await
                .with_context(|| format!("Probe of {} failed", config.load_balancer_url))
        })?
    };

    print_report(&report, args.pretty)
}

fn print_report(report: &ProbeReport, pretty: bool) -> Result<()> {
    let missing = report.missing_hosts();
    if !missing.is_empty() {
        warn!(hosts = ?missing, "Some hosts never answered");
    }

    let json = if pretty {
        serde_json::to_string_pretty(report)?
    } else {
        serde_json::to_string(report)?
    };
    println!("{}", json);
    Ok(())
}
