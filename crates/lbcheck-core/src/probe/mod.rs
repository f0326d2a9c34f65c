//! Load balancer distribution probe
//!
//! Repeatedly GETs a load balancer URL. Each response body, with trailing
//! whitespace stripped, names the backend that answered. Probing stops once
//! every expected host has answered or the test timeout has elapsed.

mod client;
mod config;
mod tally;

pub use client::{Endpoint, HttpEndpoint};
pub use config::{ProbeConfig, DEFAULT_REQUEST_TIMEOUT, DEFAULT_TEST_DELAY, DEFAULT_TEST_TIMEOUT};
pub use tally::HostTally;

use crate::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Why the probe loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Every expected host answered
    Coverage,
    /// The test timeout elapsed first
    Timeout,
    /// Check mode, nothing was sent
    Skipped,
}

/// Result of one probe run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    /// Always false: probing never modifies the target
    pub changed: bool,
    /// Expected host -> times it answered (every expected host present)
    pub hosts_seen: BTreeMap<String, u64>,
    /// Unexpected body -> times it was returned
    pub junk_output: BTreeMap<String, u64>,
    pub probes: u64,
    pub failed_probes: u64,
    pub elapsed_ms: u64,
    pub outcome: Outcome,
}

impl ProbeReport {
    /// Hosts that never answered
    pub fn missing_hosts(&self) -> Vec<&str> {
        self.hosts_seen
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(host, _)| host.as_str())
            .collect()
    }
}

/// Empty report returned in check mode
pub fn check_mode_report() -> ProbeReport {
    ProbeReport {
        changed: false,
        hosts_seen: BTreeMap::new(),
        junk_output: BTreeMap::new(),
        probes: 0,
        failed_probes: 0,
        elapsed_ms: 0,
        outcome: Outcome::Skipped,
    }
}

/// Validate the config, then probe unless `check_mode` is set.
pub async fn execute<E: Endpoint>(
    config: &ProbeConfig,
    endpoint: &mut E,
    check_mode: bool,
) -> Result<ProbeReport> {
    if check_mode {
        config.validate()?;
        info!("Check mode: skipping probes");
        return Ok(check_mode_report());
    }

    run_probe(config, endpoint).await
}

/// Poll `endpoint` until every host in `config.host_list` has answered or
/// `config.test_timeout` seconds have elapsed. At least one probe is sent.
///
/// A failed probe is counted and skipped, unless `config.fail_fast` is set,
/// in which case the error is returned. An invalid config (for instance an
/// empty host list) fails with [`Error::Config`](crate::Error::Config)
/// before any request is sent.
pub async fn run_probe<E: Endpoint>(config: &ProbeConfig, endpoint: &mut E) -> Result<ProbeReport> {
    config.validate()?;

    let delay = Duration::from_secs(config.test_delay);
    let mut tally = HostTally::new(config.host_list.as_slice());
    let mut probes = 0u64;
    let mut failed_probes = 0u64;

    info!(
        url = %config.load_balancer_url,
        hosts = config.host_list.len(),
        timeout_secs = config.test_timeout,
        delay_secs = config.test_delay,
        "Starting load balancer probe"
    );

    let start = Instant::now();

    let outcome = loop {
        probes += 1;

        match endpoint.fetch().await {
            Ok(body) => {
                let token = body.trim_end();
                if tally.record(token) {
                    debug!(probe = probes, host = token, "Expected host answered");
                } else {
                    debug!(probe = probes, body = token, "Unexpected response body");
                }
            }
            Err(e) if config.fail_fast || !e.is_probe_failure() => return Err(e),
            Err(e) => {
                failed_probes += 1;
                warn!(probe = probes, error = %e, "Probe failed");
            }
        }

        if tally.all_seen() {
            break Outcome::Coverage;
        }
        if start.elapsed().as_secs() >= config.test_timeout {
            break Outcome::Timeout;
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    };

    let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    let (hosts_seen, junk_output) = tally.finish();

    let report = ProbeReport {
        changed: false,
        hosts_seen,
        junk_output,
        probes,
        failed_probes,
        elapsed_ms,
        outcome,
    };

    info!(
        outcome = ?report.outcome,
        probes,
        failed_probes,
        elapsed_ms,
        missing = report.missing_hosts().len(),
        "Load balancer probe finished"
    );

    Ok(report)
}
