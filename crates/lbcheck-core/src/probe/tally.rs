//! Host and junk-output tallies

use std::collections::{BTreeMap, BTreeSet};

/// Per-host response counter for a single probe run.
///
/// Bodies that match an expected host are counted in `hosts_seen`; anything
/// else lands in `junk_output`. Duplicate host names collapse to one entry.
#[derive(Debug, Clone, Default)]
pub struct HostTally {
    expected: BTreeSet<String>,
    hosts_seen: BTreeMap<String, u64>,
    junk_output: BTreeMap<String, u64>,
}

impl HostTally {
    pub fn new<S: AsRef<str>>(hosts: &[S]) -> Self {
        Self {
            expected: hosts.iter().map(|h| h.as_ref().to_string()).collect(),
            hosts_seen: BTreeMap::new(),
            junk_output: BTreeMap::new(),
        }
    }

    /// Count one response token. Returns true if it named an expected host.
    pub fn record(&mut self, token: &str) -> bool {
        let matched = self.expected.contains(token);
        let map = if matched {
            &mut self.hosts_seen
        } else {
            &mut self.junk_output
        };
        *map.entry(token.to_string()).or_insert(0) += 1;
        matched
    }

    /// Every expected host has answered at least once
    pub fn all_seen(&self) -> bool {
        self.hosts_seen.len() >= self.expected.len()
    }

    /// Zero-fill unseen hosts and hand back `(hosts_seen, junk_output)`
    pub fn finish(mut self) -> (BTreeMap<String, u64>, BTreeMap<String, u64>) {
        for host in &self.expected {
            self.hosts_seen.entry(host.clone()).or_insert(0);
        }
        (self.hosts_seen, self.junk_output)
    }
}
