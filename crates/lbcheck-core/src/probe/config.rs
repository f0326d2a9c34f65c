//! Probe configuration

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_TEST_TIMEOUT: u64 = 30;
pub const DEFAULT_TEST_DELAY: u64 = 0;
pub const DEFAULT_REQUEST_TIMEOUT: u64 = 10;

fn default_test_timeout() -> u64 {
    DEFAULT_TEST_TIMEOUT
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT
}

/// Load balancer probe configuration
///
/// Field names match the keys accepted in a JSON args file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProbeConfig {
    /// Hosts expected to answer behind the load balancer
    pub host_list: Vec<String>,
    /// Complete URL of the load balancer
    pub load_balancer_url: String,
    /// Total seconds to keep probing
    #[serde(default = "default_test_timeout")]
    pub test_timeout: u64,
    /// Seconds to sleep between probes
    #[serde(default)]
    pub test_delay: u64,
    /// Verify the load balancer's certificate
    #[serde(default)]
    pub validate_certs: bool,
    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    /// Abort on the first failed probe instead of counting it
    #[serde(default)]
    pub fail_fast: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            host_list: Vec::new(),
            load_balancer_url: String::new(),
            test_timeout: DEFAULT_TEST_TIMEOUT,
            test_delay: DEFAULT_TEST_DELAY,
            validate_certs: false,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            fail_fast: false,
        }
    }
}

impl ProbeConfig {
    pub fn new<I, S>(host_list: I, load_balancer_url: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            host_list: host_list.into_iter().map(Into::into).collect(),
            load_balancer_url: load_balancer_url.into(),
            ..Default::default()
        }
    }

    /// Read a JSON args file; missing optional keys take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read args file {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn test_timeout(mut self, seconds: u64) -> Self {
        self.test_timeout = seconds;
        self
    }

    pub fn test_delay(mut self, seconds: u64) -> Self {
        self.test_delay = seconds;
        self
    }

    pub fn validate_certs(mut self, enabled: bool) -> Self {
        self.validate_certs = enabled;
        self
    }

    pub fn request_timeout(mut self, seconds: u64) -> Self {
        self.request_timeout = seconds;
        self
    }

    pub fn fail_fast(mut self, enabled: bool) -> Self {
        self.fail_fast = enabled;
        self
    }

    /// Parse the load balancer URL, accepting only http and https
    pub fn url(&self) -> Result<reqwest::Url> {
        if self.load_balancer_url.trim().is_empty() {
            return Err(Error::Config("load_balancer_url is required".to_string()));
        }

        let url = reqwest::Url::parse(&self.load_balancer_url).map_err(|e| {
            Error::Config(format!("Invalid load_balancer_url {}: {}", self.load_balancer_url, e))
        })?;

        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(Error::Config(format!(
                "Unsupported scheme {} in load_balancer_url",
                other
            ))),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.host_list.is_empty() {
            return Err(Error::Config("host_list must not be empty".to_string()));
        }
        if self.host_list.iter().any(|h| h.trim().is_empty()) {
            return Err(Error::Config("host_list entries must not be blank".to_string()));
        }
        if self.request_timeout == 0 {
            return Err(Error::Config("request_timeout must be at least 1 second".to_string()));
        }
        self.url()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProbeConfig::new(["a", "b"], "https://lb.example/");
        assert_eq!(config.host_list, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(config.test_timeout, 30);
        assert_eq!(config.test_delay, 0);
        assert!(!config.validate_certs);
        assert!(!config.fail_fast);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_applies_defaults() {
        let config = ProbeConfig::from_json(
            r#"{"host_list": ["one.domain.tld", "two.domain.tld"], "load_balancer_url": "https://lb/"}"#,
        )
        .unwrap();
        assert_eq!(config, ProbeConfig::new(["one.domain.tld", "two.domain.tld"], "https://lb/"));
    }

    #[test]
    fn test_from_json_overrides() {
        let config = ProbeConfig::from_json(
            r#"{"host_list": ["a"], "load_balancer_url": "http://lb/", "test_timeout": 5, "test_delay": 1, "fail_fast": true}"#,
        )
        .unwrap();
        assert_eq!(config.test_timeout, 5);
        assert_eq!(config.test_delay, 1);
        assert!(config.fail_fast);
    }

    #[test]
    fn test_from_json_rejects_missing_and_unknown() {
        assert!(matches!(
            ProbeConfig::from_json(r#"{"load_balancer_url": "https://lb/"}"#),
            Err(Error::Json(_))
        ));
        assert!(ProbeConfig::from_json(
            r#"{"host_list": ["a"], "load_balancer_url": "https://lb/", "bogus": 1}"#
        )
        .is_err());
    }

    #[test]
    fn test_from_missing_file() {
        assert!(matches!(
            ProbeConfig::from_json_file("/nonexistent/args.json"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_validate() {
        let empty_hosts = ProbeConfig::new(Vec::<String>::new(), "https://lb/");
        assert!(empty_hosts.validate().is_err());

        let blank_host = ProbeConfig::new(["a", " "], "https://lb/");
        assert!(blank_host.validate().is_err());

        let no_url = ProbeConfig::new(["a"], "");
        assert!(no_url.validate().unwrap_err().to_string().contains("required"));

        let bad_url = ProbeConfig::new(["a"], "not a url");
        assert!(bad_url.validate().is_err());

        let ftp = ProbeConfig::new(["a"], "ftp://lb/");
        assert!(ftp.validate().unwrap_err().to_string().contains("Unsupported scheme"));

        let zero_request_timeout = ProbeConfig::new(["a"], "https://lb/").request_timeout(0);
        assert!(zero_request_timeout.validate().is_err());
    }
}
