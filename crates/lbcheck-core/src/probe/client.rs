//! Probe transport

use super::ProbeConfig;
use crate::{Error, Result};
use std::future::Future;
use std::time::Duration;

/// Something that can be probed for a host-identity body.
pub trait Endpoint {
    /// Issue one request and return the raw response body
    fn fetch(&mut self) -> impl Future<Output = Result<String>> + Send;
}

/// GETs the load balancer URL over HTTP(S) with reqwest.
#[derive(Debug, Clone)]
pub struct HttpEndpoint {
    client: reqwest::Client,
    url: reqwest::Url,
}

impl HttpEndpoint {
    pub fn new(config: &ProbeConfig) -> Result<Self> {
        let url = config.url()?;

        // Pooling is off so each probe opens a fresh connection and the
        // balancer gets a chance to pick a different backend.
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(!config.validate_certs)
            .timeout(Duration::from_secs(config.request_timeout))
            .pool_max_idle_per_host(0)
            .user_agent(concat!("lbcheck/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, url })
    }

    pub fn url(&self) -> &reqwest::Url {
        &self.url
    }
}

impl Endpoint for HttpEndpoint {
    async fn fetch(&mut self) -> Result<String> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| Error::Network(format!("GET {} failed: {}", self.url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                url: self.url.to_string(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("Failed to read body from {}: {}", self.url, e)))?;

        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}
