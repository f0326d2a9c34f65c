//! lbcheck-core: static HTTPS file server and load balancer probe
//!
//! Two independent tools share this crate:
//! - [`server`] - serve a directory over HTTPS with a fixed certificate/key pair
//! - [`probe`] - poll a load balancer URL and tally which backend hosts answer

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod error;
pub mod handlers;
pub mod probe;
pub mod request;
pub mod response;
pub mod server;
pub mod tls;

// Re-exports
pub use error::{Error, Result};
pub use request::{Method, Request, RequestBuilder};
pub use response::{Response, ResponseBuilder, StatusCode};

pub use handlers::{StaticFileConfig, StaticFiles};
pub use probe::{
    check_mode_report, execute, run_probe, Endpoint, HostTally, HttpEndpoint, Outcome,
    ProbeConfig, ProbeReport,
};
pub use server::{create_listener, ConnectionTracker, Server, ServerConfig};
pub use tls::{load_certs, load_private_key, TlsConfig};
