//! CLI command modules

pub mod probe;
pub mod serve;

pub use probe::{execute_probe_command, ProbeArgs};
pub use serve::{execute_serve_command, ServeArgs};
