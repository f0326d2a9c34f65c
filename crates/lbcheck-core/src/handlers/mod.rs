//! Request handlers
//!
//! - Static file serving

pub mod static_files;

pub use static_files::{StaticFileConfig, StaticFiles};
