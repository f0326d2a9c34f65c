//! `lbcheck serve`: static HTTPS file server

use anyhow::{Context, Result};
use clap::Args;
use lbcheck_core::{Server, ServerConfig, TlsConfig};
use std::future::Future;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(short, long, default_value_t = 443)]
    pub port: u16,
    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,
    /// Directory to serve
    #[arg(short, long, default_value = ".")]
    pub root: PathBuf,
    /// PEM certificate chain
    #[arg(long, default_value = "temporary.crt")]
    pub cert: PathBuf,
    /// PEM private key
    #[arg(long, default_value = "temporary.key")]
    pub key: PathBuf,
    /// Runtime worker threads (default: number of CPUs)
    #[arg(long)]
    pub workers: Option<usize>,
}

impl ServeArgs {
    fn server_config(&self) -> ServerConfig {
        let mut config = ServerConfig::new(TlsConfig::new(&self.cert, &self.key))
            .hostname(self.host.clone())
            .port(self.port)
            .root(&self.root);
        if let Some(workers) = self.workers {
            config = config.workers(workers);
        }
        config
    }
}

/// Run the file server until Ctrl-C
pub fn execute_serve_command(args: ServeArgs) -> Result<()> {
    let config = args.server_config();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.workers)
        .enable_all()
        .build()
        .context("Failed to start tokio runtime")?;

    runtime.block_on(async move {
        let server = Server::bind(config.clone()).with_context(|| {
            format!(
                "Failed to start HTTPS server on {}:{} (cert {}, key {})",
                config.hostname,
                config.port,
                config.tls.cert_path.display(),
                config.tls.key_path.display()
            )
        })?;

        server
            .run_until(shutdown_on(tokio::signal::ctrl_c()))
            .await
            .context("HTTPS server failed")
    })
}

/// Resolve once `signal` fires. If the signal handler cannot be installed,
/// never resolve so the server keeps running until killed.
async fn shutdown_on<F>(signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => info!("Ctrl-C received, shutting down"),
        Err(e) => {
            warn!(error = %e, "Failed to listen for Ctrl-C, serving until killed");
            std::future::pending::<()>().await
        }
    }
}
