//! HTTPS static file server
//!
//! Accept loop over a TLS-wrapped listening socket:
//! - One tokio task per connection
//! - TLS handshake, then HTTP/1.1 via hyper
//! - Every request served by [`StaticFiles`]

use crate::handlers::{StaticFileConfig, StaticFiles};
use crate::tls::TlsConfig;
use crate::{Error, Request, Response, Result, StatusCode};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use socket2::{Domain, Protocol, Socket, Type};
use std::convert::Infallible;
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;
use tracing::{debug, info, warn};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub hostname: String,
    pub port: u16,
    pub workers: usize,
    /// Directory to serve
    pub root: PathBuf,
    pub tls: TlsConfig,
    /// How long to wait for open connections after shutdown is signalled
    pub drain_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            hostname: "0.0.0.0".to_string(),
            port: 443,
            workers: num_cpus::get(),
            root: PathBuf::from("."),
            tls: TlsConfig::default(),
            drain_timeout: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    pub fn new(tls: TlsConfig) -> Self {
        Self {
            tls,
            ..Default::default()
        }
    }

    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Resolve hostname and port into a bind address
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .hostname
            .parse()
            .map_err(|e| Error::Config(format!("Invalid listen address {}: {}", self.hostname, e)))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Create a listening TCP socket with SO_REUSEADDR set
pub fn create_listener(addr: &SocketAddr) -> std::io::Result<std::net::TcpListener> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;

    // SO_REUSEADDR - allow binding to address in TIME_WAIT
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&(*addr).into())?;
    socket.listen(1024)?;

    Ok(socket.into())
}

/// A bound HTTPS file server
pub struct Server {
    listener: TcpListener,
    acceptor: TlsAcceptor,
    files: Arc<StaticFiles>,
    tracker: Arc<ConnectionTracker>,
    drain_timeout: Duration,
}

impl Server {
    /// Load TLS material and bind the listening socket.
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind(config: ServerConfig) -> Result<Self> {
        let acceptor = config.tls.build_acceptor()?;
        let addr = config.socket_addr()?;
        let listener = TcpListener::from_std(create_listener(&addr)?)?;

        Ok(Self {
            listener,
            acceptor,
            files: Arc::new(StaticFiles::new(StaticFileConfig::new(config.root))),
            tracker: Arc::new(ConnectionTracker::new()),
            drain_timeout: config.drain_timeout,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve connections until `shutdown` resolves, then wait for open
    /// connections to drain (bounded by the drain timeout).
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let addr = self.local_addr()?;
        info!(addr = %addr, root = %self.files.root().display(), "Serving HTTPS");

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            warn!(error = %e, "Accept failed");
                            continue;
                        }
                    };

                    let acceptor = self.acceptor.clone();
                    let files = self.files.clone();
                    let tracker = self.tracker.clone();
                    tracker.increment();

                    tokio::spawn(async move {
                        serve_connection(stream, peer, acceptor, files).await;
                        tracker.decrement();
                    });
                }
                _ = &mut shutdown => break,
            }
        }

        drop(self.listener);
        let drained = self.tracker.wait_idle(self.drain_timeout).await;
        info!(drained, remaining = self.tracker.count(), "Server stopped");

        Ok(())
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    acceptor: TlsAcceptor,
    files: Arc<StaticFiles>,
) {
    let tls_stream = match acceptor.accept(stream).await {
        Ok(s) => s,
        Err(e) => {
            debug!(peer = %peer, error = %e, "TLS handshake failed");
            return;
        }
    };

    let io = TokioIo::new(tls_stream);
    let service = service_fn(move |req: hyper::Request<Incoming>| {
        let files = files.clone();
        async move {
            let response = match Request::from_hyper(&req) {
                Ok(request) => {
                    let response = files.handle(&request).await;
                    info!(
                        peer = %peer,
                        method = %request.method,
                        path = %request.path,
                        status = response.status.as_u16(),
                        "request"
                    );
                    response
                }
                Err(e) => {
                    info!(peer = %peer, error = %e, status = 501, "request");
                    Response::error(StatusCode::NOT_IMPLEMENTED)
                }
            };
            Ok::<_, Infallible>(response.into_hyper())
        }
    });

    if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
        debug!(peer = %peer, error = %e, "Connection error");
    }
}

/// Tracks active connections for graceful shutdown
#[derive(Debug, Default)]
pub struct ConnectionTracker {
    active: AtomicU64,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn increment(&self) {
        self.active.fetch_add(1, Ordering::SeqCst);
    }

    #[inline]
    pub fn decrement(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.active.load(Ordering::SeqCst)
    }

    /// Wait until no connections are active. Returns false on timeout.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.count() == 0 {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.hostname, "0.0.0.0");
        assert_eq!(config.port, 443);
        assert_eq!(config.root, PathBuf::from("."));
        assert!(config.workers >= 1);
        assert_eq!(config.socket_addr().unwrap(), "0.0.0.0:443".parse().unwrap());
    }

    #[test]
    fn test_socket_addr_ipv6_and_invalid() {
        let config = ServerConfig::default().hostname("::1").port(8443);
        assert_eq!(config.socket_addr().unwrap(), "[::1]:8443".parse().unwrap());

        let config = ServerConfig::default().hostname("not-an-ip");
        assert!(matches!(config.socket_addr(), Err(Error::Config(_))));
    }

    #[test]
    fn test_workers_floor() {
        assert_eq!(ServerConfig::default().workers(0).workers, 1);
    }

    #[test]
    fn test_create_listener_ephemeral() {
        let listener = create_listener(&"127.0.0.1:0".parse().unwrap()).unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn test_bind_with_missing_cert_fails() {
        let config = ServerConfig::new(TlsConfig::new("/nonexistent.crt", "/nonexistent.key"))
            .hostname("127.0.0.1")
            .port(0);
        assert!(matches!(Server::bind(config), Err(Error::Tls(_))));
    }

    #[tokio::test]
    async fn test_connection_tracker() {
        let tracker = ConnectionTracker::new();
        tracker.increment();
        tracker.increment();
        tracker.decrement();
        assert_eq!(tracker.count(), 1);
        assert!(!tracker.wait_idle(Duration::from_millis(30)).await);

        tracker.decrement();
        assert!(tracker.wait_idle(Duration::from_millis(30)).await);
    }
}
