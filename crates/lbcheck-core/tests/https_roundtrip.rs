//! End-to-end: the HTTPS file server answers the probe client

use lbcheck_core::{
    execute, run_probe, Error, HttpEndpoint, Outcome, ProbeConfig, Server, ServerConfig, TlsConfig,
};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn scratch_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("lbcheck-e2e-{}-{}", tag, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

struct Running {
    addr: SocketAddr,
    stop: oneshot::Sender<()>,
    handle: JoinHandle<lbcheck_core::Result<()>>,
}

fn start(root: &Path) -> Running {
    let config = ServerConfig::new(TlsConfig::new(fixture("cert.pem"), fixture("key.pem")))
        .hostname("127.0.0.1")
        .port(0)
        .root(root)
        .drain_timeout(Duration::from_secs(1));

    let server = Server::bind(config).unwrap();
    let addr = server.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let handle = tokio::spawn(server.run_until(async {
        let _ = stopped.await;
    }));

    Running { addr, stop, handle }
}

fn insecure_client() -> reqwest::Client {
    reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .build()
        .unwrap()
}

#[tokio::test]
async fn serves_files_over_tls() {
    let root = scratch_dir("files");
    std::fs::write(root.join("hello.txt"), "hello over tls").unwrap();
    let server = start(&root);

    let client = insecure_client();
    let base = format!("https://127.0.0.1:{}", server.addr.port());

    let res = client.get(format!("{}/hello.txt", base)).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["content-type"], "text/plain; charset=utf-8");
    assert_eq!(res.text().await.unwrap(), "hello over tls");

    let res = client.get(format!("{}/missing.txt", base)).send().await.unwrap();
    assert_eq!(res.status(), 404);

    let res = client.post(format!("{}/hello.txt", base)).send().await.unwrap();
    assert_eq!(res.status(), 501);

    let res = client.get(format!("{}/", base)).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.text().await.unwrap().contains("hello.txt"));

    server.stop.send(()).unwrap();
    server.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn rejects_plain_http() {
    let root = scratch_dir("plain");
    let server = start(&root);

    let res = reqwest::get(format!("http://127.0.0.1:{}/", server.addr.port())).await;
    assert!(res.is_err());

    server.stop.send(()).unwrap();
    server.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn probe_reaches_coverage_against_server() {
    let root = scratch_dir("coverage");
    std::fs::write(root.join("index.html"), "backend-a\n").unwrap();
    let server = start(&root);

    let config = ProbeConfig::new(["backend-a"], format!("https://127.0.0.1:{}/", server.addr.port()))
        .test_timeout(5);
    let mut endpoint = HttpEndpoint::new(&config).unwrap();
    let report = run_probe(&config, &mut endpoint).await.unwrap();

    assert_eq!(report.outcome, Outcome::Coverage);
    assert_eq!(report.hosts_seen["backend-a"], 1);
    assert_eq!(report.failed_probes, 0);
    assert!(!report.changed);

    server.stop.send(()).unwrap();
    server.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn probe_records_unknown_backend_as_junk() {
    let root = scratch_dir("junk");
    std::fs::write(root.join("whoami"), "rogue-backend\r\n").unwrap();
    let server = start(&root);

    let config = ProbeConfig::new(
        ["backend-a", "backend-b"],
        format!("https://127.0.0.1:{}/whoami", server.addr.port()),
    )
    .test_timeout(0);
    let mut endpoint = HttpEndpoint::new(&config).unwrap();
    let report = execute(&config, &mut endpoint, false).await.unwrap();

    assert_eq!(report.outcome, Outcome::Timeout);
    assert_eq!(report.probes, 1);
    assert_eq!(report.hosts_seen["backend-a"], 0);
    assert_eq!(report.hosts_seen["backend-b"], 0);
    assert_eq!(report.junk_output["rogue-backend"], 1);

    server.stop.send(()).unwrap();
    server.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn probe_counts_http_errors_as_failures() {
    let root = scratch_dir("status");
    let server = start(&root);

    let url = format!("https://127.0.0.1:{}/absent", server.addr.port());
    let config = ProbeConfig::new(["backend-a"], url).test_timeout(0);
    let mut endpoint = HttpEndpoint::new(&config).unwrap();
    let report = run_probe(&config, &mut endpoint).await.unwrap();

    assert_eq!(report.failed_probes, 1);
    assert!(report.junk_output.is_empty());
    assert_eq!(report.hosts_seen["backend-a"], 0);

    let config = config.fail_fast(true);
    let err = run_probe(&config, &mut endpoint).await.unwrap_err();
    assert!(matches!(err, Error::Status { status: 404, .. }));

    server.stop.send(()).unwrap();
    server.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn validated_certs_reject_self_signed_server() {
    let root = scratch_dir("verify");
    std::fs::write(root.join("index.html"), "backend-a").unwrap();
    let server = start(&root);

    let config = ProbeConfig::new(["backend-a"], format!("https://127.0.0.1:{}/", server.addr.port()))
        .validate_certs(true)
        .fail_fast(true);
    let mut endpoint = HttpEndpoint::new(&config).unwrap();
    let err = run_probe(&config, &mut endpoint).await.unwrap_err();
    assert!(matches!(err, Error::Network(_)));

    server.stop.send(()).unwrap();
    server.handle.await.unwrap().unwrap();
}
