//! Shared utilities for integration and load testing.

use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use dual_protocol_proxy::config::ProxyConfig;
use dual_protocol_proxy::net::ConnectionTracker;
use dual_protocol_proxy::{Gateway, GatewayError, Listener, Shutdown};

/// RESP-encoded `PING`.
pub const PING: &[u8] = b"*1\r\n$4\r\nPING\r\n";
/// Reply to [`PING`].
pub const PONG: &[u8] = b"+PONG\r\n";
/// Makes the fake backend drop the connection.
#[allow(dead_code)]
pub const KILL: &[u8] = b"KILL";

#[allow(dead_code)]
pub const DEPLOY_HEALTH_PATH: &str = "/qsynthesis/container/redis-084qf-health";

/// Start a fake store backend.
///
/// Each connection answers [`PING`] with [`PONG`], closes on [`KILL`] and
/// echoes anything else back unchanged. Input that could still grow into
/// `PING` or `KILL` is held until it can be decided.
pub async fn start_resp_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(serve_resp(socket));
        }
    });

    addr
}

async fn serve_resp(mut socket: TcpStream) {
    let mut pending = Vec::new();
    let mut buf = [0u8; 4096];

    loop {
        let n = match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        pending.extend_from_slice(&buf[..n]);

        loop {
            if pending.starts_with(PING) {
                pending.drain(..PING.len());
                if socket.write_all(PONG).await.is_err() {
                    return;
                }
                continue;
            }
            if pending.starts_with(KILL) {
                return;
            }
            if pending.is_empty() || PING.starts_with(&pending) || KILL.starts_with(&pending) {
                break;
            }
            if socket.write_all(&pending).await.is_err() {
                return;
            }
            pending.clear();
        }
    }
}

/// An address nothing listens on.
#[allow(dead_code)]
pub async fn dead_backend_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Configuration for a gateway on an ephemeral local port.
pub fn test_config(backend: SocketAddr) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.backend.address = backend.to_string();
    config.timeouts.classify_ms = 2_000;
    config.timeouts.connect_ms = 500;
    config.timeouts.probe_ms = 500;
    config.shutdown.grace_secs = 5;
    config
}

/// A gateway running in the background.
#[allow(dead_code)]
pub struct TestGateway {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub tracker: ConnectionTracker,
    pub handle: JoinHandle<Result<(), GatewayError>>,
}

#[allow(dead_code)]
impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn connect(&self) -> TcpStream {
        TcpStream::connect(self.addr).await.unwrap()
    }
}

pub async fn start_gateway(config: ProxyConfig) -> TestGateway {
    let listener = Listener::bind(&config.listener).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let gateway = Gateway::new(&config);
    let tracker = gateway.tracker();
    let handle = tokio::spawn(gateway.run(listener, shutdown.subscribe()));

    TestGateway {
        addr,
        shutdown,
        tracker,
        handle,
    }
}

/// HTTP client that never reuses connections.
#[allow(dead_code)]
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

/// Read until the received bytes end with CRLF.
#[allow(dead_code)]
pub async fn read_line(stream: &mut TcpStream) -> Vec<u8> {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    while !line.ends_with(b"\r\n") {
        let n = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut byte))
            .await
            .expect("timed out waiting for reply")
            .unwrap();
        assert!(n > 0, "connection closed mid-line: {:?}", String::from_utf8_lossy(&line));
        line.push(byte[0]);
    }
    line
}

/// Wait until the peer closes the connection, discarding anything it sends.
#[allow(dead_code)]
pub async fn expect_closed(stream: &mut TcpStream, within: Duration) {
    let mut buf = [0u8; 256];
    tokio::time::timeout(within, async {
        loop {
            match stream.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(_) => continue,
            }
        }
    })
    .await
    .expect("connection stayed open");
}
