//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use route_relay::config::RelayConfig;
use route_relay::http::RelayServer;
use route_relay::lifecycle::Shutdown;

/// One request as the upstream saw it.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub head: String,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn request_line(&self) -> &str {
        self.head.lines().next().unwrap_or_default()
    }

    /// Every value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Vec<String> {
        self.head
            .lines()
            .skip(1)
            .filter_map(|line| line.split_once(':'))
            .filter(|(n, _)| n.trim().eq_ignore_ascii_case(name))
            .map(|(_, v)| v.trim().to_string())
            .collect()
    }
}

/// Start an upstream that answers every connection with raw bytes built
/// from the captured request, then closes.
pub async fn start_upstream<F>(respond: F) -> (SocketAddr, mpsc::UnboundedReceiver<CapturedRequest>)
where
    F: Fn(&CapturedRequest) -> Vec<u8> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    let respond = Arc::new(respond);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let tx = tx.clone();
                    let respond = respond.clone();
                    tokio::spawn(async move {
                        let captured = read_request(&mut socket).await;
                        let response = respond(&captured);
                        let _ = tx.send(captured);
                        let _ = socket.write_all(&response).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, rx)
}

/// Start an upstream that always writes the same bytes.
pub async fn start_fixed_upstream(response: &'static [u8]) -> (SocketAddr, mpsc::UnboundedReceiver<CapturedRequest>) {
    start_upstream(move |_| response.to_vec()).await
}

async fn read_request(socket: &mut TcpStream) -> CapturedRequest {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break buf.len();
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let mut body = buf.get(head_end + 4..).map(<[u8]>::to_vec).unwrap_or_default();

    let length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(n, _)| n.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while body.len() < length {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    CapturedRequest { head, body }
}

/// Config pointing at an upstream, everything else default.
pub fn relay_config(upstream: SocketAddr) -> RelayConfig {
    let mut config = RelayConfig::default();
    config.upstream.base_address = format!("http://{}", upstream);
    config.listener.bind_address = "127.0.0.1:0".into();
    config
}

/// Start a relay server and return its address.
pub async fn start_relay(config: RelayConfig) -> (SocketAddr, Shutdown) {
    let (addr, shutdown, _) = start_reloadable_relay(config).await;
    (addr, shutdown)
}

/// Start a relay server and keep the sender that feeds it new configs.
pub async fn start_reloadable_relay(
    config: RelayConfig,
) -> (SocketAddr, Shutdown, mpsc::UnboundedSender<RelayConfig>) {
    let shutdown = Shutdown::new();
    let (updates, config_updates) = mpsc::unbounded_channel();
    let server = RelayServer::new(config).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });

    (addr, shutdown, updates)
}

/// A client that identifies itself and talks to localhost directly.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent("relay-tests/1.0")
        .no_proxy()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}
