//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use tinybaby::lifecycle::ShutdownError;
use tinybaby::{Phase, Server, ServerConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

/// Configuration bound to an ephemeral loopback port.
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config
}

/// A server running in the background, stopped through a one-shot trigger.
pub struct TestServer {
    pub addr: SocketAddr,
    pub phase: watch::Receiver<Phase>,
    trigger: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<(), ShutdownError>>,
}

impl TestServer {
    pub async fn start(config: ServerConfig) -> Self {
        let server = Server::bind(&config).await.expect("bind test server");
        Self::run(server).await
    }

    pub async fn start_with(config: ServerConfig, app: Router) -> Self {
        let server = Server::bind_with(&config, app).await.expect("bind test server");
        Self::run(server).await
    }

    async fn run(server: Server) -> Self {
        let addr = server.local_addr();
        let mut phase = server.phase();
        let (trigger, fired) = oneshot::channel::<()>();

        let handle = tokio::spawn(server.run(async move {
            let _ = fired.await;
        }));

        tokio::time::timeout(Duration::from_secs(5), phase.wait_for(|p| *p == Phase::Serving))
            .await
            .expect("server reaches Serving")
            .expect("phase channel open");

        Self {
            addr,
            phase,
            trigger: Some(trigger),
            handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Fire the shutdown trigger. Later calls do nothing.
    pub fn shutdown(&mut self) {
        if let Some(trigger) = self.trigger.take() {
            let _ = trigger.send(());
        }
    }

    /// Wait until the server reaches `phase`.
    pub async fn wait_for_phase(&mut self, phase: Phase) {
        tokio::time::timeout(Duration::from_secs(5), self.phase.wait_for(|p| *p == phase))
            .await
            .unwrap_or_else(|_| panic!("server reaches {phase:?}"))
            .expect("phase channel open");
    }

    /// Wait for `run` to return, failing the test after `limit`.
    pub async fn finished(self, limit: Duration) -> Result<(), ShutdownError> {
        tokio::time::timeout(limit, self.handle)
            .await
            .expect("run returned within limit")
            .expect("run task did not panic")
    }
}

/// Send one raw HTTP/1.1 request on `stream` and read until the peer closes.
pub async fn raw_exchange(stream: &mut TcpStream, request: &str, limit: Duration) -> String {
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = Vec::new();
    tokio::time::timeout(limit, stream.read_to_end(&mut response))
        .await
        .expect("server closed the connection within limit")
        .unwrap();
    String::from_utf8_lossy(&response).into_owned()
}

/// Read one response from a connection that stays open, using its
/// `content-length` to find the end.
pub async fn read_response(stream: &mut TcpStream, limit: Duration) -> String {
    let mut response = Vec::new();
    tokio::time::timeout(limit, async {
        let mut chunk = [0u8; 1024];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed mid-response");
            response.extend_from_slice(&chunk[..n]);
            if response_complete(&response) {
                break;
            }
        }
    })
    .await
    .expect("response within limit");
    String::from_utf8_lossy(&response).into_owned()
}

fn response_complete(bytes: &[u8]) -> bool {
    let text = String::from_utf8_lossy(bytes);
    let Some((head, body)) = text.split_once("\r\n\r\n") else {
        return false;
    };
    let length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);
    body.len() >= length
}

/// Wait for the server to close `stream`, returning whatever it sent first.
pub async fn wait_for_close(stream: &mut TcpStream, limit: Duration) -> Vec<u8> {
    let mut rest = Vec::new();
    tokio::time::timeout(limit, stream.read_to_end(&mut rest))
        .await
        .expect("server closed the connection within limit")
        .unwrap();
    rest
}

/// Poll until connecting to `addr` is refused.
pub async fn wait_until_refused(addr: SocketAddr, limit: Duration) {
    tokio::time::timeout(limit, async {
        while TcpStream::connect(addr).await.is_ok() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("listener closed within limit");
}
