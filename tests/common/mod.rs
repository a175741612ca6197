//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use radio_gateway::config::GatewayConfig;
use radio_gateway::http::HttpServer;
use radio_gateway::lifecycle::Shutdown;
use radio_gateway::net::BoundedListener;
use radio_gateway::tracker::Recorder;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing_subscriber::fmt::MakeWriter;

/// In-memory log sink for asserting on emitted records.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Capture INFO and above for the current thread.
///
/// Only reliable on a current-thread runtime, where spawned connection
/// tasks run on the test thread.
pub fn capture_logs() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
    let logs = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (logs, guard)
}

pub struct Gateway {
    pub addr: SocketAddr,
    pub recorder: Arc<Recorder>,
    pub shutdown: Shutdown,
}

impl Gateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Start a gateway on an ephemeral port.
pub async fn start_gateway(config: GatewayConfig) -> Gateway {
    let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = tcp.local_addr().unwrap();
    let listener = BoundedListener::from_tcp(tcp, config.listener.max_connections);

    let recorder = Arc::new(Recorder::new(&config.tracker));
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, recorder.clone());
    tokio::spawn(server.run(listener, shutdown.subscribe()));

    Gateway {
        addr,
        recorder,
        shutdown,
    }
}

/// Write raw bytes and return everything up to the end of the response head.
pub async fn send_raw(addr: SocketAddr, request: &[u8]) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request).await.unwrap();

    let read_head = async {
        let mut head = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = stream.read(&mut buf).await.unwrap();
            head.extend_from_slice(&buf[..n]);
            if n == 0 || head.windows(4).any(|w| w == b"\r\n\r\n") {
                return String::from_utf8_lossy(&head).into_owned();
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(5), read_head)
        .await
        .expect("no response within 5 seconds")
}

/// Poll `check` until it holds or five seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    check()
}
