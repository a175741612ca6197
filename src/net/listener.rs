//! TCP listener implementation with backpressure.
//!
//! # Responsibilities
//! - Bind to the configured address
//! - Accept incoming TCP connections
//! - Enforce max_connections limit via semaphore
//! - Graceful handling of accept errors

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::ListenerConfig;
use crate::net::connection::{ConnectionGuard, ConnectionStats};

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("Invalid bind address {0:?}")]
    Address(String),
    #[error("Failed to bind: {0}")]
    Bind(#[source] io::Error),
}

/// A bounded TCP listener that limits concurrent connections.
///
/// Uses a semaphore to enforce `max_connections`. When the limit is reached,
/// the accept step waits until a connection closes.
pub struct BoundedListener {
    inner: TcpListener,
    connection_limit: Arc<Semaphore>,
    stats: ConnectionStats,
}

impl BoundedListener {
    /// Bind to the configured address with connection limits.
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let addr: SocketAddr = config
            .bind_address
            .parse()
            .map_err(|_| ListenerError::Address(config.bind_address.clone()))?;

        let listener = TcpListener::bind(addr).await.map_err(ListenerError::Bind)?;
        let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;

        tracing::info!(
            address = %local_addr,
            max_connections = config.max_connections,
            "Listener bound"
        );

        Ok(Self::from_tcp(listener, config.max_connections))
    }

    /// Wrap an already bound listener.
    pub fn from_tcp(listener: TcpListener, max_connections: usize) -> Self {
        Self {
            inner: listener,
            connection_limit: Arc::new(Semaphore::new(max_connections)),
            stats: ConnectionStats::new(),
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    /// Get current available connection slots.
    pub fn available_permits(&self) -> usize {
        self.connection_limit.available_permits()
    }

    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }
}

impl axum::serve::Listener for BoundedListener {
    type Io = TrackedStream<TcpStream>;
    type Addr = SocketAddr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        // Acquire permit first (backpressure). The semaphore is never closed;
        // if it were, connections would simply stop being limited.
        let permit = self.connection_limit.clone().acquire_owned().await.ok();

        loop {
            match self.inner.accept().await {
                Ok((stream, addr)) => {
                    let guard = self.stats.open(addr);
                    tracing::debug!(
                        peer_addr = %addr,
                        connection_id = %guard.id(),
                        open_connections = self.stats.open_count(),
                        peak_connections = self.stats.peak_count(),
                        available_permits = self.connection_limit.available_permits(),
                        "Connection accepted"
                    );
                    let stream = TrackedStream {
                        inner: stream,
                        _permit: permit,
                        _guard: guard,
                    };
                    return (stream, addr);
                }
                Err(e) => handle_accept_error(e).await,
            }
        }
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        self.inner.local_addr()
    }
}

fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}

async fn handle_accept_error(e: io::Error) {
    if is_connection_error(&e) {
        return;
    }
    // Typically EMFILE; back off instead of spinning.
    tracing::error!(error = %e, "Failed to accept connection");
    tokio::time::sleep(Duration::from_secs(1)).await;
}

/// An accepted stream holding its connection slot.
///
/// When dropped, the slot is released and the connection is no longer
/// counted, even if the connection task panicked.
#[derive(Debug)]
pub struct TrackedStream<S> {
    inner: S,
    _permit: Option<OwnedSemaphorePermit>,
    _guard: ConnectionGuard,
}

impl<S: AsyncRead + Unpin> AsyncRead for TrackedStream<S> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for TrackedStream<S> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_write_vectored(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::serve::Listener;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn permits_are_held_per_connection() {
        let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut listener = BoundedListener::from_tcp(tcp, 2);
        let addr = listener.local_addr().unwrap();

        let mut client = TcpStream::connect(addr).await.unwrap();
        let (mut stream, _) = listener.accept().await;
        assert_eq!(listener.available_permits(), 1);
        assert_eq!(listener.stats().open_count(), 1);

        client.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        drop(stream);
        assert_eq!(listener.available_permits(), 2);
        assert_eq!(listener.stats().open_count(), 0);
        assert_eq!(listener.stats().peak_count(), 1);
    }

    #[tokio::test]
    async fn rejects_bad_bind_address() {
        let config = ListenerConfig {
            bind_address: "not-an-address".into(),
            ..ListenerConfig::default()
        };
        let err = BoundedListener::bind(&config).await.err().unwrap();
        assert!(matches!(err, ListenerError::Address(_)));
    }
}
