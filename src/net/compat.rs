//! Legacy `ICE/1.0` source-client support.
//!
//! Old broadcast encoders open a source connection with
//!
//! ```text
//! SOURCE /mount ICE/1.0\r\n
//! ```
//!
//! which no HTTP parser accepts. [`CompatListener`] wraps any
//! [`axum::serve::Listener`] and hands out [`CompatStream`]s that rewrite
//! the trailing `ICE/1.0` token of the first request line to `HTTP/1.1`.
//! The rewrite happens in the buffered copy of the first line, so bytes
//! read after it are forwarded exactly as received.
//!
//! The first bytes are inspected lazily, inside the connection's own read
//! path: accepting never waits on a peer. Inspection stops at the first
//! `\n`, at `max_request_line` bytes, at EOF or when `sniff_timeout`
//! elapses; from then on bytes are forwarded untouched. Malformed lines are
//! left for hyper to reject.

use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::serve::Listener;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::time::Sleep;

use crate::config::CompatConfig;
use crate::observability::metrics;

/// Protocol token sent by legacy source clients.
pub const LEGACY_PROTOCOL: &str = "ICE/1.0";
/// Replacement protocol token.
pub const HTTP_PROTOCOL: &str = "HTTP/1.1";

const SNIFF_CHUNK: usize = 1024;

/// Rewrite a legacy request line at the start of `buf`.
///
/// `buf` must start at the beginning of the stream. Only a complete first
/// line whose last space-separated token is `ICE/1.0` is touched. Returns
/// whether a rewrite happened.
pub fn rewrite_request_line(buf: &mut Vec<u8>) -> bool {
    let Some(newline) = buf.iter().position(|&b| b == b'\n') else {
        return false;
    };
    let mut end = newline;
    if end > 0 && buf[end - 1] == b'\r' {
        end -= 1;
    }

    let token = LEGACY_PROTOCOL.as_bytes();
    let line = &buf[..end];
    if line.len() <= token.len() || !line.ends_with(token) || line[end - token.len() - 1] != b' ' {
        return false;
    }

    buf.splice(end - token.len()..end, HTTP_PROTOCOL.bytes());
    true
}

/// Listener decorator that makes legacy source connections parseable as HTTP/1.1.
pub struct CompatListener<L> {
    inner: L,
    config: CompatConfig,
}

impl<L> CompatListener<L> {
    pub fn new(inner: L, config: CompatConfig) -> Self {
        Self { inner, config }
    }
}

impl<L> Listener for CompatListener<L>
where
    L: Listener,
    L::Addr: fmt::Debug,
{
    type Io = CompatStream<L::Io>;
    type Addr = L::Addr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        let (io, addr) = self.inner.accept().await;
        let stream = if self.config.enabled {
            CompatStream::new(io, &self.config, format!("{addr:?}"))
        } else {
            CompatStream::passthrough(io)
        };
        (stream, addr)
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        self.inner.local_addr()
    }
}

enum Phase {
    /// Collecting the start of the stream.
    Sniffing {
        buf: Vec<u8>,
        deadline: Option<Pin<Box<Sleep>>>,
    },
    /// Handing out the (possibly rewritten) collected bytes.
    Replaying { buf: Vec<u8>, pos: usize },
    Passthrough,
}

/// Why inspection of the stream start stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sniffed {
    Line,
    Overflow,
    Eof,
    TimedOut,
}

/// A stream whose first request line may be rewritten from `ICE/1.0` to `HTTP/1.1`.
///
/// Writes always go straight to the inner stream.
pub struct CompatStream<S> {
    inner: S,
    phase: Phase,
    max_request_line: usize,
    sniff_timeout: Duration,
    peer: String,
}

impl<S> CompatStream<S> {
    pub fn new(inner: S, config: &CompatConfig, peer: String) -> Self {
        Self {
            inner,
            phase: Phase::Sniffing {
                buf: Vec::new(),
                deadline: None,
            },
            max_request_line: config.max_request_line.max(1),
            sniff_timeout: config.sniff_timeout(),
            peer,
        }
    }

    /// A stream that is never inspected.
    pub fn passthrough(inner: S) -> Self {
        Self {
            inner,
            phase: Phase::Passthrough,
            max_request_line: 0,
            sniff_timeout: Duration::ZERO,
            peer: String::new(),
        }
    }

    fn finish_sniff(&mut self, mut buf: Vec<u8>, sniffed: Sniffed) {
        match sniffed {
            Sniffed::Line => {
                if rewrite_request_line(&mut buf) {
                    tracing::info!(
                        peer = %self.peer,
                        protocol = LEGACY_PROTOCOL,
                        "Rewrote legacy source request line to HTTP/1.1"
                    );
                    metrics::record_compat_rewrite();
                }
            }
            Sniffed::Overflow | Sniffed::TimedOut => {
                tracing::debug!(
                    peer = %self.peer,
                    buffered = buf.len(),
                    reason = ?sniffed,
                    "No request line found, forwarding untouched"
                );
            }
            Sniffed::Eof => {}
        }
        self.phase = Phase::Replaying { buf, pos: 0 };
    }
}

impl<S> fmt::Debug for CompatStream<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self.phase {
            Phase::Sniffing { .. } => "sniffing",
            Phase::Replaying { .. } => "replaying",
            Phase::Passthrough => "passthrough",
        };
        f.debug_struct("CompatStream")
            .field("phase", &phase)
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}

fn poll_sniff<S: AsyncRead + Unpin>(
    inner: &mut S,
    cx: &mut Context<'_>,
    buf: &mut Vec<u8>,
    deadline: &mut Option<Pin<Box<Sleep>>>,
    max: usize,
    timeout: Duration,
) -> Poll<io::Result<Sniffed>> {
    let deadline = deadline.get_or_insert_with(|| Box::pin(tokio::time::sleep(timeout)));
    let mut chunk = [0u8; SNIFF_CHUNK];

    loop {
        let want = max.saturating_sub(buf.len()).min(SNIFF_CHUNK);
        let mut read_buf = ReadBuf::new(&mut chunk[..want]);
        match Pin::new(&mut *inner).poll_read(cx, &mut read_buf) {
            Poll::Ready(Ok(())) => {
                let filled = read_buf.filled();
                if filled.is_empty() {
                    return Poll::Ready(Ok(Sniffed::Eof));
                }
                buf.extend_from_slice(filled);
                if filled.contains(&b'\n') {
                    return Poll::Ready(Ok(Sniffed::Line));
                }
                if buf.len() >= max {
                    return Poll::Ready(Ok(Sniffed::Overflow));
                }
            }
            Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
            Poll::Pending => {
                if deadline.as_mut().poll(cx).is_ready() {
                    return Poll::Ready(Ok(Sniffed::TimedOut));
                }
                return Poll::Pending;
            }
        }
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for CompatStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        out: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        loop {
            match &mut this.phase {
                Phase::Passthrough => return Pin::new(&mut this.inner).poll_read(cx, out),
                Phase::Replaying { buf, pos } => {
                    if *pos >= buf.len() {
                        this.phase = Phase::Passthrough;
                        continue;
                    }
                    let n = (buf.len() - *pos).min(out.remaining());
                    out.put_slice(&buf[*pos..*pos + n]);
                    *pos += n;
                    return Poll::Ready(Ok(()));
                }
                Phase::Sniffing { buf, deadline } => {
                    let sniffed = match poll_sniff(
                        &mut this.inner,
                        cx,
                        buf,
                        deadline,
                        this.max_request_line,
                        this.sniff_timeout,
                    ) {
                        Poll::Ready(Ok(sniffed)) => sniffed,
                        Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                        Poll::Pending => return Poll::Pending,
                    };
                    let buf = std::mem::take(buf);
                    this.finish_sniff(buf, sniffed);
                }
            }
        }
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for CompatStream<S> {
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
