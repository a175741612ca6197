//! Per-connection bookkeeping.
//!
//! Every accepted socket is tagged with a sequence number so log lines from
//! the compatibility layer and hyper can be tied back to one client, and the
//! open/peak counts feed the `connections_active` gauge.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::observability::metrics;

/// Sequence number of an accepted connection, unique per listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug, Default)]
struct Counters {
    accepted: AtomicU64,
    open: AtomicU64,
    peak: AtomicU64,
}

/// Shared connection counters for one listener.
#[derive(Debug, Clone, Default)]
pub struct ConnectionStats {
    counters: Arc<Counters>,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an accepted connection from `peer`.
    ///
    /// The returned guard keeps the connection counted as open until dropped.
    pub fn open(&self, peer: SocketAddr) -> ConnectionGuard {
        let id = ConnectionId(self.counters.accepted.fetch_add(1, Ordering::Relaxed) + 1);
        let open = self.counters.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.peak.fetch_max(open, Ordering::SeqCst);
        metrics::record_active_connections(open);

        ConnectionGuard {
            counters: Arc::clone(&self.counters),
            id,
            peer,
            opened_at: Instant::now(),
        }
    }

    pub fn open_count(&self) -> u64 {
        self.counters.open.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously open connections seen so far.
    pub fn peak_count(&self) -> u64 {
        self.counters.peak.load(Ordering::SeqCst)
    }
}

/// Marks one connection as open for as long as it lives.
#[derive(Debug)]
pub struct ConnectionGuard {
    counters: Arc<Counters>,
    id: ConnectionId,
    peer: SocketAddr,
    opened_at: Instant,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let open = self.counters.open.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::record_active_connections(open);
        tracing::trace!(
            connection_id = %self.id,
            peer_addr = %self.peer,
            duration_ms = self.opened_at.elapsed().as_millis() as u64,
            "Connection closed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn ids_follow_accept_order() {
        let stats = ConnectionStats::new();
        let a = stats.open(peer(1000));
        let b = stats.open(peer(1001));
        assert!(a.id() < b.id());
        assert_eq!(b.id().to_string(), "conn-2");
    }

    #[test]
    fn open_count_tracks_guards() {
        let stats = ConnectionStats::new();
        assert_eq!(stats.open_count(), 0);

        let first = stats.open(peer(1));
        let second = stats.open(peer(2));
        assert_eq!(stats.open_count(), 2);

        drop(first);
        assert_eq!(stats.open_count(), 1);
        drop(second);
        assert_eq!(stats.open_count(), 0);
    }

    #[test]
    fn peak_survives_closes() {
        let stats = ConnectionStats::new();
        let guards: Vec<_> = (0..5).map(|p| stats.open(peer(p))).collect();
        drop(guards);

        let one = stats.open(peer(9));
        assert_eq!(stats.open_count(), 1);
        assert_eq!(stats.peak_count(), 5);
        assert_eq!(one.id().to_string(), "conn-6");
    }
}
