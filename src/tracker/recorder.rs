//! Listener presence accounting.
//!
//! Icecast reports joins and leaves as independent HTTP calls, so a leave
//! can reach us before the join it belongs to. The recorder keeps two
//! disjoint sets under a single lock:
//!
//! ```text
//! listeners        ids counted as connected
//! pending_removal  ids whose leave arrived before their join
//! ```
//!
//! Whatever order a join/leave pair for one id arrives in, the net effect
//! is the same: the id ends up in neither set. A leave that never meets
//! its join is forgotten after `pending_ttl`, and the pending set never
//! holds more than `pending_capacity` ids (oldest dropped first).

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::config::TrackerConfig;
use crate::observability::metrics;

/// Identifier Icecast assigns to one listener connection.
///
/// Only unique among currently open connections; Icecast may reuse it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl ClientId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned when a client id is not a plain decimal number.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid client id: {0:?}")]
pub struct ParseClientIdError(String);

impl FromStr for ClientId {
    type Err = ParseClientIdError;

    /// Accepts ASCII digits only: no sign, no whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseClientIdError(s.to_string()));
        }
        s.parse::<u64>()
            .map(ClientId)
            .map_err(|_| ParseClientIdError(s.to_string()))
    }
}

/// Queue entry for one early leave.
#[derive(Debug, Clone, Copy)]
struct Marker {
    id: ClientId,
    seq: u64,
    recorded: Instant,
}

#[derive(Debug, Default)]
struct Membership {
    listeners: HashSet<ClientId>,
    /// Early leaves, keyed to the sequence number of their live marker.
    pending_removal: HashMap<ClientId, u64>,
    /// Markers in insertion order. May hold stale markers for ids that were
    /// consumed by a join or re-recorded since; those are skipped when popped.
    pending_order: VecDeque<Marker>,
    next_seq: u64,
}

impl Membership {
    fn record_pending(&mut self, id: ClientId, now: Instant) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending_removal.insert(id, seq);
        self.pending_order.push_back(Marker {
            id,
            seq,
            recorded: now,
        });
    }

    /// Remove the marker's id from the pending set if the marker is still live.
    fn forget_if_current(&mut self, marker: Marker) -> bool {
        if self.pending_removal.get(&marker.id) == Some(&marker.seq) {
            self.pending_removal.remove(&marker.id);
            true
        } else {
            false
        }
    }

    fn evict_expired(&mut self, now: Instant, ttl: Duration) -> usize {
        let mut evicted = 0;
        while let Some(&marker) = self.pending_order.front() {
            if now.saturating_duration_since(marker.recorded) < ttl {
                break;
            }
            self.pending_order.pop_front();
            if self.forget_if_current(marker) {
                evicted += 1;
            }
        }
        evicted
    }

    fn make_room(&mut self, capacity: usize) -> usize {
        let mut evicted = 0;
        while self.pending_removal.len() >= capacity {
            let Some(marker) = self.pending_order.pop_front() else {
                break;
            };
            if self.forget_if_current(marker) {
                evicted += 1;
            }
        }
        evicted
    }

    /// Drop stale markers once they outnumber the live ones.
    fn compact(&mut self) {
        if self.pending_order.len() > self.pending_removal.len() * 2 + 64 {
            let live = &self.pending_removal;
            self.pending_order
                .retain(|marker| live.get(&marker.id) == Some(&marker.seq));
        }
    }

    fn sizes(&self) -> (usize, usize) {
        (self.listeners.len(), self.pending_removal.len())
    }
}

/// What a single event did to the membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    Joined,
    JoinMatchedLeave,
    Left,
    LeaveRecorded { evicted: usize },
    Unchanged,
}

/// Thread-safe count of connected listeners fed by join/leave events.
///
/// None of the operations fail: the count is advisory, not a source of truth.
/// The lock only covers set updates; logging and gauges happen after it is
/// released.
#[derive(Debug)]
pub struct Recorder {
    inner: Mutex<Membership>,
    pending_ttl: Duration,
    pending_capacity: usize,
}

impl Recorder {
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            inner: Mutex::new(Membership::default()),
            pending_ttl: config.pending_ttl(),
            pending_capacity: config.pending_capacity.max(1),
        }
    }

    // A panic while holding the lock cannot leave the sets half-updated in a
    // way that matters more than a lost count, so poisoning is ignored.
    fn membership(&self) -> MutexGuard<'_, Membership> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record that a listener joined.
    ///
    /// If its leave already arrived, the pending marker is consumed and the
    /// listener is never counted.
    pub fn listener_add(&self, id: ClientId) {
        let (change, sizes) = {
            let mut state = self.membership();
            let change = if state.pending_removal.remove(&id).is_some() {
                state.compact();
                Change::JoinMatchedLeave
            } else if state.listeners.insert(id) {
                Change::Joined
            } else {
                Change::Unchanged
            };
            (change, state.sizes())
        };
        report(id, change, sizes);
    }

    /// Record that a listener left.
    ///
    /// A leave for an unknown id is remembered so the late join is ignored.
    pub fn listener_remove(&self, id: ClientId) {
        self.listener_remove_at(id, Instant::now());
    }

    fn listener_remove_at(&self, id: ClientId, now: Instant) {
        let (change, sizes) = {
            let mut state = self.membership();
            let change = if state.listeners.remove(&id) {
                Change::Left
            } else if !state.pending_removal.contains_key(&id) {
                let mut evicted = state.evict_expired(now, self.pending_ttl);
                evicted += state.make_room(self.pending_capacity);
                state.record_pending(id, now);
                Change::LeaveRecorded { evicted }
            } else {
                Change::Unchanged
            };
            (change, state.sizes())
        };
        report(id, change, sizes);
    }

    /// Number of listeners currently counted as connected.
    pub fn listener_amount(&self) -> i64 {
        self.membership().listeners.len() as i64
    }

    /// Number of early leaves still waiting for their join.
    pub fn pending_amount(&self) -> usize {
        self.membership().pending_removal.len()
    }

    /// Forget early leaves older than the configured TTL.
    pub fn evict_expired(&self) -> usize {
        self.evict_expired_at(Instant::now())
    }

    fn evict_expired_at(&self, now: Instant) -> usize {
        let (evicted, (listeners, pending)) = {
            let mut state = self.membership();
            let evicted = state.evict_expired(now, self.pending_ttl);
            (evicted, state.sizes())
        };
        if evicted > 0 {
            tracing::debug!(evicted, remaining = pending, "Expired early leaves");
            metrics::record_listener_counts(listeners, pending);
        }
        evicted
    }
}

fn report(id: ClientId, change: Change, (listeners, pending): (usize, usize)) {
    match change {
        Change::Joined => tracing::debug!(client_id = %id, "Listener joined"),
        Change::JoinMatchedLeave => {
            tracing::debug!(client_id = %id, "Join matched an earlier leave")
        }
        Change::Left => tracing::debug!(client_id = %id, "Listener left"),
        Change::LeaveRecorded { evicted } => {
            tracing::debug!(client_id = %id, evicted, "Leave arrived before join")
        }
        Change::Unchanged => {}
    }
    metrics::record_listener_counts(listeners, pending);
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new(&TrackerConfig::default())
    }
}
