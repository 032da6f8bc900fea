//! Single-flight join for identical in-flight queries
//!
//! Concurrent queries for the same cache key share one underlying
//! operation: the first caller becomes the leader and runs it, later
//! callers become followers and await the leader's envelope over a
//! shared watch channel. The pending entry is removed when the leader
//! publishes, so callers arriving after completion start a fresh flight
//! (and are normally served by the cache instead).

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::watch;

use osprey_core::ResultEnvelope;

type PendingMap = Arc<DashMap<String, watch::Receiver<Option<ResultEnvelope>>>>;

/// Table of in-flight operations keyed like the result cache
pub struct Flight {
    pending: PendingMap,
}

/// What a caller joining a flight must do next
pub enum FlightRole {
    /// Run the operation and publish its envelope
    Leader(FlightGuard),
    /// Await the leader's envelope
    Follower(watch::Receiver<Option<ResultEnvelope>>),
}

/// Leader-side handle for one pending flight
///
/// Dropping the guard without publishing (leader panicked or was
/// abandoned) clears the pending entry and closes the channel, so
/// followers observe the failure instead of waiting forever.
pub struct FlightGuard {
    key: String,
    tx: watch::Sender<Option<ResultEnvelope>>,
    pending: PendingMap,
    published: bool,
}

impl FlightGuard {
    /// Hand the finished envelope to every follower
    pub fn publish(&mut self, envelope: &ResultEnvelope) {
        // Remove before sending: a caller arriving in between becomes a
        // new leader and is served by the cache the executor already
        // wrote.
        self.pending.remove(&self.key);
        let _ = self.tx.send(Some(envelope.clone()));
        self.published = true;
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        if !self.published {
            self.pending.remove(&self.key);
        }
    }
}

impl Flight {
    pub fn new() -> Self {
        Self {
            pending: Arc::new(DashMap::new()),
        }
    }

    /// Join the flight for `key`, becoming leader or follower
    ///
    /// Leader election rides on the map's entry lock, so exactly one of
    /// any set of concurrent callers gets the leader role.
    pub fn join(&self, key: &str) -> FlightRole {
        match self.pending.entry(key.to_string()) {
            Entry::Occupied(entry) => FlightRole::Follower(entry.get().clone()),
            Entry::Vacant(slot) => {
                let (tx, rx) = watch::channel(None);
                slot.insert(rx);
                FlightRole::Leader(FlightGuard {
                    key: key.to_string(),
                    tx,
                    pending: self.pending.clone(),
                    published: false,
                })
            }
        }
    }

    /// Number of flights currently pending
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }
}

impl Default for Flight {
    fn default() -> Self {
        Self::new()
    }
}

/// Follower side: wait for the leader's envelope
///
/// Returns `None` when the leader vanished without publishing; the
/// caller should retry the flight (or consult the cache).
pub async fn await_leader(
    mut rx: watch::Receiver<Option<ResultEnvelope>>,
) -> Option<ResultEnvelope> {
    match rx.wait_for(|value| value.is_some()).await {
        Ok(value) => value.clone(),
        Err(_) => None,
    }
}
