//! Correlation table - maps correlation ids to single-assignment handles.
//!
//! Each entry holds both halves of a `oneshot` channel:
//!
//! 1. `register()` inserts the entry (atomic insert-if-absent)
//! 2. the waiter `claim()`s the receiving half
//! 3. the listener `resolve()`s by taking the sending half, at most once
//! 4. the waiter `remove()`s the entry when it stops waiting
//!
//! Because the receiver stays in the entry until claimed, a value resolved
//! before the waiter starts waiting is buffered, never lost.

use crate::domain::correlation::CorrelationId;
use crate::domain::error::CorrelationError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// A pending request's handle
struct PendingEntry<T> {
    /// Taken by the first resolve
    sender: Option<oneshot::Sender<T>>,
    /// Taken by the single waiter
    receiver: Option<oneshot::Receiver<T>>,
    /// When the entry was registered
    created_at: Instant,
}

/// Counters for the correlation table
#[derive(Debug, Default)]
pub struct PendingStats {
    /// Ids registered
    pub total_registered: AtomicU64,
    /// Values delivered to a live handle
    pub total_resolved: AtomicU64,
    /// Waits that hit their deadline
    pub total_timeouts: AtomicU64,
    /// Resolves for ids with no entry
    pub total_orphaned: AtomicU64,
    /// Resolves that lost to an earlier resolve
    pub total_duplicate_resolutions: AtomicU64,
    /// Entries removed by the TTL sweeper
    pub total_expired: AtomicU64,
}

/// Point-in-time copy of [`PendingStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct PendingStatsSnapshot {
    pub registered: u64,
    pub resolved: u64,
    pub timeouts: u64,
    pub orphaned: u64,
    pub duplicate_resolutions: u64,
    pub expired: u64,
}

impl PendingStats {
    /// Read all counters
    pub fn snapshot(&self) -> PendingStatsSnapshot {
        PendingStatsSnapshot {
            registered: self.total_registered.load(Ordering::Relaxed),
            resolved: self.total_resolved.load(Ordering::Relaxed),
            timeouts: self.total_timeouts.load(Ordering::Relaxed),
            orphaned: self.total_orphaned.load(Ordering::Relaxed),
            duplicate_resolutions: self.total_duplicate_resolutions.load(Ordering::Relaxed),
            expired: self.total_expired.load(Ordering::Relaxed),
        }
    }
}

/// Concurrency-safe correlation table.
///
/// Shared between the waiting side and the listener as `Arc<CorrelationTable<T>>`.
/// An id is observably either absent or pending; there is no partially
/// inserted state because insertion goes through the map's entry API.
pub struct CorrelationTable<T> {
    /// Map of correlation ID to pending entry
    pending: DashMap<CorrelationId, PendingEntry<T>>,
    /// Statistics
    stats: Arc<PendingStats>,
}

impl<T> CorrelationTable<T> {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
            stats: Arc::new(PendingStats::default()),
        }
    }

    /// Register a new unresolved handle under `id`.
    ///
    /// Fails with [`CorrelationError::DuplicateId`] if `id` is already pending;
    /// the existing entry is left untouched.
    pub fn register(&self, id: CorrelationId) -> Result<(), CorrelationError> {
        match self.pending.entry(id) {
            Entry::Occupied(occupied) => Err(CorrelationError::DuplicateId(occupied.key().clone())),
            Entry::Vacant(vacant) => {
                let (tx, rx) = oneshot::channel();
                debug!(correlation_id = %vacant.key(), "Registered pending request");
                vacant.insert(PendingEntry {
                    sender: Some(tx),
                    receiver: Some(rx),
                    created_at: Instant::now(),
                });
                self.stats.total_registered.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
        }
    }

    /// Resolve the handle for `id` with `value`.
    ///
    /// Returns true if the value was delivered to a live handle. Returns false
    /// when `id` is unknown (late or unsolicited response), when an earlier
    /// resolve already won, or when the waiter has gone away.
    pub fn resolve(&self, id: &CorrelationId, value: T) -> bool {
        let sender = match self.pending.get_mut(id) {
            Some(mut entry) => entry.sender.take(),
            None => {
                self.stats.total_orphaned.fetch_add(1, Ordering::Relaxed);
                return false;
            }
        };

        // Shard lock is released before sending
        let Some(sender) = sender else {
            self.stats
                .total_duplicate_resolutions
                .fetch_add(1, Ordering::Relaxed);
            debug!(correlation_id = %id, "Ignoring duplicate resolution");
            return false;
        };

        match sender.send(value) {
            Ok(()) => {
                self.stats.total_resolved.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(_) => {
                debug!(correlation_id = %id, "Pending request receiver dropped");
                false
            }
        }
    }

    /// Take the receiving half for `id`.
    ///
    /// Returns `None` if `id` is not pending or another waiter already claimed it.
    pub fn claim(&self, id: &CorrelationId) -> Option<oneshot::Receiver<T>> {
        self.pending.get_mut(id).and_then(|mut entry| entry.receiver.take())
    }

    /// Remove the entry for `id`. Idempotent.
    pub fn remove(&self, id: &CorrelationId) -> bool {
        self.pending.remove(id).is_some()
    }

    /// Record a wait that hit its deadline
    pub(crate) fn record_timeout(&self) {
        self.stats.total_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Check if a correlation ID is pending
    pub fn contains(&self, id: &CorrelationId) -> bool {
        self.pending.contains_key(id)
    }

    /// Number of pending entries
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Get statistics
    pub fn stats(&self) -> &PendingStats {
        &self.stats
    }

    /// Remove unclaimed entries older than `ttl`.
    ///
    /// Claimed entries belong to a live waiter, which removes its own entry on
    /// exit, so they are never swept. Returns the number of entries removed.
    pub fn remove_expired(&self, ttl: Duration) -> usize {
        let now = Instant::now();
        let mut removed = 0;

        self.pending.retain(|id, entry| {
            if entry.receiver.is_none() {
                return true;
            }
            let age = now.duration_since(entry.created_at);
            if age > ttl {
                warn!(
                    correlation_id = %id,
                    age_ms = age.as_millis(),
                    ttl_ms = ttl.as_millis(),
                    "Removing expired pending request"
                );
                removed += 1;
                false
            } else {
                true
            }
        });

        self.stats
            .total_expired
            .fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }
}

impl<T> Default for CorrelationTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Background task that sweeps expired entries
pub async fn cleanup_task<T>(table: Arc<CorrelationTable<T>>, interval: Duration, ttl: Duration) {
    let mut sweep = tokio::time::interval(interval);
    sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        sweep.tick().await;
        let removed = table.remove_expired(ttl);
        if removed > 0 {
            debug!(removed = removed, "Cleaned up expired pending requests");
        }
    }
}
