//! Correlator - the waiting side of the publish/suspend/resume protocol.
//!
//! Callers must finish `register_pending_request` before publishing the
//! outbound message for the same id. The table insert happens-before the
//! publish, so a response can never arrive ahead of its entry.

use crate::domain::correlation::CorrelationId;
use crate::domain::error::CorrelationError;
use crate::domain::pending::CorrelationTable;
use analytics_telemetry::{PENDING_REGISTERED, PENDING_TIMEOUTS};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default wait before a pending request times out
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Removes the entry when the waiting future finishes or is dropped.
struct RemoveOnDrop<'a, T> {
    table: &'a CorrelationTable<T>,
    id: &'a CorrelationId,
}

impl<T> Drop for RemoveOnDrop<'_, T> {
    fn drop(&mut self) {
        if self.table.remove(self.id) {
            debug!(correlation_id = %self.id, "Removed pending request");
        }
    }
}

/// Registers pending requests and waits for their responses.
pub struct Correlator<T> {
    table: Arc<CorrelationTable<T>>,
    default_timeout: Duration,
}

impl<T> Correlator<T> {
    pub fn new(table: Arc<CorrelationTable<T>>, default_timeout: Duration) -> Self {
        Self {
            table,
            default_timeout,
        }
    }

    /// Create the table entry for `id`.
    pub fn register_pending_request(&self, id: &CorrelationId) -> Result<(), CorrelationError> {
        self.table.register(id.clone())?;
        PENDING_REGISTERED.inc();
        info!(correlation_id = %id, "Registering pending request");
        Ok(())
    }

    /// Wait for the response to `id`, up to `timeout`.
    ///
    /// Exactly one outcome:
    /// - `Ok(value)` once the listener resolves the id
    /// - `Err(TimedOut)` when the deadline passes first
    /// - `Err(NotRegistered)` when there is no entry to wait on
    ///
    /// The entry is removed on every exit path, including when the returned
    /// future is dropped before completion. A response arriving afterwards
    /// finds no entry and is dropped by the listener.
    pub async fn wait_for_result(
        &self,
        id: &CorrelationId,
        timeout: Duration,
    ) -> Result<T, CorrelationError> {
        let Some(receiver) = self.table.claim(id) else {
            warn!(correlation_id = %id, "No pending request to wait on");
            return Err(CorrelationError::NotRegistered(id.clone()));
        };
        let _cleanup = RemoveOnDrop {
            table: &self.table,
            id,
        };

        debug!(
            correlation_id = %id,
            timeout_ms = timeout.as_millis(),
            "Waiting for response"
        );
        let started = Instant::now();

        match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(value)) => {
                debug!(
                    correlation_id = %id,
                    elapsed_ms = started.elapsed().as_millis(),
                    "Pending request resolved"
                );
                Ok(value)
            }
            Ok(Err(_)) => {
                // Entry was removed from under the waiter; the sender went with it
                warn!(correlation_id = %id, "Pending request removed while waiting");
                Err(CorrelationError::NotRegistered(id.clone()))
            }
            Err(_) => {
                self.table.record_timeout();
                PENDING_TIMEOUTS.inc();
                warn!(
                    correlation_id = %id,
                    timeout_ms = timeout.as_millis(),
                    "Timed out waiting for response"
                );
                Err(CorrelationError::TimedOut {
                    id: id.clone(),
                    timeout,
                })
            }
        }
    }

    /// Wait using the default timeout
    pub async fn wait(&self, id: &CorrelationId) -> Result<T, CorrelationError> {
        self.wait_for_result(id, self.default_timeout).await
    }

    /// The configured default timeout
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// The underlying table
    pub fn table(&self) -> Arc<CorrelationTable<T>> {
        Arc::clone(&self.table)
    }

    /// Number of pending requests
    pub fn pending_count(&self) -> usize {
        self.table.len()
    }
}

impl<T> Clone for Correlator<T> {
    fn clone(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
            default_timeout: self.default_timeout,
        }
    }
}
