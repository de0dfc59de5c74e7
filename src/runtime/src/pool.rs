//! TransferPool: process-wide single-flight coordination for layer transfers.
//!
//! Loaders and pullers that are about to ingest a layer first ask the pool
//! for admission on a key such as `layer:<id>`. The first caller is admitted
//! and holds a [`PoolGuard`]; anyone arriving while the guard is alive gets a
//! [`Waiter`] that resolves once the holder is done, whatever the outcome.
//!
//! # Usage
//!
//! ```ignore
//! match pool.admit(PoolKind::Pull, &format!("layer:{id}")) {
//!     Admission::Admitted(guard) => { /* do the work; dropping guard wakes waiters */ }
//!     Admission::InFlight(waiter) => waiter.wait().await,
//!     Admission::Failed(e) => return Err(e),
//! }
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use imgstore_core::error::StoreError;
use tokio::sync::watch;

/// Kind of transfer holding a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolKind {
    /// Ingesting a layer into the store (pull or load)
    Pull,
    /// Sending a layer out of the store
    Push,
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pull => write!(f, "pull"),
            Self::Push => write!(f, "push"),
        }
    }
}

/// Outcome of asking the pool for a key.
#[derive(Debug)]
pub enum Admission {
    /// The caller owns the key until the guard is dropped.
    Admitted(PoolGuard),
    /// Another worker owns the key; wait for it instead of duplicating work.
    InFlight(Waiter),
    /// The pool refused the request.
    Failed(StoreError),
}

/// Statistics about the pool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Keys currently held.
    pub in_flight: usize,
    /// Total number of admissions granted.
    pub total_admitted: u64,
    /// Total number of callers handed a waiter.
    pub total_waited: u64,
}

struct Flight {
    kind: PoolKind,
    done: watch::Receiver<bool>,
}

struct PoolInner {
    flights: DashMap<String, Flight>,
    draining: AtomicBool,
    total_admitted: AtomicU64,
    total_waited: AtomicU64,
}

/// Single-flight pool shared by every transfer in the process.
#[derive(Clone)]
pub struct TransferPool {
    inner: Arc<PoolInner>,
}

impl TransferPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(PoolInner {
                flights: DashMap::new(),
                draining: AtomicBool::new(false),
                total_admitted: AtomicU64::new(0),
                total_waited: AtomicU64::new(0),
            }),
        }
    }

    /// Ask for exclusive ownership of `key`.
    ///
    /// A key held by a transfer of either kind yields a waiter: a push and a
    /// pull of the same layer must not overlap either.
    pub fn admit(&self, kind: PoolKind, key: &str) -> Admission {
        if self.inner.draining.load(Ordering::SeqCst) {
            return Admission::Failed(StoreError::Coordination(format!(
                "{} {} refused: transfer pool is draining",
                kind, key
            )));
        }

        match self.inner.flights.entry(key.to_string()) {
            Entry::Occupied(entry) => {
                let flight = entry.get();
                self.inner.total_waited.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    key = %key,
                    held_by = %flight.kind,
                    "Transfer already in progress, waiting"
                );
                Admission::InFlight(Waiter {
                    done: flight.done.clone(),
                })
            }
            Entry::Vacant(entry) => {
                let (tx, rx) = watch::channel(false);
                entry.insert(Flight { kind, done: rx });
                self.inner.total_admitted.fetch_add(1, Ordering::Relaxed);
                Admission::Admitted(PoolGuard {
                    inner: Arc::clone(&self.inner),
                    kind,
                    key: key.to_string(),
                    done: tx,
                })
            }
        }
    }

    /// Whether `key` is currently held by a transfer of `kind`.
    pub fn is_in_flight(&self, kind: PoolKind, key: &str) -> bool {
        self.inner
            .flights
            .get(key)
            .map(|flight| flight.kind == kind)
            .unwrap_or(false)
    }

    /// Current pool statistics.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            in_flight: self.inner.flights.len(),
            total_admitted: self.inner.total_admitted.load(Ordering::Relaxed),
            total_waited: self.inner.total_waited.load(Ordering::Relaxed),
        }
    }

    /// Refuse new admissions and wait for all in-flight transfers to finish.
    pub async fn drain(&self) {
        self.inner.draining.store(true, Ordering::SeqCst);

        loop {
            let waiters: Vec<Waiter> = self
                .inner
                .flights
                .iter()
                .map(|flight| Waiter {
                    done: flight.done.clone(),
                })
                .collect();
            if waiters.is_empty() {
                break;
            }
            tracing::info!(in_flight = waiters.len(), "Draining transfer pool");
            for waiter in waiters {
                waiter.wait().await;
            }
        }
    }
}

impl Default for TransferPool {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TransferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferPool")
            .field("stats", &self.stats())
            .finish()
    }
}

/// Ownership of a pool key. Dropping it releases the key and wakes waiters.
pub struct PoolGuard {
    inner: Arc<PoolInner>,
    kind: PoolKind,
    key: String,
    done: watch::Sender<bool>,
}

impl PoolGuard {
    /// Key held by this guard.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Release the key now instead of at end of scope.
    pub fn release(self) {}
}

impl Drop for PoolGuard {
    fn drop(&mut self) {
        self.inner.flights.remove(&self.key);
        let _ = self.done.send(true);
        tracing::trace!(key = %self.key, kind = %self.kind, "Released transfer key");
    }
}

impl fmt::Debug for PoolGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolGuard")
            .field("kind", &self.kind)
            .field("key", &self.key)
            .finish()
    }
}

/// Handle on another worker's transfer.
#[derive(Debug)]
pub struct Waiter {
    done: watch::Receiver<bool>,
}

impl Waiter {
    /// Resolve once the holder of the key has released it.
    pub async fn wait(mut self) {
        loop {
            let finished = *self.done.borrow_and_update();
            if finished || self.done.changed().await.is_err() {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn admitted(admission: Admission) -> PoolGuard {
        match admission {
            Admission::Admitted(guard) => guard,
            other => panic!("expected admission, got {:?}", other),
        }
    }

    fn waiter(admission: Admission) -> Waiter {
        match admission {
            Admission::InFlight(waiter) => waiter,
            other => panic!("expected waiter, got {:?}", other),
        }
    }

    #[test]
    fn test_first_caller_is_admitted() {
        let pool = TransferPool::new();
        let guard = admitted(pool.admit(PoolKind::Pull, "layer:a"));
        assert_eq!(guard.key(), "layer:a");
        assert!(pool.is_in_flight(PoolKind::Pull, "layer:a"));
        assert!(!pool.is_in_flight(PoolKind::Push, "layer:a"));
    }

    #[test]
    fn test_release_frees_key() {
        let pool = TransferPool::new();
        let guard = admitted(pool.admit(PoolKind::Pull, "layer:a"));
        guard.release();
        assert!(!pool.is_in_flight(PoolKind::Pull, "layer:a"));
        let _again = admitted(pool.admit(PoolKind::Pull, "layer:a"));
    }

    #[test]
    fn test_distinct_keys_do_not_conflict() {
        let pool = TransferPool::new();
        let _a = admitted(pool.admit(PoolKind::Pull, "layer:a"));
        let _b = admitted(pool.admit(PoolKind::Pull, "layer:b"));
        assert_eq!(pool.stats().in_flight, 2);
    }

    #[test]
    fn test_push_blocks_pull_of_same_key() {
        let pool = TransferPool::new();
        let _push = admitted(pool.admit(PoolKind::Push, "layer:a"));
        let _waiter = waiter(pool.admit(PoolKind::Pull, "layer:a"));
    }

    #[tokio::test]
    async fn test_waiter_resolves_when_guard_dropped() {
        let pool = TransferPool::new();
        let guard = admitted(pool.admit(PoolKind::Pull, "layer:a"));
        let waiter = waiter(pool.admit(PoolKind::Pull, "layer:a"));

        let handle = tokio::spawn(waiter.wait());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("waiter should resolve")
            .unwrap();
    }

    #[tokio::test]
    async fn test_waiter_after_release_resolves_immediately() {
        let pool = TransferPool::new();
        let guard = admitted(pool.admit(PoolKind::Pull, "layer:a"));
        let waiter = waiter(pool.admit(PoolKind::Pull, "layer:a"));
        drop(guard);

        tokio::time::timeout(Duration::from_secs(5), waiter.wait())
            .await
            .expect("waiter should resolve");
    }

    #[test]
    fn test_stats_count_admissions_and_waits() {
        let pool = TransferPool::new();
        let _guard = admitted(pool.admit(PoolKind::Pull, "layer:a"));
        let _w1 = waiter(pool.admit(PoolKind::Pull, "layer:a"));
        let _w2 = waiter(pool.admit(PoolKind::Push, "layer:a"));

        assert_eq!(
            pool.stats(),
            PoolStats {
                in_flight: 1,
                total_admitted: 1,
                total_waited: 2,
            }
        );
    }

    #[tokio::test]
    async fn test_drain_refuses_new_work_and_waits() {
        let pool = TransferPool::new();
        let guard = admitted(pool.admit(PoolKind::Pull, "layer:a"));

        let draining = pool.clone();
        let handle = tokio::spawn(async move { draining.drain().await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        match pool.admit(PoolKind::Pull, "layer:b") {
            Admission::Failed(StoreError::Coordination(msg)) => {
                assert!(msg.contains("draining"))
            }
            other => panic!("expected refusal, got {:?}", other),
        }
        assert!(!handle.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("drain should finish")
            .unwrap();
        assert_eq!(pool.stats().in_flight, 0);
    }
}
