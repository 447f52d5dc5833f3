//! Concurrency gate
//!
//! Counting admission control shared by every fetch of a run. A permit is held
//! for the whole retried call; dropping it is the release.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{IngestionError, Result};

#[derive(Debug, Default)]
struct GateCounters {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

/// Bounds the number of in-flight fetches across all sources and locations
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    counters: Arc<GateCounters>,
}

impl ConcurrencyGate {
    /// Create a gate admitting at most `capacity` operations (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            counters: Arc::new(GateCounters::default()),
        }
    }

    /// Wait until fewer than `capacity` operations are admitted
    ///
    /// Waiters are served in FIFO order (tokio semaphore fairness).
    pub async fn acquire(&self) -> Result<GatePermit> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| IngestionError::GateClosed)?;

        let now = self.counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.peak.fetch_max(now, Ordering::SeqCst);
        metrics::gauge!("atmos_fetch_in_flight").set(now as f64);

        Ok(GatePermit {
            _permit: permit,
            counters: self.counters.clone(),
        })
    }

    /// Currently admitted operations
    pub fn in_flight(&self) -> usize {
        self.counters.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously admitted operations seen so far
    pub fn peak(&self) -> usize {
        self.counters.peak.load(Ordering::SeqCst)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Admission ticket; released on drop
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
    counters: Arc<GateCounters>,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        let now = self.counters.in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::gauge!("atmos_fetch_in_flight").set(now as f64);
    }
}
