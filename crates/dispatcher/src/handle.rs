//! SinkHandle - manages a sink with isolated queue and retrying worker task

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};

use contracts::{DataSink, RetryPolicy, Table};

use crate::metrics::SinkMetrics;

/// Tables a worker can hold before `deliver` waits
const QUEUE_CAPACITY: usize = 4;

/// How one delivery to one sink ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Written on attempt `attempts`
    Delivered { attempts: u32 },
    /// Every attempt failed
    Exhausted { attempts: u32, last_error: String },
    /// The worker stopped before reporting (panicked or closed)
    Aborted { reason: String },
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

impl std::fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Delivered { attempts } => write!(f, "delivered (attempt {attempts})"),
            Self::Exhausted {
                attempts,
                last_error,
            } => write!(f, "failed after {attempts} attempts: {last_error}"),
            Self::Aborted { reason } => write!(f, "aborted: {reason}"),
        }
    }
}

/// Result of one delivery, per sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkDelivery {
    pub sink: String,
    pub outcome: DeliveryOutcome,
}

struct Delivery {
    table: Arc<Table>,
    done: oneshot::Sender<DeliveryOutcome>,
}

/// A queued delivery whose outcome has not been collected yet
pub struct PendingDelivery {
    sink: String,
    receipt: Option<oneshot::Receiver<DeliveryOutcome>>,
}

impl PendingDelivery {
    pub fn sink(&self) -> &str {
        &self.sink
    }

    /// Wait until the sink's retry sequence has finished
    pub async fn wait(self) -> SinkDelivery {
        let outcome = match self.receipt {
            None => DeliveryOutcome::Aborted {
                reason: "sink worker closed".to_string(),
            },
            Some(receipt) => match receipt.await {
                Ok(outcome) => outcome,
                Err(_) => {
                    error!(sink = %self.sink, "Sink worker stopped before reporting");
                    DeliveryOutcome::Aborted {
                        reason: "sink worker stopped before reporting".to_string(),
                    }
                }
            },
        };
        SinkDelivery {
            sink: self.sink,
            outcome,
        }
    }
}

/// Handle to a running sink worker
pub struct SinkHandle {
    /// Sink name
    name: String,
    /// Channel to send tables to worker
    tx: mpsc::Sender<Delivery>,
    /// Shared metrics
    metrics: Arc<SinkMetrics>,
    retry: RetryPolicy,
    /// Worker task handle
    worker_handle: JoinHandle<()>,
}

impl SinkHandle {
    /// Create a new SinkHandle and spawn the worker task
    pub fn spawn<S: DataSink + Send + 'static>(sink: S, retry: RetryPolicy) -> Self {
        let name = sink.name().to_string();
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let metrics = Arc::new(SinkMetrics::new());

        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.clone();

        let worker_handle = tokio::spawn(async move {
            sink_worker(sink, rx, retry, worker_metrics, worker_name).await;
        });

        Self {
            name,
            tx,
            metrics,
            retry,
            worker_handle,
        }
    }

    /// Get sink name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Queue a table for this sink without waiting for the write
    pub async fn submit(&self, table: Arc<Table>) -> PendingDelivery {
        let (done, receipt) = oneshot::channel();
        let receipt = match self.tx.send(Delivery { table, done }).await {
            Ok(()) => Some(receipt),
            Err(_) => {
                error!(sink = %self.name, "Sink worker closed unexpectedly");
                None
            }
        };
        PendingDelivery {
            sink: self.name.clone(),
            receipt,
        }
    }

    /// Queue a table for this sink and wait for its retry sequence to finish
    pub async fn deliver(&self, table: Arc<Table>) -> DeliveryOutcome {
        self.submit(table).await.wait().await.outcome
    }

    /// Shutdown the sink worker gracefully
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) {
        // Drop sender to signal worker to stop
        drop(self.tx);
        // Wait for worker to finish
        if let Err(e) = self.worker_handle.await {
            error!(sink = %self.name, error = ?e, "Worker task panicked");
        }
        debug!(sink = %self.name, "SinkHandle shutdown complete");
    }
}

/// Worker task that consumes tables and writes them with retry
#[instrument(
    name = "sink_worker_loop",
    skip(sink, rx, retry, metrics),
    fields(sink = %name)
)]
async fn sink_worker<S: DataSink>(
    mut sink: S,
    mut rx: mpsc::Receiver<Delivery>,
    retry: RetryPolicy,
    metrics: Arc<SinkMetrics>,
    name: String,
) {
    debug!(sink = %name, "Sink worker started");

    while let Some(delivery) = rx.recv().await {
        let outcome = write_with_retry(&mut sink, &delivery.table, &retry, &metrics, &name).await;
        // The dispatcher may have stopped waiting; the outcome is already logged
        let _ = delivery.done.send(outcome);
    }

    // Cleanup
    if let Err(e) = sink.close().await {
        error!(sink = %name, error = %e, "Close failed on shutdown");
    }

    debug!(sink = %name, "Sink worker stopped");
}

/// Up to `retry.attempts` writes, fixed delay between failed attempts
async fn write_with_retry<S: DataSink>(
    sink: &mut S,
    table: &Table,
    retry: &RetryPolicy,
    metrics: &SinkMetrics,
    name: &str,
) -> DeliveryOutcome {
    let attempts = retry.attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        metrics.inc_attempt_count();
        match sink.write(table).await {
            Ok(()) => {
                metrics.inc_write_count();
                ::metrics::counter!("atmos_sink_writes_total", "sink" => name.to_string())
                    .increment(1);
                info!(sink = %name, attempt, rows = table.len(), "Sink write succeeded");
                return DeliveryOutcome::Delivered { attempts: attempt };
            }
            Err(e) => {
                metrics.inc_failure_count();
                ::metrics::counter!("atmos_sink_write_failures_total", "sink" => name.to_string())
                    .increment(1);
                error!(
                    sink = %name,
                    attempt,
                    max_attempts = attempts,
                    error = %e,
                    "Sink write failed"
                );
                last_error = e.to_string();
                if attempt < attempts {
                    tokio::time::sleep(retry.delay()).await;
                }
            }
        }
    }

    metrics.inc_exhausted_count();
    error!(sink = %name, attempts, error = %last_error, "All retries failed for sink");
    DeliveryOutcome::Exhausted {
        attempts,
        last_error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::ContractError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Mock sink for testing
    struct MockSink {
        name: String,
        writes: Arc<AtomicU32>,
        failures_before_success: u32,
        calls: u32,
    }

    impl MockSink {
        fn new(name: &str, failures_before_success: u32) -> (Self, Arc<AtomicU32>) {
            let writes = Arc::new(AtomicU32::new(0));
            let sink = Self {
                name: name.to_string(),
                writes: Arc::clone(&writes),
                failures_before_success,
                calls: 0,
            };
            (sink, writes)
        }
    }

    impl DataSink for MockSink {
        fn name(&self) -> &str {
            &self.name
        }

        async fn write(&mut self, _table: &Table) -> Result<(), ContractError> {
            self.calls += 1;
            if self.calls <= self.failures_before_success {
                return Err(ContractError::sink_write(&self.name, "mock failure"));
            }
            self.writes.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    fn fast(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_sink_handle_basic() {
        let (sink, writes) = MockSink::new("test", 0);
        let handle = SinkHandle::spawn(sink, fast(3));

        let table = Arc::new(Table::empty());
        for _ in 0..3 {
            let outcome = handle.deliver(Arc::clone(&table)).await;
            assert_eq!(outcome, DeliveryOutcome::Delivered { attempts: 1 });
        }

        handle.shutdown().await;
        assert_eq!(writes.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn test_retry_until_success() {
        let (sink, writes) = MockSink::new("flaky", 2);
        let handle = SinkHandle::spawn(sink, fast(3));

        let outcome = handle.deliver(Arc::new(Table::empty())).await;
        assert_eq!(outcome, DeliveryOutcome::Delivered { attempts: 3 });

        let snapshot = handle.metrics().snapshot();
        assert_eq!(snapshot.attempt_count, 3);
        assert_eq!(snapshot.failure_count, 2);
        assert_eq!(snapshot.write_count, 1);
        assert_eq!(snapshot.exhausted_count, 0);

        handle.shutdown().await;
        assert_eq!(writes.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_after_exactly_r_attempts() {
        let (sink, writes) = MockSink::new("failing", u32::MAX);
        let handle = SinkHandle::spawn(sink, fast(3));

        let outcome = handle.deliver(Arc::new(Table::empty())).await;
        match outcome {
            DeliveryOutcome::Exhausted {
                attempts,
                last_error,
            } => {
                assert_eq!(attempts, 3);
                assert!(last_error.contains("mock failure"));
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
        assert_eq!(handle.metrics().failure_count(), 3);
        assert_eq!(handle.metrics().exhausted_count(), 1);

        handle.shutdown().await;
        assert_eq!(writes.load(Ordering::Relaxed), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_delay_between_attempts() {
        let (sink, _) = MockSink::new("slow_fail", u32::MAX);
        let handle = SinkHandle::spawn(sink, RetryPolicy::new(3, Duration::from_secs(2)));

        let started = tokio::time::Instant::now();
        handle.deliver(Arc::new(Table::empty())).await;
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(4), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(6), "elapsed {elapsed:?}");

        handle.shutdown().await;
    }
}
