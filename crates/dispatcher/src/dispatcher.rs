//! Dispatcher - concurrent fan-out of the final table to every sink

use std::sync::Arc;

use tracing::{info, instrument, warn};

use contracts::{DataSink, RetryPolicy, SinkConfig, SinkType, Table};

use crate::error::DispatcherError;
use crate::handle::{DeliveryOutcome, SinkDelivery, SinkHandle};
use crate::metrics::MetricsSnapshot;
use crate::sinks::{ConsoleSink, CsvFileSink, LogSink};

/// Per-sink results of one dispatch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub deliveries: Vec<SinkDelivery>,
}

impl DispatchReport {
    pub fn delivered(&self) -> usize {
        self.deliveries
            .iter()
            .filter(|d| d.outcome.is_delivered())
            .count()
    }

    /// Sinks whose delivery did not succeed (exhausted or aborted)
    pub fn failed(&self) -> usize {
        self.deliveries.len() - self.delivered()
    }

    pub fn outcome(&self, sink: &str) -> Option<&DeliveryOutcome> {
        self.deliveries
            .iter()
            .find(|d| d.sink == sink)
            .map(|d| &d.outcome)
    }
}

/// Create a SinkHandle from configuration
#[instrument(
    name = "dispatcher_create_sink_handle",
    skip(config),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
pub fn create_sink_handle(
    config: &SinkConfig,
    retry: RetryPolicy,
) -> Result<SinkHandle, DispatcherError> {
    match config.sink_type {
        SinkType::Log => Ok(SinkHandle::spawn(LogSink::new(&config.name), retry)),
        SinkType::Console => {
            let sink = ConsoleSink::from_params(&config.name, &config.params)
                .map_err(|e| DispatcherError::sink_creation(&config.name, e))?;
            Ok(SinkHandle::spawn(sink, retry))
        }
        SinkType::Csv => {
            let sink = CsvFileSink::from_params(&config.name, &config.params)
                .map_err(|e| DispatcherError::sink_creation(&config.name, e))?;
            Ok(SinkHandle::spawn(sink, retry))
        }
    }
}

/// Fans the final table out to every sink
pub struct Dispatcher {
    handles: Vec<SinkHandle>,
}

impl Dispatcher {
    /// Create a dispatcher with custom sink handles (for testing)
    pub fn with_handles(handles: Vec<SinkHandle>) -> Self {
        Self { handles }
    }

    /// Add a sink with its own retry policy
    pub fn add_sink<S: DataSink + Send + 'static>(&mut self, sink: S, retry: RetryPolicy) {
        self.handles.push(SinkHandle::spawn(sink, retry));
    }

    pub fn sink_names(&self) -> Vec<String> {
        self.handles.iter().map(|h| h.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Get metrics for all sinks
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.handles
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().snapshot()))
            .collect()
    }

    /// Hand the table to every sink, then wait for every retry sequence to end
    ///
    /// Sinks write concurrently. Failures are contained per sink and only
    /// show up in the report.
    #[instrument(name = "dispatcher_dispatch", skip_all, fields(sinks = self.handles.len(), rows = table.len()))]
    pub async fn dispatch(&self, table: Table) -> DispatchReport {
        let table = Arc::new(table);

        let mut pending = Vec::with_capacity(self.handles.len());
        for handle in &self.handles {
            pending.push(handle.submit(Arc::clone(&table)).await);
        }

        let mut report = DispatchReport::default();
        for delivery in pending {
            report.deliveries.push(delivery.wait().await);
        }

        if report.failed() > 0 {
            warn!(
                delivered = report.delivered(),
                failed = report.failed(),
                "Dispatch finished with failed sinks"
            );
        } else {
            info!(delivered = report.delivered(), "Dispatch finished");
        }
        report
    }

    /// Stop every worker and close its sink
    #[instrument(name = "dispatcher_shutdown", skip(self))]
    pub async fn shutdown(self) {
        for handle in self.handles {
            handle.shutdown().await;
        }
        info!("Dispatcher shutdown complete");
    }
}

/// Build a dispatcher from sink configs
///
/// Sinks without their own retry policy use `default_retry`.
#[instrument(name = "dispatcher_create", skip(sink_configs), fields(sink_count = sink_configs.len()))]
pub fn create_dispatcher(
    sink_configs: &[SinkConfig],
    default_retry: RetryPolicy,
) -> Result<Dispatcher, DispatcherError> {
    let mut handles = Vec::with_capacity(sink_configs.len());
    for config in sink_configs {
        let retry = config.retry.unwrap_or(default_retry);
        handles.push(create_sink_handle(config, retry)?);
    }
    Ok(Dispatcher::with_handles(handles))
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ContractError, MergedRow};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct CountingSink {
        name: String,
        writes: Arc<AtomicU32>,
        fail: bool,
    }

    impl DataSink for CountingSink {
        fn name(&self) -> &str {
            &self.name
        }

        async fn write(&mut self, _table: &Table) -> Result<(), ContractError> {
            if self.fail {
                return Err(ContractError::sink_write(&self.name, "permission denied"));
            }
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    fn counting(name: &str, fail: bool) -> (CountingSink, Arc<AtomicU32>) {
        let writes = Arc::new(AtomicU32::new(0));
        let sink = CountingSink {
            name: name.to_string(),
            writes: Arc::clone(&writes),
            fail,
        };
        (sink, writes)
    }

    fn fast(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::from_millis(1))
    }

    fn table() -> Table {
        let mut table = Table::with_columns(contracts::Column::WEATHER);
        table.push(MergedRow::new("A"));
        table
    }

    #[tokio::test]
    async fn test_sink_isolation() {
        let (good_a, writes_a) = counting("good_a", false);
        let (bad, writes_bad) = counting("bad", true);
        let (good_b, writes_b) = counting("good_b", false);

        let mut dispatcher = Dispatcher::with_handles(Vec::new());
        dispatcher.add_sink(good_a, fast(3));
        dispatcher.add_sink(bad, fast(3));
        dispatcher.add_sink(good_b, fast(3));

        let report = dispatcher.dispatch(table()).await;

        assert_eq!(report.delivered(), 2);
        assert_eq!(report.failed(), 1);
        assert!(matches!(
            report.outcome("bad"),
            Some(DeliveryOutcome::Exhausted { attempts: 3, .. })
        ));

        let metrics: HashMap<String, MetricsSnapshot> = dispatcher.metrics().into_iter().collect();
        assert_eq!(metrics["bad"].failure_count, 3);
        assert_eq!(metrics["bad"].exhausted_count, 1);
        assert_eq!(metrics["good_a"].write_count, 1);

        dispatcher.shutdown().await;
        assert_eq!(writes_a.load(Ordering::SeqCst), 1);
        assert_eq!(writes_b.load(Ordering::SeqCst), 1);
        assert_eq!(writes_bad.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dispatch_without_sinks() {
        let dispatcher = Dispatcher::with_handles(Vec::new());
        let report = dispatcher.dispatch(table()).await;
        assert!(report.deliveries.is_empty());
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_create_dispatcher_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        let mut csv = SinkConfig {
            name: "csv".to_string(),
            sink_type: SinkType::Csv,
            retry: Some(fast(1)),
            params: HashMap::new(),
        };
        csv.params
            .insert("path".to_string(), path.display().to_string());
        let log = SinkConfig {
            name: "test_log".to_string(),
            sink_type: SinkType::Log,
            retry: None,
            params: HashMap::new(),
        };

        let dispatcher = create_dispatcher(&[csv, log], fast(2)).unwrap();
        assert_eq!(dispatcher.sink_names(), ["csv", "test_log"]);

        let report = dispatcher.dispatch(table()).await;
        assert_eq!(report.delivered(), 2);
        dispatcher.shutdown().await;

        let written = std::fs::read_to_string(path).unwrap();
        assert!(written.starts_with("city,"));
    }

    #[tokio::test]
    async fn test_invalid_sink_params_fail_creation() {
        let mut params = HashMap::new();
        params.insert("layout".to_string(), "sideways".to_string());
        let config = SinkConfig {
            name: "csv".to_string(),
            sink_type: SinkType::Csv,
            retry: None,
            params,
        };
        let result = create_dispatcher(&[config], fast(1));
        assert!(matches!(result, Err(DispatcherError::SinkCreation { .. })));
    }
}
