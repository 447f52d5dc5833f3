//! LogSink - logs table summary via tracing

use std::collections::BTreeSet;

use contracts::{ContractError, DataSink, Table};
use tracing::{info, instrument};

/// Sink that logs table summaries for debugging
pub struct LogSink {
    name: String,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn log_table_summary(&self, table: &Table) {
        let locations: BTreeSet<&str> = table.rows().iter().map(|r| r.location.as_str()).collect();
        let columns: Vec<&str> = table.columns().map(|c| c.name()).collect();

        info!(
            sink = %self.name,
            rows = table.len(),
            locations = locations.len(),
            columns = %columns.join(","),
            "Table received"
        );
    }
}

impl DataSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, table),
        fields(sink = %self.name, rows = table.len())
    )]
    async fn write(&mut self, table: &Table) -> Result<(), ContractError> {
        self.log_table_summary(table);
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, "LogSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Column, MergedRow};

    #[tokio::test]
    async fn test_log_sink_write() {
        let mut sink = LogSink::new("test_log");
        let mut table = Table::with_columns(Column::WEATHER);
        table.push(MergedRow::new("Paris"));

        assert!(sink.write(&table).await.is_ok());
        assert!(sink.write(&Table::empty()).await.is_ok());
    }

    #[tokio::test]
    async fn test_log_sink_name() {
        let sink = LogSink::new("my_logger");
        assert_eq!(sink.name(), "my_logger");
    }
}
