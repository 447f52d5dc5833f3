//! CsvFileSink - writes the table to a CSV file

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use contracts::{ContractError, DataSink, Table};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

use super::layout_columns;

/// Which columns end up in the file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CsvLayout {
    /// Every present column, canonical order
    #[default]
    Full,
    /// Report projection only
    Report,
}

impl FromStr for CsvLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "report" => Ok(Self::Report),
            other => Err(format!("unknown layout '{other}' (expected full | report)")),
        }
    }
}

/// Append to an existing file or replace it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    #[default]
    Append,
    Overwrite,
}

impl FromStr for WriteMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "append" => Ok(Self::Append),
            "overwrite" => Ok(Self::Overwrite),
            other => Err(format!("unknown mode '{other}' (expected append | overwrite)")),
        }
    }
}

/// Sink that writes the table to a CSV file
///
/// In append mode the header is written only when the file does not exist yet.
#[derive(Debug, Clone)]
pub struct CsvFileSink {
    name: String,
    path: PathBuf,
    layout: CsvLayout,
    mode: WriteMode,
}

impl CsvFileSink {
    pub const DEFAULT_PATH: &'static str = "transformed_output.csv";

    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            layout: CsvLayout::default(),
            mode: WriteMode::default(),
        }
    }

    pub fn with_layout(mut self, layout: CsvLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_mode(mut self, mode: WriteMode) -> Self {
        self.mode = mode;
        self
    }

    /// Create from params map (`path`, `layout`, `mode`)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, String> {
        let path = params
            .get("path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(Self::DEFAULT_PATH));
        let layout = params
            .get("layout")
            .map(|v| v.parse())
            .transpose()?
            .unwrap_or_default();
        let mode = params
            .get("mode")
            .map(|v| v.parse())
            .transpose()?
            .unwrap_or_default();

        Ok(Self::new(name, path).with_layout(layout).with_mode(mode))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Render the table as CSV bytes
    pub fn render(&self, table: &Table, include_header: bool) -> Result<Vec<u8>, ContractError> {
        let columns = layout_columns(table, self.layout);
        let to_err = |e: ::csv::Error| ContractError::sink_write(&self.name, e.to_string());

        let mut writer = ::csv::Writer::from_writer(Vec::new());
        if include_header {
            writer
                .write_record(columns.iter().map(|c| c.name()))
                .map_err(to_err)?;
        }
        for row in table.rows() {
            writer
                .write_record(columns.iter().map(|c| row.cell(*c).unwrap_or_default()))
                .map_err(to_err)?;
        }
        writer
            .into_inner()
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))
    }

    fn io_error(&self, e: std::io::Error) -> ContractError {
        ContractError::sink_write(
            &self.name,
            format!("{}: {e}", self.path.display()),
        )
    }
}

impl DataSink for CsvFileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "csv_sink_write",
        skip(self, table),
        fields(sink = %self.name, path = %self.path.display(), rows = table.len())
    )]
    async fn write(&mut self, table: &Table) -> Result<(), ContractError> {
        if table.columns().next().is_none() {
            debug!(sink = %self.name, "Table has no columns, nothing to write");
            return Ok(());
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        let exists = fs::try_exists(&self.path).await.unwrap_or(false);
        let include_header = self.mode == WriteMode::Overwrite || !exists;
        let bytes = self.render(table, include_header)?;

        let mut options = OpenOptions::new();
        match self.mode {
            WriteMode::Append => options.create(true).append(true),
            WriteMode::Overwrite => options.create(true).write(true).truncate(true),
        };
        let mut file = options.open(&self.path).await.map_err(|e| self.io_error(e))?;
        file.write_all(&bytes).await.map_err(|e| self.io_error(e))?;
        file.flush().await.map_err(|e| self.io_error(e))?;

        info!(sink = %self.name, rows = table.len(), "Wrote table to {}", self.path.display());
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Column, MergedRow};

    fn table() -> Table {
        let mut table = Table::with_columns([
            Column::Location,
            Column::TempCelsius,
            Column::Aqi,
            Column::Source,
        ]);
        let mut a = MergedRow::new("London");
        a.temp_celsius = Some(26.85);
        a.source = Some("api".into());
        table.push(a);
        table
    }

    #[tokio::test]
    async fn test_append_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let mut sink = CsvFileSink::new("csv", &path);

        sink.write(&table()).await.unwrap();
        sink.write(&table()).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "city,aqi,temp_celsius,source\nLondon,,26.85,api\nLondon,,26.85,api\n"
        );
    }

    #[tokio::test]
    async fn test_overwrite_report_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("report.csv");
        let mut sink = CsvFileSink::new("csv", &path)
            .with_layout(CsvLayout::Report)
            .with_mode(WriteMode::Overwrite);

        sink.write(&table()).await.unwrap();
        sink.write(&table()).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "city,temp_celsius,aqi,source\nLondon,26.85,,api\n");
    }

    #[tokio::test]
    async fn test_empty_schema_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        let mut sink = CsvFileSink::new("csv", &path);
        sink.write(&Table::empty()).await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_unwritable_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        // a directory cannot be opened as a file
        let mut sink = CsvFileSink::new("csv", dir.path());
        let result = sink.write(&table()).await;
        assert!(matches!(result, Err(ContractError::SinkWrite { .. })));
    }

    #[test]
    fn test_from_params() {
        let mut params = HashMap::new();
        params.insert("path".to_string(), "x.csv".to_string());
        params.insert("layout".to_string(), "Report".to_string());
        let sink = CsvFileSink::from_params("csv", &params).unwrap();
        assert_eq!(sink.path(), Path::new("x.csv"));
        assert_eq!(sink.layout, CsvLayout::Report);
        assert_eq!(sink.mode, WriteMode::Append);

        params.insert("mode".to_string(), "sometimes".to_string());
        assert!(CsvFileSink::from_params("csv", &params).is_err());
    }
}
