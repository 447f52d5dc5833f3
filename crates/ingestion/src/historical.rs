//! Historical providers
//!
//! Whole-table reads of pre-existing records. Known columns are kept, unknown
//! columns are ignored and rows without a `source` column are tagged `csv`.

use std::path::{Path, PathBuf};

use contracts::{Column, ContractError, HistoricalProvider, MergedRow, SourceTag, Table};
use tracing::{debug, instrument, warn};

/// Parse historical CSV text into a table
///
/// # Errors
/// Malformed CSV or a missing `city` column.
pub fn parse_historical_csv(content: &str) -> Result<Table, String> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers = reader.headers().map_err(|e| e.to_string())?.clone();
    let mapping: Vec<Option<Column>> = headers.iter().map(Column::from_name).collect();

    let location_index = mapping
        .iter()
        .position(|column| *column == Some(Column::Location))
        .ok_or_else(|| format!("missing '{}' column", Column::Location))?;

    let ignored: Vec<&str> = headers
        .iter()
        .zip(&mapping)
        .filter(|(_, column)| column.is_none())
        .map(|(name, _)| name)
        .collect();
    if !ignored.is_empty() {
        debug!(columns = ?ignored, "ignoring unknown historical columns");
    }

    let has_source = mapping.contains(&Some(Column::Source));
    let mut table = Table::with_columns(mapping.iter().flatten().copied());
    table.add_column(Column::Source);

    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|e| e.to_string())?;
        let location = record.get(location_index).unwrap_or_default();
        if location.is_empty() {
            warn!(line = line + 2, "skipping historical row without a location");
            continue;
        }

        let mut row = MergedRow::new(location);
        for (value, column) in record.iter().zip(&mapping) {
            match column {
                Some(Column::Location) | None => {}
                Some(column) => row.set_cell(*column, value),
            }
        }
        if !has_source {
            row.source = Some(SourceTag::Historical.provenance().to_string());
        }
        table.push(row);
    }

    Ok(table)
}

/// CSV file of historical records
#[derive(Debug, Clone)]
pub struct CsvHistoricalProvider {
    path: PathBuf,
    name: String,
}

impl CsvHistoricalProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = format!("csv:{}", path.display());
        Self { path, name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoricalProvider for CsvHistoricalProvider {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "historical_csv_read", skip(self), fields(path = %self.path.display()))]
    async fn read_all(&self) -> Result<Table, ContractError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| ContractError::historical_read(&self.name, e.to_string()))?;

        let table = parse_historical_csv(&content)
            .map_err(|message| ContractError::historical_read(&self.name, message))?;
        debug!(rows = table.len(), "historical table read");
        Ok(table)
    }
}

/// Provider with no records
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyHistorical;

impl HistoricalProvider for EmptyHistorical {
    fn name(&self) -> &str {
        "empty"
    }

    async fn read_all(&self) -> Result<Table, ContractError> {
        Ok(Table::empty())
    }
}

/// Historical provider selected from configuration
#[derive(Debug, Clone)]
pub enum HistoricalSource {
    Csv(CsvHistoricalProvider),
    Empty(EmptyHistorical),
}

impl HistoricalSource {
    pub fn csv(path: impl Into<PathBuf>) -> Self {
        Self::Csv(CsvHistoricalProvider::new(path))
    }

    pub fn empty() -> Self {
        Self::Empty(EmptyHistorical)
    }
}

impl HistoricalProvider for HistoricalSource {
    fn name(&self) -> &str {
        match self {
            Self::Csv(provider) => provider.name(),
            Self::Empty(provider) => provider.name(),
        }
    }

    async fn read_all(&self) -> Result<Table, ContractError> {
        match self {
            Self::Csv(provider) => provider.read_all().await,
            Self::Empty(provider) => provider.read_all().await,
        }
    }
}
