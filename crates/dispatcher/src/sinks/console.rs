//! ConsoleSink - prints the table to stdout

use std::collections::HashMap;

use contracts::{ContractError, DataSink, Table};
use tokio::io::AsyncWriteExt;
use tracing::instrument;

use super::{layout_columns, CsvLayout};

const ABSENT: &str = "NaN";

/// Sink that prints an aligned text rendering of the table
#[derive(Debug, Clone)]
pub struct ConsoleSink {
    name: String,
    layout: CsvLayout,
}

impl ConsoleSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            layout: CsvLayout::Report,
        }
    }

    pub fn with_layout(mut self, layout: CsvLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Create from params map (`layout`, defaults to report)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, String> {
        let sink = Self::new(name);
        match params.get("layout") {
            Some(layout) => Ok(sink.with_layout(layout.parse()?)),
            None => Ok(sink),
        }
    }

    /// Render the table as left-aligned text columns
    pub fn render(&self, table: &Table) -> String {
        let columns = layout_columns(table, self.layout);
        let cells: Vec<Vec<String>> = table
            .rows()
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|c| row.cell(*c).unwrap_or_else(|| ABSENT.to_string()))
                    .collect()
            })
            .collect();

        let widths: Vec<usize> = columns
            .iter()
            .enumerate()
            .map(|(i, c)| {
                cells
                    .iter()
                    .map(|row| row[i].chars().count())
                    .fold(c.name().len(), usize::max)
            })
            .collect();

        let mut out = String::from("Weather DataFrame:\n");
        if columns.is_empty() {
            out.push_str("Empty DataFrame\n");
            return out;
        }

        let header: Vec<&str> = columns.iter().map(|c| c.name()).collect();
        push_line(&mut out, header.iter().copied(), &widths);
        for row in &cells {
            push_line(&mut out, row.iter().map(String::as_str), &widths);
        }
        out.push_str(&format!("[{} rows x {} columns]\n", cells.len(), columns.len()));
        out
    }
}

fn push_line<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>, widths: &[usize]) {
    let line: Vec<String> = cells
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect();
    out.push_str(line.join("  ").trim_end());
    out.push('\n');
}

impl DataSink for ConsoleSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "console_sink_write", skip(self, table), fields(sink = %self.name))]
    async fn write(&mut self, table: &Table) -> Result<(), ContractError> {
        let text = self.render(table);
        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(text.as_bytes())
            .await
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;
        stdout
            .flush()
            .await
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        Ok(())
    }
}
