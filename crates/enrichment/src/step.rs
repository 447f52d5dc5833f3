//! TransformStep trait

use contracts::{Column, Table};

use crate::error::StepError;

/// One enrichment step: a pure function from table to table
pub trait TransformStep: Send + Sync {
    /// Stable registry name
    fn name(&self) -> &str;

    /// Columns the input table must carry
    fn required_columns(&self) -> &[Column] {
        &[]
    }

    /// Step body; called only when every required column is present
    fn transform(&self, table: Table) -> Result<Table, StepError>;

    /// Check required columns, then transform
    fn apply(&self, table: Table) -> Result<Table, StepError> {
        if let Some(column) = self
            .required_columns()
            .iter()
            .find(|column| !table.has_column(**column))
        {
            return Err(StepError::MissingColumn {
                step: self.name().to_string(),
                column: *column,
            });
        }
        self.transform(table)
    }
}

/// Step backed by a closure
pub struct FnStep<F> {
    name: String,
    required: Vec<Column>,
    f: F,
}

impl<F> FnStep<F>
where
    F: Fn(Table) -> Result<Table, StepError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, required: impl IntoIterator<Item = Column>, f: F) -> Self {
        Self {
            name: name.into(),
            required: required.into_iter().collect(),
            f,
        }
    }
}

impl<F> TransformStep for FnStep<F>
where
    F: Fn(Table) -> Result<Table, StepError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn required_columns(&self) -> &[Column] {
        &self.required
    }

    fn transform(&self, table: Table) -> Result<Table, StepError> {
        (self.f)(table)
    }
}
