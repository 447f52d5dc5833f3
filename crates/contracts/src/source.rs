//! FetchSource / HistoricalProvider traits - Ingestion input interfaces
//!
//! Concrete HTTP providers, mocks and the historical CSV reader all implement
//! these; the orchestration core only ever sees the traits.

use crate::{ContractError, FetchReply, SourceTag, Table};

/// Per-location measurement source
///
/// Calls must be idempotent: the retry wrapper may repeat them.
#[trait_variant::make(FetchSource: Send)]
pub trait LocalFetchSource {
    /// Feed this source produces records for
    fn tag(&self) -> SourceTag;

    /// Fetch one location
    ///
    /// # Returns
    /// - `Ok(FetchReply::Complete)` for a full response
    /// - `Ok(FetchReply::Degraded)` when the provider answered unsuccessfully
    ///
    /// # Errors
    /// Returns an error when the call itself raised (transport, decode, ...)
    async fn fetch(&self, location: &str) -> Result<FetchReply, ContractError>;
}

/// Whole-table provider of pre-existing records
#[trait_variant::make(HistoricalProvider: Send)]
pub trait LocalHistoricalProvider {
    /// Provider name (used for logging)
    fn name(&self) -> &str;

    /// Read every record
    async fn read_all(&self) -> Result<Table, ContractError>;
}
