//! Pipeline orchestrator - coordinates all components for one run.
//!
//! Stage order: fetch barrier → historical read → classify & merge →
//! transform chain → dispatch (second barrier) → sink shutdown.

use std::time::Instant;

use contracts::{HistoricalProvider, Table};
use dispatcher::Dispatcher;
use enrichment::TransformChain;
use ingestion::{ConcurrencyGate, FetchPlan};
use observability::metrics::{
    record_fetch_tally, record_run_completed, record_stage_duration, FetchTally,
};
use reconcile::{read_historical, reconcile};
use tracing::{info, instrument, warn};

use super::{PipelineStats, StageTimings};

const DEFAULT_MAX_CONCURRENCY: usize = 5;

/// One configured run of the pipeline
pub struct Pipeline<H> {
    locations: Vec<String>,
    max_concurrency: usize,
    plan: FetchPlan,
    historical: H,
    chain: TransformChain,
    dispatcher: Dispatcher,
}

impl<H: HistoricalProvider> Pipeline<H> {
    /// Create a pipeline with no locations and the default concurrency bound
    pub fn new(
        plan: FetchPlan,
        historical: H,
        chain: TransformChain,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            locations: Vec::new(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            plan,
            historical,
            chain,
            dispatcher,
        }
    }

    pub fn with_locations<I, S>(mut self, locations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.locations = locations.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn locations(&self) -> &[String] {
        &self.locations
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Run the pipeline to completion
    ///
    /// Never fails: unavailable providers, unreadable history, broken
    /// transforms and failing sinks all end up in the returned stats.
    #[instrument(
        name = "pipeline_run",
        skip(self),
        fields(locations = self.locations.len(), max_concurrency = self.max_concurrency)
    )]
    pub async fn run(self) -> PipelineStats {
        let started = Instant::now();
        let mut timings = StageTimings::default();
        let gate = ConcurrencyGate::new(self.max_concurrency);

        // 1. Fetch every (location, source) pair under the gate; barrier
        info!(
            locations = self.locations.len(),
            lanes = self.plan.len(),
            "Fetching measurements"
        );
        let stage = Instant::now();
        let outcomes = self.plan.execute(&self.locations, &gate).await;
        timings.fetch = stage.elapsed();
        record_stage_duration("fetch", timings.fetch);

        let fetch = FetchTally::from_outcomes(&outcomes);
        record_fetch_tally(&fetch);
        info!(peak_in_flight = gate.peak(), "{fetch}");

        // 2. Historical records
        let stage = Instant::now();
        let historical = read_historical(&self.historical).await;
        let historical_rows = historical.len();
        timings.historical = stage.elapsed();
        record_stage_duration("historical", timings.historical);

        // 3. Classify & merge
        let stage = Instant::now();
        let merged = reconcile(outcomes, historical);
        timings.reconcile = stage.elapsed();
        record_stage_duration("reconcile", timings.reconcile);

        // 4. Transform chain
        let stage = Instant::now();
        let (table, transforms) = self.chain.apply(merged);
        timings.transform = stage.elapsed();
        record_stage_duration("transform", timings.transform);
        if !transforms.is_clean() {
            warn!(
                skipped = transforms.failed.len(),
                "Some transforms were skipped"
            );
        }

        let output_rows = table.len();
        let output_columns = column_names(&table);

        // 5. Dispatch; waits for every sink's retry sequence
        let stage = Instant::now();
        let dispatch = self.dispatcher.dispatch(table).await;
        timings.dispatch = stage.elapsed();
        record_stage_duration("dispatch", timings.dispatch);

        self.dispatcher.shutdown().await;

        record_run_completed(output_rows, dispatch.delivered(), dispatch.failed());

        let stats = PipelineStats {
            locations: self.locations.len(),
            fetch,
            peak_in_flight: gate.peak(),
            historical_rows,
            output_rows,
            output_columns,
            transforms,
            dispatch,
            timings,
            duration: started.elapsed(),
        };

        info!(
            rows = stats.output_rows,
            sinks_delivered = stats.dispatch.delivered(),
            sinks_failed = stats.dispatch.failed(),
            duration_secs = stats.duration.as_secs_f64(),
            "Pipeline run finished"
        );
        stats
    }
}

fn column_names(table: &Table) -> Vec<String> {
    table.columns().map(|c| c.name().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::SourceTag;
    use enrichment::TransformRegistry;
    use ingestion::{EmptyHistorical, FetchPolicy, MockBehavior, MockSource};

    #[tokio::test]
    async fn test_run_with_no_sinks() {
        let plan = FetchPlan::new().lane(
            MockSource::new(SourceTag::Weather).with_default(MockBehavior::weather(300.0, 50.0)),
            FetchPolicy::for_tag(SourceTag::Weather),
        );
        let chain = TransformRegistry::standard().standard_chain().unwrap();

        let stats = Pipeline::new(plan, EmptyHistorical, chain, Dispatcher::with_handles(vec![]))
            .with_locations(["London", "Paris"])
            .with_max_concurrency(1)
            .run()
            .await;

        assert_eq!(stats.locations, 2);
        assert_eq!(stats.fetch.lane(SourceTag::Weather).success, 2);
        assert_eq!(stats.peak_in_flight, 1);
        assert_eq!(stats.output_rows, 2);
        assert!(stats.output_columns.contains(&"temp_celsius".to_string()));
        assert!(stats.dispatch.deliveries.is_empty());
    }

    #[tokio::test]
    async fn test_run_with_no_locations() {
        let stats = Pipeline::new(
            FetchPlan::new(),
            EmptyHistorical,
            TransformChain::default(),
            Dispatcher::with_handles(vec![]),
        )
        .run()
        .await;

        assert_eq!(stats.output_rows, 0);
        assert!(stats.output_columns.is_empty());
    }
}
