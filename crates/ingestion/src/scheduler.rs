//! Fetch scheduler
//!
//! Spawns one task per location x lane, each holding a gate permit for its whole
//! retried call, then waits for every task to settle (the barrier).

use std::sync::Arc;

use contracts::{FetchOutcome, FetchSource, SourceTag};
use tokio::task::JoinHandle;
use tracing::{error, info, instrument};

use crate::gate::ConcurrencyGate;
use crate::retry::{FetchPolicy, RetryingSource};

type ScheduleFn = Box<dyn Fn(&mut FetchScheduler, &str) + Send + Sync>;

struct PlannedLane {
    tag: SourceTag,
    policy: FetchPolicy,
    schedule: ScheduleFn,
}

/// Registered source lanes of a run
#[derive(Default)]
pub struct FetchPlan {
    lanes: Vec<PlannedLane>,
}

impl FetchPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a lane; the source is wrapped in a `RetryingSource` with `policy`
    pub fn lane<S>(mut self, source: S, policy: FetchPolicy) -> Self
    where
        S: FetchSource + Send + Sync + 'static,
    {
        let tag = source.tag();
        let source = Arc::new(RetryingSource::new(source, policy.clone()));
        self.lanes.push(PlannedLane {
            tag,
            policy,
            schedule: Box::new(move |scheduler, location| {
                scheduler.spawn(source.clone(), location);
            }),
        });
        self
    }

    /// Registered lanes with their policies, in registration order
    pub fn lanes(&self) -> impl Iterator<Item = (SourceTag, &FetchPolicy)> + '_ {
        self.lanes.iter().map(|lane| (lane.tag, &lane.policy))
    }

    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    /// Fetch every location from every lane and wait for all of them
    ///
    /// Returns one outcome per (location, lane), in scheduling order.
    #[instrument(
        name = "fetch_barrier",
        skip(self, locations, gate),
        fields(locations = locations.len(), lanes = self.lanes.len(), max_concurrency = gate.capacity())
    )]
    pub async fn execute(&self, locations: &[String], gate: &ConcurrencyGate) -> Vec<FetchOutcome> {
        let mut scheduler = FetchScheduler::new(gate.clone());
        for location in locations {
            for lane in &self.lanes {
                (lane.schedule)(&mut scheduler, location);
            }
        }
        scheduler.join_all().await
    }
}

struct PendingFetch {
    source: SourceTag,
    location: String,
    handle: JoinHandle<FetchOutcome>,
}

/// Spawned fetch tasks awaiting the barrier
pub struct FetchScheduler {
    gate: ConcurrencyGate,
    pending: Vec<PendingFetch>,
}

impl FetchScheduler {
    pub fn new(gate: ConcurrencyGate) -> Self {
        Self {
            gate,
            pending: Vec::new(),
        }
    }

    /// Spawn one gated fetch
    ///
    /// `Complete` becomes `Success`, `Degraded` stays `Degraded`, an error becomes
    /// `Excluded`.
    pub fn spawn<S>(&mut self, source: Arc<S>, location: &str)
    where
        S: FetchSource + Send + Sync + 'static,
    {
        let tag = source.tag();
        let gate = self.gate.clone();
        let task_location = location.to_string();

        let handle = tokio::spawn(async move {
            let _permit = match gate.acquire().await {
                Ok(permit) => permit,
                Err(e) => {
                    return FetchOutcome::Excluded {
                        source: tag,
                        location: task_location,
                        reason: e.to_string(),
                    }
                }
            };

            match source.fetch(&task_location).await {
                Ok(reply) => FetchOutcome::from(reply),
                Err(e) => FetchOutcome::Excluded {
                    source: tag,
                    location: task_location,
                    reason: e.to_string(),
                },
            }
        });

        self.pending.push(PendingFetch {
            source: tag,
            location: location.to_string(),
            handle,
        });
    }

    /// Number of spawned, not yet collected fetches
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Wait for every spawned fetch to settle
    ///
    /// A panicked task is reported as `Excluded` with the panic as reason.
    pub async fn join_all(self) -> Vec<FetchOutcome> {
        let mut outcomes = Vec::with_capacity(self.pending.len());

        for pending in self.pending {
            let outcome = match pending.handle.await {
                Ok(outcome) => outcome,
                Err(join_error) => {
                    error!(
                        source = %pending.source,
                        location = %pending.location,
                        error = %join_error,
                        "fetch task aborted"
                    );
                    FetchOutcome::Excluded {
                        source: pending.source,
                        location: pending.location,
                        reason: format!("fetch task aborted: {join_error}"),
                    }
                }
            };
            metrics::counter!(
                "atmos_fetch_outcomes_total",
                "source" => outcome.source().lane_name(),
                "outcome" => outcome.kind()
            )
            .increment(1);
            outcomes.push(outcome);
        }

        let excluded = outcomes
            .iter()
            .filter(|o| matches!(o, FetchOutcome::Excluded { .. }))
            .count();
        let degraded = outcomes
            .iter()
            .filter(|o| matches!(o, FetchOutcome::Degraded(_)))
            .count();
        info!(
            total = outcomes.len(),
            succeeded = outcomes.len() - excluded - degraded,
            degraded,
            excluded,
            "all fetches settled"
        );

        outcomes
    }
}
