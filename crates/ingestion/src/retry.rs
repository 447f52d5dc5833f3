//! Retrying invocation wrapper
//!
//! A fixed-count, fixed-delay retry around any idempotent fetch. What happens on
//! exhaustion is chosen per source: degrade to an all-absent record, or fail so
//! the orchestrator excludes the location from the merge.

use std::future::Future;

use contracts::{
    ContractError, FailurePolicy, FetchReply, FetchSource, MeasurementRecord, RetryPolicy,
    SourceTag,
};
use tracing::{debug, error, warn};

/// Retry behaviour of one source lane
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPolicy {
    pub retry: RetryPolicy,
    pub on_exhaustion: FailurePolicy,
}

impl FetchPolicy {
    pub fn new(retry: RetryPolicy, on_exhaustion: FailurePolicy) -> Self {
        Self {
            retry,
            on_exhaustion,
        }
    }

    /// Default retry with the lane's default exhaustion policy
    pub fn for_tag(tag: SourceTag) -> Self {
        Self::new(RetryPolicy::default(), FailurePolicy::default_for(tag))
    }
}

/// Run `op` up to `retry.attempts` times with `retry.delay()` between attempts
///
/// Replies (complete or degraded) return immediately; only raised errors are
/// retried. No delay follows the last attempt.
///
/// # Errors
/// `ContractError::FetchExhausted` when every attempt raised and
/// `on_exhaustion` is `Exclude`.
pub async fn retry_fetch<F, Fut>(
    tag: SourceTag,
    location: &str,
    retry: &RetryPolicy,
    on_exhaustion: FailurePolicy,
    mut op: F,
) -> Result<FetchReply, ContractError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<FetchReply, ContractError>>,
{
    let attempts = retry.attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        metrics::counter!("atmos_fetch_attempts_total", "source" => tag.lane_name()).increment(1);

        match op().await {
            Ok(reply) => {
                if attempt > 1 {
                    debug!(source = %tag, location, attempt, "fetch succeeded after retry");
                }
                return Ok(reply);
            }
            Err(e) => {
                warn!(
                    source = %tag,
                    location,
                    attempt,
                    max_attempts = attempts,
                    error = %e,
                    "fetch attempt failed"
                );
                last_error = e.to_string();
                if attempt < attempts {
                    tokio::time::sleep(retry.delay()).await;
                }
            }
        }
    }

    metrics::counter!("atmos_fetch_exhausted_total", "source" => tag.lane_name()).increment(1);

    match on_exhaustion {
        FailurePolicy::Degrade => {
            error!(
                source = %tag,
                location,
                attempts,
                error = %last_error,
                "fetch retries exhausted, degrading record"
            );
            Ok(FetchReply::Degraded(MeasurementRecord::degraded(
                tag, location,
            )))
        }
        FailurePolicy::Exclude => {
            error!(
                source = %tag,
                location,
                attempts,
                error = %last_error,
                "fetch retries exhausted, excluding location"
            );
            Err(ContractError::FetchExhausted {
                source_tag: tag,
                location: location.to_string(),
                attempts,
                message: last_error,
            })
        }
    }
}

/// `FetchSource` decorator applying `retry_fetch` to every call
///
/// Has the same result contract as the wrapped source.
#[derive(Debug)]
pub struct RetryingSource<S> {
    inner: S,
    policy: FetchPolicy,
}

impl<S> RetryingSource<S> {
    pub fn new(inner: S, policy: FetchPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &FetchPolicy {
        &self.policy
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S> FetchSource for RetryingSource<S>
where
    S: FetchSource + Sync,
{
    fn tag(&self) -> SourceTag {
        self.inner.tag()
    }

    async fn fetch(&self, location: &str) -> Result<FetchReply, ContractError> {
        retry_fetch(
            self.inner.tag(),
            location,
            &self.policy.retry,
            self.policy.on_exhaustion,
            || self.inner.fetch(location),
        )
        .await
    }
}
