//! Pipeline builder - turns a blueprint into runnable components.
//!
//! Every setup failure (unknown transform, missing API key, bad sink params)
//! surfaces here, before any fetch starts.

use std::time::Duration;

use anyhow::{Context, Result};
use contracts::{PipelineBlueprint, SourceConfig, SourceKind, SourceTag};
use dispatcher::{create_dispatcher, Dispatcher};
use enrichment::{TransformChain, TransformRegistry};
use ingestion::{
    http_client, FetchPlan, FetchPolicy, HistoricalSource, HttpClient, IngestionError, MockSource,
    OpenAqSource, OpenMeteoSource, OpenWeatherSource, DEFAULT_HTTP_TIMEOUT,
};
use tracing::{debug, info, instrument};

use super::Pipeline;

/// Builds a [`Pipeline`] from a validated blueprint
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    blueprint: PipelineBlueprint,
    registry: TransformRegistry,
    http_timeout: Duration,
}

impl PipelineBuilder {
    pub fn new(blueprint: PipelineBlueprint) -> Self {
        Self {
            blueprint,
            registry: TransformRegistry::standard(),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    /// Use a custom transform registry
    pub fn with_registry(mut self, registry: TransformRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn blueprint(&self) -> &PipelineBlueprint {
        &self.blueprint
    }

    pub fn registry(&self) -> &TransformRegistry {
        &self.registry
    }

    /// Resolve the configured transform names
    pub fn resolve_chain(&self) -> Result<TransformChain> {
        self.registry
            .resolve(&self.blueprint.pipeline.transforms)
            .context("Failed to resolve transform chain")
    }

    /// One lane per configured source
    #[instrument(name = "build_fetch_plan", skip(self))]
    pub fn build_plan(&self) -> Result<FetchPlan> {
        let lanes = self.blueprint.sources.lanes();
        let needs_http = lanes
            .iter()
            .any(|(_, source)| source.kind != SourceKind::Mock);
        let client = if needs_http {
            Some(http_client(self.http_timeout).context("Failed to build HTTP client")?)
        } else {
            None
        };

        let mut plan = FetchPlan::new();
        for (tag, source) in lanes {
            let policy = FetchPolicy::new(
                self.blueprint.source_retry(tag),
                self.blueprint.failure_policy(tag),
            );
            debug!(lane = %tag, kind = ?source.kind, ?policy, "Registering fetch lane");
            plan = add_lane(plan, tag, source, policy, client.as_ref())
                .with_context(|| format!("Failed to set up the {tag} source"))?;
        }
        Ok(plan)
    }

    /// CSV provider when configured, otherwise an empty one
    pub fn build_historical(&self) -> HistoricalSource {
        match &self.blueprint.historical {
            Some(config) => HistoricalSource::csv(&config.path),
            None => HistoricalSource::empty(),
        }
    }

    /// Spawn one worker per configured sink
    pub fn build_dispatcher(&self) -> Result<Dispatcher> {
        create_dispatcher(&self.blueprint.sinks, self.blueprint.pipeline.retry)
            .context("Failed to create sinks")
    }

    /// Build every component; the chain is resolved first so bad names fail fast
    ///
    /// Must be called inside a Tokio runtime (sink workers are spawned).
    pub fn build(self) -> Result<Pipeline<HistoricalSource>> {
        let chain = self.resolve_chain()?;
        let plan = self.build_plan()?;
        let historical = self.build_historical();
        let dispatcher = self.build_dispatcher()?;

        info!(
            locations = self.blueprint.pipeline.locations.len(),
            lanes = plan.len(),
            transforms = chain.len(),
            sinks = dispatcher.len(),
            "Pipeline built"
        );

        Ok(Pipeline::new(plan, historical, chain, dispatcher)
            .with_locations(self.blueprint.pipeline.locations)
            .with_max_concurrency(self.blueprint.pipeline.max_concurrency))
    }
}

fn add_lane(
    plan: FetchPlan,
    tag: SourceTag,
    source: &SourceConfig,
    policy: FetchPolicy,
    client: Option<&HttpClient>,
) -> Result<FetchPlan, IngestionError> {
    let http = || {
        client.cloned().ok_or_else(|| IngestionError::HttpClient {
            message: "no http client available".to_string(),
        })
    };

    let plan = match (tag, source.kind) {
        (_, SourceKind::Mock) => plan.lane(mock_source(tag, source)?, policy),
        (SourceTag::Weather, SourceKind::OpenWeather) => {
            plan.lane(OpenWeatherSource::from_params(http()?, &source.params)?, policy)
        }
        (SourceTag::AirQualityA, SourceKind::OpenAq) => {
            plan.lane(OpenAqSource::from_params(http()?, &source.params), policy)
        }
        (SourceTag::AirQualityB, SourceKind::OpenMeteo) => {
            plan.lane(OpenMeteoSource::from_params(http()?, &source.params)?, policy)
        }
        (tag, kind) => {
            return Err(IngestionError::UnsupportedSource {
                tag,
                kind: format!("{kind:?}"),
            })
        }
    };
    Ok(plan)
}

/// Offline source; `latency_ms` param adds a per-call delay
fn mock_source(tag: SourceTag, source: &SourceConfig) -> Result<MockSource, IngestionError> {
    let mock = MockSource::new(tag);
    match source.params.get("latency_ms") {
        Some(value) => {
            let ms: u64 = value.trim().parse().map_err(|e| IngestionError::InvalidParam {
                key: "latency_ms".to_string(),
                message: format!("{e}"),
            })?;
            Ok(mock.with_latency(Duration::from_millis(ms)))
        }
        None => Ok(mock),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{FailurePolicy, SinkConfig, SinkType};
    use std::collections::HashMap;

    fn offline_blueprint() -> PipelineBlueprint {
        let mut blueprint = PipelineBlueprint::default();
        blueprint.pipeline.locations = vec!["London".into(), "Paris".into()];
        blueprint.sources.weather = SourceConfig::new(SourceKind::Mock);
        blueprint.sources.air_quality_a = SourceConfig::new(SourceKind::Mock);
        blueprint.sources.air_quality_b = SourceConfig::new(SourceKind::Mock);
        blueprint.historical = None;
        blueprint.sinks = vec![SinkConfig {
            name: "log".into(),
            sink_type: SinkType::Log,
            retry: None,
            params: HashMap::new(),
        }];
        blueprint
    }

    #[test]
    fn test_plan_has_three_lanes_with_policies() {
        let plan = PipelineBuilder::new(offline_blueprint()).build_plan().unwrap();
        let lanes: Vec<_> = plan
            .lanes()
            .map(|(tag, policy)| (tag, policy.on_exhaustion))
            .collect();
        assert_eq!(
            lanes,
            [
                (SourceTag::Weather, FailurePolicy::Exclude),
                (SourceTag::AirQualityA, FailurePolicy::Degrade),
                (SourceTag::AirQualityB, FailurePolicy::Degrade),
            ]
        );
    }

    #[test]
    fn test_mismatched_kind_is_rejected() {
        let mut blueprint = offline_blueprint();
        blueprint.sources.air_quality_a = SourceConfig::new(SourceKind::OpenWeather);
        let err = PipelineBuilder::new(blueprint).build_plan().err().unwrap();
        let source = err.downcast_ref::<IngestionError>();
        assert!(matches!(
            source,
            Some(IngestionError::UnsupportedSource {
                tag: SourceTag::AirQualityA,
                ..
            })
        ));
    }

    #[test]
    fn test_missing_api_key_is_setup_failure() {
        let mut blueprint = offline_blueprint();
        let mut weather = SourceConfig::new(SourceKind::OpenWeather);
        weather
            .params
            .insert("api_key_env".into(), "ATMOS_TEST_KEY_THAT_IS_NEVER_SET".into());
        blueprint.sources.weather = weather;

        let err = PipelineBuilder::new(blueprint).build_plan().err().unwrap();
        assert!(matches!(
            err.downcast_ref::<IngestionError>(),
            Some(IngestionError::MissingApiKey { .. })
        ));
    }

    #[test]
    fn test_bad_mock_latency() {
        let mut blueprint = offline_blueprint();
        blueprint
            .sources
            .weather
            .params
            .insert("latency_ms".into(), "soon".into());
        assert!(PipelineBuilder::new(blueprint).build_plan().is_err());
    }

    #[test]
    fn test_unknown_transform_fails_fast() {
        let mut blueprint = offline_blueprint();
        blueprint.pipeline.transforms = vec!["kelvin_to_celsius".into(), "to_fahrenheit".into()];
        let err = PipelineBuilder::new(blueprint).resolve_chain().unwrap_err();
        assert!(format!("{err:#}").contains("to_fahrenheit"));
    }

    #[test]
    fn test_historical_selection() {
        let mut blueprint = offline_blueprint();
        assert!(matches!(
            PipelineBuilder::new(blueprint.clone()).build_historical(),
            HistoricalSource::Empty(_)
        ));

        blueprint.historical = Some(contracts::HistoricalConfig {
            path: "history.csv".into(),
        });
        assert!(matches!(
            PipelineBuilder::new(blueprint).build_historical(),
            HistoricalSource::Csv(_)
        ));
    }

    #[tokio::test]
    async fn test_build_offline_pipeline() {
        let pipeline = PipelineBuilder::new(offline_blueprint()).build().unwrap();
        assert_eq!(pipeline.locations(), ["London", "Paris"]);
        assert_eq!(pipeline.max_concurrency(), 5);
    }
}
