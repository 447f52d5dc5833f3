//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 模拟 e2e 测试（Mock 数据源 + 内存 sink，无需网络）
//! - 配置驱动的完整运行（TOML → 构建 → 运行 → CSV 文件）

#[cfg(test)]
mod contract_tests {
    use contracts::{Column, SourceTag, DEFAULT_LOCATIONS, STANDARD_TRANSFORMS};

    #[test]
    fn test_contracts_compile() {
        let _ = contracts::ConfigVersion::V1;
    }

    #[test]
    fn test_standard_chain_snapshot() {
        assert_eq!(
            STANDARD_TRANSFORMS,
            [
                "kelvin_to_celsius",
                "add_feels_like_temp",
                "add_humidity_level",
                "add_weather_score",
                "add_is_rainy",
                "clean_description",
                "fill_missing",
            ]
        );
        assert_eq!(DEFAULT_LOCATIONS.len(), 20);
    }

    #[test]
    fn test_report_layout_snapshot() {
        let names: Vec<&str> = Column::REPORT.iter().map(|c| c.name()).collect();
        assert_eq!(
            names.join(","),
            "city,temp_celsius,feels_like_temp,humidity,humidity_level,wind_speed,\
             is_rainy,weather_score,aqi,aqi_open_meteo,description,timestamp,source"
        );
    }

    #[test]
    fn test_provenance_labels() {
        assert_eq!(SourceTag::Weather.provenance(), "api");
        assert_eq!(SourceTag::AirQualityA.provenance(), "openaq");
        assert_eq!(SourceTag::AirQualityB.provenance(), "open-meteo");
        assert_eq!(SourceTag::Historical.provenance(), "csv");
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use atmos_cli::{Pipeline, PipelineBuilder};
    use chrono::{DateTime, TimeZone, Utc};
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{
        ContractError, DataSink, FailurePolicy, Measurement, RetryPolicy, SourceTag, Table,
        WeatherReading,
    };
    use dispatcher::{DeliveryOutcome, Dispatcher};
    use enrichment::{FnStep, StepError, TransformChain, TransformRegistry};
    use ingestion::{
        CsvHistoricalProvider, EmptyHistorical, FetchPlan, FetchPolicy, MockBehavior, MockSource,
    };

    /// Sink that keeps every table it receives
    #[derive(Clone)]
    struct RecordingSink {
        name: String,
        tables: Arc<Mutex<Vec<Table>>>,
    }

    impl RecordingSink {
        fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                tables: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn tables(&self) -> Vec<Table> {
            self.tables.lock().unwrap().clone()
        }
    }

    impl DataSink for RecordingSink {
        fn name(&self) -> &str {
            &self.name
        }

        async fn write(&mut self, table: &Table) -> Result<(), ContractError> {
            self.tables.lock().unwrap().push(table.clone());
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    /// Sink whose every write fails
    struct BrokenSink;

    impl DataSink for BrokenSink {
        fn name(&self) -> &str {
            "broken"
        }

        async fn write(&mut self, _table: &Table) -> Result<(), ContractError> {
            Err(ContractError::sink_write("broken", "disk full"))
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    fn observed() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy::new(2, Duration::from_millis(1))
    }

    fn policy(tag: SourceTag) -> FetchPolicy {
        FetchPolicy::new(fast_retry(), FailurePolicy::default_for(tag))
    }

    fn rainy_weather() -> MockBehavior {
        MockBehavior::Reading(Measurement::Weather(WeatherReading {
            temp_k: Some(300.0),
            humidity: Some(50.0),
            wind_speed: Some(3.0),
            description: Some("LIGHT rain".into()),
            ..Default::default()
        }))
    }

    fn standard_chain() -> TransformChain {
        TransformRegistry::standard().standard_chain().unwrap()
    }

    fn dispatcher_with(sink: &RecordingSink) -> Dispatcher {
        let mut dispatcher = Dispatcher::with_handles(Vec::new());
        dispatcher.add_sink(sink.clone(), fast_retry());
        dispatcher
    }

    /// London fully served, Paris weather exhausted (excluded), air quality joined
    #[tokio::test]
    async fn test_e2e_merge_and_enrich() {
        let plan = FetchPlan::new()
            .lane(
                MockSource::new(SourceTag::Weather)
                    .observed_at(observed())
                    .with("London", rainy_weather())
                    .with("Paris", MockBehavior::Fail("connection reset".into())),
                policy(SourceTag::Weather),
            )
            .lane(
                MockSource::new(SourceTag::AirQualityA)
                    .observed_at(observed())
                    .with("London", MockBehavior::air_quality(42.0))
                    .with("Paris", MockBehavior::air_quality(30.0)),
                policy(SourceTag::AirQualityA),
            )
            .lane(
                MockSource::new(SourceTag::AirQualityB)
                    .observed_at(observed())
                    .with("London", MockBehavior::air_quality(12.5))
                    .with("Paris", MockBehavior::Unavailable),
                policy(SourceTag::AirQualityB),
            );

        let sink = RecordingSink::new("memory");
        let stats = Pipeline::new(plan, EmptyHistorical, standard_chain(), dispatcher_with(&sink))
            .with_locations(["London", "Paris"])
            .with_max_concurrency(2)
            .run()
            .await;

        let weather = stats.fetch.lane(SourceTag::Weather);
        assert_eq!((weather.success, weather.excluded), (1, 1));
        assert_eq!(stats.fetch.lane(SourceTag::AirQualityB).degraded, 1);
        assert!(stats.transforms.is_clean());
        assert_eq!(stats.dispatch.delivered(), 1);

        let tables = sink.tables();
        assert_eq!(tables.len(), 1);
        let table = &tables[0];
        assert_eq!(table.len(), 1);

        let london = &table.rows()[0];
        assert_eq!(london.location, "London");
        assert_eq!(london.temp_celsius, Some(26.85));
        assert_eq!(london.feels_like_temp, Some(26.85));
        assert_eq!(london.aqi, Some(42.0));
        assert_eq!(london.aqi_open_meteo, Some(12.5));
        assert_eq!(london.is_rainy, Some(true));
        assert_eq!(london.weather_score, Some(6));
        assert_eq!(london.description.as_deref(), Some("Light rain"));
        assert_eq!(london.source.as_deref(), Some("api"));
    }

    /// At most K fetches in flight, whatever the number of locations
    #[tokio::test]
    async fn test_e2e_concurrency_bound() {
        let locations: Vec<String> = (0..12).map(|i| format!("City-{i}")).collect();
        let plan = FetchPlan::new()
            .lane(
                MockSource::new(SourceTag::Weather).with_latency(Duration::from_millis(15)),
                policy(SourceTag::Weather),
            )
            .lane(
                MockSource::new(SourceTag::AirQualityA).with_latency(Duration::from_millis(15)),
                policy(SourceTag::AirQualityA),
            );

        let stats = Pipeline::new(
            plan,
            EmptyHistorical,
            standard_chain(),
            Dispatcher::with_handles(Vec::new()),
        )
        .with_locations(locations)
        .with_max_concurrency(3)
        .run()
        .await;

        assert!(stats.peak_in_flight <= 3, "peak was {}", stats.peak_in_flight);
        assert!(stats.peak_in_flight >= 1);
        assert_eq!(stats.fetch.total().success, 24);
        assert_eq!(stats.output_rows, 12);
    }

    /// One failing sink never blocks the others
    #[tokio::test]
    async fn test_e2e_sink_isolation() {
        let plan = FetchPlan::new().lane(
            MockSource::new(SourceTag::Weather),
            policy(SourceTag::Weather),
        );
        let sink = RecordingSink::new("memory");
        let mut dispatcher = dispatcher_with(&sink);
        dispatcher.add_sink(BrokenSink, RetryPolicy::new(3, Duration::from_millis(1)));

        let stats = Pipeline::new(plan, EmptyHistorical, standard_chain(), dispatcher)
            .with_locations(["Rome"])
            .run()
            .await;

        assert_eq!(stats.dispatch.delivered(), 1);
        assert_eq!(stats.dispatch.failed(), 1);
        assert!(matches!(
            stats.dispatch.outcome("broken"),
            Some(DeliveryOutcome::Exhausted { attempts: 3, .. })
        ));
        assert_eq!(sink.tables().len(), 1);
    }

    /// A broken transform is skipped; later steps still run on its input
    #[tokio::test]
    async fn test_e2e_transform_isolation() {
        let registry = TransformRegistry::standard().with(FnStep::new(
            "explode",
            [],
            |_table: Table| -> Result<Table, StepError> {
                Err(StepError::failed("explode", "boom"))
            },
        ));
        let chain = registry
            .resolve(&["kelvin_to_celsius", "explode", "add_is_rainy"])
            .unwrap();
        let plan = FetchPlan::new().lane(
            MockSource::new(SourceTag::Weather).with("Oslo", rainy_weather()),
            policy(SourceTag::Weather),
        );
        let sink = RecordingSink::new("memory");

        let stats = Pipeline::new(plan, EmptyHistorical, chain, dispatcher_with(&sink))
            .with_locations(["Oslo"])
            .run()
            .await;

        assert_eq!(stats.transforms.applied, ["kelvin_to_celsius", "add_is_rainy"]);
        assert_eq!(stats.transforms.failed.len(), 1);
        assert_eq!(stats.transforms.failed[0].step, "explode");

        let tables = sink.tables();
        let row = &tables[0].rows()[0];
        assert_eq!(row.temp_celsius, Some(26.85));
        assert_eq!(row.is_rainy, Some(true));
    }

    /// Historical rows are unioned and sorted by (location, time)
    #[tokio::test]
    async fn test_e2e_historical_union() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("historical_weather_data.csv");
        std::fs::write(
            &path,
            "city,temp_k,humidity,wind_speed,description,timestamp\n\
             London,283.15,70,2.0,clear sky,2024-04-30T09:00:00\n\
             Berlin,280.15,85,9.5,heavy rain,2024-04-29T18:00:00\n",
        )
        .unwrap();

        let plan = FetchPlan::new().lane(
            MockSource::new(SourceTag::Weather)
                .observed_at(observed())
                .with("London", rainy_weather()),
            policy(SourceTag::Weather),
        );
        let sink = RecordingSink::new("memory");

        let stats = Pipeline::new(
            plan,
            CsvHistoricalProvider::new(&path),
            standard_chain(),
            dispatcher_with(&sink),
        )
        .with_locations(["London"])
        .run()
        .await;

        assert_eq!(stats.historical_rows, 2);
        assert_eq!(stats.output_rows, 3);

        let table = &sink.tables()[0];
        let order: Vec<(&str, Option<&str>)> = table
            .rows()
            .iter()
            .map(|r| (r.location.as_str(), r.source.as_deref()))
            .collect();
        assert_eq!(
            order,
            [
                ("Berlin", Some("csv")),
                ("London", Some("csv")),
                ("London", Some("api")),
            ]
        );
        assert_eq!(table.rows()[0].temp_celsius, Some(7.0));
    }

    /// An unreadable historical file degrades to "no history"
    #[tokio::test]
    async fn test_e2e_missing_historical_file() {
        let plan = FetchPlan::new().lane(
            MockSource::new(SourceTag::Weather),
            policy(SourceTag::Weather),
        );
        let sink = RecordingSink::new("memory");

        let stats = Pipeline::new(
            plan,
            CsvHistoricalProvider::new("/nonexistent/history.csv"),
            standard_chain(),
            dispatcher_with(&sink),
        )
        .with_locations(["Lima"])
        .run()
        .await;

        assert_eq!(stats.historical_rows, 0);
        assert_eq!(stats.output_rows, 1);
        assert_eq!(stats.dispatch.delivered(), 1);
    }

    /// Every weather fetch excluded: empty table still reaches the sinks
    #[tokio::test]
    async fn test_e2e_all_weather_excluded() {
        let plan = FetchPlan::new()
            .lane(
                MockSource::new(SourceTag::Weather)
                    .with_default(MockBehavior::Fail("timeout".into())),
                policy(SourceTag::Weather),
            )
            .lane(
                MockSource::new(SourceTag::AirQualityB),
                policy(SourceTag::AirQualityB),
            );
        let sink = RecordingSink::new("memory");

        let stats = Pipeline::new(plan, EmptyHistorical, standard_chain(), dispatcher_with(&sink))
            .with_locations(["Quito", "Accra"])
            .run()
            .await;

        assert_eq!(stats.fetch.lane(SourceTag::Weather).excluded, 2);
        assert_eq!(stats.output_rows, 0);
        let table = &sink.tables()[0];
        assert!(table.is_empty());
        assert!(!table.has_column(contracts::Column::AqiOpenMeteo));
    }

    /// TOML config → builder → run → CSV file on disk
    #[tokio::test]
    async fn test_e2e_config_driven_run() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.csv");
        let config = format!(
            r#"
[pipeline]
locations = ["London", "Paris", "Tokyo"]
max_concurrency = 2

[pipeline.retry]
attempts = 1
delay_ms = 0

[sources.weather]
kind = "mock"

[sources.air_quality_a]
kind = "mock"

[sources.air_quality_b]
kind = "mock"

[[sinks]]
name = "csv"
sink_type = "csv"

[sinks.params]
path = "{}"
layout = "report"

[[sinks]]
name = "log"
sink_type = "log"
"#,
            out.display()
        );
        let blueprint = ConfigLoader::load_from_str(&config, ConfigFormat::Toml).unwrap();

        let stats = PipelineBuilder::new(blueprint)
            .build()
            .unwrap()
            .run()
            .await;

        assert_eq!(stats.output_rows, 3);
        assert_eq!(stats.dispatch.delivered(), 2);
        assert!(stats.peak_in_flight <= 2);

        let content = std::fs::read_to_string(&out).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("city,temp_celsius,feels_like_temp,humidity,humidity_level"));
        assert!(lines[1].starts_with("London,"));
        assert!(lines[3].starts_with("Tokyo,"));
    }
}
