//! PipelineBlueprint - Config Loader 输出
//!
//! 描述完整的运行配置：地点、并发、数据源、历史数据、变换链、输出路由。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::SourceTag;

/// Standard transform chain, in application order
pub const STANDARD_TRANSFORMS: [&str; 7] = [
    "kelvin_to_celsius",
    "add_feels_like_temp",
    "add_humidity_level",
    "add_weather_score",
    "add_is_rainy",
    "clean_description",
    "fill_missing",
];

/// Locations used when no configuration file is given
pub const DEFAULT_LOCATIONS: [&str; 20] = [
    "London",
    "New York",
    "Mumbai",
    "Toronto",
    "Tokyo",
    "Paris",
    "Sydney",
    "Cape Town",
    "São Paulo",
    "Moscow",
    "Beijing",
    "Seoul",
    "Dubai",
    "Bangkok",
    "Mexico City",
    "Istanbul",
    "Berlin",
    "Singapore",
    "Los Angeles",
    "Rome",
];

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的运行配置蓝图
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 运行参数
    pub pipeline: RunConfig,

    /// 数据源配置
    #[serde(default)]
    pub sources: SourcesConfig,

    /// 历史数据 (可选)
    #[serde(default)]
    pub historical: Option<HistoricalConfig>,

    /// 输出路由配置
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

/// 运行参数：地点、并发上限、变换链、默认重试
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// 地点列表 (有序)
    pub locations: Vec<String>,

    /// 同时进行的 fetch 上限
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// 变换步骤名称 (有序)
    #[serde(default = "default_transforms")]
    pub transforms: Vec<String>,

    /// 默认重试策略 (fetch 与 sink 共用)
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_max_concurrency() -> usize {
    5
}

fn default_transforms() -> Vec<String> {
    STANDARD_TRANSFORMS.iter().map(|s| s.to_string()).collect()
}

/// 固定次数、固定间隔的重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// 总尝试次数 (>= 1)
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    /// 两次尝试之间的间隔 (毫秒)
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

fn default_attempts() -> u32 {
    3
}

fn default_delay_ms() -> u64 {
    2000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            delay_ms: default_delay_ms(),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts,
            delay_ms: delay.as_millis() as u64,
        }
    }

    /// Delay between two attempts
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// 重试耗尽后的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// 返回字段缺失的降级记录，行保留
    Degrade,
    /// 该地点在此数据源的记录不参与合并
    Exclude,
}

impl FailurePolicy {
    /// Policy used when a source does not configure one
    pub fn default_for(tag: SourceTag) -> Self {
        match tag {
            SourceTag::Weather => Self::Exclude,
            SourceTag::AirQualityA | SourceTag::AirQualityB | SourceTag::Historical => {
                Self::Degrade
            }
        }
    }
}

/// 数据源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// OpenWeatherMap current weather
    OpenWeather,
    /// OpenAQ latest measurements
    OpenAq,
    /// Open-Meteo air-quality forecast
    OpenMeteo,
    /// 离线合成数据
    Mock,
}

/// 单个数据源配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// 数据源类型
    pub kind: SourceKind,

    /// 重试耗尽后的处理方式 (缺省按数据源角色决定)
    #[serde(default)]
    pub on_exhaustion: Option<FailurePolicy>,

    /// 重试策略覆盖
    #[serde(default)]
    pub retry: Option<RetryPolicy>,

    /// 类型特定参数
    #[serde(default)]
    pub params: HashMap<String, String>,
}

impl SourceConfig {
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            on_exhaustion: None,
            retry: None,
            params: HashMap::new(),
        }
    }
}

/// 三个按地点查询的数据源
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_weather_source")]
    pub weather: SourceConfig,

    #[serde(default = "default_air_quality_a_source")]
    pub air_quality_a: SourceConfig,

    #[serde(default = "default_air_quality_b_source")]
    pub air_quality_b: SourceConfig,
}

fn default_weather_source() -> SourceConfig {
    SourceConfig::new(SourceKind::OpenWeather)
}

fn default_air_quality_a_source() -> SourceConfig {
    SourceConfig::new(SourceKind::OpenAq)
}

fn default_air_quality_b_source() -> SourceConfig {
    SourceConfig::new(SourceKind::OpenMeteo)
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            weather: default_weather_source(),
            air_quality_a: default_air_quality_a_source(),
            air_quality_b: default_air_quality_b_source(),
        }
    }
}

impl SourcesConfig {
    /// Configured sources with their lane tag
    pub fn lanes(&self) -> [(SourceTag, &SourceConfig); 3] {
        [
            (SourceTag::Weather, &self.weather),
            (SourceTag::AirQualityA, &self.air_quality_a),
            (SourceTag::AirQualityB, &self.air_quality_b),
        ]
    }
}

/// 历史数据配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalConfig {
    /// CSV 文件路径
    pub path: PathBuf,
}

/// Sink 输出配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Sink 名称
    pub name: String,

    /// Sink 类型
    pub sink_type: SinkType,

    /// 重试策略覆盖
    #[serde(default)]
    pub retry: Option<RetryPolicy>,

    /// 类型特定参数
    #[serde(default)]
    pub params: HashMap<String, String>,
}

/// Sink 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// CSV 文件输出
    Csv,
    /// 标准输出
    Console,
    /// 日志输出
    Log,
}

impl Default for PipelineBlueprint {
    fn default() -> Self {
        Self {
            version: ConfigVersion::V1,
            pipeline: RunConfig {
                locations: DEFAULT_LOCATIONS.iter().map(|s| s.to_string()).collect(),
                max_concurrency: default_max_concurrency(),
                transforms: default_transforms(),
                retry: RetryPolicy::default(),
            },
            sources: SourcesConfig::default(),
            historical: Some(HistoricalConfig {
                path: PathBuf::from("historical_weather_data.csv"),
            }),
            sinks: vec![
                SinkConfig {
                    name: "csv".into(),
                    sink_type: SinkType::Csv,
                    retry: None,
                    params: HashMap::from([("path".into(), "transformed_output.csv".into())]),
                },
                SinkConfig {
                    name: "console".into(),
                    sink_type: SinkType::Console,
                    retry: None,
                    params: HashMap::new(),
                },
            ],
        }
    }
}

impl PipelineBlueprint {
    /// Source configuration for a fetch lane
    pub fn source(&self, tag: SourceTag) -> Option<&SourceConfig> {
        match tag {
            SourceTag::Weather => Some(&self.sources.weather),
            SourceTag::AirQualityA => Some(&self.sources.air_quality_a),
            SourceTag::AirQualityB => Some(&self.sources.air_quality_b),
            SourceTag::Historical => None,
        }
    }

    /// Effective exhaustion policy for a lane
    pub fn failure_policy(&self, tag: SourceTag) -> FailurePolicy {
        self.source(tag)
            .and_then(|source| source.on_exhaustion)
            .unwrap_or_else(|| FailurePolicy::default_for(tag))
    }

    /// Effective retry policy for a lane
    pub fn source_retry(&self, tag: SourceTag) -> RetryPolicy {
        self.source(tag)
            .and_then(|source| source.retry)
            .unwrap_or(self.pipeline.retry)
    }

    /// Effective retry policy for a sink
    pub fn sink_retry(&self, sink: &SinkConfig) -> RetryPolicy {
        sink.retry.unwrap_or(self.pipeline.retry)
    }
}
