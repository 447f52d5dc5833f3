//! Mock 数据源
//!
//! 用于无网络环境的测试与离线运行（`kind = "mock"`）。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use contracts::{
    AirQualityReading, ContractError, FetchReply, FetchSource, Measurement, MeasurementRecord,
    SourceTag, WeatherReading,
};
use tracing::trace;

const SYNTHETIC_DESCRIPTIONS: [&str; 6] = [
    "clear sky",
    "few clouds",
    "light rain",
    "overcast clouds",
    "drizzle",
    "thunderstorm",
];

/// 单个地点的模拟行为
#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    /// 返回完整记录
    Reading(Measurement),
    /// 可达但响应失败（降级记录）
    Unavailable,
    /// 每次调用都抛出错误
    Fail(String),
    /// 前 n 次调用抛出错误，之后返回完整记录
    FailTimes(u32, Measurement),
    /// 基于地点名生成的确定性数据
    Synthetic,
}

impl MockBehavior {
    /// 完整天气记录
    pub fn weather(temp_k: f64, humidity: f64) -> Self {
        Self::Reading(weather_reading(temp_k, humidity))
    }

    /// 完整空气质量记录
    pub fn air_quality(index: f64) -> Self {
        Self::Reading(Measurement::AirQuality(AirQualityReading { index: Some(index) }))
    }
}

/// 只带温度与湿度的天气数据
pub fn weather_reading(temp_k: f64, humidity: f64) -> Measurement {
    Measurement::Weather(WeatherReading {
        temp_k: Some(temp_k),
        humidity: Some(humidity),
        ..Default::default()
    })
}

/// Mock 数据源
///
/// 按地点脚本化行为，记录调用次数，可选模拟延迟。
#[derive(Debug)]
pub struct MockSource {
    tag: SourceTag,
    behaviors: HashMap<String, MockBehavior>,
    default: MockBehavior,
    latency: Option<Duration>,
    observed_at: Option<DateTime<Utc>>,
    calls: AtomicU32,
    calls_by_location: Mutex<HashMap<String, u32>>,
}

impl MockSource {
    /// 创建新的 Mock 数据源（默认行为：确定性合成数据）
    pub fn new(tag: SourceTag) -> Self {
        Self {
            tag,
            behaviors: HashMap::new(),
            default: MockBehavior::Synthetic,
            latency: None,
            observed_at: None,
            calls: AtomicU32::new(0),
            calls_by_location: Mutex::new(HashMap::new()),
        }
    }

    /// 为指定地点设置行为
    pub fn with(mut self, location: impl Into<String>, behavior: MockBehavior) -> Self {
        self.behaviors.insert(location.into(), behavior);
        self
    }

    /// 未单独设置的地点使用的行为
    pub fn with_default(mut self, behavior: MockBehavior) -> Self {
        self.default = behavior;
        self
    }

    /// 每次调用的模拟延迟
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// 固定观测时间（默认取调用时刻）
    pub fn observed_at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.observed_at = Some(timestamp);
        self
    }

    /// 总调用次数
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// 指定地点的调用次数
    pub fn calls_for(&self, location: &str) -> u32 {
        self.calls_by_location
            .lock()
            .map(|calls| calls.get(location).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    fn record_call(&self, location: &str) -> u32 {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.calls_by_location.lock() {
            Ok(mut calls) => {
                let count = calls.entry(location.to_string()).or_insert(0);
                *count += 1;
                *count
            }
            Err(_) => 0,
        }
    }

    fn complete(&self, location: &str, measurement: Measurement) -> FetchReply {
        let record = MeasurementRecord {
            location: location.to_string(),
            source: self.tag,
            timestamp: Some(self.observed_at.unwrap_or_else(Utc::now)),
            measurement,
        };
        FetchReply::Complete(record)
    }
}

impl FetchSource for MockSource {
    fn tag(&self) -> SourceTag {
        self.tag
    }

    async fn fetch(&self, location: &str) -> Result<FetchReply, ContractError> {
        let call = self.record_call(location);
        trace!(source = %self.tag, location, call, "mock fetch");

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let behavior = self.behaviors.get(location).unwrap_or(&self.default);
        match behavior {
            MockBehavior::Reading(measurement) => Ok(self.complete(location, measurement.clone())),
            MockBehavior::Unavailable => Ok(FetchReply::Degraded(MeasurementRecord::degraded(
                self.tag, location,
            ))),
            MockBehavior::Fail(message) => {
                Err(ContractError::fetch(self.tag, location, message.clone()))
            }
            MockBehavior::FailTimes(failures, measurement) => {
                if call <= *failures {
                    Err(ContractError::fetch(
                        self.tag,
                        location,
                        format!("scripted failure {call}/{failures}"),
                    ))
                } else {
                    Ok(self.complete(location, measurement.clone()))
                }
            }
            MockBehavior::Synthetic => Ok(self.complete(location, synthetic(self.tag, location))),
        }
    }
}

/// 基于地点名的确定性数据
fn synthetic(tag: SourceTag, location: &str) -> Measurement {
    let seed = location
        .bytes()
        .fold(17u32, |acc, b| acc.wrapping_mul(31).wrapping_add(u32::from(b)));

    match tag {
        SourceTag::Weather | SourceTag::Historical => {
            let temp_k = 263.15 + f64::from(seed % 40);
            Measurement::Weather(WeatherReading {
                temp_k: Some(temp_k),
                humidity: Some(f64::from(20 + seed % 75)),
                wind_speed: Some(f64::from(seed % 24) * 0.5),
                description: Some(
                    SYNTHETIC_DESCRIPTIONS[(seed as usize) % SYNTHETIC_DESCRIPTIONS.len()]
                        .to_string(),
                ),
                feels_like_k: Some(temp_k - 1.5),
            })
        }
        SourceTag::AirQualityA => Measurement::AirQuality(AirQualityReading {
            index: Some(f64::from(5 + seed % 90)),
        }),
        SourceTag::AirQualityB => Measurement::AirQuality(AirQualityReading {
            index: Some(f64::from(seed % 600) / 10.0),
        }),
    }
}
