//! 结果分类：按数据源标签分通道

use contracts::{FetchOutcome, MeasurementRecord, SourceTag};
use tracing::{debug, error};

/// 每个数据源一条通道，保持到达顺序
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Lanes {
    pub weather: Vec<MeasurementRecord>,
    pub air_quality_a: Vec<MeasurementRecord>,
    pub air_quality_b: Vec<MeasurementRecord>,
    /// 以抓取结果形式出现的历史记录，按行直接并入
    pub historical: Vec<MeasurementRecord>,
}

impl Lanes {
    pub fn lane(&self, tag: SourceTag) -> &[MeasurementRecord] {
        match tag {
            SourceTag::Weather => &self.weather,
            SourceTag::AirQualityA => &self.air_quality_a,
            SourceTag::AirQualityB => &self.air_quality_b,
            SourceTag::Historical => &self.historical,
        }
    }

    fn lane_mut(&mut self, tag: SourceTag) -> &mut Vec<MeasurementRecord> {
        match tag {
            SourceTag::Weather => &mut self.weather,
            SourceTag::AirQualityA => &mut self.air_quality_a,
            SourceTag::AirQualityB => &mut self.air_quality_b,
            SourceTag::Historical => &mut self.historical,
        }
    }

    /// 所有通道的记录总数
    pub fn len(&self) -> usize {
        self.weather.len()
            + self.air_quality_a.len()
            + self.air_quality_b.len()
            + self.historical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 把抓取结果分到各自的通道
///
/// 成功与降级的记录都保留为行；被排除的抓取只留下一条错误日志。
pub fn classify(outcomes: Vec<FetchOutcome>) -> Lanes {
    let mut lanes = Lanes::default();
    let mut excluded = 0usize;

    for outcome in outcomes {
        match outcome {
            FetchOutcome::Success(record) | FetchOutcome::Degraded(record) => {
                lanes.lane_mut(record.source).push(record);
            }
            FetchOutcome::Excluded {
                source,
                location,
                reason,
            } => {
                excluded += 1;
                error!(source = %source, location = %location, reason = %reason, "fetch failed after retries, excluded from merge");
            }
        }
    }

    debug!(
        weather = lanes.weather.len(),
        air_quality_a = lanes.air_quality_a.len(),
        air_quality_b = lanes.air_quality_b.len(),
        historical = lanes.historical.len(),
        excluded,
        "outcomes classified"
    );
    lanes
}
