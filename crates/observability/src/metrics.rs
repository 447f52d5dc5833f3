//! 运行指标收集模块
//!
//! 汇总一次运行的抓取结果，记录阶段耗时和输出结果。

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use contracts::{FetchOutcome, SourceTag};
use metrics::{counter, gauge, histogram};

/// 单个通道的结果计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LaneTally {
    pub success: usize,
    pub degraded: usize,
    pub excluded: usize,
}

impl LaneTally {
    pub fn total(&self) -> usize {
        self.success + self.degraded + self.excluded
    }

    fn add(&mut self, outcome: &FetchOutcome) {
        match outcome {
            FetchOutcome::Success(_) => self.success += 1,
            FetchOutcome::Degraded(_) => self.degraded += 1,
            FetchOutcome::Excluded { .. } => self.excluded += 1,
        }
    }
}

/// 按通道统计的抓取结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchTally {
    pub lanes: BTreeMap<SourceTag, LaneTally>,
}

impl FetchTally {
    pub fn from_outcomes(outcomes: &[FetchOutcome]) -> Self {
        let mut tally = Self::default();
        for outcome in outcomes {
            tally.lanes.entry(outcome.source()).or_default().add(outcome);
        }
        tally
    }

    pub fn lane(&self, tag: SourceTag) -> LaneTally {
        self.lanes.get(&tag).copied().unwrap_or_default()
    }

    /// 所有通道合计
    pub fn total(&self) -> LaneTally {
        self.lanes
            .values()
            .fold(LaneTally::default(), |acc, lane| LaneTally {
                success: acc.success + lane.success,
                degraded: acc.degraded + lane.degraded,
                excluded: acc.excluded + lane.excluded,
            })
    }
}

impl fmt::Display for FetchTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.total();
        write!(
            f,
            "{} fetches: {} success, {} degraded, {} excluded",
            total.total(),
            total.success,
            total.degraded,
            total.excluded
        )?;
        for (tag, lane) in &self.lanes {
            write!(
                f,
                "\n  {tag}: {}/{}/{}",
                lane.success, lane.degraded, lane.excluded
            )?;
        }
        Ok(())
    }
}

/// 以 gauge 形式发布本次运行的抓取统计
pub fn record_fetch_tally(tally: &FetchTally) {
    for (tag, lane) in &tally.lanes {
        let lane_name = tag.lane_name();
        gauge!("atmos_run_fetch_success", "lane" => lane_name).set(lane.success as f64);
        gauge!("atmos_run_fetch_degraded", "lane" => lane_name).set(lane.degraded as f64);
        gauge!("atmos_run_fetch_excluded", "lane" => lane_name).set(lane.excluded as f64);
    }
}

/// 记录阶段耗时 (毫秒)
pub fn record_stage_duration(stage: &'static str, elapsed: Duration) {
    histogram!("atmos_stage_duration_ms", "stage" => stage).record(elapsed.as_secs_f64() * 1000.0);
}

/// 记录一次完整运行
pub fn record_run_completed(rows: usize, sinks_delivered: usize, sinks_failed: usize) {
    counter!("atmos_runs_total").increment(1);
    gauge!("atmos_run_output_rows").set(rows as f64);
    gauge!("atmos_run_sinks_delivered").set(sinks_delivered as f64);
    gauge!("atmos_run_sinks_failed").set(sinks_failed as f64);
}
