//! # Reconcile
//!
//! 抓取结果的分类与合并。
//!
//! 负责：
//! - 按数据源把 `FetchOutcome` 分到各自的通道，丢弃被排除的抓取
//! - 以天气通道为主表，左连接两路空气质量数据
//! - 追加历史记录并按 (地点, 时间) 稳定排序
//!
//! ## 使用示例
//!
//! ```ignore
//! use reconcile::{read_historical, reconcile};
//!
//! let outcomes = plan.execute(&locations, &gate).await;
//! let historical = read_historical(&provider).await;
//! let table = reconcile(outcomes, historical);
//! ```

mod classify;
mod merge;

pub use classify::{classify, Lanes};
pub use merge::{merge, row_from_record};

use contracts::{FetchOutcome, HistoricalProvider, Table};
use tracing::{error, info, instrument};

/// 分类 + 合并
#[instrument(name = "reconcile", skip_all, fields(outcomes = outcomes.len(), historical_rows = historical.len()))]
pub fn reconcile(outcomes: Vec<FetchOutcome>, historical: Table) -> Table {
    let lanes = classify(outcomes);
    let table = merge(lanes, historical);
    info!(rows = table.len(), "merged table ready");
    metrics::gauge!("atmos_merged_rows").set(table.len() as f64);
    table
}

/// 读取历史表；失败时记录错误并返回空表，不会中止运行
pub async fn read_historical<P: HistoricalProvider>(provider: &P) -> Table {
    match provider.read_all().await {
        Ok(table) => {
            info!(provider = provider.name(), rows = table.len(), "historical table loaded");
            table
        }
        Err(e) => {
            error!(
                provider = provider.name(),
                error = %e,
                "historical read failed, continuing with an empty table"
            );
            metrics::counter!("atmos_historical_read_failures_total").increment(1);
            Table::empty()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Column, ContractError, MergedRow};

    struct FailingHistorical;

    impl HistoricalProvider for FailingHistorical {
        fn name(&self) -> &str {
            "failing"
        }

        async fn read_all(&self) -> Result<Table, ContractError> {
            Err(ContractError::historical_read("failing", "permission denied"))
        }
    }

    struct FixedHistorical(Table);

    impl HistoricalProvider for FixedHistorical {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn read_all(&self) -> Result<Table, ContractError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_historical_failure_falls_back_to_empty() {
        let table = read_historical(&FailingHistorical).await;
        assert!(table.is_empty());
        assert_eq!(table.columns().count(), 0);
    }

    #[tokio::test]
    async fn test_historical_success_passes_table_through() {
        let mut fixture = Table::with_columns([Column::Location, Column::Source]);
        fixture.push(MergedRow::new("Rome"));
        let table = read_historical(&FixedHistorical(fixture.clone())).await;
        assert_eq!(table, fixture);
    }

    #[test]
    fn test_all_lanes_empty_gives_empty_table() {
        let table = reconcile(Vec::new(), Table::empty());
        assert!(table.is_empty());
        assert_eq!(table.columns().count(), 0);
    }
}
