//! Pipeline statistics.

use std::fmt;
use std::time::Duration;

use dispatcher::DispatchReport;
use enrichment::ChainReport;
use observability::FetchTally;

/// Wall time spent in each stage
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StageTimings {
    pub fetch: Duration,
    pub historical: Duration,
    pub reconcile: Duration,
    pub transform: Duration,
    pub dispatch: Duration,
}

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Locations requested
    pub locations: usize,

    /// Fetch outcomes per lane
    pub fetch: FetchTally,

    /// Highest number of simultaneous fetches observed at the gate
    pub peak_in_flight: usize,

    /// Rows read from the historical provider
    pub historical_rows: usize,

    /// Rows in the final table
    pub output_rows: usize,

    /// Columns of the final table, canonical order
    pub output_columns: Vec<String>,

    /// Which transforms ran and which were skipped
    pub transforms: ChainReport,

    /// Per-sink delivery results
    pub dispatch: DispatchReport,

    pub timings: StageTimings,

    /// Total duration of the run
    pub duration: Duration,
}

impl PipelineStats {
    /// True when every fetch succeeded, every transform applied and every sink delivered
    pub fn is_clean(&self) -> bool {
        let total = self.fetch.total();
        total.degraded == 0
            && total.excluded == 0
            && self.transforms.is_clean()
            && self.dispatch.failed() == 0
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("{self}");
    }
}

impl fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.fetch.total();

        writeln!(f, "\n╔══════════════════════════════════════════════════════════════╗")?;
        writeln!(f, "║                    Pipeline Statistics                       ║")?;
        writeln!(f, "╚══════════════════════════════════════════════════════════════╝\n")?;

        writeln!(f, "📊 Overview")?;
        writeln!(f, "   ├─ Duration: {:.2}s", self.duration.as_secs_f64())?;
        writeln!(f, "   ├─ Locations: {}", self.locations)?;
        writeln!(f, "   ├─ Peak in-flight fetches: {}", self.peak_in_flight)?;
        writeln!(f, "   ├─ Historical rows: {}", self.historical_rows)?;
        writeln!(f, "   └─ Output rows: {}", self.output_rows)?;

        writeln!(f, "\n🌐 Fetches ({})", total.total())?;
        for (tag, lane) in &self.fetch.lanes {
            writeln!(
                f,
                "   ├─ {tag}: {} success, {} degraded, {} excluded",
                lane.success, lane.degraded, lane.excluded
            )?;
        }
        writeln!(f, "   └─ Fetch stage: {:.2}s", self.timings.fetch.as_secs_f64())?;

        writeln!(f, "\n🔧 Transforms")?;
        writeln!(f, "   ├─ Applied: {}", self.transforms.applied.join(", "))?;
        if self.transforms.failed.is_empty() {
            writeln!(f, "   └─ Skipped: none")?;
        } else {
            writeln!(f, "   └─ Skipped:")?;
            for failure in &self.transforms.failed {
                writeln!(f, "        - {}: {}", failure.step, failure.message)?;
            }
        }

        writeln!(f, "\n📤 Sinks ({})", self.dispatch.deliveries.len())?;
        for (i, delivery) in self.dispatch.deliveries.iter().enumerate() {
            let prefix = if i + 1 == self.dispatch.deliveries.len() {
                "└─"
            } else {
                "├─"
            };
            writeln!(f, "   {prefix} {}: {}", delivery.sink, delivery.outcome)?;
        }

        Ok(())
    }
}
