//! # Dispatcher
//!
//! 数据分发模块。
//!
//! 负责：
//! - 把最终表并发交给所有 sink
//! - 每个 sink 独立重试，失败只影响自身
//! - 所有 sink 的重试序列结束后才返回（第二个屏障）

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod sinks;

pub use contracts::{DataSink, Table};
pub use dispatcher::{create_dispatcher, create_sink_handle, DispatchReport, Dispatcher};
pub use error::DispatcherError;
pub use handle::{DeliveryOutcome, PendingDelivery, SinkDelivery, SinkHandle};
pub use crate::metrics::{MetricsSnapshot, SinkMetrics};
pub use sinks::{ConsoleSink, CsvFileSink, CsvLayout, LogSink, WriteMode};
