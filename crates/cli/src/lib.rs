//! # Atmos CLI
//!
//! 命令行接口与管道编排。
//!
//! 提供：
//! - 配置加载与验证（文件 / 内置默认 + 命令行覆盖）
//! - 由配置构建抓取计划、历史数据源、变换链和输出分发器
//! - 单次运行的编排入口 `Pipeline::run`

pub mod cli;
pub mod commands;
pub mod pipeline;

pub use pipeline::{Pipeline, PipelineBuilder, PipelineStats};
