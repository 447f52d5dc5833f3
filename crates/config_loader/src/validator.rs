//! 配置校验模块
//!
//! 校验规则：
//! - locations 非空、唯一、无空白项
//! - max_concurrency >= 1
//! - 所有重试策略 attempts >= 1
//! - transform 名称非空
//! - sink 名称非空且唯一，csv sink 的 path 参数非空

use std::collections::HashSet;

use contracts::{ContractError, PipelineBlueprint, RetryPolicy, SinkType};

/// 校验 PipelineBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    validate_locations(blueprint)?;
    validate_concurrency(blueprint)?;
    validate_retry_policies(blueprint)?;
    validate_transforms(blueprint)?;
    validate_sinks(blueprint)?;
    Ok(())
}

/// 校验地点列表
fn validate_locations(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    let locations = &blueprint.pipeline.locations;
    if locations.is_empty() {
        return Err(ContractError::config_validation(
            "pipeline.locations",
            "at least one location is required",
        ));
    }

    let mut seen = HashSet::new();
    for (idx, location) in locations.iter().enumerate() {
        if location.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("pipeline.locations[{}]", idx),
                "location cannot be empty",
            ));
        }
        if !seen.insert(location.as_str()) {
            return Err(ContractError::config_validation(
                format!("pipeline.locations[{}]", idx),
                format!("duplicate location '{}'", location),
            ));
        }
    }
    Ok(())
}

/// 校验并发上限
fn validate_concurrency(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    if blueprint.pipeline.max_concurrency == 0 {
        return Err(ContractError::config_validation(
            "pipeline.max_concurrency",
            "max_concurrency must be >= 1, got 0",
        ));
    }
    Ok(())
}

/// 校验重试策略 (全局 / 数据源 / sink)
fn validate_retry_policies(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    check_retry("pipeline.retry", &blueprint.pipeline.retry)?;

    for (tag, source) in blueprint.sources.lanes() {
        if let Some(ref retry) = source.retry {
            check_retry(&format!("sources.{}.retry", tag.lane_name()), retry)?;
        }
    }

    for sink in &blueprint.sinks {
        if let Some(ref retry) = sink.retry {
            check_retry(&format!("sinks[name={}].retry", sink.name), retry)?;
        }
    }
    Ok(())
}

fn check_retry(field: &str, retry: &RetryPolicy) -> Result<(), ContractError> {
    if retry.attempts == 0 {
        return Err(ContractError::config_validation(
            format!("{}.attempts", field),
            "attempts must be >= 1, got 0",
        ));
    }
    Ok(())
}

/// 校验变换步骤名称 (是否存在于注册表由 enrichment 在运行前解析)
fn validate_transforms(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    for (idx, name) in blueprint.pipeline.transforms.iter().enumerate() {
        if name.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("pipeline.transforms[{}]", idx),
                "transform name cannot be empty",
            ));
        }
    }
    Ok(())
}

/// 校验 sink 配置
fn validate_sinks(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if sink.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{}].name", idx),
                "sink name cannot be empty",
            ));
        }
        if !seen.insert(&sink.name) {
            return Err(ContractError::config_validation(
                format!("sinks[{}].name", idx),
                format!("duplicate sink name '{}'", sink.name),
            ));
        }
        if sink.sink_type == SinkType::Csv {
            if let Some(path) = sink.params.get("path") {
                if path.trim().is_empty() {
                    return Err(ContractError::config_validation(
                        format!("sinks[{}].params.path", idx),
                        "csv sink path cannot be empty",
                    ));
                }
            }
        }
    }
    Ok(())
}
