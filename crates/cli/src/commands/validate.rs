//! `validate` command implementation.

use anyhow::{Context, Result};
use config_loader::PipelineBlueprint;
use contracts::{SourceKind, SourceTag};
use enrichment::TransformRegistry;
use serde::Serialize;
use tracing::info;

use super::{config_origin, load_blueprint};
use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    location_count: usize,
    max_concurrency: usize,
    transforms: Vec<String>,
    sink_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %config_origin(args.config.as_deref()), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = config_origin(args.config.as_deref());

    let checked = load_blueprint(args.config.as_deref()).and_then(|blueprint| {
        TransformRegistry::standard()
            .resolve(&blueprint.pipeline.transforms)
            .context("Failed to resolve transform chain")?;
        Ok(blueprint)
    });

    match checked {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    location_count: blueprint.pipeline.locations.len(),
                    max_concurrency: blueprint.pipeline.max_concurrency,
                    transforms: blueprint.pipeline.transforms.clone(),
                    sink_count: blueprint.sinks.len(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("{e:#}")),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &PipelineBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.sinks.is_empty() {
        warnings.push("No sinks configured - the final table will be dropped".to_string());
    }

    for (tag, source) in blueprint.sources.lanes() {
        if source.kind == SourceKind::Mock {
            warnings.push(format!("Source '{tag}' uses synthetic mock data"));
        }
    }

    let weather = &blueprint.sources.weather;
    if weather.kind == SourceKind::OpenWeather {
        let var = weather
            .params
            .get("api_key_env")
            .map(String::as_str)
            .unwrap_or("WEATHER_API_KEY");
        if std::env::var(var).map(|v| v.trim().is_empty()).unwrap_or(true) {
            warnings.push(format!(
                "Environment variable {var} is not set - the {} source cannot start",
                SourceTag::Weather
            ));
        }
    }

    if let Some(historical) = &blueprint.historical {
        if !historical.path.exists() {
            warnings.push(format!(
                "Historical file {} does not exist - the run will continue without it",
                historical.path.display()
            ));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Locations: {}", summary.location_count);
            println!("  Max concurrency: {}", summary.max_concurrency);
            println!("  Transforms: {}", summary.transforms.join(", "));
            println!("  Sinks: {}", summary.sink_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
