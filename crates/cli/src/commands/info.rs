//! `info` command implementation.

use std::collections::HashMap;

use anyhow::{Context, Result};
use config_loader::PipelineBlueprint;
use enrichment::TransformRegistry;
use serde::Serialize;
use tracing::info;

use super::{config_origin, load_blueprint};
use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    locations: Vec<String>,
    max_concurrency: usize,
    retry: RetryInfo,
    sources: Vec<SourceInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    historical: Option<String>,
    transforms: Vec<String>,
    available_transforms: Vec<String>,
    sinks: Vec<SinkInfo>,
}

#[derive(Serialize)]
struct RetryInfo {
    attempts: u32,
    delay_ms: u64,
}

#[derive(Serialize)]
struct SourceInfo {
    lane: String,
    kind: String,
    on_exhaustion: String,
    retry: RetryInfo,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    params: HashMap<String, String>,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    retry: RetryInfo,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    params: HashMap<String, String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %config_origin(args.config.as_deref()), "Loading configuration info");

    let blueprint = load_blueprint(args.config.as_deref())?;
    let registry = TransformRegistry::standard();

    if args.json {
        let info = build_config_info(&blueprint, &registry);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint, &registry);
    }

    Ok(())
}

fn build_config_info(blueprint: &PipelineBlueprint, registry: &TransformRegistry) -> ConfigInfo {
    let sources = blueprint
        .sources
        .lanes()
        .into_iter()
        .map(|(tag, source)| {
            let retry = blueprint.source_retry(tag);
            SourceInfo {
                lane: tag.to_string(),
                kind: format!("{:?}", source.kind),
                on_exhaustion: format!("{:?}", blueprint.failure_policy(tag)),
                retry: RetryInfo {
                    attempts: retry.attempts,
                    delay_ms: retry.delay_ms,
                },
                params: source.params.clone(),
            }
        })
        .collect();

    let sinks = blueprint
        .sinks
        .iter()
        .map(|s| {
            let retry = blueprint.sink_retry(s);
            SinkInfo {
                name: s.name.clone(),
                sink_type: format!("{:?}", s.sink_type),
                retry: RetryInfo {
                    attempts: retry.attempts,
                    delay_ms: retry.delay_ms,
                },
                params: s.params.clone(),
            }
        })
        .collect();

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        locations: blueprint.pipeline.locations.clone(),
        max_concurrency: blueprint.pipeline.max_concurrency,
        retry: RetryInfo {
            attempts: blueprint.pipeline.retry.attempts,
            delay_ms: blueprint.pipeline.retry.delay_ms,
        },
        sources,
        historical: blueprint
            .historical
            .as_ref()
            .map(|h| h.path.display().to_string()),
        transforms: blueprint.pipeline.transforms.clone(),
        available_transforms: registry.names(),
        sinks,
    }
}

fn print_config_info(blueprint: &PipelineBlueprint, registry: &TransformRegistry) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                   Atmos Configuration                        ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    // Run settings
    println!("📍 Run");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   ├─ Max concurrency: {}", blueprint.pipeline.max_concurrency);
    println!(
        "   ├─ Retry: {} attempts, {} ms apart",
        blueprint.pipeline.retry.attempts, blueprint.pipeline.retry.delay_ms
    );
    println!(
        "   └─ Locations ({}): {}",
        blueprint.pipeline.locations.len(),
        blueprint.pipeline.locations.join(", ")
    );

    // Sources
    println!("\n🌐 Sources");
    let lanes = blueprint.sources.lanes();
    for (i, (tag, source)) in lanes.iter().enumerate() {
        let prefix = if i == lanes.len() - 1 { "└─" } else { "├─" };
        println!(
            "   {} {} ({:?}, on exhaustion: {:?})",
            prefix,
            tag,
            source.kind,
            blueprint.failure_policy(*tag)
        );
    }
    match &blueprint.historical {
        Some(historical) => println!("   📜 Historical: {}", historical.path.display()),
        None => println!("   📜 Historical: none"),
    }

    // Transforms
    println!("\n⚙️  Transform chain");
    for (i, name) in blueprint.pipeline.transforms.iter().enumerate() {
        let prefix = if i == blueprint.pipeline.transforms.len() - 1 {
            "└─"
        } else {
            "├─"
        };
        println!("   {} {}. {}", prefix, i + 1, name);
    }
    println!("   Available: {}", registry.names().join(", "));

    // Sinks
    if !blueprint.sinks.is_empty() {
        println!("\n📤 Sinks ({})", blueprint.sinks.len());
        for (i, sink) in blueprint.sinks.iter().enumerate() {
            let is_last = i == blueprint.sinks.len() - 1;
            let prefix = if is_last { "└─" } else { "├─" };
            println!("   {} {} ({:?})", prefix, sink.name, sink.sink_type);
        }
    }

    println!();
}
