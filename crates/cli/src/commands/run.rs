//! `run` command implementation.

use anyhow::{Context, Result};
use config_loader::{ConfigLoader, PipelineBlueprint};
use contracts::HistoricalConfig;
use tracing::{info, warn};

use super::load_blueprint;
use crate::cli::RunArgs;
use crate::pipeline::PipelineBuilder;

/// Execute the `run` command
///
/// Only setup failures are returned as errors; a run that degraded, excluded
/// or failed to deliver still exits successfully.
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    let mut blueprint = load_blueprint(args.config.as_deref())?;
    apply_overrides(&mut blueprint, args);
    ConfigLoader::validate(&blueprint).context("Invalid configuration after CLI overrides")?;

    info!(
        locations = blueprint.pipeline.locations.len(),
        max_concurrency = blueprint.pipeline.max_concurrency,
        transforms = blueprint.pipeline.transforms.len(),
        sinks = blueprint.sinks.len(),
        "Configuration loaded"
    );

    let builder = PipelineBuilder::new(blueprint);

    // Dry run - validate, resolve the chain and exit
    if args.dry_run {
        builder.resolve_chain()?;
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(builder.blueprint());
        return Ok(());
    }

    let pipeline = builder.build().context("Failed to build pipeline")?;

    let shutdown_signal = setup_shutdown_signal();

    info!("Starting pipeline...");

    tokio::select! {
        stats = pipeline.run() => {
            info!(
                rows = stats.output_rows,
                duration_secs = stats.duration.as_secs_f64(),
                clean = stats.is_clean(),
                "Pipeline completed"
            );
            stats.print_summary();
        }
        _ = shutdown_signal => {
            warn!("Received shutdown signal, stopping pipeline...");
        }
    }

    info!("Atmos finished");
    Ok(())
}

/// Apply command-line overrides on top of the loaded blueprint
pub fn apply_overrides(blueprint: &mut PipelineBlueprint, args: &RunArgs) {
    if !args.locations.is_empty() {
        let locations: Vec<String> = args
            .locations
            .iter()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        info!(count = locations.len(), "Overriding locations from CLI");
        blueprint.pipeline.locations = locations;
    }
    if let Some(k) = args.max_concurrency {
        info!(max_concurrency = k, "Overriding max concurrency from CLI");
        blueprint.pipeline.max_concurrency = k;
    }
    if !args.transforms.is_empty() {
        info!(transforms = ?args.transforms, "Overriding transform chain from CLI");
        blueprint.pipeline.transforms = args.transforms.clone();
    }
    if let Some(ref path) = args.historical {
        info!(path = %path.display(), "Overriding historical CSV from CLI");
        blueprint.historical = Some(HistoricalConfig { path: path.clone() });
    }
}

/// Ctrl+C and SIGTERM
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &PipelineBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Locations ({}):", blueprint.pipeline.locations.len());
    for location in &blueprint.pipeline.locations {
        println!("  - {location}");
    }
    println!("\nMax concurrency: {}", blueprint.pipeline.max_concurrency);
    println!(
        "Retry: {} attempts, {} ms apart",
        blueprint.pipeline.retry.attempts, blueprint.pipeline.retry.delay_ms
    );

    println!("\nSources:");
    for (tag, source) in blueprint.sources.lanes() {
        println!(
            "  - {tag}: {:?} (on exhaustion: {:?})",
            source.kind,
            blueprint.failure_policy(tag)
        );
    }

    match &blueprint.historical {
        Some(historical) => println!("\nHistorical: {}", historical.path.display()),
        None => println!("\nHistorical: none"),
    }

    println!("\nTransforms: {}", blueprint.pipeline.transforms.join(" → "));

    if !blueprint.sinks.is_empty() {
        println!("\nSinks ({}):", blueprint.sinks.len());
        for sink in &blueprint.sinks {
            println!("  - {} ({:?})", sink.name, sink.sink_type);
        }
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_overrides() {
        let mut blueprint = PipelineBlueprint::default();
        let args = RunArgs {
            locations: vec![" Oslo ".into(), "".into(), "Lima".into()],
            max_concurrency: Some(2),
            transforms: vec!["fill_missing".into()],
            historical: Some(PathBuf::from("old.csv")),
            ..Default::default()
        };

        apply_overrides(&mut blueprint, &args);

        assert_eq!(blueprint.pipeline.locations, ["Oslo", "Lima"]);
        assert_eq!(blueprint.pipeline.max_concurrency, 2);
        assert_eq!(blueprint.pipeline.transforms, ["fill_missing"]);
        assert_eq!(
            blueprint.historical.map(|h| h.path),
            Some(PathBuf::from("old.csv"))
        );
    }

    #[test]
    fn test_no_overrides_keeps_blueprint() {
        let mut blueprint = PipelineBlueprint::default();
        apply_overrides(&mut blueprint, &RunArgs::default());
        assert_eq!(blueprint.pipeline.locations.len(), 20);
        assert_eq!(blueprint.pipeline.max_concurrency, 5);
    }

    #[test]
    fn test_zero_concurrency_override_fails_validation() {
        let mut blueprint = PipelineBlueprint::default();
        let args = RunArgs {
            max_concurrency: Some(0),
            ..Default::default()
        };
        apply_overrides(&mut blueprint, &args);
        assert!(ConfigLoader::validate(&blueprint).is_err());
    }
}
