//! Command implementations.

mod info;
mod run;
mod validate;

pub use info::run_info;
pub use run::{apply_overrides, run_pipeline};
pub use validate::run_validate;

use std::path::Path;

use anyhow::{Context, Result};
use config_loader::{ConfigLoader, PipelineBlueprint};
use tracing::info;

/// Load the blueprint from `path`, or the built-in defaults when no path is given
pub fn load_blueprint(path: Option<&Path>) -> Result<PipelineBlueprint> {
    match path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Configuration file not found: {}", path.display());
            }
            info!(config = %path.display(), "Loading configuration");
            ConfigLoader::load_from_path(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))
        }
        None => {
            info!("No configuration file given, using built-in defaults");
            Ok(PipelineBlueprint::default())
        }
    }
}

/// Human-readable origin of the configuration
fn config_origin(path: Option<&Path>) -> String {
    path.map(|p| p.display().to_string())
        .unwrap_or_else(|| "<built-in defaults>".to_string())
}
