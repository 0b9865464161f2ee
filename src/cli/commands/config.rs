//! `evalgrid config check`

use anyhow::{Context, Result};
use std::path::Path;

use crate::config::EvaluationConfig;

/// Load, override from the environment and validate a configuration
pub async fn run_config_check(path: &Path) -> Result<()> {
    let config = EvaluationConfig::load(path)
        .await
        .with_context(|| format!("Failed to load {}", path.display()))?;
    config.validate()?;

    let resources = &config.resources;
    println!("Configuration OK: {}", path.display());
    println!("  run id:     {}", config.run_id);
    println!("  workspace:  {}", config.workspace_dir().display());
    println!(
        "  scheme:     {} (train {}, test {})",
        config.cross_validation.scheme,
        config.cross_validation.train_window,
        config.cross_validation.test_window
    );
    println!(
        "  workers:    {} local, {} remote node(s), {} total",
        resources.resolved_local_workers(),
        resources.remote_nodes(),
        resources.total_workers()
    );
    Ok(())
}
