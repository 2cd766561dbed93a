//! Definition file loading

use anyhow::{Context, Result};
use keel_core::Pipeline;
use keel_lua::{ModuleRegistry, create_definition_sandbox, parse_stages_with};
use std::path::Path;
use tracing::info;

use crate::config::Config;

/// Modules available to definition files run from the CLI
pub fn definition_registry(config: &Config) -> ModuleRegistry {
    keel_lua::definition_registry(&config.settings, config.variables.clone())
}

/// Read, evaluate and validate a definition file
pub fn load_definition(path: &Path, config: &Config) -> Result<Pipeline> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read definition file: {}", path.display()))?;

    let lua = create_definition_sandbox().context("Failed to create definition sandbox")?;
    definition_registry(config)
        .register_all(&lua)
        .context("Failed to register definition modules")?;

    let chunk_name = format!("@{}", path.display());
    let stages = parse_stages_with(&lua, &chunk_name, &source, &config.settings)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    let pipeline = Pipeline::new(stages)
        .with_context(|| format!("Invalid pipeline in {}", path.display()))?;

    info!(
        file = %path.display(),
        stages = pipeline.len(),
        "Loaded definition"
    );
    Ok(pipeline)
}
