use crate::output::{self, OutputFormat};
use anyhow::{bail, Context, Result};
use forge_stack::StackConfig;
use std::path::Path;

pub fn show(config: &StackConfig, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", toml::to_string_pretty(config)?),
        _ => output::print_single(config, format)?,
    }
    Ok(())
}

pub fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists; use --force to overwrite", path.display());
    }

    std::fs::write(path, StackConfig::generate_sample())
        .with_context(|| format!("Failed to write {}", path.display()))?;

    output::print_success(&format!("Wrote sample configuration to {}", path.display()));
    Ok(())
}
