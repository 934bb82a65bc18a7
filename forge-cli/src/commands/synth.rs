use crate::output::{self, OutputFormat};
use anyhow::{Context, Result};
use forge_stack::{synthesize, ForgeStack};
use std::path::Path;

pub fn handle_synth(stack: &ForgeStack, out: Option<&Path>, format: OutputFormat) -> Result<()> {
    if let Some(dir) = out {
        let assembly = synthesize(stack, dir).with_context(|| format!("Failed to write {}", dir.display()))?;
        output::print_success(&format!(
            "Synthesized '{}' to {}",
            stack.name(),
            assembly.template_file.display()
        ));
        return Ok(());
    }

    let template = stack.template();
    let rendered = match format {
        OutputFormat::Yaml => template.to_yaml()?,
        OutputFormat::Json | OutputFormat::Table => template.to_json_pretty()?,
    };
    println!("{}", rendered);

    Ok(())
}
