//! Cloud assembly output
//!
//! A synthesized stack is a directory holding the rendered template and a
//! manifest naming the stack artifact and its target environment.

use crate::stack::ForgeStack;
use forge_common::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const ASSEMBLY_VERSION: &str = "1.0.0";
pub const STACK_ARTIFACT_TYPE: &str = "aws:cloudformation:stack";

/// Files written by [`synthesize`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudAssembly {
    pub directory: PathBuf,
    pub template_file: PathBuf,
    pub manifest_file: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyManifest {
    pub version: String,
    pub artifacts: BTreeMap<String, StackArtifact>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackArtifact {
    #[serde(rename = "type")]
    pub artifact_type: String,
    /// `aws://<account>/<region>`
    pub environment: String,
    pub properties: ArtifactProperties,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactProperties {
    pub template_file: String,
}

pub fn template_file_name(stack_name: &str) -> String {
    format!("{}.template.json", stack_name)
}

/// Write `stack` as a cloud assembly under `out_dir`, creating it if needed
pub fn synthesize(stack: &ForgeStack, out_dir: &Path) -> Result<CloudAssembly> {
    fs::create_dir_all(out_dir)?;

    let template_name = template_file_name(stack.name());
    let template_file = out_dir.join(&template_name);
    fs::write(&template_file, stack.template().to_json_pretty()?)?;

    let manifest = AssemblyManifest {
        version: ASSEMBLY_VERSION.to_string(),
        artifacts: BTreeMap::from([(
            stack.name().to_string(),
            StackArtifact {
                artifact_type: STACK_ARTIFACT_TYPE.to_string(),
                environment: stack.context.env().uri(),
                properties: ArtifactProperties {
                    template_file: template_name,
                },
            },
        )]),
    };
    let manifest_file = out_dir.join(MANIFEST_FILE);
    fs::write(&manifest_file, serde_json::to_string_pretty(&manifest)?)?;

    info!(stack = %stack.name(), dir = %out_dir.display(), "Synthesized cloud assembly");

    Ok(CloudAssembly {
        directory: out_dir.to_path_buf(),
        template_file,
        manifest_file,
    })
}
