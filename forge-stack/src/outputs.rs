//! Stack outputs
//!
//! Values surfaced to the deployment backend's output channel so operators
//! can wire them into other workloads after deployment.

use crate::graph::{LogicalId, StackContext};
use forge_common::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackOutput {
    /// Label as emitted, e.g. `ecr-access-role`
    pub label: String,
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl StackOutput {
    /// Template key for this output (`ecr-access-role` -> `ecraccessrole`)
    pub fn logical_id(&self) -> LogicalId {
        LogicalId::from_path(&[&self.label])
    }
}

/// Emit `value` under `label`
pub fn emit(ctx: &mut StackContext, label: &str, value: Value) -> Result<()> {
    emit_output(
        ctx,
        StackOutput {
            label: label.to_string(),
            value,
            description: None,
        },
    )
}

/// Emit with a human-readable description
pub fn emit_described(ctx: &mut StackContext, label: &str, value: Value, description: &str) -> Result<()> {
    emit_output(
        ctx,
        StackOutput {
            label: label.to_string(),
            value,
            description: Some(description.to_string()),
        },
    )
}

fn emit_output(ctx: &mut StackContext, output: StackOutput) -> Result<()> {
    if output.logical_id().as_str().is_empty() || is_empty_value(&output.value) {
        return Err(Error::EmptyOutput(output.label));
    }

    debug!(label = %output.label, "Emitting stack output");
    ctx.insert_output(output)
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}
