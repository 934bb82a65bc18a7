//! Read-only views of a built stack

use crate::output::{self, format_value, join_or_dash, truncate, OutputFormat};
use anyhow::Result;
use forge_stack::{AccessBinding, ForgeStack};
use serde::Serialize;
use tabled::Tabled;

#[derive(Tabled, Serialize)]
struct PlanRow {
    step: usize,
    logical_id: String,
    #[tabled(rename = "type")]
    resource_type: String,
    depends_on: String,
}

#[derive(Tabled, Serialize)]
struct OutputRow {
    label: String,
    key: String,
    value: String,
}

#[derive(Tabled, Serialize)]
struct GrantRow {
    purpose: String,
    service_account: String,
    role: String,
    actions: String,
    resources: String,
}

impl From<&AccessBinding> for GrantRow {
    fn from(binding: &AccessBinding) -> Self {
        let statement = &binding.grant.statement;
        Self {
            purpose: format!("{:?}", binding.purpose),
            service_account: format!(
                "{}/{}",
                binding.identity.account.namespace, binding.identity.account.name
            ),
            role: binding.grant.role.to_string(),
            actions: join_or_dash(&statement.actions),
            resources: join_or_dash(statement.resources.iter().map(format_value)),
        }
    }
}

pub fn handle_plan(stack: &ForgeStack, format: OutputFormat) -> Result<()> {
    let order = stack.context.deployment_order()?;

    let rows: Vec<PlanRow> = order
        .iter()
        .enumerate()
        .filter_map(|(i, id)| stack.context.get(id).map(|node| (i, node)))
        .map(|(i, node)| PlanRow {
            step: i + 1,
            logical_id: node.logical_id.to_string(),
            resource_type: node.resource_type.clone(),
            depends_on: join_or_dash(node.depends_on.iter().map(|d| d.to_string())),
        })
        .collect();

    output::print_output(rows, format)
}

pub fn handle_outputs(stack: &ForgeStack, format: OutputFormat) -> Result<()> {
    let rows: Vec<OutputRow> = stack
        .context
        .outputs()
        .map(|o| OutputRow {
            label: o.label.clone(),
            key: o.logical_id().to_string(),
            value: format_value(&o.value),
        })
        .collect();

    output::print_output(rows, format)
}

pub fn handle_grants(stack: &ForgeStack, format: OutputFormat) -> Result<()> {
    let mut rows: Vec<GrantRow> = stack.bindings().into_iter().map(GrantRow::from).collect();

    if format == OutputFormat::Table {
        for row in &mut rows {
            row.resources = truncate(&row.resources, 80);
        }
    }

    output::print_output(rows, format)
}
