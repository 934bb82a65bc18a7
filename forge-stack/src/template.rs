//! Template Types
//!
//! The rendered form of a stack handed to the deployment backend. Keys are
//! kept in sorted maps so identical graphs render byte-identical templates.

use crate::graph::{ResourceNode, StackContext};
use crate::outputs::StackOutput;
use forge_common::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const FORMAT_VERSION: &str = "2010-09-09";

/// Rendered resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TemplateResource {
    #[serde(rename = "Type")]
    pub resource_type: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub properties: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub depends_on: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_replace_policy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<String>,
}

impl From<&ResourceNode> for TemplateResource {
    fn from(node: &ResourceNode) -> Self {
        let policy = node.removal_policy.map(|p| p.as_str().to_string());
        Self {
            resource_type: node.resource_type.clone(),
            properties: node.properties.clone(),
            depends_on: node.depends_on.iter().map(|id| id.to_string()).collect(),
            update_replace_policy: policy.clone(),
            deletion_policy: policy,
        }
    }
}

/// Rendered output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TemplateOutput {
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl From<&StackOutput> for TemplateOutput {
    fn from(output: &StackOutput) -> Self {
        Self {
            value: output.value.clone(),
            description: output.description.clone(),
        }
    }
}

/// Complete stack template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub resources: BTreeMap<String, TemplateResource>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub outputs: BTreeMap<String, TemplateOutput>,
}

impl Template {
    pub fn new() -> Self {
        Self {
            format_version: FORMAT_VERSION.to_string(),
            description: None,
            resources: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }

    /// Render every node and output in the context
    pub fn from_context(ctx: &StackContext) -> Self {
        let resources = ctx
            .resources()
            .map(|node| (node.logical_id.to_string(), TemplateResource::from(node)))
            .collect();
        let outputs = ctx
            .outputs()
            .map(|output| (output.logical_id().to_string(), TemplateOutput::from(output)))
            .collect();

        Self {
            resources,
            outputs,
            ..Self::new()
        }
    }

    pub fn with_description(mut self, desc: &str) -> Self {
        self.description = Some(desc.to_string());
        self
    }

    pub fn resource(&self, logical_id: &str) -> Option<&TemplateResource> {
        self.resources.get(logical_id)
    }

    pub fn resources_of_type<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a TemplateResource)> + 'a {
        self.resources
            .iter()
            .filter(move |(_, r)| r.resource_type == resource_type)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| Error::Render(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for Template {
    fn default() -> Self {
        Self::new()
    }
}
