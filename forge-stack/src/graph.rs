//! Stack builder context
//!
//! `StackContext` is the explicit graph that every builder takes by `&mut`.
//! Nodes are keyed by logical ID and carry an explicit dependency list; a node
//! can only be added once everything it depends on is already present, so the
//! graph is acyclic by construction and `deployment_order` is always defined.

use crate::env::StackEnv;
use crate::outputs::StackOutput;
use forge_common::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::debug;

/// Template-unique identifier for a node
///
/// Derived from the construct path by concatenating the segments and
/// dropping every non-alphanumeric character, so
/// `Forge/s3-workflow-data-access/Role` becomes `Forges3workflowdataaccessRole`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogicalId(String);

impl LogicalId {
    pub fn from_path(segments: &[&str]) -> Self {
        Self(
            segments
                .iter()
                .flat_map(|s| s.chars())
                .filter(|c| c.is_ascii_alphanumeric())
                .collect(),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extend this ID with further path segments
    pub fn child(&self, segments: &[&str]) -> Self {
        let mut path = vec![self.as_str()];
        path.extend_from_slice(segments);
        Self::from_path(&path)
    }
}

impl fmt::Display for LogicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What happens to the physical resource when it leaves the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemovalPolicy {
    Retain,
    Delete,
}

impl RemovalPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemovalPolicy::Retain => "Retain",
            RemovalPolicy::Delete => "Delete",
        }
    }
}

/// A declared resource
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceNode {
    pub logical_id: LogicalId,
    pub resource_type: String,
    pub properties: BTreeMap<String, Value>,
    pub depends_on: BTreeSet<LogicalId>,
    pub removal_policy: Option<RemovalPolicy>,
}

impl ResourceNode {
    pub fn new(logical_id: LogicalId, resource_type: &str) -> Self {
        Self {
            logical_id,
            resource_type: resource_type.to_string(),
            properties: BTreeMap::new(),
            depends_on: BTreeSet::new(),
            removal_policy: None,
        }
    }

    pub fn with_property(mut self, key: &str, value: Value) -> Self {
        self.properties.insert(key.to_string(), value);
        self
    }

    pub fn depends_on(mut self, dependency: &ResourceRef) -> Self {
        self.depends_on.insert(dependency.logical_id.clone());
        self
    }

    pub fn with_removal_policy(mut self, policy: RemovalPolicy) -> Self {
        self.removal_policy = Some(policy);
        self
    }
}

/// Handle to a node that has been added to a context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    pub logical_id: LogicalId,
    pub resource_type: String,
}

impl ResourceRef {
    /// `{"Ref": <id>}`
    pub fn reference(&self) -> Value {
        json!({ "Ref": self.logical_id.as_str() })
    }

    /// `{"Fn::GetAtt": [<id>, <attribute>]}`
    pub fn get_att(&self, attribute: &str) -> Value {
        json!({ "Fn::GetAtt": [self.logical_id.as_str(), attribute] })
    }
}

/// The graph under construction for one stack
#[derive(Debug, Clone, PartialEq)]
pub struct StackContext {
    stack_name: String,
    env: StackEnv,
    resources: BTreeMap<LogicalId, ResourceNode>,
    outputs: BTreeMap<String, StackOutput>,
}

impl StackContext {
    pub fn new(stack_name: &str, env: StackEnv) -> Self {
        Self {
            stack_name: stack_name.to_string(),
            env,
            resources: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }

    pub fn stack_name(&self) -> &str {
        &self.stack_name
    }

    pub fn env(&self) -> &StackEnv {
        &self.env
    }

    /// Add a node. Every dependency must already be in the graph.
    pub fn add(&mut self, node: ResourceNode) -> Result<ResourceRef> {
        if self.resources.contains_key(&node.logical_id) {
            return Err(Error::DuplicateLogicalId(node.logical_id.to_string()));
        }

        for dependency in &node.depends_on {
            self.require(&node.logical_id, dependency)?;
        }

        debug!(
            logical_id = %node.logical_id,
            resource_type = %node.resource_type,
            dependencies = node.depends_on.len(),
            "Adding resource"
        );

        let handle = ResourceRef {
            logical_id: node.logical_id.clone(),
            resource_type: node.resource_type.clone(),
        };
        self.resources.insert(node.logical_id.clone(), node);

        Ok(handle)
    }

    /// Fail unless `dependency` is present; `resource` names the dependent node
    pub fn require(&self, resource: &LogicalId, dependency: &LogicalId) -> Result<()> {
        if self.resources.contains_key(dependency) {
            Ok(())
        } else {
            Err(Error::MissingDependency {
                resource: resource.to_string(),
                dependency: dependency.to_string(),
            })
        }
    }

    pub fn contains(&self, logical_id: &LogicalId) -> bool {
        self.resources.contains_key(logical_id)
    }

    pub fn get(&self, logical_id: &LogicalId) -> Option<&ResourceNode> {
        self.resources.get(logical_id)
    }

    /// Nodes in logical-ID order
    pub fn resources(&self) -> impl Iterator<Item = &ResourceNode> {
        self.resources.values()
    }

    pub fn resources_of_type<'a>(&'a self, resource_type: &'a str) -> impl Iterator<Item = &'a ResourceNode> + 'a {
        self.resources
            .values()
            .filter(move |node| node.resource_type == resource_type)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Two labels that strip to the same template key are duplicates too
    pub(crate) fn insert_output(&mut self, output: StackOutput) -> Result<()> {
        let key = output.logical_id();
        if self.outputs.values().any(|existing| existing.logical_id() == key) {
            return Err(Error::DuplicateOutput(output.label));
        }
        self.outputs.insert(output.label.clone(), output);
        Ok(())
    }

    /// Emitted outputs in label order
    pub fn outputs(&self) -> impl Iterator<Item = &StackOutput> {
        self.outputs.values()
    }

    pub fn output(&self, label: &str) -> Option<&StackOutput> {
        self.outputs.get(label)
    }

    /// Topological order: every node appears after all of its dependencies.
    /// Ties are broken by logical ID so the order is stable across builds.
    pub fn deployment_order(&self) -> Result<Vec<LogicalId>> {
        let mut remaining: BTreeMap<&LogicalId, usize> = BTreeMap::new();
        let mut dependents: BTreeMap<&LogicalId, Vec<&LogicalId>> = BTreeMap::new();

        for node in self.resources.values() {
            remaining.insert(&node.logical_id, node.depends_on.len());
            for dependency in &node.depends_on {
                self.require(&node.logical_id, dependency)?;
                dependents.entry(dependency).or_default().push(&node.logical_id);
            }
        }

        let mut ready: BTreeSet<&LogicalId> = remaining
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut order = Vec::with_capacity(self.resources.len());

        while let Some(next) = ready.pop_first() {
            order.push(next.clone());
            remaining.remove(next);

            for dependent in dependents.get(next).into_iter().flatten() {
                if let Some(count) = remaining.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(*dependent);
                    }
                }
            }
        }

        if !remaining.is_empty() {
            return Err(Error::DependencyCycle(
                remaining.keys().map(|id| id.to_string()).collect(),
            ));
        }

        Ok(order)
    }

    /// Check that the graph is complete and orderable
    pub fn validate(&self) -> Result<()> {
        self.deployment_order().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str) -> ResourceNode {
        ResourceNode::new(LogicalId::from_path(&[id]), "Test::Resource")
    }

    #[test]
    fn test_logical_id_from_path() {
        let id = LogicalId::from_path(&["Forge", "s3-workflow-data-access", "Role"]);
        assert_eq!(id.as_str(), "Forges3workflowdataaccessRole");

        let bucket = LogicalId::from_path(&["forge-workflow-data-2"]);
        assert_eq!(bucket.as_str(), "forgeworkflowdata2");
        assert_eq!(bucket.child(&["Policy"]).as_str(), "forgeworkflowdata2Policy");
    }

    #[test]
    fn test_add_requires_dependencies() {
        let mut ctx = StackContext::new("Test", StackEnv::Agnostic);
        let phantom = ResourceRef {
            logical_id: LogicalId::from_path(&["Missing"]),
            resource_type: "Test::Resource".to_string(),
        };

        let err = ctx.add(node("Dependent").depends_on(&phantom)).unwrap_err();
        assert!(matches!(err, Error::MissingDependency { ref dependency, .. } if dependency == "Missing"));
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_duplicate_logical_id_rejected() {
        let mut ctx = StackContext::new("Test", StackEnv::Agnostic);
        ctx.add(node("Only")).unwrap();

        let err = ctx.add(node("Only")).unwrap_err();
        assert!(matches!(err, Error::DuplicateLogicalId(_)));
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn test_deployment_order_respects_dependencies() {
        let mut ctx = StackContext::new("Test", StackEnv::Agnostic);
        let role = ctx.add(node("Role")).unwrap();
        let cluster = ctx.add(node("Cluster").depends_on(&role)).unwrap();
        let bucket = ctx.add(node("Bucket")).unwrap();
        ctx.add(node("Policy").depends_on(&cluster).depends_on(&bucket))
            .unwrap();

        let order = ctx.deployment_order().unwrap();
        let position = |id: &str| order.iter().position(|o| o.as_str() == id).unwrap();

        assert_eq!(order.len(), 4);
        assert!(position("Role") < position("Cluster"));
        assert!(position("Cluster") < position("Policy"));
        assert!(position("Bucket") < position("Policy"));
        // Ties broken alphabetically
        assert_eq!(order[0].as_str(), "Bucket");
    }

    #[test]
    fn test_cycle_detected() {
        let mut ctx = StackContext::new("Test", StackEnv::Agnostic);
        let a = ctx.add(node("A")).unwrap();
        ctx.add(node("B").depends_on(&a)).unwrap();

        // Only reachable by editing nodes behind the builder's back
        let b_id = LogicalId::from_path(&["B"]);
        if let Some(a_node) = ctx.resources.get_mut(&a.logical_id) {
            a_node.depends_on.insert(b_id);
        }

        assert!(matches!(ctx.validate(), Err(Error::DependencyCycle(ids)) if ids.len() == 2));
    }

    #[test]
    fn test_reference_tokens() {
        let handle = ResourceRef {
            logical_id: LogicalId::from_path(&["Forge"]),
            resource_type: "AWS::EKS::Cluster".to_string(),
        };
        assert_eq!(handle.reference(), json!({ "Ref": "Forge" }));
        assert_eq!(handle.get_att("Arn"), json!({ "Fn::GetAtt": ["Forge", "Arn"] }));
    }
}
