//! Identity primitives: the cluster admin role and shared role/policy nodes

use super::{IAM_POLICY, IAM_ROLE};
use crate::env::StackEnv;
use crate::graph::{LogicalId, ResourceNode, ResourceRef, StackContext};
use forge_common::iam::{PolicyDocument, PolicyStatement, Principal};
use forge_common::{Result, ADMIN_ROLE_NAME};
use serde_json::{json, Value};
use tracing::debug;

/// Role assumed by operators to administer the cluster
#[derive(Debug, Clone, PartialEq)]
pub struct AdminRole {
    pub handle: ResourceRef,
    pub role_name: String,
    pub trust: PolicyDocument,
}

impl AdminRole {
    pub fn logical_id(&self) -> &LogicalId {
        &self.handle.logical_id
    }

    pub fn arn(&self) -> Value {
        self.handle.get_att("Arn")
    }
}

/// Any authenticated member of the stack's account
pub fn account_root_principal(ctx: &StackContext) -> Principal {
    Principal::AccountRoot(ctx.env().account_root_arn())
}

/// Trust policy letting `principal` call `sts:AssumeRole`
pub fn assume_role_policy(principal: Principal) -> PolicyDocument {
    PolicyDocument::new().with_statement(
        PolicyStatement::allow()
            .with_actions(["sts:AssumeRole"])
            .with_principal(principal),
    )
}

/// Role node with a trust document and optional AWS managed policies
pub fn role_node(env: &StackEnv, logical_id: LogicalId, trust: Value, managed_policies: &[&str]) -> ResourceNode {
    let node = ResourceNode::new(logical_id, IAM_ROLE).with_property("AssumeRolePolicyDocument", trust);

    if managed_policies.is_empty() {
        node
    } else {
        let arns: Vec<Value> = managed_policies.iter().map(|p| env.managed_policy_arn(p)).collect();
        node.with_property("ManagedPolicyArns", json!(arns))
    }
}

/// Build the fixed-name admin role
///
/// The name is human-chosen so operators can find the role without reading
/// stack outputs. A collision with an existing role surfaces at deploy time.
/// The logical ID is fixed; only the physical `RoleName` follows `role_name`.
pub fn build_admin_role(ctx: &mut StackContext, role_name: &str, principal: Principal) -> Result<AdminRole> {
    let trust = assume_role_policy(principal);
    let logical_id = LogicalId::from_path(&[ADMIN_ROLE_NAME, "Role"]);

    let node = role_node(ctx.env(), logical_id, trust.to_json(), &[]).with_property("RoleName", json!(role_name));
    let handle = ctx.add(node)?;

    debug!(role = %role_name, "Built admin role");

    Ok(AdminRole {
        handle,
        role_name: role_name.to_string(),
        trust,
    })
}

/// Attach `document` to `role` as its default inline policy
///
/// A role carries at most one default policy; a second attachment is
/// rejected as a duplicate logical ID.
pub fn attach_policy(
    ctx: &mut StackContext,
    role: &ResourceRef,
    document: &PolicyDocument,
    dependencies: &[&ResourceRef],
) -> Result<ResourceRef> {
    let logical_id = role.logical_id.child(&["DefaultPolicy"]);

    let mut node = ResourceNode::new(logical_id.clone(), IAM_POLICY)
        .with_property("PolicyName", json!(logical_id.as_str()))
        .with_property("PolicyDocument", document.to_json())
        .with_property("Roles", json!([role.reference()]))
        .depends_on(role);
    for dependency in dependencies {
        node = node.depends_on(dependency);
    }

    ctx.add(node)
}
