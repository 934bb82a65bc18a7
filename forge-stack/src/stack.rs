//! The Forge stack: one linear pass over the builders
//!
//! Order: admin role, cluster, repositories, bucket, the two access bindings,
//! then their role outputs. The graph is validated before it is returned.

use crate::access::{bind_bucket_access, bind_repository_access, AccessBinding, PermissionGrant};
use crate::config::StackConfig;
use crate::graph::StackContext;
use crate::outputs;
use crate::resources::{
    account_root_principal, build_admin_role, build_bucket, build_cluster, build_repository_set, AdminRole,
    ClusterResource, DataBucket, RepositorySet,
};
use crate::template::Template;
use forge_common::Result;
use tracing::info;

const DESCRIPTION: &str = "Forge build/test cluster: EKS on Fargate, image repositories and workflow data bucket";

#[derive(Debug, Clone)]
pub struct ForgeStack {
    pub context: StackContext,
    pub admin_role: AdminRole,
    pub cluster: ClusterResource,
    pub repositories: RepositorySet,
    pub bucket: DataBucket,
    pub bucket_access: AccessBinding,
    pub repository_access: AccessBinding,
}

impl ForgeStack {
    /// Build every resource described by `config`
    ///
    /// Fails on the first local contract violation. Name collisions and
    /// permission denials are only detected by the deployment backend.
    pub fn build(config: &StackConfig) -> Result<Self> {
        let mut ctx = StackContext::new(&config.stack_name, config.env.stack_env());

        let principal = account_root_principal(&ctx);
        let admin_role = build_admin_role(&mut ctx, &config.cluster.admin_role_name, principal)?;
        let mut cluster = build_cluster(&mut ctx, config.cluster.props(), &admin_role)?;
        let repositories = build_repository_set(&mut ctx, &config.repositories)?;
        let bucket = build_bucket(&mut ctx, &config.bucket.name)?;

        let bucket_access = bind_bucket_access(&mut ctx, &mut cluster, &config.workloads.bucket_access, &bucket)?;
        let repository_access = bind_repository_access(&mut ctx, &mut cluster, &config.workloads.repository_access)?;

        for binding in [&bucket_access, &repository_access] {
            let account = &binding.identity.account;
            let description = format!("Role for service account {}/{}", account.namespace, account.name);
            outputs::emit_described(&mut ctx, binding.purpose.output_label(), binding.role_arn(), &description)?;
        }

        ctx.validate()?;

        info!(
            stack = %ctx.stack_name(),
            env = %ctx.env().uri(),
            resources = ctx.len(),
            outputs = ctx.outputs().count(),
            "Built stack"
        );

        Ok(Self {
            context: ctx,
            admin_role,
            cluster,
            repositories,
            bucket,
            bucket_access,
            repository_access,
        })
    }

    pub fn name(&self) -> &str {
        self.context.stack_name()
    }

    pub fn template(&self) -> Template {
        Template::from_context(&self.context).with_description(DESCRIPTION)
    }

    pub fn bindings(&self) -> [&AccessBinding; 2] {
        [&self.bucket_access, &self.repository_access]
    }

    pub fn grants(&self) -> impl Iterator<Item = &PermissionGrant> {
        self.bindings().into_iter().map(|b| &b.grant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::WorkloadPurpose;
    use crate::resources::KUBERNETES_MANIFEST;
    use serde_json::json;

    #[test]
    fn test_build_default_stack() {
        let stack = ForgeStack::build(&StackConfig::default()).unwrap();

        assert_eq!(stack.name(), "Forge");
        assert_eq!(stack.cluster.name, "Forge");
        assert_eq!(stack.admin_role.role_name, "ForgeAdmin");
        assert_eq!(stack.bucket.bucket_name, "forge-workflow-data-2");
        assert_eq!(stack.repositories.iter().count(), 3);
        assert_eq!(stack.context.resources_of_type(KUBERNETES_MANIFEST).count(), 2);
        assert!(stack.cluster.has_oidc_provider());
    }

    #[test]
    fn test_role_outputs_emitted() {
        let stack = ForgeStack::build(&StackConfig::default()).unwrap();

        let bucket_role = stack.context.output("s3-workflow-data-access-role").unwrap();
        assert_eq!(bucket_role.value, stack.bucket_access.role_arn());

        let repo_role = stack.context.output("ecr-access-role").unwrap();
        assert_eq!(
            repo_role.value,
            json!({ "Fn::GetAtt": ["ForgeecrcontaineraccessRole", "Arn"] })
        );

        assert_eq!(stack.context.outputs().count(), 4);
    }

    #[test]
    fn test_grants_in_binding_order() {
        let stack = ForgeStack::build(&StackConfig::default()).unwrap();
        let purposes: Vec<_> = stack.grants().map(|g| g.purpose).collect();
        assert_eq!(purposes, vec![WorkloadPurpose::BucketAccess, WorkloadPurpose::RepositoryAccess]);
    }

    #[test]
    fn test_template_has_description() {
        let template = ForgeStack::build(&StackConfig::default()).unwrap().template();
        assert_eq!(template.description.as_deref(), Some(DESCRIPTION));
        assert_eq!(template.outputs.len(), 4);
    }
}
