//! Workload access bindings
//!
//! Each in-cluster workload gets its own service account, federated through
//! the cluster's OIDC provider to an IAM role, and exactly one policy on that
//! role holding the minimum action set for its purpose:
//!
//! * bucket access (`default` namespace): read/write on the one data bucket
//!   and its objects
//! * repository access (`kube-system` namespace): describe-only on every
//!   repository in the account and region
//!
//! The repository grant is scoped by wildcard rather than to the three
//! built-in repositories so that repositories created later stay visible.
//! Narrowing it would silently remove that capability.
//!
//! The two bindings are independent and may be built in either order.

use crate::graph::{LogicalId, ResourceNode, ResourceRef, StackContext};
use crate::resources::eks::{ClusterResource, STS_AUDIENCE};
use crate::resources::iam::{attach_policy, role_node};
use crate::resources::s3::DataBucket;
use crate::resources::KUBERNETES_MANIFEST;
use forge_common::iam::{
    s3_read_write_actions, PolicyDocument, PolicyStatement, Principal, ECR_DESCRIBE_ACTIONS,
};
use forge_common::{
    Result, BUCKET_ACCESS_NAMESPACE, BUCKET_ACCESS_ROLE_OUTPUT, BUCKET_ACCESS_SERVICE_ACCOUNT,
    REPOSITORY_ACCESS_NAMESPACE, REPOSITORY_ACCESS_ROLE_OUTPUT, REPOSITORY_ACCESS_SERVICE_ACCOUNT,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

/// Role ARN annotation read by the pod identity webhook
pub const ROLE_ARN_ANNOTATION: &str = "eks.amazonaws.com/role-arn";

/// Why a workload needs access outside the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadPurpose {
    BucketAccess,
    RepositoryAccess,
}

impl WorkloadPurpose {
    /// Construct ID under the cluster
    pub fn construct_id(&self) -> &'static str {
        match self {
            WorkloadPurpose::BucketAccess => "s3-workflow-data-access",
            WorkloadPurpose::RepositoryAccess => "ecr-container-access",
        }
    }

    pub fn output_label(&self) -> &'static str {
        match self {
            WorkloadPurpose::BucketAccess => BUCKET_ACCESS_ROLE_OUTPUT,
            WorkloadPurpose::RepositoryAccess => REPOSITORY_ACCESS_ROLE_OUTPUT,
        }
    }

    pub fn default_service_account(&self) -> ServiceAccountSpec {
        match self {
            WorkloadPurpose::BucketAccess => {
                ServiceAccountSpec::new(BUCKET_ACCESS_SERVICE_ACCOUNT, BUCKET_ACCESS_NAMESPACE)
            }
            WorkloadPurpose::RepositoryAccess => {
                ServiceAccountSpec::new(REPOSITORY_ACCESS_SERVICE_ACCOUNT, REPOSITORY_ACCESS_NAMESPACE)
            }
        }
    }

    /// The complete set of actions a grant for this purpose may hold
    pub fn allowed_actions(&self) -> Vec<String> {
        match self {
            WorkloadPurpose::BucketAccess => s3_read_write_actions(),
            WorkloadPurpose::RepositoryAccess => ECR_DESCRIBE_ACTIONS.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// Kubernetes service account identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAccountSpec {
    pub name: String,
    pub namespace: String,
}

impl ServiceAccountSpec {
    pub fn new(name: &str, namespace: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
        }
    }

    /// `system:serviceaccount:<namespace>:<name>`
    pub fn subject(&self) -> String {
        format!("system:serviceaccount:{}:{}", self.namespace, self.name)
    }
}

/// Service account bound to an IAM role through the cluster's OIDC provider
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadIdentity {
    pub account: ServiceAccountSpec,
    pub cluster: LogicalId,
    pub role: ResourceRef,
    pub manifest: ResourceRef,
}

impl WorkloadIdentity {
    pub fn role_arn(&self) -> Value {
        self.role.get_att("Arn")
    }
}

/// Policy attached to a workload identity's role
#[derive(Debug, Clone, PartialEq)]
pub struct PermissionGrant {
    pub purpose: WorkloadPurpose,
    pub role: LogicalId,
    pub policy: ResourceRef,
    pub statement: PolicyStatement,
}

impl PermissionGrant {
    /// True when every action is in the purpose's minimum set
    pub fn is_least_privilege(&self) -> bool {
        let allowed = self.purpose.allowed_actions();
        !self.statement.actions.is_empty() && self.statement.actions.iter().all(|a| allowed.contains(a))
    }
}

/// A workload identity with its single grant
#[derive(Debug, Clone, PartialEq)]
pub struct AccessBinding {
    pub purpose: WorkloadPurpose,
    pub identity: WorkloadIdentity,
    pub grant: PermissionGrant,
}

impl AccessBinding {
    /// Externally addressable role identifier to emit as a stack output
    pub fn role_arn(&self) -> Value {
        self.identity.role_arn()
    }
}

/// Add a service account to `cluster` backed by a federated IAM role
///
/// Fails with a missing-dependency error if the cluster is not in `ctx`.
pub fn add_service_account(
    ctx: &mut StackContext,
    cluster: &mut ClusterResource,
    construct_id: &str,
    account: &ServiceAccountSpec,
) -> Result<WorkloadIdentity> {
    let base_id = cluster.logical_id().child(&[construct_id]);
    ctx.require(&base_id, cluster.logical_id())?;

    let provider = cluster.open_id_connect_provider(ctx)?;
    let trust = web_identity_trust(&provider, cluster, account)?;

    let role = role_node(ctx.env(), base_id.child(&["Role"]), trust, &[]).depends_on(&provider);
    let role = ctx.add(role)?;

    let manifest = ctx.add(
        ResourceNode::new(base_id.child(&["manifest"]), KUBERNETES_MANIFEST)
            .with_property("ClusterName", cluster.handle.reference())
            .with_property(
                "Manifest",
                json!([{
                    "apiVersion": "v1",
                    "kind": "ServiceAccount",
                    "metadata": {
                        "name": account.name,
                        "namespace": account.namespace,
                        "labels": { "app.kubernetes.io/name": account.name },
                        "annotations": { ROLE_ARN_ANNOTATION: role.get_att("Arn") }
                    }
                }]),
            )
            .depends_on(&cluster.handle)
            .depends_on(&role),
    )?;

    Ok(WorkloadIdentity {
        account: account.clone(),
        cluster: cluster.logical_id().clone(),
        role,
        manifest,
    })
}

/// Trust document for `sts:AssumeRoleWithWebIdentity` from one service account
///
/// IAM condition keys embed the issuer host, which is only known once the
/// cluster exists, so the document is rendered through `Fn::Sub`.
fn web_identity_trust(provider: &ResourceRef, cluster: &ClusterResource, account: &ServiceAccountSpec) -> Result<Value> {
    let document = PolicyDocument::new().with_statement(
        PolicyStatement::allow()
            .with_actions(["sts:AssumeRoleWithWebIdentity"])
            .with_principal(Principal::Federated(json!("${ProviderArn}")))
            .with_condition(json!({
                "StringEquals": {
                    "${IssuerHost}:aud": STS_AUDIENCE,
                    "${IssuerHost}:sub": account.subject(),
                }
            })),
    );

    Ok(json!({
        "Fn::Sub": [
            serde_json::to_string(&document.to_json())?,
            {
                "ProviderArn": provider.reference(),
                "IssuerHost": cluster.issuer_host(),
            }
        ]
    }))
}

fn attach_grant(
    ctx: &mut StackContext,
    purpose: WorkloadPurpose,
    identity: &WorkloadIdentity,
    statement: PolicyStatement,
    dependencies: &[&ResourceRef],
) -> Result<PermissionGrant> {
    let document = PolicyDocument::new().with_statement(statement.clone());
    let policy = attach_policy(ctx, &identity.role, &document, dependencies)?;

    Ok(PermissionGrant {
        purpose,
        role: identity.role.logical_id.clone(),
        policy,
        statement,
    })
}

/// Read/write on `bucket` and its objects, nothing else
pub fn grant_bucket_read_write(
    ctx: &mut StackContext,
    identity: &WorkloadIdentity,
    bucket: &DataBucket,
) -> Result<PermissionGrant> {
    let statement = PolicyStatement::allow()
        .with_actions(s3_read_write_actions())
        .with_resource(bucket.arn())
        .with_resource(bucket.arn_for_objects("*"));

    attach_grant(ctx, WorkloadPurpose::BucketAccess, identity, statement, &[&bucket.handle])
}

/// Describe-only on every repository in the stack's account and region
pub fn grant_repository_describe(ctx: &mut StackContext, identity: &WorkloadIdentity) -> Result<PermissionGrant> {
    let all_repositories = ctx.env().arn("ecr", "repository/*");
    let statement = PolicyStatement::allow()
        .with_actions(ECR_DESCRIBE_ACTIONS.iter().copied())
        .with_resource(all_repositories);

    attach_grant(ctx, WorkloadPurpose::RepositoryAccess, identity, statement, &[])
}

/// Service account in `account.namespace` with read/write on `bucket`
pub fn bind_bucket_access(
    ctx: &mut StackContext,
    cluster: &mut ClusterResource,
    account: &ServiceAccountSpec,
    bucket: &DataBucket,
) -> Result<AccessBinding> {
    let purpose = WorkloadPurpose::BucketAccess;
    let identity = add_service_account(ctx, cluster, purpose.construct_id(), account)?;
    let grant = grant_bucket_read_write(ctx, &identity, bucket)?;

    info!(
        service_account = %account.name,
        namespace = %account.namespace,
        bucket = %bucket.bucket_name,
        "Bound bucket access"
    );

    Ok(AccessBinding { purpose, identity, grant })
}

/// Service account in `account.namespace` that can describe repositories
pub fn bind_repository_access(
    ctx: &mut StackContext,
    cluster: &mut ClusterResource,
    account: &ServiceAccountSpec,
) -> Result<AccessBinding> {
    let purpose = WorkloadPurpose::RepositoryAccess;
    let identity = add_service_account(ctx, cluster, purpose.construct_id(), account)?;
    let grant = grant_repository_describe(ctx, &identity)?;

    info!(
        service_account = %account.name,
        namespace = %account.namespace,
        "Bound repository access"
    );

    Ok(AccessBinding { purpose, identity, grant })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::StackEnv;
    use crate::resources::eks::{build_cluster, ClusterProps};
    use crate::resources::iam::{account_root_principal, build_admin_role};
    use crate::resources::s3::build_bucket;
    use forge_common::{Error, KubernetesVersion};

    fn cluster_context(env: StackEnv) -> (StackContext, ClusterResource) {
        let mut ctx = StackContext::new("Forge", env);
        let principal = account_root_principal(&ctx);
        let admin = build_admin_role(&mut ctx, "ForgeAdmin", principal).unwrap();
        let cluster = build_cluster(&mut ctx, ClusterProps::new("Forge", KubernetesVersion::V1_20), &admin).unwrap();
        (ctx, cluster)
    }

    #[test]
    fn test_service_account_manifest() {
        let (mut ctx, mut cluster) = cluster_context(StackEnv::Agnostic);
        let spec = WorkloadPurpose::BucketAccess.default_service_account();
        let identity = add_service_account(&mut ctx, &mut cluster, "s3-workflow-data-access", &spec).unwrap();

        assert_eq!(identity.role.logical_id.as_str(), "Forges3workflowdataaccessRole");

        let manifest = ctx.get(&identity.manifest.logical_id).unwrap();
        let metadata = &manifest.properties["Manifest"][0]["metadata"];
        assert_eq!(metadata["name"], "forge-s3-workflow-data-access");
        assert_eq!(metadata["namespace"], "default");
        assert_eq!(metadata["annotations"][ROLE_ARN_ANNOTATION], identity.role_arn());
    }

    #[test]
    fn test_trust_scoped_to_service_account() {
        let (mut ctx, mut cluster) = cluster_context(StackEnv::Agnostic);
        let spec = WorkloadPurpose::RepositoryAccess.default_service_account();
        let identity = add_service_account(&mut ctx, &mut cluster, "ecr-container-access", &spec).unwrap();

        let role = ctx.get(&identity.role.logical_id).unwrap();
        let sub = &role.properties["AssumeRolePolicyDocument"]["Fn::Sub"];
        let document: Value = serde_json::from_str(sub[0].as_str().unwrap()).unwrap();
        let statement = &document["Statement"][0];

        assert_eq!(statement["Action"], "sts:AssumeRoleWithWebIdentity");
        assert_eq!(
            statement["Condition"]["StringEquals"]["${IssuerHost}:sub"],
            "system:serviceaccount:kube-system:forge-ecr-container-access"
        );
        assert_eq!(sub[1]["ProviderArn"], json!({ "Ref": "ForgeOpenIdConnectProvider" }));
    }

    #[test]
    fn test_service_account_requires_cluster() {
        let (_, mut cluster) = cluster_context(StackEnv::Agnostic);
        let mut empty = StackContext::new("Forge", StackEnv::Agnostic);
        let spec = WorkloadPurpose::BucketAccess.default_service_account();

        let err = add_service_account(&mut empty, &mut cluster, "s3-workflow-data-access", &spec).unwrap_err();
        assert!(err.is_contract_violation());
        assert!(matches!(err, Error::MissingDependency { ref dependency, .. } if dependency == "Forge"));
        assert!(empty.is_empty());
    }

    #[test]
    fn test_bucket_grant_requires_bucket() {
        let (mut ctx, mut cluster) = cluster_context(StackEnv::Agnostic);
        let mut elsewhere = StackContext::new("Other", StackEnv::Agnostic);
        let bucket = build_bucket(&mut elsewhere, "forge-workflow-data-2").unwrap();

        let spec = WorkloadPurpose::BucketAccess.default_service_account();
        let err = bind_bucket_access(&mut ctx, &mut cluster, &spec, &bucket).unwrap_err();
        assert!(matches!(err, Error::MissingDependency { ref dependency, .. } if dependency == "forgeworkflowdata2"));
    }

    #[test]
    fn test_second_grant_on_identity_rejected() {
        let (mut ctx, mut cluster) = cluster_context(StackEnv::Agnostic);
        let spec = WorkloadPurpose::RepositoryAccess.default_service_account();
        let binding = bind_repository_access(&mut ctx, &mut cluster, &spec).unwrap();

        let err = grant_repository_describe(&mut ctx, &binding.identity).unwrap_err();
        assert!(matches!(err, Error::DuplicateLogicalId(_)));
    }

    #[test]
    fn test_bindings_share_one_oidc_provider() {
        let (mut ctx, mut cluster) = cluster_context(StackEnv::resolved("123456789012", "us-east-1"));
        let bucket = build_bucket(&mut ctx, "forge-workflow-data-2").unwrap();

        // Either order is valid
        let repo = bind_repository_access(
            &mut ctx,
            &mut cluster,
            &WorkloadPurpose::RepositoryAccess.default_service_account(),
        )
        .unwrap();
        let data = bind_bucket_access(
            &mut ctx,
            &mut cluster,
            &WorkloadPurpose::BucketAccess.default_service_account(),
            &bucket,
        )
        .unwrap();

        assert!(repo.grant.is_least_privilege());
        assert!(data.grant.is_least_privilege());
        assert_eq!(
            ctx.resources_of_type(crate::resources::IAM_OIDC_PROVIDER).count(),
            1
        );
    }

    #[test]
    fn test_least_privilege_check_rejects_extra_actions() {
        let (mut ctx, mut cluster) = cluster_context(StackEnv::Agnostic);
        let spec = WorkloadPurpose::RepositoryAccess.default_service_account();
        let mut binding = bind_repository_access(&mut ctx, &mut cluster, &spec).unwrap();

        binding.grant.statement.actions.push("ecr:BatchGetImage".to_string());
        assert!(!binding.grant.is_least_privilege());

        binding.grant.statement.actions.clear();
        assert!(!binding.grant.is_least_privilege());
    }
}
