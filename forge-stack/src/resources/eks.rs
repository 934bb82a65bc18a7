//! Managed Kubernetes cluster
//!
//! The cluster runs every pod on Fargate, so there is no node group to
//! manage; node provisioning and scaling belong to the compute service.

use super::iam::{assume_role_policy, role_node, AdminRole};
use super::{EKS_ACCESS_ENTRY, EKS_CLUSTER, EKS_FARGATE_PROFILE, IAM_OIDC_PROVIDER};
use crate::graph::{LogicalId, ResourceNode, ResourceRef, StackContext};
use crate::outputs;
use forge_common::iam::Principal;
use forge_common::{KubernetesVersion, Result, BUCKET_ACCESS_NAMESPACE, CLUSTER_NAME, REPOSITORY_ACCESS_NAMESPACE};
use serde_json::{json, Value};
use tracing::{debug, info};

pub const CLUSTER_ADMIN_ACCESS_POLICY: &str = "AmazonEKSClusterAdminPolicy";
pub const STS_AUDIENCE: &str = "sts.amazonaws.com";
/// Root CA thumbprint of the regional EKS OIDC issuers
pub const EKS_OIDC_THUMBPRINT: &str = "9e99a48a9960b14926bb7f3b02e22da2b0ab7280";

const CLUSTER_POLICY: &str = "AmazonEKSClusterPolicy";
const FARGATE_POD_EXECUTION_POLICY: &str = "AmazonEKSFargatePodExecutionRolePolicy";

/// Cluster build options
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterProps {
    pub name: String,
    pub version: KubernetesVersion,
    /// Subnets for the control plane and Fargate pods; network placement is
    /// left to the deployment backend when empty
    pub subnet_ids: Vec<String>,
    /// Namespaces scheduled onto the default Fargate profile
    pub fargate_namespaces: Vec<String>,
    pub output_cluster_name: bool,
    pub output_masters_role_arn: bool,
}

impl ClusterProps {
    pub fn new(name: &str, version: KubernetesVersion) -> Self {
        Self {
            name: name.to_string(),
            version,
            subnet_ids: Vec::new(),
            fargate_namespaces: vec![
                BUCKET_ACCESS_NAMESPACE.to_string(),
                REPOSITORY_ACCESS_NAMESPACE.to_string(),
            ],
            output_cluster_name: true,
            output_masters_role_arn: true,
        }
    }

    pub fn with_subnets(mut self, subnet_ids: Vec<String>) -> Self {
        self.subnet_ids = subnet_ids;
        self
    }

    pub fn without_outputs(mut self) -> Self {
        self.output_cluster_name = false;
        self.output_masters_role_arn = false;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClusterResource {
    pub handle: ResourceRef,
    pub name: String,
    pub version: KubernetesVersion,
    pub admin_role: LogicalId,
    pub service_role: ResourceRef,
    pub admin_access: ResourceRef,
    pub fargate_profile: ResourceRef,
    pub output_cluster_name: bool,
    pub output_masters_role_arn: bool,
    oidc_provider: Option<ResourceRef>,
}

impl ClusterResource {
    pub fn logical_id(&self) -> &LogicalId {
        &self.handle.logical_id
    }

    pub fn issuer_url(&self) -> Value {
        self.handle.get_att("OpenIdConnectIssuerUrl")
    }

    /// Issuer URL without its `https://` scheme, as used in IAM condition keys
    pub fn issuer_host(&self) -> Value {
        json!({ "Fn::Select": [1, { "Fn::Split": ["//", self.issuer_url()] }] })
    }

    pub fn has_oidc_provider(&self) -> bool {
        self.oidc_provider.is_some()
    }

    /// The cluster's OIDC identity provider, added on first use
    pub fn open_id_connect_provider(&mut self, ctx: &mut StackContext) -> Result<ResourceRef> {
        if let Some(provider) = &self.oidc_provider {
            return Ok(provider.clone());
        }

        let provider = ctx.add(
            ResourceNode::new(self.logical_id().child(&["OpenIdConnectProvider"]), IAM_OIDC_PROVIDER)
                .with_property("Url", self.issuer_url())
                .with_property("ClientIdList", json!([STS_AUDIENCE]))
                .with_property("ThumbprintList", json!([EKS_OIDC_THUMBPRINT]))
                .depends_on(&self.handle),
        )?;

        debug!(cluster = %self.name, "Added OIDC provider");
        self.oidc_provider = Some(provider.clone());
        Ok(provider)
    }
}

/// Build the cluster and bind `admin_role` as cluster admin
///
/// The construct ID is fixed, so `props.name` only sets the physical cluster
/// name and cannot collide with other logical IDs in the stack.
pub fn build_cluster(ctx: &mut StackContext, props: ClusterProps, admin_role: &AdminRole) -> Result<ClusterResource> {
    let cluster_id = LogicalId::from_path(&[CLUSTER_NAME]);
    ctx.require(&cluster_id, admin_role.logical_id())?;

    let service_role = role_node(
        ctx.env(),
        cluster_id.child(&["ClusterRole"]),
        assume_role_policy(Principal::Service("eks.amazonaws.com".to_string())).to_json(),
        &[CLUSTER_POLICY],
    );
    let service_role = ctx.add(service_role)?;
    let admin_policy_arn = ctx
        .env()
        .aws_managed_arn("eks", &format!("cluster-access-policy/{}", CLUSTER_ADMIN_ACCESS_POLICY));

    let mut cluster_node = ResourceNode::new(cluster_id.clone(), EKS_CLUSTER)
        .with_property("Name", json!(props.name))
        .with_property("Version", json!(props.version.to_string()))
        .with_property("RoleArn", service_role.get_att("Arn"))
        .with_property("AccessConfig", json!({ "AuthenticationMode": "API_AND_CONFIG_MAP" }))
        .depends_on(&service_role)
        .depends_on(&admin_role.handle);
    if !props.subnet_ids.is_empty() {
        cluster_node = cluster_node.with_property("ResourcesVpcConfig", json!({ "SubnetIds": props.subnet_ids }));
    }
    let handle = ctx.add(cluster_node)?;

    let admin_access = ctx.add(
        ResourceNode::new(cluster_id.child(&["MastersAccessEntry"]), EKS_ACCESS_ENTRY)
            .with_property("ClusterName", handle.reference())
            .with_property("PrincipalArn", admin_role.arn())
            .with_property("Type", json!("STANDARD"))
            .with_property(
                "AccessPolicies",
                json!([{
                    "PolicyArn": admin_policy_arn,
                    "AccessScope": { "Type": "cluster" }
                }]),
            )
            .depends_on(&handle)
            .depends_on(&admin_role.handle),
    )?;

    let fargate_profile = build_fargate_profile(ctx, &handle, &props)?;

    if props.output_cluster_name {
        outputs::emit(ctx, &format!("{}ClusterName", cluster_id), handle.reference())?;
    }
    if props.output_masters_role_arn {
        outputs::emit(ctx, &format!("{}MastersRoleArn", cluster_id), admin_role.arn())?;
    }

    info!(
        cluster = %props.name,
        version = %props.version,
        admin_role = %admin_role.role_name,
        "Built cluster"
    );

    Ok(ClusterResource {
        handle,
        name: props.name,
        version: props.version,
        admin_role: admin_role.logical_id().clone(),
        service_role,
        admin_access,
        fargate_profile,
        output_cluster_name: props.output_cluster_name,
        output_masters_role_arn: props.output_masters_role_arn,
        oidc_provider: None,
    })
}

fn build_fargate_profile(ctx: &mut StackContext, cluster: &ResourceRef, props: &ClusterProps) -> Result<ResourceRef> {
    let profile_id = cluster.logical_id.child(&["FargateProfile", "default"]);

    let pod_execution_role = role_node(
        ctx.env(),
        profile_id.child(&["PodExecutionRole"]),
        assume_role_policy(Principal::Service("eks-fargate-pods.amazonaws.com".to_string())).to_json(),
        &[FARGATE_POD_EXECUTION_POLICY],
    );
    let pod_execution_role = ctx.add(pod_execution_role)?;

    let selectors: Vec<Value> = props
        .fargate_namespaces
        .iter()
        .map(|ns| json!({ "Namespace": ns }))
        .collect();

    let mut node = ResourceNode::new(profile_id, EKS_FARGATE_PROFILE)
        .with_property("ClusterName", cluster.reference())
        .with_property("FargateProfileName", json!("default"))
        .with_property("PodExecutionRoleArn", pod_execution_role.get_att("Arn"))
        .with_property("Selectors", json!(selectors))
        .depends_on(cluster)
        .depends_on(&pod_execution_role);
    if !props.subnet_ids.is_empty() {
        node = node.with_property("Subnets", json!(props.subnet_ids));
    }

    ctx.add(node)
}
