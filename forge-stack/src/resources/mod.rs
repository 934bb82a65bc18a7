//! Resource builders
//!
//! Each builder takes the stack context explicitly, declares its nodes with
//! their dependencies, and returns a typed handle for later builders.

pub mod ecr;
pub mod eks;
pub mod iam;
pub mod s3;

pub use ecr::{build_repository, build_repository_set, ImageRepository, RepositoryNames, RepositorySet};
pub use eks::{build_cluster, ClusterProps, ClusterResource};
pub use iam::{account_root_principal, build_admin_role, AdminRole};
pub use s3::{build_bucket, DataBucket};

// Resource type names
pub const IAM_ROLE: &str = "AWS::IAM::Role";
pub const IAM_POLICY: &str = "AWS::IAM::Policy";
pub const IAM_OIDC_PROVIDER: &str = "AWS::IAM::OIDCProvider";
pub const EKS_CLUSTER: &str = "AWS::EKS::Cluster";
pub const EKS_ACCESS_ENTRY: &str = "AWS::EKS::AccessEntry";
pub const EKS_FARGATE_PROFILE: &str = "AWS::EKS::FargateProfile";
pub const ECR_REPOSITORY: &str = "AWS::ECR::Repository";
pub const S3_BUCKET: &str = "AWS::S3::Bucket";
/// Applied in-cluster by the deployment backend after the cluster is up
pub const KUBERNETES_MANIFEST: &str = "Custom::KubernetesManifest";
