//! Common types shared between forge-stack and forge-cli

pub mod iam;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Fixed external names. Build pipelines and operators address these directly,
// so they are never hash-suffixed.
pub const STACK_NAME: &str = "Forge";
pub const CLUSTER_NAME: &str = "Forge";
pub const ADMIN_ROLE_NAME: &str = "ForgeAdmin";
pub const SOURCE_REPOSITORY: &str = "forge-source";
pub const WORKER_REPOSITORY: &str = "forge-worker";
pub const SINK_REPOSITORY: &str = "forge-sink";
pub const WORKFLOW_DATA_BUCKET: &str = "forge-workflow-data-2";
pub const BUCKET_ACCESS_SERVICE_ACCOUNT: &str = "forge-s3-workflow-data-access";
pub const BUCKET_ACCESS_NAMESPACE: &str = "default";
pub const REPOSITORY_ACCESS_SERVICE_ACCOUNT: &str = "forge-ecr-container-access";
pub const REPOSITORY_ACCESS_NAMESPACE: &str = "kube-system";
pub const KUBERNETES_VERSION: &str = "1.20";

// Stack output labels
pub const BUCKET_ACCESS_ROLE_OUTPUT: &str = "s3-workflow-data-access-role";
pub const REPOSITORY_ACCESS_ROLE_OUTPUT: &str = "ecr-access-role";

/// Kubernetes control plane version (major.minor)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KubernetesVersion {
    pub major: u16,
    pub minor: u16,
}

impl KubernetesVersion {
    pub const V1_20: KubernetesVersion = KubernetesVersion { major: 1, minor: 20 };
}

impl Default for KubernetesVersion {
    fn default() -> Self {
        Self::V1_20
    }
}

impl fmt::Display for KubernetesVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for KubernetesVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidConfig(format!("Kubernetes version must be major.minor, got '{}'", s));

        let (major, minor) = s.trim().split_once('.').ok_or_else(invalid)?;
        let major = major.parse().map_err(|_| invalid())?;
        let minor = minor.parse().map_err(|_| invalid())?;

        Ok(Self { major, minor })
    }
}

impl TryFrom<String> for KubernetesVersion {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<KubernetesVersion> for String {
    fn from(version: KubernetesVersion) -> Self {
        version.to_string()
    }
}

/// Stack construction errors
///
/// Only local contract violations are detected here. Name collisions and
/// permission denials are reported by the provisioning backend at apply time.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{resource} depends on {dependency}, which has not been added to the stack")]
    MissingDependency { resource: String, dependency: String },

    #[error("Logical ID already in use: {0}")]
    DuplicateLogicalId(String),

    #[error("Dependency cycle between: {}", .0.join(", "))]
    DependencyCycle(Vec<String>),

    #[error("Output '{0}' has an empty label or value")]
    EmptyOutput(String),

    #[error("Output already emitted: {0}")]
    DuplicateOutput(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Template rendering failed: {0}")]
    Render(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for errors caused by assembling the graph in the wrong order
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Error::MissingDependency { .. }
                | Error::DuplicateLogicalId(_)
                | Error::DependencyCycle(_)
                | Error::EmptyOutput(_)
                | Error::DuplicateOutput(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kubernetes_version_parse() {
        let version: KubernetesVersion = "1.20".parse().unwrap();
        assert_eq!(version, KubernetesVersion::V1_20);
        assert_eq!(version.to_string(), KUBERNETES_VERSION);

        assert!("1".parse::<KubernetesVersion>().is_err());
        assert!("one.twenty".parse::<KubernetesVersion>().is_err());
    }

    #[test]
    fn test_kubernetes_version_serde() {
        let json = serde_json::to_string(&KubernetesVersion::V1_20).unwrap();
        assert_eq!(json, "\"1.20\"");

        let parsed: KubernetesVersion = serde_json::from_str("\"1.29\"").unwrap();
        assert_eq!(parsed.minor, 29);
        assert!(serde_json::from_str::<KubernetesVersion>("\"latest\"").is_err());
    }

    #[test]
    fn test_contract_violation_classification() {
        let missing = Error::MissingDependency {
            resource: "Forges3workflowdataaccessRole".to_string(),
            dependency: "Forge".to_string(),
        };
        assert!(missing.is_contract_violation());
        assert!(missing.to_string().contains("Forge"));

        assert!(!Error::InvalidConfig("bad".to_string()).is_contract_violation());

        let render = Error::Render("unsupported value".to_string());
        assert!(!render.is_contract_violation());
        assert_eq!(render.to_string(), "Template rendering failed: unsupported value");
    }
}
