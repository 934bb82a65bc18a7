//! Configuration management for the Forge stack
//!
//! Settings are loaded from, in order of priority:
//! 1. Environment variables
//! 2. Configuration file (TOML format)
//! 3. Default values, which reproduce the fixed Forge resource names

use crate::access::{ServiceAccountSpec, WorkloadPurpose};
use crate::env::StackEnv;
use crate::logging::LoggingConfig;
use crate::resources::ecr::RepositoryNames;
use crate::resources::eks::ClusterProps;
use forge_common::{KubernetesVersion, ADMIN_ROLE_NAME, CLUSTER_NAME, STACK_NAME, WORKFLOW_DATA_BUCKET};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration struct
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    /// Stack name as known to the deployment backend
    pub stack_name: String,
    /// Target account and region; environment-agnostic when unset
    pub env: EnvConfig,
    pub cluster: ClusterConfig,
    pub repositories: RepositoryNames,
    pub bucket: BucketConfig,
    pub workloads: WorkloadsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub name: String,
    pub version: KubernetesVersion,
    /// Name of the role granted cluster-admin
    pub admin_role_name: String,
    pub subnet_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BucketConfig {
    /// Must be unique across every account in the provider, not just ours
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadsConfig {
    pub bucket_access: ServiceAccountSpec,
    pub repository_access: ServiceAccountSpec,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            stack_name: STACK_NAME.to_string(),
            env: EnvConfig::default(),
            cluster: ClusterConfig::default(),
            repositories: RepositoryNames::default(),
            bucket: BucketConfig::default(),
            workloads: WorkloadsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            name: CLUSTER_NAME.to_string(),
            version: KubernetesVersion::V1_20,
            admin_role_name: ADMIN_ROLE_NAME.to_string(),
            subnet_ids: Vec::new(),
        }
    }
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            name: WORKFLOW_DATA_BUCKET.to_string(),
        }
    }
}

impl Default for WorkloadsConfig {
    fn default() -> Self {
        Self {
            bucket_access: WorkloadPurpose::BucketAccess.default_service_account(),
            repository_access: WorkloadPurpose::RepositoryAccess.default_service_account(),
        }
    }
}

impl EnvConfig {
    pub fn stack_env(&self) -> StackEnv {
        match (&self.account, &self.region) {
            (Some(account), Some(region)) => StackEnv::resolved(account.as_str(), region.as_str()),
            _ => StackEnv::Agnostic,
        }
    }
}

impl ClusterConfig {
    pub fn props(&self) -> ClusterProps {
        ClusterProps::new(&self.name, self.version).with_subnets(self.subnet_ids.clone())
    }
}

impl StackConfig {
    /// Load from `path` (or the first standard location found), apply
    /// environment overrides and validate
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(Path::to_path_buf).or_else(Self::find_config_file);

        let mut config = match path {
            Some(path) => Self::load_from_file(&path)?,
            None => Self::default(),
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file path
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_path_buf(), e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let paths = [
            std::env::var("FORGE_CONFIG").ok().map(PathBuf::from),
            Some(PathBuf::from("./forge.toml")),
            Some(PathBuf::from("/etc/forge/config.toml")),
        ];

        paths.into_iter().flatten().find(|p| p.exists())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable source
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup("FORGE_STACK_NAME") {
            self.stack_name = name;
        }
        if let Some(account) = lookup("FORGE_ACCOUNT") {
            self.env.account = Some(account);
        }
        if let Some(region) = lookup("FORGE_REGION") {
            self.env.region = Some(region);
        }
        if let Some(version) = lookup("FORGE_K8S_VERSION") {
            match version.parse() {
                Ok(version) => self.cluster.version = version,
                Err(e) => tracing::warn!("Ignoring FORGE_K8S_VERSION: {}", e),
            }
        }
        if let Some(level) = lookup("FORGE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(dir) = lookup("FORGE_LOG_DIR") {
            self.logging.log_dir = Some(PathBuf::from(dir));
        }
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }

    /// Validate names and formats
    ///
    /// Uniqueness of the fixed names is not checked; collisions are reported
    /// by the deployment backend.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_stack_name(&self.stack_name) {
            return Err(ConfigError::Validation(format!(
                "Stack name '{}' must start with a letter and contain only letters, digits and '-'",
                self.stack_name
            )));
        }

        match (&self.env.account, &self.env.region) {
            (Some(account), Some(region)) => {
                if account.len() != 12 || !account.chars().all(|c| c.is_ascii_digit()) {
                    return Err(ConfigError::Validation(format!(
                        "Account '{}' must be 12 digits",
                        account
                    )));
                }
                if region.is_empty() {
                    return Err(ConfigError::Validation("Region cannot be empty".to_string()));
                }
            }
            (None, None) => {}
            _ => {
                return Err(ConfigError::Validation(
                    "Account and region must be set together".to_string(),
                ));
            }
        }

        if !is_cluster_name(&self.cluster.name) {
            return Err(ConfigError::Validation(format!(
                "Cluster name '{}' must start with a letter and contain only letters, digits, '-' and '_'",
                self.cluster.name
            )));
        }
        if !is_role_name(&self.cluster.admin_role_name) {
            return Err(ConfigError::Validation(format!(
                "Admin role name '{}' must be 1-64 letters, digits or '+=,.@_-'",
                self.cluster.admin_role_name
            )));
        }

        let repositories = [
            &self.repositories.source,
            &self.repositories.worker,
            &self.repositories.sink,
        ];
        for name in repositories {
            if !is_repository_name(name) {
                return Err(ConfigError::Validation(format!("Invalid repository name '{}'", name)));
            }
        }
        let [source, worker, sink] = repositories;
        if source == worker || worker == sink || source == sink {
            return Err(ConfigError::Validation("Repository names must be distinct".to_string()));
        }

        if !is_bucket_name(&self.bucket.name) {
            return Err(ConfigError::Validation(format!(
                "Invalid bucket name '{}': 3-63 lowercase letters, digits, '.' or '-'",
                self.bucket.name
            )));
        }

        for account in [&self.workloads.bucket_access, &self.workloads.repository_access] {
            if !is_dns_label(&account.name) || !is_dns_label(&account.namespace) {
                return Err(ConfigError::Validation(format!(
                    "Service account '{}/{}' must use DNS label names",
                    account.namespace, account.name
                )));
            }
        }

        Ok(())
    }
}

fn is_stack_name(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && name.len() <= 128
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

fn is_cluster_name(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && name.len() <= 100
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn is_role_name(name: &str) -> bool {
    (1..=64).contains(&name.len())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '=' | ',' | '.' | '@' | '_' | '-'))
}

fn is_repository_name(name: &str) -> bool {
    (2..=256).contains(&name.len())
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-' | '/'))
}

fn is_bucket_name(name: &str) -> bool {
    let edges_ok = name.starts_with(|c: char| c.is_ascii_alphanumeric())
        && name.ends_with(|c: char| c.is_ascii_alphanumeric());

    (3..=63).contains(&name.len())
        && edges_ok
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-')
}

fn is_dns_label(name: &str) -> bool {
    (1..=63).contains(&name.len())
        && !name.starts_with('-')
        && !name.ends_with('-')
        && name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Configuration errors
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// Failed to read configuration file
    FileRead(PathBuf, String),
    /// Failed to parse configuration
    Parse(String),
    /// Configuration validation failed
    Validation(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, err) => {
                write!(f, "Failed to read config file {:?}: {}", path, err)
            }
            ConfigError::Parse(err) => write!(f, "Failed to parse config: {}", err),
            ConfigError::Validation(err) => write!(f, "Config validation failed: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for forge_common::Error {
    fn from(err: ConfigError) -> Self {
        forge_common::Error::InvalidConfig(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config_uses_fixed_names() {
        let config = StackConfig::default();
        assert_eq!(config.stack_name, "Forge");
        assert_eq!(config.cluster.name, "Forge");
        assert_eq!(config.cluster.admin_role_name, "ForgeAdmin");
        assert_eq!(config.cluster.version.to_string(), "1.20");
        assert_eq!(config.repositories.source, "forge-source");
        assert_eq!(config.repositories.worker, "forge-worker");
        assert_eq!(config.repositories.sink, "forge-sink");
        assert_eq!(config.bucket.name, "forge-workflow-data-2");
        assert_eq!(config.workloads.bucket_access.name, "forge-s3-workflow-data-access");
        assert_eq!(config.workloads.bucket_access.namespace, "default");
        assert_eq!(config.workloads.repository_access.name, "forge-ecr-container-access");
        assert_eq!(config.workloads.repository_access.namespace, "kube-system");
        assert!(config.validate().is_ok());
        assert_eq!(config.env.stack_env(), StackEnv::Agnostic);
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("FORGE_ACCOUNT", "123456789012"),
            ("FORGE_REGION", "us-east-1"),
            ("FORGE_K8S_VERSION", "1.29"),
            ("FORGE_LOG_LEVEL", "debug"),
        ]
        .into_iter()
        .collect();

        let mut config = StackConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.env.stack_env(), StackEnv::resolved("123456789012", "us-east-1"));
        assert_eq!(config.cluster.version, KubernetesVersion { major: 1, minor: 29 });
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.stack_name, "Forge");
    }

    #[test]
    fn test_bad_version_override_ignored() {
        let mut config = StackConfig::default();
        config.apply_overrides(|key| (key == "FORGE_K8S_VERSION").then(|| "latest".to_string()));
        assert_eq!(config.cluster.version, KubernetesVersion::V1_20);
    }

    #[test]
    fn test_config_validation() {
        let mut config = StackConfig::default();
        config.env.account = Some("1234".to_string());
        config.env.region = Some("us-east-1".to_string());
        assert!(config.validate().is_err());

        let mut config = StackConfig::default();
        config.env.account = Some("123456789012".to_string());
        assert!(config.validate().is_err());

        let mut config = StackConfig::default();
        config.bucket.name = "Forge_Data".to_string();
        assert!(config.validate().is_err());

        let mut config = StackConfig::default();
        config.repositories.sink = config.repositories.source.clone();
        assert!(config.validate().is_err());

        let mut config = StackConfig::default();
        config.workloads.repository_access.namespace = "Kube System".to_string();
        assert!(config.validate().is_err());

        let mut config = StackConfig::default();
        config.stack_name = "1forge".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cluster_and_role_name_syntax() {
        let mut config = StackConfig::default();
        config.cluster.name = "--".to_string();
        assert!(config.validate().is_err());

        config.cluster.name = "sink".to_string();
        assert!(config.validate().is_ok());

        config.cluster.admin_role_name = "ops admin".to_string();
        assert!(config.validate().is_err());

        config.cluster.admin_role_name = "ops.admin@forge".to_string();
        assert!(config.validate().is_ok());

        config.cluster.admin_role_name = "a".repeat(65);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_generate_sample_config() {
        let sample = StackConfig::generate_sample();
        assert!(sample.contains("stack_name = \"Forge\""));
        assert!(sample.contains("[cluster]"));
        assert!(sample.contains("[repositories]"));
        assert!(sample.contains("[bucket]"));
        assert!(sample.contains("[workloads.bucket_access]"));
        assert!(sample.contains("[logging]"));

        let parsed: StackConfig = toml::from_str(&sample).unwrap();
        assert_eq!(parsed, StackConfig::default());
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[env]\naccount = \"123456789012\"\nregion = \"eu-west-1\"\n\n[bucket]\nname = \"acme-forge-data\""
        )
        .unwrap();

        let config = StackConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.bucket.name, "acme-forge-data");
        assert_eq!(config.env.region.as_deref(), Some("eu-west-1"));
        assert_eq!(config.repositories.worker, "forge-worker");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_missing_file() {
        let err = StackConfig::load_from_file(Path::new("/nonexistent/forge.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileRead(..)));
    }
}
