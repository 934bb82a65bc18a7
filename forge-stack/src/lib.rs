//! Provisioning graph for the Forge build/test cluster
//!
//! Builders add nodes to an explicit [`StackContext`]; the finished graph is
//! rendered as a deterministic [`Template`] and handed to a [`Provisioner`].

pub mod access;
pub mod config;
pub mod env;
pub mod graph;
pub mod logging;
pub mod outputs;
pub mod provisioner;
pub mod resources;
pub mod stack;
pub mod synth;
pub mod template;

pub use access::{AccessBinding, PermissionGrant, ServiceAccountSpec, WorkloadIdentity, WorkloadPurpose};
pub use config::{ConfigError, StackConfig};
pub use env::StackEnv;
pub use graph::{LogicalId, ResourceNode, ResourceRef, StackContext};
pub use logging::LoggingConfig;
pub use outputs::StackOutput;
pub use provisioner::{DryRunProvisioner, HttpProvisioner, ProvisionError, Provisioner, Submission, SubmissionStatus};
pub use stack::ForgeStack;
pub use synth::{synthesize, CloudAssembly};
pub use template::Template;
