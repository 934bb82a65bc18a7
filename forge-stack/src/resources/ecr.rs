//! Container image repositories

use super::ECR_REPOSITORY;
use crate::graph::{LogicalId, RemovalPolicy, ResourceNode, ResourceRef, StackContext};
use forge_common::{Result, SINK_REPOSITORY, SOURCE_REPOSITORY, WORKER_REPOSITORY};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct ImageRepository {
    pub handle: ResourceRef,
    pub repository_name: String,
}

impl ImageRepository {
    pub fn arn(&self) -> Value {
        self.handle.get_att("Arn")
    }

    pub fn repository_uri(&self) -> Value {
        self.handle.get_att("RepositoryUri")
    }
}

/// Build one repository under a fixed name
///
/// Fixed names keep the repositories addressable by build pipelines. The
/// repository is retained when it leaves the stack.
pub fn build_repository(ctx: &mut StackContext, construct_id: &str, repository_name: &str) -> Result<ImageRepository> {
    let handle = ctx.add(
        ResourceNode::new(LogicalId::from_path(&[construct_id]), ECR_REPOSITORY)
            .with_property("RepositoryName", json!(repository_name))
            .with_removal_policy(RemovalPolicy::Retain),
    )?;

    debug!(repository = %repository_name, "Built image repository");

    Ok(ImageRepository {
        handle,
        repository_name: repository_name.to_string(),
    })
}

/// Names for the three pipeline stage repositories
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryNames {
    pub source: String,
    pub worker: String,
    pub sink: String,
}

impl Default for RepositoryNames {
    fn default() -> Self {
        Self {
            source: SOURCE_REPOSITORY.to_string(),
            worker: WORKER_REPOSITORY.to_string(),
            sink: SINK_REPOSITORY.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RepositorySet {
    pub source: ImageRepository,
    pub worker: ImageRepository,
    pub sink: ImageRepository,
}

impl RepositorySet {
    pub fn iter(&self) -> impl Iterator<Item = &ImageRepository> {
        [&self.source, &self.worker, &self.sink].into_iter()
    }
}

pub fn build_repository_set(ctx: &mut StackContext, names: &RepositoryNames) -> Result<RepositorySet> {
    Ok(RepositorySet {
        source: build_repository(ctx, "source", &names.source)?,
        worker: build_repository(ctx, "worker", &names.worker)?,
        sink: build_repository(ctx, "sink", &names.sink)?,
    })
}
