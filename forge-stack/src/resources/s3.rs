//! Workflow data bucket

use super::S3_BUCKET;
use crate::env::join;
use crate::graph::{LogicalId, RemovalPolicy, ResourceNode, ResourceRef, StackContext};
use forge_common::{Result, WORKFLOW_DATA_BUCKET};
use serde_json::{json, Value};
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct DataBucket {
    pub handle: ResourceRef,
    pub bucket_name: String,
}

impl DataBucket {
    pub fn arn(&self) -> Value {
        self.handle.get_att("Arn")
    }

    /// ARN pattern for objects under `key_pattern`, e.g. `*`
    pub fn arn_for_objects(&self, key_pattern: &str) -> Value {
        join(vec![self.arn(), json!(format!("/{}", key_pattern))])
    }
}

/// Build the bucket under a fixed name
///
/// Bucket names are global across every account, not just ours; a taken
/// name is only reported when the template is applied. The logical ID stays
/// the same whatever `bucket_name` is configured.
pub fn build_bucket(ctx: &mut StackContext, bucket_name: &str) -> Result<DataBucket> {
    let handle = ctx.add(
        ResourceNode::new(LogicalId::from_path(&[WORKFLOW_DATA_BUCKET]), S3_BUCKET)
            .with_property("BucketName", json!(bucket_name))
            .with_removal_policy(RemovalPolicy::Retain),
    )?;

    debug!(bucket = %bucket_name, "Built data bucket");

    Ok(DataBucket {
        handle,
        bucket_name: bucket_name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::StackEnv;

    #[test]
    fn test_build_bucket() {
        let mut ctx = StackContext::new("Forge", StackEnv::Agnostic);
        let bucket = build_bucket(&mut ctx, "forge-workflow-data-2").unwrap();

        assert_eq!(bucket.handle.logical_id.as_str(), "forgeworkflowdata2");
        let node = ctx.get(&bucket.handle.logical_id).unwrap();
        assert_eq!(node.properties["BucketName"], "forge-workflow-data-2");
        assert_eq!(node.removal_policy, Some(RemovalPolicy::Retain));
    }

    #[test]
    fn test_bucket_logical_id_ignores_configured_name() {
        let mut ctx = StackContext::new("Forge", StackEnv::Agnostic);
        let bucket = build_bucket(&mut ctx, "worker").unwrap();

        assert_eq!(bucket.handle.logical_id.as_str(), "forgeworkflowdata2");
        assert_eq!(ctx.get(&bucket.handle.logical_id).unwrap().properties["BucketName"], "worker");
        assert!(ctx.get(&LogicalId::from_path(&["worker"])).is_none());
    }

    #[test]
    fn test_object_arn_pattern() {
        let mut ctx = StackContext::new("Forge", StackEnv::Agnostic);
        let bucket = build_bucket(&mut ctx, "forge-workflow-data-2").unwrap();

        assert_eq!(
            bucket.arn_for_objects("*"),
            json!({ "Fn::Join": ["", [
                { "Fn::GetAtt": ["forgeworkflowdata2", "Arn"] },
                "/*"
            ]] })
        );
    }
}
