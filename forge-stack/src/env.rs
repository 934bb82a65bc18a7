//! Deployment environment (account and region)
//!
//! A stack bound to a concrete account and region renders ARNs as literal
//! strings. An environment-agnostic stack renders the same ARNs as joins over
//! the `AWS::AccountId`, `AWS::Region` and `AWS::Partition` pseudo parameters.

use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StackEnv {
    Resolved {
        account: String,
        region: String,
    },
    #[default]
    Agnostic,
}

impl StackEnv {
    pub fn resolved(account: impl Into<String>, region: impl Into<String>) -> Self {
        StackEnv::Resolved {
            account: account.into(),
            region: region.into(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, StackEnv::Resolved { .. })
    }

    pub fn account(&self) -> Value {
        match self {
            StackEnv::Resolved { account, .. } => json!(account),
            StackEnv::Agnostic => json!({ "Ref": "AWS::AccountId" }),
        }
    }

    pub fn region(&self) -> Value {
        match self {
            StackEnv::Resolved { region, .. } => json!(region),
            StackEnv::Agnostic => json!({ "Ref": "AWS::Region" }),
        }
    }

    pub fn partition(&self) -> Value {
        match self {
            StackEnv::Resolved { .. } => json!("aws"),
            StackEnv::Agnostic => json!({ "Ref": "AWS::Partition" }),
        }
    }

    /// `arn:<partition>:iam::<account>:root`
    pub fn account_root_arn(&self) -> Value {
        join(vec![
            json!("arn:"),
            self.partition(),
            json!(":iam::"),
            self.account(),
            json!(":root"),
        ])
    }

    /// `arn:<partition>:<service>:<region>:<account>:<resource>`
    pub fn arn(&self, service: &str, resource: &str) -> Value {
        join(vec![
            json!("arn:"),
            self.partition(),
            json!(format!(":{}:", service)),
            self.region(),
            json!(":"),
            self.account(),
            json!(format!(":{}", resource)),
        ])
    }

    /// AWS-owned resource such as a managed policy:
    /// `arn:<partition>:<service>::aws:<resource>`
    pub fn aws_managed_arn(&self, service: &str, resource: &str) -> Value {
        join(vec![
            json!("arn:"),
            self.partition(),
            json!(format!(":{}::aws:{}", service, resource)),
        ])
    }

    /// `arn:<partition>:iam::aws:policy/<name>`
    pub fn managed_policy_arn(&self, name: &str) -> Value {
        self.aws_managed_arn("iam", &format!("policy/{}", name))
    }

    /// Environment URI recorded in the cloud assembly manifest
    pub fn uri(&self) -> String {
        match self {
            StackEnv::Resolved { account, region } => format!("aws://{}/{}", account, region),
            StackEnv::Agnostic => "aws://unknown-account/unknown-region".to_string(),
        }
    }
}

/// Concatenate template values, folding adjacent literals.
///
/// Collapses to a plain string when every part is a literal, otherwise
/// produces `{"Fn::Join": ["", [...]]}`.
pub fn join(parts: Vec<Value>) -> Value {
    let mut folded: Vec<Value> = Vec::with_capacity(parts.len());

    for part in parts {
        if let (Some(Value::String(prev)), Value::String(next)) = (folded.last_mut(), &part) {
            prev.push_str(next);
            continue;
        }
        folded.push(part);
    }

    if folded.is_empty() {
        return json!("");
    }
    if folded.len() == 1 && folded[0].is_string() {
        return folded.remove(0);
    }

    json!({ "Fn::Join": ["", folded] })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolved_arn_is_literal() {
        let env = StackEnv::resolved("123456789012", "us-east-1");
        assert_eq!(
            env.arn("ecr", "repository/*"),
            json!("arn:aws:ecr:us-east-1:123456789012:repository/*")
        );
        assert_eq!(env.account_root_arn(), json!("arn:aws:iam::123456789012:root"));
        assert_eq!(env.uri(), "aws://123456789012/us-east-1");
    }

    #[test]
    fn test_agnostic_arn_uses_pseudo_parameters() {
        let env = StackEnv::Agnostic;
        let arn = env.arn("ecr", "repository/*");

        assert_eq!(
            arn,
            json!({
                "Fn::Join": ["", [
                    "arn:",
                    { "Ref": "AWS::Partition" },
                    ":ecr:",
                    { "Ref": "AWS::Region" },
                    ":",
                    { "Ref": "AWS::AccountId" },
                    ":repository/*"
                ]]
            })
        );
        assert_eq!(env.uri(), "aws://unknown-account/unknown-region");
    }

    #[test]
    fn test_managed_arns_follow_partition() {
        let resolved = StackEnv::resolved("123456789012", "us-east-1");
        assert_eq!(
            resolved.managed_policy_arn("AmazonEKSClusterPolicy"),
            json!("arn:aws:iam::aws:policy/AmazonEKSClusterPolicy")
        );

        let agnostic = StackEnv::Agnostic;
        assert_eq!(
            agnostic.managed_policy_arn("AmazonEKSClusterPolicy"),
            json!({
                "Fn::Join": ["", [
                    "arn:",
                    { "Ref": "AWS::Partition" },
                    ":iam::aws:policy/AmazonEKSClusterPolicy"
                ]]
            })
        );
        assert_eq!(
            agnostic.aws_managed_arn("eks", "cluster-access-policy/AmazonEKSClusterAdminPolicy"),
            json!({
                "Fn::Join": ["", [
                    "arn:",
                    { "Ref": "AWS::Partition" },
                    ":eks::aws:cluster-access-policy/AmazonEKSClusterAdminPolicy"
                ]]
            })
        );
    }

    #[test]
    fn test_join_folds_literals() {
        assert_eq!(join(vec![json!("a"), json!("b")]), json!("ab"));
        assert_eq!(join(vec![]), json!(""));

        let mixed = join(vec![json!("x"), json!("y"), json!({ "Ref": "R" }), json!("z")]);
        assert_eq!(mixed, json!({ "Fn::Join": ["", ["xy", { "Ref": "R" }, "z"]] }));
    }
}
