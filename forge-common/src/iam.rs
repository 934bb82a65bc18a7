//! IAM policy primitives: principals, statements and documents

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const POLICY_VERSION: &str = "2012-10-17";

/// Actions needed to describe, but never pull or push, container repositories
pub const ECR_DESCRIBE_ACTIONS: &[&str] = &["ecr:DescribeImages", "ecr:DescribeRepositories"];

/// Object and bucket read actions
pub const S3_READ_ACTIONS: &[&str] = &["s3:GetObject*", "s3:GetBucket*", "s3:List*"];

/// Object delete actions
pub const S3_DELETE_ACTIONS: &[&str] = &["s3:DeleteObject*"];

/// Object write actions
pub const S3_PUT_ACTIONS: &[&str] = &[
    "s3:PutObject",
    "s3:PutObjectLegalHold",
    "s3:PutObjectRetention",
    "s3:PutObjectTagging",
    "s3:PutObjectVersionTagging",
    "s3:Abort*",
];

/// Full read/write action set for a single bucket
pub fn s3_read_write_actions() -> Vec<String> {
    S3_READ_ACTIONS
        .iter()
        .chain(S3_DELETE_ACTIONS)
        .chain(S3_PUT_ACTIONS)
        .map(|a| a.to_string())
        .collect()
}

/// Statement effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

impl Effect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Effect::Allow => "Allow",
            Effect::Deny => "Deny",
        }
    }
}

/// Principal allowed to assume a role
///
/// Values are JSON so they can carry unresolved template tokens.
#[derive(Debug, Clone, PartialEq)]
pub enum Principal {
    /// Any authenticated member of the account (the account root ARN)
    AccountRoot(Value),
    /// An AWS service, e.g. `eks.amazonaws.com`
    Service(String),
    /// A web identity provider, e.g. the cluster's OIDC provider
    Federated(Value),
}

impl Principal {
    pub fn to_json(&self) -> Value {
        match self {
            Principal::AccountRoot(arn) => json!({ "AWS": arn }),
            Principal::Service(service) => json!({ "Service": service }),
            Principal::Federated(provider) => json!({ "Federated": provider }),
        }
    }
}

/// A single allow/deny rule
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyStatement {
    pub effect: Effect,
    pub actions: Vec<String>,
    pub resources: Vec<Value>,
    pub principal: Option<Principal>,
    pub condition: Option<Value>,
}

impl PolicyStatement {
    pub fn allow() -> Self {
        Self {
            effect: Effect::Allow,
            actions: Vec::new(),
            resources: Vec::new(),
            principal: None,
            condition: None,
        }
    }

    pub fn with_actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.actions.extend(actions.into_iter().map(Into::into));
        self
    }

    pub fn with_resource(mut self, resource: Value) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    pub fn with_condition(mut self, condition: Value) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Render in IAM JSON form. Single-element lists collapse to a scalar.
    pub fn to_json(&self) -> Value {
        let mut statement = serde_json::Map::new();
        statement.insert("Effect".to_string(), json!(self.effect.as_str()));
        statement.insert("Action".to_string(), collapse(self.actions.iter().map(|a| json!(a)).collect()));

        if let Some(principal) = &self.principal {
            statement.insert("Principal".to_string(), principal.to_json());
        }
        if !self.resources.is_empty() {
            statement.insert("Resource".to_string(), collapse(self.resources.clone()));
        }
        if let Some(condition) = &self.condition {
            statement.insert("Condition".to_string(), condition.clone());
        }

        Value::Object(statement)
    }
}

fn collapse(mut values: Vec<Value>) -> Value {
    if values.len() == 1 {
        values.remove(0)
    } else {
        Value::Array(values)
    }
}

/// Policy document (identity or trust policy)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolicyDocument {
    pub statements: Vec<PolicyStatement>,
}

impl PolicyDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_statement(mut self, statement: PolicyStatement) -> Self {
        self.statements.push(statement);
        self
    }

    pub fn to_json(&self) -> Value {
        json!({
            "Version": POLICY_VERSION,
            "Statement": self.statements.iter().map(PolicyStatement::to_json).collect::<Vec<_>>(),
        })
    }
}
