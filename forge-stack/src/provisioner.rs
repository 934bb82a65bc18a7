//! Provisioning backends
//!
//! The stack only describes resources. Creating them, ordering the calls and
//! retrying are the backend's job; its failures are passed through as-is.

use crate::template::Template;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Provisioning errors
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("Authentication failed")]
    AuthFailed,
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ProvisionError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    /// Rendered locally, nothing sent
    Rendered,
    /// Accepted by the backend
    Submitted,
    InProgress,
    Complete,
    Failed,
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SubmissionStatus::Rendered => "rendered",
            SubmissionStatus::Submitted => "submitted",
            SubmissionStatus::InProgress => "in_progress",
            SubmissionStatus::Complete => "complete",
            SubmissionStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Result of handing a template to a backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub stack_name: String,
    pub status: SubmissionStatus,
    pub resource_count: usize,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[async_trait]
pub trait Provisioner: Send + Sync {
    async fn submit(&self, stack_name: &str, template: &Template) -> Result<Submission>;
}

/// Renders only; performs no I/O
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunProvisioner;

#[async_trait]
impl Provisioner for DryRunProvisioner {
    async fn submit(&self, stack_name: &str, template: &Template) -> Result<Submission> {
        debug!(stack = %stack_name, "Dry run, template not submitted");

        Ok(Submission {
            stack_name: stack_name.to_string(),
            status: SubmissionStatus::Rendered,
            resource_count: template.resources.len(),
            submitted_at: Utc::now(),
            message: None,
        })
    }
}

/// Backend reply to a submission
#[derive(Debug, Deserialize)]
struct SubmitResponse {
    status: SubmissionStatus,
    #[serde(default)]
    message: Option<String>,
}

/// Submits templates to a deployment service over HTTP
#[derive(Clone)]
pub struct HttpProvisioner {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpProvisioner {
    pub fn new(endpoint: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Set authentication token
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn stack_url(&self, stack_name: &str) -> String {
        format!("{}/stacks/{}", self.endpoint, stack_name)
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = &self.token {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", token)) {
                headers.insert(AUTHORIZATION, value);
            }
        }

        headers
    }
}

#[async_trait]
impl Provisioner for HttpProvisioner {
    async fn submit(&self, stack_name: &str, template: &Template) -> Result<Submission> {
        let url = self.stack_url(stack_name);
        debug!(url = %url, "Submitting template");

        let response = self
            .client
            .post(&url)
            .headers(self.headers())
            .json(template)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 401 {
            return Err(ProvisionError::AuthFailed);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProvisionError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        let reply = if body.trim().is_empty() {
            SubmitResponse {
                status: SubmissionStatus::Submitted,
                message: None,
            }
        } else {
            serde_json::from_str(&body)?
        };

        info!(stack = %stack_name, status = %reply.status, "Template submitted");

        Ok(Submission {
            stack_name: stack_name.to_string(),
            status: reply.status,
            resource_count: template.resources.len(),
            submitted_at: Utc::now(),
            message: reply.message,
        })
    }
}
