use async_trait::async_trait;
use reqwest::{multipart, Client, StatusCode};
use shared::{
    domain::AuditReport,
    error::GENERIC_FAILURE_MESSAGE,
    protocol::{AuditRequest, ErrorDetail, HealthStatus, UploadAck, UPLOAD_FIELD_NAME},
};
use thiserror::Error;
use tracing::{info, warn};

use crate::workflow::SelectedFile;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiClientError {
    /// Upload or health request failed; the server's explanation, if any, is not kept.
    #[error("transport failure: {reason}")]
    Transport {
        status: Option<StatusCode>,
        reason: String,
    },
    #[error("audit failed: {}", .detail.as_deref().unwrap_or(GENERIC_FAILURE_MESSAGE))]
    Audit {
        status: Option<StatusCode>,
        detail: Option<String>,
    },
    /// Successful response whose body is not a valid report.
    #[error("audit response does not match the report contract: {0}")]
    Data(String),
}

impl ApiClientError {
    /// Text suitable for showing to the user.
    pub fn user_message(&self) -> &str {
        match self {
            Self::Audit {
                detail: Some(detail),
                ..
            } => detail,
            _ => GENERIC_FAILURE_MESSAGE,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Transport { status, .. } | Self::Audit { status, .. } => *status,
            Self::Data(_) => None,
        }
    }

    fn transport(status: Option<StatusCode>, reason: impl ToString) -> Self {
        Self::Transport {
            status,
            reason: reason.to_string(),
        }
    }
}

/// The two remote calls the audit workflow depends on.
#[async_trait]
pub trait AuditApi: Send + Sync {
    async fn upload(&self, file: &SelectedFile) -> Result<UploadAck, ApiClientError>;
    async fn audit(&self, request: &AuditRequest) -> Result<AuditReport, ApiClientError>;
}

pub struct HttpAuditClient {
    http: Client,
    server_url: String,
}

impl HttpAuditClient {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self::with_http_client(server_url, Client::new())
    }

    pub fn with_http_client(server_url: impl Into<String>, http: Client) -> Self {
        let server_url = server_url.into().trim_end_matches('/').to_string();
        Self { http, server_url }
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Liveness probe of the service. Not part of the audit workflow.
    pub async fn health(&self) -> Result<HealthStatus, ApiClientError> {
        let response = self
            .http
            .get(format!("{}/health", self.server_url))
            .send()
            .await
            .map_err(|err| ApiClientError::transport(None, err))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiClientError::transport(
                Some(status),
                format!("health check returned {status}"),
            ));
        }
        response
            .json::<HealthStatus>()
            .await
            .map_err(|err| ApiClientError::transport(Some(status), err))
    }
}

#[async_trait]
impl AuditApi for HttpAuditClient {
    async fn upload(&self, file: &SelectedFile) -> Result<UploadAck, ApiClientError> {
        let mut part =
            multipart::Part::bytes(file.bytes().to_vec()).file_name(file.filename().to_string());
        if let Some(mime_type) = file.mime_type() {
            part = part
                .mime_str(mime_type)
                .map_err(|err| ApiClientError::transport(None, err))?;
        }
        let form = multipart::Form::new().part(UPLOAD_FIELD_NAME, part);

        info!(
            filename = %file.filename(),
            size_bytes = file.len(),
            "audit api: uploading document"
        );
        let response = self
            .http
            .post(format!("{}/upload", self.server_url))
            .multipart(form)
            .send()
            .await
            .map_err(|err| {
                warn!(error = %err, "audit api: upload request failed");
                ApiClientError::transport(None, err)
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, "audit api: upload rejected");
            return Err(ApiClientError::transport(
                Some(status),
                format!("upload returned {status}"),
            ));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|err| ApiClientError::transport(Some(status), err))?;
        Ok(UploadAck::from_json(&body))
    }

    async fn audit(&self, request: &AuditRequest) -> Result<AuditReport, ApiClientError> {
        let response = self
            .http
            .post(format!("{}/audit", self.server_url))
            .json(request)
            .send()
            .await
            .map_err(|err| {
                warn!(error = %err, "audit api: audit request failed");
                ApiClientError::Audit {
                    status: None,
                    detail: None,
                }
            })?;

        let status = response.status();
        let body = response.bytes().await;

        if !status.is_success() {
            let detail = body
                .ok()
                .and_then(|bytes| ErrorDetail::parse_detail(&bytes));
            warn!(%status, detail = ?detail, "audit api: audit rejected");
            return Err(ApiClientError::Audit {
                status: Some(status),
                detail,
            });
        }

        let body = body.map_err(|err| ApiClientError::Data(err.to_string()))?;
        let report: AuditReport =
            serde_json::from_slice(&body).map_err(|err| ApiClientError::Data(err.to_string()))?;
        report
            .validate()
            .map_err(|err| ApiClientError::Data(err.to_string()))?;

        info!(
            project_title = %report.project_title,
            compliance_score = report.compliance_score,
            "audit api: report received"
        );
        Ok(report)
    }
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;
