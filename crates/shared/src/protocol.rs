use serde::{Deserialize, Serialize};

pub const DEFAULT_AUDIT_QUERY: &str = "Analise este projeto e extraia as métricas de conformidade.";

/// Multipart field name the upload endpoint reads the document from.
pub const UPLOAD_FIELD_NAME: &str = "file";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl AuditRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            system_prompt: None,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }
}

impl Default for AuditRequest {
    fn default() -> Self {
        Self::new(DEFAULT_AUDIT_QUERY)
    }
}

/// Acknowledgment returned by `POST /upload`. Only its presence matters to the workflow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadAck {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub chunks: Option<u64>,
}

impl UploadAck {
    /// Reads whatever known fields a JSON acknowledgment carries; anything else is ignored.
    pub fn from_json(value: &serde_json::Value) -> Self {
        Self {
            message: value
                .get("message")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            chunks: value.get("chunks").and_then(|v| v.as_u64()),
        }
    }
}

/// Error envelope of the audit endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub detail: Option<String>,
}

impl ErrorDetail {
    /// Extracts a non-blank `detail` from a raw error body, if there is one.
    pub fn parse_detail(body: &[u8]) -> Option<String> {
        serde_json::from_slice::<ErrorDetail>(body)
            .ok()
            .and_then(|envelope| envelope.detail)
            .filter(|detail| !detail.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub llm: bool,
    #[serde(default)]
    pub vector_store: bool,
}

impl HealthStatus {
    pub fn is_ready(&self) -> bool {
        self.status == "ok" && self.llm && self.vector_store
    }
}
