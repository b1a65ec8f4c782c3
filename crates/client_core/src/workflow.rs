use std::{fmt, sync::Arc};

use shared::{domain::AuditReport, error::GENERIC_FAILURE_MESSAGE, protocol::AuditRequest};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::api::AuditApi;

const STATE_EVENT_CAPACITY: usize = 64;

/// Document picked by the user. Its format is not checked here.
#[derive(Clone, PartialEq, Eq)]
pub struct SelectedFile {
    filename: String,
    bytes: Arc<[u8]>,
    mime_type: Option<String>,
}

impl SelectedFile {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
            mime_type: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for SelectedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedFile")
            .field("filename", &self.filename)
            .field("size_bytes", &self.bytes.len())
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum WorkflowState {
    #[default]
    Idle,
    FileSelected {
        file: SelectedFile,
    },
    Uploading {
        file: SelectedFile,
    },
    Processing {
        file: SelectedFile,
    },
    Success {
        file: SelectedFile,
        report: AuditReport,
    },
    Error {
        file: SelectedFile,
        message: String,
    },
}

impl WorkflowState {
    pub fn phase(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::FileSelected { .. } => "file_selected",
            Self::Uploading { .. } => "uploading",
            Self::Processing { .. } => "processing",
            Self::Success { .. } => "success",
            Self::Error { .. } => "error",
        }
    }

    pub fn file(&self) -> Option<&SelectedFile> {
        match self {
            Self::Idle => None,
            Self::FileSelected { file }
            | Self::Uploading { file }
            | Self::Processing { file }
            | Self::Success { file, .. }
            | Self::Error { file, .. } => Some(file),
        }
    }

    pub fn report(&self) -> Option<&AuditReport> {
        match self {
            Self::Success { report, .. } => Some(report),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error { message, .. } => Some(message),
            _ => None,
        }
    }

    /// True while an upload or audit request is outstanding.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Uploading { .. } | Self::Processing { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    NoFileSelected,
    AuditInFlight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditRunOutcome {
    Succeeded,
    Failed,
    /// A newer file selection replaced this run; its responses were dropped.
    Superseded,
    /// The call had no effect.
    Rejected(RejectReason),
}

struct ControllerInner {
    state: WorkflowState,
    /// Bumped on every file selection; runs started under an older value are stale.
    generation: u64,
}

/// Owns the workflow state and sequences upload → audit for the selected file.
pub struct WorkflowController {
    api: Arc<dyn AuditApi>,
    inner: Mutex<ControllerInner>,
    events: broadcast::Sender<WorkflowState>,
}

impl WorkflowController {
    pub fn new(api: Arc<dyn AuditApi>) -> Arc<Self> {
        let (events, _) = broadcast::channel(STATE_EVENT_CAPACITY);
        Arc::new(Self {
            api,
            inner: Mutex::new(ControllerInner {
                state: WorkflowState::Idle,
                generation: 0,
            }),
            events,
        })
    }

    pub async fn current_state(&self) -> WorkflowState {
        self.inner.lock().await.state.clone()
    }

    /// Every state the controller enters from now on, in order.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowState> {
        self.events.subscribe()
    }

    pub async fn select_file(&self, file: SelectedFile) {
        let mut guard = self.inner.lock().await;
        guard.generation += 1;
        if guard.state.is_busy() {
            info!(
                phase = guard.state.phase(),
                generation = guard.generation,
                "workflow: in-flight audit superseded by new file selection"
            );
        }
        info!(
            filename = %file.filename(),
            size_bytes = file.len(),
            "workflow: file selected"
        );
        self.transition(&mut guard, WorkflowState::FileSelected { file });
    }

    pub async fn start_audit_default(&self) -> AuditRunOutcome {
        self.start_audit(AuditRequest::default()).await
    }

    pub async fn start_audit(&self, request: AuditRequest) -> AuditRunOutcome {
        let (file, generation) = {
            let mut guard = self.inner.lock().await;
            let file = match &guard.state {
                WorkflowState::Idle => {
                    debug!("workflow: audit requested without a file");
                    return AuditRunOutcome::Rejected(RejectReason::NoFileSelected);
                }
                WorkflowState::Uploading { .. } | WorkflowState::Processing { .. } => {
                    debug!(
                        phase = guard.state.phase(),
                        "workflow: audit already in flight"
                    );
                    return AuditRunOutcome::Rejected(RejectReason::AuditInFlight);
                }
                WorkflowState::FileSelected { file }
                | WorkflowState::Success { file, .. }
                | WorkflowState::Error { file, .. } => file.clone(),
            };
            let generation = guard.generation;
            self.transition(&mut guard, WorkflowState::Uploading { file: file.clone() });
            (file, generation)
        };

        let uploaded = self.api.upload(&file).await;
        {
            let mut guard = self.inner.lock().await;
            if guard.generation != generation {
                debug!(generation, "workflow: dropping stale upload response");
                return AuditRunOutcome::Superseded;
            }
            match uploaded {
                Ok(ack) => {
                    info!(chunks = ?ack.chunks, "workflow: upload acknowledged");
                    self.transition(&mut guard, WorkflowState::Processing { file: file.clone() });
                }
                Err(err) => {
                    warn!(error = %err, "workflow: upload failed");
                    self.transition(
                        &mut guard,
                        WorkflowState::Error {
                            file,
                            message: GENERIC_FAILURE_MESSAGE.to_string(),
                        },
                    );
                    return AuditRunOutcome::Failed;
                }
            }
        }

        let audited = self.api.audit(&request).await;
        let mut guard = self.inner.lock().await;
        if guard.generation != generation {
            debug!(generation, "workflow: dropping stale audit response");
            return AuditRunOutcome::Superseded;
        }
        match audited {
            Ok(report) => {
                info!(
                    project_title = %report.project_title,
                    severity = report.severity().as_str(),
                    "workflow: audit complete"
                );
                self.transition(&mut guard, WorkflowState::Success { file, report });
                AuditRunOutcome::Succeeded
            }
            Err(err) => {
                warn!(error = %err, "workflow: audit failed");
                let message = err.user_message().to_string();
                self.transition(&mut guard, WorkflowState::Error { file, message });
                AuditRunOutcome::Failed
            }
        }
    }

    fn transition(&self, inner: &mut ControllerInner, next: WorkflowState) {
        debug!(from = inner.state.phase(), to = next.phase(), "workflow: transition");
        inner.state = next;
        // No subscribers is fine.
        let _ = self.events.send(inner.state.clone());
    }
}

#[cfg(test)]
#[path = "tests/workflow_tests.rs"]
mod tests;
