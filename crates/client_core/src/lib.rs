//! Client side of the document audit service: the HTTP contract and the
//! upload → audit workflow that drives it.

mod api;
mod workflow;

pub use api::{ApiClientError, AuditApi, HttpAuditClient};
pub use workflow::{AuditRunOutcome, RejectReason, SelectedFile, WorkflowController, WorkflowState};
