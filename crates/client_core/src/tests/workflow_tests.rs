use super::*;
use std::{collections::VecDeque, time::Duration};

use async_trait::async_trait;
use reqwest::StatusCode;
use shared::{
    domain::{score_fraction, DisplaySeverity},
    protocol::UploadAck,
};
use tokio::sync::Notify;

use crate::api::ApiClientError;

type UploadResult = Result<UploadAck, ApiClientError>;
type AuditResult = Result<AuditReport, ApiClientError>;

fn sample_report() -> AuditReport {
    AuditReport {
        project_title: "Smart Grid AI".into(),
        compliance_score: 82,
        trl_level: 6,
        risk_assessment: "Baixo".into(),
        financial_analysis: "Budget consistent with scope".into(),
        team_analysis: "Two PhDs".into(),
        methodology_summary: "Agile research sprints".into(),
        justification: "Meets criteria".into(),
        innovation_highlights: vec!["A".into(), "B".into()],
    }
}

fn pdf(name: &str) -> SelectedFile {
    SelectedFile::new(name, b"%PDF-1.7 test".to_vec()).with_mime_type("application/pdf")
}

/// Scripted stand-in for the remote service. Results are consumed in order;
/// once a script runs dry every call succeeds.
#[derive(Default)]
struct ScriptedAuditApi {
    upload_results: Mutex<VecDeque<UploadResult>>,
    audit_results: Mutex<VecDeque<AuditResult>>,
    uploaded_files: Mutex<Vec<String>>,
    audit_requests: Mutex<Vec<AuditRequest>>,
    upload_gate: Option<Arc<Notify>>,
    audit_gate: Option<Arc<Notify>>,
}

impl ScriptedAuditApi {
    fn with_upload(self, result: UploadResult) -> Self {
        self.upload_results
            .try_lock()
            .expect("unshared")
            .push_back(result);
        self
    }

    fn with_audit(self, result: AuditResult) -> Self {
        self.audit_results
            .try_lock()
            .expect("unshared")
            .push_back(result);
        self
    }

    fn gated_upload(mut self, gate: Arc<Notify>) -> Self {
        self.upload_gate = Some(gate);
        self
    }

    fn gated_audit(mut self, gate: Arc<Notify>) -> Self {
        self.audit_gate = Some(gate);
        self
    }

    async fn upload_calls(&self) -> usize {
        self.uploaded_files.lock().await.len()
    }

    async fn audit_calls(&self) -> usize {
        self.audit_requests.lock().await.len()
    }
}

#[async_trait]
impl AuditApi for ScriptedAuditApi {
    async fn upload(&self, file: &SelectedFile) -> UploadResult {
        self.uploaded_files
            .lock()
            .await
            .push(file.filename().to_string());
        if let Some(gate) = &self.upload_gate {
            gate.notified().await;
        }
        self.upload_results
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(UploadAck::default()))
    }

    async fn audit(&self, request: &AuditRequest) -> AuditResult {
        self.audit_requests.lock().await.push(request.clone());
        if let Some(gate) = &self.audit_gate {
            gate.notified().await;
        }
        self.audit_results
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(sample_report()))
    }
}

fn controller(api: &Arc<ScriptedAuditApi>) -> Arc<WorkflowController> {
    let api: Arc<dyn AuditApi> = api.clone();
    WorkflowController::new(api)
}

async fn wait_for_phase(rx: &mut broadcast::Receiver<WorkflowState>, phase: &str) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let state = rx.recv().await.expect("state event");
            if state.phase() == phase {
                return;
            }
        }
    })
    .await
    .expect("timed out waiting for phase");
}

#[tokio::test]
async fn starts_idle_and_rejects_audit_without_file() {
    let api = Arc::new(ScriptedAuditApi::default());
    let controller = controller(&api);

    assert_eq!(controller.current_state().await, WorkflowState::Idle);
    assert_eq!(
        controller.start_audit_default().await,
        AuditRunOutcome::Rejected(RejectReason::NoFileSelected)
    );
    assert_eq!(controller.current_state().await, WorkflowState::Idle);
    assert_eq!(api.upload_calls().await, 0);
}

#[tokio::test]
async fn successful_run_walks_every_phase_in_order() {
    let api = Arc::new(ScriptedAuditApi::default());
    let controller = controller(&api);
    let mut rx = controller.subscribe();

    controller.select_file(pdf("plan.pdf")).await;
    assert_eq!(
        controller.start_audit_default().await,
        AuditRunOutcome::Succeeded
    );

    let mut phases = Vec::new();
    while let Ok(state) = rx.try_recv() {
        phases.push(state.phase());
    }
    assert_eq!(
        phases,
        vec!["file_selected", "uploading", "processing", "success"]
    );

    let state = controller.current_state().await;
    let report = state.report().expect("report");
    assert_eq!(report, &sample_report());
    assert_eq!(report.severity(), DisplaySeverity::Low);
    assert_eq!(score_fraction(report.compliance_score), 0.82);
    assert_eq!(state.file().map(SelectedFile::filename), Some("plan.pdf"));
}

#[tokio::test]
async fn default_query_is_sent_to_audit() {
    let api = Arc::new(ScriptedAuditApi::default());
    let controller = controller(&api);

    controller.select_file(pdf("plan.pdf")).await;
    controller.start_audit_default().await;

    let requests = api.audit_requests.lock().await;
    assert_eq!(requests.as_slice(), &[AuditRequest::default()]);
    assert_eq!(
        requests[0].query,
        "Analise este projeto e extraia as métricas de conformidade."
    );
}

#[tokio::test]
async fn custom_request_is_forwarded_unchanged() {
    let api = Arc::new(ScriptedAuditApi::default());
    let controller = controller(&api);
    let request = AuditRequest::new("Resuma o orçamento").with_system_prompt("Você é um auditor.");

    controller.select_file(pdf("plan.pdf")).await;
    controller.start_audit(request.clone()).await;

    assert_eq!(api.audit_requests.lock().await.as_slice(), &[request]);
}

#[tokio::test]
async fn upload_failure_never_reaches_audit() {
    let api = Arc::new(ScriptedAuditApi::default().with_upload(Err(
        ApiClientError::Transport {
            status: Some(StatusCode::INTERNAL_SERVER_ERROR),
            reason: "upload returned 500".into(),
        },
    )));
    let controller = controller(&api);

    controller.select_file(pdf("plan.pdf")).await;
    assert_eq!(controller.start_audit_default().await, AuditRunOutcome::Failed);

    assert_eq!(api.upload_calls().await, 1);
    assert_eq!(api.audit_calls().await, 0);
    assert_eq!(
        controller.current_state().await.error_message(),
        Some("Failed to process document. Please try again.")
    );
}

#[tokio::test]
async fn upload_failure_message_stays_generic_even_with_detail() {
    let api = Arc::new(
        ScriptedAuditApi::default().with_upload(Err(ApiClientError::Audit {
            status: Some(StatusCode::BAD_REQUEST),
            detail: Some("No text extracted from PDF".into()),
        })),
    );
    let controller = controller(&api);

    controller.select_file(pdf("scan.pdf")).await;
    controller.start_audit_default().await;

    assert_eq!(
        controller.current_state().await.error_message(),
        Some(GENERIC_FAILURE_MESSAGE)
    );
}

#[tokio::test]
async fn audit_failure_surfaces_server_detail() {
    let api = Arc::new(
        ScriptedAuditApi::default().with_audit(Err(ApiClientError::Audit {
            status: Some(StatusCode::UNPROCESSABLE_ENTITY),
            detail: Some("bad format".into()),
        })),
    );
    let controller = controller(&api);

    controller.select_file(pdf("plan.pdf")).await;
    assert_eq!(controller.start_audit_default().await, AuditRunOutcome::Failed);

    let state = controller.current_state().await;
    assert_eq!(state.error_message(), Some("bad format"));
    assert!(state.report().is_none());
}

#[tokio::test]
async fn audit_failure_without_detail_uses_generic_message() {
    let api = Arc::new(
        ScriptedAuditApi::default().with_audit(Err(ApiClientError::Audit {
            status: Some(StatusCode::BAD_GATEWAY),
            detail: None,
        })),
    );
    let controller = controller(&api);

    controller.select_file(pdf("plan.pdf")).await;
    controller.start_audit_default().await;

    assert_eq!(
        controller.current_state().await.error_message(),
        Some("Failed to process document. Please try again.")
    );
}

#[tokio::test]
async fn malformed_report_fails_closed() {
    let api = Arc::new(
        ScriptedAuditApi::default()
            .with_audit(Err(ApiClientError::Data("missing field `project_title`".into()))),
    );
    let controller = controller(&api);

    controller.select_file(pdf("plan.pdf")).await;
    controller.start_audit_default().await;

    let state = controller.current_state().await;
    assert_eq!(state.error_message(), Some(GENERIC_FAILURE_MESSAGE));
    assert!(state.report().is_none());
}

#[tokio::test]
async fn start_audit_while_uploading_is_ignored() {
    let gate = Arc::new(Notify::new());
    let api = Arc::new(ScriptedAuditApi::default().gated_upload(gate.clone()));
    let controller = controller(&api);
    let mut rx = controller.subscribe();

    controller.select_file(pdf("plan.pdf")).await;
    let run = tokio::spawn({
        let controller = controller.clone();
        async move { controller.start_audit_default().await }
    });
    wait_for_phase(&mut rx, "uploading").await;

    assert_eq!(
        controller.start_audit_default().await,
        AuditRunOutcome::Rejected(RejectReason::AuditInFlight)
    );
    assert_eq!(controller.current_state().await.phase(), "uploading");

    gate.notify_one();
    assert_eq!(run.await.expect("join"), AuditRunOutcome::Succeeded);
    assert_eq!(api.upload_calls().await, 1);
    assert_eq!(api.audit_calls().await, 1);
}

#[tokio::test]
async fn start_audit_while_processing_is_ignored() {
    let gate = Arc::new(Notify::new());
    let api = Arc::new(ScriptedAuditApi::default().gated_audit(gate.clone()));
    let controller = controller(&api);
    let mut rx = controller.subscribe();

    controller.select_file(pdf("plan.pdf")).await;
    let run = tokio::spawn({
        let controller = controller.clone();
        async move { controller.start_audit_default().await }
    });
    wait_for_phase(&mut rx, "processing").await;

    assert_eq!(
        controller.start_audit_default().await,
        AuditRunOutcome::Rejected(RejectReason::AuditInFlight)
    );

    gate.notify_one();
    assert_eq!(run.await.expect("join"), AuditRunOutcome::Succeeded);
    assert_eq!(api.upload_calls().await, 1);
    assert_eq!(api.audit_calls().await, 1);
}

#[tokio::test]
async fn selecting_a_file_mid_upload_discards_the_stale_run() {
    let gate = Arc::new(Notify::new());
    let api = Arc::new(ScriptedAuditApi::default().gated_upload(gate.clone()));
    let controller = controller(&api);
    let mut rx = controller.subscribe();

    controller.select_file(pdf("old.pdf")).await;
    let run = tokio::spawn({
        let controller = controller.clone();
        async move { controller.start_audit_default().await }
    });
    wait_for_phase(&mut rx, "uploading").await;

    controller.select_file(pdf("new.pdf")).await;
    gate.notify_one();

    assert_eq!(run.await.expect("join"), AuditRunOutcome::Superseded);
    assert_eq!(api.audit_calls().await, 0);
    assert_eq!(
        controller.current_state().await,
        WorkflowState::FileSelected {
            file: pdf("new.pdf")
        }
    );
}

#[tokio::test]
async fn selecting_a_file_mid_audit_discards_the_stale_report() {
    let gate = Arc::new(Notify::new());
    let api = Arc::new(ScriptedAuditApi::default().gated_audit(gate.clone()));
    let controller = controller(&api);
    let mut rx = controller.subscribe();

    controller.select_file(pdf("old.pdf")).await;
    let run = tokio::spawn({
        let controller = controller.clone();
        async move { controller.start_audit_default().await }
    });
    wait_for_phase(&mut rx, "processing").await;

    controller.select_file(pdf("new.pdf")).await;
    gate.notify_one();

    assert_eq!(run.await.expect("join"), AuditRunOutcome::Superseded);
    let state = controller.current_state().await;
    assert_eq!(state.phase(), "file_selected");
    assert!(state.report().is_none());
}

#[tokio::test]
async fn select_file_clears_previous_result() {
    let api = Arc::new(ScriptedAuditApi::default());
    let controller = controller(&api);

    controller.select_file(pdf("plan.pdf")).await;
    controller.start_audit_default().await;
    assert!(controller.current_state().await.report().is_some());

    controller.select_file(pdf("other.pdf")).await;
    let state = controller.current_state().await;
    assert_eq!(state.phase(), "file_selected");
    assert!(state.report().is_none());
    assert!(state.error_message().is_none());
}

#[tokio::test]
async fn rerun_after_error_reuploads_the_same_file() {
    let api = Arc::new(
        ScriptedAuditApi::default().with_audit(Err(ApiClientError::Audit {
            status: Some(StatusCode::SERVICE_UNAVAILABLE),
            detail: Some("Auditor not initialized (LLM or Vector Store missing)".into()),
        })),
    );
    let controller = controller(&api);

    controller.select_file(pdf("plan.pdf")).await;
    assert_eq!(controller.start_audit_default().await, AuditRunOutcome::Failed);
    assert_eq!(
        controller.start_audit_default().await,
        AuditRunOutcome::Succeeded
    );

    assert_eq!(
        api.uploaded_files.lock().await.as_slice(),
        &["plan.pdf".to_string(), "plan.pdf".to_string()]
    );
    assert_eq!(controller.current_state().await.phase(), "success");
}
