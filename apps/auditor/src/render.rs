//! Plain-text view of the workflow state.

use client_core::WorkflowState;
use shared::domain::AuditReport;

const SCORE_BAR_WIDTH: usize = 20;

pub fn progress_line(state: &WorkflowState) -> Option<String> {
    match state {
        WorkflowState::Uploading { file } => Some(format!(
            "Uploading {} ({} bytes)...",
            file.filename(),
            file.len()
        )),
        WorkflowState::Processing { .. } => Some("Analyzing...".to_string()),
        _ => None,
    }
}

pub fn score_bar(fraction: f64) -> String {
    let filled = ((fraction * SCORE_BAR_WIDTH as f64).round() as usize).min(SCORE_BAR_WIDTH);
    format!(
        "[{}{}]",
        "#".repeat(filled),
        "-".repeat(SCORE_BAR_WIDTH - filled)
    )
}

pub fn report_text(report: &AuditReport) -> String {
    let mut out = String::new();
    out.push_str("Audit Report\n");
    out.push_str(&format!("Project:     {}\n", report.project_title));
    out.push_str(&format!(
        "Risk:        {} ({})\n",
        report.risk_assessment,
        report.severity().as_str()
    ));
    out.push_str(&format!(
        "Compliance:  {:>3}/100 {} {}\n",
        report.compliance_score,
        score_bar(report.score_fraction()),
        report.score_band().as_str()
    ));
    out.push_str(&format!("TRL:         Level {}\n", report.trl_level));

    for (title, body) in [
        ("Financial Analysis", &report.financial_analysis),
        ("Team Analysis", &report.team_analysis),
        ("Methodology", &report.methodology_summary),
    ] {
        write_section(&mut out, title, body);
    }

    out.push_str("\nInnovation Highlights\n");
    if report.innovation_highlights.is_empty() {
        out.push_str("  (none)\n");
    }
    for item in &report.innovation_highlights {
        out.push_str(&format!("  - {item}\n"));
    }

    write_section(&mut out, "Justification", &report.justification);
    out
}

fn write_section(out: &mut String, title: &str, body: &str) {
    out.push_str(&format!("\n{title}\n"));
    if body.trim().is_empty() {
        out.push_str("  (not provided)\n");
    } else {
        out.push_str(&format!("  {}\n", body.trim()));
    }
}
