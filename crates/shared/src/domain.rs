use serde::{Deserialize, Serialize};

use crate::error::ContractViolation;

pub const RISK_LABEL_LOW: &str = "Baixo";
pub const RISK_LABEL_MEDIUM: &str = "Médio";
pub const RISK_LABEL_HIGH: &str = "Alto";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplaySeverity {
    Low,
    Medium,
    High,
}

impl DisplaySeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplaySeverity::Low => "low",
            DisplaySeverity::Medium => "medium",
            DisplaySeverity::High => "high",
        }
    }
}

/// Tier of the compliance score indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBand {
    Weak,     // <= 40
    Moderate, // 41-70
    Strong,   // > 70
}

impl ScoreBand {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreBand::Weak => "weak",
            ScoreBand::Moderate => "moderate",
            ScoreBand::Strong => "strong",
        }
    }
}

/// Maps a raw risk label onto a display tier.
///
/// Only the exact labels `"Baixo"` and `"Médio"` lower the tier; every other
/// value, including `"Alto"`, different casing and garbage, is shown as High.
pub fn severity_of(risk_assessment: &str) -> DisplaySeverity {
    match risk_assessment {
        RISK_LABEL_LOW => DisplaySeverity::Low,
        RISK_LABEL_MEDIUM => DisplaySeverity::Medium,
        _ => DisplaySeverity::High,
    }
}

/// Fraction of the score indicator to fill, clamped to `[0, 1]`.
pub fn score_fraction(compliance_score: i64) -> f64 {
    (compliance_score.clamp(0, 100) as f64) / 100.0
}

pub fn score_band(compliance_score: i64) -> ScoreBand {
    if compliance_score > 70 {
        ScoreBand::Strong
    } else if compliance_score > 40 {
        ScoreBand::Moderate
    } else {
        ScoreBand::Weak
    }
}

/// Compliance report produced by the audit service.
///
/// Received reports are never modified; display tiers are derived on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    pub project_title: String,
    pub compliance_score: i64,
    pub trl_level: i64,
    pub risk_assessment: String,
    #[serde(default)]
    pub financial_analysis: String,
    #[serde(default)]
    pub team_analysis: String,
    #[serde(default)]
    pub methodology_summary: String,
    #[serde(default)]
    pub justification: String,
    #[serde(default)]
    pub innovation_highlights: Vec<String>,
}

impl AuditReport {
    pub fn validate(&self) -> Result<(), ContractViolation> {
        if self.project_title.trim().is_empty() {
            return Err(ContractViolation::EmptyProjectTitle);
        }
        if !(0..=100).contains(&self.compliance_score) {
            return Err(ContractViolation::ScoreOutOfRange(self.compliance_score));
        }
        Ok(())
    }

    pub fn severity(&self) -> DisplaySeverity {
        severity_of(&self.risk_assessment)
    }

    pub fn score_fraction(&self) -> f64 {
        score_fraction(self.compliance_score)
    }

    pub fn score_band(&self) -> ScoreBand {
        score_band(self.compliance_score)
    }
}
