use thiserror::Error;

/// Message shown whenever the service gives no usable explanation for a failure.
pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to process document. Please try again.";

/// A report that parsed but breaks one of the field constraints.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractViolation {
    #[error("project_title must not be empty")]
    EmptyProjectTitle,
    #[error("compliance_score {0} is outside 0..=100")]
    ScoreOutOfRange(i64),
}
