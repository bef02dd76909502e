//! Error types for the workflow engine.

use fx_protocol::ErrorCategory;
use thiserror::Error;

use crate::collaborators::TaskError;

/// Fatal run-level errors.
///
/// Task-level failures never surface here; they are absorbed by the
/// coordinator and recorded structurally in the per-task state. Only
/// sequential-stage failures (and cancellation) end a run through this type.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The query could not be normalized and the fallback heuristic also
    /// produced nothing.
    #[error("Query parsing failed: {0}")]
    Parse(String),

    /// The risk gate collaborator itself errored.
    #[error("Risk gate failed: {0}")]
    Gate(#[source] TaskError),

    /// The synthesis collaborator errored.
    #[error("Synthesis failed: {0}")]
    Synthesis(#[source] TaskError),

    /// The report collaborator errored at the transport level.
    #[error("Report generation failed: {0}")]
    Report(#[source] TaskError),

    /// A sequential stage exceeded its deadline.
    #[error("Stage '{stage}' exceeded its deadline")]
    StageTimeout { stage: &'static str },

    /// The subscriber cancelled the run before completion.
    #[error("Run cancelled by subscriber")]
    Cancelled,
}

impl EngineError {
    /// The wire category carried by the `error` event for this failure.
    pub fn category(&self) -> ErrorCategory {
        match self {
            EngineError::Parse(_) => ErrorCategory::Parse,
            EngineError::Gate(_) => ErrorCategory::Gate,
            EngineError::Synthesis(_) => ErrorCategory::Synthesis,
            EngineError::Report(_) => ErrorCategory::Report,
            EngineError::StageTimeout { .. } => ErrorCategory::Timeout,
            EngineError::Cancelled => ErrorCategory::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert_eq!(
            EngineError::Parse("bad".to_string()).category(),
            ErrorCategory::Parse
        );
        assert_eq!(
            EngineError::StageTimeout { stage: "synthesis" }.category(),
            ErrorCategory::Timeout
        );
        assert_eq!(
            EngineError::Gate(TaskError::ApiError("503".to_string())).category(),
            ErrorCategory::Gate
        );
    }

    #[test]
    fn test_error_display() {
        let err = EngineError::StageTimeout { stage: "report" };
        assert_eq!(err.to_string(), "Stage 'report' exceeded its deadline");
    }
}
