//! Event stream protocol.
//!
//! This module defines the message types for the ordered, single-subscriber
//! event stream that carries all observable progress for one run.
//!
//! Every internal transition, whether a stage change in the workflow engine
//! or a progress relay from the parallel coordinator, is serialized into one
//! [`AnalysisEvent`] and wrapped in a [`SequencedEvent`] carrying a
//! monotonically increasing sequence number. Events are never mutated after
//! emission; delivery order equals causal order.
//!
//! Uses tagged enum serialization for TypeScript compatibility:
//! ```json
//! {
//!   "type": "agentProgress",
//!   "payload": {
//!     "agent": "news",
//!     "step": "fetching_headlines",
//!     "progress": 40
//!   }
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::analysis_models::{QueryContext, Reference, ReportResult, RiskAssessment, TradeDecision};
use crate::run_models::RunState;
use crate::task_models::TaskResult;

/// Category of a terminal error, used by clients to distinguish a failed
/// stage from a lost transport.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    /// Query could not be normalized and the fallback parser also failed.
    Parse,
    /// The risk gate collaborator itself errored (distinct from rejection).
    Gate,
    /// The synthesis collaborator errored.
    Synthesis,
    /// The report collaborator errored at the transport level.
    Report,
    /// A sequential stage exceeded its deadline.
    Timeout,
    /// Client-synthesized: reconnect attempts were exhausted.
    Stream,
    /// Anything else.
    Internal,
}

/// Events emitted by the engine onto the run's stream.
///
/// Exactly one terminal event (`complete` or `error`) is emitted per run,
/// always last. A cancelled run closes the stream without a terminal event.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum AnalysisEvent {
    /// The run has started.
    Start {
        query: String,
        timestamp: DateTime<Utc>,
    },

    /// The query was normalized into a structured context (possibly via the
    /// fallback heuristic).
    QueryParsed {
        context: QueryContext,
        pair: String,
        timestamp: DateTime<Utc>,
    },

    /// A parallel analysis task was dispatched.
    AgentStart {
        agent: String,
        timestamp: DateTime<Utc>,
    },

    /// A task reported fine-grained progress.
    AgentProgress {
        agent: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        step: Option<String>,
        message: String,
        /// 0-100, non-decreasing within one task's sub-stream.
        progress: u8,
        #[serde(skip_serializing_if = "Option::is_none")]
        #[ts(type = "any | null")]
        snapshot: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        started_at: Option<DateTime<Utc>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        completed_at: Option<DateTime<Utc>>,
    },

    /// A task performed an auxiliary web lookup.
    WebSearch {
        agent: String,
        queries: Vec<String>,
        references: Vec<Reference>,
    },

    /// A task reached its terminal result.
    AgentUpdate { agent: String, result: TaskResult },

    /// The risk gate returned its verdict.
    RiskUpdate {
        risk: RiskAssessment,
        approved: bool,
    },

    /// The final trading decision (or the hold sentinel on gate rejection).
    Decision { decision: TradeDecision },

    /// Report generation finished (successfully or not).
    ReportUpdate { report: ReportResult },

    /// The run finished; carries the full aggregate snapshot. Terminal.
    Complete { result: Box<RunState> },

    /// The run failed. Terminal.
    Error {
        error: String,
        category: ErrorCategory,
        timestamp: DateTime<Utc>,
    },
}

impl AnalysisEvent {
    /// Whether this event closes the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AnalysisEvent::Complete { .. } | AnalysisEvent::Error { .. })
    }

    /// The task name this event is tagged with, if it is task-scoped.
    pub fn agent(&self) -> Option<&str> {
        match self {
            AnalysisEvent::AgentStart { agent, .. }
            | AnalysisEvent::AgentProgress { agent, .. }
            | AnalysisEvent::WebSearch { agent, .. }
            | AnalysisEvent::AgentUpdate { agent, .. } => Some(agent),
            _ => None,
        }
    }
}

/// The wire unit: an event plus its position in the stream.
///
/// Sequence numbers start at 0 and increase by exactly 1 per event, which
/// lets a reconnecting client resume from `last_seq + 1` and fold replayed
/// events idempotently.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
pub struct SequencedEvent {
    pub seq: u64,
    pub event: AnalysisEvent,
}

impl SequencedEvent {
    pub fn is_terminal(&self) -> bool {
        self.event.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_tagging() {
        let event = AnalysisEvent::AgentStart {
            agent: "news".to_string(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["type"], "agentStart");
        assert_eq!(json["payload"]["agent"], "news");
    }

    #[test]
    fn test_terminal_detection() {
        let complete = AnalysisEvent::Complete {
            result: Box::new(RunState::new("EUR/USD")),
        };
        let error = AnalysisEvent::Error {
            error: "boom".to_string(),
            category: ErrorCategory::Internal,
            timestamp: Utc::now(),
        };
        let progress = AnalysisEvent::AgentProgress {
            agent: "news".to_string(),
            step: None,
            message: "working".to_string(),
            progress: 10,
            snapshot: None,
            started_at: None,
            completed_at: None,
        };

        assert!(complete.is_terminal());
        assert!(error.is_terminal());
        assert!(!progress.is_terminal());
    }

    #[test]
    fn test_agent_scoping() {
        let search = AnalysisEvent::WebSearch {
            agent: "fundamental".to_string(),
            queries: vec!["ECB rate decision".to_string()],
            references: vec![],
        };
        assert_eq!(search.agent(), Some("fundamental"));

        let start = AnalysisEvent::Start {
            query: "EUR/USD".to_string(),
            timestamp: Utc::now(),
        };
        assert_eq!(start.agent(), None);
    }

    #[test]
    fn test_sequenced_event_round_trip() {
        let sequenced = SequencedEvent {
            seq: 7,
            event: AnalysisEvent::RiskUpdate {
                risk: RiskAssessment {
                    approved: true,
                    data: serde_json::json!({"position_size": 0.5}),
                },
                approved: true,
            },
        };

        let json = serde_json::to_string(&sequenced).expect("serialize");
        let back: SequencedEvent = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, sequenced);
        assert_eq!(back.seq, 7);
    }
}
