//! Collaborator traits and supporting types.

use async_trait::async_trait;
use chrono::Utc;
use fx_protocol::{
    AgentTaskState, QueryContext, Reference, ReportResult, RiskAssessment, SearchRecord,
    TaskResult, TradeDecision,
};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;
use tokio::sync::mpsc::Sender;

/// Errors a collaborator may return.
///
/// Collaborators report failure through this type rather than panicking;
/// a panic that escapes anyway is still captured at the task boundary and
/// converted into a failed terminal result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("Collaborator unavailable: {0}")]
    NotAvailable(String),
    #[error("API call failed: {0}")]
    ApiError(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Execution failed: {0}")]
    ExecutionError(String),
}

/// Internal signal funneled from task callbacks into the coordinator's
/// mailbox. All per-task state mutation happens on the mailbox consumer,
/// never on the task side.
#[derive(Debug)]
pub enum TaskSignal {
    Started {
        agent: String,
    },
    Progress {
        agent: String,
        step: Option<String>,
        message: String,
        percent: u8,
        snapshot: Option<Value>,
    },
    Search {
        agent: String,
        record: SearchRecord,
    },
    Terminal {
        agent: String,
        result: TaskResult,
    },
}

/// Task-name-tagged handle a running task uses to report progress.
///
/// Cheap to clone; all updates are serialized through the coordinator
/// mailbox. Send failures are ignored: they only occur when the run has
/// already been cancelled or torn down.
#[derive(Clone)]
pub struct ProgressSink {
    agent: String,
    tx: Sender<TaskSignal>,
}

impl ProgressSink {
    pub(crate) fn new(agent: String, tx: Sender<TaskSignal>) -> Self {
        Self { agent, tx }
    }

    /// The task name this sink is bound to.
    pub fn agent(&self) -> &str {
        &self.agent
    }

    /// Report a progress update.
    ///
    /// `percent` is interpreted on a 0-100 scale; the coordinator clamps it
    /// and enforces monotonicity, so callers may be sloppy.
    pub async fn progress(
        &self,
        step: Option<&str>,
        message: impl Into<String>,
        percent: u8,
        snapshot: Option<Value>,
    ) {
        let _ = self
            .tx
            .send(TaskSignal::Progress {
                agent: self.agent.clone(),
                step: step.map(str::to_string),
                message: message.into(),
                percent,
                snapshot,
            })
            .await;
    }

    /// Report an auxiliary web lookup.
    pub async fn searched(&self, queries: Vec<String>, references: Vec<Reference>) {
        let _ = self
            .tx
            .send(TaskSignal::Search {
                agent: self.agent.clone(),
                record: SearchRecord { queries, references },
            })
            .await;
    }

    pub(crate) async fn started(&self) {
        let _ = self
            .tx
            .send(TaskSignal::Started {
                agent: self.agent.clone(),
            })
            .await;
    }

    pub(crate) async fn terminal(&self, result: TaskResult) {
        let _ = self
            .tx
            .send(TaskSignal::Terminal {
                agent: self.agent.clone(),
                result,
            })
            .await;
    }
}

/// Parser collaborator: raw query to normalized context.
#[async_trait]
pub trait QueryParser: Send + Sync {
    async fn parse(&self, query: &str) -> Result<QueryContext, TaskError>;
}

/// One parallel analysis collaborator (news, technical, fundamental, ...).
#[async_trait]
pub trait AnalysisTask: Send + Sync {
    /// Stable task identity; must be unique within one engine's task set.
    fn name(&self) -> &str;

    /// Run the analysis for `pair`, reporting progress through `sink`.
    ///
    /// Errors are recorded as that task's failed result and never affect
    /// sibling tasks.
    async fn run(
        &self,
        pair: &str,
        context: &QueryContext,
        sink: ProgressSink,
    ) -> Result<Value, TaskError>;
}

/// Gate collaborator deciding whether the run proceeds to synthesis.
#[async_trait]
pub trait RiskGate: Send + Sync {
    async fn assess(
        &self,
        tasks: &BTreeMap<String, AgentTaskState>,
    ) -> Result<RiskAssessment, TaskError>;
}

/// Synthesis collaborator producing the final decision.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(
        &self,
        context: &QueryContext,
        tasks: &BTreeMap<String, AgentTaskState>,
        risk: &RiskAssessment,
    ) -> Result<TradeDecision, TaskError>;
}

/// Report collaborator rendering the final document.
///
/// A *structural* failure (could not render) is reported inside the returned
/// `ReportResult` and does not fail the run; an `Err` from this method is a
/// transport-level failure and is fatal.
#[async_trait]
pub trait ReportWriter: Send + Sync {
    async fn write(
        &self,
        context: &QueryContext,
        decision: &TradeDecision,
        tasks: &BTreeMap<String, AgentTaskState>,
    ) -> Result<ReportResult, TaskError>;
}

/// Timestamp helper shared by engine and coordinator.
pub(crate) fn now() -> chrono::DateTime<Utc> {
    Utc::now()
}
