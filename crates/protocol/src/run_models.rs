//! Run lifecycle models.
//!
//! This module defines the stage enum for the workflow state machine and the
//! server-side aggregate that the engine alone mutates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ts_rs::TS;
use uuid::Uuid;

use crate::analysis_models::{QueryContext, ReportResult, RiskAssessment, TradeDecision};
use crate::task_models::AgentTaskState;

/// Stage of the workflow state machine.
///
/// Normal progression:
/// Init -> Parsing -> Analyzing -> Gating -> Synthesizing -> Reporting -> Done
///
/// A rejected risk gate short-circuits Gating -> Done. Failed is absorbing
/// and reachable from any stage.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStage {
    Init,
    Parsing,
    Analyzing,
    Gating,
    Synthesizing,
    Reporting,
    Done,
    Failed,
}

impl RunStage {
    /// Whether the run has reached a terminal stage.
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStage::Done | RunStage::Failed)
    }
}

/// Full server-side state of one analysis run.
///
/// Each run gets a unique ID at creation. The workflow engine is the single
/// writer; every mutation corresponds to exactly one emitted event. The
/// `complete` event carries a final snapshot of this aggregate.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
pub struct RunState {
    /// Unique identifier for this run.
    #[ts(type = "string")]
    pub run_id: Uuid,

    /// The raw user query that started the run.
    pub query: String,

    /// Normalized context, present once parsing finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<QueryContext>,

    pub stage: RunStage,

    pub started_at: DateTime<Utc>,

    /// Per-task state, keyed by task name. BTreeMap keeps snapshots in a
    /// stable order for replay comparisons.
    pub tasks: BTreeMap<String, AgentTaskState>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk: Option<RiskAssessment>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<TradeDecision>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ReportResult>,
}

impl RunState {
    /// Create a fresh run in the Init stage.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            query: query.into(),
            context: None,
            stage: RunStage::Init,
            started_at: Utc::now(),
            tasks: BTreeMap::new(),
            risk: None,
            decision: None,
            report: None,
        }
    }

    /// Names and captured reasons of every failed task.
    pub fn task_errors(&self) -> Vec<(String, String)> {
        self.tasks
            .values()
            .filter_map(|task| {
                let result = task.result.as_ref()?;
                let error = result.error.as_ref()?;
                Some((task.name.clone(), error.clone()))
            })
            .collect()
    }

    /// Whether every registered task has a terminal status.
    pub fn all_tasks_terminal(&self) -> bool {
        self.tasks.values().all(|t| t.status.is_terminal())
    }
}
