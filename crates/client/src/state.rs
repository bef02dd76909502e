//! The client-side replica and its event fold.
//!
//! The fold is pure with respect to the event stream: it reads no clocks and
//! generates no identifiers, so two replicas fed the same events are equal
//! field for field. Events at or below the last applied sequence number are
//! skipped, which makes replayed overlap after a resume a no-op.

use fx_protocol::{
    AgentTaskState, AnalysisEvent, ErrorCategory, QueryContext, ReportResult, RiskAssessment,
    RunStage, SequencedEvent, TaskStatus, TradeDecision,
};
use std::collections::BTreeMap;

/// Transport health as seen by the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    /// The stream dropped; a reconnect attempt is pending or in flight.
    Reconnecting { attempt: u32 },
    /// Reconnect attempts are exhausted.
    Lost,
}

/// A subscriber's replica of one run, reconstructed purely from events.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientAnalysisState {
    pub query: Option<String>,
    pub stage: RunStage,
    pub context: Option<QueryContext>,
    pub tasks: BTreeMap<String, AgentTaskState>,
    pub risk: Option<RiskAssessment>,
    pub decision: Option<TradeDecision>,
    pub report: Option<ReportResult>,
    /// Terminal error, either relayed from the engine or synthesized by the
    /// consumer when the transport is lost.
    pub error: Option<(String, ErrorCategory)>,
    /// Append-only human-readable lines, one per applied event.
    pub log: Vec<String>,
    /// Sequence number of the last applied event.
    pub last_seq: Option<u64>,
    pub connection: ConnectionStatus,
}

impl Default for ClientAnalysisState {
    fn default() -> Self {
        Self {
            query: None,
            stage: RunStage::Init,
            context: None,
            tasks: BTreeMap::new(),
            risk: None,
            decision: None,
            report: None,
            error: None,
            log: Vec::new(),
            last_seq: None,
            connection: ConnectionStatus::Connected,
        }
    }
}

impl ClientAnalysisState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence number to resume a subscription from.
    pub fn next_resume_seq(&self) -> u64 {
        self.last_seq.map_or(0, |seq| seq + 1)
    }

    /// Whether a terminal event has been folded in.
    pub fn is_terminal(&self) -> bool {
        self.stage.is_terminal()
    }

    /// Fold one sequenced event into the replica.
    ///
    /// Returns `false` when the event was skipped as already applied.
    pub fn apply(&mut self, sequenced: &SequencedEvent) -> bool {
        if self.last_seq.is_some_and(|last| sequenced.seq <= last) {
            return false;
        }
        self.last_seq = Some(sequenced.seq);
        self.log.push(describe(&sequenced.event));

        match &sequenced.event {
            AnalysisEvent::Start { query, .. } => {
                self.query = Some(query.clone());
                self.stage = RunStage::Parsing;
            }
            AnalysisEvent::QueryParsed { context, .. } => {
                self.context = Some(context.clone());
                self.stage = RunStage::Analyzing;
            }
            AnalysisEvent::AgentStart { agent, timestamp } => {
                let task = self.task_slot(agent);
                task.start(*timestamp);
            }
            AnalysisEvent::AgentProgress {
                agent,
                step,
                message,
                progress,
                snapshot,
                started_at,
                completed_at,
            } => {
                let task = self.task_slot(agent);
                task.record_progress(
                    step.clone(),
                    message.clone(),
                    *progress,
                    snapshot.clone(),
                );
                if task.started_at.is_none() {
                    task.started_at = *started_at;
                }
                if task.completed_at.is_none() {
                    task.completed_at = *completed_at;
                }
            }
            AnalysisEvent::WebSearch {
                agent,
                queries,
                references,
            } => {
                let record = fx_protocol::SearchRecord {
                    queries: queries.clone(),
                    references: references.clone(),
                };
                self.task_slot(agent).record_search(record);
            }
            AnalysisEvent::AgentUpdate { agent, result } => {
                // The event carries no clock reading, so the terminal status
                // is set directly; the complete snapshot supplies the final
                // completion timestamp.
                let task = self.task_slot(agent);
                if !task.status.is_terminal() {
                    task.status = if result.success {
                        task.progress = 100;
                        TaskStatus::Completed
                    } else {
                        TaskStatus::Failed
                    };
                    task.result = Some(result.clone());
                }
            }
            AnalysisEvent::RiskUpdate { risk, .. } => {
                self.risk = Some(risk.clone());
                self.stage = RunStage::Gating;
            }
            AnalysisEvent::Decision { decision } => {
                self.decision = Some(decision.clone());
                self.stage = RunStage::Synthesizing;
            }
            AnalysisEvent::ReportUpdate { report } => {
                self.report = Some(report.clone());
                self.stage = RunStage::Reporting;
            }
            AnalysisEvent::Complete { result } => {
                // Adopt the authoritative snapshot wholesale.
                self.query = Some(result.query.clone());
                self.context = result.context.clone();
                self.stage = result.stage;
                self.tasks = result.tasks.clone();
                self.risk = result.risk.clone();
                self.decision = result.decision.clone();
                self.report = result.report.clone();
            }
            AnalysisEvent::Error {
                error, category, ..
            } => {
                self.error = Some((error.clone(), *category));
                self.stage = RunStage::Failed;
            }
        }
        true
    }

    fn task_slot(&mut self, agent: &str) -> &mut AgentTaskState {
        self.tasks
            .entry(agent.to_string())
            .or_insert_with(|| AgentTaskState::new(agent))
    }
}

/// One human-readable line per event, for the client's progress log.
fn describe(event: &AnalysisEvent) -> String {
    match event {
        AnalysisEvent::Start { query, .. } => format!("run started: {query}"),
        AnalysisEvent::QueryParsed { pair, .. } => format!("parsed pair {pair}"),
        AnalysisEvent::AgentStart { agent, .. } => format!("{agent} started"),
        AnalysisEvent::AgentProgress {
            agent,
            message,
            progress,
            ..
        } => format!("{agent} {progress}% {message}"),
        AnalysisEvent::WebSearch { agent, queries, .. } => {
            format!("{agent} searched: {}", queries.join(", "))
        }
        AnalysisEvent::AgentUpdate { agent, result } => {
            if result.success {
                format!("{agent} completed")
            } else {
                format!(
                    "{agent} failed: {}",
                    result.error.as_deref().unwrap_or("unknown")
                )
            }
        }
        AnalysisEvent::RiskUpdate { approved, .. } => {
            if *approved {
                "risk gate approved".to_string()
            } else {
                "risk gate rejected".to_string()
            }
        }
        AnalysisEvent::Decision { decision } => {
            format!("decision: {:?} at {:.2}", decision.action, decision.confidence)
        }
        AnalysisEvent::ReportUpdate { report } => {
            if report.success {
                "report generated".to_string()
            } else {
                format!(
                    "report failed: {}",
                    report.error.as_deref().unwrap_or("unknown")
                )
            }
        }
        AnalysisEvent::Complete { .. } => "run complete".to_string(),
        AnalysisEvent::Error { error, .. } => format!("run failed: {error}"),
    }
}
