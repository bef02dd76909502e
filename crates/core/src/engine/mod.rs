//! The workflow state machine.
//!
//! One [`AnalysisEngine`] drives a run through its stages:
//!
//! Init -> Parsing -> Analyzing -> Gating -> Synthesizing -> Reporting -> Done
//!
//! A rejected risk gate short-circuits Gating -> Done with a hold decision
//! and no report. Fatal sequential-stage failures end in Failed. Every state
//! mutation pairs with exactly one emitted event, and exactly one terminal
//! event (`complete` or `error`) closes the stream; a cancelled run closes
//! it with no terminal event at all.

use fx_protocol::{AnalysisEvent, QueryContext, RunStage, RunState, SequencedEvent, TradeDecision};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc::Sender;
use tracing::{info, warn};

use crate::cancel::CancelToken;
use crate::collaborators::base::{
    now, AnalysisTask, QueryParser, ReportWriter, RiskGate, Synthesizer, TaskError,
};
use crate::config::EngineConfig;
use crate::coordinator;
use crate::emitter::Emitter;
use crate::error::EngineError;
use crate::parser::fallback_parse;

/// Orchestrates one analysis run end to end.
///
/// The engine is the single writer of the run's [`RunState`]; subscribers
/// observe the run only through the sequenced event stream.
pub struct AnalysisEngine {
    parser: Arc<dyn QueryParser>,
    tasks: Vec<Arc<dyn AnalysisTask>>,
    gate: Arc<dyn RiskGate>,
    synthesizer: Arc<dyn Synthesizer>,
    reporter: Arc<dyn ReportWriter>,
    config: EngineConfig,
}

impl AnalysisEngine {
    pub fn new(
        parser: Arc<dyn QueryParser>,
        gate: Arc<dyn RiskGate>,
        synthesizer: Arc<dyn Synthesizer>,
        reporter: Arc<dyn ReportWriter>,
    ) -> Self {
        Self {
            parser,
            tasks: Vec::new(),
            gate,
            synthesizer,
            reporter,
            config: EngineConfig::default(),
        }
    }

    /// Register one parallel analysis task. Task names must be unique.
    pub fn with_task(mut self, task: Arc<dyn AnalysisTask>) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Recommended capacity for the run's event channel.
    pub fn channel_capacity(&self) -> usize {
        self.config.channel_capacity
    }

    /// Execute one run, streaming sequenced events onto `events`.
    ///
    /// Returns the final state on success. On a fatal failure the `error`
    /// event has already been emitted before the `Err` is returned; on
    /// cancellation the stream is closed without a terminal event.
    pub async fn run(
        &self,
        query: &str,
        events: Sender<SequencedEvent>,
        cancel: CancelToken,
    ) -> Result<RunState, EngineError> {
        let mut emitter = Emitter::new(events);
        let mut state = RunState::new(query);
        info!(run_id = %state.run_id, query, "run started");

        match self.drive(&mut state, &mut emitter, &cancel).await {
            Ok(()) => {
                state.stage = RunStage::Done;
                emitter
                    .emit(AnalysisEvent::Complete {
                        result: Box::new(state.clone()),
                    })
                    .await;
                info!(run_id = %state.run_id, "run completed");
                Ok(state)
            }
            Err(EngineError::Cancelled) => {
                info!(run_id = %state.run_id, "run cancelled");
                Err(EngineError::Cancelled)
            }
            Err(err) => {
                state.stage = RunStage::Failed;
                warn!(run_id = %state.run_id, error = %err, "run failed");
                emitter
                    .emit(AnalysisEvent::Error {
                        error: err.to_string(),
                        category: err.category(),
                        timestamp: now(),
                    })
                    .await;
                Err(err)
            }
        }
    }

    /// Advance through the non-terminal stages, emitting as it goes.
    ///
    /// Emits no terminal event itself; `run` owns the single terminal.
    async fn drive(
        &self,
        state: &mut RunState,
        emitter: &mut Emitter,
        cancel: &CancelToken,
    ) -> Result<(), EngineError> {
        emitter
            .emit(AnalysisEvent::Start {
                query: state.query.clone(),
                timestamp: state.started_at,
            })
            .await;

        state.stage = RunStage::Parsing;
        let context = self.parse_stage(state, cancel).await?;
        emitter
            .emit(AnalysisEvent::QueryParsed {
                context: context.clone(),
                pair: context.pair.clone(),
                timestamp: now(),
            })
            .await;
        state.context = Some(context.clone());

        state.stage = RunStage::Analyzing;
        coordinator::run_tasks(
            &self.tasks,
            &context,
            state,
            emitter,
            self.config.task_deadline(),
            cancel,
        )
        .await?;

        state.stage = RunStage::Gating;
        let risk = self
            .sequential_stage("gate", cancel, self.gate.assess(&state.tasks), EngineError::Gate)
            .await?;
        let approved = risk.approved;
        state.risk = Some(risk.clone());
        emitter
            .emit(AnalysisEvent::RiskUpdate {
                risk: risk.clone(),
                approved,
            })
            .await;

        if !approved {
            // Gate rejection is a normal outcome: short-circuit to Done with
            // a hold decision and skip synthesis and report entirely.
            let decision = TradeDecision::hold_sentinel();
            state.decision = Some(decision.clone());
            emitter.emit(AnalysisEvent::Decision { decision }).await;
            return Ok(());
        }

        state.stage = RunStage::Synthesizing;
        let decision = self
            .sequential_stage(
                "synthesis",
                cancel,
                self.synthesizer.synthesize(&context, &state.tasks, &risk),
                EngineError::Synthesis,
            )
            .await?;
        state.decision = Some(decision.clone());
        emitter
            .emit(AnalysisEvent::Decision {
                decision: decision.clone(),
            })
            .await;

        state.stage = RunStage::Reporting;
        // An Err here is a transport-level failure and fatal; a structural
        // failure comes back inside the ReportResult and is only recorded.
        let report = self
            .sequential_stage(
                "report",
                cancel,
                self.reporter.write(&context, &decision, &state.tasks),
                EngineError::Report,
            )
            .await?;
        state.report = Some(report.clone());
        emitter.emit(AnalysisEvent::ReportUpdate { report }).await;

        Ok(())
    }

    /// Normalize the query, falling back to the heuristic parser when the
    /// collaborator fails. Only an empty query is fatal.
    async fn parse_stage(
        &self,
        state: &RunState,
        cancel: &CancelToken,
    ) -> Result<QueryContext, EngineError> {
        let parsed = tokio::select! {
            _ = cancel.cancelled() => return Err(EngineError::Cancelled),
            result = self.parser.parse(&state.query) => result,
        };
        match parsed {
            Ok(context) => Ok(context),
            Err(err) => {
                warn!(error = %err, "parser collaborator failed, using fallback");
                fallback_parse(&state.query)
                    .ok_or_else(|| EngineError::Parse("query is empty".to_string()))
            }
        }
    }

    /// Run one sequential stage under the configured deadline, racing the
    /// cancellation token.
    async fn sequential_stage<T, F>(
        &self,
        stage: &'static str,
        cancel: &CancelToken,
        work: F,
        map_err: impl FnOnce(TaskError) -> EngineError,
    ) -> Result<T, EngineError>
    where
        F: Future<Output = Result<T, TaskError>>,
    {
        tokio::select! {
            _ = cancel.cancelled() => Err(EngineError::Cancelled),
            outcome = async {
                match self.config.stage_deadline() {
                    Some(deadline) => match tokio::time::timeout(deadline, work).await {
                        Ok(inner) => inner.map_err(map_err),
                        Err(_) => Err(EngineError::StageTimeout { stage }),
                    },
                    None => work.await.map_err(map_err),
                }
            } => outcome,
        }
    }
}
