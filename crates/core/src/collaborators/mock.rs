//! Mock collaborator implementations for testing and demos.

use async_trait::async_trait;
use fx_protocol::{
    AgentTaskState, QueryContext, Reference, ReportResult, RiskAssessment, SearchRecord,
    TradeAction, TradeDecision,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::collaborators::base::{
    AnalysisTask, ProgressSink, QueryParser, ReportWriter, RiskGate, Synthesizer, TaskError,
};

/// Scripted parser collaborator.
pub struct MockParser {
    outcome: Result<QueryContext, TaskError>,
}

impl MockParser {
    pub fn ok(context: QueryContext) -> Self {
        Self {
            outcome: Ok(context),
        }
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            outcome: Err(TaskError::ApiError(reason.into())),
        }
    }
}

#[async_trait]
impl QueryParser for MockParser {
    async fn parse(&self, _query: &str) -> Result<QueryContext, TaskError> {
        self.outcome.clone()
    }
}

/// Scripted analysis task.
///
/// Emits its progress script, then any search records, sleeps for the
/// configured latency, and finally returns its outcome. A panicking variant
/// exists to exercise the coordinator's panic capture.
pub struct MockTask {
    name: String,
    latency: Duration,
    progress_script: Vec<(String, u8)>,
    searches: Vec<SearchRecord>,
    outcome: Result<Value, TaskError>,
    panics: bool,
}

impl MockTask {
    pub fn success(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            latency: Duration::ZERO,
            progress_script: vec![
                (format!("{name}: collecting data"), 30),
                (format!("{name}: analyzing"), 70),
            ],
            searches: Vec::new(),
            outcome: Ok(json!({ "agent": name, "ok": true })),
            panics: false,
            name,
        }
    }

    pub fn failing(name: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut task = Self::success(name);
        task.outcome = Err(TaskError::ExecutionError(reason.into()));
        task
    }

    pub fn panicking(name: impl Into<String>) -> Self {
        let mut task = Self::success(name);
        task.panics = true;
        task
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_progress(mut self, script: Vec<(String, u8)>) -> Self {
        self.progress_script = script;
        self
    }

    pub fn with_search(mut self, queries: Vec<String>, references: Vec<Reference>) -> Self {
        self.searches.push(SearchRecord { queries, references });
        self
    }

    pub fn with_result(mut self, data: Value) -> Self {
        self.outcome = Ok(data);
        self
    }
}

#[async_trait]
impl AnalysisTask for MockTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(
        &self,
        _pair: &str,
        _context: &QueryContext,
        sink: ProgressSink,
    ) -> Result<Value, TaskError> {
        for (message, percent) in &self.progress_script {
            sink.progress(None, message.clone(), *percent, None).await;
        }
        for record in &self.searches {
            sink.searched(record.queries.clone(), record.references.clone())
                .await;
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.panics {
            panic!("mock task '{}' panicked", self.name);
        }
        self.outcome.clone()
    }
}

/// Scripted risk gate.
pub struct MockGate {
    outcome: Result<RiskAssessment, TaskError>,
}

impl MockGate {
    pub fn approving() -> Self {
        Self {
            outcome: Ok(RiskAssessment {
                approved: true,
                data: json!({ "position_size": 0.5, "risk_per_trade": 0.02 }),
            }),
        }
    }

    pub fn rejecting(reason: impl Into<String>) -> Self {
        Self {
            outcome: Ok(RiskAssessment {
                approved: false,
                data: json!({ "rejection_reason": reason.into() }),
            }),
        }
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            outcome: Err(TaskError::ExecutionError(reason.into())),
        }
    }
}

#[async_trait]
impl RiskGate for MockGate {
    async fn assess(
        &self,
        _tasks: &BTreeMap<String, AgentTaskState>,
    ) -> Result<RiskAssessment, TaskError> {
        self.outcome.clone()
    }
}

/// Scripted synthesizer.
pub struct MockSynthesizer {
    outcome: Result<TradeDecision, TaskError>,
}

impl MockSynthesizer {
    pub fn deciding(action: TradeAction, confidence: f64) -> Self {
        Self {
            outcome: Ok(TradeDecision {
                action,
                confidence,
                reasoning: json!({ "summary": "Mock synthesis of all agent results" }),
                trade_parameters: Some(json!({ "entry_price": 1.085, "stop_loss": 1.08 })),
                citations: Vec::new(),
            }),
        }
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            outcome: Err(TaskError::ApiError(reason.into())),
        }
    }
}

#[async_trait]
impl Synthesizer for MockSynthesizer {
    async fn synthesize(
        &self,
        _context: &QueryContext,
        _tasks: &BTreeMap<String, AgentTaskState>,
        _risk: &RiskAssessment,
    ) -> Result<TradeDecision, TaskError> {
        self.outcome.clone()
    }
}

/// Scripted report writer.
pub struct MockReporter {
    outcome: Result<ReportResult, TaskError>,
}

impl MockReporter {
    pub fn ok() -> Self {
        Self {
            outcome: Ok(ReportResult::ok(
                "Mock analysis report covering all agent findings",
            )),
        }
    }

    /// Rendering failed but the collaborator responded; recorded, not fatal.
    pub fn structural_failure(reason: impl Into<String>) -> Self {
        Self {
            outcome: Ok(ReportResult::failed(reason.into())),
        }
    }

    /// The collaborator itself errored; fatal to the run.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            outcome: Err(TaskError::ApiError(reason.into())),
        }
    }
}

#[async_trait]
impl ReportWriter for MockReporter {
    async fn write(
        &self,
        _context: &QueryContext,
        _decision: &TradeDecision,
        _tasks: &BTreeMap<String, AgentTaskState>,
    ) -> Result<ReportResult, TaskError> {
        self.outcome.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::base::TaskSignal;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_mock_task_success_script() {
        let task = MockTask::success("news");
        let (tx, mut rx) = mpsc::channel(8);
        let sink = ProgressSink::new("news".to_string(), tx);

        let result = task
            .run("EUR/USD", &QueryContext::for_pair("EUR/USD"), sink)
            .await
            .expect("success");
        assert_eq!(result["agent"], "news");

        let mut progress_count = 0;
        while let Ok(signal) = rx.try_recv() {
            if matches!(signal, TaskSignal::Progress { .. }) {
                progress_count += 1;
            }
        }
        assert_eq!(progress_count, 2);
    }

    #[tokio::test]
    async fn test_mock_task_failure() {
        let task = MockTask::failing("technical", "indicator service down");
        let (tx, _rx) = mpsc::channel(8);
        let sink = ProgressSink::new("technical".to_string(), tx);

        let result = task
            .run("EUR/USD", &QueryContext::for_pair("EUR/USD"), sink)
            .await;
        assert_eq!(
            result,
            Err(TaskError::ExecutionError("indicator service down".to_string()))
        );
    }

    #[tokio::test]
    async fn test_mock_gate_verdicts() {
        let tasks = BTreeMap::new();

        let verdict = MockGate::approving().assess(&tasks).await.expect("verdict");
        assert!(verdict.approved);

        let verdict = MockGate::rejecting("drawdown limit")
            .assess(&tasks)
            .await
            .expect("verdict");
        assert!(!verdict.approved);
        assert_eq!(verdict.data["rejection_reason"], "drawdown limit");

        assert!(MockGate::failing("gate offline").assess(&tasks).await.is_err());
    }

    #[tokio::test]
    async fn test_mock_reporter_modes() {
        let ctx = QueryContext::for_pair("EUR/USD");
        let decision = TradeDecision::hold_sentinel();
        let tasks = BTreeMap::new();

        let report = MockReporter::ok()
            .write(&ctx, &decision, &tasks)
            .await
            .expect("report");
        assert!(report.success);

        let report = MockReporter::structural_failure("template error")
            .write(&ctx, &decision, &tasks)
            .await
            .expect("structural failures still return a result");
        assert!(!report.success);

        assert!(MockReporter::failing("LLM unreachable")
            .write(&ctx, &decision, &tasks)
            .await
            .is_err());
    }
}
