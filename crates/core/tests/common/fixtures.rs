//! Engine and collaborator fixtures.

use fx_core::collaborators::{MockGate, MockParser, MockReporter, MockSynthesizer, MockTask};
use fx_core::engine::AnalysisEngine;
use fx_protocol::{QueryContext, TradeAction};
use std::sync::Arc;
use std::time::Duration;

/// The three standard analysis task names, mirroring the production set.
pub const TASK_NAMES: [&str; 3] = ["news", "technical", "fundamental"];

pub fn eur_usd_context() -> QueryContext {
    QueryContext::for_pair("EUR/USD")
}

/// A fully healthy engine: parser, gate, synthesizer, and reporter all
/// succeed; the three standard tasks complete instantly.
pub fn healthy_engine() -> AnalysisEngine {
    let mut engine = AnalysisEngine::new(
        Arc::new(MockParser::ok(eur_usd_context())),
        Arc::new(MockGate::approving()),
        Arc::new(MockSynthesizer::deciding(TradeAction::Buy, 0.8)),
        Arc::new(MockReporter::ok()),
    );
    for name in TASK_NAMES {
        engine = engine.with_task(Arc::new(MockTask::success(name)));
    }
    engine
}

/// A healthy engine whose tasks sleep for the given per-task latencies.
pub fn engine_with_latencies(latencies: [Duration; 3]) -> AnalysisEngine {
    let mut engine = AnalysisEngine::new(
        Arc::new(MockParser::ok(eur_usd_context())),
        Arc::new(MockGate::approving()),
        Arc::new(MockSynthesizer::deciding(TradeAction::Buy, 0.8)),
        Arc::new(MockReporter::ok()),
    );
    for (name, latency) in TASK_NAMES.into_iter().zip(latencies) {
        engine = engine.with_task(Arc::new(MockTask::success(name).with_latency(latency)));
    }
    engine
}
