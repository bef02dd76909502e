//! Collaborator abstraction and adapters.
//!
//! Every piece of domain logic the engine drives (parsing, the parallel
//! analysis tasks, the risk gate, synthesis, report generation) lives
//! behind a trait seam defined here. The engine only ever sees these
//! contracts.

pub mod base;
pub mod mock;

pub use base::{
    AnalysisTask, ProgressSink, QueryParser, ReportWriter, RiskGate, Synthesizer, TaskError,
    TaskSignal,
};
pub use mock::{MockGate, MockParser, MockReporter, MockSynthesizer, MockTask};
