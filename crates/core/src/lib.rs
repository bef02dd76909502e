//! # fx-core
//!
//! Workflow engine and parallel task coordination for fx-agent.
//!
//! This crate provides:
//! - Collaborator trait seams for parsing, analysis, gating, synthesis, report
//! - The parallel task coordinator with per-task failure isolation
//! - The workflow state machine that drives one run end to end
//! - The sequenced event emitter feeding the run's single-subscriber stream
//!
//! ## Modules
//!
//! - [`collaborators`]: Collaborator traits and mock adapters
//! - [`coordinator`]: Parallel fan-out, progress relay, and join barrier
//! - [`engine`]: The workflow state machine
//! - [`emitter`]: Sequence-numbered event emission
//! - [`parser`]: Heuristic fallback query parser
//! - [`config`]: Engine configuration loading
//! - [`cancel`]: Cooperative run cancellation

pub mod cancel;
pub mod collaborators;
pub mod config;
pub mod coordinator;
pub mod emitter;
pub mod engine;
pub mod error;
pub mod parser;

pub use cancel::{cancel_pair, CancelHandle, CancelToken};
pub use engine::AnalysisEngine;
pub use error::EngineError;
