//! # fx-protocol
//!
//! Core protocol definitions and data models for fx-agent.
//!
//! This crate defines all shared data structures used for:
//! - Runtime state of an analysis run and its parallel tasks
//! - The ordered event stream emitted by the engine
//! - Trading-domain payloads (query context, risk verdict, decision, report)
//!
//! ## Modules
//!
//! - [`analysis_models`]: Query context, risk, decision, and report payloads
//! - [`task_models`]: Per-task runtime state for the parallel stage
//! - [`run_models`]: Run lifecycle stage and the server-side aggregate
//! - [`event`]: The sequenced event stream protocol
//!
//! ## Design Principles
//!
//! - Minimal dependencies: Only serde, ts-rs, uuid, and chrono
//! - TypeScript generation: All types derive `TS` for client compatibility
//! - Independent compilation: No dependencies on other fx-agent crates

pub mod analysis_models;
pub mod event;
pub mod run_models;
pub mod task_models;

// Re-export all public types for convenience
pub use analysis_models::*;
pub use event::*;
pub use run_models::*;
pub use task_models::*;
