//! # fx-client
//!
//! Client-side state reconstruction for fx-agent event streams.
//!
//! A subscriber never sees the engine's state directly; it folds the
//! sequenced event stream into its own [`ClientAnalysisState`] replica. The
//! fold is deterministic and idempotent, so a reconnecting client can replay
//! overlapping events without corruption.
//!
//! ## Modules
//!
//! - [`state`]: The replica and its event fold
//! - [`consumer`]: Stream consumption with reconnect and resume

pub mod consumer;
pub mod state;

pub use consumer::{
    ChannelEventSource, ConsumerError, EventSource, ReconnectPolicy, StreamConsumer,
};
pub use state::{ClientAnalysisState, ConnectionStatus};
