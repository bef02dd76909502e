//! Shared helpers for fx-core integration tests.

pub mod assertions;
pub mod fixtures;
