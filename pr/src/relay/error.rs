//! Relay error types

use thiserror::Error;

use crate::watermark::StoreError;

/// Errors that stop the relay
///
/// Feed and delivery failures never show up here; they end a cycle or skip an
/// event and are reported through [`super::CycleOutcome`] and the logs.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Watermark store failed: {0}")]
    Store(#[from] StoreError),
}
