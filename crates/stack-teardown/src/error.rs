//! Errors that stop a teardown before any resource is deleted

use crate::graph::CycleError;
use stack_teardown_common::SelectorError;
use thiserror::Error;

/// Validation and planning failures (exit code 1).
///
/// Per-resource delete failures are never errors; they are outcomes in the
/// run report.
#[derive(Debug, Error)]
pub enum TeardownError {
    #[error("invalid selector: {0}")]
    InvalidSelector(#[from] SelectorError),

    #[error("invalid region '{0}'")]
    InvalidRegion(String),

    #[error("no resource kinds selected")]
    EmptyScope,

    #[error(transparent)]
    Cycle(#[from] CycleError),

    #[error("failed to read confirmation")]
    Confirmation(#[source] std::io::Error),
}
