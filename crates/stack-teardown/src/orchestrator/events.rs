//! Progress events emitted by `TeardownOrchestrator`
//!
//! Consumers (the CLI progress printer, tests) receive these over an
//! unbounded channel and decide how to present them.

use crate::deleter::Outcome;
use stack_teardown_common::ResourceKind;
use std::fmt;

/// Stage of a teardown run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Discover,
    Plan,
    Confirm,
    Execute,
    Report,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunPhase::Discover => "discover",
            RunPhase::Plan => "plan",
            RunPhase::Confirm => "confirm",
            RunPhase::Execute => "execute",
            RunPhase::Report => "report",
        })
    }
}

/// Event emitted by `TeardownOrchestrator` during a run
#[derive(Debug, Clone, PartialEq)]
pub enum TeardownEvent {
    /// A new phase started
    PhaseStarted(RunPhase),
    /// Listing one kind failed; it is treated as empty
    DiscoveryFailed { kind: ResourceKind, error: String },
    /// Deletion of one kind's group started
    GroupStarted { kind: ResourceKind, count: usize },
    /// One resource reached its outcome
    ResourceFinished {
        kind: ResourceKind,
        id: String,
        outcome: Outcome,
        completed: usize,
        total: usize,
    },
    /// The run was interrupted; remaining resources were not attempted
    Cancelled,
}

impl TeardownEvent {
    /// One line of operator-facing progress, `None` for events not worth
    /// printing
    pub fn progress_line(&self) -> Option<String> {
        match self {
            TeardownEvent::PhaseStarted(RunPhase::Discover) => {
                Some("Discovering resources...".to_string())
            }
            TeardownEvent::PhaseStarted(_) => None,
            TeardownEvent::DiscoveryFailed { kind, error } => {
                Some(format!("warning: could not list {kind} resources: {error}"))
            }
            TeardownEvent::GroupStarted { kind, count } => {
                Some(format!("Deleting {count} {kind} resource(s)"))
            }
            TeardownEvent::ResourceFinished {
                kind,
                id,
                outcome,
                completed,
                total,
            } => Some(format!(
                "[{completed}/{total}] {kind} {id}: {}",
                outcome.describe_for(*kind)
            )),
            TeardownEvent::Cancelled => {
                Some("Cancelled; remaining resources were not attempted".to_string())
            }
        }
    }
}
