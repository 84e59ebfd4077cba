//! Debug instrumentation for session mutations and compute calls.

use crate::registry::{Session, SessionId};

/// When a log call happens relative to the operation it describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Before,
    After,
}

impl Phase {
    pub fn name(self) -> &'static str {
        match self {
            Phase::Before => "before",
            Phase::After => "after",
        }
    }
}

/// Observer of session state around every mutation and compute.
///
/// Implementations must not affect results.
pub trait CalcLogger: Send + Sync {
    fn log(&self, op: &str, phase: Phase, id: SessionId, session: Option<&Session>);

    /// Whether this logger records anything.
    fn enabled(&self) -> bool {
        true
    }
}

/// Logger that records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl CalcLogger for NoopLogger {
    fn log(&self, _op: &str, _phase: Phase, _id: SessionId, _session: Option<&Session>) {}

    fn enabled(&self) -> bool {
        false
    }
}

/// Logger that renders the session through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl CalcLogger for TracingLogger {
    fn log(&self, op: &str, phase: Phase, id: SessionId, session: Option<&Session>) {
        match session {
            Some(session) => {
                tracing::info!(op, phase = phase.name(), session = id, "{session}")
            }
            None => tracing::info!(op, phase = phase.name(), session = id, "<absent>"),
        }
    }
}
