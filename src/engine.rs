//! The boundary to the symbolic-execution engine.
//!
//! The engine is consumed as an opaque primitive provider: it can report whether concolic
//! tracking is enabled, register a buffer as a free variable while preserving its current
//! bytes, and add a path constraint. Everything else (path exploration, constraint solving,
//! scheduling) stays behind this trait.

use serde::{Deserialize, Serialize};

/// A boolean condition over a concolically tracked integer.
///
/// Each predicate carries the integer's *current concrete* value next to the bound, so a
/// gateway implementation can rebuild the engine-side expression over the symbolic variable
/// that was registered for those bytes. The predicate must remain satisfiable or the engine
/// discards the current exploration path.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    /// The tracked integer is at least `bound`
    GreaterOrEqual {
        /// Current concrete value of the tracked integer
        value: i64,
        /// Inclusive lower bound
        bound: i64,
    },
    /// The tracked integer is at most `bound`
    LessOrEqual {
        /// Current concrete value of the tracked integer
        value: i64,
        /// Inclusive upper bound
        bound: i64,
    },
    /// The tracked integer is strictly below `bound`
    LessThan {
        /// Current concrete value of the tracked integer
        value: i64,
        /// Exclusive upper bound
        bound: i64,
    },
}

impl Predicate {
    /// Whether the predicate holds for the concrete value it was issued with.
    #[must_use]
    pub fn holds(&self) -> bool {
        match *self {
            Predicate::GreaterOrEqual { value, bound } => value >= bound,
            Predicate::LessOrEqual { value, bound } => value <= bound,
            Predicate::LessThan { value, bound } => value < bound,
        }
    }
}

/// The engine capability consumed by [`crate::ConcolicMarker`].
///
/// `mark_concolic` and `assume` are potential suspension points: the engine may clone the
/// entire calling process right after either call and resume each clone along a different
/// explored path. The primitives themselves do not fail; all validation belongs to the
/// caller, *before* the first call of a marking sequence.
pub trait EngineGateway {
    /// Whether symbolic/concolic tracking is currently enabled.
    fn is_active(&self) -> bool;

    /// Registers `buffer` as a free variable named `identifier`, preserving its current
    /// bytes as the concrete value of the current path.
    fn mark_concolic(&mut self, buffer: &[u8], identifier: &str);

    /// Adds a path constraint.
    fn assume(&mut self, predicate: Predicate);
}

/// A gateway that is never active.
///
/// Lets harness code run unchanged outside the engine: every marking operation fails fast
/// with [`crate::Error::EngineInactive`] instead of touching any value.
#[derive(Debug, Default, Clone, Copy)]
pub struct NopEngineGateway;

impl EngineGateway for NopEngineGateway {
    fn is_active(&self) -> bool {
        false
    }

    fn mark_concolic(&mut self, _buffer: &[u8], _identifier: &str) {}

    fn assume(&mut self, _predicate: Predicate) {}
}

/// One recorded engine call, in issue order.
#[cfg(test)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum EngineCall {
    MarkConcolic {
        identifier: String,
        bytes: Vec<u8>,
    },
    Assume(Predicate),
}

/// A gateway that records the exact sequence of calls it receives.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingGateway {
    pub calls: Vec<EngineCall>,
}

#[cfg(test)]
impl EngineGateway for RecordingGateway {
    fn is_active(&self) -> bool {
        true
    }

    fn mark_concolic(&mut self, buffer: &[u8], identifier: &str) {
        self.calls.push(EngineCall::MarkConcolic {
            identifier: identifier.to_string(),
            bytes: buffer.to_vec(),
        });
    }

    fn assume(&mut self, predicate: Predicate) {
        self.calls.push(EngineCall::Assume(predicate));
    }
}
