//! Size bounds for variable-length values and the constraints issued for them.

use serde::{Deserialize, Serialize};

use crate::engine::{EngineGateway, Predicate};

/// The declared size bounds of a variable-length value.
///
/// The sign of `max` selects one of three load-bearing modes:
/// * `max < 0` — the size is fixed; nothing about it is tracked or constrained.
/// * `max == 0` — only the lower bound `min` is enforced.
/// * `max > 0` — the inclusive range `[min, max]` is enforced.
///
/// `min` must never be negative; that is a caller defect, not an input to handle.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeBounds {
    /// Inclusive lower bound, `>= 0`
    pub min: i64,
    /// Upper bound selector, see the type-level docs
    pub max: i64,
}

impl SizeBounds {
    /// Bounds for a fixed-size value: no size tracking at all.
    pub const FIXED: Self = Self { min: 0, max: -1 };

    /// Creates bounds with the given minimum and maximum.
    #[must_use]
    pub const fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    /// Whether the size field of a value marked under these bounds is itself tracked as a
    /// concolic variable.
    #[must_use]
    pub fn tracks_size(&self) -> bool {
        self.max >= 0
    }

    /// Whether `size` satisfies these bounds.
    #[must_use]
    pub fn check(&self, size: i64) -> bool {
        debug_assert!(self.min >= 0, "negative minimum size is a caller defect");

        if self.max < 0 {
            true // fixed-size values are always fine
        } else if self.max == 0 {
            size >= self.min
        } else {
            size >= self.min && size <= self.max
        }
    }

    /// Issues the path constraints matching these bounds for an already-registered size.
    ///
    /// The lower bound is assumed unconditionally, the upper bound only when `max > 0`.
    /// Callers only reach this when [`SizeBounds::tracks_size`] holds; `max < 0` issues
    /// nothing, for completeness.
    pub fn constrain<E>(&self, engine: &mut E, size: i64)
    where
        E: EngineGateway,
    {
        debug_assert!(self.min >= 0, "negative minimum size is a caller defect");

        if self.max < 0 {
            return;
        }
        engine.assume(Predicate::GreaterOrEqual {
            value: size,
            bound: self.min,
        });
        if self.max > 0 {
            engine.assume(Predicate::LessOrEqual {
                value: size,
                bound: self.max,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SizeBounds;
    use crate::engine::{EngineCall, Predicate, RecordingGateway};

    #[test]
    fn negative_max_accepts_any_size() {
        for size in [0, 1, 7, i64::MAX] {
            assert!(SizeBounds::FIXED.check(size));
            assert!(SizeBounds::new(3, -1).check(size));
        }
    }

    #[test]
    fn zero_max_enforces_the_lower_bound_only() {
        let bounds = SizeBounds::new(3, 0);
        assert!(!bounds.check(2));
        assert!(bounds.check(3));
        assert!(bounds.check(i64::MAX));
    }

    #[test]
    fn positive_max_enforces_the_inclusive_range() {
        let bounds = SizeBounds::new(2, 5);
        assert!(!bounds.check(1));
        assert!(bounds.check(2));
        assert!(bounds.check(5));
        assert!(!bounds.check(6));
    }

    #[test]
    fn constrain_issues_lower_bound_then_upper_bound() {
        let mut engine = RecordingGateway::default();
        SizeBounds::new(1, 10).constrain(&mut engine, 5);
        assert_eq!(
            engine.calls,
            vec![
                EngineCall::Assume(Predicate::GreaterOrEqual { value: 5, bound: 1 }),
                EngineCall::Assume(Predicate::LessOrEqual { value: 5, bound: 10 }),
            ]
        );
    }

    #[test]
    fn constrain_with_zero_max_issues_only_the_lower_bound() {
        let mut engine = RecordingGateway::default();
        SizeBounds::new(2, 0).constrain(&mut engine, 7);
        assert_eq!(
            engine.calls,
            vec![EngineCall::Assume(Predicate::GreaterOrEqual {
                value: 7,
                bound: 2
            })]
        );
    }

    #[test]
    fn constrain_with_negative_max_issues_nothing() {
        let mut engine = RecordingGateway::default();
        SizeBounds::FIXED.constrain(&mut engine, 7);
        assert!(engine.calls.is_empty());
    }
}
