//! Induction-variable change bounds.
//!
//! An induction variable records by how much its symbol changes over one
//! loop iteration as an integer range. Arithmetic saturates at the int32
//! limits instead of wrapping; a change that cannot be bounded makes the
//! variable indeterminate, and it stays that way for the rest of the pass.

use crate::ir::SymId;

/// Saturation sentinel for lower bounds.
pub const INT_CONST_MIN: i32 = i32::MIN;
/// Saturation sentinel for upper bounds.
pub const INT_CONST_MAX: i32 = i32::MAX;

/// A closed integer range `[lower, upper]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntConstantBounds {
    lower: i32,
    upper: i32,
}

impl IntConstantBounds {
    /// Create a range. Panics if `lower > upper`.
    pub fn new(lower: i32, upper: i32) -> Self {
        assert!(lower <= upper, "invalid bounds [{lower}, {upper}]");
        Self { lower, upper }
    }

    /// The lower bound.
    pub fn lower(self) -> i32 {
        self.lower
    }

    /// The upper bound.
    pub fn upper(self) -> i32 {
        self.upper
    }
}

/// Per-iteration change of an induction variable.
///
/// # Examples
///
/// ```
/// use jit_compiler::bounds::{InductionVariable, INT_CONST_MAX};
/// use jit_compiler::ir::SymId;
///
/// let mut iv = InductionVariable::new(SymId::from(1), 1);
/// assert!(iv.add(INT_CONST_MAX));
/// assert_eq!(iv.change_bounds().map(|b| b.upper()), Some(INT_CONST_MAX));
/// assert!(!iv.add(-1));
/// assert!(!iv.is_change_determinate());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InductionVariable {
    sym: SymId,
    change: Option<IntConstantBounds>,
}

impl InductionVariable {
    /// A variable that changes by exactly `change` per iteration.
    pub fn new(sym: SymId, change: i32) -> Self {
        Self {
            sym,
            change: Some(IntConstantBounds::new(change, change)),
        }
    }

    /// The symbol that changes.
    pub fn sym(&self) -> SymId {
        self.sym
    }

    /// Whether the change is still bounded.
    pub fn is_change_determinate(&self) -> bool {
        self.change.is_some()
    }

    /// The change range, when determinate.
    pub fn change_bounds(&self) -> Option<IntConstantBounds> {
        self.change
    }

    /// Mark the change unbounded.
    pub fn set_change_is_indeterminate(&mut self) {
        self.change = None;
    }

    /// Whether every possible change moves the variable the same way.
    pub fn is_change_unidirectional(&self) -> bool {
        self.change.is_some_and(|b| (b.lower >= 0 && b.upper != 0) || (b.upper <= 0 && b.lower != 0))
    }

    /// Add `n` to both bounds, saturating at the sentinels.
    ///
    /// A bound already sitting at a sentinel may only move further in the
    /// same direction; moving it back makes the variable indeterminate and
    /// returns false.
    pub fn add(&mut self, n: i32) -> bool {
        let Some(bounds) = self.change else {
            return false;
        };
        if n == 0 {
            return true;
        }
        match (add_bound(bounds.lower, n), add_bound(bounds.upper, n)) {
            (Some(lower), Some(upper)) => {
                self.change = Some(IntConstantBounds::new(lower, upper));
                true
            }
            _ => {
                self.change = None;
                false
            }
        }
    }

    /// Widen an inner loop's change to cover any number of iterations.
    pub fn expand_inner_loop_change(&mut self) {
        if let Some(b) = self.change {
            let lower = if b.lower < 0 { INT_CONST_MIN } else { b.lower };
            let upper = if b.upper > 0 { INT_CONST_MAX } else { b.upper };
            self.change = Some(IntConstantBounds::new(lower, upper));
        }
    }

    /// Union with the change observed on another path.
    pub fn merge(&mut self, other: &InductionVariable) {
        assert_eq!(self.sym, other.sym, "merging induction variables of different symbols");
        self.change = match (self.change, other.change) {
            (Some(a), Some(b)) => Some(IntConstantBounds::new(a.lower.min(b.lower), a.upper.max(b.upper))),
            _ => None,
        };
    }
}

fn add_bound(bound: i32, n: i32) -> Option<i32> {
    match bound {
        INT_CONST_MIN if n >= 0 => None,
        INT_CONST_MIN => Some(INT_CONST_MIN),
        INT_CONST_MAX if n < 0 => None,
        INT_CONST_MAX => Some(INT_CONST_MAX),
        _ => Some(bound.checked_add(n).unwrap_or(if n < 0 { INT_CONST_MIN } else { INT_CONST_MAX })),
    }
}
