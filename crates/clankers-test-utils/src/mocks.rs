//! Canned task implementations for testing.
//!
//! Provides tasks that emit a fixed constraint, or switch to another one at a
//! given time, so formulation tests do not depend on any tracking logic.

use clankers_invdyn::{Constraint, ConstraintKind, StateSnapshot, Task};
use nalgebra::{DMatrix, DVector};

// ---------------------------------------------------------------------------
// ConstantTask
// ---------------------------------------------------------------------------

/// A task that always returns the same constraint.
pub struct ConstantTask {
    constraint: Constraint,
}

impl ConstantTask {
    pub const fn new(constraint: Constraint) -> Self {
        Self { constraint }
    }

    /// `A x = b`.
    pub fn equality(a: DMatrix<f64>, b: DVector<f64>) -> Self {
        Self::new(Constraint::Equality { a, b })
    }

    /// Track `target` on the whole block: `I x = target`.
    pub fn tracking(target: DVector<f64>) -> Self {
        let n = target.len();
        Self::equality(DMatrix::identity(n, n), target)
    }

    /// `lower <= A x <= upper`.
    pub fn inequality(a: DMatrix<f64>, lower: DVector<f64>, upper: DVector<f64>) -> Self {
        Self::new(Constraint::Inequality { a, lower, upper })
    }

    /// `lower <= x <= upper`.
    pub fn bound(lower: DVector<f64>, upper: DVector<f64>) -> Self {
        Self::new(Constraint::Bound { lower, upper })
    }

    /// Symmetric bound `|x| <= limit` on `dim` entries.
    pub fn symmetric_bound(dim: usize, limit: f64) -> Self {
        Self::bound(
            DVector::from_element(dim, -limit),
            DVector::from_element(dim, limit),
        )
    }
}

impl Task for ConstantTask {
    fn dim(&self) -> usize {
        self.constraint.rows()
    }

    fn kind(&self) -> ConstraintKind {
        self.constraint.kind()
    }

    fn compute(
        &mut self,
        _time: f64,
        _q: &DVector<f64>,
        _v: &DVector<f64>,
        _snapshot: &StateSnapshot,
    ) -> &Constraint {
        &self.constraint
    }
}

// ---------------------------------------------------------------------------
// SwitchingTask
// ---------------------------------------------------------------------------

/// A task that returns `before` until `switch_time`, then `after`.
///
/// Used to exercise tasks whose row count or kind changes between cycles.
pub struct SwitchingTask {
    before: Constraint,
    after: Constraint,
    switch_time: f64,
    switched: bool,
}

impl SwitchingTask {
    pub const fn new(before: Constraint, after: Constraint, switch_time: f64) -> Self {
        Self {
            before,
            after,
            switch_time,
            switched: false,
        }
    }

    const fn active(&self) -> &Constraint {
        if self.switched { &self.after } else { &self.before }
    }
}

impl Task for SwitchingTask {
    fn dim(&self) -> usize {
        self.active().rows()
    }

    fn kind(&self) -> ConstraintKind {
        self.active().kind()
    }

    fn compute(
        &mut self,
        time: f64,
        _q: &DVector<f64>,
        _v: &DVector<f64>,
        _snapshot: &StateSnapshot,
    ) -> &Constraint {
        self.switched = time >= self.switch_time;
        self.active()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
