//! Hierarchical QP data handed to the optimizer, and the optimizer interface.

use nalgebra::DVector;

use crate::constraint::Constraint;

/// A named constraint with the weight it carries at its level.
///
/// At level 0 the weight is ignored: every row is hard.
#[derive(Clone, Debug, PartialEq)]
pub struct WeightedConstraint {
    pub name: String,
    pub weight: f64,
    pub constraint: Constraint,
}

/// All constraints of one priority level.
pub type HqpLevel = Vec<WeightedConstraint>;

/// Priority levels, most important first. Every constraint spans `n_var` columns.
pub type HqpData = Vec<HqpLevel>;

/// Outcome reported by the optimizer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolverStatus {
    Optimal,
    Infeasible,
    MaxIterReached,
    Error,
}

impl SolverStatus {
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Optimal)
    }
}

/// Raw optimizer result.
#[derive(Clone, Debug, PartialEq)]
pub struct HqpOutput {
    pub status: SolverStatus,
    /// Flat solution vector of length `n_var` on success.
    pub x: DVector<f64>,
    pub iterations: u32,
}

impl HqpOutput {
    pub const fn optimal(x: DVector<f64>) -> Self {
        Self {
            status: SolverStatus::Optimal,
            x,
            iterations: 0,
        }
    }

    pub fn failed(status: SolverStatus) -> Self {
        Self {
            status,
            x: DVector::zeros(0),
            iterations: 0,
        }
    }
}

/// External hierarchical QP solver.
pub trait HqpSolver {
    fn solve(&mut self, problem: &HqpData) -> HqpOutput;
}

/// Total `(equality, inequality)` rows at level 0.
pub fn hard_row_counts(problem: &HqpData) -> (usize, usize) {
    problem.first().map_or((0, 0), |level| {
        level.iter().fold((0, 0), |(eq, ineq), wc| {
            if wc.constraint.is_equality() {
                (eq + wc.constraint.rows(), ineq)
            } else {
                (eq, ineq + wc.constraint.rows())
            }
        })
    })
}
