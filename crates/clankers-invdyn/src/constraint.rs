//! Linear constraints exchanged between tasks, the assembler and the solver.

use nalgebra::{DMatrix, DVector};

/// Which family a [`Constraint`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    /// `A x = b`
    Equality,
    /// `lower <= A x <= upper`
    Inequality,
    /// `lower <= x <= upper`
    Bound,
}

/// A linear constraint over some block of the decision vector.
///
/// Tasks produce constraints over their own columns (accelerations, one
/// contact's forces, or actuator torques); the assembler widens them to the
/// full decision vector.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    Equality {
        a: DMatrix<f64>,
        b: DVector<f64>,
    },
    Inequality {
        a: DMatrix<f64>,
        lower: DVector<f64>,
        upper: DVector<f64>,
    },
    Bound {
        lower: DVector<f64>,
        upper: DVector<f64>,
    },
}

impl Constraint {
    /// Zero equality with `rows` rows over `cols` columns.
    pub fn equality_zeros(rows: usize, cols: usize) -> Self {
        Self::Equality {
            a: DMatrix::zeros(rows, cols),
            b: DVector::zeros(rows),
        }
    }

    /// Zero inequality with `rows` rows over `cols` columns and unbounded sides.
    pub fn inequality_unbounded(rows: usize, cols: usize) -> Self {
        Self::Inequality {
            a: DMatrix::zeros(rows, cols),
            lower: DVector::from_element(rows, f64::NEG_INFINITY),
            upper: DVector::from_element(rows, f64::INFINITY),
        }
    }

    pub const fn kind(&self) -> ConstraintKind {
        match self {
            Self::Equality { .. } => ConstraintKind::Equality,
            Self::Inequality { .. } => ConstraintKind::Inequality,
            Self::Bound { .. } => ConstraintKind::Bound,
        }
    }

    /// Number of constraint rows.
    pub fn rows(&self) -> usize {
        match self {
            Self::Equality { b, .. } => b.len(),
            Self::Inequality { lower, .. } | Self::Bound { lower, .. } => lower.len(),
        }
    }

    /// Number of columns addressed, i.e. the size of the variable block.
    pub fn cols(&self) -> usize {
        match self {
            Self::Equality { a, .. } | Self::Inequality { a, .. } => a.ncols(),
            Self::Bound { lower, .. } => lower.len(),
        }
    }

    pub const fn is_equality(&self) -> bool {
        matches!(self, Self::Equality { .. })
    }

    /// Whether the constraint counts as an inequality row block (inequality or bound).
    pub const fn is_inequality(&self) -> bool {
        !self.is_equality()
    }

    /// Check internal consistency of matrix and vector sizes.
    pub fn is_well_formed(&self) -> bool {
        match self {
            Self::Equality { a, b } => a.nrows() == b.len(),
            Self::Inequality { a, lower, upper } => {
                a.nrows() == lower.len() && lower.len() == upper.len()
            }
            Self::Bound { lower, upper } => lower.len() == upper.len(),
        }
    }

    /// Residual-style violation of the constraint at `x` (max-norm, zero if satisfied).
    pub fn violation(&self, x: &DVector<f64>) -> f64 {
        match self {
            Self::Equality { a, b } => (a * x - b).amax(),
            Self::Inequality { a, lower, upper } => {
                let ax = a * x;
                interval_violation(&ax, lower, upper)
            }
            Self::Bound { lower, upper } => interval_violation(x, lower, upper),
        }
    }
}

fn interval_violation(v: &DVector<f64>, lower: &DVector<f64>, upper: &DVector<f64>) -> f64 {
    v.iter()
        .zip(lower.iter().zip(upper.iter()))
        .map(|(&vi, (&lo, &hi))| (lo - vi).max(vi - hi).max(0.0))
        .fold(0.0, f64::max)
}
