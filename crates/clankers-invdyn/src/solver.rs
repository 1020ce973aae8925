//! Weighted-hierarchy QP solver on top of Clarabel.
//!
//! Level 0 becomes hard constraints; every soft level k of L is folded into a
//! single quadratic cost scaled by `priority_gain^(L - k)`:
//!
//! ```text
//! min  ½ xᵀ P x + qᵀ x
//! P  = Σ_k Σ_i g_k w_i Aᵢᵀ Aᵢ + ε I
//! q  = -Σ_k Σ_i g_k w_i Aᵢᵀ bᵢ
//! s.t. level-0 equalities (ZeroCone), level-0 inequalities as A x <= b (NonnegativeCone)
//! ```
//!
//! This approximates strict priorities; soft levels only accept equalities.

use clarabel::algebra::CscMatrix;
use clarabel::solver::{
    DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus as ClarabelStatus,
    SupportedConeT::{self, NonnegativeConeT, ZeroConeT},
};
use nalgebra::{DMatrix, DVector, RowDVector};
use tracing::{debug, trace, warn};

use crate::config::SolverConfig;
use crate::constraint::Constraint;
use crate::hqp::{HqpData, HqpOutput, HqpSolver, SolverStatus};

/// Interval rows narrower than this are treated as equalities.
const EQUALITY_WIDTH: f64 = 1e-12;

/// Hierarchy solver backed by Clarabel's interior-point method.
#[derive(Clone, Debug, Default)]
pub struct ClarabelHqpSolver {
    config: SolverConfig,
}

impl ClarabelHqpSolver {
    pub const fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> &SolverConfig {
        &self.config
    }
}

impl HqpSolver for ClarabelHqpSolver {
    fn solve(&mut self, problem: &HqpData) -> HqpOutput {
        let Some(n) = problem_width(problem) else {
            warn!("problem has no constraints or inconsistent column counts");
            return HqpOutput::failed(SolverStatus::Error);
        };

        let Some((p_mat, q_vec)) = self.build_cost(problem, n) else {
            return HqpOutput::failed(SolverStatus::Error);
        };
        let (a_all, b_all, n_eq, n_ineq) = build_hard_constraints(problem, n);

        let p_csc = dmatrix_to_csc_upper_tri(&p_mat);
        let a_csc = dmatrix_to_csc(&a_all);

        let mut cones: Vec<SupportedConeT<f64>> = Vec::with_capacity(2);
        if n_eq > 0 {
            cones.push(ZeroConeT(n_eq));
        }
        if n_ineq > 0 {
            cones.push(NonnegativeConeT(n_ineq));
        }

        let tol = self.config.tolerance;
        let settings = match DefaultSettingsBuilder::default()
            .max_iter(self.config.max_iter)
            .verbose(self.config.verbose)
            .tol_gap_abs(tol)
            .tol_gap_rel(tol)
            .tol_feas(tol)
            .build()
        {
            Ok(settings) => settings,
            Err(err) => {
                warn!(%err, "invalid solver settings");
                return HqpOutput::failed(SolverStatus::Error);
            }
        };

        let q_slice: Vec<f64> = q_vec.iter().copied().collect();
        let b_slice: Vec<f64> = b_all.iter().copied().collect();

        let mut solver = match DefaultSolver::new(&p_csc, &q_slice, &a_csc, &b_slice, &cones, settings) {
            Ok(solver) => solver,
            Err(err) => {
                warn!(?err, "failed to set up solver");
                return HqpOutput::failed(SolverStatus::Error);
            }
        };
        solver.solve();

        let sol = &solver.solution;
        let status = map_status(&sol.status);
        trace!(n, n_eq, n_ineq, iterations = sol.iterations, ?status, "solved");
        if !status.is_success() {
            debug!(raw = ?sol.status, "solver did not converge");
            return HqpOutput {
                status,
                x: DVector::zeros(0),
                iterations: sol.iterations,
            };
        }
        HqpOutput {
            status,
            x: DVector::from_column_slice(&sol.x),
            iterations: sol.iterations,
        }
    }
}

impl ClarabelHqpSolver {
    /// Fold the soft levels into `(P, q)`. `None` if a soft level holds an inequality.
    fn build_cost(&self, problem: &HqpData, n: usize) -> Option<(DMatrix<f64>, DVector<f64>)> {
        let mut p = DMatrix::identity(n, n) * self.config.regularization;
        let mut q = DVector::zeros(n);

        let lowest = problem.len().saturating_sub(1);
        for (k, level) in problem.iter().enumerate().skip(1) {
            let exponent = i32::try_from(lowest - k).unwrap_or(i32::MAX);
            let gain = self.config.priority_gain.powi(exponent);
            for wc in level {
                let Constraint::Equality { a, b } = &wc.constraint else {
                    warn!(name = %wc.name, level = k, "soft inequalities are not supported");
                    return None;
                };
                let scale = gain * wc.weight;
                if scale <= 0.0 {
                    continue;
                }
                p += a.tr_mul(a) * scale;
                q -= a.tr_mul(b) * scale;
            }
        }
        Some((p, q))
    }
}

/// Common column count of every constraint, if there is at least one.
fn problem_width(problem: &HqpData) -> Option<usize> {
    let mut width = None;
    for wc in problem.iter().flatten() {
        let cols = wc.constraint.cols();
        match width {
            None => width = Some(cols),
            Some(n) if n != cols => return None,
            Some(_) => {}
        }
    }
    width
}

/// Level-0 rows as `[A_eq; A_ineq] x (=, <=) [b_eq; b_ineq]`.
fn build_hard_constraints(problem: &HqpData, n: usize) -> (DMatrix<f64>, DVector<f64>, usize, usize) {
    let mut eq_rows: Vec<(RowDVector<f64>, f64)> = Vec::new();
    let mut ineq_rows: Vec<(RowDVector<f64>, f64)> = Vec::new();

    for wc in problem.first().into_iter().flatten() {
        match &wc.constraint {
            Constraint::Equality { a, b } => {
                for i in 0..a.nrows() {
                    eq_rows.push((a.row(i).into_owned(), b[i]));
                }
            }
            Constraint::Inequality { a, lower, upper } => {
                for i in 0..a.nrows() {
                    push_interval(&mut eq_rows, &mut ineq_rows, a.row(i).into_owned(), lower[i], upper[i]);
                }
            }
            Constraint::Bound { lower, upper } => {
                for i in 0..lower.len() {
                    let mut row = RowDVector::zeros(n);
                    row[i] = 1.0;
                    push_interval(&mut eq_rows, &mut ineq_rows, row, lower[i], upper[i]);
                }
            }
        }
    }

    let n_eq = eq_rows.len();
    let n_ineq = ineq_rows.len();
    let mut a_all = DMatrix::zeros(n_eq + n_ineq, n);
    let mut b_all = DVector::zeros(n_eq + n_ineq);
    for (i, (row, rhs)) in eq_rows.into_iter().chain(ineq_rows).enumerate() {
        a_all.set_row(i, &row);
        b_all[i] = rhs;
    }
    (a_all, b_all, n_eq, n_ineq)
}

// For Clarabel NonnegativeCone: A x + s = b with s >= 0 means A x <= b
fn push_interval(
    eq_rows: &mut Vec<(RowDVector<f64>, f64)>,
    ineq_rows: &mut Vec<(RowDVector<f64>, f64)>,
    row: RowDVector<f64>,
    lower: f64,
    upper: f64,
) {
    if lower.is_finite() && upper.is_finite() && (upper - lower).abs() <= EQUALITY_WIDTH {
        eq_rows.push((row, 0.5 * (lower + upper)));
        return;
    }
    if lower.is_finite() {
        ineq_rows.push((-&row, -lower));
    }
    if upper.is_finite() {
        ineq_rows.push((row, upper));
    }
}

fn map_status(status: &ClarabelStatus) -> SolverStatus {
    match status {
        ClarabelStatus::Solved | ClarabelStatus::AlmostSolved => SolverStatus::Optimal,
        ClarabelStatus::PrimalInfeasible
        | ClarabelStatus::DualInfeasible
        | ClarabelStatus::AlmostPrimalInfeasible
        | ClarabelStatus::AlmostDualInfeasible => SolverStatus::Infeasible,
        ClarabelStatus::MaxIterations | ClarabelStatus::MaxTime => SolverStatus::MaxIterReached,
        _ => SolverStatus::Error,
    }
}

/// Convert a nalgebra `DMatrix<f64>` to a Clarabel `CscMatrix<f64>` (full matrix).
fn dmatrix_to_csc(m: &DMatrix<f64>) -> CscMatrix<f64> {
    let (nrows, ncols) = m.shape();
    let mut colptr = vec![0usize; ncols + 1];
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();

    for j in 0..ncols {
        for i in 0..nrows {
            let v = m[(i, j)];
            if v.abs() > 1e-15 {
                rowval.push(i);
                nzval.push(v);
            }
        }
        colptr[j + 1] = rowval.len();
    }

    CscMatrix::new(nrows, ncols, colptr, rowval, nzval)
}

/// Convert a symmetric nalgebra `DMatrix<f64>` to upper-triangular `CscMatrix<f64>`.
fn dmatrix_to_csc_upper_tri(m: &DMatrix<f64>) -> CscMatrix<f64> {
    let (nrows, ncols) = m.shape();
    let mut colptr = vec![0usize; ncols + 1];
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();

    for j in 0..ncols {
        for i in 0..=j.min(nrows.saturating_sub(1)) {
            let v = m[(i, j)];
            if v.abs() > 1e-15 {
                rowval.push(i);
                nzval.push(v);
            }
        }
        colptr[j + 1] = rowval.len();
    }

    CscMatrix::new(nrows, ncols, colptr, rowval, nzval)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hqp::WeightedConstraint;
    use approx::assert_relative_eq;

    fn eq(name: &str, weight: f64, a: &[f64], rows: usize, b: &[f64]) -> WeightedConstraint {
        WeightedConstraint {
            name: name.into(),
            weight,
            constraint: Constraint::Equality {
                a: DMatrix::from_row_slice(rows, a.len() / rows, a),
                b: DVector::from_row_slice(b),
            },
        }
    }

    fn solver() -> ClarabelHqpSolver {
        ClarabelHqpSolver::default()
    }

    #[test]
    fn inactive_limit_keeps_soft_target() {
        let limit = WeightedConstraint {
            name: "limit".into(),
            weight: 1.0,
            constraint: Constraint::Bound {
                lower: DVector::from_vec(vec![-10.0, f64::NEG_INFINITY]),
                upper: DVector::from_vec(vec![10.0, f64::INFINITY]),
            },
        };
        let problem = vec![vec![limit], vec![eq("target", 1.0, &[1.0, 0.0, 0.0, 1.0], 2, &[1.0, 2.0])]];
        let out = solver().solve(&problem);
        assert_eq!(out.status, SolverStatus::Optimal);
        assert_relative_eq!(out.x[0], 1.0, epsilon = 1e-5);
        assert_relative_eq!(out.x[1], 2.0, epsilon = 1e-5);
    }

    #[test]
    fn hard_equality_projects_soft_target() {
        let problem = vec![
            vec![eq("sum", 1.0, &[1.0, 1.0], 1, &[1.0])],
            vec![eq("target", 1.0, &[1.0, 0.0, 0.0, 1.0], 2, &[1.0, 1.0])],
        ];
        let out = solver().solve(&problem);
        assert!(out.status.is_success());
        assert_relative_eq!(out.x[0], 0.5, epsilon = 1e-5);
        assert_relative_eq!(out.x[1], 0.5, epsilon = 1e-5);
    }

    #[test]
    fn hard_inequality_clips_soft_target() {
        let problem = vec![
            vec![WeightedConstraint {
                name: "limit".into(),
                weight: 1.0,
                constraint: Constraint::Inequality {
                    a: DMatrix::from_row_slice(1, 1, &[1.0]),
                    lower: DVector::from_element(1, f64::NEG_INFINITY),
                    upper: DVector::from_element(1, 0.2),
                },
            }],
            vec![eq("target", 1.0, &[1.0], 1, &[1.0])],
        ];
        let out = solver().solve(&problem);
        assert!(out.status.is_success());
        assert_relative_eq!(out.x[0], 0.2, epsilon = 1e-5);
    }

    #[test]
    fn higher_level_dominates() {
        let problem = vec![
            vec![],
            vec![eq("important", 1.0, &[1.0], 1, &[1.0])],
            vec![eq("minor", 1.0, &[1.0], 1, &[0.0])],
        ];
        let out = solver().solve(&problem);
        assert!(out.status.is_success());
        assert_relative_eq!(out.x[0], 1.0, epsilon = 1e-2);
    }

    #[test]
    fn zero_width_interval_is_equality() {
        let problem = vec![vec![WeightedConstraint {
            name: "pin".into(),
            weight: 1.0,
            constraint: Constraint::Inequality {
                a: DMatrix::identity(2, 2),
                lower: DVector::from_vec(vec![0.3, -0.1]),
                upper: DVector::from_vec(vec![0.3, -0.1]),
            },
        }]];
        let (_, _, n_eq, n_ineq) = build_hard_constraints(&problem, 2);
        assert_eq!((n_eq, n_ineq), (2, 0));
        let out = solver().solve(&problem);
        assert!(out.status.is_success());
        assert_relative_eq!(out.x[0], 0.3, epsilon = 1e-5);
        assert_relative_eq!(out.x[1], -0.1, epsilon = 1e-5);
    }

    #[test]
    fn contradictory_hard_constraints_fail() {
        let problem = vec![vec![
            eq("a", 1.0, &[1.0], 1, &[1.0]),
            eq("b", 1.0, &[1.0], 1, &[2.0]),
        ]];
        let out = solver().solve(&problem);
        assert!(!out.status.is_success());
        assert_eq!(out.x.len(), 0);
    }

    #[test]
    fn soft_inequality_rejected() {
        let problem = vec![
            vec![],
            vec![WeightedConstraint {
                name: "soft".into(),
                weight: 1.0,
                constraint: Constraint::inequality_unbounded(1, 1),
            }],
        ];
        assert_eq!(solver().solve(&problem).status, SolverStatus::Error);
    }

    #[test]
    fn empty_or_ragged_problem_rejected() {
        assert_eq!(solver().solve(&Vec::new()).status, SolverStatus::Error);
        let ragged = vec![vec![
            eq("a", 1.0, &[1.0], 1, &[1.0]),
            eq("b", 1.0, &[1.0, 1.0], 1, &[1.0]),
        ]];
        assert_eq!(solver().solve(&ragged).status, SolverStatus::Error);
    }

    #[test]
    fn upper_tri_conversion_keeps_diagonal() {
        let m = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 3.0]);
        let csc = dmatrix_to_csc_upper_tri(&m);
        assert_eq!(csc.nzval, vec![2.0, 1.0, 3.0]);
        assert_eq!(csc.colptr, vec![0, 1, 3]);
    }
}
