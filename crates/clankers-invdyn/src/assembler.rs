//! Per-cycle assembly of the hierarchical QP.
//!
//! Level 0 always starts with the unactuated dynamics rows and the slack
//! bound, followed by the hierarchy entries in insertion order. Every emitted
//! constraint spans the full decision vector.

use std::collections::HashMap;

use nalgebra::{DMatrix, DVector};
use tracing::{debug, trace};

use crate::constraint::Constraint;
use crate::error::FormulationError;
use crate::formulation::{CycleTerms, InverseDynamicsFormulation};
use crate::hierarchy::EntryRole;
use crate::hqp::{HqpData, WeightedConstraint, hard_row_counts};
use crate::layout::ContactBlock;
use crate::task::Objective;
use crate::transition::TransitionKind;
use crate::types::StateProvider;

/// Rows one contact contributes, taken as the hierarchy is walked.
#[derive(Default)]
struct ContactRows {
    motion: Option<WeightedConstraint>,
    bounds: Option<WeightedConstraint>,
    regularization: Option<WeightedConstraint>,
}

/// Decision-vector block a task constrains.
enum TaskColumns {
    Motion,
    Force(ContactBlock),
    Actuation,
}

impl<P: StateProvider> InverseDynamicsFormulation<P> {
    /// Assemble the hierarchical QP at `(time, q, v)`.
    ///
    /// Evaluates the state provider, advances transitions (evicting completed
    /// removals), recomputes every task and contact constraint and maps them
    /// onto `x = [dv | f | s]`. Invalidates the previous decode.
    pub fn compute_problem_data(
        &mut self,
        time: f64,
        q: &DVector<f64>,
        v: &DVector<f64>,
    ) -> Result<&HqpData, FormulationError> {
        // Nothing from a previous cycle may be decoded once this one starts.
        self.cycle = None;
        self.solution_decoded = false;
        self.dims.validate()?;
        if q.len() != self.dims.nq {
            return Err(FormulationError::dimension("configuration", self.dims.nq, q.len()));
        }
        if v.len() != self.dims.nv {
            return Err(FormulationError::dimension("velocity", self.dims.nv, v.len()));
        }
        let snapshot = self.provider.evaluate(q, v)?;
        let unactuated = snapshot.validate(&self.dims)?;

        self.time = time;
        let completed = self.transitions.advance(time, &mut self.registry);
        for window in completed.iter().filter(|w| w.kind == TransitionKind::Removal) {
            self.evict(&window.entity)?;
        }

        let nv = self.dims.nv;
        let n_var = self.layout.n_var;
        let n_force = self.layout.n_force;

        // Contacts: stacked Jacobian and per-contact rows.
        let mut jc = DMatrix::zeros(n_force, nv);
        let mut contact_rows: HashMap<String, ContactRows> = HashMap::new();
        for (name, entry) in self.registry.contacts() {
            let block = self
                .layout
                .contact_block(name)
                .ok_or_else(|| FormulationError::UnknownName(name.to_string()))?;
            let kin = snapshot.frame(entry.contact.frame())?;
            let motion = entry.contact.motion_constraint(kin, nv)?;
            jc.view_mut((block.offset - nv, 0), (block.size, nv))
                .copy_from(&kin.jacobian);

            contact_rows.insert(
                name.to_string(),
                ContactRows {
                    motion: Some(weighted(
                        format!("{name}_motion"),
                        entry.motion_weight,
                        widen(&motion, n_var, 0),
                    )),
                    bounds: Some(weighted(
                        format!("{name}_force_bounds"),
                        1.0,
                        widen(&entry.contact.force_constraint(), n_var, block.offset),
                    )),
                    regularization: Some(weighted(
                        format!("{name}_force_regularization"),
                        entry.force_regularization_weight,
                        widen(&entry.contact.regularization_constraint(), n_var, block.offset),
                    )),
                },
            );
        }

        let mut tau_ext = DVector::zeros(nv);
        for (_, force) in self.registry.measured_forces() {
            tau_ext += force.joint_torques(&snapshot, nv)?;
        }

        let selection = &snapshot.actuation_selection;
        let mut terms = CycleTerms {
            layout: self.layout.clone(),
            m_a: selection * &snapshot.mass_matrix,
            h_a: selection * (&snapshot.bias_forces - &tau_ext),
            j_a_t: selection * jc.transpose(),
        };

        // Tasks. Shape changes are committed only once every task succeeded,
        // so a failed cycle leaves the registry in step with the layout.
        let mut reshaped = Vec::new();
        let mut task_rows: HashMap<String, WeightedConstraint> = HashMap::new();
        for (name, entry) in self.registry.tasks_mut() {
            let columns = match &entry.objective {
                Objective::Motion(_) => TaskColumns::Motion,
                Objective::ContactForce { contact, .. } => TaskColumns::Force(
                    self.layout
                        .contact_block(contact)
                        .cloned()
                        .ok_or_else(|| FormulationError::UnknownName(contact.clone()))?,
                ),
                Objective::Actuation(_) => TaskColumns::Actuation,
            };
            let weight = entry.weight * self.transitions.weight_scale(name, time);

            let constraint = entry.objective.task_mut().compute(time, q, v, &snapshot);
            if !constraint.is_well_formed() {
                let (expected, got) = row_mismatch(constraint);
                return Err(FormulationError::dimension(
                    format!("task {name} rows"),
                    expected,
                    got,
                ));
            }
            if constraint.rows() != entry.rows || constraint.kind() != entry.kind {
                reshaped.push((name.to_string(), constraint.rows(), constraint.kind()));
            }

            let widened = match columns {
                TaskColumns::Motion => {
                    check_cols(name, nv, constraint)?;
                    widen(constraint, n_var, 0)
                }
                TaskColumns::Force(block) => {
                    check_cols(name, block.size, constraint)?;
                    widen(constraint, n_var, block.offset)
                }
                TaskColumns::Actuation => {
                    check_cols(name, self.dims.na, constraint)?;
                    terms.actuation_constraint(constraint)
                }
            };
            task_rows.insert(name.to_string(), weighted(name.to_string(), weight, widened));
        }
        if !reshaped.is_empty() {
            for (name, rows, kind) in reshaped {
                debug!(entity = %name, rows, ?kind, "task shape changed");
                let entry = self.registry.task_mut(&name)?;
                entry.rows = rows;
                entry.kind = kind;
            }
            self.refresh_layout();
            terms.layout = self.layout.clone();
        }

        // Walk the hierarchy.
        let mut level_zero = base_rows(
            &terms,
            &snapshot.mass_matrix,
            &snapshot.bias_forces,
            &tau_ext,
            &jc,
            &unactuated,
            self.config.base_slack_tolerance,
        );
        let mut hqp: HqpData = Vec::with_capacity(self.hierarchy.level_count());
        for (k, entries) in self.hierarchy.levels().iter().enumerate() {
            let mut level = if k == 0 {
                std::mem::take(&mut level_zero)
            } else {
                Vec::with_capacity(entries.len())
            };
            for entry in entries {
                let rows = match entry.role {
                    EntryRole::Task => task_rows.remove(&entry.name),
                    EntryRole::ContactMotion => contact_rows
                        .get_mut(&entry.name)
                        .and_then(|rows| rows.motion.take()),
                    EntryRole::ContactForceBounds => contact_rows
                        .get_mut(&entry.name)
                        .and_then(|rows| rows.bounds.take()),
                    EntryRole::ContactForceRegularization => contact_rows
                        .get_mut(&entry.name)
                        .and_then(|rows| rows.regularization.take()),
                };
                level.push(rows.ok_or_else(|| FormulationError::UnknownName(entry.name.clone()))?);
            }
            hqp.push(level);
        }

        debug_assert_eq!(
            hard_row_counts(&hqp),
            (self.layout.n_eq, self.layout.n_in),
            "level 0 rows must match the layout"
        );
        trace!(
            time,
            n_var = self.layout.n_var,
            n_eq = self.layout.n_eq,
            n_in = self.layout.n_in,
            levels = hqp.len(),
            "assembled problem"
        );

        self.hqp = hqp;
        self.cycle = Some(terms);
        Ok(&self.hqp)
    }
}

impl CycleTerms {
    /// Map a constraint on actuator torques onto the decision vector through
    /// `τ = S M dv + S (h - τ_ext) - S Jcᵀ f`.
    fn actuation_constraint(&self, constraint: &Constraint) -> Constraint {
        match constraint {
            Constraint::Equality { a, b } => Constraint::Equality {
                a: self.torque_rows(a),
                b: b - a * &self.h_a,
            },
            Constraint::Inequality { a, lower, upper } => {
                let shift = a * &self.h_a;
                Constraint::Inequality {
                    a: self.torque_rows(a),
                    lower: lower - &shift,
                    upper: upper - &shift,
                }
            }
            Constraint::Bound { lower, upper } => {
                let na = lower.len();
                Constraint::Inequality {
                    a: self.torque_rows(&DMatrix::identity(na, na)),
                    lower: lower - &self.h_a,
                    upper: upper - &self.h_a,
                }
            }
        }
    }

    // [A S M, -A S Jcᵀ, 0]
    fn torque_rows(&self, a: &DMatrix<f64>) -> DMatrix<f64> {
        let layout = &self.layout;
        let rows = a.nrows();
        let mut full = DMatrix::zeros(rows, layout.n_var);
        full.view_mut((0, 0), (rows, layout.nv))
            .copy_from(&(a * &self.m_a));
        full.view_mut((0, layout.force_offset()), (rows, layout.n_force))
            .copy_from(&(-(a * &self.j_a_t)));
        full
    }
}

/// Unactuated dynamics `U (M dv + h - Jcᵀ f - τ_ext) - s = 0` and `|s| <= tol`.
fn base_rows(
    terms: &CycleTerms,
    mass_matrix: &DMatrix<f64>,
    bias_forces: &DVector<f64>,
    tau_ext: &DVector<f64>,
    jc: &DMatrix<f64>,
    unactuated: &[usize],
    tolerance: f64,
) -> Vec<WeightedConstraint> {
    let layout = &terms.layout;
    let nu = unactuated.len();
    if nu == 0 {
        return Vec::new();
    }
    let slack = layout.slack_offset();

    let mut a = DMatrix::zeros(nu, layout.n_var);
    let mut b = DVector::zeros(nu);
    for (row, &j) in unactuated.iter().enumerate() {
        a.view_mut((row, 0), (1, layout.nv))
            .copy_from(&mass_matrix.row(j));
        for c in 0..layout.n_force {
            a[(row, layout.force_offset() + c)] = -jc[(c, j)];
        }
        a[(row, slack + row)] = -1.0;
        b[row] = tau_ext[j] - bias_forces[j];
    }

    let mut slack_rows = DMatrix::zeros(nu, layout.n_var);
    slack_rows
        .view_mut((0, slack), (nu, nu))
        .fill_with_identity();

    vec![
        weighted("base_dynamics".to_string(), 1.0, Constraint::Equality { a, b }),
        weighted(
            "base_slack".to_string(),
            1.0,
            Constraint::Inequality {
                a: slack_rows,
                lower: DVector::from_element(nu, -tolerance),
                upper: DVector::from_element(nu, tolerance),
            },
        ),
    ]
}

/// Place a block constraint at `offset` in an `n_var`-wide one. Bounds become
/// identity inequalities.
fn widen(constraint: &Constraint, n_var: usize, offset: usize) -> Constraint {
    let place = |a: &DMatrix<f64>| {
        let mut full = DMatrix::zeros(a.nrows(), n_var);
        full.view_mut((0, offset), a.shape()).copy_from(a);
        full
    };
    match constraint {
        Constraint::Equality { a, b } => Constraint::Equality {
            a: place(a),
            b: b.clone(),
        },
        Constraint::Inequality { a, lower, upper } => Constraint::Inequality {
            a: place(a),
            lower: lower.clone(),
            upper: upper.clone(),
        },
        Constraint::Bound { lower, upper } => {
            let n = lower.len();
            Constraint::Inequality {
                a: place(&DMatrix::identity(n, n)),
                lower: lower.clone(),
                upper: upper.clone(),
            }
        }
    }
}

fn weighted(name: String, weight: f64, constraint: Constraint) -> WeightedConstraint {
    WeightedConstraint {
        name,
        weight,
        constraint,
    }
}

fn check_cols(name: &str, expected: usize, constraint: &Constraint) -> Result<(), FormulationError> {
    if constraint.cols() == expected {
        Ok(())
    } else {
        Err(FormulationError::dimension(
            format!("task {name} columns"),
            expected,
            constraint.cols(),
        ))
    }
}

// (expected, got) for a malformed constraint.
fn row_mismatch(constraint: &Constraint) -> (usize, usize) {
    match constraint {
        Constraint::Equality { a, b } => (b.len(), a.nrows()),
        Constraint::Inequality { a, lower, upper } => {
            if a.nrows() == lower.len() {
                (lower.len(), upper.len())
            } else {
                (lower.len(), a.nrows())
            }
        }
        Constraint::Bound { lower, upper } => (lower.len(), upper.len()),
    }
}
