//! Task capability trait and the objective tagged union.

use nalgebra::DVector;

use crate::constraint::{Constraint, ConstraintKind};
use crate::types::StateSnapshot;

/// A task: something that, given the current state, produces a linear
/// constraint on one block of the decision vector.
///
/// Implementations hold the tracking logic (reference trajectories, gains,
/// limits). The formulation only consumes the resulting constraint.
pub trait Task {
    /// Number of constraint rows for the coming cycle.
    fn dim(&self) -> usize;

    /// Equality, inequality or bound.
    fn kind(&self) -> ConstraintKind;

    /// Compute the task constraint at `(time, q, v)`.
    fn compute(
        &mut self,
        time: f64,
        q: &DVector<f64>,
        v: &DVector<f64>,
        snapshot: &StateSnapshot,
    ) -> &Constraint;
}

/// A registered objective, tagged by the decision-vector block it constrains.
pub enum Objective {
    /// Constrains generalized accelerations (`nv` columns).
    Motion(Box<dyn Task>),
    /// Constrains the force block of the named contact (`n_force` columns).
    ContactForce {
        task: Box<dyn Task>,
        contact: String,
    },
    /// Constrains actuator torques (`na` columns), mapped through inverse dynamics.
    Actuation(Box<dyn Task>),
}

impl Objective {
    pub fn task(&self) -> &dyn Task {
        match self {
            Self::Motion(task) | Self::ContactForce { task, .. } | Self::Actuation(task) => {
                task.as_ref()
            }
        }
    }

    pub fn task_mut(&mut self) -> &mut dyn Task {
        match self {
            Self::Motion(task) | Self::ContactForce { task, .. } | Self::Actuation(task) => {
                task.as_mut()
            }
        }
    }

    /// Name of the contact a force objective is attached to.
    pub fn associated_contact(&self) -> Option<&str> {
        match self {
            Self::ContactForce { contact, .. } => Some(contact),
            Self::Motion(_) | Self::Actuation(_) => None,
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            Self::Motion(_) => "motion",
            Self::ContactForce { .. } => "force",
            Self::Actuation(_) => "actuation",
        }
    }
}

impl std::fmt::Debug for Objective {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let task = self.task();
        let mut s = f.debug_struct("Objective");
        s.field("variant", &self.label())
            .field("dim", &task.dim())
            .field("kind", &task.kind());
        if let Some(contact) = self.associated_contact() {
            s.field("contact", &contact);
        }
        s.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DMatrix;

    struct Fixed(Constraint);

    impl Task for Fixed {
        fn dim(&self) -> usize {
            self.0.rows()
        }
        fn kind(&self) -> ConstraintKind {
            self.0.kind()
        }
        fn compute(
            &mut self,
            _time: f64,
            _q: &DVector<f64>,
            _v: &DVector<f64>,
            _snapshot: &StateSnapshot,
        ) -> &Constraint {
            &self.0
        }
    }

    #[test]
    fn force_objective_reports_contact() {
        let obj = Objective::ContactForce {
            task: Box::new(Fixed(Constraint::equality_zeros(3, 3))),
            contact: "left_foot".into(),
        };
        assert_eq!(obj.associated_contact(), Some("left_foot"));
        assert_eq!(obj.label(), "force");
        assert_eq!(obj.task().dim(), 3);
    }

    #[test]
    fn motion_objective_has_no_contact() {
        let obj = Objective::Motion(Box::new(Fixed(Constraint::Bound {
            lower: DVector::zeros(2),
            upper: DVector::zeros(2),
        })));
        assert!(obj.associated_contact().is_none());
        assert_eq!(obj.task().kind(), ConstraintKind::Bound);
    }

    #[test]
    fn debug_output_mentions_variant() {
        let obj = Objective::Actuation(Box::new(Fixed(Constraint::Equality {
            a: DMatrix::identity(2, 2),
            b: DVector::zeros(2),
        })));
        let text = format!("{obj:?}");
        assert!(text.contains("actuation"));
    }
}
