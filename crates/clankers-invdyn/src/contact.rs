//! Rigid contacts: force variables, friction pyramid and contact motion rows.
//!
//! Force variables are expressed in the same frame as the contact Jacobian
//! rows, so the generalized force produced by a contact is simply `Jᵀ f`.
//!
//! # Force constraint rows
//!
//! With normal `n`, tangents `t1`, `t2` and friction coefficient `mu`:
//! - Friction pyramid: `±t1·f - mu n·f <= 0`, `±t2·f - mu n·f <= 0`
//! - Normal force: `f_min <= n·f <= f_max`
//! - Planar contacts additionally bound the center of pressure:
//!   `±t1·τ - half_width n·f <= 0`, `±t2·τ - half_length n·f <= 0`

use nalgebra::{DMatrix, DVector, Unit, Vector3};

use crate::constraint::Constraint;
use crate::error::FormulationError;
use crate::types::FrameKinematics;

/// Geometry of a contact.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ContactModel {
    /// Point contact: 3D force, 3D motion constraint.
    Point,
    /// Rectangular surface contact: 6D wrench `[f, τ]`, 6D motion constraint.
    Planar {
        /// Half extent along the first tangent.
        half_length: f64,
        /// Half extent along the second tangent.
        half_width: f64,
    },
}

impl ContactModel {
    /// Number of force variables.
    pub const fn n_force(&self) -> usize {
        match self {
            Self::Point => 3,
            Self::Planar { .. } => 6,
        }
    }

    /// Number of motion constraint rows (Jacobian rows).
    pub const fn n_motion(&self) -> usize {
        self.n_force()
    }

    /// Number of inequality rows in the force constraint.
    pub const fn n_force_rows(&self) -> usize {
        match self {
            Self::Point => 5,
            Self::Planar { .. } => 9,
        }
    }
}

/// A rigid contact between the mechanism and its environment.
#[derive(Clone, Debug, PartialEq)]
pub struct RigidContact {
    name: String,
    frame: String,
    model: ContactModel,
    friction_coefficient: f64,
    normal: Unit<Vector3<f64>>,
    min_normal_force: f64,
    max_normal_force: f64,
    /// Max normal force used by the assembler, lowered during transitions.
    current_max_normal_force: f64,
    reference_force: DVector<f64>,
    desired_acceleration: DVector<f64>,
}

impl RigidContact {
    /// Create a contact named `name` on the frame of the same name.
    ///
    /// Defaults: friction 0.5, normal +z, normal force in `[0, 1000]` N,
    /// zero reference force and zero desired acceleration.
    pub fn new(name: impl Into<String>, model: ContactModel) -> Self {
        let name = name.into();
        Self {
            frame: name.clone(),
            name,
            model,
            friction_coefficient: 0.5,
            normal: Vector3::z_axis(),
            min_normal_force: 0.0,
            max_normal_force: 1000.0,
            current_max_normal_force: 1000.0,
            reference_force: DVector::zeros(model.n_force()),
            desired_acceleration: DVector::zeros(model.n_motion()),
        }
    }

    /// Point contact shortcut.
    pub fn point(name: impl Into<String>) -> Self {
        Self::new(name, ContactModel::Point)
    }

    #[must_use]
    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.frame = frame.into();
        self
    }

    #[must_use]
    pub const fn with_friction(mut self, mu: f64) -> Self {
        self.friction_coefficient = mu;
        self
    }

    #[must_use]
    pub const fn with_normal(mut self, normal: Unit<Vector3<f64>>) -> Self {
        self.normal = normal;
        self
    }

    /// Set the normal force bounds. Validated when the contact is registered.
    #[must_use]
    pub const fn with_force_bounds(mut self, min: f64, max: f64) -> Self {
        self.min_normal_force = min;
        self.max_normal_force = max;
        self.current_max_normal_force = max;
        self
    }

    /// Reference force for the regularization cost. Length must be `n_force`.
    #[must_use]
    pub fn with_reference_force(mut self, force: DVector<f64>) -> Self {
        self.reference_force = force;
        self
    }

    /// Desired contact-frame acceleration. Length must be `n_motion`.
    #[must_use]
    pub fn with_desired_acceleration(mut self, acc: DVector<f64>) -> Self {
        self.desired_acceleration = acc;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn frame(&self) -> &str {
        &self.frame
    }

    pub const fn model(&self) -> ContactModel {
        self.model
    }

    pub const fn n_force(&self) -> usize {
        self.model.n_force()
    }

    pub const fn n_motion(&self) -> usize {
        self.model.n_motion()
    }

    pub const fn n_force_rows(&self) -> usize {
        self.model.n_force_rows()
    }

    pub const fn friction_coefficient(&self) -> f64 {
        self.friction_coefficient
    }

    pub const fn normal(&self) -> &Unit<Vector3<f64>> {
        &self.normal
    }

    pub const fn min_normal_force(&self) -> f64 {
        self.min_normal_force
    }

    /// Steady-state max normal force.
    pub const fn max_normal_force(&self) -> f64 {
        self.max_normal_force
    }

    /// Max normal force in effect this cycle.
    pub const fn current_max_normal_force(&self) -> f64 {
        self.current_max_normal_force
    }

    /// Min normal force in effect this cycle, never above the current maximum.
    pub fn current_min_normal_force(&self) -> f64 {
        self.min_normal_force.min(self.current_max_normal_force)
    }

    pub fn reference_force(&self) -> &DVector<f64> {
        &self.reference_force
    }

    pub fn desired_acceleration(&self) -> &DVector<f64> {
        &self.desired_acceleration
    }

    pub(crate) fn set_force_bounds(&mut self, min: f64, max: f64) {
        self.min_normal_force = min;
        self.max_normal_force = max;
        self.current_max_normal_force = max;
    }

    pub(crate) fn set_current_max_normal_force(&mut self, f_max: f64) {
        self.current_max_normal_force = f_max;
    }

    pub(crate) fn restore_steady_bounds(&mut self) {
        self.current_max_normal_force = self.max_normal_force;
    }

    /// Check parameters for registration.
    pub fn validate(&self) -> Result<(), FormulationError> {
        let (min, max) = (self.min_normal_force, self.max_normal_force);
        if !(min.is_finite() && max.is_finite() && 0.0 <= min && min <= max) {
            return Err(FormulationError::InvalidForceBounds {
                name: self.name.clone(),
                min,
                max,
            });
        }
        let mu = self.friction_coefficient;
        if !(mu.is_finite() && mu >= 0.0) {
            return Err(FormulationError::InvalidFriction {
                name: self.name.clone(),
                mu,
            });
        }
        if self.reference_force.len() != self.n_force() {
            return Err(FormulationError::dimension(
                format!("contact {} reference force", self.name),
                self.n_force(),
                self.reference_force.len(),
            ));
        }
        if self.desired_acceleration.len() != self.n_motion() {
            return Err(FormulationError::dimension(
                format!("contact {} desired acceleration", self.name),
                self.n_motion(),
                self.desired_acceleration.len(),
            ));
        }
        Ok(())
    }

    /// Normal component of a contact force block.
    pub fn normal_force(&self, f: &DVector<f64>) -> f64 {
        self.normal.dot(&f.fixed_rows::<3>(0))
    }

    /// Contact motion constraint `J dv = a_des - J̇ v` over accelerations.
    ///
    /// Fails if the frame Jacobian does not match the contact dimension or `nv`.
    pub fn motion_constraint(
        &self,
        frame: &FrameKinematics,
        nv: usize,
    ) -> Result<Constraint, FormulationError> {
        let (rows, cols) = frame.jacobian.shape();
        if rows != self.n_motion() {
            return Err(FormulationError::dimension(
                format!("contact {} jacobian rows", self.name),
                self.n_motion(),
                rows,
            ));
        }
        if cols != nv {
            return Err(FormulationError::dimension(
                format!("contact {} jacobian cols", self.name),
                nv,
                cols,
            ));
        }
        if frame.drift.len() != rows {
            return Err(FormulationError::dimension(
                format!("contact {} drift", self.name),
                rows,
                frame.drift.len(),
            ));
        }
        Ok(Constraint::Equality {
            a: frame.jacobian.clone(),
            b: &self.desired_acceleration - &frame.drift,
        })
    }

    /// Force constraint over this contact's force block, using the current bounds.
    pub fn force_constraint(&self) -> Constraint {
        let n = self.n_force();
        let rows = self.n_force_rows();
        let mut a = DMatrix::zeros(rows, n);
        let mut lower = DVector::from_element(rows, f64::NEG_INFINITY);
        let mut upper = DVector::zeros(rows);

        let normal = self.normal.into_inner();
        let (t1, t2) = tangent_basis(&self.normal);
        let mu = self.friction_coefficient;

        // Friction pyramid
        for (row, (sign, tangent)) in [(1.0, t1), (-1.0, t1), (1.0, t2), (-1.0, t2)]
            .into_iter()
            .enumerate()
        {
            let coeffs = tangent * sign - normal * mu;
            set_row3(&mut a, row, 0, &coeffs);
        }

        // Normal force bounds
        set_row3(&mut a, 4, 0, &normal);
        lower[4] = self.current_min_normal_force();
        upper[4] = self.current_max_normal_force;

        if let ContactModel::Planar {
            half_length,
            half_width,
        } = self.model
        {
            // Torque about t1 is limited by the extent along t2 and vice versa.
            let cop_rows = [
                (1.0, t1, half_width),
                (-1.0, t1, half_width),
                (1.0, t2, half_length),
                (-1.0, t2, half_length),
            ];
            for (i, (sign, axis, extent)) in cop_rows.into_iter().enumerate() {
                let row = 5 + i;
                set_row3(&mut a, row, 3, &(axis * sign));
                set_row3(&mut a, row, 0, &(-normal * extent));
            }
        }

        Constraint::Inequality { a, lower, upper }
    }

    /// Force regularization cost `f = f_ref` over this contact's force block.
    pub fn regularization_constraint(&self) -> Constraint {
        let n = self.n_force();
        Constraint::Equality {
            a: DMatrix::identity(n, n),
            b: self.reference_force.clone(),
        }
    }
}

/// Orthonormal tangents `(t1, t2)` with `t1 × t2 = n`.
pub fn tangent_basis(normal: &Unit<Vector3<f64>>) -> (Vector3<f64>, Vector3<f64>) {
    let n = normal.as_ref();
    let helper = if n.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    let t1 = (helper - n * n.dot(&helper)).normalize();
    let t2 = n.cross(&t1);
    (t1, t2)
}

fn set_row3(a: &mut DMatrix<f64>, row: usize, col: usize, v: &Vector3<f64>) {
    a[(row, col)] = v.x;
    a[(row, col + 1)] = v.y;
    a[(row, col + 2)] = v.z;
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn tangent_basis_for_z_normal() {
        let (t1, t2) = tangent_basis(&Vector3::z_axis());
        assert_relative_eq!(t1, Vector3::x(), epsilon = 1e-12);
        assert_relative_eq!(t2, Vector3::y(), epsilon = 1e-12);
    }

    #[test]
    fn tangent_basis_is_orthonormal_for_tilted_normal() {
        let n = Unit::new_normalize(Vector3::new(0.95, 0.1, 0.3));
        let (t1, t2) = tangent_basis(&n);
        assert_relative_eq!(t1.norm(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(t2.norm(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(t1.dot(&n), 0.0, epsilon = 1e-12);
        assert_relative_eq!(t1.cross(&t2), n.into_inner(), epsilon = 1e-12);
    }

    #[test]
    fn point_contact_dimensions() {
        let c = RigidContact::point("lf");
        assert_eq!(c.n_force(), 3);
        assert_eq!(c.n_motion(), 3);
        assert_eq!(c.force_constraint().rows(), 5);
        assert_eq!(c.force_constraint().cols(), 3);
        assert_eq!(c.frame(), "lf");
    }

    #[test]
    fn vertical_force_inside_pyramid() {
        let c = RigidContact::point("lf").with_force_bounds(1.0, 100.0);
        let f = DVector::from_vec(vec![0.0, 0.0, 50.0]);
        assert_relative_eq!(c.force_constraint().violation(&f), 0.0);
    }

    #[test]
    fn slipping_force_violates_pyramid() {
        let c = RigidContact::point("lf").with_friction(0.6);
        let f = DVector::from_vec(vec![40.0, 0.0, 50.0]);
        // fx - mu fz = 40 - 30 = 10
        assert_relative_eq!(c.force_constraint().violation(&f), 10.0, epsilon = 1e-9);
    }

    #[test]
    fn normal_bound_uses_current_max() {
        let mut c = RigidContact::point("lf").with_force_bounds(0.0, 100.0);
        c.set_current_max_normal_force(20.0);
        let f = DVector::from_vec(vec![0.0, 0.0, 50.0]);
        assert_relative_eq!(c.force_constraint().violation(&f), 30.0, epsilon = 1e-9);
    }

    #[test]
    fn current_min_never_exceeds_current_max() {
        let mut c = RigidContact::point("lf").with_force_bounds(10.0, 100.0);
        c.set_current_max_normal_force(4.0);
        assert_relative_eq!(c.current_min_normal_force(), 4.0);
        c.restore_steady_bounds();
        assert_relative_eq!(c.current_min_normal_force(), 10.0);
    }

    #[test]
    fn planar_contact_cop_rows() {
        let c = RigidContact::new(
            "sole",
            ContactModel::Planar {
                half_length: 0.1,
                half_width: 0.05,
            },
        );
        let constraint = c.force_constraint();
        assert_eq!(constraint.rows(), 9);
        assert_eq!(constraint.cols(), 6);

        // 100 N normal, torque about x of 4 Nm: CoP offset 0.04 <= 0.05, feasible.
        let ok = DVector::from_vec(vec![0.0, 0.0, 100.0, 4.0, 0.0, 0.0]);
        assert_relative_eq!(constraint.violation(&ok), 0.0);

        // Torque about x of 6 Nm exceeds half_width * fz = 5.
        let tipping = DVector::from_vec(vec![0.0, 0.0, 100.0, 6.0, 0.0, 0.0]);
        assert_relative_eq!(constraint.violation(&tipping), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn motion_constraint_subtracts_drift() {
        let c = RigidContact::point("lf")
            .with_desired_acceleration(DVector::from_vec(vec![0.0, 0.0, 1.0]));
        let frame = FrameKinematics {
            jacobian: DMatrix::identity(3, 4),
            drift: DVector::from_vec(vec![0.1, 0.2, 0.3]),
        };
        let Constraint::Equality { a, b } = c.motion_constraint(&frame, 4).unwrap() else {
            panic!("motion constraint must be an equality");
        };
        assert_eq!(a.shape(), (3, 4));
        assert_relative_eq!(b, DVector::from_vec(vec![-0.1, -0.2, 0.7]), epsilon = 1e-12);
    }

    #[test]
    fn motion_constraint_rejects_wrong_jacobian() {
        let c = RigidContact::point("lf");
        let frame = FrameKinematics::new(DMatrix::zeros(6, 4));
        let err = c.motion_constraint(&frame, 4).unwrap_err();
        assert!(matches!(
            err,
            FormulationError::DimensionMismatch {
                expected: 3,
                got: 6,
                ..
            }
        ));
        let narrow = FrameKinematics::new(DMatrix::zeros(3, 3));
        assert!(c.motion_constraint(&narrow, 4).is_err());
    }

    #[test]
    fn validate_rejects_inverted_bounds() {
        let c = RigidContact::point("lf").with_force_bounds(50.0, 10.0);
        assert!(matches!(
            c.validate(),
            Err(FormulationError::InvalidForceBounds { .. })
        ));
    }

    #[test]
    fn normal_force_projects_on_normal() {
        let c = RigidContact::point("lf");
        let f = DVector::from_vec(vec![3.0, -2.0, 42.0]);
        assert_relative_eq!(c.normal_force(&f), 42.0);
    }

    #[test]
    fn validate_rejects_bad_friction() {
        assert!(RigidContact::point("lf").with_friction(0.0).validate().is_ok());
        for mu in [-0.1, f64::NAN, f64::INFINITY] {
            let err = RigidContact::point("lf").with_friction(mu).validate().unwrap_err();
            assert!(matches!(err, FormulationError::InvalidFriction { .. }), "mu = {mu}");
        }
    }

    #[test]
    fn wall_contact_uses_its_normal() {
        let c = RigidContact::point("hand")
            .with_normal(Vector3::x_axis())
            .with_friction(0.5);
        let pressing = DVector::from_vec(vec![20.0, 5.0, -8.0]);
        assert_relative_eq!(c.normal_force(&pressing), 20.0);
        assert_relative_eq!(c.force_constraint().violation(&pressing), 0.0, epsilon = 1e-9);

        // Pulling away from the wall breaks the unilateral bound.
        let pulling = DVector::from_vec(vec![-1.0, 0.0, 0.0]);
        assert!(c.force_constraint().violation(&pulling) > 0.0);
    }
}
