//! Analytic state providers with closed-form dynamics.
//!
//! [`PointMassBiped`] is a floating point-mass body with two prismatic
//! 3-DoF legs, each ending in a point-mass foot. Coordinates are
//! `[p (3) | l (3) | r (3)]`: base position, left foot offset, right foot
//! offset. The base translation is unactuated.
//!
//! [`FixedArm`] is a fixed-base Cartesian arm with a tool frame.

use std::collections::HashMap;

use clankers_invdyn::{
    FormulationError, FrameKinematics, ModelDimensions, StateProvider, StateSnapshot,
    trailing_actuation_selection,
};
use nalgebra::{DMatrix, DVector, Matrix3};

/// Gravitational acceleration used by the fixtures (m/s²).
pub const GRAVITY: f64 = 9.81;

// ---------------------------------------------------------------------------
// PointMassBiped
// ---------------------------------------------------------------------------

/// Floating point-mass biped with frames `base`, `left_foot` and `right_foot`.
#[derive(Clone, Debug)]
pub struct PointMassBiped {
    pub body_mass: f64,
    pub left_foot_mass: f64,
    pub right_foot_mass: f64,
    /// Number of `evaluate` calls so far.
    pub evaluations: usize,
}

impl Default for PointMassBiped {
    fn default() -> Self {
        Self::new(20.0, 5.0, 5.0)
    }
}

impl PointMassBiped {
    pub const fn new(body_mass: f64, left_foot_mass: f64, right_foot_mass: f64) -> Self {
        Self {
            body_mass,
            left_foot_mass,
            right_foot_mass,
            evaluations: 0,
        }
    }

    pub fn total_mass(&self) -> f64 {
        self.body_mass + self.left_foot_mass + self.right_foot_mass
    }

    /// Zero configuration and velocity.
    pub fn rest_state(&self) -> (DVector<f64>, DVector<f64>) {
        (DVector::zeros(9), DVector::zeros(9))
    }

    pub fn mass_matrix(&self) -> DMatrix<f64> {
        let (m1, m2) = (self.left_foot_mass, self.right_foot_mass);
        let mut m = DMatrix::zeros(9, 9);
        m.fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&(Matrix3::identity() * self.total_mass()));
        for (offset, mass) in [(3, m1), (6, m2)] {
            let block = Matrix3::identity() * mass;
            m.fixed_view_mut::<3, 3>(0, offset).copy_from(&block);
            m.fixed_view_mut::<3, 3>(offset, 0).copy_from(&block);
            m.fixed_view_mut::<3, 3>(offset, offset).copy_from(&block);
        }
        m
    }

    /// Gravity terms only; the dynamics have no velocity-dependent forces.
    pub fn bias_forces(&self) -> DVector<f64> {
        let mut h = DVector::zeros(9);
        h[2] = self.total_mass() * GRAVITY;
        h[5] = self.left_foot_mass * GRAVITY;
        h[8] = self.right_foot_mass * GRAVITY;
        h
    }
}

impl StateProvider for PointMassBiped {
    fn dimensions(&self) -> ModelDimensions {
        ModelDimensions {
            nq: 9,
            nv: 9,
            na: 6,
        }
    }

    fn evaluate(
        &mut self,
        _q: &DVector<f64>,
        _v: &DVector<f64>,
    ) -> Result<StateSnapshot, FormulationError> {
        self.evaluations += 1;

        let mut frames = HashMap::new();
        frames.insert("base".to_string(), FrameKinematics::new(selector(9, &[0])));
        frames.insert("left_foot".to_string(), FrameKinematics::new(selector(9, &[0, 3])));
        frames.insert("right_foot".to_string(), FrameKinematics::new(selector(9, &[0, 6])));

        Ok(StateSnapshot {
            mass_matrix: self.mass_matrix(),
            bias_forces: self.bias_forces(),
            frames,
            actuation_selection: trailing_actuation_selection(&self.dimensions()),
        })
    }
}

// ---------------------------------------------------------------------------
// FixedArm
// ---------------------------------------------------------------------------

/// Fixed-base Cartesian arm: three prismatic joints with diagonal inertia,
/// gravity on the third, and a `tool` frame at the end effector.
#[derive(Clone, Debug)]
pub struct FixedArm {
    pub link_masses: [f64; 3],
}

impl Default for FixedArm {
    fn default() -> Self {
        Self {
            link_masses: [3.0, 2.0, 1.0],
        }
    }
}

impl StateProvider for FixedArm {
    fn dimensions(&self) -> ModelDimensions {
        ModelDimensions::fixed_base(3)
    }

    fn evaluate(
        &mut self,
        _q: &DVector<f64>,
        _v: &DVector<f64>,
    ) -> Result<StateSnapshot, FormulationError> {
        let [m0, m1, m2] = self.link_masses;
        let mass_matrix = DMatrix::from_diagonal(&DVector::from_vec(vec![m0 + m1 + m2, m1 + m2, m2]));
        let bias_forces = DVector::from_vec(vec![0.0, 0.0, m2 * GRAVITY]);

        let mut frames = HashMap::new();
        frames.insert("tool".to_string(), FrameKinematics::new(DMatrix::identity(3, 3)));

        Ok(StateSnapshot {
            mass_matrix,
            bias_forces,
            frames,
            actuation_selection: DMatrix::identity(3, 3),
        })
    }
}

/// `3 x nv` Jacobian summing identity blocks at each offset in `offsets`.
fn selector(nv: usize, offsets: &[usize]) -> DMatrix<f64> {
    let mut j = DMatrix::zeros(3, nv);
    for &offset in offsets {
        for i in 0..3 {
            j[(i, offset + i)] = 1.0;
        }
    }
    j
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn biped_snapshot_is_consistent() {
        let mut biped = PointMassBiped::default();
        let dims = biped.dimensions();
        let (q, v) = biped.rest_state();
        let snapshot = biped.evaluate(&q, &v).unwrap();
        assert_eq!(snapshot.validate(&dims).unwrap(), vec![0, 1, 2]);
        assert_eq!(biped.evaluations, 1);
    }

    #[test]
    fn biped_mass_matrix_is_symmetric_positive_definite() {
        let m = PointMassBiped::default().mass_matrix();
        assert_relative_eq!(m.clone(), m.transpose());
        assert!(m.cholesky().is_some());
    }

    #[test]
    fn foot_jacobian_moves_with_base_and_leg() {
        let mut biped = PointMassBiped::default();
        let (q, v) = biped.rest_state();
        let snapshot = biped.evaluate(&q, &v).unwrap();
        let j = &snapshot.frame("left_foot").unwrap().jacobian;
        assert_relative_eq!(j[(2, 2)], 1.0);
        assert_relative_eq!(j[(2, 5)], 1.0);
        assert_relative_eq!(j[(2, 8)], 0.0);
    }

    #[test]
    fn gravity_acts_on_vertical_coordinates() {
        let biped = PointMassBiped::new(10.0, 1.0, 2.0);
        let h = biped.bias_forces();
        assert_relative_eq!(h[2], 13.0 * GRAVITY);
        assert_relative_eq!(h[5], GRAVITY);
        assert_relative_eq!(h[8], 2.0 * GRAVITY);
    }

    #[test]
    fn fixed_arm_is_fully_actuated() {
        let mut arm = FixedArm::default();
        let dims = arm.dimensions();
        let q = DVector::zeros(3);
        let snapshot = arm.evaluate(&q, &q).unwrap();
        assert!(snapshot.validate(&dims).unwrap().is_empty());
    }
}
