//! Helpers shared by the integration tests.

#![allow(dead_code)]

use clankers_invdyn::{
    HqpData, HqpOutput, InverseDynamicsFormulation, RigidContact, WeightedConstraint,
};
use clankers_test_utils::PointMassBiped;
use nalgebra::{DMatrix, DVector};

pub type Biped = InverseDynamicsFormulation<PointMassBiped>;

pub fn biped() -> Biped {
    InverseDynamicsFormulation::new(PointMassBiped::default())
}

pub fn foot(name: &str) -> RigidContact {
    RigidContact::point(name)
        .with_friction(0.7)
        .with_force_bounds(0.0, 1000.0)
}

/// Biped with both feet in contact.
pub fn standing_biped() -> Biped {
    let mut formulation = biped();
    formulation.add_rigid_contact_default(foot("left_foot"), 0.0).unwrap();
    formulation.add_rigid_contact_default(foot("right_foot"), 0.0).unwrap();
    formulation
}

/// Assemble at `time` from the rest state.
pub fn assemble(formulation: &mut Biped, time: f64) -> HqpData {
    let (q, v) = formulation.provider().rest_state();
    formulation.compute_problem_data(time, &q, &v).unwrap().clone()
}

/// Level and entry for the constraint named `name`.
pub fn find<'a>(problem: &'a HqpData, name: &str) -> Option<(usize, &'a WeightedConstraint)> {
    problem.iter().enumerate().find_map(|(level, entries)| {
        entries
            .iter()
            .find(|wc| wc.name == name)
            .map(|wc| (level, wc))
    })
}

/// `3 x 9` selector of the base translation.
pub fn base_selector() -> DMatrix<f64> {
    let mut a = DMatrix::zeros(3, 9);
    a.view_mut((0, 0), (3, 3)).fill_with_identity();
    a
}

/// Solution vector `[dv | f_left | f_right | s]` for the standing biped.
pub fn standing_solution(dv: &[f64], f_left: [f64; 3], f_right: [f64; 3], slack: [f64; 3]) -> HqpOutput {
    let mut x = DVector::zeros(18);
    for (i, value) in dv.iter().enumerate() {
        x[i] = *value;
    }
    for i in 0..3 {
        x[9 + i] = f_left[i];
        x[12 + i] = f_right[i];
        x[15 + i] = slack[i];
    }
    HqpOutput::optimal(x)
}
