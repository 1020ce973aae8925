//! Physical quantities recovered from a solver result.
//!
//! Decoding uses the layout and dynamics terms captured by the last call to
//! `compute_problem_data`, so a registry change between assembly and decode
//! never shifts the slices.

use nalgebra::DVector;
use tracing::warn;

use crate::error::FormulationError;
use crate::formulation::InverseDynamicsFormulation;
use crate::hqp::HqpOutput;
use crate::types::StateProvider;

/// Accelerations, forces and torques from one solved cycle.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedSolution {
    /// Generalized accelerations `dv` (`nv`).
    pub accelerations: DVector<f64>,
    /// All contact forces stacked in layout order (`n_force`).
    pub aggregate_forces: DVector<f64>,
    /// Per-contact force blocks in layout order.
    pub contact_forces: Vec<(String, DVector<f64>)>,
    /// Actuator torques `τ = S (M dv + h - Jcᵀ f - τ_ext)` (`na`).
    pub actuator_forces: DVector<f64>,
    /// Unactuated dynamics slack `s` (`nu`).
    pub base_residual: DVector<f64>,
}

impl DecodedSolution {
    pub fn contact_force(&self, name: &str) -> Option<&DVector<f64>> {
        self.contact_forces
            .iter()
            .find(|(contact, _)| contact == name)
            .map(|(_, f)| f)
    }
}

impl<P: StateProvider> InverseDynamicsFormulation<P> {
    /// Decode a solver result for the last assembled problem.
    ///
    /// On failure the previously decoded values are left untouched.
    pub fn decode_solution(&mut self, output: &HqpOutput) -> Result<&DecodedSolution, FormulationError> {
        let terms = self.cycle.as_ref().ok_or(FormulationError::NotAssembled)?;
        if !output.status.is_success() {
            warn!(status = ?output.status, time = self.time, "solver did not converge");
            return Err(FormulationError::SolveFailure(output.status));
        }
        let layout = &terms.layout;
        if output.x.len() != layout.n_var {
            return Err(FormulationError::dimension(
                "solution vector",
                layout.n_var,
                output.x.len(),
            ));
        }

        let x = &output.x;
        let accelerations = x.rows(0, layout.nv).into_owned();
        let aggregate_forces = x.rows(layout.force_offset(), layout.n_force).into_owned();
        let base_residual = x.rows(layout.slack_offset(), layout.nu).into_owned();
        let contact_forces = layout
            .contact_blocks
            .iter()
            .map(|block| (block.name.clone(), x.rows(block.offset, block.size).into_owned()))
            .collect();
        let actuator_forces =
            &terms.m_a * &accelerations + &terms.h_a - &terms.j_a_t * &aggregate_forces;

        self.solution_decoded = true;
        Ok(&*self.decoded.insert(DecodedSolution {
            accelerations,
            aggregate_forces,
            contact_forces,
            actuator_forces,
            base_residual,
        }))
    }

    /// Whether the last assembled problem has been decoded.
    pub const fn is_solution_decoded(&self) -> bool {
        self.solution_decoded
    }

    /// Most recent decode, current or not.
    pub const fn decoded(&self) -> Option<&DecodedSolution> {
        self.decoded.as_ref()
    }

    fn current_decode(&self) -> Result<&DecodedSolution, FormulationError> {
        self.decoded
            .as_ref()
            .filter(|_| self.solution_decoded)
            .ok_or(FormulationError::NotDecoded)
    }

    pub fn accelerations(&self) -> Result<&DVector<f64>, FormulationError> {
        self.current_decode().map(|d| &d.accelerations)
    }

    /// All contact forces stacked in layout order.
    pub fn contact_forces(&self) -> Result<&DVector<f64>, FormulationError> {
        self.current_decode().map(|d| &d.aggregate_forces)
    }

    pub fn actuator_forces(&self) -> Result<&DVector<f64>, FormulationError> {
        self.current_decode().map(|d| &d.actuator_forces)
    }

    pub fn base_residual(&self) -> Result<&DVector<f64>, FormulationError> {
        self.current_decode().map(|d| &d.base_residual)
    }

    /// Force block of an active contact from the last decode.
    pub fn contact_force(&self, name: &str) -> Result<&DVector<f64>, FormulationError> {
        self.registry.contact(name)?;
        self.current_decode()?
            .contact_force(name)
            .ok_or_else(|| FormulationError::UnknownName(name.to_string()))
    }

    /// Normal component of an active contact's decoded force.
    pub fn contact_normal_force(&self, name: &str) -> Result<f64, FormulationError> {
        let f = self.contact_force(name)?;
        Ok(self.registry.contact(name)?.contact.normal_force(f))
    }

    /// Slice a contact's force block directly out of a raw solver result,
    /// using the last assembled layout.
    pub fn contact_force_from(&self, name: &str, output: &HqpOutput) -> Result<DVector<f64>, FormulationError> {
        self.registry.contact(name)?;
        let terms = self.cycle.as_ref().ok_or(FormulationError::NotAssembled)?;
        let layout = &terms.layout;
        if output.x.len() != layout.n_var {
            return Err(FormulationError::dimension(
                "solution vector",
                layout.n_var,
                output.x.len(),
            ));
        }
        let block = layout
            .contact_block(name)
            .ok_or_else(|| FormulationError::UnknownName(name.to_string()))?;
        Ok(output.x.rows(block.offset, block.size).into_owned())
    }
}
