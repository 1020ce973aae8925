//! Measured external forces.
//!
//! A measured force only shifts the right-hand side of the dynamics; it never
//! introduces decision variables.

use nalgebra::DVector;

use crate::error::FormulationError;
use crate::types::StateSnapshot;

/// Where a measured force is applied.
#[derive(Clone, Debug, PartialEq)]
pub enum MeasuredForceSource {
    /// Wrench (or force) applied at a frame; mapped to joint space by `Jᵀ w`.
    Frame { frame: String, wrench: DVector<f64> },
    /// Generalized force applied directly (`nv`).
    Generalized(DVector<f64>),
}

/// A named measured external force.
#[derive(Clone, Debug, PartialEq)]
pub struct MeasuredForce {
    name: String,
    source: MeasuredForceSource,
}

impl MeasuredForce {
    /// Wrench `wrench` measured at `frame`.
    pub fn at_frame(name: impl Into<String>, frame: impl Into<String>, wrench: DVector<f64>) -> Self {
        Self {
            name: name.into(),
            source: MeasuredForceSource::Frame {
                frame: frame.into(),
                wrench,
            },
        }
    }

    /// Generalized force `tau` applied directly in joint space.
    pub fn generalized(name: impl Into<String>, tau: DVector<f64>) -> Self {
        Self {
            name: name.into(),
            source: MeasuredForceSource::Generalized(tau),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn source(&self) -> &MeasuredForceSource {
        &self.source
    }

    /// Replace the measured value (e.g. with a new sensor reading).
    pub fn set_value(&mut self, value: DVector<f64>) {
        match &mut self.source {
            MeasuredForceSource::Frame { wrench, .. } => *wrench = value,
            MeasuredForceSource::Generalized(tau) => *tau = value,
        }
    }

    /// Generalized force produced at the current state (`nv`).
    pub fn joint_torques(
        &self,
        snapshot: &StateSnapshot,
        nv: usize,
    ) -> Result<DVector<f64>, FormulationError> {
        match &self.source {
            MeasuredForceSource::Frame { frame, wrench } => {
                let kin = snapshot.frame(frame)?;
                let (rows, cols) = kin.jacobian.shape();
                if cols != nv {
                    return Err(FormulationError::dimension(
                        format!("measured force {} jacobian cols", self.name),
                        nv,
                        cols,
                    ));
                }
                if rows != wrench.len() {
                    return Err(FormulationError::dimension(
                        format!("measured force {} wrench", self.name),
                        rows,
                        wrench.len(),
                    ));
                }
                Ok(kin.jacobian.tr_mul(wrench))
            }
            MeasuredForceSource::Generalized(tau) => {
                if tau.len() != nv {
                    return Err(FormulationError::dimension(
                        format!("measured force {}", self.name),
                        nv,
                        tau.len(),
                    ));
                }
                Ok(tau.clone())
            }
        }
    }
}
