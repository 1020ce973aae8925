//! Core types shared with the rigid-body dynamics evaluator.

use std::collections::HashMap;

use nalgebra::{DMatrix, DVector};

use crate::error::FormulationError;

/// Sizes of the mechanism's configuration, velocity and actuation spaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModelDimensions {
    /// Configuration dimension (may exceed `nv` with quaternion bases).
    pub nq: usize,
    /// Number of generalized velocities / accelerations.
    pub nv: usize,
    /// Number of actuated degrees of freedom.
    pub na: usize,
}

impl ModelDimensions {
    /// Fixed-base mechanism: every velocity coordinate is actuated.
    pub const fn fixed_base(nv: usize) -> Self {
        Self { nq: nv, nv, na: nv }
    }

    /// Floating-base mechanism with a 6-DoF free-flyer (quaternion, `nq = nv + 1`).
    pub const fn floating_base(n_joints: usize) -> Self {
        Self {
            nq: n_joints + 7,
            nv: n_joints + 6,
            na: n_joints,
        }
    }

    /// Number of unactuated degrees of freedom. Zero for inconsistent
    /// dimensions with `na > nv`, which [`validate`](Self::validate) rejects.
    pub const fn nu(&self) -> usize {
        self.nv.saturating_sub(self.na)
    }

    /// Fail if more coordinates are actuated than there are velocities.
    pub fn validate(&self) -> Result<(), FormulationError> {
        if self.na > self.nv {
            return Err(FormulationError::dimension("actuated coordinates", self.nv, self.na));
        }
        Ok(())
    }
}

/// Kinematics of one frame at the current state.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameKinematics {
    /// Frame Jacobian (`m x nv`), rows in the frame's force convention.
    pub jacobian: DMatrix<f64>,
    /// Acceleration drift `J̇ v` (`m`).
    pub drift: DVector<f64>,
}

impl FrameKinematics {
    /// Frame with zero drift.
    pub fn new(jacobian: DMatrix<f64>) -> Self {
        let rows = jacobian.nrows();
        Self {
            jacobian,
            drift: DVector::zeros(rows),
        }
    }
}

/// Dynamics quantities evaluated at `(q, v)`.
///
/// Equation of motion convention: `M dv + h = Sᵀ τ + Σ Jcᵀ f + τ_ext`.
#[derive(Clone, Debug)]
pub struct StateSnapshot {
    /// Joint-space mass matrix `M` (`nv x nv`).
    pub mass_matrix: DMatrix<f64>,
    /// Bias forces `h` (Coriolis, centrifugal, gravity) (`nv`).
    pub bias_forces: DVector<f64>,
    /// Frame kinematics keyed by frame name.
    pub frames: HashMap<String, FrameKinematics>,
    /// Actuation selection matrix `S` (`na x nv`).
    pub actuation_selection: DMatrix<f64>,
}

impl StateSnapshot {
    /// Look up a frame, failing with [`FormulationError::MissingFrame`].
    pub fn frame(&self, name: &str) -> Result<&FrameKinematics, FormulationError> {
        self.frames
            .get(name)
            .ok_or_else(|| FormulationError::MissingFrame(name.to_string()))
    }

    /// Check sizes against `dims` and return the unactuated coordinate indices.
    ///
    /// Unactuated coordinates are the zero columns of `S`; their count must
    /// equal `dims.nu()`.
    pub fn validate(&self, dims: &ModelDimensions) -> Result<Vec<usize>, FormulationError> {
        dims.validate()?;
        let (m_rows, m_cols) = self.mass_matrix.shape();
        if m_rows != dims.nv {
            return Err(FormulationError::dimension("mass matrix rows", dims.nv, m_rows));
        }
        if m_cols != dims.nv {
            return Err(FormulationError::dimension("mass matrix cols", dims.nv, m_cols));
        }
        if self.bias_forces.len() != dims.nv {
            return Err(FormulationError::dimension(
                "bias forces",
                dims.nv,
                self.bias_forces.len(),
            ));
        }
        let (s_rows, s_cols) = self.actuation_selection.shape();
        if s_rows != dims.na {
            return Err(FormulationError::dimension("actuation selection rows", dims.na, s_rows));
        }
        if s_cols != dims.nv {
            return Err(FormulationError::dimension("actuation selection cols", dims.nv, s_cols));
        }

        let unactuated: Vec<usize> = (0..dims.nv)
            .filter(|&j| self.actuation_selection.column(j).iter().all(|&s| s == 0.0))
            .collect();
        if unactuated.len() != dims.nu() {
            return Err(FormulationError::dimension(
                "unactuated coordinates",
                dims.nu(),
                unactuated.len(),
            ));
        }
        Ok(unactuated)
    }
}

/// Rigid-body dynamics evaluator consumed by the formulation.
///
/// Re-queried every control cycle; the formulation never caches its output
/// beyond the decode of the same cycle.
pub trait StateProvider {
    /// Model dimensions; must be constant for the provider's lifetime.
    fn dimensions(&self) -> ModelDimensions;

    /// Evaluate mass matrix, bias forces, frame kinematics and actuation selection.
    fn evaluate(
        &mut self,
        q: &DVector<f64>,
        v: &DVector<f64>,
    ) -> Result<StateSnapshot, FormulationError>;
}

/// Selection matrix for the common layout where the first `nu` coordinates are unactuated.
pub fn trailing_actuation_selection(dims: &ModelDimensions) -> DMatrix<f64> {
    let mut s = DMatrix::zeros(dims.na, dims.nv);
    for i in 0..dims.na.min(dims.nv) {
        s[(i, dims.nu() + i)] = 1.0;
    }
    s
}
