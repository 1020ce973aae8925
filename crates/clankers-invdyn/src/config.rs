//! Formulation and solver configuration.
//!
//! All structs deserialize from TOML with per-field defaults, so a config file
//! only needs to list the values it overrides.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Serde default functions
// ---------------------------------------------------------------------------

fn default_name() -> String {
    "invdyn".into()
}
const fn default_removal_force_margin() -> f64 {
    1e-3
}
const fn default_force_regularization_level() -> usize {
    1
}
const fn default_force_regularization_weight() -> f64 {
    1e-5
}
const fn default_motion_weight() -> f64 {
    1.0
}
const fn default_max_iter() -> u32 {
    100
}
const fn default_tolerance() -> f64 {
    1e-8
}
const fn default_priority_gain() -> f64 {
    1e3
}
const fn default_regularization() -> f64 {
    1e-9
}

// ---------------------------------------------------------------------------
// ContactOptions
// ---------------------------------------------------------------------------

/// Weights and priority used when registering a rigid contact.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContactOptions {
    /// Weight of the force regularization cost `f = f_ref`.
    #[serde(default = "default_force_regularization_weight")]
    pub force_regularization_weight: f64,

    /// Weight of the contact motion constraint. Ignored at level 0.
    #[serde(default = "default_motion_weight")]
    pub motion_weight: f64,

    /// Priority level of the contact motion constraint (0 = hard).
    #[serde(default)]
    pub motion_priority_level: usize,
}

impl Default for ContactOptions {
    fn default() -> Self {
        Self {
            force_regularization_weight: default_force_regularization_weight(),
            motion_weight: default_motion_weight(),
            motion_priority_level: 0,
        }
    }
}

impl ContactOptions {
    /// Options with the given force regularization weight and default motion settings.
    pub fn with_force_regularization(weight: f64) -> Self {
        Self {
            force_regularization_weight: weight,
            ..Self::default()
        }
    }

    /// Place the contact motion constraint at a soft level with the given weight.
    #[must_use]
    pub const fn soft_motion(mut self, weight: f64, priority_level: usize) -> Self {
        self.motion_weight = weight;
        self.motion_priority_level = priority_level;
        self
    }
}

// ---------------------------------------------------------------------------
// FormulationConfig
// ---------------------------------------------------------------------------

/// Configuration for an [`InverseDynamicsFormulation`](crate::InverseDynamicsFormulation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulationConfig {
    /// Instance name, used in log output.
    #[serde(default = "default_name")]
    pub name: String,

    /// Bound on the unactuated dynamics slack `|s| <= tol` (0 = exact dynamics).
    #[serde(default)]
    pub base_slack_tolerance: f64,

    /// Final max normal force of a removal transition is `min + margin`.
    #[serde(default = "default_removal_force_margin")]
    pub removal_force_margin: f64,

    /// Max normal force a contact starts from when activated with a blend.
    #[serde(default)]
    pub activation_force_start: f64,

    /// Priority level receiving contact force regularization costs.
    #[serde(default = "default_force_regularization_level")]
    pub force_regularization_level: usize,

    /// Options used by [`add_rigid_contact_default`](crate::InverseDynamicsFormulation::add_rigid_contact_default).
    #[serde(default)]
    pub default_contact: ContactOptions,
}

impl Default for FormulationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            base_slack_tolerance: 0.0,
            removal_force_margin: default_removal_force_margin(),
            activation_force_start: 0.0,
            force_regularization_level: default_force_regularization_level(),
            default_contact: ContactOptions::default(),
        }
    }
}

impl FormulationConfig {
    /// Validate configuration. Returns Err on invalid values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        non_negative("base_slack_tolerance", self.base_slack_tolerance)?;
        non_negative("removal_force_margin", self.removal_force_margin)?;
        non_negative("activation_force_start", self.activation_force_start)?;
        non_negative(
            "default_contact.force_regularization_weight",
            self.default_contact.force_regularization_weight,
        )?;
        non_negative("default_contact.motion_weight", self.default_contact.motion_weight)?;
        if self.force_regularization_level == 0 {
            return Err(ConfigError::InvalidValue {
                field: "force_regularization_level".into(),
                message: "must be >= 1 (level 0 is reserved for hard constraints)".into(),
            });
        }
        Ok(())
    }

    /// Load from TOML file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse from a TOML string and validate.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// SolverConfig
// ---------------------------------------------------------------------------

/// Settings for the Clarabel HQP adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Maximum interior-point iterations.
    #[serde(default = "default_max_iter")]
    pub max_iter: u32,

    /// Gap and feasibility tolerance.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// Cost scale between consecutive soft levels.
    #[serde(default = "default_priority_gain")]
    pub priority_gain: f64,

    /// Tikhonov term added to the cost Hessian diagonal.
    #[serde(default = "default_regularization")]
    pub regularization: f64,

    /// Print solver progress.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iter: default_max_iter(),
            tolerance: default_tolerance(),
            priority_gain: default_priority_gain(),
            regularization: default_regularization(),
            verbose: false,
        }
    }
}

impl SolverConfig {
    /// Validate configuration. Returns Err on invalid values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iter == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_iter".into(),
                message: "must be > 0".into(),
            });
        }
        if !(self.tolerance > 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "tolerance".into(),
                message: format!("must be > 0, got {}", self.tolerance),
            });
        }
        if !(self.priority_gain >= 1.0) {
            return Err(ConfigError::InvalidValue {
                field: "priority_gain".into(),
                message: format!("must be >= 1, got {}", self.priority_gain),
            });
        }
        non_negative("regularization", self.regularization)
    }
}

fn non_negative(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field: field.into(),
            message: format!("must be finite and >= 0, got {value}"),
        })
    }
}
