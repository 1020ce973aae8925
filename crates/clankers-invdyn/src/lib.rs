//! Task-priority inverse dynamics for floating-base and fixed-base mechanisms.
//!
//! Each control cycle, [`InverseDynamicsFormulation`] turns a set of
//! prioritized motion, force and actuation tasks plus a set of rigid contacts
//! into a hierarchical QP over
//!
//! ```text
//! x = [ dv (nv) | contact forces (Σ k_i) | base slack (nu) ]
//! ```
//!
//! and maps the solver's answer back to accelerations, contact forces and
//! actuator torques.
//!
//! # Pipeline
//!
//! 1. **Registry**: tasks, contacts and measured forces, stored by name
//! 2. **Hierarchy**: priority levels; level 0 is hard, higher levels are weighted costs
//! 3. **Layout**: decision-vector partition and row counts, recounted on every change
//! 4. **Transitions**: time-blended activation and removal of contacts and tasks
//! 5. **Assembly**: per-cycle [`HqpData`] from a [`StateProvider`] snapshot
//! 6. **Decoding**: accelerations, forces and `τ = S (M dv + h - Jcᵀ f - τ_ext)`
//!
//! The formulation never solves anything itself; [`ClarabelHqpSolver`] is a
//! ready-made [`HqpSolver`].

pub mod assembler;
pub mod config;
pub mod constraint;
pub mod contact;
pub mod decoder;
pub mod error;
pub mod formulation;
pub mod hierarchy;
pub mod hqp;
pub mod layout;
pub mod measured;
pub mod registry;
pub mod solver;
pub mod task;
pub mod transition;
pub mod types;

pub use config::{ContactOptions, FormulationConfig, SolverConfig};
pub use constraint::{Constraint, ConstraintKind};
pub use contact::{ContactModel, RigidContact, tangent_basis};
pub use decoder::DecodedSolution;
pub use error::{ConfigError, FormulationError};
pub use formulation::InverseDynamicsFormulation;
pub use hierarchy::{EntryRole, Hierarchy, LevelEntry};
pub use hqp::{HqpData, HqpLevel, HqpOutput, HqpSolver, SolverStatus, WeightedConstraint, hard_row_counts};
pub use layout::{ContactBlock, ProblemLayout};
pub use measured::{MeasuredForce, MeasuredForceSource};
pub use registry::{ContactEntry, Entity, EntityId, Registry, TaskEntry};
pub use solver::ClarabelHqpSolver;
pub use task::{Objective, Task};
pub use transition::{
    TransitionKind, TransitionPhase, TransitionScheduler, TransitionTarget, TransitionWindow,
};
pub use types::{
    FrameKinematics, ModelDimensions, StateProvider, StateSnapshot, trailing_actuation_selection,
};
