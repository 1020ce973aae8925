//! Shared test fixtures and utilities for Clankers crates.
//!
//! Provides analytic state providers, canned tasks and deterministic RNG
//! setup for exercising the inverse-dynamics formulation.

pub mod fixtures;
pub mod mocks;
pub mod rng;

// ---------------------------------------------------------------------------
// Re-exports for convenience
// ---------------------------------------------------------------------------

pub use fixtures::{FixedArm, GRAVITY, PointMassBiped};
pub use mocks::{ConstantTask, SwitchingTask};
pub use rng::{random_dvector, seeded_rng};
