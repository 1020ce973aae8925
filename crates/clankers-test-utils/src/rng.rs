//! Deterministic RNG utilities for reproducible tests.

use nalgebra::DVector;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Create a deterministic `ChaCha8Rng` from a seed.
///
/// All test randomization should go through this to ensure reproducibility.
pub fn seeded_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Draw a vector with entries uniform in `[-scale, scale)`.
pub fn random_dvector(rng: &mut impl Rng, dim: usize, scale: f64) -> DVector<f64> {
    DVector::from_fn(dim, |_, _| rng.gen_range(-scale..scale))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
