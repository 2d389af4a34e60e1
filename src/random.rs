//! Random number generation for the environment.
//!
//! Every environment owns its own generator, seeded once from the configuration. There is no
//! process-wide generator: two environments built from the same seed and driven by the same
//! actions consume the same draws in the same order.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Poisson};

use crate::error::Covid19GymError;

/// The generator type owned by an environment.
pub type GymRng = SmallRng;

#[must_use]
pub fn seeded_rng(seed: u64) -> GymRng {
    SmallRng::seed_from_u64(seed)
}

/// Draws a Poisson-distributed count with the given mean.
///
/// A mean of zero always yields zero and consumes no randomness.
///
/// # Errors
///
/// Returns `Covid19GymError::Sampling` if `mean` is negative, not finite, or too large for
/// the Poisson sampler.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn sample_poisson<R: Rng + ?Sized>(rng: &mut R, mean: f64) -> Result<u64, Covid19GymError> {
    if mean == 0.0 {
        return Ok(0);
    }
    let poisson = Poisson::new(mean)
        .map_err(|e| Covid19GymError::Sampling(format!("Poisson mean {mean}: {e}")))?;
    Ok(poisson.sample(rng) as u64)
}
