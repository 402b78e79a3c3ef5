//! Weighted bucket selection
//!
//! **Problem**: pick one of N buckets where bucket `i` is chosen with
//! probability `w[i] / sum(w)`.
//!
//! **Solution**: draw `r` uniformly from `[0, total)` and walk the weights in
//! order; the first bucket whose cumulative weight exceeds `r` wins.
//!
//! Buckets are 1-indexed: a spreading of `[3, 1]` yields bucket `1` three
//! times as often as bucket `2`. Selection is fully determined by the random
//! source, so a seeded `StdRng` gives reproducible assignments.

use crate::{Error, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Select a 1-indexed bucket from `weights` using `rng`.
///
/// # Errors
///
/// Returns [`Error::Selection`] if `weights` is empty or sums to zero.
///
/// # Examples
///
/// ```rust
/// use customers_choice::selector::select;
/// use rand::rngs::StdRng;
/// use rand::SeedableRng;
///
/// let mut rng = StdRng::seed_from_u64(7);
/// let bucket = select(&[1, 1, 2], &mut rng)?;
/// assert!((1..=3).contains(&bucket));
/// # Ok::<(), customers_choice::Error>(())
/// ```
pub fn select<R: Rng + ?Sized>(weights: &[u32], rng: &mut R) -> Result<u32> {
    if weights.is_empty() {
        return Err(Error::Selection("spreading is empty".to_string()));
    }

    let total: u64 = weights.iter().map(|&w| u64::from(w)).sum();
    if total == 0 {
        return Err(Error::Selection(format!(
            "spreading {weights:?} has no positive weight"
        )));
    }

    let mut remainder = rng.gen_range(0..total);
    for (index, &weight) in weights.iter().enumerate() {
        let weight = u64::from(weight);
        if remainder < weight {
            return bucket_number(index);
        }
        remainder -= weight;
    }

    // unreachable while remainder < total, kept as a guard against overflowed input
    Err(Error::Selection(format!(
        "walk over {weights:?} exhausted without a bucket"
    )))
}

fn bucket_number(index: usize) -> Result<u32> {
    u32::try_from(index + 1)
        .map_err(|_| Error::Selection(format!("bucket index {index} exceeds u32")))
}

/// Selector owning its random source.
///
/// The engine keeps one of these behind its registry lock so that every
/// assignment draws from a single stream.
#[derive(Debug)]
pub struct WeightedSelector {
    rng: StdRng,
}

impl WeightedSelector {
    /// Create a selector seeded from OS entropy.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Create a reproducible selector.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Select a 1-indexed bucket.
    ///
    /// # Errors
    ///
    /// See [`select`].
    pub fn select(&mut self, weights: &[u32]) -> Result<u32> {
        select(weights, &mut self.rng)
    }
}

impl Default for WeightedSelector {
    fn default() -> Self {
        Self::from_entropy()
    }
}
