// ==========================================
// Duty Roster Engine - permutation source
// ==========================================
// Seam for the random order used by the shift partitioner.
// Production shuffles with the thread RNG; tests use a seeded StdRng or
// the identity permutation.
// ==========================================

use rand::seq::SliceRandom;
use rand::Rng;

pub trait PermutationSource {
    /// Reorders `items` in place.
    fn permute<T>(&mut self, items: &mut [T]);
}

/// Uniform shuffle driven by any [`rand::Rng`].
pub struct RngPermutation<R: Rng> {
    rng: R,
}

impl<R: Rng> RngPermutation<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RngPermutation<rand::rngs::ThreadRng> {
    pub fn thread() -> Self {
        Self::new(rand::rng())
    }
}

impl<R: Rng> PermutationSource for RngPermutation<R> {
    fn permute<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.rng);
    }
}

/// Keeps roster order unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityPermutation;

impl PermutationSource for IdentityPermutation {
    fn permute<T>(&mut self, _items: &mut [T]) {}
}
