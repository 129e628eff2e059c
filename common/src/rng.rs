use rand::rngs::StdRng;
use rand::SeedableRng;

/// Deterministic rng so generated inputs are reproducible across runs.
pub fn create_rng_from_seed(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}
