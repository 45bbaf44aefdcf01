//! Thread-local randomness for transforms.
//!
//! Each thread owns its generator; nothing is shared between threads. Loader
//! workers seed theirs with [`init_worker_rng`] so that a given
//! `(seed, epoch, worker)` triple always produces the same augmentations.
//! Threads that were never seeded draw from an OS-seeded generator.

use anyhow::{anyhow, Result};
use rand::distr::uniform::{SampleRange, SampleUniform};
use rand::rngs::StdRng;
use rand::Rng as _;
use rand::SeedableRng;
use rand_distr::{Beta, Distribution};
use std::cell::RefCell;

thread_local! {
    /// Worker index of the current thread (0 outside of loader workers).
    pub static WORKER_ID: RefCell<usize> = const { RefCell::new(0) };

    /// Thread-local RNG for deterministic randomness in workers
    static WORKER_RNG: RefCell<Option<StdRng>> = const { RefCell::new(None) };
}

/// Initialize the current thread's RNG based on worker_id, epoch, and base seed.
/// Seed formula: base_seed + (epoch << 32) + worker_id
pub fn init_worker_rng(worker_id: usize, epoch: usize, base_seed: u64) {
    WORKER_RNG.with(|rng| {
        let seed = base_seed
            .wrapping_add((epoch as u64) << 32)
            .wrapping_add(worker_id as u64);
        *rng.borrow_mut() = Some(StdRng::seed_from_u64(seed));
    })
}

pub fn worker_id() -> usize {
    WORKER_ID.with(|id| *id.borrow())
}

/// Runs `f` with the current thread's generator.
///
/// `f` must not call back into this module.
pub fn with_rng<R>(f: impl FnOnce(&mut StdRng) -> R) -> R {
    WORKER_RNG.with(|rng| {
        let mut slot = rng.borrow_mut();
        f(slot.get_or_insert_with(StdRng::from_os_rng))
    })
}

/// `true` with probability `p`.
pub fn worker_gen_bool(p: f64) -> bool {
    with_rng(|rng| rng.random_bool(p))
}

/// Uniform draw from a non-empty range.
pub fn worker_gen_range<T, R>(range: R) -> T
where
    T: SampleUniform,
    R: SampleRange<T>,
{
    with_rng(|rng| rng.random_range(range))
}

/// Uniform draw from `[0, 1)`.
pub fn worker_gen_f64() -> f64 {
    with_rng(|rng| rng.random::<f64>())
}

/// Draw from `Beta(alpha, beta)`; both shapes must be positive.
pub fn worker_gen_beta(alpha: f64, beta: f64) -> Result<f64> {
    let dist = Beta::new(alpha, beta)
        .map_err(|e| anyhow!("invalid Beta({}, {}): {}", alpha, beta, e))?;
    Ok(with_rng(|rng| dist.sample(rng)))
}
