//! Shared, seedable random source.
//!
//! Every stochastic draw of a run (tour shuffling, tournament picks, crossover
//! windows, mutation positions) goes through one [`RngHandle`]. Clones of a
//! handle share the same stream, so a model and an engine built from the same
//! handle consume one deterministic sequence rooted at one seed.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

/// Seed of the process-wide handle until someone reseeds it.
pub const DEFAULT_SEED: u64 = 42;

static GLOBAL_RNG: OnceLock<RngHandle> = OnceLock::new();

#[derive(Debug, Clone)]
pub struct RngHandle {
    inner: Arc<Mutex<ChaCha8Rng>>,
}

impl RngHandle {
    /// Create an independent handle with its own stream.
    pub fn seeded(seed: u64) -> Self {
        RngHandle {
            inner: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
        }
    }

    /// The process-wide handle, created with [`DEFAULT_SEED`] on first use.
    pub fn global() -> Self {
        GLOBAL_RNG
            .get_or_init(|| RngHandle::seeded(DEFAULT_SEED))
            .clone()
    }

    /// Restart the stream from `seed`. Only call this between runs.
    pub fn reseed(&self, seed: u64) {
        *self.lock() = ChaCha8Rng::seed_from_u64(seed);
    }

    /// Run `f` with exclusive access to the generator.
    pub fn with<T>(&self, f: impl FnOnce(&mut ChaCha8Rng) -> T) -> T {
        let mut guard = self.lock();
        f(&mut *guard)
    }

    /// True when both handles draw from the same stream.
    pub fn shares_stream_with(&self, other: &RngHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn lock(&self) -> MutexGuard<'_, ChaCha8Rng> {
        // A panic while holding the lock cannot leave ChaCha state half-written.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for RngHandle {
    fn default() -> Self {
        Self::global()
    }
}

/// Reseed the process-wide handle.
pub fn reseed_global(seed: u64) {
    RngHandle::global().reseed(seed);
}
