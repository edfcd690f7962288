use core::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use types::primitives::{Epoch, ValidatorIndex, H256};

use crate::error::Error;

/// LRU cache of shuffled active-validator sets, keyed by `(epoch, seed)`.
///
/// Purely an accelerator: a miss recomputes through the supplied closure, so
/// clearing the cache can never change results.
pub struct ShufflingCache {
    shufflings: Mutex<LruCache<(Epoch, H256), Arc<Vec<ValidatorIndex>>>>,
}

impl ShufflingCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            shufflings: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get_or_compute(
        &self,
        epoch: Epoch,
        seed: H256,
        compute: impl FnOnce() -> Result<Vec<ValidatorIndex>, Error>,
    ) -> Result<Arc<Vec<ValidatorIndex>>, Error> {
        if let Some(shuffling) = self.shufflings.lock().get(&(epoch, seed)) {
            return Ok(Arc::clone(shuffling));
        }

        // Computed outside the lock; racing fills of one key produce the
        // same deterministic value.
        let shuffling = Arc::new(compute()?);
        self.shufflings
            .lock()
            .put((epoch, seed), Arc::clone(&shuffling));
        Ok(shuffling)
    }

    pub fn len(&self) -> usize {
        self.shufflings.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ShufflingCache {
    fn default() -> Self {
        Self::new(NonZeroUsize::new(16).expect("capacity is nonzero"))
    }
}
