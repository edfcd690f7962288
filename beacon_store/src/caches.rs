use core::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;
use types::config::Config;
use types::primitives::H256;
use types::types::SignedBeaconBlock;
use types::BeaconState;

/// Write-through LRU over decoded blocks, bounded by entry count. A miss
/// falls through to the database, so clearing it never changes results.
pub struct BlockCache<C: Config> {
    blocks: Mutex<LruCache<H256, SignedBeaconBlock<C>>>,
}

impl<C: Config> BlockCache<C> {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            blocks: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, root: H256) -> Option<SignedBeaconBlock<C>> {
        self.blocks.lock().get(&root).cloned()
    }

    pub fn put(&self, root: H256, block: SignedBeaconBlock<C>) {
        self.blocks.lock().put(root, block);
    }

    pub fn remove(&self, root: H256) {
        self.blocks.lock().pop(&root);
    }

    pub fn clear(&self) {
        self.blocks.lock().clear();
    }
}

/// Recently produced states held during initial sync, bounded to one epoch
/// of entries so a syncing node does not hold the whole chain in memory.
pub struct StateCache<C: Config> {
    states: Mutex<LruCache<H256, BeaconState<C>>>,
}

impl<C: Config> StateCache<C> {
    pub fn new() -> Self {
        let capacity = NonZeroUsize::new(C::slots_per_epoch() as usize)
            .unwrap_or_else(|| NonZeroUsize::new(1).expect("one is nonzero"));
        Self {
            states: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, root: H256) -> Option<BeaconState<C>> {
        self.states.lock().get(&root).cloned()
    }

    pub fn put(&self, root: H256, state: BeaconState<C>) {
        self.states.lock().put(root, state);
    }

    pub fn remove(&self, root: H256) {
        self.states.lock().pop(&root);
    }
}

impl<C: Config> Default for StateCache<C> {
    fn default() -> Self {
        Self::new()
    }
}
