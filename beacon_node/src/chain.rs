use core::convert::TryFrom;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use log::{info, warn};
use parking_lot::Mutex;

use beacon_fork_choice::ForkChoice;
use beacon_store::{CancelToken, Store, StoreError};
use helper_functions::beacon_state_accessors::{
    get_active_validator_indices, get_committee_count_at_slot, get_seed,
};
use helper_functions::committee_cache::ShufflingCache;
use helper_functions::crypto::hash_tree_root;
use helper_functions::misc::{compute_epoch_at_slot, compute_shuffled_index};
use thiserror::Error;
use types::config::Config;
use types::primitives::{CommitteeIndex, Slot, ValidatorIndex, H256};
use types::types::{Checkpoint, IndexedAttestation, SignedBeaconBlock};
use types::BeaconState;

use crate::events::{HeadEvent, HeadEventPublisher};
use crate::slot_clock::SlotClock;

const BAD_BLOCK_CAPACITY: usize = 1024;
const PENDING_BLOCK_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("block {root} at slot {slot} is ahead of the wall clock slot {current_slot}")]
    SlotInFuture {
        root: H256,
        slot: Slot,
        current_slot: Slot,
    },
    #[error("block {root} was rejected before")]
    KnownBadBlock { root: H256 },
    #[error("block {root} is buffered until parent {parent_root} arrives")]
    ParentPending { root: H256, parent_root: H256 },
    #[error("the pending-parent buffer is full")]
    Busy,
    #[error("the chain has no head yet")]
    NoHead,
    #[error(transparent)]
    ForkChoice(#[from] beacon_fork_choice::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("helper failure: {0}")]
    Helper(#[from] helper_functions::Error),
}

/// Answer to a block submission: where the head moved and whether the chain
/// finalized further.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BlockReceipt {
    pub block_root: H256,
    pub head_block_root: H256,
    pub finalized_advanced: bool,
}

struct BoundedRootSet {
    roots: HashSet<H256>,
    order: VecDeque<H256>,
    capacity: usize,
}

impl BoundedRootSet {
    fn new(capacity: usize) -> Self {
        Self {
            roots: HashSet::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    fn insert(&mut self, root: H256) {
        if self.roots.insert(root) {
            self.order.push_back(root);
            if self.order.len() > self.capacity {
                if let Some(evicted) = self.order.pop_front() {
                    self.roots.remove(&evicted);
                }
            }
        }
    }

    fn contains(&self, root: H256) -> bool {
        self.roots.contains(&root)
    }

    fn clear(&mut self) {
        self.roots.clear();
        self.order.clear();
    }
}

/// Glue between the store, the transition function, and fork choice.
///
/// Writes go through one mutex around the fork-choice engine; reads hit the
/// store, which serves a consistent snapshot per call.
pub struct BeaconChain<C: Config> {
    store: Arc<Store<C>>,
    fork_choice: Mutex<ForkChoice<C>>,
    slot_clock: SlotClock,
    events: HeadEventPublisher,
    shuffling_cache: ShufflingCache,
    bad_blocks: Mutex<BoundedRootSet>,
    pending_blocks: Mutex<HashMap<H256, Vec<SignedBeaconBlock<C>>>>,
    verify_signatures: bool,
}

impl<C: Config> BeaconChain<C> {
    /// Starts a chain from an anchor (genesis or a trusted checkpoint),
    /// persisting the anchor pair before anything else may reference it.
    pub fn bootstrap(
        store: Arc<Store<C>>,
        anchor_state: BeaconState<C>,
        anchor_block: SignedBeaconBlock<C>,
        slot_clock: SlotClock,
        verify_signatures: bool,
    ) -> Result<Self, ChainError> {
        let anchor_root = store.save_block(&anchor_block)?;
        store.save_state(&anchor_state, anchor_root)?;
        store.save_head_block_root(anchor_root)?;
        if anchor_state.slot == C::genesis_slot() {
            store.save_genesis_block_root(anchor_root)?;
            store.save_archived_point(0, anchor_root)?;
        }

        let fork_choice = ForkChoice::new(anchor_state, &anchor_block);

        Ok(Self {
            store,
            fork_choice: Mutex::new(fork_choice),
            slot_clock,
            events: HeadEventPublisher::new(),
            shuffling_cache: ShufflingCache::default(),
            bad_blocks: Mutex::new(BoundedRootSet::new(BAD_BLOCK_CAPACITY)),
            pending_blocks: Mutex::new(HashMap::new()),
            verify_signatures,
        })
    }

    /// Reopens a chain from the persisted head, using it as the new anchor.
    pub fn resume(
        store: Arc<Store<C>>,
        slot_clock: SlotClock,
        verify_signatures: bool,
    ) -> Result<Self, ChainError> {
        let head_root = store.head_block_root()?.ok_or(ChainError::NoHead)?;
        let head_state = store
            .state(head_root)?
            .ok_or_else(|| StoreError::NotFound {
                what: "state",
                root: head_root,
            })?;
        let head_block = store.block(head_root)?.ok_or_else(|| StoreError::NotFound {
            what: "block",
            root: head_root,
        })?;

        let fork_choice = ForkChoice::new(head_state, &head_block);

        Ok(Self {
            store,
            fork_choice: Mutex::new(fork_choice),
            slot_clock,
            events: HeadEventPublisher::new(),
            shuffling_cache: ShufflingCache::default(),
            bad_blocks: Mutex::new(BoundedRootSet::new(BAD_BLOCK_CAPACITY)),
            pending_blocks: Mutex::new(HashMap::new()),
            verify_signatures,
        })
    }

    pub fn store(&self) -> &Store<C> {
        &self.store
    }

    pub fn subscribe_heads(&self) -> std::sync::mpsc::Receiver<HeadEvent> {
        self.events.subscribe()
    }

    /// Drives the fork-choice clock from the wall clock. Epoch starts may
    /// promote a better justified checkpoint, whose balance state is then
    /// hydrated from the store.
    pub fn on_slot_tick(&self) -> Result<Slot, ChainError> {
        let current_slot = self.slot_clock.current_slot();
        let mut fork_choice = self.fork_choice.lock();
        if fork_choice.current_slot() < current_slot {
            fork_choice.on_slot(current_slot)?;
            self.hydrate_justified(&mut fork_choice)?;
        }
        Ok(current_slot)
    }

    fn hydrate_justified(&self, fork_choice: &mut ForkChoice<C>) -> Result<(), ChainError> {
        let justified = fork_choice.justified_checkpoint();
        if !fork_choice.has_checkpoint_state(justified) {
            if let Some(base_state) = self.store.state(justified.root)? {
                fork_choice.ensure_checkpoint_state(justified, base_state)?;
            }
        }
        Ok(())
    }

    pub fn head(&self) -> Result<H256, ChainError> {
        Ok(self.fork_choice.lock().head()?)
    }

    pub fn head_state(&self) -> Result<BeaconState<C>, ChainError> {
        Ok(self.store.head_state()?)
    }

    pub fn finalized_checkpoint(&self) -> Checkpoint {
        self.fork_choice.lock().finalized_checkpoint()
    }

    /// Full pipeline for one incoming block: clock gate, fork-choice
    /// verification and state transition, persistence, checkpoint and
    /// archived-point bookkeeping, pruning, head update, event publication.
    /// Buffered children of the block are replayed afterwards.
    pub fn receive_block(
        &self,
        signed_block: SignedBeaconBlock<C>,
    ) -> Result<BlockReceipt, ChainError> {
        let block_root = hash_tree_root(&signed_block.message);
        let block_slot = signed_block.message.slot;
        let current_slot = self.slot_clock.current_slot();

        // Nothing is touched for blocks from the future.
        if current_slot < block_slot {
            warn!(
                "rejected block {} at slot {}: ahead of wall clock slot {}",
                block_root, block_slot, current_slot,
            );
            return Err(ChainError::SlotInFuture {
                root: block_root,
                slot: block_slot,
                current_slot,
            });
        }

        if self.bad_blocks.lock().contains(block_root) {
            return Err(ChainError::KnownBadBlock { root: block_root });
        }

        let mut fork_choice = self.fork_choice.lock();
        if fork_choice.current_slot() < current_slot {
            fork_choice.on_slot(current_slot)?;
            self.hydrate_justified(&mut fork_choice)?;
        }

        // Duplicates are acknowledged without reprocessing.
        if fork_choice.contains_block(block_root) {
            let head_block_root = fork_choice.head()?;
            return Ok(BlockReceipt {
                block_root,
                head_block_root,
                finalized_advanced: false,
            });
        }

        let parent_root = signed_block.message.parent_root;
        if !fork_choice.contains_block(parent_root) {
            self.buffer_pending_block(signed_block)?;
            return Err(ChainError::ParentPending {
                root: block_root,
                parent_root,
            });
        }

        let mut finalized_advanced = false;
        self.apply_block(&mut fork_choice, signed_block, &mut finalized_advanced)?;

        // Children that arrived early are applied now, in worklist order.
        let mut replayable = vec![block_root];
        while let Some(parent) = replayable.pop() {
            for child in self.take_pending_children(parent) {
                let child_root = hash_tree_root(&child.message);
                match self.apply_block(&mut fork_choice, child, &mut finalized_advanced) {
                    Ok(()) => replayable.push(child_root),
                    Err(error) => {
                        info!("buffered block {} was rejected: {}", child_root, error);
                    }
                }
            }
        }

        let head_block_root = fork_choice.head()?;
        self.store.save_head_block_root(head_block_root)?;
        drop(fork_choice);

        self.publish_head(head_block_root)?;

        Ok(BlockReceipt {
            block_root,
            head_block_root,
            finalized_advanced,
        })
    }

    /// Verifies, persists, and accounts for a single block while the
    /// fork-choice lock is held.
    fn apply_block(
        &self,
        fork_choice: &mut ForkChoice<C>,
        signed_block: SignedBeaconBlock<C>,
        finalized_advanced: &mut bool,
    ) -> Result<(), ChainError> {
        let block_root = hash_tree_root(&signed_block.message);
        let block_slot = signed_block.message.slot;
        let parent_root = signed_block.message.parent_root;

        let pre_state = self
            .store
            .state(parent_root)?
            .ok_or_else(|| StoreError::NotFound {
                what: "parent state",
                root: parent_root,
            })?;

        let outcome = match fork_choice.on_block(&signed_block, &pre_state, self.verify_signatures)
        {
            Ok(outcome) => outcome,
            Err(error) => {
                if let beacon_fork_choice::Error::StateTransitionFailed(_) = &error {
                    self.bad_blocks.lock().insert(block_root);
                }
                warn!(
                    "rejected block {} at slot {} from proposer {}: {}",
                    block_root, block_slot, signed_block.message.proposer_index, error,
                );
                return Err(error.into());
            }
        };

        self.store.save_block(&signed_block)?;
        self.store.save_state(&outcome.post_state, block_root)?;

        let spacing = self.store.config().slots_per_archived_point;
        if block_slot % spacing == 0 {
            self.store
                .save_archived_point(block_slot / spacing, block_root)?;
        }

        if let Some(justified) = outcome.new_justified {
            if let Some(base_state) = self.store.state(justified.root)? {
                fork_choice.ensure_checkpoint_state(justified, base_state)?;
            }
            self.store.save_justified_checkpoint(justified)?;
        }

        if outcome.finalized_advanced {
            *finalized_advanced = true;
            let new_finalized = fork_choice.finalized_checkpoint();
            self.store.save_finalized_checkpoint(new_finalized)?;
            self.store.prune_finalized(
                new_finalized,
                outcome.previous_finalized,
                &CancelToken::new(),
            )?;
            fork_choice.prune();
            self.bad_blocks.lock().clear();
        }

        Ok(())
    }

    /// Registers an aggregated attestation with the fork choice.
    /// `pre_verified` marks aggregates whose signature the gossip layer
    /// already checked.
    pub fn receive_attestation(
        &self,
        attestation: &IndexedAttestation<C>,
        pre_verified: bool,
    ) -> Result<(), ChainError> {
        let current_slot = self.slot_clock.current_slot();
        let mut fork_choice = self.fork_choice.lock();
        if fork_choice.current_slot() < current_slot {
            fork_choice.on_slot(current_slot)?;
            self.hydrate_justified(&mut fork_choice)?;
        }

        let store = &self.store;
        fork_choice
            .on_attestation(attestation, pre_verified, |root| {
                store.state(root).ok().flatten()
            })
            .map_err(|error| {
                info!(
                    "rejected attestation for slot {} target {}: {}",
                    attestation.data.slot, attestation.data.target.root, error,
                );
                error.into()
            })
    }

    /// The committee serving `(slot, index)` on the head chain, answered
    /// from the shuffled-indices cache.
    pub fn beacon_committee(
        &self,
        slot: Slot,
        index: CommitteeIndex,
    ) -> Result<Vec<ValidatorIndex>, ChainError> {
        let state = self.head_state()?;
        let epoch = compute_epoch_at_slot::<C>(slot);
        let seed = get_seed(&state, epoch, C::domain_beacon_attester())?;

        let shuffling = self.shuffling_cache.get_or_compute(epoch, seed, || {
            let indices = get_active_validator_indices(&state, epoch);
            let count = indices.len() as u64;
            (0..count)
                .map(|position| {
                    let shuffled = compute_shuffled_index::<C>(position, count, seed)?;
                    usize::try_from(shuffled)
                        .map(|shuffled| indices[shuffled])
                        .map_err(|_| helper_functions::Error::IndexOutOfRange)
                })
                .collect()
        })?;

        let committees_per_slot = get_committee_count_at_slot(&state, slot)?;
        let committee_count = committees_per_slot * C::slots_per_epoch();
        let committee_index = (slot % C::slots_per_epoch()) * committees_per_slot + index;

        let length = shuffling.len() as u64;
        let start = usize::try_from(length * committee_index / committee_count)
            .map_err(|_| helper_functions::Error::IndexOutOfRange)?;
        let end = usize::try_from(length * (committee_index + 1) / committee_count)
            .map_err(|_| helper_functions::Error::IndexOutOfRange)?;

        Ok(shuffling[start..end].to_vec())
    }

    fn buffer_pending_block(&self, block: SignedBeaconBlock<C>) -> Result<(), ChainError> {
        let mut pending = self.pending_blocks.lock();
        let buffered: usize = pending.values().map(Vec::len).sum();
        if PENDING_BLOCK_CAPACITY <= buffered {
            return Err(ChainError::Busy);
        }
        pending
            .entry(block.message.parent_root)
            .or_default()
            .push(block);
        Ok(())
    }

    fn take_pending_children(&self, parent_root: H256) -> Vec<SignedBeaconBlock<C>> {
        self.pending_blocks
            .lock()
            .remove(&parent_root)
            .unwrap_or_default()
    }

    fn publish_head(&self, head_block_root: H256) -> Result<(), ChainError> {
        let summary = self
            .store
            .state_summary(head_block_root)?
            .ok_or_else(|| StoreError::NotFound {
                what: "head state summary",
                root: head_block_root,
            })?;
        self.events.publish(HeadEvent {
            slot: summary.slot,
            block_root: head_block_root,
            state_root: summary.state_root,
            finalized_checkpoint: self.fork_choice.lock().finalized_checkpoint(),
        });
        Ok(())
    }
}
