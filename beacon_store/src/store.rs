use core::marker::PhantomData;
use core::num::NonZeroUsize;
use std::collections::HashSet;
use std::path::Path;

use log::{info, warn};
use sled::transaction::ConflictableTransactionError;
use sled::{Db, Transactional as _, Tree};
use ssz_derive::{Decode, Encode};

use helper_functions::crypto::hash_tree_root;
use transition_functions::state_transition;
use types::config::Config;
use types::primitives::{Slot, H256};
use types::types::{Checkpoint, SignedBeaconBlock};
use types::BeaconState;

use crate::caches::{BlockCache, StateCache};
use crate::cancel::CancelToken;
use crate::encoding::{decode_value, encode_value};
use crate::errors::StoreError;
use crate::filter::BlockFilter;
use crate::keys::{
    archived_index_key, slot_range_end, slot_range_start, RootPairKey, SlotRootKey,
    FINALIZED_CHECKPOINT_KEY, GENESIS_BLOCK_ROOT_KEY, HEAD_BLOCK_ROOT_KEY,
    JUSTIFIED_CHECKPOINT_KEY, LAST_ARCHIVED_INDEX_KEY,
};

/// Index entries carry no payload; the key is the datum.
const NO_VALUE: &[u8] = &[];

const BLOCKS_TREE: &str = "blocks";
const STATES_TREE: &str = "states";
const STATE_SUMMARIES_TREE: &str = "state-summaries";
const CHECKPOINTS_TREE: &str = "checkpoints";
const ARCHIVED_POINTS_TREE: &str = "archived-points";
const FINALIZED_BLOCK_ROOTS_TREE: &str = "finalized-block-roots";
const BLOCK_SLOT_INDEX_TREE: &str = "block-slot-index";
const BLOCK_PARENT_INDEX_TREE: &str = "block-parent-index";

/// Slot and post-state root of a block whose full state may be pruned.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Encode, Decode)]
pub struct StateSummary {
    pub slot: Slot,
    pub state_root: H256,
}

/// A link in the canonical finalized chain: parent and child of a root.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Encode, Decode)]
struct FinalizedChainLink {
    parent_root: H256,
    child_root: H256,
}

#[derive(Clone, Copy, Debug)]
pub struct StoreConfig {
    pub slots_per_archived_point: u64,
    pub prune_epoch_boundary_states: bool,
    pub init_sync_cache_state: bool,
    pub block_cache_size: usize,
}

impl StoreConfig {
    pub fn for_chain<C: Config>() -> Self {
        Self {
            slots_per_archived_point: C::default_slots_per_archived_point(),
            prune_epoch_boundary_states: false,
            init_sync_cache_state: false,
            block_cache_size: 64,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PruneSummary {
    pub states_deleted: u64,
    pub blocks_deleted: u64,
}

/// The persistent block/state layer. One logical bucket per tree; every
/// write that touches an indexed bucket updates the indexes in the same
/// transaction.
pub struct Store<C: Config> {
    _db: Db,
    blocks: Tree,
    states: Tree,
    state_summaries: Tree,
    checkpoints: Tree,
    archived_points: Tree,
    finalized_block_roots: Tree,
    block_slot_index: Tree,
    block_parent_index: Tree,
    block_cache: BlockCache<C>,
    init_sync_states: Option<StateCache<C>>,
    config: StoreConfig,
    phantom: PhantomData<C>,
}

impl<C: Config> Store<C> {
    pub fn open(path: &Path, config: StoreConfig) -> Result<Self, StoreError> {
        let db = sled::Config::new().path(path).open()?;
        Self::from_db(db, config)
    }

    /// An in-memory store for tests; nothing survives the handle.
    pub fn temporary(config: StoreConfig) -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db, config)
    }

    fn from_db(db: Db, config: StoreConfig) -> Result<Self, StoreError> {
        let blocks = db.open_tree(BLOCKS_TREE)?;
        let states = db.open_tree(STATES_TREE)?;
        let state_summaries = db.open_tree(STATE_SUMMARIES_TREE)?;
        let checkpoints = db.open_tree(CHECKPOINTS_TREE)?;
        let archived_points = db.open_tree(ARCHIVED_POINTS_TREE)?;
        let finalized_block_roots = db.open_tree(FINALIZED_BLOCK_ROOTS_TREE)?;
        let block_slot_index = db.open_tree(BLOCK_SLOT_INDEX_TREE)?;
        let block_parent_index = db.open_tree(BLOCK_PARENT_INDEX_TREE)?;

        let cache_size = NonZeroUsize::new(config.block_cache_size)
            .unwrap_or_else(|| NonZeroUsize::new(1).expect("one is nonzero"));
        let init_sync_states = if config.init_sync_cache_state {
            Some(StateCache::new())
        } else {
            None
        };

        Ok(Self {
            _db: db,
            blocks,
            states,
            state_summaries,
            checkpoints,
            archived_points,
            finalized_block_roots,
            block_slot_index,
            block_parent_index,
            block_cache: BlockCache::new(cache_size),
            init_sync_states,
            config,
            phantom: PhantomData,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // Blocks.

    pub fn save_block(&self, block: &SignedBeaconBlock<C>) -> Result<H256, StoreError> {
        self.save_blocks(core::slice::from_ref(block))?
            .pop()
            .ok_or(StoreError::TransactionAborted)
    }

    /// Persists blocks and their secondary indexes atomically.
    pub fn save_blocks(
        &self,
        blocks: &[SignedBeaconBlock<C>],
    ) -> Result<Vec<H256>, StoreError> {
        let mut encoded = Vec::with_capacity(blocks.len());
        for block in blocks {
            let root = hash_tree_root(&block.message);
            encoded.push((root, block.message.slot, block.message.parent_root, encode_value(block)?));
        }

        (&self.blocks, &self.block_slot_index, &self.block_parent_index).transaction(
            |(blocks_tree, slot_index, parent_index)| {
                for (root, slot, parent_root, bytes) in &encoded {
                    blocks_tree.insert(root.as_slice(), bytes.as_slice())?;
                    slot_index.insert(SlotRootKey::new(*slot, *root).as_ref(), NO_VALUE)?;
                    parent_index
                        .insert(RootPairKey::new(*parent_root, *root).as_ref(), NO_VALUE)?;
                }
                Ok::<_, ConflictableTransactionError<StoreError>>(())
            },
        )?;

        let mut roots = Vec::with_capacity(blocks.len());
        for ((root, ..), block) in encoded.iter().zip(blocks) {
            self.block_cache.put(*root, block.clone());
            roots.push(*root);
        }
        Ok(roots)
    }

    pub fn block(&self, root: H256) -> Result<Option<SignedBeaconBlock<C>>, StoreError> {
        if let Some(block) = self.block_cache.get(root) {
            return Ok(Some(block));
        }

        match self.blocks.get(root.as_slice())? {
            Some(bytes) => {
                let block: SignedBeaconBlock<C> = decode_value(&bytes)?;
                self.block_cache.put(root, block.clone());
                Ok(Some(block))
            }
            None => Ok(None),
        }
    }

    pub fn contains_block(&self, root: H256) -> Result<bool, StoreError> {
        Ok(self.blocks.contains_key(root.as_slice())?)
    }

    pub fn blocks_by_filter(
        &self,
        filter: &BlockFilter,
    ) -> Result<Vec<SignedBeaconBlock<C>>, StoreError> {
        let mut blocks = Vec::new();
        for root in self.block_roots_by_filter(filter)? {
            let block = self
                .block(root)?
                .ok_or_else(|| StoreError::IndexInconsistency {
                    context: "index entry points at a missing block",
                })?;
            blocks.push(block);
        }
        Ok(blocks)
    }

    /// Runs the slot-index range scan implied by the filter and intersects
    /// the remaining predicates; a pure parent query uses the parent index.
    pub fn block_roots_by_filter(&self, filter: &BlockFilter) -> Result<Vec<H256>, StoreError> {
        if !filter.has_slot_bounds() {
            if let Some(parent_root) = filter.parent_root {
                let mut roots = Vec::new();
                for item in self.block_parent_index.scan_prefix(parent_root.as_slice()) {
                    let (key, _) = item?;
                    let (_, root) = RootPairKey::parse(&key)?;
                    let slot = match self.block(root)? {
                        Some(block) => block.message.slot,
                        None => continue,
                    };
                    if filter.matches::<C>(slot, parent_root) {
                        roots.push(root);
                    }
                }
                return Ok(roots);
            }
        }

        let (start, end) = filter.slot_bounds::<C>();
        let lower = slot_range_start(start).to_vec();
        let items: Box<dyn Iterator<Item = Result<(sled::IVec, sled::IVec), sled::Error>>> =
            match end.and_then(slot_range_end) {
                Some(upper) => Box::new(self.block_slot_index.range(lower..upper.to_vec())),
                None => Box::new(self.block_slot_index.range(lower..)),
            };

        let mut roots = Vec::new();
        for item in items {
            let (key, _) = item?;
            let (slot, root) = SlotRootKey::parse(&key)?;
            let parent_root = match self.block(root)? {
                Some(block) => block.message.parent_root,
                None => {
                    return Err(StoreError::IndexInconsistency {
                        context: "slot index entry points at a missing block",
                    })
                }
            };
            if filter.matches::<C>(slot, parent_root) {
                roots.push(root);
            }
        }
        Ok(roots)
    }

    pub fn blocks_by_slot(&self, slot: Slot) -> Result<Vec<SignedBeaconBlock<C>>, StoreError> {
        self.blocks_by_filter(
            &BlockFilter::new()
                .with_start_slot(slot)
                .with_end_slot(slot),
        )
    }

    // States.

    /// Persists a state under its block root, along with the summary that
    /// survives pruning.
    pub fn save_state(&self, state: &BeaconState<C>, block_root: H256) -> Result<(), StoreError> {
        let summary = StateSummary {
            slot: state.slot,
            state_root: hash_tree_root(state),
        };
        let state_bytes = encode_value(state)?;
        let summary_bytes = encode_value(&summary)?;

        (&self.states, &self.state_summaries).transaction(|(states, summaries)| {
            states.insert(block_root.as_slice(), state_bytes.as_slice())?;
            summaries.insert(block_root.as_slice(), summary_bytes.as_slice())?;
            Ok::<_, ConflictableTransactionError<StoreError>>(())
        })?;

        if let Some(cache) = &self.init_sync_states {
            cache.put(block_root, state.clone());
        }

        Ok(())
    }

    /// The state at `block_root`, rebuilt from the nearest materialized
    /// ancestor when it was pruned.
    pub fn state(&self, block_root: H256) -> Result<Option<BeaconState<C>>, StoreError> {
        self.state_with_cancellation(block_root, &CancelToken::new())
    }

    pub fn state_with_cancellation(
        &self,
        block_root: H256,
        cancel: &CancelToken,
    ) -> Result<Option<BeaconState<C>>, StoreError> {
        if let Some(cache) = &self.init_sync_states {
            if let Some(state) = cache.get(block_root) {
                return Ok(Some(state));
            }
        }

        if let Some(bytes) = self.states.get(block_root.as_slice())? {
            return decode_value(&bytes).map(Some);
        }

        self.regenerate_state(block_root, cancel)
    }

    pub fn contains_state(&self, block_root: H256) -> Result<bool, StoreError> {
        Ok(self.states.contains_key(block_root.as_slice())?)
    }

    pub fn state_summary(&self, block_root: H256) -> Result<Option<StateSummary>, StoreError> {
        match self.state_summaries.get(block_root.as_slice())? {
            Some(bytes) => decode_value(&bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Replays persisted history from the nearest materialized ancestor
    /// state. Signatures and state-root commitments are not re-verified;
    /// every block replayed here was accepted once already. The result is
    /// checked against the stored summary instead.
    fn regenerate_state(
        &self,
        block_root: H256,
        cancel: &CancelToken,
    ) -> Result<Option<BeaconState<C>>, StoreError> {
        let target_summary = match self.state_summary(block_root)? {
            Some(summary) => summary,
            None => return Ok(None),
        };

        let mut replay_chain = Vec::new();
        let mut current = block_root;
        let mut state = loop {
            if let Some(bytes) = self.states.get(current.as_slice())? {
                break decode_value::<BeaconState<C>>(&bytes)?;
            }
            let block = self
                .block(current)?
                .ok_or_else(|| StoreError::block_not_found(current))?;
            current = block.message.parent_root;
            replay_chain.push(block);
        };

        info!(
            "regenerating state at root {} from {} blocks",
            block_root,
            replay_chain.len(),
        );

        for block in replay_chain.iter().rev() {
            if cancel.is_cancelled() {
                return Err(StoreError::Cancelled);
            }
            state_transition(&mut state, block, false, false).map_err(|_| {
                StoreError::IndexInconsistency {
                    context: "persisted history does not replay",
                }
            })?;
        }

        if hash_tree_root(&state) != target_summary.state_root {
            return Err(StoreError::IndexInconsistency {
                context: "regenerated state does not match its summary",
            });
        }

        Ok(Some(state))
    }

    // Checkpoints and fixed keys.

    pub fn save_genesis_block_root(&self, root: H256) -> Result<(), StoreError> {
        self.checkpoints
            .insert(GENESIS_BLOCK_ROOT_KEY, root.as_slice())?;
        Ok(())
    }

    pub fn genesis_block_root(&self) -> Result<Option<H256>, StoreError> {
        self.read_root_key(GENESIS_BLOCK_ROOT_KEY)
    }

    pub fn genesis_state(&self) -> Result<Option<BeaconState<C>>, StoreError> {
        match self.genesis_block_root()? {
            Some(root) => self.state(root),
            None => Ok(None),
        }
    }

    /// Records the head. The head must be resolvable to a state, so a root
    /// without at least a state summary is rejected.
    pub fn save_head_block_root(&self, root: H256) -> Result<(), StoreError> {
        let resolvable =
            self.contains_state(root)? || self.state_summary(root)?.is_some();
        if !resolvable {
            return Err(StoreError::state_not_found(root));
        }
        self.checkpoints
            .insert(HEAD_BLOCK_ROOT_KEY, root.as_slice())?;
        Ok(())
    }

    pub fn head_block_root(&self) -> Result<Option<H256>, StoreError> {
        self.read_root_key(HEAD_BLOCK_ROOT_KEY)
    }

    pub fn head_state(&self) -> Result<BeaconState<C>, StoreError> {
        let root = self
            .head_block_root()?
            .ok_or_else(|| StoreError::state_not_found(H256::ZERO))?;
        self.state(root)?
            .ok_or_else(|| StoreError::state_not_found(root))
    }

    pub fn save_justified_checkpoint(&self, checkpoint: Checkpoint) -> Result<(), StoreError> {
        self.checkpoints
            .insert(JUSTIFIED_CHECKPOINT_KEY, encode_value(&checkpoint)?)?;
        Ok(())
    }

    pub fn justified_checkpoint(&self) -> Result<Option<Checkpoint>, StoreError> {
        self.read_checkpoint_key(JUSTIFIED_CHECKPOINT_KEY)
    }

    /// Records finalization and extends the doubly-linked canonical chain
    /// index up to the new finalized root. The checkpoint's state must be
    /// materialized; it anchors regeneration for everything after it.
    pub fn save_finalized_checkpoint(&self, checkpoint: Checkpoint) -> Result<(), StoreError> {
        if !self.contains_state(checkpoint.root)? {
            return Err(StoreError::state_not_found(checkpoint.root));
        }

        self.index_finalized_chain(checkpoint.root)?;
        self.checkpoints
            .insert(FINALIZED_CHECKPOINT_KEY, encode_value(&checkpoint)?)?;
        Ok(())
    }

    pub fn finalized_checkpoint(&self) -> Result<Option<Checkpoint>, StoreError> {
        self.read_checkpoint_key(FINALIZED_CHECKPOINT_KEY)
    }

    pub fn is_finalized_block(&self, root: H256) -> Result<bool, StoreError> {
        Ok(self.finalized_block_roots.contains_key(root.as_slice())?)
    }

    fn index_finalized_chain(&self, new_finalized_root: H256) -> Result<(), StoreError> {
        let mut links: Vec<(H256, FinalizedChainLink)> = Vec::new();
        let mut child_root = H256::ZERO;
        let mut current = new_finalized_root;

        loop {
            if let Some(bytes) = self.finalized_block_roots.get(current.as_slice())? {
                // Splice onto the already-indexed chain by setting its
                // child pointer.
                let mut link: FinalizedChainLink = decode_value(&bytes)?;
                link.child_root = child_root;
                links.push((current, link));
                break;
            }

            let block = self
                .block(current)?
                .ok_or_else(|| StoreError::block_not_found(current))?;
            let parent_root = block.message.parent_root;
            links.push((
                current,
                FinalizedChainLink {
                    parent_root,
                    child_root,
                },
            ));

            if parent_root == H256::ZERO {
                break;
            }
            child_root = current;
            current = parent_root;
        }

        for (root, link) in links {
            self.finalized_block_roots
                .insert(root.as_slice(), encode_value(&link)?)?;
        }
        Ok(())
    }

    // Archived points.

    pub fn save_archived_point(&self, index: u64, root: H256) -> Result<(), StoreError> {
        if !self.contains_state(root)? {
            return Err(StoreError::state_not_found(root));
        }
        self.archived_points
            .insert(&archived_index_key(index)[..], root.as_slice())?;

        let last = self.last_archived_index()?.unwrap_or(0);
        if last < index {
            self.checkpoints
                .insert(LAST_ARCHIVED_INDEX_KEY, &index.to_be_bytes()[..])?;
        }
        Ok(())
    }

    pub fn archived_point_root(&self, index: u64) -> Result<Option<H256>, StoreError> {
        match self.archived_points.get(&archived_index_key(index)[..])? {
            Some(bytes) if bytes.len() == 32 => Ok(Some(H256::from_slice(&bytes))),
            Some(_) => Err(StoreError::CorruptEncoding {
                context: "archived point root has the wrong length",
            }),
            None => Ok(None),
        }
    }

    pub fn last_archived_index(&self) -> Result<Option<u64>, StoreError> {
        match self.checkpoints.get(LAST_ARCHIVED_INDEX_KEY)? {
            Some(bytes) if bytes.len() == 8 => {
                let mut array = [0; 8];
                array.copy_from_slice(&bytes);
                Ok(Some(u64::from_be_bytes(array)))
            }
            Some(_) => Err(StoreError::CorruptEncoding {
                context: "last archived index has the wrong length",
            }),
            None => Ok(None),
        }
    }

    // Pruning.

    /// Reclaims states between the old and new finalized epochs.
    ///
    /// Canonical states survive at archived-point boundaries (and at epoch
    /// boundaries unless eager pruning is on); the genesis state, the new
    /// finalized state, and the head state always survive. Non-canonical
    /// blocks in the range are dropped along with their states.
    pub fn prune_finalized(
        &self,
        new_finalized: Checkpoint,
        old_finalized: Checkpoint,
        cancel: &CancelToken,
    ) -> Result<PruneSummary, StoreError> {
        let start = (old_finalized.epoch + 1) * C::slots_per_epoch();
        let end = (new_finalized.epoch + 1) * C::slots_per_epoch();
        if end <= start {
            return Ok(PruneSummary::default());
        }

        let ancestors = self.canonical_roots_down_to(new_finalized.root, start)?;
        let finalized_block_slot = self
            .block(new_finalized.root)?
            .ok_or_else(|| StoreError::block_not_found(new_finalized.root))?
            .message
            .slot;
        let head_root = self.head_block_root()?;
        let genesis_root = self.genesis_block_root()?;

        // The index entries are collected up front so deletions below do not
        // interact with the scan.
        let mut in_range = Vec::new();
        let lower = slot_range_start(start).to_vec();
        let upper = slot_range_start(end).to_vec();
        for item in self.block_slot_index.range(lower..upper) {
            let (key, _) = item?;
            in_range.push(SlotRootKey::parse(&key)?);
        }

        let mut summary = PruneSummary::default();
        for (slot, root) in in_range {
            if cancel.is_cancelled() {
                return Err(StoreError::Cancelled);
            }

            // The canonical chain through the range: ancestors of the new
            // finalized root plus the blocks built on top of it.
            let is_canonical = ancestors.contains(&root)
                || (finalized_block_slot < slot
                    && self.descends_from(root, new_finalized.root, finalized_block_slot)?);

            let pinned = Some(root) == head_root
                || Some(root) == genesis_root
                || root == new_finalized.root;
            let archived_boundary = slot % self.config.slots_per_archived_point == 0;
            let epoch_boundary = slot % C::slots_per_epoch() == 0;
            let keep_state = pinned
                || (is_canonical && archived_boundary)
                || (is_canonical && epoch_boundary && !self.config.prune_epoch_boundary_states);

            // A fork block that landed on an archived boundary may have
            // claimed the index entry; finalization settles it on the
            // canonical root.
            if is_canonical && archived_boundary {
                self.archived_points.insert(
                    &archived_index_key(slot / self.config.slots_per_archived_point)[..],
                    root.as_slice(),
                )?;
            }

            if !keep_state && self.contains_state(root)? {
                self.states.remove(root.as_slice())?;
                summary.states_deleted += 1;
                if let Some(cache) = &self.init_sync_states {
                    cache.remove(root);
                }
            }

            if !is_canonical && !pinned {
                // Orphaned fork: the block goes too, with its summary and
                // both index entries.
                let parent_root = match self.block(root)? {
                    Some(block) => block.message.parent_root,
                    None => continue,
                };
                (
                    &self.blocks,
                    &self.block_slot_index,
                    &self.block_parent_index,
                    &self.state_summaries,
                )
                    .transaction(
                        |(blocks_tree, slot_index, parent_index, summaries)| {
                            blocks_tree.remove(root.as_slice())?;
                            slot_index.remove(SlotRootKey::new(slot, root).as_ref())?;
                            parent_index
                                .remove(RootPairKey::new(parent_root, root).as_ref())?;
                            summaries.remove(root.as_slice())?;
                            Ok::<_, ConflictableTransactionError<StoreError>>(())
                        },
                    )?;
                self.block_cache.remove(root);
                summary.blocks_deleted += 1;
            }
        }

        info!(
            "pruned {} states and {} blocks below finalized epoch {}",
            summary.states_deleted, summary.blocks_deleted, new_finalized.epoch,
        );
        Ok(summary)
    }

    fn descends_from(
        &self,
        root: H256,
        ancestor_root: H256,
        ancestor_slot: Slot,
    ) -> Result<bool, StoreError> {
        let mut current = root;
        loop {
            if current == ancestor_root {
                return Ok(true);
            }
            let block = match self.block(current)? {
                Some(block) => block,
                None => return Ok(false),
            };
            if block.message.slot <= ancestor_slot {
                return Ok(false);
            }
            current = block.message.parent_root;
        }
    }

    fn canonical_roots_down_to(
        &self,
        from_root: H256,
        stop_slot: Slot,
    ) -> Result<HashSet<H256>, StoreError> {
        let mut canonical = HashSet::new();
        let mut current = from_root;
        loop {
            let block = match self.block(current)? {
                Some(block) => block,
                None => break,
            };
            canonical.insert(current);
            if block.message.slot <= stop_slot || block.message.parent_root == H256::ZERO {
                break;
            }
            current = block.message.parent_root;
        }
        Ok(canonical)
    }

    // Index maintenance.

    /// Crash-recovery self-check: drops index entries whose primary record
    /// is gone. Returns the number of entries dropped.
    pub fn check_indexes(&self) -> Result<u64, StoreError> {
        let mut orphaned_slot_keys = Vec::new();
        for item in self.block_slot_index.iter() {
            let (key, _) = item?;
            let (_, root) = SlotRootKey::parse(&key)?;
            if !self.contains_block(root)? {
                orphaned_slot_keys.push(key);
            }
        }

        let mut orphaned_parent_keys = Vec::new();
        for item in self.block_parent_index.iter() {
            let (key, _) = item?;
            let (_, root) = RootPairKey::parse(&key)?;
            if !self.contains_block(root)? {
                orphaned_parent_keys.push(key);
            }
        }

        let dropped = (orphaned_slot_keys.len() + orphaned_parent_keys.len()) as u64;
        for key in orphaned_slot_keys {
            self.block_slot_index.remove(key)?;
        }
        for key in orphaned_parent_keys {
            self.block_parent_index.remove(key)?;
        }

        if dropped > 0 {
            warn!("dropped {} orphaned block index entries", dropped);
        }
        Ok(dropped)
    }

    /// Rebuilds both block indexes from the primary bucket, the recovery
    /// path for a detected inconsistency.
    pub fn rebuild_block_indexes(&self) -> Result<(), StoreError> {
        self.block_slot_index.clear()?;
        self.block_parent_index.clear()?;

        for item in self.blocks.iter() {
            let (key, bytes) = item?;
            if key.len() != 32 {
                return Err(StoreError::CorruptEncoding {
                    context: "block key has the wrong length",
                });
            }
            let root = H256::from_slice(&key);
            let block: SignedBeaconBlock<C> = decode_value(&bytes)?;
            self.block_slot_index
                .insert(SlotRootKey::new(block.message.slot, root).as_ref(), NO_VALUE)?;
            self.block_parent_index.insert(
                RootPairKey::new(block.message.parent_root, root).as_ref(),
                NO_VALUE,
            )?;
        }
        Ok(())
    }

    fn read_root_key(&self, key: &[u8]) -> Result<Option<H256>, StoreError> {
        match self.checkpoints.get(key)? {
            Some(bytes) if bytes.len() == 32 => Ok(Some(H256::from_slice(&bytes))),
            Some(_) => Err(StoreError::CorruptEncoding {
                context: "stored root has the wrong length",
            }),
            None => Ok(None),
        }
    }

    fn read_checkpoint_key(&self, key: &[u8]) -> Result<Option<Checkpoint>, StoreError> {
        match self.checkpoints.get(key)? {
            Some(bytes) => decode_value(&bytes).map(Some),
            None => Ok(None),
        }
    }
}
