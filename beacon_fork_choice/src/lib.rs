//! Latest-message-driven GHOST over block summaries.
//!
//! The engine never owns full blocks or historical states; it keeps one
//! summary per accepted block and a state per checkpoint it weighs balances
//! at. Full data lives in the persistent store, and the chain service feeds
//! pre-states in and post-states out.

use std::collections::HashMap;

use log::info;
use maplit::hashmap;
use thiserror::Error as ThisError;

use helper_functions::beacon_state_accessors::{
    get_active_validator_indices, get_current_epoch,
};
use helper_functions::crypto::hash_tree_root;
use helper_functions::misc::{compute_epoch_at_slot, compute_start_slot_at_epoch};
use helper_functions::predicates::validate_indexed_attestation;
use transition_functions::{process_slots, state_transition};
use types::config::Config;
use types::primitives::{Epoch, Gwei, Slot, ValidatorIndex, H256};
use types::types::{Checkpoint, IndexedAttestation, SignedBeaconBlock};
use types::BeaconState;

#[derive(Clone, PartialEq, Eq, Debug, ThisError)]
pub enum Error {
    #[error("slot {new_slot} is not later than the current slot {old_slot}")]
    SlotNotAdvancing { old_slot: Slot, new_slot: Slot },
    #[error("parent {parent_root} of block {block_root} is not known")]
    UnknownParent { block_root: H256, parent_root: H256 },
    #[error("block {block_root} at slot {block_slot} is ahead of the clock slot {current_slot}")]
    SlotInFuture {
        block_root: H256,
        block_slot: Slot,
        current_slot: Slot,
    },
    #[error("block {block_root} does not descend from the finalized checkpoint")]
    NotDescendantOfFinalized { block_root: H256 },
    #[error("state transition rejected the block: {0}")]
    StateTransitionFailed(#[from] transition_functions::Error),
    #[error("attestation target {root} is not a known block")]
    UnknownTarget { root: H256 },
    #[error("attestation target epoch {epoch} is outside the accepted window")]
    EpochOutOfRange { epoch: Epoch },
    #[error("attestation is invalid: {0}")]
    InvalidAttestation(helper_functions::Error),
    #[error("no state is cached for checkpoint at epoch {epoch}")]
    MissingCheckpointState { epoch: Epoch },
}

/// Everything the engine needs to remember about an accepted block.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BlockSummary {
    pub slot: Slot,
    pub parent_root: H256,
    pub justified_checkpoint: Checkpoint,
    pub finalized_checkpoint: Checkpoint,
}

/// The highest-epoch target a validator has attested to.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct LatestVote {
    pub root: H256,
    pub epoch: Epoch,
}

/// What `on_block` tells the chain service to do next.
pub struct BlockOutcome<C: Config> {
    pub block_root: H256,
    pub post_state: BeaconState<C>,
    /// A checkpoint that became justified and needs its state hydrated
    /// through `ensure_checkpoint_state`.
    pub new_justified: Option<Checkpoint>,
    pub finalized_advanced: bool,
    pub previous_finalized: Checkpoint,
}

pub struct ForkChoice<C: Config> {
    slot: Slot,
    justified_checkpoint: Checkpoint,
    finalized_checkpoint: Checkpoint,
    best_justified_checkpoint: Checkpoint,
    blocks: HashMap<H256, BlockSummary>,
    latest_votes: HashMap<ValidatorIndex, LatestVote>,
    checkpoint_states: HashMap<Checkpoint, BeaconState<C>>,
}

impl<C: Config> ForkChoice<C> {
    pub fn new(anchor_state: BeaconState<C>, anchor_block: &SignedBeaconBlock<C>) -> Self {
        let root = hash_tree_root(&anchor_block.message);
        let checkpoint = Checkpoint {
            epoch: get_current_epoch(&anchor_state),
            root,
        };
        let summary = BlockSummary {
            slot: anchor_state.slot,
            parent_root: anchor_block.message.parent_root,
            justified_checkpoint: checkpoint,
            finalized_checkpoint: checkpoint,
        };

        Self {
            slot: anchor_state.slot,
            justified_checkpoint: checkpoint,
            finalized_checkpoint: checkpoint,
            best_justified_checkpoint: checkpoint,
            blocks: hashmap! {root => summary},
            latest_votes: hashmap! {},
            checkpoint_states: hashmap! {checkpoint => anchor_state},
        }
    }

    pub fn current_slot(&self) -> Slot {
        self.slot
    }

    pub fn justified_checkpoint(&self) -> Checkpoint {
        self.justified_checkpoint
    }

    pub fn finalized_checkpoint(&self) -> Checkpoint {
        self.finalized_checkpoint
    }

    pub fn contains_block(&self, root: H256) -> bool {
        self.blocks.contains_key(&root)
    }

    pub fn block_summary(&self, root: H256) -> Option<BlockSummary> {
        self.blocks.get(&root).copied()
    }

    pub fn latest_vote(&self, validator: ValidatorIndex) -> Option<LatestVote> {
        self.latest_votes.get(&validator).copied()
    }

    pub fn has_checkpoint_state(&self, checkpoint: Checkpoint) -> bool {
        self.checkpoint_states.contains_key(&checkpoint)
    }

    /// Moves the clock. At epoch starts a better justified checkpoint seen
    /// out of band is promoted.
    pub fn on_slot(&mut self, slot: Slot) -> Result<(), Error> {
        if slot <= self.slot {
            return Err(Error::SlotNotAdvancing {
                old_slot: self.slot,
                new_slot: slot,
            });
        }
        self.slot = slot;

        let epoch_start = self.slot == compute_start_slot_at_epoch::<C>(self.epoch_at_clock());
        if epoch_start && self.justified_checkpoint.epoch < self.best_justified_checkpoint.epoch {
            self.justified_checkpoint = self.best_justified_checkpoint;
        }

        Ok(())
    }

    /// Verifies and applies one block. On any error the engine is left
    /// exactly as it was; on success the summary is inserted and the
    /// checkpoints are rolled forward.
    pub fn on_block(
        &mut self,
        signed_block: &SignedBeaconBlock<C>,
        pre_state: &BeaconState<C>,
        verify_signatures: bool,
    ) -> Result<BlockOutcome<C>, Error> {
        let block = &signed_block.message;
        let block_root = hash_tree_root(block);

        if !self.blocks.contains_key(&block.parent_root) {
            return Err(Error::UnknownParent {
                block_root,
                parent_root: block.parent_root,
            });
        }

        if self.slot < block.slot {
            return Err(Error::SlotInFuture {
                block_root,
                block_slot: block.slot,
                current_slot: self.slot,
            });
        }

        let finalized_slot = compute_start_slot_at_epoch::<C>(self.finalized_checkpoint.epoch);
        let descends = self.ancestor(block.parent_root, finalized_slot)
            == Some(self.finalized_checkpoint.root);
        if !descends {
            return Err(Error::NotDescendantOfFinalized { block_root });
        }

        let mut state = pre_state.clone();
        state_transition(&mut state, signed_block, true, verify_signatures)?;

        self.blocks.insert(
            block_root,
            BlockSummary {
                slot: block.slot,
                parent_root: block.parent_root,
                justified_checkpoint: state.current_justified_checkpoint,
                finalized_checkpoint: state.finalized_checkpoint,
            },
        );

        let mut new_justified = None;

        if self.justified_checkpoint.epoch < state.current_justified_checkpoint.epoch {
            if self.best_justified_checkpoint.epoch < state.current_justified_checkpoint.epoch {
                self.best_justified_checkpoint = state.current_justified_checkpoint;
            }
            let justified_slot =
                compute_start_slot_at_epoch::<C>(self.justified_checkpoint.epoch);
            if self.ancestor(block_root, justified_slot) == Some(self.justified_checkpoint.root) {
                self.justified_checkpoint = state.current_justified_checkpoint;
                new_justified = Some(self.justified_checkpoint);
            }
        }

        let previous_finalized = self.finalized_checkpoint;
        let mut finalized_advanced = false;
        if self.finalized_checkpoint.epoch < state.finalized_checkpoint.epoch {
            self.finalized_checkpoint = state.finalized_checkpoint;
            finalized_advanced = true;
            info!(
                "finalized checkpoint advanced to epoch {} root {}",
                self.finalized_checkpoint.epoch, self.finalized_checkpoint.root,
            );

            let finalized_slot =
                compute_start_slot_at_epoch::<C>(self.finalized_checkpoint.epoch);
            let justified_on_chain = self.ancestor(self.justified_checkpoint.root, finalized_slot)
                == Some(self.finalized_checkpoint.root);
            if self.justified_checkpoint.epoch < state.current_justified_checkpoint.epoch
                || !justified_on_chain
            {
                self.justified_checkpoint = state.current_justified_checkpoint;
                new_justified = Some(self.justified_checkpoint);
            }
        }

        Ok(BlockOutcome {
            block_root,
            post_state: state,
            new_justified,
            finalized_advanced,
            previous_finalized,
        })
    }

    /// Applies an aggregated attestation to the latest-vote table.
    ///
    /// `load_target_state` supplies the post-state of the target block when
    /// the checkpoint state is not cached yet; it is only invoked on a miss.
    /// `pre_verified` marks aggregates whose signature the gossip layer
    /// already checked.
    pub fn on_attestation<F>(
        &mut self,
        attestation: &IndexedAttestation<C>,
        pre_verified: bool,
        load_target_state: F,
    ) -> Result<(), Error>
    where
        F: FnOnce(H256) -> Option<BeaconState<C>>,
    {
        let target = attestation.data.target;

        if !self.blocks.contains_key(&target.root) {
            return Err(Error::UnknownTarget { root: target.root });
        }

        let current_epoch = self.epoch_at_clock();
        let previous_epoch = current_epoch.saturating_sub(1);
        if target.epoch < previous_epoch || current_epoch < target.epoch {
            return Err(Error::EpochOutOfRange {
                epoch: target.epoch,
            });
        }
        if target.epoch != compute_epoch_at_slot::<C>(attestation.data.slot) {
            return Err(Error::EpochOutOfRange {
                epoch: target.epoch,
            });
        }

        if !self.checkpoint_states.contains_key(&target) {
            let base_state = load_target_state(target.root)
                .ok_or(Error::MissingCheckpointState {
                    epoch: target.epoch,
                })?;
            self.ensure_checkpoint_state(target, base_state)?;
        }
        let target_state = &self.checkpoint_states[&target];

        validate_indexed_attestation(target_state, attestation, !pre_verified)
            .map_err(Error::InvalidAttestation)?;

        // Strictly-greater epochs replace; an equal epoch never overwrites.
        let new_vote = LatestVote {
            root: target.root,
            epoch: target.epoch,
        };
        for index in attestation.attesting_indices.iter().copied() {
            self.latest_votes
                .entry(index)
                .and_modify(|old_vote| {
                    if old_vote.epoch < new_vote.epoch {
                        *old_vote = new_vote;
                    }
                })
                .or_insert(new_vote);
        }

        Ok(())
    }

    /// Caches the balance source for a checkpoint: the target block's state
    /// advanced to the checkpoint epoch's start slot.
    pub fn ensure_checkpoint_state(
        &mut self,
        checkpoint: Checkpoint,
        base_state: BeaconState<C>,
    ) -> Result<(), Error> {
        if self.checkpoint_states.contains_key(&checkpoint) {
            return Ok(());
        }

        let mut state = base_state;
        let checkpoint_slot = compute_start_slot_at_epoch::<C>(checkpoint.epoch);
        if state.slot < checkpoint_slot {
            process_slots(&mut state, checkpoint_slot)?;
        }
        self.checkpoint_states.insert(checkpoint, state);

        Ok(())
    }

    /// Greedy heaviest-subtree walk from the justified root.
    pub fn head(&self) -> Result<H256, Error> {
        let justified_state = self
            .checkpoint_states
            .get(&self.justified_checkpoint)
            .ok_or(Error::MissingCheckpointState {
                epoch: self.justified_checkpoint.epoch,
            })?;
        let active_indices = get_active_validator_indices(
            justified_state,
            get_current_epoch(justified_state),
        );
        let justified_slot = compute_start_slot_at_epoch::<C>(self.justified_checkpoint.epoch);

        let mut head = self.justified_checkpoint.root;
        loop {
            // Ties break by root, compared as big-endian byte strings, the
            // lexicographically greater root winning.
            let child_with_plurality = self
                .blocks
                .iter()
                .filter(|(root, summary)| {
                    summary.parent_root == head
                        && justified_slot < summary.slot
                        && self.ancestor(**root, justified_slot)
                            == Some(self.justified_checkpoint.root)
                })
                .map(|(root, summary)| {
                    let balance = self.latest_attesting_balance(
                        *root,
                        summary.slot,
                        justified_state,
                        &active_indices,
                    );
                    (balance, *root)
                })
                .max();

            match child_with_plurality {
                Some((_, root)) => head = root,
                None => break Ok(head),
            }
        }
    }

    /// Stake behind `root`: effective balances of active validators whose
    /// latest vote has `root` as an ancestor.
    fn latest_attesting_balance(
        &self,
        root: H256,
        block_slot: Slot,
        justified_state: &BeaconState<C>,
        active_indices: &[ValidatorIndex],
    ) -> Gwei {
        active_indices
            .iter()
            .copied()
            .filter_map(|index| {
                let vote = self.latest_votes.get(&index)?;
                if self.ancestor(vote.root, block_slot) == Some(root) {
                    justified_state
                        .validators
                        .get(index as usize)
                        .map(|validator| validator.effective_balance)
                } else {
                    None
                }
            })
            .sum()
    }

    /// The chain-of-`root` block at `slot` or below, or `None` when the
    /// walk leaves the known tree first.
    pub fn ancestor(&self, root: H256, slot: Slot) -> Option<H256> {
        let mut current = root;
        loop {
            let summary = self.blocks.get(&current)?;
            if summary.slot <= slot {
                return Some(current);
            }
            current = summary.parent_root;
        }
    }

    /// Drops summaries and checkpoint states that finalization made
    /// unreachable. Votes are kept; they refresh themselves every epoch.
    pub fn prune(&mut self) {
        let finalized_slot = compute_start_slot_at_epoch::<C>(self.finalized_checkpoint.epoch);
        let finalized_root = self.finalized_checkpoint.root;
        self.blocks
            .retain(|root, summary| *root == finalized_root || finalized_slot <= summary.slot);

        let justified = self.justified_checkpoint;
        let finalized = self.finalized_checkpoint;
        let best_justified = self.best_justified_checkpoint;
        self.checkpoint_states.retain(|checkpoint, _| {
            *checkpoint == justified
                || *checkpoint == finalized
                || *checkpoint == best_justified
                || finalized.epoch <= checkpoint.epoch
        });
    }

    fn epoch_at_clock(&self) -> Epoch {
        compute_epoch_at_slot::<C>(self.slot)
    }
}

#[cfg(test)]
mod tests {
    use maplit::hashmap;
    use ssz_types::VariableList;
    use transition_functions::test_builders::{genesis_block, genesis_state};
    use types::config::MinimalConfig;
    use types::types::Validator;

    use super::*;

    type C = MinimalConfig;

    fn checkpoint(epoch: Epoch, root: H256) -> Checkpoint {
        Checkpoint { epoch, root }
    }

    fn summary(slot: Slot, parent_root: H256, checkpoint: Checkpoint) -> BlockSummary {
        BlockSummary {
            slot,
            parent_root,
            justified_checkpoint: checkpoint,
            finalized_checkpoint: checkpoint,
        }
    }

    /// One-gwei validators make vote counts read directly as balances.
    fn unit_balance_state(count: usize) -> BeaconState<C> {
        let validators = (0..count)
            .map(|_| Validator {
                effective_balance: 1,
                activation_epoch: 0,
                exit_epoch: types::consts::FAR_FUTURE_EPOCH,
                ..Validator::default()
            })
            .collect::<Vec<_>>();
        BeaconState {
            validators: VariableList::from(validators),
            balances: VariableList::from(vec![1; count]),
            ..BeaconState::default()
        }
    }

    const B0: H256 = H256::repeat_byte(0x10);
    const B1: H256 = H256::repeat_byte(0x01);
    const B3: H256 = H256::repeat_byte(0x03);
    const B4: H256 = H256::repeat_byte(0x04);
    const B5: H256 = H256::repeat_byte(0x05);
    const B6: H256 = H256::repeat_byte(0x06);
    const B7: H256 = H256::repeat_byte(0x07);
    const B8: H256 = H256::repeat_byte(0x08);

    /// The two-fork tree: B0 - B1, and B0 - B3 - B4 splitting into
    /// B5 - B7 and B6 - B8.
    fn fork_tree_engine() -> ForkChoice<C> {
        let anchor = checkpoint(0, B0);
        let blocks = hashmap! {
            B0 => summary(0, H256::ZERO, anchor),
            B1 => summary(1, B0, anchor),
            B3 => summary(1, B0, anchor),
            B4 => summary(2, B3, anchor),
            B5 => summary(3, B4, anchor),
            B7 => summary(4, B5, anchor),
            B6 => summary(3, B4, anchor),
            B8 => summary(4, B6, anchor),
        };

        ForkChoice {
            slot: 5,
            justified_checkpoint: anchor,
            finalized_checkpoint: anchor,
            best_justified_checkpoint: anchor,
            blocks,
            latest_votes: hashmap! {},
            checkpoint_states: hashmap! {anchor => unit_balance_state(100)},
        }
    }

    fn cast_votes(engine: &mut ForkChoice<C>, range: core::ops::Range<u64>, root: H256) {
        for validator in range {
            engine
                .latest_votes
                .insert(validator, LatestVote { root, epoch: 0 });
        }
    }

    #[test]
    fn head_follows_the_heaviest_subtree() {
        let mut engine = fork_tree_engine();
        cast_votes(&mut engine, 0..33, B1);
        cast_votes(&mut engine, 33..66, B7);
        cast_votes(&mut engine, 66..100, B8);

        assert_eq!(engine.head(), Ok(B8));
    }

    #[test]
    fn equal_weights_break_toward_the_greater_root() {
        let mut engine = fork_tree_engine();
        cast_votes(&mut engine, 0..33, B1);
        cast_votes(&mut engine, 33..66, B7);
        // Validator 99 abstains: the B5 and B6 subtrees weigh 33 each, and
        // 0x06... > 0x05... sends the walk down the B6 side.
        cast_votes(&mut engine, 66..99, B8);

        assert_eq!(engine.head(), Ok(B8));
    }

    #[test]
    fn moving_one_vote_flips_the_fork() {
        let mut engine = fork_tree_engine();
        cast_votes(&mut engine, 0..33, B1);
        cast_votes(&mut engine, 33..66, B7);
        cast_votes(&mut engine, 66..100, B8);
        // One defection from B8 to B7 gives B5's subtree 34 against 33.
        engine
            .latest_votes
            .insert(66, LatestVote { root: B7, epoch: 0 });

        assert_eq!(engine.head(), Ok(B7));
    }

    #[test]
    fn zero_weight_children_resolve_by_root() {
        let engine = fork_tree_engine();
        assert_eq!(engine.head(), Ok(B8));
    }

    #[test]
    fn ancestor_walks_to_the_requested_slot() {
        let engine = fork_tree_engine();
        assert_eq!(engine.ancestor(B8, 3), Some(B6));
        assert_eq!(engine.ancestor(B8, 2), Some(B4));
        assert_eq!(engine.ancestor(B8, 0), Some(B0));
        assert_eq!(engine.ancestor(B1, 1), Some(B1));
        // Walking below the anchor leaves the tree.
        assert_eq!(engine.ancestor(H256::repeat_byte(0xee), 0), None);
    }

    #[test]
    fn on_attestation_enforces_vote_monotonicity() {
        let state = genesis_state::<C>(8, 0);
        let anchor = genesis_block(&state);
        let anchor_root = hash_tree_root(&anchor.message);
        let mut engine = ForkChoice::new(state.clone(), &anchor);
        engine.on_slot(1).expect("slot 1 is later");

        let attestation = IndexedAttestation::<C> {
            attesting_indices: VariableList::from(vec![2]),
            data: types::types::AttestationData {
                slot: 0,
                index: 0,
                beacon_block_root: anchor_root,
                source: checkpoint(0, anchor_root),
                target: checkpoint(0, anchor_root),
            },
            ..IndexedAttestation::default()
        };

        engine
            .on_attestation(&attestation, true, |_| None)
            .expect("the target checkpoint state is cached");
        assert_eq!(
            engine.latest_vote(2),
            Some(LatestVote {
                root: anchor_root,
                epoch: 0,
            }),
        );

        // The same epoch again must not overwrite.
        engine
            .on_attestation(&attestation, true, |_| None)
            .expect("replay is structurally valid");
        assert_eq!(
            engine.latest_vote(2),
            Some(LatestVote {
                root: anchor_root,
                epoch: 0,
            }),
        );

        // A strictly higher target epoch replaces the vote.
        engine
            .on_slot(C::slots_per_epoch())
            .expect("the clock moved forward");
        let later = IndexedAttestation::<C> {
            attesting_indices: VariableList::from(vec![2]),
            data: types::types::AttestationData {
                slot: C::slots_per_epoch(),
                index: 0,
                beacon_block_root: anchor_root,
                source: checkpoint(0, anchor_root),
                target: checkpoint(1, anchor_root),
            },
            ..IndexedAttestation::default()
        };
        engine
            .on_attestation(&later, true, |_| Some(state.clone()))
            .expect("the loader supplies the target state");
        assert_eq!(
            engine.latest_vote(2),
            Some(LatestVote {
                root: anchor_root,
                epoch: 1,
            }),
        );
    }

    #[test]
    fn on_attestation_rejects_unknown_targets() {
        let state = genesis_state::<C>(8, 0);
        let anchor = genesis_block(&state);
        let mut engine = ForkChoice::new(state, &anchor);

        let attestation = IndexedAttestation::<C> {
            attesting_indices: VariableList::from(vec![1]),
            data: types::types::AttestationData {
                target: checkpoint(0, H256::repeat_byte(0xdd)),
                ..types::types::AttestationData::default()
            },
            ..IndexedAttestation::default()
        };

        assert_eq!(
            engine.on_attestation(&attestation, true, |_| None),
            Err(Error::UnknownTarget {
                root: H256::repeat_byte(0xdd),
            }),
        );
    }

    #[test]
    fn on_attestation_rejects_stale_epochs() {
        let state = genesis_state::<C>(8, 0);
        let anchor = genesis_block(&state);
        let anchor_root = hash_tree_root(&anchor.message);
        let mut engine = ForkChoice::new(state, &anchor);
        engine
            .on_slot(C::slots_per_epoch() * 3)
            .expect("the clock moved forward");

        let attestation = IndexedAttestation::<C> {
            attesting_indices: VariableList::from(vec![1]),
            data: types::types::AttestationData {
                target: checkpoint(0, anchor_root),
                ..types::types::AttestationData::default()
            },
            ..IndexedAttestation::default()
        };

        assert_eq!(
            engine.on_attestation(&attestation, true, |_| None),
            Err(Error::EpochOutOfRange { epoch: 0 }),
        );
    }

    #[test]
    fn on_block_accepts_a_child_of_the_anchor() {
        let state = genesis_state::<C>(8, 0);
        let anchor = genesis_block(&state);
        let mut engine = ForkChoice::new(state.clone(), &anchor);
        engine.on_slot(1).expect("slot 1 is later");

        let (block, _) = transition_functions::test_builders::block_at_slot(&state, 1);
        let outcome = engine
            .on_block(&block, &state, false)
            .expect("the block is valid");

        assert!(engine.contains_block(outcome.block_root));
        assert_eq!(outcome.post_state.slot, 1);
        assert!(!outcome.finalized_advanced);
    }

    #[test]
    fn on_block_rejects_unknown_parents() {
        let state = genesis_state::<C>(8, 0);
        let anchor = genesis_block(&state);
        let mut engine = ForkChoice::new(state.clone(), &anchor);
        engine.on_slot(1).expect("slot 1 is later");

        let (mut block, _) = transition_functions::test_builders::block_at_slot(&state, 1);
        block.message.parent_root = H256::repeat_byte(0xcc);

        let result = engine.on_block(&block, &state, false);
        assert!(matches!(result, Err(Error::UnknownParent { .. })));
        assert!(!engine.contains_block(hash_tree_root(&block.message)));
    }

    #[test]
    fn on_block_rejects_blocks_from_the_future() {
        let state = genesis_state::<C>(8, 0);
        let anchor = genesis_block(&state);
        let mut engine = ForkChoice::new(state.clone(), &anchor);

        let (block, _) = transition_functions::test_builders::block_at_slot(&state, 1);
        let result = engine.on_block(&block, &state, false);
        assert!(matches!(result, Err(Error::SlotInFuture { .. })));
    }

    #[test]
    fn pruning_drops_stale_forks() {
        let mut engine = fork_tree_engine();
        engine.finalized_checkpoint = checkpoint(0, B0);
        // Finalize within epoch 0: nothing is below the epoch start.
        engine.prune();
        assert!(engine.contains_block(B1));

        // A later finalized checkpoint sweeps out everything before it.
        engine.finalized_checkpoint = checkpoint(1, B8);
        engine.prune();
        assert!(engine.contains_block(B8));
        assert!(!engine.contains_block(B1));
        assert!(!engine.contains_block(B4));
    }
}
