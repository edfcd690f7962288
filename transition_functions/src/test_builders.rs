//! Deterministic fixtures for driving the transition function in tests,
//! with signature checks off. Kept out of `#[cfg(test)]` so downstream
//! crates can reuse them in their own test suites.

use helper_functions::beacon_state_accessors::{
    get_beacon_committee, get_beacon_proposer_index, get_block_root, get_block_root_at_slot,
    get_committee_count_at_slot, get_current_epoch,
};
use helper_functions::crypto::hash_tree_root;
use helper_functions::misc::compute_epoch_at_slot;
use ssz_types::{BitList, VariableList};
use types::config::Config;
use types::consts::FAR_FUTURE_EPOCH;
use types::primitives::{PublicKeyBytes, Slot, UnixSeconds, H256};
use types::types::{
    Attestation, AttestationData, BeaconBlock, BeaconBlockBody, BeaconBlockHeader, Checkpoint,
    Eth1Data, Fork, SignedBeaconBlock, Validator,
};
use types::BeaconState;

use crate::process_slot::{process_slots, state_transition};

/// Distinct, reproducible key bytes per validator. Not valid curve points;
/// only usable where signature verification is disabled.
pub fn deterministic_pubkey(index: u64) -> PublicKeyBytes {
    let mut bytes = [0; 48];
    bytes[..8].copy_from_slice(&index.to_le_bytes());
    bytes[47] = 0xaa;
    PublicKeyBytes::from(bytes)
}

/// A state at slot 0 with `validator_count` active, fully funded validators.
pub fn genesis_state<C: Config>(validator_count: u64, genesis_time: UnixSeconds) -> BeaconState<C> {
    let validators = (0..validator_count)
        .map(|index| Validator {
            pubkey: deterministic_pubkey(index),
            withdrawal_credentials: H256::repeat_byte(0x77),
            effective_balance: C::max_effective_balance(),
            slashed: false,
            activation_eligibility_epoch: 0,
            activation_epoch: 0,
            exit_epoch: FAR_FUTURE_EPOCH,
            withdrawable_epoch: FAR_FUTURE_EPOCH,
        })
        .collect::<Vec<_>>();
    let balances = vec![C::max_effective_balance(); validator_count as usize];

    BeaconState {
        genesis_time,
        fork: Fork {
            previous_version: C::genesis_fork_version(),
            current_version: C::genesis_fork_version(),
            epoch: 0,
        },
        latest_block_header: BeaconBlockHeader {
            body_root: hash_tree_root(&BeaconBlockBody::<C>::default()),
            ..BeaconBlockHeader::default()
        },
        eth1_data: Eth1Data {
            deposit_count: validator_count,
            ..Eth1Data::default()
        },
        eth1_deposit_index: validator_count,
        validators: VariableList::from(validators),
        balances: VariableList::from(balances),
        ..BeaconState::default()
    }
}

/// The block every party can derive independently from the genesis state.
pub fn genesis_block<C: Config>(genesis_state: &BeaconState<C>) -> SignedBeaconBlock<C> {
    SignedBeaconBlock {
        message: BeaconBlock {
            state_root: hash_tree_root(genesis_state),
            ..BeaconBlock::default()
        },
        ..SignedBeaconBlock::default()
    }
}

/// Builds an empty, unsigned block at `slot` on top of `pre_state` and
/// returns it with its post-state. The block is valid under a transition
/// with signature verification off.
pub fn block_at_slot<C: Config>(
    pre_state: &BeaconState<C>,
    slot: Slot,
) -> (SignedBeaconBlock<C>, BeaconState<C>) {
    build_block(pre_state, slot, false)
}

/// Like `block_at_slot`, but the block carries full-participation
/// attestations for the previous slot. Chains of these blocks justify and
/// finalize.
pub fn attested_block_at_slot<C: Config>(
    pre_state: &BeaconState<C>,
    slot: Slot,
) -> (SignedBeaconBlock<C>, BeaconState<C>) {
    build_block(pre_state, slot, true)
}

fn build_block<C: Config>(
    pre_state: &BeaconState<C>,
    slot: Slot,
    attest: bool,
) -> (SignedBeaconBlock<C>, BeaconState<C>) {
    let mut state = pre_state.clone();
    if state.slot < slot {
        process_slots(&mut state, slot).expect("slot is ahead of the pre-state");
    }

    let parent_root = hash_tree_root(&state.latest_block_header);
    let proposer_index =
        get_beacon_proposer_index(&state).expect("the pre-state has active validators");
    let attestations = if attest && slot > 0 {
        attestations_for_slot(&state, slot - 1)
    } else {
        Vec::new()
    };

    let mut signed_block = SignedBeaconBlock {
        message: BeaconBlock {
            slot,
            proposer_index,
            parent_root,
            state_root: H256::ZERO,
            body: BeaconBlockBody {
                // Voting for the state's own eth1 data keeps the deposit
                // pipeline empty.
                eth1_data: state.eth1_data,
                attestations: VariableList::from(attestations),
                ..BeaconBlockBody::default()
            },
        },
        ..SignedBeaconBlock::default()
    };

    let mut post_state = pre_state.clone();
    state_transition(&mut post_state, &signed_block, false, false)
        .expect("a self-built block on its own chain applies cleanly");
    signed_block.message.state_root = hash_tree_root(&post_state);

    (signed_block, post_state)
}

/// Every committee of `attested_slot` voting in full, as seen from a state
/// already advanced past that slot.
pub fn attestations_for_slot<C: Config>(
    state: &BeaconState<C>,
    attested_slot: Slot,
) -> Vec<Attestation<C>> {
    let epoch = compute_epoch_at_slot::<C>(attested_slot);
    let source = if epoch == get_current_epoch(state) {
        state.current_justified_checkpoint
    } else {
        state.previous_justified_checkpoint
    };
    let target = Checkpoint {
        epoch,
        root: get_block_root(state, epoch).expect("the epoch start is in the ring"),
    };
    let beacon_block_root =
        get_block_root_at_slot(state, attested_slot).expect("the slot is in the ring");

    let committee_count = get_committee_count_at_slot(state, attested_slot)
        .expect("committee counts are computable");
    (0..committee_count)
        .map(|index| {
            let committee = get_beacon_committee(state, attested_slot, index)
                .expect("the committee exists");
            let mut aggregation_bits =
                BitList::with_capacity(committee.len()).expect("the committee fits");
            for position in 0..committee.len() {
                aggregation_bits
                    .set(position, true)
                    .expect("the position is in range");
            }
            Attestation {
                aggregation_bits,
                data: AttestationData {
                    slot: attested_slot,
                    index,
                    beacon_block_root,
                    source,
                    target,
                },
                signature: types::primitives::SignatureBytes::empty(),
            }
        })
        .collect()
}

/// `count` empty blocks, one per slot, starting right after the state's
/// slot. Returns the blocks with each block's post-state.
#[allow(clippy::type_complexity)]
pub fn chain_of_blocks<C: Config>(
    genesis: &BeaconState<C>,
    count: u64,
) -> Vec<(SignedBeaconBlock<C>, BeaconState<C>)> {
    chain_with(genesis, count, block_at_slot)
}

/// `count` fully attested blocks, one per slot; the resulting chain
/// justifies and finalizes as it grows.
#[allow(clippy::type_complexity)]
pub fn attested_chain_of_blocks<C: Config>(
    genesis: &BeaconState<C>,
    count: u64,
) -> Vec<(SignedBeaconBlock<C>, BeaconState<C>)> {
    chain_with(genesis, count, attested_block_at_slot)
}

fn chain_with<C: Config>(
    genesis: &BeaconState<C>,
    count: u64,
    builder: fn(&BeaconState<C>, Slot) -> (SignedBeaconBlock<C>, BeaconState<C>),
) -> Vec<(SignedBeaconBlock<C>, BeaconState<C>)> {
    let mut chain = Vec::with_capacity(count as usize);
    let mut state = genesis.clone();
    for offset in 0..count {
        let slot = genesis.slot + offset + 1;
        let (block, post_state) = builder(&state, slot);
        state = post_state.clone();
        chain.push((block, post_state));
    }
    chain
}
