use core::convert::TryFrom;

use helper_functions::beacon_state_accessors::get_domain;
use helper_functions::crypto::{bls_verify, hash_tree_root};
use helper_functions::misc::compute_signing_root;
use types::config::Config;
use types::primitives::{Slot, H256};
use types::types::SignedBeaconBlock;
use types::BeaconState;

use crate::blocks::block_processing::process_block;
use crate::epochs::process_epoch::process_epoch;
use crate::error::Error;

/// Advances the state slot by slot up to `slot`, running epoch processing at
/// every epoch boundary crossed on the way.
pub fn process_slots<C: Config>(state: &mut BeaconState<C>, slot: Slot) -> Result<(), Error> {
    if slot <= state.slot {
        return Err(Error::SlotInPast {
            state_slot: state.slot,
            target_slot: slot,
        });
    }

    while state.slot < slot {
        process_slot(state)?;
        // Epoch processing runs on the last slot of an epoch, before the
        // increment moves the state into the next one.
        if (state.slot + 1) % C::slots_per_epoch() == 0 {
            process_epoch(state)?;
        }
        state.slot += 1;
    }

    Ok(())
}

fn process_slot<C: Config>(state: &mut BeaconState<C>) -> Result<(), Error> {
    // Cache the state root of the slot being left behind.
    let previous_state_root = hash_tree_root(state);
    state.set_state_root(state.slot, previous_state_root)?;

    // The header stored by block processing has its state root zeroed; it can
    // only be filled in here, once the state at that slot is final.
    if state.latest_block_header.state_root == H256::ZERO {
        state.latest_block_header.state_root = previous_state_root;
    }

    let previous_block_root = hash_tree_root(&state.latest_block_header);
    state.set_block_root(state.slot, previous_block_root)?;

    Ok(())
}

/// The state-transition function proper: `advance(state, block)`.
///
/// `validate_state_root` is only disabled for optimistic replay of blocks
/// that were already accepted. `verify_signatures` is only disabled when the
/// caller vouches for the signatures (pre-verified gossip, replay, tests).
pub fn state_transition<C: Config>(
    state: &mut BeaconState<C>,
    signed_block: &SignedBeaconBlock<C>,
    validate_state_root: bool,
    verify_signatures: bool,
) -> Result<(), Error> {
    let block = &signed_block.message;

    if state.slot < block.slot {
        process_slots(state, block.slot)?;
    }

    if verify_signatures {
        verify_block_signature(state, signed_block)?;
    }

    process_block(state, block, verify_signatures)?;

    if validate_state_root {
        let computed = hash_tree_root(state);
        if block.state_root != computed {
            return Err(Error::StateRootMismatch {
                expected: block.state_root,
                computed,
            });
        }
    }

    Ok(())
}

fn verify_block_signature<C: Config>(
    state: &BeaconState<C>,
    signed_block: &SignedBeaconBlock<C>,
) -> Result<(), Error> {
    let proposer_index = usize::try_from(signed_block.message.proposer_index)
        .map_err(|_| helper_functions::Error::IndexOutOfRange)?;
    let proposer = state
        .validators
        .get(proposer_index)
        .ok_or(helper_functions::Error::IndexOutOfRange)?;

    let domain = get_domain(state, C::domain_beacon_proposer(), None);
    let signing_root = compute_signing_root(&signed_block.message, domain);

    if bls_verify(
        &proposer.pubkey,
        signing_root.as_slice(),
        &signed_block.signature,
    )? {
        Ok(())
    } else {
        Err(Error::InvalidSignature)
    }
}

#[cfg(test)]
mod tests {
    use types::config::MinimalConfig;

    use crate::test_builders::genesis_state;

    use super::*;

    #[test]
    fn advances_one_slot() {
        let mut state = genesis_state::<MinimalConfig>(8, 0);
        process_slots(&mut state, 1).expect("slot 1 is in the future");
        assert_eq!(state.slot, 1);
    }

    #[test]
    fn refuses_to_rewind() {
        let mut state = genesis_state::<MinimalConfig>(8, 0);
        state.slot = 3;
        assert_eq!(
            process_slots(&mut state, 3),
            Err(Error::SlotInPast {
                state_slot: 3,
                target_slot: 3,
            }),
        );
        assert_eq!(
            process_slots(&mut state, 2),
            Err(Error::SlotInPast {
                state_slot: 3,
                target_slot: 2,
            }),
        );
    }

    #[test]
    fn fills_the_header_state_root_once() {
        let mut state = genesis_state::<MinimalConfig>(8, 0);
        assert_eq!(state.latest_block_header.state_root, H256::ZERO);
        process_slots(&mut state, 1).expect("slot 1 is in the future");
        assert_ne!(state.latest_block_header.state_root, H256::ZERO);
    }

    #[test]
    fn caches_block_roots_across_an_epoch() {
        let mut state = genesis_state::<MinimalConfig>(8, 0);
        let slots = MinimalConfig::slots_per_epoch() + 2;
        process_slots(&mut state, slots).expect("target is in the future");
        assert_eq!(state.slot, slots);

        let root_at_0 = state.block_root_at_slot(0).expect("slot 0 is historical");
        let root_at_1 = state.block_root_at_slot(1).expect("slot 1 is historical");
        // No blocks were applied, so the same header root fills the ring.
        assert_eq!(root_at_0, root_at_1);
    }
}
