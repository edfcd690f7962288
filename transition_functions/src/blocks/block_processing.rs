use core::convert::TryFrom;
use std::cmp;
use std::collections::BTreeSet;

use helper_functions::beacon_state_accessors::{
    get_beacon_committee, get_beacon_proposer_index, get_committee_count_at_slot,
    get_current_epoch, get_domain, get_indexed_attestation, get_previous_epoch, get_randao_mix,
};
use helper_functions::beacon_state_mutators::{increase_balance, slash_validator};
use helper_functions::crypto::{bls_verify, hash, hash_tree_root};
use helper_functions::math::xor;
use helper_functions::misc::{compute_domain, compute_epoch_at_slot, compute_signing_root};
use helper_functions::predicates::{
    is_active_validator, is_slashable_attestation_data, is_slashable_validator,
    is_valid_merkle_branch, validate_indexed_attestation,
};
use typenum::Unsigned as _;
use types::config::Config;
use types::consts::{DEPOSIT_CONTRACT_TREE_DEPTH, FAR_FUTURE_EPOCH};
use types::primitives::H256;
use types::types::{
    Attestation, AttesterSlashing, BeaconBlock, BeaconBlockBody, BeaconBlockHeader, Deposit,
    DepositMessage, PendingAttestation, ProposerSlashing, SignedVoluntaryExit, Validator,
};
use types::BeaconState;

use crate::error::Error;

pub fn process_block<C: Config>(
    state: &mut BeaconState<C>,
    block: &BeaconBlock<C>,
    verify_signatures: bool,
) -> Result<(), Error> {
    process_block_header(state, block)?;
    process_randao(state, &block.body, verify_signatures)?;
    process_eth1_data(state, &block.body)?;
    process_operations(state, &block.body, verify_signatures)
}

fn process_block_header<C: Config>(
    state: &mut BeaconState<C>,
    block: &BeaconBlock<C>,
) -> Result<(), Error> {
    if block.slot != state.slot {
        return Err(Error::SlotMismatch {
            state_slot: state.slot,
            block_slot: block.slot,
        });
    }

    let expected_parent = hash_tree_root(&state.latest_block_header);
    if block.parent_root != expected_parent {
        return Err(Error::ParentRootMismatch {
            expected: expected_parent,
            actual: block.parent_root,
        });
    }

    let expected_proposer = get_beacon_proposer_index(state)?;
    if block.proposer_index != expected_proposer {
        return Err(Error::WrongProposer {
            expected: expected_proposer,
            actual: block.proposer_index,
        });
    }

    let proposer_index = usize::try_from(block.proposer_index)
        .map_err(|_| helper_functions::Error::IndexOutOfRange)?;
    let proposer = state
        .validators
        .get(proposer_index)
        .ok_or(helper_functions::Error::IndexOutOfRange)?;
    if proposer.slashed {
        return Err(Error::ProposerSlashed {
            index: block.proposer_index,
        });
    }

    state.latest_block_header = BeaconBlockHeader {
        slot: block.slot,
        proposer_index: block.proposer_index,
        parent_root: block.parent_root,
        // Zeroed here and filled by the next `process_slot` call, once the
        // post-state of this slot is final.
        state_root: H256::ZERO,
        body_root: hash_tree_root(&block.body),
    };

    Ok(())
}

fn process_randao<C: Config>(
    state: &mut BeaconState<C>,
    body: &BeaconBlockBody<C>,
    verify_signature: bool,
) -> Result<(), Error> {
    let epoch = get_current_epoch(state);

    if verify_signature {
        let proposer_index = usize::try_from(get_beacon_proposer_index(state)?)
            .map_err(|_| helper_functions::Error::IndexOutOfRange)?;
        let proposer = state
            .validators
            .get(proposer_index)
            .ok_or(helper_functions::Error::IndexOutOfRange)?;
        let signing_root =
            compute_signing_root(&epoch, get_domain(state, C::domain_randao(), None));
        let valid = bls_verify(
            &proposer.pubkey,
            signing_root.as_slice(),
            &body.randao_reveal,
        )
        .unwrap_or(false);
        if !valid {
            return Err(Error::BadRandao);
        }
    }

    let mix = xor(
        get_randao_mix(state, epoch)?,
        H256::from_slice(&hash(body.randao_reveal.as_bytes())),
    );
    state.set_randao_mix(epoch, mix)?;

    Ok(())
}

fn process_eth1_data<C: Config>(
    state: &mut BeaconState<C>,
    body: &BeaconBlockBody<C>,
) -> Result<(), Error> {
    state
        .eth1_data_votes
        .push(body.eth1_data)
        .map_err(|_| Error::OperationLimitExceeded)?;

    let num_votes = state
        .eth1_data_votes
        .iter()
        .filter(|vote| **vote == body.eth1_data)
        .count();

    if num_votes * 2 > C::SlotsPerEth1VotingPeriod::USIZE {
        state.eth1_data = body.eth1_data;
    }

    Ok(())
}

fn process_operations<C: Config>(
    state: &mut BeaconState<C>,
    body: &BeaconBlockBody<C>,
    verify_signatures: bool,
) -> Result<(), Error> {
    // Outstanding deposits must be drained at the maximum rate.
    let expected_deposits = cmp::min(
        C::MaxDeposits::U64,
        state.eth1_data.deposit_count - state.eth1_deposit_index,
    );
    if body.deposits.len() as u64 != expected_deposits {
        return Err(Error::DepositCountMismatch {
            expected: expected_deposits,
            actual: body.deposits.len() as u64,
        });
    }

    for proposer_slashing in body.proposer_slashings.iter() {
        process_proposer_slashing(state, proposer_slashing, verify_signatures)?;
    }
    for attester_slashing in body.attester_slashings.iter() {
        process_attester_slashing(state, attester_slashing, verify_signatures)?;
    }
    for attestation in body.attestations.iter() {
        process_attestation(state, attestation, verify_signatures)?;
    }
    for (index, deposit) in body.deposits.iter().enumerate() {
        process_deposit(state, deposit, index as u64)?;
    }
    for voluntary_exit in body.voluntary_exits.iter() {
        process_voluntary_exit(state, voluntary_exit, verify_signatures)?;
    }

    Ok(())
}

fn process_proposer_slashing<C: Config>(
    state: &mut BeaconState<C>,
    proposer_slashing: &ProposerSlashing,
    verify_signatures: bool,
) -> Result<(), Error> {
    let header_1 = &proposer_slashing.signed_header_1.message;
    let header_2 = &proposer_slashing.signed_header_2.message;

    let same_proposal_slot = header_1.slot == header_2.slot
        && header_1.proposer_index == proposer_slashing.proposer_index
        && header_2.proposer_index == proposer_slashing.proposer_index;
    if !same_proposal_slot {
        return Err(Error::ProposerSlashingHeaderMismatch);
    }
    if header_1 == header_2 {
        return Err(Error::ProposerSlashingSameHeader);
    }

    let proposer_index = usize::try_from(proposer_slashing.proposer_index)
        .map_err(|_| helper_functions::Error::IndexOutOfRange)?;
    let proposer = state
        .validators
        .get(proposer_index)
        .ok_or(helper_functions::Error::IndexOutOfRange)?;
    if !is_slashable_validator(proposer, get_current_epoch(state)) {
        return Err(Error::NotSlashable {
            index: proposer_slashing.proposer_index,
        });
    }

    if verify_signatures {
        for signed_header in &[
            &proposer_slashing.signed_header_1,
            &proposer_slashing.signed_header_2,
        ] {
            let domain = get_domain(
                state,
                C::domain_beacon_proposer(),
                Some(compute_epoch_at_slot::<C>(signed_header.message.slot)),
            );
            let signing_root = compute_signing_root(&signed_header.message, domain);
            let valid = bls_verify(
                &proposer.pubkey,
                signing_root.as_slice(),
                &signed_header.signature,
            )
            .unwrap_or(false);
            if !valid {
                return Err(Error::InvalidSignature);
            }
        }
    }

    slash_validator(state, proposer_slashing.proposer_index, None)?;

    Ok(())
}

fn process_attester_slashing<C: Config>(
    state: &mut BeaconState<C>,
    attester_slashing: &AttesterSlashing<C>,
    verify_signatures: bool,
) -> Result<(), Error> {
    let attestation_1 = &attester_slashing.attestation_1;
    let attestation_2 = &attester_slashing.attestation_2;

    if !is_slashable_attestation_data(&attestation_1.data, &attestation_2.data) {
        return Err(Error::AttesterSlashingNotSlashable);
    }
    validate_indexed_attestation(state, attestation_1, verify_signatures)?;
    validate_indexed_attestation(state, attestation_2, verify_signatures)?;

    let attesting_indices_1 = attestation_1
        .attesting_indices
        .iter()
        .copied()
        .collect::<BTreeSet<_>>();
    let attesting_indices_2 = attestation_2
        .attesting_indices
        .iter()
        .copied()
        .collect::<BTreeSet<_>>();

    // Validators already slashed (possibly by an earlier operation in this
    // very block) are skipped, not rejected.
    let mut slashed_any = false;
    for index in &attesting_indices_1 & &attesting_indices_2 {
        let validator_index =
            usize::try_from(index).map_err(|_| helper_functions::Error::IndexOutOfRange)?;
        let validator = state
            .validators
            .get(validator_index)
            .ok_or(helper_functions::Error::IndexOutOfRange)?;
        if is_slashable_validator(validator, get_current_epoch(state)) {
            slash_validator(state, index, None)?;
            slashed_any = true;
        }
    }

    if slashed_any {
        Ok(())
    } else {
        Err(Error::AttesterSlashingNoEffect)
    }
}

fn process_attestation<C: Config>(
    state: &mut BeaconState<C>,
    attestation: &Attestation<C>,
    verify_signature: bool,
) -> Result<(), Error> {
    let data = &attestation.data;

    let committee_count = get_committee_count_at_slot(state, data.slot)?;
    if data.index >= committee_count {
        return Err(Error::AttestationBadCommitteeIndex {
            index: data.index,
            count: committee_count,
        });
    }

    let current_epoch = get_current_epoch(state);
    let previous_epoch = get_previous_epoch(state);
    if data.target.epoch != current_epoch && data.target.epoch != previous_epoch {
        return Err(Error::EpochOutOfRange {
            epoch: data.target.epoch,
        });
    }

    let within_window = data.slot + C::min_attestation_inclusion_delay() <= state.slot
        && state.slot <= data.slot + C::slots_per_epoch();
    if !within_window {
        return Err(Error::AttestationOutsideInclusionWindow {
            attestation_slot: data.slot,
            state_slot: state.slot,
        });
    }

    let committee = get_beacon_committee(state, data.slot, data.index)?;
    if attestation.aggregation_bits.len() != committee.len() {
        return Err(Error::AttestationBitsMismatch);
    }

    let expected_source = if data.target.epoch == current_epoch {
        state.current_justified_checkpoint
    } else {
        state.previous_justified_checkpoint
    };
    if data.source != expected_source {
        return Err(Error::AttestationSourceMismatch {
            expected: expected_source,
            actual: data.source,
        });
    }

    // Everything that can fail comes before the state is touched.
    let indexed_attestation = get_indexed_attestation(state, attestation)?;
    validate_indexed_attestation(state, &indexed_attestation, verify_signature)?;

    let pending_attestation = PendingAttestation {
        aggregation_bits: attestation.aggregation_bits.clone(),
        data: attestation.data,
        inclusion_delay: state.slot - data.slot,
        proposer_index: get_beacon_proposer_index(state)?,
    };

    let list = if data.target.epoch == current_epoch {
        &mut state.current_epoch_attestations
    } else {
        &mut state.previous_epoch_attestations
    };
    list.push(pending_attestation)
        .map_err(|_| Error::OperationLimitExceeded)?;

    Ok(())
}

fn process_deposit<C: Config>(
    state: &mut BeaconState<C>,
    deposit: &Deposit,
    deposit_ordinal: u64,
) -> Result<(), Error> {
    let valid_proof = is_valid_merkle_branch(
        hash_tree_root(&deposit.data),
        &deposit.proof,
        DEPOSIT_CONTRACT_TREE_DEPTH + 1,
        state.eth1_deposit_index,
        state.eth1_data.deposit_root,
    );
    if !valid_proof {
        return Err(Error::InvalidDepositProof {
            index: deposit_ordinal,
        });
    }

    // Deposits are consumed in order even when their signature is bad.
    state.eth1_deposit_index += 1;

    let pubkey = deposit.data.pubkey;
    let amount = deposit.data.amount;

    // A repeat deposit tops up the existing validator.
    let existing = state
        .validators
        .iter()
        .position(|validator| validator.pubkey == pubkey);
    if let Some(index) = existing {
        increase_balance(state, index as u64, amount)?;
        return Ok(());
    }

    // The deposit contract cannot check signatures, so the proof of
    // possession is verified here. A bad one skips the deposit without
    // failing the block.
    let domain = compute_domain::<C>(C::domain_deposit(), None);
    let deposit_message = DepositMessage {
        pubkey,
        withdrawal_credentials: deposit.data.withdrawal_credentials,
        amount,
    };
    let signing_root = compute_signing_root(&deposit_message, domain);
    let valid = bls_verify(&pubkey, signing_root.as_slice(), &deposit.data.signature)
        .unwrap_or(false);
    if !valid {
        return Ok(());
    }

    state
        .validators
        .push(Validator {
            pubkey,
            withdrawal_credentials: deposit.data.withdrawal_credentials,
            effective_balance: cmp::min(
                amount - amount % C::effective_balance_increment(),
                C::max_effective_balance(),
            ),
            slashed: false,
            activation_eligibility_epoch: FAR_FUTURE_EPOCH,
            activation_epoch: FAR_FUTURE_EPOCH,
            exit_epoch: FAR_FUTURE_EPOCH,
            withdrawable_epoch: FAR_FUTURE_EPOCH,
        })
        .map_err(|_| Error::OperationLimitExceeded)?;
    state
        .balances
        .push(amount)
        .map_err(|_| Error::OperationLimitExceeded)?;

    Ok(())
}

fn process_voluntary_exit<C: Config>(
    state: &mut BeaconState<C>,
    signed_voluntary_exit: &SignedVoluntaryExit,
    verify_signature: bool,
) -> Result<(), Error> {
    let voluntary_exit = &signed_voluntary_exit.message;
    let index = voluntary_exit.validator_index;
    let validator_index =
        usize::try_from(index).map_err(|_| helper_functions::Error::IndexOutOfRange)?;
    let validator = state
        .validators
        .get(validator_index)
        .ok_or(helper_functions::Error::IndexOutOfRange)?;

    let current_epoch = get_current_epoch(state);

    if !is_active_validator(validator, current_epoch) {
        return Err(Error::ValidatorNotActive { index });
    }
    if validator.exit_epoch != FAR_FUTURE_EPOCH {
        return Err(Error::ExitAlreadyInitiated { index });
    }
    // Exits name an epoch at which they become valid.
    if current_epoch < voluntary_exit.epoch {
        return Err(Error::EpochOutOfRange {
            epoch: voluntary_exit.epoch,
        });
    }
    if current_epoch < validator.activation_epoch + C::persistent_committee_period() {
        return Err(Error::ExitTooEarly { index });
    }

    if verify_signature {
        let domain = get_domain(
            state,
            C::domain_voluntary_exit(),
            Some(voluntary_exit.epoch),
        );
        let signing_root = compute_signing_root(voluntary_exit, domain);
        let valid = bls_verify(
            &validator.pubkey,
            signing_root.as_slice(),
            &signed_voluntary_exit.signature,
        )
        .unwrap_or(false);
        if !valid {
            return Err(Error::InvalidSignature);
        }
    }

    helper_functions::beacon_state_mutators::initiate_validator_exit(state, index)?;

    Ok(())
}
