use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use ssz_types::{BitList, FixedVector, VariableList};
use tree_hash::TreeHash as _;
use tree_hash_derive::TreeHash;
use typenum::{Sum, U1};

use crate::config::Config;
use crate::consts;
use crate::primitives::*;

#[derive(Clone, PartialEq, Debug, Deserialize, Serialize, Encode, Decode, TreeHash)]
#[serde(bound = "C: Config")]
pub struct Attestation<C: Config> {
    pub aggregation_bits: BitList<C::MaxValidatorsPerCommittee>,
    pub data: AttestationData,
    pub signature: AggregateSignatureBytes,
}

#[derive(
    Clone, Copy, PartialEq, Eq, Debug, Hash, Default, Deserialize, Serialize, Encode, Decode,
    TreeHash,
)]
pub struct AttestationData {
    pub slot: Slot,
    pub index: CommitteeIndex,
    pub beacon_block_root: H256,
    pub source: Checkpoint,
    pub target: Checkpoint,
}

#[derive(Clone, PartialEq, Debug, Deserialize, Serialize, Encode, Decode, TreeHash)]
#[serde(bound = "C: Config")]
pub struct AttesterSlashing<C: Config> {
    pub attestation_1: IndexedAttestation<C>,
    pub attestation_2: IndexedAttestation<C>,
}

#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize, Encode, Decode, TreeHash)]
#[serde(bound = "C: Config")]
pub struct BeaconBlock<C: Config> {
    pub slot: Slot,
    pub proposer_index: ValidatorIndex,
    pub parent_root: H256,
    pub state_root: H256,
    pub body: BeaconBlockBody<C>,
}

#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize, Encode, Decode, TreeHash)]
#[serde(bound = "C: Config")]
pub struct BeaconBlockBody<C: Config> {
    pub randao_reveal: SignatureBytes,
    pub eth1_data: Eth1Data,
    pub graffiti: H256,
    pub proposer_slashings: VariableList<ProposerSlashing, C::MaxProposerSlashings>,
    pub attester_slashings: VariableList<AttesterSlashing<C>, C::MaxAttesterSlashings>,
    pub attestations: VariableList<Attestation<C>, C::MaxAttestations>,
    pub deposits: VariableList<Deposit, C::MaxDeposits>,
    pub voluntary_exits: VariableList<SignedVoluntaryExit, C::MaxVoluntaryExits>,
}

/// Same Merkle root as the full block: `body_root` commits to the body, the
/// remaining fields line up, so `hash_tree_root(header) == block root`.
#[derive(
    Clone, Copy, PartialEq, Eq, Debug, Default, Deserialize, Serialize, Encode, Decode, TreeHash,
)]
pub struct BeaconBlockHeader {
    pub slot: Slot,
    pub proposer_index: ValidatorIndex,
    pub parent_root: H256,
    pub state_root: H256,
    pub body_root: H256,
}

impl BeaconBlockHeader {
    pub fn canonical_root(&self) -> H256 {
        self.tree_hash_root()
    }
}

#[derive(
    Clone, Copy, PartialEq, Eq, Debug, Default, Hash, Deserialize, Serialize, Encode, Decode,
    TreeHash,
)]
pub struct Checkpoint {
    pub epoch: Epoch,
    pub root: H256,
}

#[derive(Clone, PartialEq, Debug, Deserialize, Serialize, Encode, Decode, TreeHash)]
pub struct Deposit {
    pub proof: FixedVector<H256, Sum<consts::DepositContractTreeDepth, U1>>,
    pub data: DepositData,
}

#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize, Encode, Decode, TreeHash)]
pub struct DepositData {
    pub pubkey: PublicKeyBytes,
    pub withdrawal_credentials: H256,
    pub amount: Gwei,
    pub signature: SignatureBytes,
}

/// What a deposit signature actually signs: the data minus the signature.
#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize, Encode, Decode, TreeHash)]
pub struct DepositMessage {
    pub pubkey: PublicKeyBytes,
    pub withdrawal_credentials: H256,
    pub amount: Gwei,
}

#[derive(
    Clone, Copy, PartialEq, Eq, Debug, Default, Deserialize, Serialize, Encode, Decode, TreeHash,
)]
pub struct Eth1Data {
    pub deposit_root: H256,
    pub deposit_count: u64,
    pub block_hash: H256,
}

#[derive(
    Clone, Copy, PartialEq, Eq, Debug, Default, Deserialize, Serialize, Encode, Decode, TreeHash,
)]
pub struct Fork {
    pub previous_version: Version,
    pub current_version: Version,
    pub epoch: Epoch,
}

#[derive(Clone, PartialEq, Debug, Deserialize, Serialize, Encode, Decode, TreeHash)]
#[serde(bound = "C: Config")]
pub struct HistoricalBatch<C: Config> {
    pub block_roots: FixedVector<H256, C::SlotsPerHistoricalRoot>,
    pub state_roots: FixedVector<H256, C::SlotsPerHistoricalRoot>,
}

#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize, Encode, Decode, TreeHash)]
#[serde(bound = "C: Config")]
pub struct IndexedAttestation<C: Config> {
    pub attesting_indices: VariableList<u64, C::MaxValidatorsPerCommittee>,
    pub data: AttestationData,
    pub signature: AggregateSignatureBytes,
}

#[derive(Clone, PartialEq, Debug, Deserialize, Serialize, Encode, Decode, TreeHash)]
#[serde(bound = "C: Config")]
pub struct PendingAttestation<C: Config> {
    pub aggregation_bits: BitList<C::MaxValidatorsPerCommittee>,
    pub data: AttestationData,
    pub inclusion_delay: u64,
    pub proposer_index: ValidatorIndex,
}

#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize, Encode, Decode, TreeHash)]
pub struct ProposerSlashing {
    pub proposer_index: ValidatorIndex,
    pub signed_header_1: SignedBeaconBlockHeader,
    pub signed_header_2: SignedBeaconBlockHeader,
}

#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize, Encode, Decode, TreeHash)]
#[serde(bound = "C: Config")]
pub struct SignedBeaconBlock<C: Config> {
    pub message: BeaconBlock<C>,
    pub signature: SignatureBytes,
}

#[derive(
    Clone, Copy, PartialEq, Eq, Debug, Default, Deserialize, Serialize, Encode, Decode, TreeHash,
)]
pub struct SignedBeaconBlockHeader {
    pub message: BeaconBlockHeader,
    pub signature: SignatureBytes,
}

#[derive(
    Clone, Copy, PartialEq, Eq, Debug, Default, Deserialize, Serialize, Encode, Decode, TreeHash,
)]
pub struct SignedVoluntaryExit {
    pub message: VoluntaryExit,
    pub signature: SignatureBytes,
}

#[derive(
    Clone, Copy, PartialEq, Eq, Debug, Default, Deserialize, Serialize, Encode, Decode, TreeHash,
)]
pub struct SigningRoot {
    pub object_root: H256,
    pub domain: Domain,
}

#[derive(Clone, PartialEq, Eq, Debug, Default, Deserialize, Serialize, Encode, Decode, TreeHash)]
pub struct Validator {
    pub pubkey: PublicKeyBytes,
    pub withdrawal_credentials: H256,
    pub effective_balance: Gwei,
    pub slashed: bool,
    pub activation_eligibility_epoch: Epoch,
    pub activation_epoch: Epoch,
    pub exit_epoch: Epoch,
    pub withdrawable_epoch: Epoch,
}

#[derive(
    Clone, Copy, PartialEq, Eq, Debug, Default, Deserialize, Serialize, Encode, Decode, TreeHash,
)]
pub struct VoluntaryExit {
    pub epoch: Epoch,
    pub validator_index: ValidatorIndex,
}
