use core::fmt::Debug;

use serde::{Deserialize, Serialize};
use typenum::{
    Unsigned, U1024, U1099511627776, U128, U16, U16777216, U2, U2048, U32, U4096, U64, U65536, U8,
    U8192,
};

use crate::consts::{FAR_FUTURE_EPOCH, GENESIS_EPOCH};
use crate::primitives::{DomainType, Epoch, Gwei, Slot, Version};

/// Compile-time chain parameters.
///
/// List lengths are `typenum` types so containers can be sized without
/// runtime bookkeeping; everything that only feeds arithmetic is a function.
pub trait Config: 'static + Default + Sync + Send + Clone + Debug + PartialEq + Eq {
    type SlotsPerEpoch: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq + Default;
    type SlotsPerHistoricalRoot: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq + Default;
    type SlotsPerEth1VotingPeriod: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq + Default;
    type EpochsPerHistoricalVector: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq + Default;
    type EpochsPerSlashingsVector: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq + Default;
    type HistoricalRootsLimit: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq + Default;
    type ValidatorRegistryLimit: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq + Default;
    type MaxValidatorsPerCommittee: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq + Default;
    type MaxProposerSlashings: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq + Default;
    type MaxAttesterSlashings: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq + Default;
    type MaxAttestations: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq + Default;
    type MaxDeposits: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq + Default;
    type MaxVoluntaryExits: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq + Default;
    type MaxAttestationsPerEpoch: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq + Default;

    fn genesis_epoch() -> Epoch {
        GENESIS_EPOCH
    }

    fn far_future_epoch() -> Epoch {
        FAR_FUTURE_EPOCH
    }

    fn slots_per_epoch() -> u64 {
        Self::SlotsPerEpoch::to_u64()
    }

    fn slots_per_historical_root() -> u64 {
        Self::SlotsPerHistoricalRoot::to_u64()
    }

    fn epochs_per_historical_vector() -> u64 {
        Self::EpochsPerHistoricalVector::to_u64()
    }

    fn epochs_per_slashings_vector() -> u64 {
        Self::EpochsPerSlashingsVector::to_u64()
    }

    // Balances.

    fn max_effective_balance() -> Gwei {
        32_000_000_000
    }

    fn effective_balance_increment() -> Gwei {
        1_000_000_000
    }

    fn ejection_balance() -> Gwei {
        16_000_000_000
    }

    fn hysteresis_quotient() -> u64 {
        4
    }

    fn hysteresis_downward_multiplier() -> u64 {
        1
    }

    fn hysteresis_upward_multiplier() -> u64 {
        5
    }

    // Rewards and penalties.

    fn base_reward_factor() -> u64 {
        64
    }

    fn proposer_reward_quotient() -> u64 {
        8
    }

    fn whistleblower_reward_quotient() -> u64 {
        512
    }

    fn inactivity_penalty_quotient() -> u64 {
        1 << 25
    }

    fn min_epochs_to_inactivity_penalty() -> u64 {
        4
    }

    fn min_slashing_penalty_quotient() -> u64 {
        32
    }

    // Validator registry.

    fn min_per_epoch_churn_limit() -> u64 {
        4
    }

    fn churn_limit_quotient() -> u64 {
        65_536
    }

    fn activation_exit_delay() -> u64 {
        4
    }

    fn min_validator_withdrawability_delay() -> u64 {
        256
    }

    fn persistent_committee_period() -> u64 {
        2_048
    }

    // Committees and shuffling.

    fn target_committee_size() -> u64 {
        128
    }

    fn max_committees_per_slot() -> u64 {
        64
    }

    fn shuffle_round_count() -> u8 {
        90
    }

    fn min_seed_lookahead() -> u64 {
        1
    }

    // Timing.

    fn seconds_per_slot() -> u64 {
        12
    }

    fn min_attestation_inclusion_delay() -> u64 {
        1
    }

    fn safe_slots_to_update_justified() -> u64 {
        8
    }

    fn default_slots_per_archived_point() -> u64 {
        2_048
    }

    // Signature domains.

    fn domain_beacon_proposer() -> DomainType {
        0
    }

    fn domain_beacon_attester() -> DomainType {
        1
    }

    fn domain_randao() -> DomainType {
        2
    }

    fn domain_deposit() -> DomainType {
        3
    }

    fn domain_voluntary_exit() -> DomainType {
        4
    }

    fn genesis_fork_version() -> Version {
        Version::from([0, 0, 0, 0])
    }

    fn genesis_slot() -> Slot {
        crate::consts::GENESIS_SLOT
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Deserialize, Serialize)]
pub struct MainnetConfig;

impl Config for MainnetConfig {
    type SlotsPerEpoch = U32;
    type SlotsPerHistoricalRoot = U8192;
    type SlotsPerEth1VotingPeriod = U1024;
    type EpochsPerHistoricalVector = U65536;
    type EpochsPerSlashingsVector = U8192;
    type HistoricalRootsLimit = U16777216;
    type ValidatorRegistryLimit = U1099511627776;
    type MaxValidatorsPerCommittee = U2048;
    type MaxProposerSlashings = U16;
    type MaxAttesterSlashings = U2;
    type MaxAttestations = U128;
    type MaxDeposits = U16;
    type MaxVoluntaryExits = U16;
    type MaxAttestationsPerEpoch = U4096;
}

/// The minimal preset. Committees and history are shrunk so a handful of
/// validators can finalize in tests.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Deserialize, Serialize)]
pub struct MinimalConfig;

impl Config for MinimalConfig {
    type SlotsPerEpoch = U8;
    type SlotsPerHistoricalRoot = U64;
    type SlotsPerEth1VotingPeriod = U16;
    type EpochsPerHistoricalVector = U64;
    type EpochsPerSlashingsVector = U64;
    type HistoricalRootsLimit = U16777216;
    type ValidatorRegistryLimit = U1099511627776;
    type MaxValidatorsPerCommittee = U2048;
    type MaxProposerSlashings = U16;
    type MaxAttesterSlashings = U2;
    type MaxAttestations = U128;
    type MaxDeposits = U16;
    type MaxVoluntaryExits = U16;
    type MaxAttestationsPerEpoch = U1024;

    fn shuffle_round_count() -> u8 {
        10
    }

    fn target_committee_size() -> u64 {
        4
    }

    fn max_committees_per_slot() -> u64 {
        4
    }

    fn safe_slots_to_update_justified() -> u64 {
        2
    }

    fn seconds_per_slot() -> u64 {
        6
    }

    fn default_slots_per_archived_point() -> u64 {
        32
    }

    fn genesis_fork_version() -> Version {
        Version::from([0, 0, 0, 1])
    }
}

/// Minimal constants under a distinct fork version, for interop testnets.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Deserialize, Serialize)]
pub struct TestnetConfig;

impl Config for TestnetConfig {
    type SlotsPerEpoch = U8;
    type SlotsPerHistoricalRoot = U64;
    type SlotsPerEth1VotingPeriod = U16;
    type EpochsPerHistoricalVector = U64;
    type EpochsPerSlashingsVector = U64;
    type HistoricalRootsLimit = U16777216;
    type ValidatorRegistryLimit = U1099511627776;
    type MaxValidatorsPerCommittee = U2048;
    type MaxProposerSlashings = U16;
    type MaxAttesterSlashings = U2;
    type MaxAttestations = U128;
    type MaxDeposits = U16;
    type MaxVoluntaryExits = U16;
    type MaxAttestationsPerEpoch = U1024;

    fn shuffle_round_count() -> u8 {
        10
    }

    fn target_committee_size() -> u64 {
        4
    }

    fn max_committees_per_slot() -> u64 {
        4
    }

    fn default_slots_per_archived_point() -> u64 {
        32
    }

    fn genesis_fork_version() -> Version {
        Version::from([0, 0, 0, 16])
    }
}
