use std::path::PathBuf;

use anyhow::{ensure, Result};
use beacon_store::StoreConfig;
use serde::Deserialize;
use types::config::Config;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize)]
pub enum ChainPreset {
    Mainnet,
    Minimal,
    Testnet,
}

/// Runtime options of the node. Everything flows through this object; the
/// core reads no environment variables.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeConfig {
    /// Root directory of the persistent store.
    pub data_dir: PathBuf,
    /// Which compile-time constant set the node runs.
    pub chain_config: ChainPreset,
    /// Wall-clock anchor of slot zero, in unix seconds.
    pub genesis_time: u64,
    /// SSZ-encoded genesis state, read once when the store is empty.
    pub genesis_state_ssz_path: Option<PathBuf>,
    /// Spacing of fully materialized states; defaults from the preset.
    pub slots_per_archived_point: Option<u64>,
    /// Delete non-archived epoch-boundary states eagerly on finalization.
    pub prune_epoch_boundary_states: bool,
    /// Keep an extra in-memory state cache during initial sync.
    pub init_sync_cache_state: bool,
    /// Worker threads draining the attestation queue.
    pub attestation_workers: usize,
    /// Bound of the attestation queue; a full queue reports back-pressure.
    pub attestation_queue_capacity: usize,
    /// Verify block and attestation signatures. Only tests turn this off.
    pub verify_signatures: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: "beacon-node-data".into(),
            chain_config: ChainPreset::Mainnet,
            genesis_time: 0,
            genesis_state_ssz_path: None,
            slots_per_archived_point: None,
            prune_epoch_boundary_states: false,
            init_sync_cache_state: false,
            attestation_workers: num_cpus::get(),
            attestation_queue_capacity: 1024,
            verify_signatures: true,
        }
    }
}

impl NodeConfig {
    pub fn from_yaml(source: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.attestation_workers > 0,
            "at least one attestation worker is required",
        );
        ensure!(
            self.attestation_queue_capacity > 0,
            "the attestation queue needs a nonzero capacity",
        );
        if let Some(spacing) = self.slots_per_archived_point {
            ensure!(spacing > 0, "archived points need a nonzero spacing");
        }
        Ok(())
    }

    pub fn store_config<C: Config>(&self) -> StoreConfig {
        let mut store_config = StoreConfig::for_chain::<C>();
        if let Some(spacing) = self.slots_per_archived_point {
            store_config.slots_per_archived_point = spacing;
        }
        store_config.prune_epoch_boundary_states = self.prune_epoch_boundary_states;
        store_config.init_sync_cache_state = self.init_sync_cache_state;
        store_config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config = NodeConfig::from_yaml("chain_config: Minimal\n").expect("yaml parses");
        assert_eq!(config.chain_config, ChainPreset::Minimal);
        assert_eq!(config.genesis_time, 0);
        assert!(config.verify_signatures);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(NodeConfig::from_yaml("no_such_option: 3\n").is_err());
    }

    #[test]
    fn zero_workers_are_rejected() {
        assert!(NodeConfig::from_yaml("attestation_workers: 0\n").is_err());
    }

    #[test]
    fn archived_point_spacing_overrides_the_preset() {
        let config =
            NodeConfig::from_yaml("slots_per_archived_point: 64\n").expect("yaml parses");
        let store_config = config.store_config::<types::config::MinimalConfig>();
        assert_eq!(store_config.slots_per_archived_point, 64);
    }
}
