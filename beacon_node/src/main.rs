use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, ensure, Context as _, Result};
use log::{error, info};
use ssz::Decode as _;

use beacon_node::{AttestationQueue, BeaconChain, ChainPreset, NodeConfig, SlotClock};
use beacon_store::Store;
use helper_functions::crypto::hash_tree_root;
use types::config::{Config, MainnetConfig, MinimalConfig, TestnetConfig};
use types::types::{BeaconBlock, SignedBeaconBlock};
use types::BeaconState;

fn main() -> Result<()> {
    simple_logger::init().map_err(|error| anyhow!("logger initialization failed: {}", error))?;

    let mut arguments = std::env::args();
    ensure!(arguments.next().is_some(), "missing executable path");
    let config_path = arguments
        .next()
        .ok_or_else(|| anyhow!("missing configuration file path"))?;
    ensure!(arguments.next().is_none(), "trailing arguments");

    let config_source = fs::read_to_string(&config_path)
        .with_context(|| format!("cannot read configuration at {}", config_path))?;
    let config = NodeConfig::from_yaml(&config_source)?;

    match config.chain_config {
        ChainPreset::Mainnet => run::<MainnetConfig>(config),
        ChainPreset::Minimal => run::<MinimalConfig>(config),
        ChainPreset::Testnet => run::<TestnetConfig>(config),
    }
}

fn run<C: Config>(config: NodeConfig) -> Result<()> {
    let store = Arc::new(Store::<C>::open(
        &config.data_dir,
        config.store_config::<C>(),
    )?);

    let dropped = store.check_indexes()?;
    if dropped > 0 {
        info!("startup self-check dropped {} orphaned index entries", dropped);
    }

    let slot_clock = SlotClock::system(config.genesis_time, C::seconds_per_slot());

    let chain = if store.head_block_root()?.is_some() {
        info!("resuming from the persisted head");
        BeaconChain::resume(store, slot_clock, config.verify_signatures)?
    } else {
        let path = config
            .genesis_state_ssz_path
            .as_ref()
            .ok_or_else(|| anyhow!("an empty store needs genesis_state_ssz_path"))?;
        let bytes = fs::read(path)
            .with_context(|| format!("cannot read genesis state at {}", path.display()))?;
        let genesis_state = BeaconState::<C>::from_ssz_bytes(&bytes)
            .map_err(|error| anyhow!("genesis state does not decode: {:?}", error))?;

        // The genesis block is derivable by everyone from the state alone.
        let genesis_block = SignedBeaconBlock {
            message: BeaconBlock {
                state_root: hash_tree_root(&genesis_state),
                ..BeaconBlock::default()
            },
            ..SignedBeaconBlock::default()
        };

        info!("bootstrapping from the genesis state");
        BeaconChain::bootstrap(
            store,
            genesis_state,
            genesis_block,
            slot_clock,
            config.verify_signatures,
        )?
    };
    let chain = Arc::new(chain);

    let queue_chain = Arc::clone(&chain);
    let _attestation_queue = AttestationQueue::<C>::new(
        config.attestation_workers,
        config.attestation_queue_capacity,
        move |attestation| {
            if let Err(error) = queue_chain.receive_attestation(&attestation, false) {
                info!("attestation dropped: {}", error);
            }
        },
    );

    info!("beacon node running; head {:?}", chain.head()?);

    // Network ingestion plugs into `chain.receive_block` and the
    // attestation queue; until then the node just follows the clock.
    loop {
        thread::sleep(Duration::from_secs(C::seconds_per_slot()));
        match chain.on_slot_tick() {
            Ok(slot) => info!("slot {} started", slot),
            Err(error) => error!("slot tick failed: {}", error),
        }
    }
}
