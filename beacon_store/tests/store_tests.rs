use beacon_store::{BlockFilter, CancelToken, Store, StoreConfig, StoreError};
use helper_functions::crypto::hash_tree_root;
use transition_functions::test_builders::{chain_of_blocks, genesis_block, genesis_state};
use types::config::MinimalConfig;
use types::primitives::{Slot, H256};
use types::types::{BeaconBlock, Checkpoint, SignedBeaconBlock};
use types::BeaconState;

type C = MinimalConfig;

const VALIDATORS: u64 = 8;

fn store_with(slots_per_archived_point: u64, prune_epoch_boundary_states: bool) -> Store<C> {
    let config = StoreConfig {
        slots_per_archived_point,
        prune_epoch_boundary_states,
        init_sync_cache_state: false,
        block_cache_size: 16,
    };
    Store::temporary(config).expect("temporary store opens")
}

/// Saves a genesis plus `length` empty blocks with all their states, and
/// archived points every `slots_per_archived_point` slots. Returns the
/// per-slot block roots, genesis first.
fn bootstrap_chain(
    store: &Store<C>,
    length: u64,
) -> (Vec<H256>, Vec<(SignedBeaconBlock<C>, BeaconState<C>)>) {
    let genesis = genesis_state::<C>(VALIDATORS, 0);
    let anchor = genesis_block(&genesis);
    let genesis_root = store.save_block(&anchor).expect("genesis block saves");
    store
        .save_state(&genesis, genesis_root)
        .expect("genesis state saves");
    store
        .save_genesis_block_root(genesis_root)
        .expect("genesis root saves");
    store
        .save_archived_point(0, genesis_root)
        .expect("genesis is the zeroth archived point");

    let chain = chain_of_blocks(&genesis, length);
    let mut roots = vec![genesis_root];
    for (block, post_state) in &chain {
        let root = store.save_block(block).expect("block saves");
        store.save_state(post_state, root).expect("state saves");

        let slot = block.message.slot;
        if slot % store.config().slots_per_archived_point == 0 {
            store
                .save_archived_point(slot / store.config().slots_per_archived_point, root)
                .expect("archived point saves");
        }
        roots.push(root);
    }

    let head_root = roots[roots.len() - 1];
    store
        .save_head_block_root(head_root)
        .expect("head root saves");

    (roots, chain)
}

#[test]
fn filters_intersect_parent_and_slot_range() {
    let store = store_with(32, false);
    let parent_p = H256::repeat_byte(0xaa);
    let parent_q = H256::repeat_byte(0xbb);

    let block_at = |slot: Slot, parent_root: H256| SignedBeaconBlock::<C> {
        message: BeaconBlock {
            slot,
            parent_root,
            ..BeaconBlock::default()
        },
        ..SignedBeaconBlock::default()
    };

    let blocks = vec![
        block_at(1, parent_p),
        block_at(10, parent_p),
        block_at(20, parent_q),
    ];
    store.save_blocks(&blocks).expect("blocks save");

    let filter = BlockFilter::new()
        .with_parent_root(parent_p)
        .with_start_slot(5)
        .with_end_slot(15);
    let matched = store.blocks_by_filter(&filter).expect("query runs");

    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].message.slot, 10);
    assert_eq!(matched[0].message.parent_root, parent_p);
}

#[test]
fn filters_compose_epochs_and_steps() {
    let store = store_with(32, false);
    let (roots, _) = bootstrap_chain(&store, 24);

    // Epoch 1 covers slots 8..=15; a step of 4 picks 8 and 12.
    let filter = BlockFilter::new()
        .with_start_epoch(1)
        .with_end_epoch(1)
        .with_slot_step(4);
    let matched = store.block_roots_by_filter(&filter).expect("query runs");
    assert_eq!(matched, vec![roots[8], roots[12]]);
}

#[test]
fn blocks_by_slot_returns_every_fork_block() {
    let store = store_with(32, false);
    let (_, chain) = bootstrap_chain(&store, 4);

    // A competing block at slot 4 built on the slot-2 state.
    let (fork_block, fork_state) =
        transition_functions::test_builders::block_at_slot(&chain[1].1, 4);
    let fork_root = store.save_block(&fork_block).expect("fork block saves");
    store
        .save_state(&fork_state, fork_root)
        .expect("fork state saves");

    assert_eq!(store.blocks_by_slot(4).expect("query runs").len(), 2);
}

#[test]
fn head_root_requires_a_resolvable_state() {
    let store = store_with(32, false);
    let result = store.save_head_block_root(H256::repeat_byte(0x99));
    assert!(matches!(result, Err(StoreError::NotFound { .. })));
}

#[test]
fn finalized_checkpoint_requires_a_materialized_state() {
    let store = store_with(32, false);
    let checkpoint = Checkpoint {
        epoch: 1,
        root: H256::repeat_byte(0x88),
    };
    let result = store.save_finalized_checkpoint(checkpoint);
    assert!(matches!(result, Err(StoreError::NotFound { .. })));
}

#[test]
fn finalized_chain_is_indexed_as_a_linked_list() {
    let store = store_with(32, false);
    let (roots, _) = bootstrap_chain(&store, 20);

    store
        .save_finalized_checkpoint(Checkpoint {
            epoch: 2,
            root: roots[16],
        })
        .expect("the finalized state is materialized");

    for root in roots.iter().take(17) {
        assert!(store.is_finalized_block(*root).expect("lookup runs"));
    }
    assert!(!store.is_finalized_block(roots[17]).expect("lookup runs"));
}

// Bootstrap a hundred-block chain, finalize, prune, and regenerate a state
// across the archived point in between.
#[test]
fn regeneration_matches_the_state_before_pruning() {
    let store = store_with(32, true);
    let (roots, _) = bootstrap_chain(&store, 100);

    let before = store
        .state(roots[70])
        .expect("read runs")
        .expect("state 70 is materialized");

    store
        .save_finalized_checkpoint(Checkpoint {
            epoch: 8,
            root: roots[64],
        })
        .expect("the finalized state is materialized");
    let pruned = store
        .prune_finalized(
            Checkpoint {
                epoch: 8,
                root: roots[64],
            },
            Checkpoint {
                epoch: 0,
                root: roots[0],
            },
            &CancelToken::new(),
        )
        .expect("pruning runs");
    assert!(pruned.states_deleted > 0);

    // Slot 70 was pruned; it must come back by replay from the archived
    // point at slot 64, byte-identical to what was stored.
    assert!(!store.contains_state(roots[70]).expect("lookup runs"));
    let after = store
        .state(roots[70])
        .expect("regeneration runs")
        .expect("state 70 is regenerable");
    assert_eq!(after, before);
}

#[test]
fn pruning_keeps_archived_head_and_genesis_states() {
    let store = store_with(32, true);
    let (roots, _) = bootstrap_chain(&store, 100);

    store
        .save_finalized_checkpoint(Checkpoint {
            epoch: 8,
            root: roots[64],
        })
        .expect("the finalized state is materialized");
    store
        .prune_finalized(
            Checkpoint {
                epoch: 8,
                root: roots[64],
            },
            Checkpoint {
                epoch: 0,
                root: roots[0],
            },
            &CancelToken::new(),
        )
        .expect("pruning runs");

    assert!(store.contains_state(roots[0]).expect("lookup runs"));
    assert!(store.contains_state(roots[32]).expect("lookup runs"));
    assert!(store.contains_state(roots[64]).expect("lookup runs"));
    assert!(store.contains_state(roots[100]).expect("lookup runs"));
    assert!(store.head_state().is_ok());

    // Everything else in the pruned range is gone but regenerable.
    assert!(!store.contains_state(roots[40]).expect("lookup runs"));
    assert!(store
        .state(roots[40])
        .expect("regeneration runs")
        .is_some());
}

#[test]
fn pruning_deletes_orphaned_forks_entirely() {
    let store = store_with(32, true);
    let (roots, chain) = bootstrap_chain(&store, 20);

    // A fork block at slot 12 built on the canonical slot-10 state.
    let (fork_block, fork_state) =
        transition_functions::test_builders::block_at_slot(&chain[9].1, 12);
    let fork_root = store.save_block(&fork_block).expect("fork block saves");
    store
        .save_state(&fork_state, fork_root)
        .expect("fork state saves");

    store
        .save_finalized_checkpoint(Checkpoint {
            epoch: 2,
            root: roots[16],
        })
        .expect("the finalized state is materialized");
    let pruned = store
        .prune_finalized(
            Checkpoint {
                epoch: 2,
                root: roots[16],
            },
            Checkpoint {
                epoch: 0,
                root: roots[0],
            },
            &CancelToken::new(),
        )
        .expect("pruning runs");

    assert_eq!(pruned.blocks_deleted, 1);
    assert!(!store.contains_block(fork_root).expect("lookup runs"));
    assert!(!store.contains_state(fork_root).expect("lookup runs"));
    assert!(store
        .state(fork_root)
        .expect("read runs")
        .is_none());
    // The canonical block at the same slot survives.
    assert!(store.contains_block(roots[12]).expect("lookup runs"));
}

#[test]
fn pruning_is_cancellable() {
    let store = store_with(32, true);
    let (roots, _) = bootstrap_chain(&store, 20);

    store
        .save_finalized_checkpoint(Checkpoint {
            epoch: 2,
            root: roots[16],
        })
        .expect("the finalized state is materialized");

    let token = CancelToken::new();
    token.cancel();
    let result = store.prune_finalized(
        Checkpoint {
            epoch: 2,
            root: roots[16],
        },
        Checkpoint {
            epoch: 0,
            root: roots[0],
        },
        &token,
    );
    assert!(matches!(result, Err(StoreError::Cancelled)));
    // Nothing in the range was touched.
    assert!(store.contains_state(roots[9]).expect("lookup runs"));
}

#[test]
fn archived_points_track_the_highest_index() {
    let store = store_with(32, false);
    let (roots, _) = bootstrap_chain(&store, 70);

    assert_eq!(store.last_archived_index().expect("read runs"), Some(2));
    assert_eq!(
        store.archived_point_root(1).expect("read runs"),
        Some(roots[32]),
    );
    assert_eq!(
        store.archived_point_root(2).expect("read runs"),
        Some(roots[64]),
    );
    assert_eq!(store.archived_point_root(9).expect("read runs"), None);
}

#[test]
fn reopening_an_on_disk_store_preserves_the_chain() {
    let directory = tempfile::tempdir().expect("temporary directory is creatable");
    let config = StoreConfig {
        slots_per_archived_point: 32,
        prune_epoch_boundary_states: false,
        init_sync_cache_state: false,
        block_cache_size: 16,
    };

    let genesis = genesis_state::<C>(VALIDATORS, 0);
    let anchor = genesis_block(&genesis);
    let genesis_root = hash_tree_root(&anchor.message);

    {
        let store = Store::<C>::open(directory.path(), config).expect("store opens");
        store.save_block(&anchor).expect("block saves");
        store
            .save_state(&genesis, genesis_root)
            .expect("state saves");
        store
            .save_genesis_block_root(genesis_root)
            .expect("genesis root saves");
    }

    let store = Store::<C>::open(directory.path(), config).expect("store reopens");
    assert_eq!(store.check_indexes().expect("self-check runs"), 0);
    assert_eq!(
        store.genesis_block_root().expect("read runs"),
        Some(genesis_root),
    );
    assert_eq!(
        store
            .genesis_state()
            .expect("read runs")
            .expect("genesis state is materialized"),
        genesis,
    );
}
