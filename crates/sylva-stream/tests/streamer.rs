use std::sync::Arc;
use std::time::{Duration, Instant};

use hashbrown::HashSet;
use sylva_gen::SpeciesCatalog;
use sylva_pool::{PoolManager, Variant};
use sylva_stream::{Budgets, ChunkState, Streamer};
use sylva_world::{ChunkCoord, ChunkKey, StreamConfig};

fn test_config() -> StreamConfig {
    let mut cfg = StreamConfig::default();
    cfg.world_seed = 42;
    cfg.distribution.target_per_chunk = 40;
    // accept generously so flat test chunks always hold instances
    cfg.distribution.base_threshold = 0.35;
    cfg
}

fn sync_streamer(cfg: StreamConfig) -> Streamer {
    Streamer::without_runtime(cfg, Arc::new(SpeciesCatalog::builtin()))
}

fn flat_height(_x: f32, _z: f32) -> f32 {
    10.0
}

fn key(cx: i32, cz: i32) -> ChunkKey {
    ChunkCoord::new(cx, cz).key()
}

fn keep_of(keys: &[ChunkKey]) -> HashSet<ChunkKey> {
    keys.iter().copied().collect()
}

#[test]
fn repeated_requests_keep_one_pending_entry() {
    let mut s = sync_streamer(test_config());
    s.request_chunk(0, 0, flat_height, &[], (0.0, 0.0));
    s.request_chunk(0, 0, flat_height, &[], (0.0, 0.0));
    s.request_chunk(0, 0, flat_height, &[], (5.0, 5.0));
    assert_eq!(s.pending_count(), 1);
    assert_eq!(s.state_of(key(0, 0)), Some(ChunkState::Pending));
}

#[test]
fn zero_max_chunks_is_a_noop_apart_from_deletes() {
    let mut s = sync_streamer(test_config());
    let mut pool = PoolManager::new(*sync_pool_params());
    s.request_chunk(0, 0, flat_height, &[], (0.0, 0.0));
    let summary = s.process_pending(0, &Budgets::generous(), &mut pool);
    assert_eq!(summary.generated_inline, 0);
    assert_eq!(summary.applied, 0);
    assert_eq!(s.pending_count(), 1);
    assert_eq!(s.loaded_chunk_count(), 0);
}

fn sync_pool_params() -> &'static sylva_world::PoolParams {
    static PARAMS: sylva_world::PoolParams = sylva_world::PoolParams {
        small_bucket: 32,
        bucket_step: 64,
        near_cap: 128,
        far_cap: 512,
    };
    &PARAMS
}

#[test]
fn sync_generation_respects_per_call_budget() {
    let mut s = sync_streamer(test_config());
    let mut pool = PoolManager::new(*sync_pool_params());
    for cx in 0..5 {
        s.request_chunk(cx, 0, flat_height, &[], (0.0, 0.0));
    }
    let summary = s.process_pending(2, &Budgets::generous(), &mut pool);
    assert_eq!(summary.generated_inline, 2);
    assert_eq!(summary.applied, 2);
    assert_eq!(s.loaded_chunk_count(), 2);
    assert_eq!(s.pending_count(), 3);

    let summary = s.process_pending(10, &Budgets::generous(), &mut pool);
    assert_eq!(summary.generated_inline, 3);
    assert_eq!(s.loaded_chunk_count(), 5);
    assert_eq!(s.pending_count(), 0);
}

#[test]
fn prune_cancels_pending_before_generation() {
    let mut s = sync_streamer(test_config());
    let mut pool = PoolManager::new(*sync_pool_params());
    s.request_chunk(3, 4, flat_height, &[], (0.0, 0.0));
    s.prune_chunks(&HashSet::new());
    assert_eq!(s.pending_count(), 0);
    assert_eq!(s.state_of(key(3, 4)), None);
    s.process_pending(8, &Budgets::generous(), &mut pool);
    assert_eq!(s.loaded_chunk_count(), 0);
}

#[test]
fn empty_keep_set_reclaims_every_chunk() {
    let mut s = sync_streamer(test_config());
    let mut pool = PoolManager::new(*sync_pool_params());
    for cx in 0..3 {
        s.request_chunk(cx, 0, flat_height, &[], (0.0, 0.0));
    }
    s.process_pending(3, &Budgets::generous(), &mut pool);
    assert_eq!(s.loaded_chunk_count(), 3);
    let checked_out_before = pool.stats().checked_out;
    assert!(checked_out_before > 0, "flat chunks should hold batches");

    s.prune_chunks(&HashSet::new());
    assert_eq!(s.delete_queue_len(), 3);
    let summary = s.process_pending(0, &Budgets::generous(), &mut pool);
    assert_eq!(summary.deleted, 3);
    assert_eq!(s.loaded_chunk_count(), 0);
    let stats = pool.stats();
    assert_eq!(stats.checked_out, 0);
    assert_eq!(stats.free, stats.constructed as usize);
}

#[test]
fn zero_delete_budget_drains_nothing() {
    let mut s = sync_streamer(test_config());
    let mut pool = PoolManager::new(*sync_pool_params());
    s.request_chunk(0, 0, flat_height, &[], (0.0, 0.0));
    s.process_pending(1, &Budgets::generous(), &mut pool);
    s.prune_chunks(&HashSet::new());
    let budgets = Budgets {
        apply: Duration::from_secs(10),
        delete: Duration::ZERO,
    };
    let summary = s.process_pending(0, &budgets, &mut pool);
    assert_eq!(summary.deleted, 0);
    assert_eq!(s.delete_queue_len(), 1);
}

#[test]
fn queued_deletion_is_resurrected_by_keep_set() {
    let mut s = sync_streamer(test_config());
    let mut pool = PoolManager::new(*sync_pool_params());
    s.request_chunk(1, 1, flat_height, &[], (96.0, 96.0));
    s.process_pending(1, &Budgets::generous(), &mut pool);
    s.prune_chunks(&HashSet::new());
    assert_eq!(s.state_of(key(1, 1)), Some(ChunkState::Deleting));

    s.prune_chunks(&keep_of(&[key(1, 1)]));
    assert_eq!(s.state_of(key(1, 1)), Some(ChunkState::Loaded));
    assert_eq!(s.delete_queue_len(), 0);

    let summary = s.process_pending(0, &Budgets::generous(), &mut pool);
    assert_eq!(summary.deleted, 0);
    assert_eq!(s.loaded_chunk_count(), 1);
}

#[test]
fn request_resurrects_chunk_awaiting_deletion() {
    let mut s = sync_streamer(test_config());
    let mut pool = PoolManager::new(*sync_pool_params());
    s.request_chunk(2, 2, flat_height, &[], (160.0, 160.0));
    s.process_pending(1, &Budgets::generous(), &mut pool);
    s.prune_chunks(&HashSet::new());
    s.request_chunk(2, 2, flat_height, &[], (160.0, 160.0));
    assert_eq!(s.state_of(key(2, 2)), Some(ChunkState::Loaded));
    assert_eq!(s.pending_count(), 0);
    assert_eq!(s.delete_queue_len(), 0);
}

#[test]
fn oversized_results_truncate_to_variant_cap() {
    let mut cfg = test_config();
    cfg.distribution.target_per_chunk = 400;
    cfg.pool.far_cap = 64;
    cfg.pool.near_cap = 32;
    let mut s = sync_streamer(cfg);
    let mut pool = PoolManager::new(sylva_world::PoolParams {
        small_bucket: 32,
        bucket_step: 64,
        near_cap: 32,
        far_cap: 64,
    });
    // viewer far away forces the far variant and its 64-instance cap
    s.request_chunk(0, 0, flat_height, &[], (10_000.0, 10_000.0));
    s.process_pending(1, &Budgets::generous(), &mut pool);
    let chunk = s.loaded_chunk(key(0, 0)).expect("loaded");
    for entry in &chunk.entries {
        assert!(entry.pair.count() <= 64);
        assert_eq!(entry.pair.capacity(), entry.pair.trunk.visibility.len());
        assert_eq!(entry.positions.len(), entry.pair.count() * 2);
    }
}

#[test]
fn near_and_far_classification_uses_dispatch_viewer() {
    let cfg = test_config();
    let chunk_size = cfg.chunk_size;
    let mut s = sync_streamer(cfg);
    let mut pool = PoolManager::new(*sync_pool_params());
    let (cx0, cz0) = ChunkCoord::new(0, 0).center(chunk_size);
    s.request_chunk(0, 0, flat_height, &[], (cx0, cz0));
    s.request_chunk(8, 8, flat_height, &[], (cx0, cz0));
    s.process_pending(2, &Budgets::generous(), &mut pool);
    assert_eq!(s.loaded_chunk(key(0, 0)).unwrap().variant, Variant::Near);
    assert_eq!(s.loaded_chunk(key(8, 8)).unwrap().variant, Variant::Far);
}

#[test]
fn regeneration_is_deterministic_across_streamers() {
    let mut pool_a = PoolManager::new(*sync_pool_params());
    let mut pool_b = PoolManager::new(*sync_pool_params());
    let mut a = sync_streamer(test_config());
    let mut b = sync_streamer(test_config());
    for s in [&mut a, &mut b] {
        s.request_chunk(0, 0, flat_height, &[], (0.0, 0.0));
    }
    a.process_pending(1, &Budgets::generous(), &mut pool_a);
    b.process_pending(1, &Budgets::generous(), &mut pool_b);
    let ca = a.loaded_chunk(key(0, 0)).unwrap();
    let cb = b.loaded_chunk(key(0, 0)).unwrap();
    assert_eq!(ca.entries.len(), cb.entries.len());
    for (ea, eb) in ca.entries.iter().zip(&cb.entries) {
        assert_eq!(ea.species, eb.species);
        assert_eq!(ea.pair.count(), eb.pair.count());
        assert_eq!(ea.pair.trunk.transforms, eb.pair.trunk.transforms);
        assert_eq!(ea.positions, eb.positions);
    }
}

#[test]
fn pool_hits_on_streaming_churn() {
    let mut s = sync_streamer(test_config());
    let mut pool = PoolManager::new(*sync_pool_params());
    s.request_chunk(0, 0, flat_height, &[], (0.0, 0.0));
    s.process_pending(1, &Budgets::generous(), &mut pool);
    s.prune_chunks(&HashSet::new());
    s.process_pending(0, &Budgets::generous(), &mut pool);
    assert_eq!(s.loaded_chunk_count(), 0);

    s.request_chunk(0, 0, flat_height, &[], (0.0, 0.0));
    s.process_pending(1, &Budgets::generous(), &mut pool);
    let stats = pool.stats();
    assert!(stats.hits > 0, "second load of the same chunk should reuse pairs");
    assert_eq!(stats.constructed, stats.misses);
}

#[test]
fn background_runtime_matches_sync_generation() {
    let cfg = test_config();
    let species = Arc::new(SpeciesCatalog::builtin());

    let mut sync = Streamer::without_runtime(cfg.clone(), Arc::clone(&species));
    let mut sync_pool = PoolManager::new(*sync_pool_params());
    sync.request_chunk(0, 0, flat_height, &[], (0.0, 0.0));
    sync.process_pending(1, &Budgets::generous(), &mut sync_pool);
    let expected = sync.loaded_chunk(key(0, 0)).expect("sync load");

    let mut bg_cfg = cfg;
    bg_cfg.workers = 1;
    let mut bg = Streamer::new(bg_cfg, species);
    assert!(bg.has_runtime());
    let mut bg_pool = PoolManager::new(*sync_pool_params());
    bg.request_chunk(0, 0, flat_height, &[], (0.0, 0.0));

    let deadline = Instant::now() + Duration::from_secs(10);
    while bg.loaded_chunk_count() == 0 {
        bg.process_pending(4, &Budgets::generous(), &mut bg_pool);
        assert!(Instant::now() < deadline, "background chunk never applied");
        std::thread::sleep(Duration::from_millis(2));
    }

    let got = bg.loaded_chunk(key(0, 0)).expect("bg load");
    assert_eq!(got.entries.len(), expected.entries.len());
    for (ea, eb) in got.entries.iter().zip(&expected.entries) {
        assert_eq!(ea.species, eb.species);
        assert_eq!(ea.pair.trunk.transforms, eb.pair.trunk.transforms);
    }
}

#[test]
fn instances_within_finds_loaded_positions() {
    let mut s = sync_streamer(test_config());
    let mut pool = PoolManager::new(*sync_pool_params());
    s.request_chunk(0, 0, flat_height, &[], (0.0, 0.0));
    s.process_pending(1, &Budgets::generous(), &mut pool);
    let chunk = s.loaded_chunk(key(0, 0)).unwrap();
    let entry = chunk.entries.first().expect("at least one species");
    let (px, pz) = (entry.positions[0], entry.positions[1]);
    let hits = s.instances_within(px, pz, 0.5);
    assert!(hits.iter().any(|&(_, x, z)| x == px && z == pz));
    assert!(s.instances_within(50_000.0, 50_000.0, 1.0).is_empty());
}
