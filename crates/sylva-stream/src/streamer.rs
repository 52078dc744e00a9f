use std::sync::Arc;
use std::time::{Duration, Instant};

use hashbrown::{HashMap, HashSet};
use sylva_gen::{SpeciesCatalog, chunk_seed, denseness};
use sylva_pool::{PoolManager, Variant};
use sylva_runtime::{GenJob, GenJobOut, Runtime, run_gen_job};
use sylva_world::{ChunkCoord, ChunkKey, DispatchOrder, Exclusion, HeightTile, StreamConfig};

use crate::state::{ChunkEntry, ChunkState, LoadedChunk};

/// Per-call time budgets for the blocking-adjacent phases.
#[derive(Clone, Copy, Debug)]
pub struct Budgets {
    pub apply: Duration,
    pub delete: Duration,
}

impl Default for Budgets {
    fn default() -> Self {
        Self {
            apply: Duration::from_millis(3),
            delete: Duration::from_millis(2),
        }
    }
}

impl Budgets {
    /// Effectively unbudgeted; for prewarm passes and tests.
    pub fn generous() -> Self {
        Self {
            apply: Duration::from_secs(10),
            delete: Duration::from_secs(10),
        }
    }
}

/// What one `process_pending` call did.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessSummary {
    pub deleted: usize,
    pub dispatched: usize,
    pub generated_inline: usize,
    pub applied: usize,
    pub discarded: usize,
    pub bytes_uploaded: usize,
}

/// Running totals for external profiling.
#[derive(Clone, Copy, Debug, Default)]
pub struct StreamTotals {
    pub dispatched: u64,
    pub generated_inline: u64,
    pub applied: u64,
    pub deleted: u64,
    pub discarded: u64,
    pub bytes_uploaded: u64,
}

struct PendingRequest {
    key: ChunkKey,
    coord: ChunkCoord,
    center_x: f32,
    center_z: f32,
    heights: HeightTile,
    exclusions: Vec<Exclusion>,
    viewer: (f32, f32),
}

#[derive(Clone, Copy, Debug)]
struct DispatchMeta {
    key: ChunkKey,
    /// Viewer position recorded at dispatch time; fixes the near/far
    /// classification for this chunk's lifetime.
    viewer: (f32, f32),
}

/// Owner-thread streaming scheduler. All pending/inflight/loaded/delete
/// mutation happens on the calling thread; background work is strictly
/// message-passing through [`Runtime`]. The caller owns the [`PoolManager`]
/// and passes it into every operation that touches batches.
pub struct Streamer {
    cfg: StreamConfig,
    species: Arc<SpeciesCatalog>,
    runtime: Option<Runtime>,
    states: HashMap<ChunkKey, ChunkState>,
    pending: Vec<PendingRequest>,
    correlations: HashMap<u64, DispatchMeta>,
    ready: std::collections::VecDeque<(DispatchMeta, GenJobOut)>,
    loaded: HashMap<ChunkKey, LoadedChunk>,
    delete_queue: std::collections::VecDeque<ChunkKey>,
    next_request_id: u64,
    totals: StreamTotals,
}

impl Streamer {
    /// Build with a background runtime if one can be constructed; otherwise
    /// log once and run every generation synchronously inside
    /// `process_pending`.
    pub fn new(cfg: StreamConfig, species: Arc<SpeciesCatalog>) -> Self {
        let runtime = match Runtime::new(cfg.workers) {
            Ok(rt) => {
                log::info!(target: "stream", "background generation on {} worker(s)", rt.workers);
                Some(rt)
            }
            Err(e) => {
                log::warn!(
                    target: "stream",
                    "background generation unavailable ({e}); generating synchronously"
                );
                None
            }
        };
        Self::with_runtime(cfg, species, runtime)
    }

    /// Synchronous-only scheduler; generation happens inline during
    /// `process_pending`, so callers must keep `max_chunks` small.
    pub fn without_runtime(cfg: StreamConfig, species: Arc<SpeciesCatalog>) -> Self {
        Self::with_runtime(cfg, species, None)
    }

    fn with_runtime(
        cfg: StreamConfig,
        species: Arc<SpeciesCatalog>,
        runtime: Option<Runtime>,
    ) -> Self {
        Self {
            cfg,
            species,
            runtime,
            states: HashMap::new(),
            pending: Vec::new(),
            correlations: HashMap::new(),
            ready: std::collections::VecDeque::new(),
            loaded: HashMap::new(),
            delete_queue: std::collections::VecDeque::new(),
            next_request_id: 1,
            totals: StreamTotals::default(),
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.cfg
    }

    pub fn has_runtime(&self) -> bool {
        self.runtime.is_some()
    }

    /// Ask for a chunk to become resident. Idempotent: keys already tracked
    /// in any state are left alone, except a chunk awaiting deletion, which
    /// is resurrected instead of being regenerated.
    pub fn request_chunk<F>(
        &mut self,
        cx: i32,
        cz: i32,
        height: F,
        exclusions: &[Exclusion],
        viewer: (f32, f32),
    ) where
        F: Fn(f32, f32) -> f32,
    {
        let coord = ChunkCoord::new(cx, cz);
        let key = coord.key();
        match self.states.get(&key) {
            Some(ChunkState::Deleting) => {
                self.delete_queue.retain(|k| *k != key);
                self.states.insert(key, ChunkState::Loaded);
                log::debug!(target: "stream", "resurrected ({cx}, {cz}) from delete queue");
                return;
            }
            Some(_) => return,
            None => {}
        }
        let (center_x, center_z) = coord.center(self.cfg.chunk_size);
        let heights = HeightTile::build(
            center_x,
            center_z,
            self.cfg.chunk_size,
            self.cfg.height_tile_resolution,
            height,
        );
        self.pending.push(PendingRequest {
            key,
            coord,
            center_x,
            center_z,
            heights,
            exclusions: exclusions.to_vec(),
            viewer,
        });
        self.states.insert(key, ChunkState::Pending);
    }

    /// The single per-frame entry point. Drains the delete queue first, then
    /// dispatches and applies (or generates inline without a runtime), each
    /// phase under its budget. No phase exceeds its budget by more than one
    /// unit of work.
    pub fn process_pending(
        &mut self,
        max_chunks: usize,
        budgets: &Budgets,
        pool: &mut PoolManager,
    ) -> ProcessSummary {
        let mut summary = ProcessSummary::default();
        self.drain_delete_queue(budgets.delete, pool, &mut summary);
        if self.runtime.is_some() {
            self.dispatch(max_chunks, &mut summary);
            self.collect_ready(&mut summary);
            self.apply_ready(max_chunks, budgets.apply, pool, &mut summary);
        } else {
            self.generate_inline(max_chunks, pool, &mut summary);
        }
        self.totals.dispatched += summary.dispatched as u64;
        self.totals.generated_inline += summary.generated_inline as u64;
        self.totals.applied += summary.applied as u64;
        self.totals.deleted += summary.deleted as u64;
        self.totals.discarded += summary.discarded as u64;
        self.totals.bytes_uploaded += summary.bytes_uploaded as u64;
        summary
    }

    /// Retire every loaded chunk outside `keep`, cancel pending/inflight
    /// work outside `keep`, and resurrect queued deletions that are wanted
    /// again.
    pub fn prune_chunks(&mut self, keep: &HashSet<ChunkKey>) {
        // cancel pending requests that fell out of the keep set
        let states = &mut self.states;
        self.pending.retain(|req| {
            if keep.contains(&req.key) {
                true
            } else {
                states.remove(&req.key);
                false
            }
        });

        // drop ready responses for unwanted keys before they cost apply time
        self.ready.retain(|(meta, _)| {
            if keep.contains(&meta.key) {
                true
            } else {
                states.remove(&meta.key);
                false
            }
        });

        // inflight work cannot be recalled; forgetting the key makes the
        // eventual response a discard on arrival
        let mut to_act: Vec<(ChunkKey, ChunkState)> = Vec::new();
        for (&key, &state) in states.iter() {
            match state {
                ChunkState::Inflight if !keep.contains(&key) => {
                    to_act.push((key, ChunkState::Inflight));
                }
                ChunkState::Loaded if !keep.contains(&key) => {
                    to_act.push((key, ChunkState::Loaded));
                }
                ChunkState::Deleting if keep.contains(&key) => {
                    to_act.push((key, ChunkState::Deleting));
                }
                _ => {}
            }
        }
        for (key, state) in to_act {
            match state {
                ChunkState::Inflight => {
                    self.states.remove(&key);
                }
                ChunkState::Loaded => {
                    self.states.insert(key, ChunkState::Deleting);
                    self.delete_queue.push_back(key);
                }
                ChunkState::Deleting => {
                    self.delete_queue.retain(|k| *k != key);
                    self.states.insert(key, ChunkState::Loaded);
                }
                _ => unreachable!(),
            }
        }
    }

    /// Release batches for queued deletions while under budget. Safe with a
    /// zero budget (no-op). Exposed separately so callers can reclaim outside
    /// the normal frame path.
    pub fn drain_delete_queue(
        &mut self,
        budget: Duration,
        pool: &mut PoolManager,
        summary: &mut ProcessSummary,
    ) {
        let start = Instant::now();
        while start.elapsed() < budget {
            let Some(key) = self.delete_queue.pop_front() else {
                break;
            };
            if self.states.get(&key) != Some(&ChunkState::Deleting) {
                continue;
            }
            if let Some(chunk) = self.loaded.remove(&key) {
                for entry in chunk.entries {
                    pool.release(entry.pair);
                }
            }
            self.states.remove(&key);
            summary.deleted += 1;
        }
    }

    fn dispatch(&mut self, max_chunks: usize, summary: &mut ProcessSummary) {
        let Some(rt) = self.runtime.as_ref() else {
            return;
        };
        let inflight_cap = max_chunks.saturating_mul(self.cfg.inflight_factor);
        while summary.dispatched < max_chunks && self.correlations.len() < inflight_cap {
            let req = match self.cfg.dispatch_order {
                DispatchOrder::Lifo => self.pending.pop(),
                DispatchOrder::Fifo => {
                    if self.pending.is_empty() {
                        None
                    } else {
                        Some(self.pending.remove(0))
                    }
                }
            };
            let Some(req) = req else { break };
            if self.states.get(&req.key) != Some(&ChunkState::Pending) {
                continue;
            }
            let request_id = self.next_request_id;
            self.next_request_id += 1;
            let seed = chunk_seed(req.coord.cx, req.coord.cz, self.cfg.world_seed);
            let density = denseness(req.coord.cx, req.coord.cz, self.cfg.world_seed);
            let job = GenJob {
                request_id,
                key: req.key,
                center_x: req.center_x,
                center_z: req.center_z,
                chunk_size: self.cfg.chunk_size,
                seed,
                density,
                exclusions: req.exclusions,
                heights: req.heights,
                noise: self.cfg.noise,
                distribution: self.cfg.distribution,
                bounds: self.cfg.bounds,
                species: Arc::clone(&self.species),
            };
            self.correlations.insert(
                request_id,
                DispatchMeta {
                    key: req.key,
                    viewer: req.viewer,
                },
            );
            self.states.insert(req.key, ChunkState::Inflight);
            rt.submit(job);
            summary.dispatched += 1;
        }
    }

    /// Pull worker responses into the ready queue, resolving request ids back
    /// to chunk keys. Responses for canceled or superseded keys are discarded
    /// here; that is an expected race, not an error.
    fn collect_ready(&mut self, summary: &mut ProcessSummary) {
        let Some(rt) = self.runtime.as_ref() else {
            return;
        };
        for out in rt.drain_results() {
            let Some(meta) = self.correlations.remove(&out.request_id) else {
                summary.discarded += 1;
                continue;
            };
            if self.states.get(&meta.key) == Some(&ChunkState::Inflight) {
                self.states.insert(meta.key, ChunkState::Ready);
                self.ready.push_back((meta, out));
            } else {
                summary.discarded += 1;
            }
        }
    }

    fn apply_ready(
        &mut self,
        max_chunks: usize,
        budget: Duration,
        pool: &mut PoolManager,
        summary: &mut ProcessSummary,
    ) {
        let start = Instant::now();
        while summary.applied < max_chunks && start.elapsed() < budget {
            let Some((meta, out)) = self.ready.pop_front() else {
                break;
            };
            if self.states.get(&meta.key) != Some(&ChunkState::Ready) {
                summary.discarded += 1;
                continue;
            }
            self.apply_one(meta, out, pool, summary);
        }
    }

    /// Attach pooled batch pairs for one generated chunk. Failures stay
    /// local: an unknown species skips that result only, oversized results
    /// truncate to capacity, and nothing here aborts the rest of the call.
    fn apply_one(
        &mut self,
        meta: DispatchMeta,
        out: GenJobOut,
        pool: &mut PoolManager,
        summary: &mut ProcessSummary,
    ) {
        let coord = out.key.coord();
        let (center_x, center_z) = coord.center(self.cfg.chunk_size);
        let near_limit = self.cfg.near_radius_chunks as f32 * self.cfg.chunk_size;
        let dx = center_x - meta.viewer.0;
        let dz = center_z - meta.viewer.1;
        let variant = if dx * dx + dz * dz <= near_limit * near_limit {
            Variant::Near
        } else {
            Variant::Far
        };

        let mut chunk = LoadedChunk::new(out.key, variant);
        for result in out.results {
            let Some(def) = self.species.get(result.species) else {
                log::debug!(
                    target: "stream",
                    "dropping result for unknown species {} in ({}, {})",
                    result.species, coord.cx, coord.cz
                );
                continue;
            };
            let needed = result.count();
            if needed == 0 {
                continue;
            }
            let mut pair = pool.acquire(result.species, variant, needed);
            pair.retag(&def.trunk_material, &def.canopy_material);
            let live = pair.upload(&result.transforms);
            // transforms (4 f32) + positions (2 f32) per live instance
            summary.bytes_uploaded += live * 6 * std::mem::size_of::<f32>();
            let mut positions = result.positions;
            positions.truncate(live * 2);
            chunk.entries.push(ChunkEntry {
                species: result.species,
                pair,
                positions,
            });
        }
        log::debug!(
            target: "stream",
            "loaded ({}, {}) as {:?} with {} instance(s)",
            coord.cx, coord.cz, variant, chunk.instance_count()
        );
        self.loaded.insert(out.key, chunk);
        self.states.insert(out.key, ChunkState::Loaded);
        summary.applied += 1;
    }

    /// Fallback when no background context exists: generate up to
    /// `max_chunks` right here. Frame pacing is the caller's problem in this
    /// mode; keep `max_chunks` small.
    fn generate_inline(
        &mut self,
        max_chunks: usize,
        pool: &mut PoolManager,
        summary: &mut ProcessSummary,
    ) {
        while summary.generated_inline < max_chunks {
            let req = match self.cfg.dispatch_order {
                DispatchOrder::Lifo => self.pending.pop(),
                DispatchOrder::Fifo => {
                    if self.pending.is_empty() {
                        None
                    } else {
                        Some(self.pending.remove(0))
                    }
                }
            };
            let Some(req) = req else { break };
            if self.states.get(&req.key) != Some(&ChunkState::Pending) {
                continue;
            }
            let request_id = self.next_request_id;
            self.next_request_id += 1;
            let meta = DispatchMeta {
                key: req.key,
                viewer: req.viewer,
            };
            let job = GenJob {
                request_id,
                key: req.key,
                center_x: req.center_x,
                center_z: req.center_z,
                chunk_size: self.cfg.chunk_size,
                seed: chunk_seed(req.coord.cx, req.coord.cz, self.cfg.world_seed),
                density: denseness(req.coord.cx, req.coord.cz, self.cfg.world_seed),
                exclusions: req.exclusions,
                heights: req.heights,
                noise: self.cfg.noise,
                distribution: self.cfg.distribution,
                bounds: self.cfg.bounds,
                species: Arc::clone(&self.species),
            };
            let out = run_gen_job(&job);
            summary.generated_inline += 1;
            self.states.insert(req.key, ChunkState::Ready);
            self.apply_one(meta, out, pool, summary);
        }
    }

    // --- diagnostics ---

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn inflight_count(&self) -> usize {
        self.correlations.len()
    }

    pub fn ready_count(&self) -> usize {
        self.ready.len()
    }

    pub fn loaded_chunk_count(&self) -> usize {
        self.loaded.len()
    }

    pub fn delete_queue_len(&self) -> usize {
        self.delete_queue.len()
    }

    pub fn state_of(&self, key: ChunkKey) -> Option<ChunkState> {
        self.states.get(&key).copied()
    }

    pub fn loaded_chunk(&self, key: ChunkKey) -> Option<&LoadedChunk> {
        self.loaded.get(&key)
    }

    pub fn totals(&self) -> StreamTotals {
        self.totals
    }

    /// Positions of loaded instances within `radius` of (x, z), for
    /// interaction queries by systems outside the streamer.
    pub fn instances_within(&self, x: f32, z: f32, radius: f32) -> Vec<(sylva_gen::SpeciesId, f32, f32)> {
        let r2 = radius * radius;
        // chunk-level reject: a full chunk edge comfortably covers the half diagonal
        let reach = radius + self.cfg.chunk_size;
        let mut found = Vec::new();
        for (key, chunk) in &self.loaded {
            let (cx, cz) = key.coord().center(self.cfg.chunk_size);
            let dx = cx - x;
            let dz = cz - z;
            if dx * dx + dz * dz > reach * reach {
                continue;
            }
            for entry in &chunk.entries {
                for i in 0..entry.positions.len() / 2 {
                    let px = entry.positions[i * 2];
                    let pz = entry.positions[i * 2 + 1];
                    let dx = px - x;
                    let dz = pz - z;
                    if dx * dx + dz * dz <= r2 {
                        found.push((entry.species, px, pz));
                    }
                }
            }
        }
        found
    }
}
