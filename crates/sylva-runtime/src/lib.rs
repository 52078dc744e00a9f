//! Background placement-generation workers and their job channels.
//!
//! Jobs are pure data; a worker is a function of its job message and sends
//! the result back over a channel, so owner-thread state is never shared.
#![forbid(unsafe_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, unbounded};
use rayon::{ThreadPool, ThreadPoolBuilder};
use sylva_gen::{GenInput, SpeciesCatalog, SpeciesPlacements, generate_placements};
use sylva_world::{ChunkKey, DistributionParams, Exclusion, HeightTile, NoiseParams, WorldBounds};

/// Request message handed to a worker. Mirrors the owner-side chunk request
/// with everything resolved to plain values plus a sampled height tile.
#[derive(Clone, Debug)]
pub struct GenJob {
    pub request_id: u64,
    pub key: ChunkKey,
    pub center_x: f32,
    pub center_z: f32,
    pub chunk_size: f32,
    pub seed: u32,
    pub density: f32,
    pub exclusions: Vec<Exclusion>,
    pub heights: HeightTile,
    pub noise: NoiseParams,
    pub distribution: DistributionParams,
    pub bounds: WorldBounds,
    pub species: Arc<SpeciesCatalog>,
}

/// Response message, correlated back to the request by id.
#[derive(Clone, Debug)]
pub struct GenJobOut {
    pub request_id: u64,
    pub key: ChunkKey,
    pub results: Vec<SpeciesPlacements>,
    pub accepted: usize,
    pub attempts: usize,
    pub t_gen_ms: u32,
}

/// Run one job to completion. Shared by the worker loop and the synchronous
/// fallback so both paths produce byte-identical buffers.
pub fn run_gen_job(job: &GenJob) -> GenJobOut {
    let t0 = Instant::now();
    let input = GenInput {
        center_x: job.center_x,
        center_z: job.center_z,
        chunk_size: job.chunk_size,
        seed: job.seed,
        density: job.density,
        exclusions: &job.exclusions,
        heights: &job.heights,
        noise: &job.noise,
        distribution: &job.distribution,
        bounds: &job.bounds,
    };
    let placed = generate_placements(&input, &job.species);
    GenJobOut {
        request_id: job.request_id,
        key: job.key,
        results: placed.per_species,
        accepted: placed.accepted,
        attempts: placed.attempts,
        t_gen_ms: t0.elapsed().as_millis().min(u128::from(u32::MAX)) as u32,
    }
}

pub struct Runtime {
    job_tx: Sender<GenJob>,
    res_rx: Receiver<GenJobOut>,
    _pool: Arc<ThreadPool>,
    queued: Arc<AtomicUsize>,
    inflight: Arc<AtomicUsize>,
    pub workers: usize,
}

impl Runtime {
    /// Spin up `workers` generation threads (0 picks from available
    /// parallelism, leaving one core for the owner thread).
    pub fn new(workers: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        let workers = if workers > 0 {
            workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get().saturating_sub(1))
                .unwrap_or(2)
                .max(1)
        };

        let (job_tx, job_rx) = unbounded::<GenJob>();
        let (res_tx, res_rx) = unbounded::<GenJobOut>();
        let queued = Arc::new(AtomicUsize::new(0));
        let inflight = Arc::new(AtomicUsize::new(0));

        let pool = Arc::new(
            ThreadPoolBuilder::new()
                .num_threads(workers)
                .thread_name(|i| format!("sylva-gen-{i}"))
                .build()?,
        );
        for _ in 0..workers {
            let rx = job_rx.clone();
            let tx = res_tx.clone();
            let queued = queued.clone();
            let inflight = inflight.clone();
            pool.spawn(move || {
                while let Ok(job) = rx.recv() {
                    queued.fetch_sub(1, Ordering::Relaxed);
                    inflight.fetch_add(1, Ordering::Relaxed);
                    let out = run_gen_job(&job);
                    inflight.fetch_sub(1, Ordering::Relaxed);
                    let _ = tx.send(out);
                }
            });
        }

        Ok(Self {
            job_tx,
            res_rx,
            _pool: pool,
            queued,
            inflight,
            workers,
        })
    }

    pub fn submit(&self, job: GenJob) {
        self.queued.fetch_add(1, Ordering::Relaxed);
        if self.job_tx.send(job).is_err() {
            self.queued.fetch_sub(1, Ordering::Relaxed);
        }
    }

    /// Non-blocking drain of whatever responses have arrived.
    pub fn drain_results(&self) -> Vec<GenJobOut> {
        self.res_rx.try_iter().collect()
    }

    pub fn queue_depth(&self) -> usize {
        self.queued.load(Ordering::Relaxed)
    }

    pub fn busy_workers(&self) -> usize {
        self.inflight.load(Ordering::Relaxed)
    }
}
