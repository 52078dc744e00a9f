use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use hashbrown::HashSet;
use sylva_gen::SpeciesCatalog;
use sylva_pool::{PoolManager, PrewarmSpec, Variant};
use sylva_stream::{Budgets, Streamer};
use sylva_world::{ChunkCoord, ChunkKey, Exclusion, StreamConfig};

/// Headless vegetation-streaming simulation: a viewer drifts through the
/// world while chunks stream in and out. Used for profiling and smoke runs.
#[derive(Parser, Debug)]
#[command(name = "sylva")]
struct Args {
    /// World seed
    #[arg(long, default_value_t = 42)]
    seed: u32,
    /// Keep radius around the viewer, in chunks
    #[arg(long, default_value_t = 4)]
    radius: i32,
    /// Frames to simulate
    #[arg(long, default_value_t = 240)]
    frames: usize,
    /// Background worker threads (0 = auto)
    #[arg(long, default_value_t = 0)]
    workers: usize,
    /// Chunk budget per frame for dispatch and apply
    #[arg(long, default_value_t = 4)]
    chunks_per_frame: usize,
    /// Streaming config TOML
    #[arg(long)]
    config: Option<PathBuf>,
    /// Species catalog TOML
    #[arg(long)]
    species: Option<PathBuf>,
}

fn demo_height(x: f32, z: f32) -> f32 {
    8.0 + 6.0 * (x * 0.011).sin() * (z * 0.013).cos()
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    if let Err(e) = run(args) {
        log::error!("{e}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut cfg = match &args.config {
        Some(path) => StreamConfig::load_from_path(path)?,
        None => StreamConfig::default(),
    };
    cfg.world_seed = args.seed;
    cfg.workers = args.workers;

    let species = Arc::new(match &args.species {
        Some(path) => SpeciesCatalog::load_from_path(path)?,
        None => SpeciesCatalog::builtin(),
    });

    let mut pool = PoolManager::new(cfg.pool);
    let per_species = cfg.distribution.target_per_chunk / species.len().max(1);
    let prewarm: Vec<PrewarmSpec> = species
        .iter()
        .map(|(id, _)| PrewarmSpec {
            species: id,
            variant: Variant::Far,
            expected_instances: per_species,
            pairs: 4,
        })
        .collect();
    pool.prewarm(&prewarm);
    log::info!("prewarmed {} batch pair(s)", pool.stats().free);

    let mut streamer = Streamer::new(cfg.clone(), Arc::clone(&species));
    let exclusions = [Exclusion::new(0.0, 0.0, 40.0)];
    let budgets = Budgets::default();

    for frame in 0..args.frames {
        let vx = frame as f32 * 3.0;
        let vz = (frame as f32 * 0.05).sin() * 64.0;
        let viewer_chunk = ChunkCoord::new(
            (vx / cfg.chunk_size).floor() as i32,
            (vz / cfg.chunk_size).floor() as i32,
        );

        let mut keep: HashSet<ChunkKey> = HashSet::new();
        let r = args.radius;
        for dz in -r..=r {
            for dx in -r..=r {
                if dx * dx + dz * dz > r * r {
                    continue;
                }
                let coord = viewer_chunk.offset(dx, dz);
                keep.insert(coord.key());
                streamer.request_chunk(coord.cx, coord.cz, demo_height, &exclusions, (vx, vz));
            }
        }
        streamer.prune_chunks(&keep);
        let summary = streamer.process_pending(args.chunks_per_frame, &budgets, &mut pool);

        if frame % 30 == 0 {
            log::info!(
                "frame {frame}: loaded={} pending={} inflight={} applied={} deleted={} upload={}B",
                streamer.loaded_chunk_count(),
                streamer.pending_count(),
                streamer.inflight_count(),
                summary.applied,
                summary.deleted,
                summary.bytes_uploaded,
            );
        }
    }

    // let inflight work settle so the final numbers are meaningful
    for _ in 0..500 {
        if streamer.pending_count() == 0
            && streamer.inflight_count() == 0
            && streamer.ready_count() == 0
        {
            break;
        }
        streamer.process_pending(args.chunks_per_frame, &Budgets::generous(), &mut pool);
        std::thread::sleep(Duration::from_millis(2));
    }

    let totals = streamer.totals();
    let pstats = pool.stats();
    log::info!(
        "done: loaded={} dispatched={} inline={} applied={} deleted={} discarded={} uploaded={}B",
        streamer.loaded_chunk_count(),
        totals.dispatched,
        totals.generated_inline,
        totals.applied,
        totals.deleted,
        totals.discarded,
        totals.bytes_uploaded,
    );
    log::info!(
        "pool: constructed={} hits={} misses={} free={} checked_out={}",
        pstats.constructed,
        pstats.hits,
        pstats.misses,
        pstats.free,
        pstats.checked_out,
    );
    Ok(())
}
