use serde::Deserialize;
use std::error::Error;
use std::fs;
use std::path::Path;

use crate::area::WorldBounds;

/// Parameters for the multi-octave sine field sampled per candidate point.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct NoiseParams {
    #[serde(default = "default_octaves")]
    pub octaves: u32,
    #[serde(default = "default_frequency")]
    pub frequency: f32,
    #[serde(default = "default_lacunarity")]
    pub lacunarity: f32,
    #[serde(default = "default_gain")]
    pub gain: f32,
}

fn default_octaves() -> u32 {
    3
}
fn default_frequency() -> f32 {
    0.035
}
fn default_lacunarity() -> f32 {
    2.0
}
fn default_gain() -> f32 {
    0.5
}

impl Default for NoiseParams {
    fn default() -> Self {
        Self {
            octaves: default_octaves(),
            frequency: default_frequency(),
            lacunarity: default_lacunarity(),
            gain: default_gain(),
        }
    }
}

/// Acceptance and oversampling tuning for the placement loop.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct DistributionParams {
    #[serde(default = "default_target")]
    pub target_per_chunk: usize,
    #[serde(default = "default_base_threshold")]
    pub base_threshold: f32,
    /// Denseness shifts the threshold by up to half this span in either
    /// direction: dense chunks accept more, sparse chunks keep clearings.
    #[serde(default = "default_density_shift")]
    pub density_shift: f32,
    #[serde(default = "default_oversample")]
    pub oversample_factor: f32,
    #[serde(default = "default_jitter")]
    pub jitter: f32,
    #[serde(default = "default_min_altitude")]
    pub min_altitude: f32,
}

fn default_target() -> usize {
    160
}
fn default_base_threshold() -> f32 {
    0.55
}
fn default_density_shift() -> f32 {
    0.35
}
fn default_oversample() -> f32 {
    4.0
}
fn default_jitter() -> f32 {
    0.05
}
fn default_min_altitude() -> f32 {
    1.0
}

impl Default for DistributionParams {
    fn default() -> Self {
        Self {
            target_per_chunk: default_target(),
            base_threshold: default_base_threshold(),
            density_shift: default_density_shift(),
            oversample_factor: default_oversample(),
            jitter: default_jitter(),
            min_altitude: default_min_altitude(),
        }
    }
}

/// Capacity-bucket tuning for the instance pool.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct PoolParams {
    #[serde(default = "default_small_bucket")]
    pub small_bucket: usize,
    #[serde(default = "default_bucket_step")]
    pub bucket_step: usize,
    #[serde(default = "default_near_cap")]
    pub near_cap: usize,
    #[serde(default = "default_far_cap")]
    pub far_cap: usize,
}

fn default_small_bucket() -> usize {
    32
}
fn default_bucket_step() -> usize {
    64
}
fn default_near_cap() -> usize {
    128
}
fn default_far_cap() -> usize {
    512
}

impl Default for PoolParams {
    fn default() -> Self {
        Self {
            small_bucket: default_small_bucket(),
            bucket_step: default_bucket_step(),
            near_cap: default_near_cap(),
            far_cap: default_far_cap(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchOrder {
    /// Newest-requested first (tail pop); matches the tuned streaming feel.
    #[default]
    Lifo,
    Fifo,
}

/// Top-level streaming configuration, loadable from TOML.
#[derive(Clone, Debug, Deserialize)]
pub struct StreamConfig {
    #[serde(default)]
    pub world_seed: u32,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: f32,
    /// Chunks whose center is within this many chunks of the viewer at
    /// dispatch time get the near (high-fidelity) LOD variant.
    #[serde(default = "default_near_radius")]
    pub near_radius_chunks: i32,
    /// Inflight cap is `max_chunks * inflight_factor` per `process_pending`.
    #[serde(default = "default_inflight_factor")]
    pub inflight_factor: usize,
    /// Background worker threads; 0 picks from available parallelism.
    #[serde(default)]
    pub workers: usize,
    #[serde(default = "default_tile_resolution")]
    pub height_tile_resolution: usize,
    #[serde(default)]
    pub dispatch_order: DispatchOrder,
    #[serde(default)]
    pub noise: NoiseParams,
    #[serde(default)]
    pub distribution: DistributionParams,
    #[serde(default)]
    pub pool: PoolParams,
    #[serde(default)]
    pub bounds: WorldBounds,
}

fn default_chunk_size() -> f32 {
    64.0
}
fn default_near_radius() -> i32 {
    2
}
fn default_inflight_factor() -> usize {
    3
}
fn default_tile_resolution() -> usize {
    8
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            world_seed: 0,
            chunk_size: default_chunk_size(),
            near_radius_chunks: default_near_radius(),
            inflight_factor: default_inflight_factor(),
            workers: 0,
            height_tile_resolution: default_tile_resolution(),
            dispatch_order: DispatchOrder::default(),
            noise: NoiseParams::default(),
            distribution: DistributionParams::default(),
            pool: PoolParams::default(),
            bounds: WorldBounds::default(),
        }
    }
}

impl StreamConfig {
    pub fn load_from_path(path: &Path) -> Result<Self, Box<dyn Error>> {
        let text = fs::read_to_string(path)?;
        let cfg: StreamConfig = toml::from_str(&text)?;
        Ok(cfg)
    }
}
