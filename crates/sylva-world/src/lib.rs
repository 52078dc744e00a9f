//! Chunk identity, streaming configuration, and height sampling.
#![forbid(unsafe_code)]

mod area;
mod chunk_coord;
mod config;
mod height_tile;

pub use area::{Exclusion, WorldBounds};
pub use chunk_coord::{ChunkCoord, ChunkKey};
pub use config::{
    DispatchOrder, DistributionParams, NoiseParams, PoolParams, StreamConfig,
};
pub use height_tile::HeightTile;
