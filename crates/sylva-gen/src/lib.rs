//! Deterministic vegetation placement: per-chunk RNG streams, noise fields,
//! the species catalog, and the oversampled accept/reject generator.
#![forbid(unsafe_code)]

mod noise;
mod placement;
mod rng;
mod species;

pub use noise::{denseness, sine_field};
pub use placement::{ChunkPlacements, GenInput, SpeciesPlacements, generate_placements};
pub use rng::{ChunkRng, chunk_seed};
pub use species::{SpeciesCatalog, SpeciesDef, SpeciesId};
