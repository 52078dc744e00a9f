use sylva_world::{DistributionParams, Exclusion, HeightTile, NoiseParams, WorldBounds};

use crate::noise::sine_field;
use crate::rng::ChunkRng;
use crate::species::{SpeciesCatalog, SpeciesId};

/// Everything the generator needs for one chunk. Pure data plus the height
/// tile; identical inputs produce identical buffers on any thread.
#[derive(Clone, Debug)]
pub struct GenInput<'a> {
    pub center_x: f32,
    pub center_z: f32,
    pub chunk_size: f32,
    pub seed: u32,
    /// Macro denseness for this chunk in [0, 1].
    pub density: f32,
    pub exclusions: &'a [Exclusion],
    pub heights: &'a HeightTile,
    pub noise: &'a NoiseParams,
    pub distribution: &'a DistributionParams,
    pub bounds: &'a WorldBounds,
}

/// Accepted placements for one species within one chunk.
///
/// `transforms` holds 4 values per instance (x, z, rotation, scale);
/// `positions` holds 2 per instance (x, z) and stays index-aligned with
/// `transforms` so interaction queries can use it directly.
#[derive(Clone, Debug, PartialEq)]
pub struct SpeciesPlacements {
    pub species: SpeciesId,
    pub transforms: Vec<f32>,
    pub positions: Vec<f32>,
}

impl SpeciesPlacements {
    fn new(species: SpeciesId) -> Self {
        Self {
            species,
            transforms: Vec::new(),
            positions: Vec::new(),
        }
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.transforms.len() / 4
    }
}

#[derive(Clone, Debug, Default)]
pub struct ChunkPlacements {
    pub per_species: Vec<SpeciesPlacements>,
    pub accepted: usize,
    pub attempts: usize,
}

impl ChunkPlacements {
    pub fn total_instances(&self) -> usize {
        self.per_species.iter().map(|s| s.count()).sum()
    }
}

/// Oversampled accept/reject placement over one chunk.
///
/// Draws up to `target * oversample_factor` candidates (noise, exclusion and
/// altitude rejection discard many), stopping early once `target` instances
/// are accepted. Sparse chunks raise the effective noise threshold to keep
/// clearings clean; dense chunks lower it. The per-attempt jitter softens the
/// threshold contour so patch edges do not read as iso-lines.
pub fn generate_placements(input: &GenInput<'_>, catalog: &SpeciesCatalog) -> ChunkPlacements {
    let dist = input.distribution;
    let target = dist.target_per_chunk;
    if target == 0 || catalog.is_empty() || !input.bounds.allows(input.center_x, input.center_z) {
        return ChunkPlacements::default();
    }

    let budget = target.max((target as f32 * dist.oversample_factor).ceil() as usize);
    let threshold = dist.base_threshold + (0.5 - input.density) * dist.density_shift;
    let half = input.chunk_size * 0.5;

    let mut rng = ChunkRng::new(input.seed);
    let mut per_species: Vec<SpeciesPlacements> = catalog
        .iter()
        .map(|(id, _)| SpeciesPlacements::new(id))
        .collect();
    let mut accepted = 0usize;
    let mut attempts = 0usize;

    for _ in 0..budget {
        if accepted >= target {
            break;
        }
        attempts += 1;

        let x = input.center_x + rng.next_range(-half, half);
        let z = input.center_z + rng.next_range(-half, half);
        let jitter = rng.next_range(-dist.jitter, dist.jitter);
        if sine_field(x, z, input.noise) < threshold + jitter {
            continue;
        }
        if input.exclusions.iter().any(|e| e.contains(x, z)) {
            continue;
        }
        if input.heights.sample(x, z) < dist.min_altitude {
            continue;
        }

        let species = catalog.roulette(rng.next_f32());
        // roulette guarantees a valid id for a non-empty catalog
        let def = match catalog.get(species) {
            Some(def) => def,
            None => continue,
        };
        let rotation = rng.next_range(0.0, std::f32::consts::TAU);
        let scale = rng.next_range(def.scale_min, def.scale_max);

        let bucket = &mut per_species[usize::from(species)];
        bucket.transforms.extend_from_slice(&[x, z, rotation, scale]);
        bucket.positions.extend_from_slice(&[x, z]);
        accepted += 1;
    }

    per_species.retain(|s| !s.transforms.is_empty());
    ChunkPlacements {
        per_species,
        accepted,
        attempts,
    }
}
