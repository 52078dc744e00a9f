//! Capacity-bucketed reuse pool for instanced draw-batch pairs.
//!
//! A batch pair's buffers are sized once at construction and never resized;
//! streaming churn only moves pairs between free lists and loaded chunks and
//! rewrites `count` plus buffer contents.
#![forbid(unsafe_code)]

use hashbrown::HashMap;
use sylva_gen::SpeciesId;
use sylva_world::PoolParams;

/// LOD tier, fixed at apply time for a chunk's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Variant {
    Near,
    Far,
}

impl Variant {
    #[inline]
    pub fn capacity_cap(self, params: &PoolParams) -> usize {
        match self {
            Variant::Near => params.near_cap,
            Variant::Far => params.far_cap,
        }
    }
}

/// Round a required instance count up to its pool bucket: small counts share
/// the small bucket, larger ones round up to the step multiple, everything
/// clamps at the variant's capacity cap.
pub fn bucket_for(required: usize, variant: Variant, params: &PoolParams) -> usize {
    let cap = variant.capacity_cap(params).max(1);
    if required <= params.small_bucket {
        return params.small_bucket.min(cap);
    }
    let step = params.bucket_step.max(1);
    let rounded = required.div_ceil(step) * step;
    rounded.min(cap)
}

/// One GPU-facing instanced batch: a transform buffer (4 floats per
/// instance: x, z, rotation, scale) and a visibility mask, both sized to
/// `capacity` for the life of the batch.
#[derive(Clone, Debug)]
pub struct InstanceBatch {
    capacity: usize,
    count: usize,
    pub transforms: Vec<f32>,
    pub visibility: Vec<u8>,
}

impl InstanceBatch {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            count: 0,
            transforms: vec![0.0; capacity * 4],
            visibility: vec![0; capacity],
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Copy placement transforms in, clamping to capacity. Returns the number
    /// of live instances actually uploaded; truncation is policy, not error.
    pub fn upload(&mut self, transforms: &[f32]) -> usize {
        let n = (transforms.len() / 4).min(self.capacity);
        self.transforms[..n * 4].copy_from_slice(&transforms[..n * 4]);
        for v in &mut self.visibility[..n] {
            *v = 1;
        }
        for v in &mut self.visibility[n..] {
            *v = 0;
        }
        self.count = n;
        n
    }

    fn reset(&mut self) {
        self.count = 0;
        self.visibility.fill(0);
    }
}

/// Trunk + canopy batches for one species within one chunk. Either checked
/// out by exactly one loaded chunk or resting in exactly one free list.
#[derive(Clone, Debug)]
pub struct BatchPair {
    pub species: SpeciesId,
    pub variant: Variant,
    pub trunk: InstanceBatch,
    pub canopy: InstanceBatch,
    trunk_material: String,
    canopy_material: String,
}

impl BatchPair {
    fn new(species: SpeciesId, variant: Variant, capacity: usize) -> Self {
        Self {
            species,
            variant,
            trunk: InstanceBatch::new(capacity),
            canopy: InstanceBatch::new(capacity),
            trunk_material: String::new(),
            canopy_material: String::new(),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.trunk.capacity()
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.trunk.count()
    }

    /// Geometry and buffers are reused as-is across checkouts; only the
    /// material tags change.
    pub fn retag(&mut self, trunk_material: &str, canopy_material: &str) {
        if self.trunk_material != trunk_material {
            self.trunk_material.clear();
            self.trunk_material.push_str(trunk_material);
        }
        if self.canopy_material != canopy_material {
            self.canopy_material.clear();
            self.canopy_material.push_str(canopy_material);
        }
    }

    pub fn materials(&self) -> (&str, &str) {
        (&self.trunk_material, &self.canopy_material)
    }

    /// Upload the same transforms to both halves; returns the clamped live
    /// instance count.
    pub fn upload(&mut self, transforms: &[f32]) -> usize {
        let n = self.trunk.upload(transforms);
        self.canopy.upload(&transforms[..n * 4]);
        n
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PoolStats {
    pub hits: u64,
    pub misses: u64,
    pub constructed: u64,
    pub released: u64,
    pub free: usize,
    pub checked_out: usize,
}

#[derive(Clone, Copy, Debug)]
pub struct PrewarmSpec {
    pub species: SpeciesId,
    pub variant: Variant,
    pub expected_instances: usize,
    pub pairs: usize,
}

/// Explicitly owned pool instance; callers pass it by `&mut` into the
/// streaming operations that acquire or release batches.
pub struct PoolManager {
    params: PoolParams,
    free: HashMap<(SpeciesId, Variant, usize), Vec<BatchPair>>,
    hits: u64,
    misses: u64,
    constructed: u64,
    released: u64,
    checked_out: usize,
}

impl PoolManager {
    pub fn new(params: PoolParams) -> Self {
        Self {
            params,
            free: HashMap::new(),
            hits: 0,
            misses: 0,
            constructed: 0,
            released: 0,
            checked_out: 0,
        }
    }

    #[inline]
    pub fn params(&self) -> &PoolParams {
        &self.params
    }

    /// Check out a pair sized for `required` instances. Pops a pooled pair on
    /// hit; constructs a fresh one at the bucket capacity on miss (the normal
    /// cold-start path).
    pub fn acquire(&mut self, species: SpeciesId, variant: Variant, required: usize) -> BatchPair {
        let capacity = bucket_for(required, variant, &self.params);
        self.checked_out += 1;
        if let Some(list) = self.free.get_mut(&(species, variant, capacity)) {
            if let Some(pair) = list.pop() {
                self.hits += 1;
                return pair;
            }
        }
        self.misses += 1;
        self.constructed += 1;
        BatchPair::new(species, variant, capacity)
    }

    /// Check a pair back in: visibility goes dark, count resets, and the pair
    /// joins the free list for its (species, variant, capacity) key.
    pub fn release(&mut self, mut pair: BatchPair) {
        pair.trunk.reset();
        pair.canopy.reset();
        self.released += 1;
        self.checked_out = self.checked_out.saturating_sub(1);
        self.free
            .entry((pair.species, pair.variant, pair.capacity()))
            .or_default()
            .push(pair);
    }

    /// Pre-populate free lists before streaming begins so first-use frames do
    /// not pay the allocation spike.
    pub fn prewarm(&mut self, specs: &[PrewarmSpec]) {
        for spec in specs {
            let capacity = bucket_for(spec.expected_instances, spec.variant, &self.params);
            let list = self
                .free
                .entry((spec.species, spec.variant, capacity))
                .or_default();
            for _ in 0..spec.pairs {
                self.constructed += 1;
                list.push(BatchPair::new(spec.species, spec.variant, capacity));
            }
        }
    }

    pub fn free_pairs(&self) -> usize {
        self.free.values().map(Vec::len).sum()
    }

    pub fn free_pairs_for(&self, species: SpeciesId, variant: Variant, capacity: usize) -> usize {
        self.free
            .get(&(species, variant, capacity))
            .map_or(0, Vec::len)
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            hits: self.hits,
            misses: self.misses,
            constructed: self.constructed,
            released: self.released,
            free: self.free_pairs(),
            checked_out: self.checked_out,
        }
    }
}
