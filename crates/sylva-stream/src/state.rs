use sylva_gen::SpeciesId;
use sylva_pool::{BatchPair, Variant};
use sylva_world::ChunkKey;

/// Authoritative lifecycle state for one chunk key. A key holds exactly one
/// state at a time; cancellation removes the key entirely, and a response
/// arriving for an absent key is discarded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkState {
    /// Queued, not yet handed to generation.
    Pending,
    /// Dispatched to the background context, awaiting a response.
    Inflight,
    /// Response received, awaiting a budgeted apply.
    Ready,
    /// Batches attached, instances live.
    Loaded,
    /// Queued for a budgeted release of its batches.
    Deleting,
}

/// One species' checked-out batch pair within a loaded chunk, plus the
/// position buffer kept index-aligned with the uploaded transforms for
/// interaction queries.
#[derive(Debug)]
pub struct ChunkEntry {
    pub species: SpeciesId,
    pub pair: BatchPair,
    pub positions: Vec<f32>,
}

#[derive(Debug)]
pub struct LoadedChunk {
    pub key: ChunkKey,
    pub variant: Variant,
    pub entries: Vec<ChunkEntry>,
}

impl LoadedChunk {
    pub fn new(key: ChunkKey, variant: Variant) -> Self {
        Self {
            key,
            variant,
            entries: Vec::new(),
        }
    }

    pub fn instance_count(&self) -> usize {
        self.entries.iter().map(|e| e.pair.count()).sum()
    }
}
