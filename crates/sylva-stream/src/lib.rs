//! Chunk streaming scheduler: request dedup, budgeted dispatch and apply,
//! pruning, and the per-key lifecycle state machine.
#![forbid(unsafe_code)]

mod state;
mod streamer;

pub use state::{ChunkEntry, ChunkState, LoadedChunk};
pub use streamer::{Budgets, ProcessSummary, StreamTotals, Streamer};
