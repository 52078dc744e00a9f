use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub cx: i32,
    pub cz: i32,
}

impl ChunkCoord {
    #[inline]
    pub const fn new(cx: i32, cz: i32) -> Self {
        Self { cx, cz }
    }

    #[inline]
    pub fn offset(self, dx: i32, dz: i32) -> Self {
        Self {
            cx: self.cx + dx,
            cz: self.cz + dz,
        }
    }

    #[inline]
    pub fn distance_sq(self, other: ChunkCoord) -> i64 {
        let dx = i64::from(self.cx - other.cx);
        let dz = i64::from(self.cz - other.cz);
        dx * dx + dz * dz
    }

    #[inline]
    pub fn key(self) -> ChunkKey {
        ChunkKey::from_coord(self)
    }

    /// World-space center of this chunk for a given chunk edge length.
    #[inline]
    pub fn center(self, chunk_size: f32) -> (f32, f32) {
        (
            self.cx as f32 * chunk_size + chunk_size * 0.5,
            self.cz as f32 * chunk_size + chunk_size * 0.5,
        )
    }
}

impl From<(i32, i32)> for ChunkCoord {
    fn from(value: (i32, i32)) -> Self {
        Self::new(value.0, value.1)
    }
}

impl From<ChunkCoord> for (i32, i32) {
    fn from(value: ChunkCoord) -> Self {
        (value.cx, value.cz)
    }
}

/// Packed chunk identity: cx in the high 32 bits, cz in the low 32 bits.
/// The sole key type for every pending/inflight/loaded/delete collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkKey(pub u64);

impl ChunkKey {
    #[inline]
    pub fn from_coord(c: ChunkCoord) -> Self {
        Self((u64::from(c.cx as u32) << 32) | u64::from(c.cz as u32))
    }

    #[inline]
    pub fn coord(self) -> ChunkCoord {
        ChunkCoord::new((self.0 >> 32) as u32 as i32, self.0 as u32 as i32)
    }
}

impl From<ChunkCoord> for ChunkKey {
    fn from(value: ChunkCoord) -> Self {
        Self::from_coord(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_round_trips_extremes() {
        for &(cx, cz) in &[
            (0, 0),
            (-1, 0),
            (0, -1),
            (i32::MIN, i32::MAX),
            (i32::MAX, i32::MIN),
            (-37, 2_000_000),
        ] {
            let c = ChunkCoord::new(cx, cz);
            assert_eq!(ChunkKey::from_coord(c).coord(), c);
        }
    }

    #[test]
    fn center_is_half_chunk_in() {
        let (x, z) = ChunkCoord::new(0, 0).center(64.0);
        assert_eq!((x, z), (32.0, 32.0));
        let (x, z) = ChunkCoord::new(-1, 2).center(64.0);
        assert_eq!((x, z), (-32.0, 160.0));
    }
}
