/// Height samples covering one chunk on a regular grid.
///
/// Built on the owner thread from the caller's height query, then moved into
/// generation jobs so workers never call back into caller code. Sampling is
/// bilinear between grid points and clamps at the tile edge, which keeps the
/// synchronous and background generation paths byte-identical.
#[derive(Clone, Debug)]
pub struct HeightTile {
    origin_x: f32,
    origin_z: f32,
    step: f32,
    side: usize,
    samples: Vec<f32>,
}

impl HeightTile {
    /// Sample `resolution` cells per side (so `resolution + 1` grid points)
    /// over the square chunk centered at (`center_x`, `center_z`).
    pub fn build<F>(center_x: f32, center_z: f32, chunk_size: f32, resolution: usize, height: F) -> Self
    where
        F: Fn(f32, f32) -> f32,
    {
        let cells = resolution.max(1);
        let side = cells + 1;
        let origin_x = center_x - chunk_size * 0.5;
        let origin_z = center_z - chunk_size * 0.5;
        let step = chunk_size / cells as f32;
        let mut samples = Vec::with_capacity(side * side);
        for iz in 0..side {
            for ix in 0..side {
                let x = origin_x + ix as f32 * step;
                let z = origin_z + iz as f32 * step;
                samples.push(height(x, z));
            }
        }
        Self {
            origin_x,
            origin_z,
            step,
            side,
            samples,
        }
    }

    /// Flat tile at a constant height; handy for tests and ocean chunks.
    pub fn flat(center_x: f32, center_z: f32, chunk_size: f32, height: f32) -> Self {
        Self::build(center_x, center_z, chunk_size, 1, |_, _| height)
    }

    pub fn sample(&self, x: f32, z: f32) -> f32 {
        let max_cell = (self.side - 1) as f32;
        let fx = ((x - self.origin_x) / self.step).clamp(0.0, max_cell);
        let fz = ((z - self.origin_z) / self.step).clamp(0.0, max_cell);
        let ix = (fx as usize).min(self.side - 2);
        let iz = (fz as usize).min(self.side - 2);
        let tx = fx - ix as f32;
        let tz = fz - iz as f32;
        let h00 = self.samples[iz * self.side + ix];
        let h10 = self.samples[iz * self.side + ix + 1];
        let h01 = self.samples[(iz + 1) * self.side + ix];
        let h11 = self.samples[(iz + 1) * self.side + ix + 1];
        let top = h00 + (h10 - h00) * tx;
        let bottom = h01 + (h11 - h01) * tx;
        top + (bottom - top) * tz
    }
}
