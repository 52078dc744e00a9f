use serde::{Deserialize, Serialize};

/// Circular keep-out region (clearings, structures, water bodies).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Exclusion {
    pub x: f32,
    pub z: f32,
    pub radius: f32,
}

impl Exclusion {
    #[inline]
    pub const fn new(x: f32, z: f32, radius: f32) -> Self {
        Self { x, z, radius }
    }

    #[inline]
    pub fn contains(&self, x: f32, z: f32) -> bool {
        let dx = x - self.x;
        let dz = z - self.z;
        dx * dx + dz * dz <= self.radius * self.radius
    }
}

/// Hard generation cutoff around the world origin. Chunks whose center lies
/// beyond `radius + margin` are guaranteed empty and skip sampling entirely.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct WorldBounds {
    #[serde(default = "default_bounds_radius")]
    pub radius: f32,
    #[serde(default = "default_bounds_margin")]
    pub margin: f32,
}

fn default_bounds_radius() -> f32 {
    4096.0
}
fn default_bounds_margin() -> f32 {
    64.0
}

impl Default for WorldBounds {
    fn default() -> Self {
        Self {
            radius: default_bounds_radius(),
            margin: default_bounds_margin(),
        }
    }
}

impl WorldBounds {
    #[inline]
    pub fn allows(&self, center_x: f32, center_z: f32) -> bool {
        let limit = self.radius + self.margin;
        center_x * center_x + center_z * center_z <= limit * limit
    }
}
