use serde::Deserialize;
use std::error::Error;
use std::fs;
use std::path::Path;

/// Index into the catalog; stable for the life of the process.
pub type SpeciesId = u16;

#[derive(Clone, Debug, Deserialize)]
pub struct SpeciesDef {
    pub name: String,
    #[serde(default = "default_probability")]
    pub probability: f32,
    #[serde(default = "default_scale_min")]
    pub scale_min: f32,
    #[serde(default = "default_scale_max")]
    pub scale_max: f32,
    #[serde(default)]
    pub trunk_material: String,
    #[serde(default)]
    pub canopy_material: String,
    /// Geometry tags resolved by the renderer; near is the high-fidelity
    /// variant, far the bulk procedural one.
    #[serde(default)]
    pub near_geometry: String,
    #[serde(default)]
    pub far_geometry: String,
}

fn default_probability() -> f32 {
    1.0
}
fn default_scale_min() -> f32 {
    0.8
}
fn default_scale_max() -> f32 {
    1.3
}

#[derive(Deserialize)]
struct CatalogConfig {
    #[serde(default)]
    species: Vec<SpeciesDef>,
}

/// Static per-species definitions, built once at startup and shared by all
/// chunks. Roulette selection runs over cumulative probabilities.
#[derive(Clone, Debug)]
pub struct SpeciesCatalog {
    defs: Vec<SpeciesDef>,
    cumulative: Vec<f32>,
}

impl SpeciesCatalog {
    pub fn new(defs: Vec<SpeciesDef>) -> Self {
        let mut cumulative = Vec::with_capacity(defs.len());
        let mut acc = 0.0_f32;
        for def in &defs {
            acc += def.probability.max(0.0);
            cumulative.push(acc);
        }
        Self { defs, cumulative }
    }

    pub fn load_from_path(path: &Path) -> Result<Self, Box<dyn Error>> {
        let text = fs::read_to_string(path)?;
        let cfg: CatalogConfig = toml::from_str(&text)?;
        Ok(Self::new(cfg.species))
    }

    /// Stock catalog used by the demo harness and tests.
    pub fn builtin() -> Self {
        let def = |name: &str, probability: f32, scale: (f32, f32)| SpeciesDef {
            name: name.to_string(),
            probability,
            scale_min: scale.0,
            scale_max: scale.1,
            trunk_material: format!("{name}_bark"),
            canopy_material: format!("{name}_canopy"),
            near_geometry: format!("{name}_near"),
            far_geometry: format!("{name}_far"),
        };
        Self::new(vec![
            def("pine", 0.55, (0.9, 1.6)),
            def("oak", 0.30, (0.8, 1.3)),
            def("birch", 0.15, (0.7, 1.1)),
        ])
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    #[inline]
    pub fn get(&self, id: SpeciesId) -> Option<&SpeciesDef> {
        self.defs.get(usize::from(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = (SpeciesId, &SpeciesDef)> {
        self.defs
            .iter()
            .enumerate()
            .map(|(i, def)| (i as SpeciesId, def))
    }

    /// Weighted roulette: first species whose cumulative probability covers
    /// the draw. A draw past the last bucket (rounding) falls back to the
    /// first species so an accepted point is never discarded here.
    pub fn roulette(&self, draw: f32) -> SpeciesId {
        debug_assert!(!self.defs.is_empty());
        let total = self.cumulative.last().copied().unwrap_or(0.0);
        let scaled = draw * total;
        for (i, &acc) in self.cumulative.iter().enumerate() {
            if scaled <= acc {
                return i as SpeciesId;
            }
        }
        0
    }
}
