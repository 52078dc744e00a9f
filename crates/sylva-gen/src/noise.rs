use fastnoise_lite::{FastNoiseLite, NoiseType};
use sylva_world::NoiseParams;

/// Multi-octave sine field in [0, 1]. Pure function of its inputs so the
/// synchronous and background generation paths agree bit-for-bit.
pub fn sine_field(x: f32, z: f32, params: &NoiseParams) -> f32 {
    let mut freq = params.frequency;
    let mut amp = 1.0_f32;
    let mut sum = 0.0_f32;
    let mut norm = 0.0_f32;
    for octave in 0..params.octaves.max(1) {
        // per-octave phase offsets keep the lattices from lining up
        let phase = octave as f32 * 1.7;
        let v = (x * freq + phase).sin() * (z * freq * 0.87 - phase).sin()
            + 0.5 * ((x + z) * freq * 0.61 + phase).sin();
        sum += amp * v;
        norm += amp * 1.5;
        freq *= params.lacunarity;
        amp *= params.gain;
    }
    ((sum / norm) * 0.5 + 0.5).clamp(0.0, 1.0)
}

/// Macro denseness field, one value per chunk in [0, 1]. Low-frequency
/// OpenSimplex2 over chunk coordinates; drives the acceptance threshold
/// shift so forests come out patchy instead of uniform.
pub fn denseness(cx: i32, cz: i32, world_seed: u32) -> f32 {
    let mut noise = FastNoiseLite::with_seed(world_seed as i32 ^ 0x51_7A3D);
    noise.set_noise_type(Some(NoiseType::OpenSimplex2));
    noise.set_frequency(Some(0.05));
    let v = noise.get_noise_2d(cx as f32, cz as f32);
    (v * 0.5 + 0.5).clamp(0.0, 1.0)
}
