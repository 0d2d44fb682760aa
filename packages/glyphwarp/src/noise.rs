//! Deterministic 3D value noise.
//!
//! Hash-based lattice noise so results are identical across WASM and native.

use glam::Vec3;

/// Per-axis input offsets used to decorrelate the three displacement channels.
const CHANNEL_OFFSETS: [Vec3; 3] = [
    Vec3::new(0.0, 0.0, 0.0),
    Vec3::new(131.7, 47.3, 289.1),
    Vec3::new(523.9, 811.3, 97.7),
];

/// Seeded value-noise field returning values in [-1, 1].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoiseField {
    seed: u32,
}

impl NoiseField {
    pub fn new(seed: u32) -> Self {
        // Scramble so neighbouring seeds don't share lattice values.
        Self { seed: mix_seed(seed) }
    }

    /// Sample the field at a point.
    ///
    /// Continuous everywhere: lattice corners are blended with smoothstep
    /// weights, so crossing an integer boundary never jumps.
    pub fn sample(&self, x: f32, y: f32, z: f32) -> f32 {
        let ix = x.floor() as i32;
        let iy = y.floor() as i32;
        let iz = z.floor() as i32;

        let u = smoothstep(x - x.floor());
        let v = smoothstep(y - y.floor());
        let w = smoothstep(z - z.floor());

        let corner = |dx: i32, dy: i32, dz: i32| {
            hash_to_signed(hash_3d(
                ix.wrapping_add(dx),
                iy.wrapping_add(dy),
                iz.wrapping_add(dz),
                self.seed,
            ))
        };

        let nx00 = lerp(corner(0, 0, 0), corner(1, 0, 0), u);
        let nx10 = lerp(corner(0, 1, 0), corner(1, 1, 0), u);
        let nx01 = lerp(corner(0, 0, 1), corner(1, 0, 1), u);
        let nx11 = lerp(corner(0, 1, 1), corner(1, 1, 1), u);

        let nxy0 = lerp(nx00, nx10, v);
        let nxy1 = lerp(nx01, nx11, v);

        lerp(nxy0, nxy1, w)
    }

    /// Sample three decorrelated channels at `p`, advanced by `phase`.
    pub fn sample_vec3(&self, p: Vec3, phase: f32) -> Vec3 {
        let q = p + Vec3::splat(phase);
        let channel = |i: usize| {
            let s = q + CHANNEL_OFFSETS[i];
            self.sample(s.x, s.y, s.z)
        };
        Vec3::new(channel(0), channel(1), channel(2))
    }
}

impl Default for NoiseField {
    fn default() -> Self {
        Self::new(0)
    }
}

fn mix_seed(seed: u32) -> u32 {
    let mut h = seed ^ 0x27d4_eb2f;
    h = h.wrapping_mul(0x9e37_79b9);
    h ^= h >> 15;
    h
}

fn hash_3d(x: i32, y: i32, z: i32, seed: u32) -> u32 {
    let mut h = seed;
    h = h.wrapping_add(x as u32).wrapping_mul(0x9e3779b9);
    h = h.wrapping_add(y as u32).wrapping_mul(0x85ebca6b);
    h = h.wrapping_add(z as u32).wrapping_mul(0xc2b2ae35);
    h ^= h >> 16;
    h = h.wrapping_mul(0x85ebca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2ae35);
    h ^= h >> 16;
    h
}

fn hash_to_signed(h: u32) -> f32 {
    (h as f64 / u32::MAX as f64) as f32 * 2.0 - 1.0
}

fn smoothstep(t: f32) -> f32 {
    t * t * (3.0 - 2.0 * t)
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}
