//! Per-vertex spring-damper simulation over a base mesh.
//!
//! The simulation owns one arena of same-length flat buffers (base positions
//! and normals via [`BaseMesh`], current positions, velocities). Index `i`
//! addresses the same vertex in every buffer. New geometry means a new
//! simulation; buffers are never resized.

use glam::{EulerRot, Quat, Vec3};

use crate::mesh::BaseMesh;
use crate::noise::NoiseField;
use crate::params::DistortionParams;

/// Per-frame inputs shared by every vertex.
#[derive(Debug, Clone, Copy)]
pub struct StepInputs<'a> {
    /// Smoothed attention point in mesh-local space.
    pub attention: Vec3,
    /// Blend between base and fully displaced geometry.
    pub mix: f32,
    /// Simulation time in seconds (drives the noise phase).
    pub time: f32,
    pub params: &'a DistortionParams,
}

/// Compute the mix factor from engagement, idle floor and pause blend.
///
/// The idle floor guarantees ambient motion; engagement can only raise it.
/// The pause blend scales both toward zero.
pub fn mix_factor(engagement: f32, idle_mix: f32, pause_blend: f32) -> f32 {
    engagement.max(idle_mix) * (1.0 - pause_blend.clamp(0.0, 1.0))
}

/// Pointer influence for a vertex at `distance` from the attention point.
///
/// A hard cutoff: full explode amplitude inside the radius, nothing outside.
pub fn pointer_influence(distance: f32, params: &DistortionParams) -> f32 {
    if distance <= params.effective_radius() {
        params.explode_amplitude
    } else {
        0.0
    }
}

/// Owned simulation state for one mesh.
#[derive(Debug, Clone)]
pub struct VertexSimulation {
    base: BaseMesh,
    positions: Vec<f32>,
    velocities: Vec<f32>,
    noise: NoiseField,
    seed: u32,
}

impl VertexSimulation {
    pub fn new(base: BaseMesh, seed: u32) -> Self {
        let positions = base.positions().to_vec();
        let velocities = vec![0.0; positions.len()];
        Self {
            base,
            positions,
            velocities,
            noise: NoiseField::new(seed),
            seed,
        }
    }

    /// Seed the noise field was built from.
    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn base(&self) -> &BaseMesh {
        &self.base
    }

    pub fn vertex_count(&self) -> usize {
        self.base.vertex_count()
    }

    pub fn positions(&self) -> &[f32] {
        &self.positions
    }

    pub fn velocities(&self) -> &[f32] {
        &self.velocities
    }

    pub fn position(&self, index: usize) -> Vec3 {
        Vec3::from_slice(&self.positions[index * 3..index * 3 + 3])
    }

    pub fn velocity(&self, index: usize) -> Vec3 {
        Vec3::from_slice(&self.velocities[index * 3..index * 3 + 3])
    }

    /// Fill `out` with per-vertex speed for the emissive effect.
    pub fn velocity_magnitudes(&self, out: &mut Vec<f32>) {
        out.clear();
        out.extend(
            self.velocities
                .chunks_exact(3)
                .map(|v| (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()),
        );
    }

    /// Raw bytes of the position buffer for GPU upload.
    pub fn position_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.positions)
    }

    /// Raw bytes of the velocity buffer for GPU upload.
    pub fn velocity_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.velocities)
    }

    /// Return every vertex to its base position at rest.
    pub fn reset(&mut self) {
        self.positions.copy_from_slice(self.base.positions());
        self.velocities.fill(0.0);
    }

    /// Target position of vertex `index` for this frame.
    pub fn target(&self, index: usize, inputs: &StepInputs<'_>) -> Vec3 {
        let base = self.base.position(index);
        let normal = self.base.normal(index);
        let current = self.position(index);
        displaced_target(&self.noise, base, normal, current, inputs)
    }

    /// Advance every vertex by one frame.
    pub fn step(&mut self, inputs: &StepInputs<'_>) {
        let params = inputs.params;
        let base_positions = self.base.positions();
        let base_normals = self.base.normals();

        for i in 0..base_positions.len() / 3 {
            let o = i * 3;
            let base = Vec3::from_slice(&base_positions[o..o + 3]);
            let normal = Vec3::from_slice(&base_normals[o..o + 3]);
            let current = Vec3::from_slice(&self.positions[o..o + 3]);
            let mut velocity = Vec3::from_slice(&self.velocities[o..o + 3]);

            let target = displaced_target(&self.noise, base, normal, current, inputs);

            // Semi-implicit Euler: displace with the new velocity, then damp.
            velocity += (target - current) * params.spring;
            let next = current + velocity;
            velocity *= params.friction;

            next.write_to_slice(&mut self.positions[o..o + 3]);
            velocity.write_to_slice(&mut self.velocities[o..o + 3]);
        }
    }
}

fn displaced_target(
    noise: &NoiseField,
    base: Vec3,
    normal: Vec3,
    current: Vec3,
    inputs: &StepInputs<'_>,
) -> Vec3 {
    let params = inputs.params;
    let distance = base.distance(inputs.attention);
    let influence = pointer_influence(distance, params);

    let mut candidate = base;
    if influence > 0.0 {
        let n = noise.sample_vec3(
            current * params.noise_frequency,
            inputs.time * params.noise_speed,
        );
        candidate += n * normal * influence * params.noise_amplitude;

        let angle = distance * influence * params.rotation_amplitude;
        if angle != 0.0 {
            let rotation = Quat::from_euler(
                EulerRot::XYZ,
                normal.x * angle,
                normal.y * angle,
                normal.z * angle,
            );
            candidate = rotation * candidate;
        }
    }

    base + (candidate - base) * inputs.mix
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::EPSILON;

    fn single_vertex(position: [f32; 3], normal: [f32; 3]) -> VertexSimulation {
        let mesh = BaseMesh::new(position.to_vec(), normal.to_vec()).unwrap();
        VertexSimulation::new(mesh, 1)
    }

    #[test]
    fn test_equilibrium_with_zero_noise() {
        let mut sim = single_vertex([1.0, 0.0, 0.0], [1.0, 0.0, 0.0]);
        let params = DistortionParams {
            noise_amplitude: 0.0,
            rotation_amplitude: 0.0,
            spring: 0.05,
            friction: 0.9,
            explode_amplitude: 1.0,
            radius: 0.5,
            ..DistortionParams::default()
        };

        for frame in 0..200 {
            let inputs = StepInputs {
                attention: Vec3::new(1.0, 0.0, 0.0),
                mix: 1.0,
                time: frame as f32 / 60.0,
                params: &params,
            };
            assert_eq!(sim.target(0, &inputs), Vec3::new(1.0, 0.0, 0.0));
            sim.step(&inputs);
            assert_eq!(sim.position(0), Vec3::new(1.0, 0.0, 0.0));
            assert_eq!(sim.velocity(0), Vec3::ZERO);
        }
    }

    #[test]
    fn test_hard_proximity_cutoff() {
        let params = DistortionParams {
            radius: 0.5,
            explode_amplitude: 1.7,
            ..DistortionParams::default()
        };
        assert_eq!(pointer_influence(0.5 + 1e-3, &params), 0.0);
        assert_eq!(pointer_influence(0.5 - 1e-3, &params), 1.7);
        assert_eq!(pointer_influence(0.5, &params), 1.7);
    }

    #[test]
    fn test_zero_radius_clamped() {
        let params = DistortionParams {
            radius: 0.0,
            ..DistortionParams::default()
        };
        assert_eq!(pointer_influence(0.0, &params), params.explode_amplitude);
        assert_eq!(pointer_influence(EPSILON * 2.0, &params), 0.0);
    }

    #[test]
    fn test_outside_radius_targets_base() {
        let sim = single_vertex([3.0, 0.0, 0.0], [0.0, 0.0, 1.0]);
        let params = DistortionParams::default();
        let inputs = StepInputs {
            attention: Vec3::ZERO,
            mix: 1.0,
            time: 0.7,
            params: &params,
        };
        assert_eq!(sim.target(0, &inputs), Vec3::new(3.0, 0.0, 0.0));
    }

    #[test]
    fn test_mix_factor_idle_floor() {
        assert_eq!(mix_factor(0.0, 0.12, 0.0), 0.12);
        assert_eq!(mix_factor(0.05, 0.12, 0.0), 0.12);
        assert_eq!(mix_factor(0.8, 0.12, 0.0), 0.8);
        assert_eq!(mix_factor(0.8, 0.12, 1.0), 0.0);
        assert!((mix_factor(0.8, 0.12, 0.5) - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_displacement_along_normal() {
        let sim = single_vertex([0.2, 0.1, 0.0], [0.0, 0.0, 1.0]);
        let params = DistortionParams {
            rotation_amplitude: 0.0,
            noise_amplitude: 0.5,
            ..DistortionParams::default()
        };
        let inputs = StepInputs {
            attention: Vec3::new(0.2, 0.1, 0.0),
            mix: 1.0,
            time: 0.3,
            params: &params,
        };
        let target = sim.target(0, &inputs);
        // Only the normal's axis moves.
        assert_eq!(target.x, 0.2);
        assert_eq!(target.y, 0.1);
        assert!(target.z.abs() <= 0.5);
    }

    #[test]
    fn test_zero_mix_targets_base() {
        let sim = single_vertex([0.2, 0.1, 0.0], [0.0, 0.0, 1.0]);
        let params = DistortionParams::default();
        let inputs = StepInputs {
            attention: Vec3::new(0.2, 0.0, 0.0),
            mix: 0.0,
            time: 1.0,
            params: &params,
        };
        assert_eq!(sim.target(0, &inputs), Vec3::new(0.2, 0.1, 0.0));
    }

    #[test]
    fn test_spring_integration_step() {
        let mut sim = single_vertex([0.0, 0.0, 0.0], [0.0, 0.0, 1.0]);
        let params = DistortionParams {
            spring: 0.1,
            friction: 0.5,
            ..DistortionParams::default()
        };
        // Displace the current position by hand; target stays at base (mix 0).
        sim.positions[2] = 1.0;
        let inputs = StepInputs {
            attention: Vec3::splat(100.0),
            mix: 0.0,
            time: 0.0,
            params: &params,
        };
        sim.step(&inputs);
        // v = 0 + (0 - 1) * 0.1 = -0.1; p = 1 - 0.1 = 0.9; v *= 0.5 -> -0.05
        assert!((sim.position(0).z - 0.9).abs() < 1e-6);
        assert!((sim.velocity(0).z + 0.05).abs() < 1e-6);
    }

    #[test]
    fn test_buffers_stay_aligned() {
        let mesh = BaseMesh::grid(3, 3, 1.0, 1.0).unwrap();
        let mut sim = VertexSimulation::new(mesh, 5);
        let params = DistortionParams::default();
        let inputs = StepInputs {
            attention: Vec3::ZERO,
            mix: 1.0,
            time: 0.5,
            params: &params,
        };
        for _ in 0..10 {
            sim.step(&inputs);
        }
        assert_eq!(sim.positions().len(), sim.base().positions().len());
        assert_eq!(sim.velocities().len(), sim.base().positions().len());

        let mut speeds = Vec::new();
        sim.velocity_magnitudes(&mut speeds);
        assert_eq!(speeds.len(), sim.vertex_count());
        assert!(speeds.iter().any(|s| *s > 0.0));
        assert_eq!(sim.position_bytes().len(), sim.positions().len() * 4);

        sim.reset();
        assert_eq!(sim.positions(), sim.base().positions());
        assert!(sim.velocities().iter().all(|v| *v == 0.0));
    }
}
