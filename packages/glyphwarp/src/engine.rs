//! Frame orchestration.
//!
//! One frame runs to completion in order: clock tick, automation sample,
//! attention blend, vertex integration. Pointer callbacks only write the
//! manual pointer cells that the next frame reads.

use glam::Vec3;
use serde::Serialize;

use crate::attention::{AttentionBlender, PointerEvent};
use crate::automation::AutomationDriver;
use crate::clock::{ExportStepper, FrameClock, FrameTick};
use crate::mesh::{BaseMesh, BoundingBox, MeshError};
use crate::params::{DistortionParams, EngineConfig, ParamOverride};
use crate::simulation::{mix_factor, StepInputs, VertexSimulation};

/// Callback invoked with the new paused state whenever a click toggles pause.
pub type PauseCallback = Box<dyn FnMut(bool)>;

/// Summary of one simulated frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameReport {
    /// Simulation time after the frame, in seconds.
    pub time: f64,
    /// Delta that drove ramps and smoothing.
    pub dt: f32,
    /// Export timestamp in milliseconds, when stepped deterministically.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_ms: Option<f64>,
    pub attention: [f32; 3],
    pub engagement: f32,
    pub mix: f32,
    pub pause_blend: f32,
    pub vertex_count: usize,
    /// Largest per-vertex speed after integration.
    pub max_speed: f32,
}

/// Owns the whole deformation core for one text mesh.
pub struct Engine {
    config: EngineConfig,
    frame_override: Option<ParamOverride>,
    clock: FrameClock,
    blender: AttentionBlender,
    automation: AutomationDriver,
    simulation: Option<VertexSimulation>,
    on_pause_toggle: Option<PauseCallback>,
    last_report: Option<FrameReport>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            clock: FrameClock::new(config.engagement.pause_ramp_secs),
            config,
            frame_override: None,
            blender: AttentionBlender::new(Vec3::ZERO),
            automation: AutomationDriver::new(),
            simulation: None,
            on_pause_toggle: None,
            last_report: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Replace the configuration snapshot. Applied from the next frame on.
    pub fn set_config(&mut self, config: EngineConfig) {
        self.config = config;
        self.clock
            .set_pause_ramp_secs(config.engagement.pause_ramp_secs);
        self.sync_seed();
    }

    /// Edit the configuration in place. A changed seed takes effect on the
    /// next frame, exactly as through `set_config`.
    pub fn config_mut(&mut self) -> &mut EngineConfig {
        &mut self.config
    }

    /// Rebuild the arena when the configured seed no longer matches the
    /// noise field's. The noise field is seeded at construction.
    fn sync_seed(&mut self) {
        let seed = self.config.seed;
        if self.simulation.as_ref().is_some_and(|sim| sim.seed() != seed) {
            if let Some(sim) = self.simulation.take() {
                log::debug!("Reseeding simulation: {} -> {}", sim.seed(), seed);
                self.simulation = Some(VertexSimulation::new(sim.base().clone(), seed));
            }
            self.automation.reset();
        }
    }

    /// Supply an override that applies to the next frame only.
    pub fn set_frame_override(&mut self, ov: ParamOverride) {
        self.frame_override = Some(ov);
    }

    /// Distortion parameters the next frame would use.
    pub fn effective_params(&self) -> DistortionParams {
        match &self.frame_override {
            Some(ov) => self.config.distortion.with_override(ov),
            None => self.config.distortion,
        }
    }

    /// Adopt freshly generated geometry, discarding all simulation state.
    pub fn adopt_mesh(&mut self, mesh: BaseMesh) {
        log::info!("Adopting mesh with {} vertices", mesh.vertex_count());
        self.blender.reset_to(mesh.bounds().center());
        self.automation.reset();
        self.simulation = Some(VertexSimulation::new(mesh, self.config.seed));
    }

    /// Adopt geometry attributes from the geometry provider.
    ///
    /// Missing or malformed attributes leave the engine idle until usable
    /// geometry arrives.
    pub fn adopt_buffers(
        &mut self,
        positions: Option<Vec<f32>>,
        normals: Option<Vec<f32>>,
    ) -> Result<(), MeshError> {
        match BaseMesh::from_attributes(positions, normals) {
            Ok(mesh) => {
                self.adopt_mesh(mesh);
                Ok(())
            }
            Err(e) => {
                log::warn!("Geometry not usable ({}); simulation idle", e);
                self.simulation = None;
                Err(e)
            }
        }
    }

    pub fn clear_mesh(&mut self) {
        self.simulation = None;
    }

    pub fn has_mesh(&self) -> bool {
        self.simulation.is_some()
    }

    pub fn simulation(&self) -> Option<&VertexSimulation> {
        self.simulation.as_ref()
    }

    pub fn bounds(&self) -> Option<BoundingBox> {
        self.simulation.as_ref().map(|s| s.base().bounds())
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    pub fn blender(&self) -> &AttentionBlender {
        &self.blender
    }

    pub fn last_report(&self) -> Option<&FrameReport> {
        self.last_report.as_ref()
    }

    /// Register the callback invoked when a click toggles pause.
    pub fn on_pause_toggle(&mut self, callback: impl FnMut(bool) + 'static) {
        self.on_pause_toggle = Some(Box::new(callback));
    }

    /// Feed a pointer event from the interaction layer.
    pub fn handle_pointer(&mut self, event: PointerEvent) {
        if self.blender.handle_pointer(event, &self.config.engagement) {
            self.toggle_pause();
        }
    }

    pub fn is_paused(&self) -> bool {
        self.clock.is_paused()
    }

    pub fn set_paused(&mut self, paused: bool) {
        if self.clock.is_paused() != paused {
            self.toggle_pause();
        }
    }

    pub fn toggle_pause(&mut self) -> bool {
        let paused = self.clock.toggle_pause();
        log::debug!("Pause toggled: {}", paused);
        if let Some(callback) = self.on_pause_toggle.as_mut() {
            callback(paused);
        }
        paused
    }

    /// Continuous driving: advance by a real elapsed delta.
    ///
    /// Ignored (returns `None`) while an export owns the clock or when no
    /// geometry is loaded.
    pub fn frame(&mut self, real_dt: f32) -> Option<FrameReport> {
        if !self.has_mesh() {
            return None;
        }
        let Some(tick) = self.clock.tick(real_dt) else {
            log::debug!("Continuous tick ignored during export");
            return None;
        };
        Some(self.run_frame(tick, None))
    }

    /// Begin deterministic stepping at `fps`.
    pub fn begin_export(&mut self, fps: f64) -> ExportStepper {
        let stepper = self.clock.begin_export(fps);
        log::info!(
            "Export started at {} fps ({:.4} ms/frame) from t={:.4}s",
            stepper.fps(),
            stepper.frame_interval_ms(),
            self.clock.time()
        );
        stepper
    }

    /// Advance exactly one export frame.
    pub fn export_step(&mut self) -> Option<FrameReport> {
        if !self.has_mesh() {
            return None;
        }
        let (timestamp, tick) = self.clock.export_step()?;
        Some(self.run_frame(tick, Some(timestamp)))
    }

    /// Advance to an explicit export timestamp (ms since export start).
    pub fn step_at(&mut self, timestamp_ms: f64) -> Option<FrameReport> {
        if !self.has_mesh() {
            return None;
        }
        let tick = self.clock.step_to(timestamp_ms)?;
        Some(self.run_frame(tick, Some(timestamp_ms)))
    }

    pub fn end_export(&mut self) -> Option<ExportStepper> {
        let stepper = self.clock.end_export();
        if let Some(s) = &stepper {
            log::info!("Export finished after {} frames", s.frames());
        }
        stepper
    }

    fn run_frame(&mut self, tick: FrameTick, timestamp_ms: Option<f64>) -> FrameReport {
        self.sync_seed();
        self.clock
            .set_pause_ramp_secs(self.config.engagement.pause_ramp_secs);
        let params = self.effective_params();
        self.frame_override = None;

        let bounds = self.bounds().unwrap_or_default();
        let automation = self.automation.update(
            tick.time,
            self.config.seed,
            &self.config.automation,
            &bounds,
        );
        let attention = self
            .blender
            .update(tick.dt, automation, params.effective_follow_rate());

        let mix = mix_factor(attention.engagement, params.idle_mix, tick.pause_blend);

        let mut vertex_count = 0;
        let mut max_speed = 0.0f32;
        if let Some(sim) = self.simulation.as_mut() {
            sim.step(&StepInputs {
                attention: attention.position,
                mix,
                time: tick.time as f32,
                params: &params,
            });
            vertex_count = sim.vertex_count();
            max_speed = sim
                .velocities()
                .chunks_exact(3)
                .map(|v| Vec3::from_slice(v).length())
                .fold(0.0, f32::max);
        }

        let report = FrameReport {
            time: tick.time,
            dt: tick.dt,
            timestamp_ms,
            attention: attention.position.to_array(),
            engagement: attention.engagement,
            mix,
            pause_blend: tick.pause_blend,
            vertex_count,
            max_speed,
        };
        self.last_report = Some(report);
        report
    }

    pub fn positions(&self) -> &[f32] {
        self.simulation.as_ref().map(|s| s.positions()).unwrap_or(&[])
    }

    pub fn velocities(&self) -> &[f32] {
        self.simulation.as_ref().map(|s| s.velocities()).unwrap_or(&[])
    }

    pub fn velocity_magnitudes(&self, out: &mut Vec<f32>) {
        match &self.simulation {
            Some(sim) => sim.velocity_magnitudes(out),
            None => out.clear(),
        }
    }

    pub fn position_bytes(&self) -> &[u8] {
        self.simulation
            .as_ref()
            .map(|s| s.position_bytes())
            .unwrap_or(&[])
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
