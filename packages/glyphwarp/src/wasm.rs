use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec3;
use wasm_bindgen::prelude::*;

use crate::attention::PointerEvent;
use crate::engine::Engine;
use crate::params::{EngineConfig, ParamOverride, Preset};

#[wasm_bindgen]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
    let _ = console_log::init_with_level(log::Level::Info);
}

/// Browser-facing handle to the deformation engine.
///
/// The render loop calls `frame`, pointer handlers call the `pointer_*`
/// methods, and the renderer reads `positions`/`velocities` after each frame.
#[wasm_bindgen]
pub struct WasmGlyphWarp {
    inner: Rc<RefCell<Engine>>,
    speeds: Vec<f32>,
}

impl Default for WasmGlyphWarp {
    fn default() -> Self {
        Self::new()
    }
}

#[wasm_bindgen]
impl WasmGlyphWarp {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        init_panic_hook();
        Self {
            inner: Rc::new(RefCell::new(Engine::default())),
            speeds: Vec::new(),
        }
    }

    /// Replace the configuration. Returns false if the JSON could not be parsed.
    pub fn set_config(&self, json: &str) -> bool {
        match EngineConfig::from_json(json) {
            Ok(config) => {
                self.inner.borrow_mut().set_config(config);
                true
            }
            Err(e) => {
                log::error!("Failed to parse engine config: {}", e);
                false
            }
        }
    }

    /// Apply a named distortion preset. Returns false for unknown names.
    pub fn apply_preset(&self, name: &str) -> bool {
        match Preset::parse(name) {
            Ok(preset) => {
                self.inner.borrow_mut().config_mut().distortion = preset.params();
                true
            }
            Err(e) => {
                log::warn!("{}", e);
                false
            }
        }
    }

    /// Override parameters for the next frame only (timeline playback).
    pub fn set_frame_override(&self, json: &str) -> bool {
        match serde_json::from_str::<ParamOverride>(json) {
            Ok(ov) => {
                self.inner.borrow_mut().set_frame_override(ov);
                true
            }
            Err(e) => {
                log::error!("Failed to parse parameter override: {}", e);
                false
            }
        }
    }

    /// Adopt new glyph geometry. Empty buffers leave the engine idle.
    pub fn set_geometry(&self, positions: &[f32], normals: &[f32]) -> bool {
        let positions = (!positions.is_empty()).then(|| positions.to_vec());
        let normals = (!normals.is_empty()).then(|| normals.to_vec());
        self.inner
            .borrow_mut()
            .adopt_buffers(positions, normals)
            .is_ok()
    }

    pub fn clear_geometry(&self) {
        self.inner.borrow_mut().clear_mesh();
    }

    pub fn pointer_move(&self, x: f32, y: f32, z: f32) {
        self.inner
            .borrow_mut()
            .handle_pointer(PointerEvent::Move(Vec3::new(x, y, z)));
    }

    pub fn pointer_out(&self) {
        self.inner.borrow_mut().handle_pointer(PointerEvent::Out);
    }

    pub fn pointer_up(&self) {
        self.inner.borrow_mut().handle_pointer(PointerEvent::Up);
    }

    /// Click toggles pause; returns the new paused state.
    pub fn pointer_click(&self) -> bool {
        let mut engine = self.inner.borrow_mut();
        engine.handle_pointer(PointerEvent::Click);
        engine.is_paused()
    }

    pub fn is_paused(&self) -> bool {
        self.inner.borrow().is_paused()
    }

    /// Continuous frame with a wall-clock delta in seconds.
    /// Returns false when nothing was simulated.
    pub fn frame(&self, dt: f32) -> bool {
        self.inner.borrow_mut().frame(dt).is_some()
    }

    pub fn begin_export(&self, fps: f64) {
        self.inner.borrow_mut().begin_export(fps);
    }

    /// Step one export frame. Returns its timestamp in ms, or -1 if no
    /// export is active or no geometry is loaded.
    pub fn export_step(&self) -> f64 {
        self.inner
            .borrow_mut()
            .export_step()
            .and_then(|r| r.timestamp_ms)
            .unwrap_or(-1.0)
    }

    pub fn end_export(&self) {
        self.inner.borrow_mut().end_export();
    }

    /// Simulation time in seconds.
    pub fn time(&self) -> f64 {
        self.inner.borrow().clock().time()
    }

    pub fn positions(&self) -> Vec<f32> {
        self.inner.borrow().positions().to_vec()
    }

    pub fn velocities(&self) -> Vec<f32> {
        self.inner.borrow().velocities().to_vec()
    }

    /// Per-vertex speed for the emissive effect.
    pub fn velocity_magnitudes(&mut self) -> Vec<f32> {
        self.inner.borrow().velocity_magnitudes(&mut self.speeds);
        self.speeds.clone()
    }

    /// Last frame report as JSON, or "null" before the first frame.
    pub fn last_report_json(&self) -> String {
        let engine = self.inner.borrow();
        serde_json::to_string(&engine.last_report()).unwrap_or_else(|_| "null".to_string())
    }
}
