//! Offline export job specification and run metadata.
//!
//! A job names everything needed to reproduce a deterministic stepping run:
//! geometry source, configuration, seed, frame rate and length.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::params::AutomationMode;

#[cfg(not(target_arch = "wasm32"))]
use chrono::{DateTime, Utc};

#[cfg(not(target_arch = "wasm32"))]
use sha2::{Digest, Sha256};

/// Default FPS for export.
fn default_fps() -> f64 {
    60.0
}

fn default_grid_columns() -> usize {
    96
}

fn default_grid_rows() -> usize {
    24
}

/// Specification for a single deterministic export run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportJobSpec {
    /// OBJ mesh to deform. None uses a generated grid.
    #[serde(default)]
    pub mesh_path: Option<PathBuf>,

    /// Engine configuration JSON. None uses defaults.
    #[serde(default)]
    pub config_path: Option<PathBuf>,

    /// Where per-frame reports are written. None writes to stdout.
    #[serde(default)]
    pub output_path: Option<PathBuf>,

    /// Frames per second.
    #[serde(default = "default_fps")]
    pub fps: f64,

    /// Number of frames. Takes precedence over `duration`.
    #[serde(default)]
    pub frames: Option<u64>,

    /// Duration in seconds.
    #[serde(default)]
    pub duration: Option<f64>,

    /// Seed override; None keeps the configuration's seed.
    #[serde(default)]
    pub seed: Option<u32>,

    /// Distortion preset applied over the configuration.
    #[serde(default)]
    pub preset: Option<String>,

    /// Automation mode override.
    #[serde(default)]
    pub automation: Option<AutomationMode>,

    /// Tempo override for rhythmic automation.
    #[serde(default)]
    pub bpm: Option<f32>,

    /// Pin the manual pointer at this mesh-local point for the whole run.
    #[serde(default)]
    pub pointer: Option<[f32; 3]>,

    /// Grid resolution used when no mesh is given.
    #[serde(default = "default_grid_columns")]
    pub grid_columns: usize,

    #[serde(default = "default_grid_rows")]
    pub grid_rows: usize,
}

impl ExportJobSpec {
    pub fn new() -> Self {
        Self {
            mesh_path: None,
            config_path: None,
            output_path: None,
            fps: default_fps(),
            frames: None,
            duration: None,
            seed: None,
            preset: None,
            automation: None,
            bpm: None,
            pointer: None,
            grid_columns: default_grid_columns(),
            grid_rows: default_grid_rows(),
        }
    }

    /// Validate the job specification.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(path) = &self.mesh_path {
            if !path.exists() {
                return Err(format!("Mesh file not found: {:?}", path));
            }
        }
        if let Some(path) = &self.config_path {
            if !path.exists() {
                return Err(format!("Config file not found: {:?}", path));
            }
        }
        if !(self.fps > 0.0 && self.fps.is_finite()) {
            return Err("FPS must be positive".to_string());
        }
        if let Some(duration) = self.duration {
            if duration < 0.0 {
                return Err("Duration must not be negative".to_string());
            }
        }
        if self.mesh_path.is_none() && (self.grid_columns == 0 || self.grid_rows == 0) {
            return Err("Grid resolution must be positive".to_string());
        }
        Ok(())
    }

    /// Total frames to step: explicit count, else duration × fps, else one second.
    pub fn total_frames(&self) -> u64 {
        match (self.frames, self.duration) {
            (Some(frames), _) => frames,
            (None, Some(duration)) => (duration * self.fps).ceil() as u64,
            (None, None) => self.fps.ceil() as u64,
        }
    }
}

impl Default for ExportJobSpec {
    fn default() -> Self {
        Self::new()
    }
}

/// Metadata for a completed run.
/// Written as JSON alongside the per-frame report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg(not(target_arch = "wasm32"))]
pub struct RunMetadata {
    /// The job specification used.
    pub job: ExportJobSpec,

    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,

    /// Wall-clock seconds spent stepping.
    pub run_duration_secs: f64,

    pub frame_count: u64,

    /// Simulation time after the last frame.
    pub final_time: f64,

    pub vertex_count: usize,

    /// SHA-256 of the configuration file, if one was used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<String>,

    /// SHA-256 of the mesh file, if one was used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mesh_hash: Option<String>,

    /// SHA-256 of the final position buffer, for comparing runs.
    pub positions_hash: String,

    pub glyphwarp_version: String,
}

#[cfg(not(target_arch = "wasm32"))]
impl RunMetadata {
    /// Compute SHA-256 hash of file content.
    pub fn hash_file(path: &std::path::Path) -> Result<String, std::io::Error> {
        use std::io::Read;

        let mut file = std::fs::File::open(path)?;
        let mut hasher = Sha256::new();
        let mut buffer = [0u8; 8192];

        loop {
            let bytes_read = file.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Compute SHA-256 hash of an in-memory buffer.
    pub fn hash_bytes(bytes: &[u8]) -> String {
        format!("{:x}", Sha256::digest(bytes))
    }

    /// Save metadata to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), String> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize metadata: {}", e))?;
        std::fs::write(path, json).map_err(|e| format!("Failed to write metadata: {}", e))
    }
}
