//! Pointer- and tempo-driven vertex deformation for 3D text.

pub mod noise;
pub mod easing;
pub mod ramp;
pub mod params;
pub mod mesh;

// Attention sources
pub mod automation;
pub mod attention;

// Simulation and time
pub mod simulation;
pub mod clock;
pub mod engine;

pub mod export;

#[cfg(not(target_arch = "wasm32"))]
pub mod cli;

#[cfg(target_arch = "wasm32")]
pub mod wasm;

pub use attention::PointerEvent;
pub use engine::{Engine, FrameReport};
pub use mesh::{BaseMesh, MeshError};
pub use params::{DistortionParams, EngineConfig, ParamOverride};
