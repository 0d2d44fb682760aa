//! Configuration snapshots supplied by the control layer.
//!
//! Everything here deserializes from camelCase JSON with per-field defaults,
//! so a partial document is always a valid configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Smallest value used in place of degenerate radii, rates and durations.
pub const EPSILON: f32 = 1e-4;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unknown preset '{0}' (expected one of: calm, default, explosive)")]
    UnknownPreset(String),
    #[error("unknown automation mode '{0}' (expected one of: off, sweep, bpmBuzz)")]
    UnknownAutomationMode(String),
}

/// Distortion parameters read every frame by the vertex simulation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DistortionParams {
    /// Noise displacement amplitude along the vertex normal.
    pub noise_amplitude: f32,
    /// Spatial frequency of the noise field.
    pub noise_frequency: f32,
    /// Phase advance of the noise field per simulated second.
    pub noise_speed: f32,
    /// Convergence rate of the smoothed attention point (1/s).
    pub follow_rate: f32,
    /// Proximity radius around the attention point.
    pub radius: f32,
    /// Pointer influence inside the radius.
    pub explode_amplitude: f32,
    /// Twist applied around the vertex normal, per unit distance.
    pub rotation_amplitude: f32,
    /// Spring constant pulling the vertex toward its target (per frame).
    pub spring: f32,
    /// Velocity retained after each frame.
    pub friction: f32,
    /// Minimum mix applied even without engagement.
    pub idle_mix: f32,
}

impl Default for DistortionParams {
    fn default() -> Self {
        Self {
            noise_amplitude: 0.35,
            noise_frequency: 1.2,
            noise_speed: 0.6,
            follow_rate: 8.0,
            radius: 0.9,
            explode_amplitude: 1.0,
            rotation_amplitude: 0.15,
            spring: 0.05,
            friction: 0.9,
            idle_mix: 0.08,
        }
    }
}

impl DistortionParams {
    /// Proximity radius, never below [`EPSILON`].
    pub fn effective_radius(&self) -> f32 {
        self.radius.max(EPSILON)
    }

    /// Follow rate, never below [`EPSILON`].
    pub fn effective_follow_rate(&self) -> f32 {
        self.follow_rate.max(EPSILON)
    }

    /// Apply an override, returning the effective parameters for one frame.
    pub fn with_override(&self, ov: &ParamOverride) -> Self {
        Self {
            noise_amplitude: ov.noise_amplitude.unwrap_or(self.noise_amplitude),
            noise_frequency: ov.noise_frequency.unwrap_or(self.noise_frequency),
            noise_speed: ov.noise_speed.unwrap_or(self.noise_speed),
            follow_rate: ov.follow_rate.unwrap_or(self.follow_rate),
            radius: ov.radius.unwrap_or(self.radius),
            explode_amplitude: ov.explode_amplitude.unwrap_or(self.explode_amplitude),
            rotation_amplitude: ov.rotation_amplitude.unwrap_or(self.rotation_amplitude),
            spring: ov.spring.unwrap_or(self.spring),
            friction: ov.friction.unwrap_or(self.friction),
            idle_mix: ov.idle_mix.unwrap_or(self.idle_mix),
        }
    }
}

/// Partial parameter snapshot from timeline playback.
///
/// Present fields replace the base value for a single frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParamOverride {
    pub noise_amplitude: Option<f32>,
    pub noise_frequency: Option<f32>,
    pub noise_speed: Option<f32>,
    pub follow_rate: Option<f32>,
    pub radius: Option<f32>,
    pub explode_amplitude: Option<f32>,
    pub rotation_amplitude: Option<f32>,
    pub spring: Option<f32>,
    pub friction: Option<f32>,
    pub idle_mix: Option<f32>,
}

impl ParamOverride {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Timing of the manual engagement and pause ramps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngagementParams {
    /// Seconds for manual engagement to rise on pointer activity.
    pub attack_secs: f32,
    /// Seconds for manual engagement to fall on pointer leave/up.
    pub release_secs: f32,
    /// Seconds for the pause blend to reach its target.
    pub pause_ramp_secs: f32,
}

impl Default for EngagementParams {
    fn default() -> Self {
        Self {
            attack_secs: 0.08,
            release_secs: 0.35,
            pause_ramp_secs: 0.3,
        }
    }
}

/// Which automated motion generator drives the automation source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AutomationMode {
    #[default]
    Off,
    Sweep,
    BpmBuzz,
}

impl AutomationMode {
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s.to_lowercase().as_str() {
            "off" | "none" => Ok(Self::Off),
            "sweep" => Ok(Self::Sweep),
            "bpmbuzz" | "bpm_buzz" | "buzz" => Ok(Self::BpmBuzz),
            _ => Err(ConfigError::UnknownAutomationMode(s.to_string())),
        }
    }
}

/// Parameters of the sweep generator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SweepParams {
    /// Seconds per full left-right-left cycle.
    pub period_secs: f32,
    /// Horizontal travel as a fraction of the travel range.
    pub width: f32,
    /// Parabolic lift at the sweep extremes, as a fraction of half height.
    pub lift: f32,
    /// Secondary vertical bob amplitude, as a fraction of half height.
    pub bob_amplitude: f32,
    /// Secondary bob frequency in Hz.
    pub bob_frequency: f32,
    /// Depth oscillation amplitude, as a fraction of half depth.
    pub depth: f32,
    /// Constant engagement weight while sweeping.
    pub intensity: f32,
}

impl Default for SweepParams {
    fn default() -> Self {
        Self {
            period_secs: 6.0,
            width: 0.9,
            lift: 0.35,
            bob_amplitude: 0.15,
            bob_frequency: 0.5,
            depth: 0.5,
            intensity: 0.8,
        }
    }
}

/// Parameters of the tempo-synchronized rhythmic step generator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuzzParams {
    pub bpm: f32,
    /// Subdivision: steps per beat.
    pub steps_per_beat: f32,
    /// Clustering toward the center; 0 draws uniformly.
    pub bias: f32,
    /// Target range as a fraction of the bounding-box half extents.
    pub range: f32,
    /// Fraction of each step spent travelling to the new target.
    pub travel_portion: f32,
    /// Fraction of each step during which engagement is non-zero.
    pub buzz_fraction: f32,
    /// Attack length as a fraction of the buzz window.
    pub attack_fraction: f32,
    /// Release length as a fraction of the buzz window.
    pub release_fraction: f32,
    /// Peak engagement weight.
    pub intensity: f32,
}

impl Default for BuzzParams {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            steps_per_beat: 1.0,
            bias: 0.5,
            range: 0.9,
            travel_portion: 0.35,
            buzz_fraction: 0.6,
            attack_fraction: 0.15,
            release_fraction: 0.5,
            intensity: 1.0,
        }
    }
}

impl BuzzParams {
    /// Seconds per rhythmic step, never below [`EPSILON`].
    pub fn step_duration(&self) -> f32 {
        let steps_per_minute = self.bpm * self.steps_per_beat;
        if steps_per_minute > 0.0 && steps_per_minute.is_finite() {
            (60.0 / steps_per_minute).max(EPSILON)
        } else {
            // Zero tempo collapses to the minimum step rather than dividing by zero.
            EPSILON
        }
    }
}

/// Automation configuration.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AutomationParams {
    pub mode: AutomationMode,
    pub sweep: SweepParams,
    pub buzz: BuzzParams,
}

/// Full engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Seed for the noise field and rhythmic target draws.
    pub seed: u32,
    pub distortion: DistortionParams,
    pub engagement: EngagementParams,
    pub automation: AutomationParams,
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Named distortion presets offered by the control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Calm,
    Default,
    Explosive,
}

impl Preset {
    pub const ALL: [Preset; 3] = [Preset::Calm, Preset::Default, Preset::Explosive];

    pub fn name(&self) -> &'static str {
        match self {
            Preset::Calm => "calm",
            Preset::Default => "default",
            Preset::Explosive => "explosive",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConfigError::UnknownPreset(s.to_string()))
    }

    pub fn params(&self) -> DistortionParams {
        match self {
            Preset::Calm => DistortionParams {
                noise_amplitude: 0.15,
                noise_speed: 0.3,
                rotation_amplitude: 0.05,
                spring: 0.03,
                friction: 0.92,
                idle_mix: 0.04,
                ..DistortionParams::default()
            },
            Preset::Default => DistortionParams::default(),
            Preset::Explosive => DistortionParams {
                noise_amplitude: 0.8,
                noise_frequency: 1.8,
                noise_speed: 1.2,
                radius: 1.4,
                explode_amplitude: 1.6,
                rotation_amplitude: 0.4,
                spring: 0.08,
                friction: 0.86,
                idle_mix: 0.15,
                ..DistortionParams::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_replaces_only_present_fields() {
        let base = DistortionParams::default();
        let ov = ParamOverride {
            radius: Some(2.5),
            spring: Some(0.2),
            ..ParamOverride::default()
        };

        let effective = base.with_override(&ov);
        assert_eq!(effective.radius, 2.5);
        assert_eq!(effective.spring, 0.2);
        assert_eq!(effective.friction, base.friction);
        assert_eq!(effective.noise_amplitude, base.noise_amplitude);
        // Base is untouched.
        assert_eq!(base.radius, DistortionParams::default().radius);
    }

    #[test]
    fn test_degenerate_values_clamped() {
        let params = DistortionParams {
            radius: 0.0,
            follow_rate: -3.0,
            ..DistortionParams::default()
        };
        assert_eq!(params.effective_radius(), EPSILON);
        assert_eq!(params.effective_follow_rate(), EPSILON);

        let buzz = BuzzParams {
            bpm: 0.0,
            ..BuzzParams::default()
        };
        assert_eq!(buzz.step_duration(), EPSILON);
    }

    #[test]
    fn test_step_duration() {
        let buzz = BuzzParams {
            bpm: 120.0,
            steps_per_beat: 2.0,
            ..BuzzParams::default()
        };
        assert!((buzz.step_duration() - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_partial_json() {
        let json = r#"{
            "seed": 7,
            "distortion": { "radius": 1.5, "idleMix": 0.2 },
            "automation": { "mode": "bpmBuzz", "buzz": { "bpm": 128.0 } }
        }"#;

        let config = EngineConfig::from_json(json).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.distortion.radius, 1.5);
        assert_eq!(config.distortion.idle_mix, 0.2);
        assert_eq!(config.distortion.spring, DistortionParams::default().spring);
        assert_eq!(config.automation.mode, AutomationMode::BpmBuzz);
        assert_eq!(config.automation.buzz.bpm, 128.0);
        assert_eq!(config.automation.buzz.steps_per_beat, 1.0);
        assert_eq!(config.engagement, EngagementParams::default());
    }

    #[test]
    fn test_override_json() {
        let ov: ParamOverride = serde_json::from_str(r#"{ "noiseAmplitude": 0.0 }"#).unwrap();
        assert_eq!(ov.noise_amplitude, Some(0.0));
        assert!(ov.radius.is_none());
        assert!(!ov.is_empty());
        assert!(ParamOverride::default().is_empty());
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            EngineConfig::from_json("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_presets() {
        assert_eq!(Preset::parse("Explosive").unwrap(), Preset::Explosive);
        assert!(Preset::parse("wild").is_err());
        assert_eq!(Preset::Default.params(), DistortionParams::default());
        assert!(Preset::Calm.params().noise_amplitude < Preset::Explosive.params().noise_amplitude);
    }

    #[test]
    fn test_automation_mode_parse() {
        assert_eq!(AutomationMode::parse("sweep").unwrap(), AutomationMode::Sweep);
        assert_eq!(AutomationMode::parse("BPM_BUZZ").unwrap(), AutomationMode::BpmBuzz);
        assert!(matches!(
            AutomationMode::parse("spin"),
            Err(ConfigError::UnknownAutomationMode(name)) if name == "spin"
        ));
    }
}
