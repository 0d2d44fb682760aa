//! Automated attention sources: a periodic sweep and tempo-synchronized
//! rhythmic steps ("BPM buzz").
//!
//! Both generators are functions of simulation time, so an export run
//! reproduces them exactly. Rhythmic targets come from a pure hash of
//! `(seed, step, salt)`; there is no RNG state to drift.

use std::f32::consts::TAU;

use glam::Vec3;

use crate::easing::Easing;
use crate::mesh::BoundingBox;
use crate::params::{AutomationMode, AutomationParams, BuzzParams, SweepParams, EPSILON};

/// Fraction of the bounding-box half extents the sweep may travel.
const TRAVEL_MARGIN: f32 = 1.0;

/// A raw automation target and its engagement weight for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutomationSample {
    pub target: Vec3,
    pub weight: f32,
}

/// Deterministic hash of `(seed, step, salt)` mapped to [0, 1).
pub fn hash_unit(seed: u32, step: i64, salt: u32) -> f32 {
    let mut h = seed as u64 ^ 0x9e37_79b9_7f4a_7c15;
    h = h.wrapping_add(step as u64).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    h ^= h >> 31;
    h = h.wrapping_add(salt as u64).wrapping_mul(0x94d0_49bb_1331_11eb);
    h ^= h >> 29;
    h = h.wrapping_mul(0xbf58_476d_1ce4_e5b9);
    h ^= h >> 32;
    // Top 24 bits keep the result strictly below 1.0 in f32.
    (h >> 40) as f32 / (1u64 << 24) as f32
}

/// Sweep position at simulation time `time`.
///
/// Cycle counts are reduced in `f64` before narrowing, so the phase stays
/// exact over long sessions.
pub fn sweep_sample(time: f64, params: &SweepParams, bounds: &BoundingBox) -> AutomationSample {
    let center = bounds.center();
    let half = bounds.half_extents() * TRAVEL_MARGIN;

    let cycles = (time / params.period_secs.max(EPSILON) as f64).fract() as f32;
    let phase = TAU * cycles;
    let s = phase.sin();

    let x = center.x + s * params.width * half.x;
    let lift = params.lift * s * s * half.y;
    let bob_cycles = (time * params.bob_frequency as f64).fract() as f32;
    let bob = params.bob_amplitude * half.y * (TAU * bob_cycles).sin();
    let y = center.y + lift + bob;
    let z = center.z + params.depth * half.z * (2.0 * phase).sin();

    AutomationSample {
        target: Vec3::new(
            x.clamp(center.x - half.x, center.x + half.x),
            y.clamp(center.y - half.y, center.y + half.y),
            z,
        ),
        weight: params.intensity,
    }
}

/// Draw the rhythmic target for `step`.
///
/// Each axis maps a hash in [0, 1) to [-1, 1) and raises its magnitude to
/// `1 + bias`, so larger bias pulls targets toward the center.
pub fn buzz_target(seed: u32, step: i64, params: &BuzzParams, bounds: &BoundingBox) -> Vec3 {
    let center = bounds.center();
    let half = bounds.half_extents() * params.range;
    let exponent = 1.0 + params.bias.max(0.0);

    let axis = |salt: u32| {
        let r = hash_unit(seed, step, salt) * 2.0 - 1.0;
        r.signum() * r.abs().powf(exponent)
    };

    center + Vec3::new(axis(0), axis(1), axis(2)) * half
}

/// Engagement envelope within one step, for step-local progress in [0, 1).
pub fn buzz_envelope(progress: f32, params: &BuzzParams) -> f32 {
    let window = params.buzz_fraction.clamp(0.0, 1.0);
    if window <= 0.0 || progress >= window {
        return 0.0;
    }

    let mut attack = params.attack_fraction.max(0.0);
    let mut release = params.release_fraction.max(0.0);
    let total = attack + release;
    if total > 1.0 {
        attack /= total;
        release /= total;
    }

    let u = progress / window;
    let level = if attack > 0.0 && u < attack {
        u / attack
    } else if release > 0.0 && u > 1.0 - release {
        (1.0 - u) / release
    } else {
        1.0
    };

    level.clamp(0.0, 1.0) * params.intensity
}

/// Interpolation state of the rhythmic generator.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RhythmState {
    /// Current step index; `None` after a reset.
    pub step: Option<i64>,
    pub from: Vec3,
    pub to: Vec3,
}

impl RhythmState {
    pub fn reset(&mut self) {
        self.step = None;
    }
}

/// Drives whichever automation mode is active and tracks rhythmic state.
#[derive(Debug, Clone, Default)]
pub struct AutomationDriver {
    rhythm: RhythmState,
    last_mode: AutomationMode,
    last_bpm: f32,
    last_steps_per_beat: f32,
}

impl AutomationDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rhythm(&self) -> &RhythmState {
        &self.rhythm
    }

    /// Forget the current rhythmic segment.
    pub fn reset(&mut self) {
        self.rhythm.reset();
    }

    /// Sample the active generator. Returns `None` when automation is off.
    pub fn update(
        &mut self,
        time: f64,
        seed: u32,
        params: &AutomationParams,
        bounds: &BoundingBox,
    ) -> Option<AutomationSample> {
        self.invalidate_on_change(params);

        match params.mode {
            AutomationMode::Off => None,
            AutomationMode::Sweep => Some(sweep_sample(time, &params.sweep, bounds)),
            AutomationMode::BpmBuzz => Some(self.buzz_sample(time, seed, &params.buzz, bounds)),
        }
    }

    fn invalidate_on_change(&mut self, params: &AutomationParams) {
        let changed = params.mode != self.last_mode
            || params.buzz.bpm != self.last_bpm
            || params.buzz.steps_per_beat != self.last_steps_per_beat;
        if changed {
            if self.rhythm.step.is_some() {
                log::debug!(
                    "Automation reset: mode {:?}, bpm {}, steps/beat {}",
                    params.mode,
                    params.buzz.bpm,
                    params.buzz.steps_per_beat
                );
            }
            self.rhythm.reset();
            self.last_mode = params.mode;
            self.last_bpm = params.buzz.bpm;
            self.last_steps_per_beat = params.buzz.steps_per_beat;
        }
    }

    fn buzz_sample(
        &mut self,
        time: f64,
        seed: u32,
        params: &BuzzParams,
        bounds: &BoundingBox,
    ) -> AutomationSample {
        let duration = params.step_duration() as f64;
        let beats = time.max(0.0) / duration;
        let step = beats.floor() as i64;
        let progress = ((beats - step as f64) as f32).clamp(0.0, 1.0);

        match self.rhythm.step {
            Some(current) if current == step => {}
            Some(_) => {
                self.rhythm.from = self.rhythm.to;
                self.rhythm.to = buzz_target(seed, step, params, bounds);
                self.rhythm.step = Some(step);
            }
            None => {
                // Fresh segment: travel from the draw the previous step would have made.
                self.rhythm.from = buzz_target(seed, step - 1, params, bounds);
                self.rhythm.to = buzz_target(seed, step, params, bounds);
                self.rhythm.step = Some(step);
            }
        }

        let travel = progress / params.travel_portion.max(EPSILON);
        let target = if travel >= 1.0 {
            self.rhythm.to
        } else {
            let eased = Easing::SineInOut.apply(travel);
            self.rhythm.from.lerp(self.rhythm.to, eased)
        };

        AutomationSample {
            target,
            weight: buzz_envelope(progress, params),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_bounds() -> BoundingBox {
        BoundingBox {
            min: [-2.0, -1.0, -0.5],
            max: [2.0, 1.0, 0.5],
        }
    }

    #[test]
    fn test_hash_unit_is_pure() {
        assert_eq!(hash_unit(11, 42, 0), hash_unit(11, 42, 0));
        assert_ne!(hash_unit(11, 42, 0), hash_unit(11, 43, 0));
        assert_ne!(hash_unit(11, 42, 0), hash_unit(11, 42, 1));
        assert_ne!(hash_unit(11, 42, 0), hash_unit(12, 42, 0));
    }

    #[test]
    fn test_hash_unit_range() {
        for step in -500..500 {
            let v = hash_unit(3, step, 1);
            assert!((0.0..1.0).contains(&v));
        }
    }

    #[test]
    fn test_buzz_target_stable_per_step() {
        let bounds = unit_bounds();
        let params = BuzzParams::default();
        let a = buzz_target(5, 17, &params, &bounds);
        let b = buzz_target(5, 17, &params, &bounds);
        let c = buzz_target(5, 18, &params, &bounds);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_bias_clusters_toward_center() {
        let bounds = unit_bounds();
        let spread = |bias: f32| {
            let params = BuzzParams {
                bias,
                ..BuzzParams::default()
            };
            (0..200)
                .map(|s| buzz_target(9, s, &params, &bounds).length())
                .sum::<f32>()
        };
        assert!(spread(3.0) < spread(0.0));
    }

    #[test]
    fn test_buzz_target_within_range() {
        let bounds = unit_bounds();
        let params = BuzzParams {
            range: 1.0,
            bias: 0.0,
            ..BuzzParams::default()
        };
        for s in 0..100 {
            let t = buzz_target(1, s, &params, &bounds);
            assert!(t.x.abs() <= 2.0 && t.y.abs() <= 1.0 && t.z.abs() <= 0.5);
        }
    }

    #[test]
    fn test_envelope_shape() {
        let params = BuzzParams {
            buzz_fraction: 0.5,
            attack_fraction: 0.2,
            release_fraction: 0.4,
            intensity: 0.8,
            ..BuzzParams::default()
        };

        assert_eq!(buzz_envelope(0.0, &params), 0.0);
        // Halfway through the attack (u = 0.1 of the buzz window).
        assert!((buzz_envelope(0.05, &params) - 0.4).abs() < 1e-5);
        // Hold.
        assert!((buzz_envelope(0.2, &params) - 0.8).abs() < 1e-5);
        // Halfway through the release (u = 0.8).
        assert!((buzz_envelope(0.4, &params) - 0.4).abs() < 1e-5);
        // Outside the buzz window.
        assert_eq!(buzz_envelope(0.5, &params), 0.0);
        assert_eq!(buzz_envelope(0.9, &params), 0.0);
    }

    #[test]
    fn test_sweep_clamped_and_constant_weight() {
        let bounds = unit_bounds();
        let params = SweepParams {
            width: 3.0,
            lift: 2.0,
            ..SweepParams::default()
        };
        for i in 0..240 {
            let sample = sweep_sample(i as f64 / 30.0, &params, &bounds);
            assert!(sample.target.x.abs() <= 2.0 + 1e-5);
            assert!(sample.target.y.abs() <= 1.0 + 1e-5);
            assert_eq!(sample.weight, params.intensity);
        }
    }

    #[test]
    fn test_sweep_lift_peaks_at_extremes() {
        let bounds = unit_bounds();
        let params = SweepParams {
            period_secs: 4.0,
            bob_amplitude: 0.0,
            ..SweepParams::default()
        };
        let middle = sweep_sample(0.0, &params, &bounds);
        let extreme = sweep_sample(1.0, &params, &bounds);
        assert!(extreme.target.y > middle.target.y);
        assert!(extreme.target.x > 1.5);
    }

    #[test]
    fn test_off_mode_produces_nothing() {
        let mut driver = AutomationDriver::new();
        let params = AutomationParams::default();
        assert!(driver.update(1.0, 0, &params, &unit_bounds()).is_none());
    }

    #[test]
    fn test_step_advance_chains_targets() {
        let bounds = unit_bounds();
        let mut driver = AutomationDriver::new();
        let params = AutomationParams {
            mode: AutomationMode::BpmBuzz,
            ..AutomationParams::default()
        };

        // 120 bpm, 1 step per beat: 0.5s steps.
        driver.update(0.1, 4, &params, &bounds);
        assert_eq!(driver.rhythm().step, Some(0));
        let first_to = driver.rhythm().to;

        driver.update(0.6, 4, &params, &bounds);
        assert_eq!(driver.rhythm().step, Some(1));
        assert_eq!(driver.rhythm().from, first_to);
        assert_eq!(driver.rhythm().to, buzz_target(4, 1, &params.buzz, &bounds));
    }

    #[test]
    fn test_travel_then_hold() {
        let bounds = unit_bounds();
        let mut driver = AutomationDriver::new();
        let params = AutomationParams {
            mode: AutomationMode::BpmBuzz,
            ..AutomationParams::default()
        };

        let start = driver.update(0.0, 2, &params, &bounds).unwrap();
        assert_eq!(start.target, driver.rhythm().from);

        // Past the travel portion (0.35 of a 0.5s step) the target holds.
        let held = driver.update(0.3, 2, &params, &bounds).unwrap();
        assert_eq!(held.target, driver.rhythm().to);
    }

    #[test]
    fn test_tempo_change_resets_rhythm() {
        let bounds = unit_bounds();
        let mut driver = AutomationDriver::new();
        let mut params = AutomationParams {
            mode: AutomationMode::BpmBuzz,
            ..AutomationParams::default()
        };

        driver.update(1.2, 0, &params, &bounds);
        assert_eq!(driver.rhythm().step, Some(2));

        params.buzz.bpm = 60.0;
        driver.update(1.2, 0, &params, &bounds);
        // Re-derived from scratch at the new tempo: step 1, fresh segment.
        assert_eq!(driver.rhythm().step, Some(1));
        assert_eq!(driver.rhythm().from, buzz_target(0, 0, &params.buzz, &bounds));
    }

    #[test]
    fn test_step_boundaries_hold_late_in_session() {
        let bounds = unit_bounds();
        let mut driver = AutomationDriver::new();
        let params = AutomationParams {
            mode: AutomationMode::BpmBuzz,
            ..AutomationParams::default()
        };

        // Eleven days in at 0.5s steps; f32 time could not separate these.
        let base = 1_000_000.0;
        driver.update(base - 0.01, 1, &params, &bounds);
        assert_eq!(driver.rhythm().step, Some(1_999_999));
        driver.update(base + 0.01, 1, &params, &bounds);
        assert_eq!(driver.rhythm().step, Some(2_000_000));
    }
}
