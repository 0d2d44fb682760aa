//! Time-animated scalar with cancel-and-restart ramps.

use crate::easing::Easing;

/// A scalar that eases toward a target over a fixed duration.
///
/// Requesting a new ramp replaces any ramp in flight; the new ramp starts
/// from the current value, so there is never a discontinuity.
#[derive(Debug, Clone, Copy)]
pub struct RampedScalar {
    value: f32,
    from: f32,
    target: f32,
    duration: f32,
    elapsed: f32,
    curve: Easing,
}

impl RampedScalar {
    pub fn new(value: f32) -> Self {
        Self {
            value,
            from: value,
            target: value,
            duration: 0.0,
            elapsed: 0.0,
            curve: Easing::Linear,
        }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn is_ramping(&self) -> bool {
        self.elapsed < self.duration
    }

    /// Start a ramp toward `target`. A non-positive duration snaps immediately.
    pub fn ramp_to(&mut self, target: f32, duration: f32, curve: Easing) {
        self.from = self.value;
        self.target = target;
        self.curve = curve;
        self.elapsed = 0.0;
        if duration > 0.0 && duration.is_finite() {
            self.duration = duration;
        } else {
            self.duration = 0.0;
            self.value = target;
        }
    }

    /// Set the value directly, cancelling any ramp.
    pub fn set(&mut self, value: f32) {
        self.value = value;
        self.from = value;
        self.target = value;
        self.duration = 0.0;
        self.elapsed = 0.0;
    }

    /// Advance the ramp by `dt` seconds and return the new value.
    pub fn advance(&mut self, dt: f32) -> f32 {
        if !self.is_ramping() {
            return self.value;
        }
        self.elapsed = (self.elapsed + dt.max(0.0)).min(self.duration);
        let t = self.elapsed / self.duration;
        self.value = if self.elapsed >= self.duration {
            self.target
        } else {
            self.from + (self.target - self.from) * self.curve.apply(t)
        };
        self.value
    }
}

impl Default for RampedScalar {
    fn default() -> Self {
        Self::new(0.0)
    }
}
