//! Attention point blending.
//!
//! Two sources compete for the attention point: the manual pointer and the
//! automation generator. Their raw targets are blended by weight, the result
//! is smoothed with frame-rate-independent exponential convergence, and the
//! stronger of the two weights drives the deformation mix.

use glam::Vec3;

use crate::automation::AutomationSample;
use crate::easing::Easing;
use crate::params::EngagementParams;
use crate::ramp::RampedScalar;

/// Total weight below which the smoothed point holds still.
pub const WEIGHT_EPSILON: f32 = 1e-4;

/// Pointer event delivered by the interaction layer, in mesh-local space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Move(Vec3),
    Out,
    Up,
    Click,
}

/// Manual pointer state written by input callbacks and read each frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManualPointer {
    raw_target: Vec3,
    weight: RampedScalar,
}

impl ManualPointer {
    pub fn raw_target(&self) -> Vec3 {
        self.raw_target
    }

    pub fn weight(&self) -> f32 {
        self.weight.value()
    }

    /// Record pointer activity at `hit` and ramp engagement up.
    pub fn activate(&mut self, hit: Vec3, engagement: &EngagementParams) {
        self.raw_target = hit;
        // Re-requesting on every move would keep restarting the attack.
        if self.weight.target() < 1.0 {
            self.weight
                .ramp_to(1.0, engagement.attack_secs, Easing::ExponentialOut);
        }
    }

    /// Ramp engagement down after the pointer leaves or is released.
    pub fn release(&mut self, engagement: &EngagementParams) {
        if self.weight.target() > 0.0 {
            self.weight
                .ramp_to(0.0, engagement.release_secs, Easing::ExponentialOut);
        }
    }

    fn advance(&mut self, dt: f32) -> f32 {
        self.weight.advance(dt)
    }
}

/// Result of one blender update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttentionPoint {
    /// Smoothed attention point.
    pub position: Vec3,
    /// `max(manual, automation)` weight.
    pub engagement: f32,
}

/// Blends manual and automated attention into one smoothed point.
#[derive(Debug, Clone, Default)]
pub struct AttentionBlender {
    manual: ManualPointer,
    smoothed: Vec3,
    target: Option<Vec3>,
    engagement: f32,
}

impl AttentionBlender {
    pub fn new(start: Vec3) -> Self {
        Self {
            smoothed: start,
            ..Self::default()
        }
    }

    pub fn manual(&self) -> &ManualPointer {
        &self.manual
    }

    pub fn manual_mut(&mut self) -> &mut ManualPointer {
        &mut self.manual
    }

    /// Apply a pointer event. Returns true for a click, which the caller
    /// turns into a pause toggle.
    pub fn handle_pointer(&mut self, event: PointerEvent, engagement: &EngagementParams) -> bool {
        match event {
            PointerEvent::Move(hit) => {
                self.manual.activate(hit, engagement);
                false
            }
            PointerEvent::Out | PointerEvent::Up => {
                self.manual.release(engagement);
                false
            }
            PointerEvent::Click => true,
        }
    }

    /// Place the smoothed point without easing, e.g. on new geometry.
    pub fn reset_to(&mut self, point: Vec3) {
        self.smoothed = point;
        self.target = None;
    }

    /// Last instantaneous (unsmoothed) blend target, if any source was active.
    pub fn instantaneous_target(&self) -> Option<Vec3> {
        self.target
    }

    pub fn current(&self) -> AttentionPoint {
        AttentionPoint {
            position: self.smoothed,
            engagement: self.engagement,
        }
    }

    /// Advance one frame.
    pub fn update(
        &mut self,
        dt: f32,
        automation: Option<AutomationSample>,
        follow_rate: f32,
    ) -> AttentionPoint {
        let manual_weight = self.manual.advance(dt).clamp(0.0, 1.0);
        let manual_target = self.manual.raw_target;

        let (auto_target, auto_weight) = automation
            .map(|s| (s.target, s.weight.clamp(0.0, 1.0)))
            .unwrap_or((Vec3::ZERO, 0.0));

        self.target = blend_targets(manual_target, manual_weight, auto_target, auto_weight);

        if let Some(target) = self.target {
            let alpha = 1.0 - (-dt.max(0.0) * follow_rate).exp();
            self.smoothed += (target - self.smoothed) * alpha;
        }

        self.engagement = manual_weight.max(auto_weight);
        self.current()
    }
}

/// Weighted average of two targets, or `None` when neither carries weight.
pub fn blend_targets(manual: Vec3, manual_weight: f32, auto: Vec3, auto_weight: f32) -> Option<Vec3> {
    let total = manual_weight + auto_weight;
    if total <= WEIGHT_EPSILON {
        return None;
    }
    if auto_weight <= 0.0 {
        return Some(manual);
    }
    if manual_weight <= 0.0 {
        return Some(auto);
    }
    Some((manual * manual_weight + auto * auto_weight) / total)
}
