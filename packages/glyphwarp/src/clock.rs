//! Simulation time: continuous playback, deterministic export stepping and
//! the pause blend.
//!
//! Export stepping places frame `n` at exactly `n * 1000 / fps` milliseconds
//! after the export started, independent of how long each frame took to
//! render. The simulation never knows which mode produced its delta.

use crate::easing::Easing;
use crate::ramp::RampedScalar;

/// Lowest frame rate accepted for export.
const MIN_EXPORT_FPS: f64 = 1e-3;

/// Time advance handed to the rest of the frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTick {
    /// Wall (or export) seconds since the previous frame. Drives ramps and
    /// smoothing even while paused.
    pub dt: f32,
    /// Seconds the simulation advanced (0 while paused in continuous mode).
    pub sim_dt: f32,
    /// Simulation time after this tick, in seconds.
    pub time: f64,
    /// 0 = running, 1 = fully paused.
    pub pause_blend: f32,
}

/// Deterministic stepping state while an export is running.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportStepper {
    fps: f64,
    frame: u64,
    last_timestamp_ms: f64,
}

impl ExportStepper {
    pub fn new(fps: f64) -> Self {
        let fps = if fps.is_finite() { fps.max(MIN_EXPORT_FPS) } else { 60.0 };
        Self {
            fps,
            frame: 0,
            last_timestamp_ms: 0.0,
        }
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Number of frames stepped so far.
    pub fn frames(&self) -> u64 {
        self.frame
    }

    /// Milliseconds between consecutive export frames.
    pub fn frame_interval_ms(&self) -> f64 {
        1000.0 / self.fps
    }

    /// Timestamp of export frame `frame`, relative to export start.
    pub fn timestamp_ms(&self, frame: u64) -> f64 {
        frame as f64 * 1000.0 / self.fps
    }

    /// Move to the next frame and return its timestamp.
    pub fn next_timestamp_ms(&mut self) -> f64 {
        self.frame += 1;
        self.timestamp_ms(self.frame)
    }
}

/// Drives simulation time in one of two mutually exclusive modes.
#[derive(Debug, Clone)]
pub struct FrameClock {
    time: f64,
    paused: bool,
    pause_blend: RampedScalar,
    pause_ramp_secs: f32,
    export: Option<ExportStepper>,
    export_origin: f64,
}

impl FrameClock {
    pub fn new(pause_ramp_secs: f32) -> Self {
        Self {
            time: 0.0,
            paused: false,
            pause_blend: RampedScalar::new(0.0),
            pause_ramp_secs,
            export: None,
            export_origin: 0.0,
        }
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn pause_blend(&self) -> f32 {
        self.pause_blend.value()
    }

    pub fn is_exporting(&self) -> bool {
        self.export.is_some()
    }

    pub fn export(&self) -> Option<&ExportStepper> {
        self.export.as_ref()
    }

    pub fn set_pause_ramp_secs(&mut self, secs: f32) {
        self.pause_ramp_secs = secs;
    }

    /// Pause or resume. The blend ramps rather than jumping.
    pub fn set_paused(&mut self, paused: bool) {
        if self.paused == paused {
            return;
        }
        self.paused = paused;
        let target = if paused { 1.0 } else { 0.0 };
        self.pause_blend
            .ramp_to(target, self.pause_ramp_secs, Easing::SineInOut);
    }

    pub fn toggle_pause(&mut self) -> bool {
        self.set_paused(!self.paused);
        self.paused
    }

    /// Jump simulation time, e.g. when seeking. Does not touch the pause blend.
    pub fn set_time(&mut self, time: f64) {
        self.time = time;
    }

    /// Continuous mode: advance by a real elapsed delta.
    ///
    /// Returns `None` while an export owns the clock.
    pub fn tick(&mut self, real_dt: f32) -> Option<FrameTick> {
        if self.export.is_some() {
            return None;
        }
        let dt = if real_dt.is_finite() { real_dt.max(0.0) } else { 0.0 };
        Some(self.advance(dt as f64))
    }

    /// Enter deterministic stepping at `fps`, disabling continuous ticks.
    pub fn begin_export(&mut self, fps: f64) -> ExportStepper {
        let stepper = ExportStepper::new(fps);
        self.export = Some(stepper);
        self.export_origin = self.time;
        stepper
    }

    /// Leave deterministic stepping and hand time back to continuous ticks.
    pub fn end_export(&mut self) -> Option<ExportStepper> {
        self.export.take()
    }

    /// Export mode: advance to the next fixed frame timestamp.
    pub fn export_step(&mut self) -> Option<(f64, FrameTick)> {
        let timestamp = self.export.as_mut()?.next_timestamp_ms();
        self.step_to(timestamp).map(|tick| (timestamp, tick))
    }

    /// Export mode: advance to an explicit timestamp (ms since export start).
    ///
    /// Timestamps must not go backwards; an earlier one yields a zero delta.
    /// Simulation time lands on `origin + timestamp / 1000` even while paused;
    /// the pause blend still ramps so a paused export shows the base geometry.
    pub fn step_to(&mut self, timestamp_ms: f64) -> Option<FrameTick> {
        let stepper = self.export.as_mut()?;
        let dt_ms = (timestamp_ms - stepper.last_timestamp_ms).max(0.0);
        stepper.last_timestamp_ms = stepper.last_timestamp_ms.max(timestamp_ms);
        let previous = self.time;
        self.time = self.export_origin + stepper.last_timestamp_ms / 1000.0;
        let pause_blend = self.pause_blend.advance((dt_ms / 1000.0) as f32);
        Some(FrameTick {
            dt: (dt_ms / 1000.0) as f32,
            sim_dt: (self.time - previous) as f32,
            time: self.time,
            pause_blend,
        })
    }

    fn advance(&mut self, dt: f64) -> FrameTick {
        let sim_dt = if self.paused { 0.0 } else { dt };
        self.time += sim_dt;
        let pause_blend = self.pause_blend.advance(dt as f32);
        FrameTick {
            dt: dt as f32,
            sim_dt: sim_dt as f32,
            time: self.time,
            pause_blend,
        }
    }

    /// Simulation time at which the current export started.
    pub fn export_origin(&self) -> f64 {
        self.export_origin
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(0.3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_continuous_accumulates() {
        let mut clock = FrameClock::default();
        clock.tick(0.016);
        clock.tick(0.016);
        assert!((clock.time() - 0.032).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_delta_ignored() {
        let mut clock = FrameClock::default();
        clock.tick(-1.0);
        clock.tick(f32::NAN);
        assert_eq!(clock.time(), 0.0);
    }

    #[test]
    fn test_pause_freezes_time_and_ramps_blend() {
        let mut clock = FrameClock::new(0.3);
        clock.tick(0.5);
        clock.set_paused(true);

        let mut last = clock.pause_blend();
        for _ in 0..30 {
            let tick = clock.tick(0.016).unwrap();
            assert_eq!(tick.sim_dt, 0.0);
            assert!(tick.pause_blend >= last);
            last = tick.pause_blend;
        }
        assert_eq!(last, 1.0);
        assert!((clock.time() - 0.5).abs() < 1e-9);

        clock.set_paused(false);
        for _ in 0..30 {
            clock.tick(0.016);
        }
        assert_eq!(clock.pause_blend(), 0.0);
        assert!(clock.time() > 0.5);
    }

    #[test]
    fn test_export_spacing_at_24fps() {
        let mut clock = FrameClock::default();
        let stepper = clock.begin_export(24.0);
        assert!((stepper.frame_interval_ms() - 1000.0 / 24.0).abs() < 1e-12);

        let mut previous = 0.0;
        for n in 1..=48u64 {
            let (timestamp, _) = clock.export_step().unwrap();
            assert!((timestamp - previous - 1000.0 / 24.0).abs() < 1e-9);
            assert!((clock.time() - n as f64 / 24.0).abs() < 1e-9);
            previous = timestamp;
        }
        assert_eq!(clock.export().unwrap().frames(), 48);
    }

    #[test]
    fn test_export_disables_continuous() {
        let mut clock = FrameClock::default();
        clock.begin_export(30.0);
        assert!(clock.tick(0.5).is_none());
        assert_eq!(clock.time(), 0.0);

        let stepper = clock.end_export().unwrap();
        assert_eq!(stepper.frames(), 0);
        assert!(clock.tick(0.5).is_some());
        assert!(clock.export_step().is_none());
    }

    #[test]
    fn test_export_starts_from_current_time() {
        let mut clock = FrameClock::default();
        clock.tick(2.0);
        clock.begin_export(10.0);
        assert_eq!(clock.export_origin(), 2.0);
        clock.export_step();
        assert!((clock.time() - 2.1).abs() < 1e-9);
    }

    #[test]
    fn test_step_to_never_rewinds() {
        let mut clock = FrameClock::default();
        clock.begin_export(60.0);
        clock.step_to(100.0);
        let tick = clock.step_to(50.0).unwrap();
        assert_eq!(tick.dt, 0.0);
        assert!((clock.time() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_export_advances_while_paused() {
        let mut clock = FrameClock::new(0.3);
        clock.set_paused(true);
        clock.begin_export(24.0);
        let mut last_blend = 0.0;
        for _ in 0..24 {
            let (_, tick) = clock.export_step().unwrap();
            assert!(tick.sim_dt > 0.0);
            last_blend = tick.pause_blend;
        }
        assert_eq!(clock.time(), 1.0);
        assert_eq!(last_blend, 1.0);
        assert!(clock.is_paused());
    }
}
