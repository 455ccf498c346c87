//! Frame timing.
//!
//! This module provides:
//! - [`FrameClock`] - elapsed and clamped delta time, pausable without stopping the frame loop
//! - [`TimeSource`] - where "now" comes from ([`SystemTimeSource`] or [`ManualTimeSource`])
//!
//! # Examples
//!
//! ```
//! use stage_runtime::time::{FrameClock, ManualTimeSource};
//! use std::time::Duration;
//!
//! let source = ManualTimeSource::new();
//! let mut clock = FrameClock::with_source(Box::new(source.clone()), 0.05);
//!
//! source.advance(Duration::from_millis(16));
//! let tick = clock.tick();
//! assert!((tick.delta - 0.016).abs() < 1e-6);
//! ```

use crate::channel::{EventChannel, Subscription};
use crate::config::ClockSettings;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic time since an arbitrary origin
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Duration;
}

/// Wall clock
#[derive(Clone, Debug)]
pub struct SystemTimeSource {
    origin: Instant,
}

impl SystemTimeSource {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Manually advanced time, shared between clones
#[derive(Clone, Debug, Default)]
pub struct ManualTimeSource {
    now: Arc<Mutex<Duration>>,
}

impl ManualTimeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }

    pub fn advance_secs(&self, seconds: f32) {
        self.advance(Duration::from_secs_f32(seconds.max(0.0)));
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> Duration {
        *self.now.lock()
    }
}

/// One frame's timing
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameTick {
    /// Seconds since the previous tick, clamped; zero while paused
    pub delta: f32,
    /// Seconds since start, excluding paused intervals
    pub elapsed: f32,
    pub frame: u64,
    pub paused: bool,
}

/// Pause-aware frame clock
pub struct FrameClock {
    source: Box<dyn TimeSource>,
    /// Origin, shifted forward by every paused interval
    start: Duration,
    /// Time of the last tick
    current: Duration,
    delta: f32,
    elapsed: f32,
    max_delta: f32,
    frame_count: u64,
    paused_at: Option<Duration>,
    ticks: EventChannel<FrameTick>,
}

impl FrameClock {
    /// Wall-clock frame clock
    pub fn new(settings: &ClockSettings) -> Self {
        Self::with_source(Box::new(SystemTimeSource::new()), settings.max_delta)
    }

    pub fn with_source(source: Box<dyn TimeSource>, max_delta: f32) -> Self {
        let now = source.now();
        Self {
            source,
            start: now,
            current: now,
            delta: 0.0,
            elapsed: 0.0,
            max_delta: max_delta.max(0.0),
            frame_count: 0,
            paused_at: None,
            ticks: EventChannel::new(),
        }
    }

    pub fn subscribe(&mut self) -> Subscription<FrameTick> {
        self.ticks.subscribe()
    }

    /// Advance one frame. While paused the tick still fires with zero delta and frozen elapsed.
    pub fn tick(&mut self) -> FrameTick {
        self.frame_count += 1;

        if self.paused_at.is_none() {
            let now = self.source.now();
            let raw = now.saturating_sub(self.current).as_secs_f32();
            self.delta = raw.min(self.max_delta);
            self.elapsed = now.saturating_sub(self.start).as_secs_f32();
            self.current = now;
        } else {
            self.delta = 0.0;
        }

        let tick = FrameTick {
            delta: self.delta,
            elapsed: self.elapsed,
            frame: self.frame_count,
            paused: self.is_paused(),
        };
        self.ticks.emit(tick);
        tick
    }

    /// Freeze time. Repeated calls keep the first pause instant.
    pub fn pause(&mut self) {
        if self.paused_at.is_none() {
            self.paused_at = Some(self.source.now());
            self.delta = 0.0;
        }
    }

    /// Unfreeze, excluding the paused interval from elapsed and the next delta
    pub fn resume(&mut self) {
        if let Some(paused_at) = self.paused_at.take() {
            let paused_for = self.source.now().saturating_sub(paused_at);
            self.start += paused_for;
            self.current += paused_for;
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    pub fn delta_seconds(&self) -> f32 {
        self.delta
    }

    pub fn elapsed_seconds(&self) -> f32 {
        self.elapsed
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn max_delta(&self) -> f32 {
        self.max_delta
    }
}
