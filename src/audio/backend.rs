//! Audio graph abstraction.
//!
//! The engine never talks to a sound device directly. It drives an [`AudioBackend`]: a context
//! with a monotonically increasing clock, buffer source nodes, gain nodes with scheduled
//! automation, and a destination. A browser build implements it over Web Audio; headless builds
//! and tests use [`SimulatedContext`](super::SimulatedContext).

use crate::error::AudioGraphError;
use std::sync::Arc;

/// Opaque id of a node owned by the backend
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

/// Lifecycle state of an audio context
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextState {
    /// Clock advancing, audio flowing
    Running,
    /// Clock frozen; usually waiting for a user gesture
    Suspended,
    /// Context released; every operation fails
    Closed,
}

/// Decoded PCM buffer
#[derive(Clone, Debug)]
pub struct AudioClip {
    sample_rate: u32,
    channels: u16,
    frames: usize,
    samples: Arc<[f32]>,
}

impl AudioClip {
    /// Build a clip from interleaved samples
    pub fn new(sample_rate: u32, channels: u16, samples: Vec<f32>) -> Self {
        let channels = channels.max(1);
        let frames = samples.len() / channels as usize;
        Self {
            sample_rate: sample_rate.max(1),
            channels,
            frames,
            samples: samples.into(),
        }
    }

    /// Mono silence of the given length
    pub fn silent(duration_seconds: f64, sample_rate: u32) -> Self {
        let frames = (duration_seconds.max(0.0) * sample_rate as f64).round() as usize;
        Self::new(sample_rate, 1, vec![0.0; frames])
    }

    /// Length in seconds
    pub fn duration(&self) -> f64 {
        self.frames as f64 / self.sample_rate as f64
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }
}

/// Platform audio context.
///
/// Times are in seconds on the context clock ([`current_time`](Self::current_time)).
/// Gain automation follows Web Audio semantics: events apply in time order, a linear ramp
/// interpolates from the previous event's value, and `cancel_scheduled` drops every event at or
/// after the given time.
pub trait AudioBackend {
    fn state(&self) -> ContextState;

    fn current_time(&self) -> f64;

    fn resume(&mut self);

    fn suspend(&mut self);

    /// Release the context. Nodes become unusable.
    fn close(&mut self);

    fn decode(&mut self, bytes: &[u8]) -> Result<AudioClip, AudioGraphError>;

    fn create_source(&mut self, clip: &AudioClip, looping: bool)
        -> Result<NodeId, AudioGraphError>;

    fn create_gain(&mut self) -> Result<NodeId, AudioGraphError>;

    fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), AudioGraphError>;

    fn connect_to_destination(&mut self, node: NodeId) -> Result<(), AudioGraphError>;

    /// Disconnect every output of `node`
    fn disconnect(&mut self, node: NodeId) -> Result<(), AudioGraphError>;

    /// Start a source at context time `when`, `offset` seconds into its buffer
    fn start(&mut self, source: NodeId, when: f64, offset: f64) -> Result<(), AudioGraphError>;

    /// Stop a source. Stopping twice reports [`AudioGraphError::AlreadyStopped`].
    fn stop(&mut self, source: NodeId) -> Result<(), AudioGraphError>;

    /// Gain value at the current context time
    fn gain_value(&self, gain: NodeId) -> f32;

    /// Set the gain immediately, dropping scheduled automation
    fn set_gain(&mut self, gain: NodeId, value: f32);

    fn set_gain_at(&mut self, gain: NodeId, value: f32, time: f64);

    fn linear_ramp_to(&mut self, gain: NodeId, value: f32, end_time: f64);

    fn cancel_scheduled(&mut self, gain: NodeId, from_time: f64);

    /// Sources whose playback ended (naturally or by `stop`) since the last call
    fn drain_ended(&mut self) -> Vec<NodeId>;
}
