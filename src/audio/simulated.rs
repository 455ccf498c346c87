//! Headless audio context.
//!
//! [`SimulatedContext`] models just enough of a real audio graph to drive the engine without a
//! sound device: a manually advanced clock, source playback with natural end detection, gain
//! automation evaluated at the current time, and node connectivity. Clones share state, so a test
//! can hand one clone to the engine and inspect the graph through another.

use crate::audio::backend::{AudioBackend, AudioClip, ContextState, NodeId};
use crate::error::AudioGraphError;
use ahash::AHashMap;
use parking_lot::Mutex;
use std::io::Cursor;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq)]
enum Playback {
    Idle,
    Playing { started_at: f64, offset: f64 },
    Stopped,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Automation {
    SetAt { time: f64, value: f32 },
    RampTo { end: f64, value: f32 },
}

impl Automation {
    fn time(&self) -> f64 {
        match *self {
            Automation::SetAt { time, .. } => time,
            Automation::RampTo { end, .. } => end,
        }
    }
}

#[derive(Debug)]
enum SimNode {
    Source {
        duration: f64,
        looping: bool,
        playback: Playback,
        output: Option<NodeId>,
    },
    Gain {
        base: f32,
        base_time: f64,
        automation: Vec<Automation>,
        output: Option<NodeId>,
        to_destination: bool,
    },
}

#[derive(Debug)]
struct SimState {
    state: ContextState,
    time: f64,
    next_node: u64,
    nodes: AHashMap<NodeId, SimNode>,
    ended: Vec<NodeId>,
    resume_calls: u32,
}

impl SimState {
    fn alloc(&mut self, node: SimNode) -> Result<NodeId, AudioGraphError> {
        if self.state == ContextState::Closed {
            return Err(AudioGraphError::ContextClosed);
        }
        self.next_node += 1;
        let id = NodeId(self.next_node);
        self.nodes.insert(id, node);
        Ok(id)
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut SimNode, AudioGraphError> {
        if self.state == ContextState::Closed {
            return Err(AudioGraphError::ContextClosed);
        }
        self.nodes
            .get_mut(&id)
            .ok_or(AudioGraphError::UnknownNode(id.0))
    }

    fn gain_at(&self, id: NodeId, now: f64) -> f32 {
        let Some(SimNode::Gain {
            base,
            base_time,
            automation,
            ..
        }) = self.nodes.get(&id)
        else {
            return 0.0;
        };

        let mut value = *base;
        let mut anchor = (*base_time, *base);
        for event in automation {
            match *event {
                Automation::SetAt { time, value: target } => {
                    if time > now {
                        break;
                    }
                    value = target;
                    anchor = (time, target);
                }
                Automation::RampTo { end, value: target } => {
                    if now >= end {
                        value = target;
                        anchor = (end, target);
                    } else {
                        let (start, from) = anchor;
                        let span = end - start;
                        let progress = if span > 0.0 {
                            ((now - start) / span).clamp(0.0, 1.0)
                        } else {
                            1.0
                        };
                        value = from + (target - from) * progress as f32;
                        break;
                    }
                }
            }
        }
        value
    }

    fn schedule(&mut self, id: NodeId, event: Automation) {
        if let Some(SimNode::Gain { automation, .. }) = self.nodes.get_mut(&id) {
            automation.push(event);
            automation.sort_by(|a, b| a.time().total_cmp(&b.time()));
        }
    }

    /// A node hears output when its chain ends at the destination
    fn reaches_destination(&self, mut id: NodeId) -> bool {
        for _ in 0..8 {
            match self.nodes.get(&id) {
                Some(SimNode::Gain { to_destination: true, .. }) => return true,
                Some(SimNode::Source { output: Some(next), .. })
                | Some(SimNode::Gain { output: Some(next), .. }) => id = *next,
                _ => return false,
            }
        }
        false
    }
}

/// Headless [`AudioBackend`]
#[derive(Clone, Debug)]
pub struct SimulatedContext {
    inner: Arc<Mutex<SimState>>,
}

impl SimulatedContext {
    /// Running context at time zero
    pub fn new() -> Self {
        Self::with_state(ContextState::Running)
    }

    /// Context that starts suspended, as browsers do before the first user gesture
    pub fn suspended() -> Self {
        Self::with_state(ContextState::Suspended)
    }

    fn with_state(state: ContextState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SimState {
                state,
                time: 0.0,
                next_node: 0,
                nodes: AHashMap::new(),
                ended: Vec::new(),
                resume_calls: 0,
            })),
        }
    }

    /// Advance the clock. A suspended or closed context does not move.
    pub fn advance(&self, seconds: f64) {
        let mut sim = self.inner.lock();
        if sim.state != ContextState::Running {
            return;
        }
        sim.time += seconds.max(0.0);
        let now = sim.time;

        let mut finished = Vec::new();
        for (id, node) in sim.nodes.iter_mut() {
            if let SimNode::Source {
                duration,
                looping: false,
                playback,
                ..
            } = node
            {
                if let Playback::Playing { started_at, offset } = *playback {
                    if now >= started_at && (now - started_at) + offset >= *duration {
                        *playback = Playback::Stopped;
                        finished.push(*id);
                    }
                }
            }
        }
        finished.sort();
        sim.ended.extend(finished);
    }

    /// Current gain value of a gain node
    pub fn gain(&self, gain: NodeId) -> f32 {
        let sim = self.inner.lock();
        sim.gain_at(gain, sim.time)
    }

    pub fn is_playing(&self, source: NodeId) -> bool {
        matches!(
            self.inner.lock().nodes.get(&source),
            Some(SimNode::Source {
                playback: Playback::Playing { .. },
                ..
            })
        )
    }

    /// Buffer offset a source was started at
    pub fn start_offset(&self, source: NodeId) -> Option<f64> {
        match self.inner.lock().nodes.get(&source) {
            Some(SimNode::Source {
                playback: Playback::Playing { offset, .. },
                ..
            }) => Some(*offset),
            _ => None,
        }
    }

    /// Sources currently playing into the destination
    pub fn audible_sources(&self) -> usize {
        let sim = self.inner.lock();
        sim.nodes
            .iter()
            .filter(|(id, node)| {
                matches!(
                    node,
                    SimNode::Source {
                        playback: Playback::Playing { .. },
                        ..
                    }
                ) && sim.reaches_destination(**id)
            })
            .count()
    }

    /// Whether the node still has an outgoing connection
    pub fn is_connected(&self, node: NodeId) -> bool {
        match self.inner.lock().nodes.get(&node) {
            Some(SimNode::Source { output, .. }) => output.is_some(),
            Some(SimNode::Gain {
                output,
                to_destination,
                ..
            }) => output.is_some() || *to_destination,
            None => false,
        }
    }

    pub fn node_count(&self) -> usize {
        self.inner.lock().nodes.len()
    }

    /// Number of `resume` calls made while suspended
    pub fn resume_calls(&self) -> u32 {
        self.inner.lock().resume_calls
    }
}

impl Default for SimulatedContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode a WAV payload into interleaved `f32` samples
fn decode_wav(bytes: &[u8]) -> Result<AudioClip, AudioGraphError> {
    let mut reader =
        hound::WavReader::new(Cursor::new(bytes)).map_err(|_| AudioGraphError::DecodeFailed)?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<Vec<f32>, _>>()
            .map_err(|_| AudioGraphError::DecodeFailed)?,
        hound::SampleFormat::Int => {
            let scale = (1u64 << spec.bits_per_sample.saturating_sub(1).min(31)) as f32;
            reader
                .samples::<i32>()
                .map(|sample| sample.map(|value| value as f32 / scale))
                .collect::<Result<Vec<f32>, _>>()
                .map_err(|_| AudioGraphError::DecodeFailed)?
        }
    };

    Ok(AudioClip::new(spec.sample_rate, spec.channels, samples))
}

impl AudioBackend for SimulatedContext {
    fn state(&self) -> ContextState {
        self.inner.lock().state
    }

    fn current_time(&self) -> f64 {
        self.inner.lock().time
    }

    fn resume(&mut self) {
        let mut sim = self.inner.lock();
        if sim.state == ContextState::Suspended {
            sim.state = ContextState::Running;
            sim.resume_calls += 1;
        }
    }

    fn suspend(&mut self) {
        let mut sim = self.inner.lock();
        if sim.state == ContextState::Running {
            sim.state = ContextState::Suspended;
        }
    }

    fn close(&mut self) {
        let mut sim = self.inner.lock();
        sim.state = ContextState::Closed;
        sim.nodes.clear();
        sim.ended.clear();
    }

    fn decode(&mut self, bytes: &[u8]) -> Result<AudioClip, AudioGraphError> {
        if self.inner.lock().state == ContextState::Closed {
            return Err(AudioGraphError::ContextClosed);
        }
        decode_wav(bytes)
    }

    fn create_source(
        &mut self,
        clip: &AudioClip,
        looping: bool,
    ) -> Result<NodeId, AudioGraphError> {
        self.inner.lock().alloc(SimNode::Source {
            duration: clip.duration(),
            looping,
            playback: Playback::Idle,
            output: None,
        })
    }

    fn create_gain(&mut self) -> Result<NodeId, AudioGraphError> {
        let mut sim = self.inner.lock();
        let now = sim.time;
        sim.alloc(SimNode::Gain {
            base: 1.0,
            base_time: now,
            automation: Vec::new(),
            output: None,
            to_destination: false,
        })
    }

    fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), AudioGraphError> {
        let mut sim = self.inner.lock();
        if !sim.nodes.contains_key(&to) {
            return Err(AudioGraphError::UnknownNode(to.0));
        }
        match sim.node_mut(from)? {
            SimNode::Source { output, .. } | SimNode::Gain { output, .. } => *output = Some(to),
        }
        Ok(())
    }

    fn connect_to_destination(&mut self, node: NodeId) -> Result<(), AudioGraphError> {
        match self.inner.lock().node_mut(node)? {
            SimNode::Gain { to_destination, .. } => *to_destination = true,
            SimNode::Source { .. } => return Err(AudioGraphError::UnknownNode(node.0)),
        }
        Ok(())
    }

    fn disconnect(&mut self, node: NodeId) -> Result<(), AudioGraphError> {
        match self.inner.lock().node_mut(node)? {
            SimNode::Source { output, .. } => *output = None,
            SimNode::Gain {
                output,
                to_destination,
                ..
            } => {
                *output = None;
                *to_destination = false;
            }
        }
        Ok(())
    }

    fn start(&mut self, source: NodeId, when: f64, offset: f64) -> Result<(), AudioGraphError> {
        let mut sim = self.inner.lock();
        let now = sim.time;
        match sim.node_mut(source)? {
            SimNode::Source { playback, .. } => match *playback {
                Playback::Idle => {
                    *playback = Playback::Playing {
                        started_at: when.max(now),
                        offset: offset.max(0.0),
                    };
                    Ok(())
                }
                Playback::Playing { .. } => Ok(()),
                Playback::Stopped => Err(AudioGraphError::AlreadyStopped),
            },
            SimNode::Gain { .. } => Err(AudioGraphError::UnknownNode(source.0)),
        }
    }

    fn stop(&mut self, source: NodeId) -> Result<(), AudioGraphError> {
        let mut sim = self.inner.lock();
        let was_playing = match sim.node_mut(source)? {
            SimNode::Source { playback, .. } => {
                let previous = std::mem::replace(playback, Playback::Stopped);
                match previous {
                    Playback::Stopped => return Err(AudioGraphError::AlreadyStopped),
                    Playback::Playing { .. } => true,
                    Playback::Idle => false,
                }
            }
            SimNode::Gain { .. } => return Err(AudioGraphError::UnknownNode(source.0)),
        };
        if was_playing {
            sim.ended.push(source);
        }
        Ok(())
    }

    fn gain_value(&self, gain: NodeId) -> f32 {
        let sim = self.inner.lock();
        sim.gain_at(gain, sim.time)
    }

    fn set_gain(&mut self, gain: NodeId, value: f32) {
        let mut sim = self.inner.lock();
        let now = sim.time;
        if let Some(SimNode::Gain {
            base,
            base_time,
            automation,
            ..
        }) = sim.nodes.get_mut(&gain)
        {
            *base = value;
            *base_time = now;
            automation.clear();
        }
    }

    fn set_gain_at(&mut self, gain: NodeId, value: f32, time: f64) {
        self.inner
            .lock()
            .schedule(gain, Automation::SetAt { time, value });
    }

    fn linear_ramp_to(&mut self, gain: NodeId, value: f32, end_time: f64) {
        self.inner.lock().schedule(
            gain,
            Automation::RampTo {
                end: end_time,
                value,
            },
        );
    }

    fn cancel_scheduled(&mut self, gain: NodeId, from_time: f64) {
        if let Some(SimNode::Gain { automation, .. }) = self.inner.lock().nodes.get_mut(&gain) {
            automation.retain(|event| event.time() < from_time);
        }
    }

    fn drain_ended(&mut self) -> Vec<NodeId> {
        std::mem::take(&mut self.inner.lock().ended)
    }
}
