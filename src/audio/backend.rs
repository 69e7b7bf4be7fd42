//! Audio output seam
//!
//! The engine decides *what* to play; a backend turns that into sound. The
//! browser backend drives Web Audio, [`RecordingBackend`] just keeps a log.

use glam::Vec2;
use thiserror::Error;

use super::voice::{Envelope, VoiceId, VoiceSpec};
use crate::settings::Tuning;

/// Audio graph failures
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("audio context unavailable: {0}")]
    Unavailable(String),
    #[error("failed to create {node}: {detail}")]
    Node { node: &'static str, detail: String },
    #[error("failed to connect {from} -> {to}")]
    Connect {
        from: &'static str,
        to: &'static str,
    },
}

/// Shared effect bus settings, driven by the ball position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BusParams {
    /// Delay time (seconds)
    pub delay_time: f32,
    pub delay_mix: f32,
    pub delay_feedback: f32,
    /// Chorus LFO rate (Hz)
    pub chorus_rate: f32,
    /// Bus stereo position -1..1
    pub pan: f32,
}

impl BusParams {
    /// Bus settings for a ball at `pos` on a `canvas` sized area
    ///
    /// Lower on screen means longer, wetter echoes and a slower chorus.
    pub fn from_ball(pos: Vec2, canvas: Vec2, tuning: &Tuning) -> Self {
        let r = if canvas.y > 0.0 {
            (pos.y / canvas.y).clamp(0.0, 1.0)
        } else {
            0.5
        };
        let lerp = |(lo, hi): (f32, f32)| lo + (hi - lo) * r;
        Self {
            delay_time: lerp(tuning.delay_time_range),
            delay_mix: lerp(tuning.delay_mix_range),
            delay_feedback: lerp(tuning.delay_feedback_range),
            chorus_rate: lerp(CHORUS_RATE_RANGE),
            pan: pan_for(pos.x, canvas.x),
        }
    }
}

/// Chorus LFO rate from top to bottom of the canvas (Hz)
const CHORUS_RATE_RANGE: (f32, f32) = (1.0, 0.2);

/// Stereo position for a horizontal coordinate
pub fn pan_for(x: f32, width: f32) -> f32 {
    if width <= 0.0 {
        return 0.0;
    }
    (x / width * 2.0 - 1.0).clamp(-1.0, 1.0)
}

/// Where a drone sits in the stereo field
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DronePan {
    Fixed(f32),
    /// Tracks the ball's horizontal position
    FollowBall,
}

/// A sustained background tone
#[derive(Debug, Clone, PartialEq)]
pub struct DroneSpec {
    pub freq: f32,
    pub envelope: Envelope,
    pub pan: DronePan,
}

/// Sound output used by the engine
pub trait AudioBackend {
    /// Audio-clock time in seconds
    fn now(&self) -> f64;

    /// Whether the output is unlocked and producing sound
    fn is_running(&self) -> bool;

    /// Ask the platform to unlock output (after a user gesture)
    fn resume(&mut self);

    /// Schedule a voice: oscillator, gain envelope, panner, into the bus
    fn start_voice(&mut self, voice: &VoiceSpec) -> Result<(), AudioError>;

    /// Cut a voice short
    fn stop_voice(&mut self, id: VoiceId, at: f64);

    /// Drop bookkeeping for a voice that ended on schedule
    fn release_voice(&mut self, id: VoiceId);

    fn set_bus(&mut self, params: &BusParams);

    /// Automate the master gain starting at `start`
    fn automate_master(&mut self, envelope: &Envelope, start: f64);

    /// Start a drone; returns its index for later panning
    fn start_drone(&mut self, drone: &DroneSpec, start: f64) -> Result<usize, AudioError>;

    fn set_drone_pan(&mut self, index: usize, pan: f32);
}

/// One recorded backend call
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    Resume,
    Start(VoiceSpec),
    Stop { id: VoiceId, at: f64 },
    Release(VoiceId),
    Bus(BusParams),
    Master { envelope: Envelope, start: f64 },
    Drone { drone: DroneSpec, start: f64 },
    DronePan { index: usize, pan: f32 },
}

/// Backend that records calls against a manually advanced clock
///
/// Used headless (native builds) and in tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingBackend {
    pub clock: f64,
    pub running: bool,
    pub calls: Vec<BackendCall>,
    drones: usize,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self {
            running: true,
            ..Default::default()
        }
    }

    pub fn advance(&mut self, seconds: f64) {
        self.clock += seconds;
    }

    pub fn started(&self) -> impl Iterator<Item = &VoiceSpec> {
        self.calls.iter().filter_map(|c| match c {
            BackendCall::Start(v) => Some(v),
            _ => None,
        })
    }

    pub fn stopped(&self) -> impl Iterator<Item = VoiceId> + '_ {
        self.calls.iter().filter_map(|c| match c {
            BackendCall::Stop { id, .. } => Some(*id),
            _ => None,
        })
    }

    pub fn last_bus(&self) -> Option<BusParams> {
        self.calls.iter().rev().find_map(|c| match c {
            BackendCall::Bus(p) => Some(*p),
            _ => None,
        })
    }
}

impl AudioBackend for RecordingBackend {
    fn now(&self) -> f64 {
        self.clock
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn resume(&mut self) {
        self.running = true;
        self.calls.push(BackendCall::Resume);
    }

    fn start_voice(&mut self, voice: &VoiceSpec) -> Result<(), AudioError> {
        self.calls.push(BackendCall::Start(voice.clone()));
        Ok(())
    }

    fn stop_voice(&mut self, id: VoiceId, at: f64) {
        self.calls.push(BackendCall::Stop { id, at });
    }

    fn release_voice(&mut self, id: VoiceId) {
        self.calls.push(BackendCall::Release(id));
    }

    fn set_bus(&mut self, params: &BusParams) {
        self.calls.push(BackendCall::Bus(*params));
    }

    fn automate_master(&mut self, envelope: &Envelope, start: f64) {
        self.calls.push(BackendCall::Master {
            envelope: envelope.clone(),
            start,
        });
    }

    fn start_drone(&mut self, drone: &DroneSpec, start: f64) -> Result<usize, AudioError> {
        self.calls.push(BackendCall::Drone {
            drone: drone.clone(),
            start,
        });
        self.drones += 1;
        Ok(self.drones - 1)
    }

    fn set_drone_pan(&mut self, index: usize, pan: f32) {
        self.calls.push(BackendCall::DronePan { index, pan });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_follows_height() {
        let canvas = Vec2::new(800.0, 600.0);
        let tuning = Tuning::desktop();

        let top = BusParams::from_ball(Vec2::new(400.0, 0.0), canvas, &tuning);
        assert_eq!(top.delay_time, 0.01);
        assert_eq!(top.chorus_rate, 1.0);
        assert_eq!(top.pan, 0.0);

        let bottom = BusParams::from_ball(Vec2::new(800.0, 600.0), canvas, &tuning);
        assert!((bottom.delay_time - 0.4).abs() < 1e-6);
        assert!((bottom.delay_mix - 0.40).abs() < 1e-6);
        assert!((bottom.delay_feedback - 0.50).abs() < 1e-6);
        assert!((bottom.chorus_rate - 0.2).abs() < 1e-6);
        assert_eq!(bottom.pan, 1.0);
    }

    #[test]
    fn test_mobile_bus_ranges() {
        let p = BusParams::from_ball(
            Vec2::new(0.0, 300.0),
            Vec2::new(400.0, 600.0),
            &Tuning::mobile(),
        );
        assert!((p.delay_mix - 0.18).abs() < 1e-6);
        assert!((p.delay_feedback - 0.25).abs() < 1e-6);
        assert_eq!(p.pan, -1.0);
    }

    #[test]
    fn test_recording_backend_logs_calls() {
        let mut b = RecordingBackend::new();
        b.advance(1.5);
        assert_eq!(b.now(), 1.5);
        let idx = b
            .start_drone(
                &DroneSpec {
                    freq: 220.0,
                    envelope: Envelope::drone(1e-4, 2.0, 0.0037, 35.0),
                    pan: DronePan::FollowBall,
                },
                b.now(),
            )
            .unwrap();
        assert_eq!(idx, 0);
        b.stop_voice(7, 2.0);
        assert_eq!(b.stopped().collect::<Vec<_>>(), vec![7]);
    }
}
