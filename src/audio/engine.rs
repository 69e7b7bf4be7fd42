//! Tone engine
//!
//! Turns collision events into scheduled voices: picks the note, applies the
//! loudness model, keeps the polyphony cap and reports what was played. With
//! no backend (or a locked one) every trigger is silent but still reported.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::backend::{AudioBackend, BusParams, DronePan, DroneSpec, pan_for};
use super::scale::{
    DRONE_FIFTH, DRONE_ROOT, MARKER_NOTES, NoteSelector, SCALE, START_NOTE, cents_to_ratio,
    length_to_index, pitch_progress,
};
use super::voice::{Envelope, VoiceId, VoicePool, VoiceSpec};
use crate::settings::Tuning;

/// Base gain of a hit voice
const BASE_VOLUME: f32 = 0.392;
/// Base gain of a marker pluck
const MARKER_VOLUME: f32 = 0.45;
/// Start tone multiplier
const START_VOLUME: f32 = 0.65;
/// Master level after fade-in
pub const MASTER_GAIN: f32 = 3.54;
/// Random detune span (cents, either way)
const DETUNE_CENTS: f32 = 3.0;
/// Age at which the age attenuation bottoms out (ms)
const AGE_FALLOFF_MS: f64 = 10_000.0;
/// Length reported for marker notes
const MARKER_LENGTH: f32 = 50.0;

/// Receives every note the engine decides on
pub trait NoteObserver {
    fn note_played(&mut self, name: &str, length: f32, freq: f32);
}

/// A line or wall hit to be voiced
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitSound {
    /// Obstacle length driving the pitch
    pub length: f32,
    pub pos: Vec2,
    pub consecutive: u32,
    pub age_ms: f64,
    /// Volume multiplier from the collision (retrigger penalty, wall level)
    pub volume: f32,
}

/// What a trigger turned into
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TriggerOutcome {
    Played {
        note: usize,
        freq: f32,
        voice: VoiceId,
        /// Voice force-stopped to make room
        evicted: Option<VoiceId>,
    },
    /// Note chosen and reported, but nothing is audible
    Silent { note: usize },
    /// Same note fired moments ago; dropped
    Suppressed,
}

/// Gain of a hit voice
///
/// Halves with each consecutive hit (cycling every four), fades with
/// obstacle age down to half, and pulls high notes back.
pub fn voice_volume(consecutive: u32, age_ms: f64, freq: f32, mult: f32) -> f32 {
    let streak = 0.5f32.powi((consecutive.saturating_sub(1) % 4) as i32);
    let age = (1.0 - age_ms / AGE_FALLOFF_MS * 0.5).max(0.5) as f32;
    let pitch = 1.0 - pitch_progress(freq) * 0.55;
    BASE_VOLUME * streak * age * pitch * mult
}

/// Polyphonic tone generator over an optional backend
pub struct AudioEngine<B: AudioBackend> {
    backend: Option<B>,
    observer: Option<Box<dyn NoteObserver>>,
    tuning: Tuning,
    canvas: Vec2,
    rng: Pcg32,
    selector: NoteSelector,
    pool: VoicePool,
    next_voice: VoiceId,
    master_level: f32,
    activated: bool,
    /// Started drones and their pan behaviour
    drones: Vec<(usize, DronePan)>,
}

impl<B: AudioBackend> AudioEngine<B> {
    pub fn new(backend: Option<B>, tuning: &Tuning, canvas: Vec2, seed: u64) -> Self {
        if backend.is_none() {
            log::warn!("No audio backend; notes will be silent");
        }
        Self {
            backend,
            observer: None,
            tuning: tuning.clone(),
            canvas,
            rng: Pcg32::seed_from_u64(seed),
            selector: NoteSelector::new(),
            pool: VoicePool::new(tuning.max_voices),
            next_voice: 0,
            master_level: MASTER_GAIN,
            activated: false,
            drones: Vec::new(),
        }
    }

    pub fn set_observer(&mut self, observer: Box<dyn NoteObserver>) {
        self.observer = Some(observer);
    }

    pub fn backend(&self) -> Option<&B> {
        self.backend.as_ref()
    }

    pub fn backend_mut(&mut self) -> Option<&mut B> {
        self.backend.as_mut()
    }

    pub fn resize(&mut self, canvas: Vec2) {
        self.canvas = canvas;
    }

    /// Scale the master level (user volume 0..1)
    pub fn set_volume(&mut self, volume: f32) {
        let from = self.master_level;
        self.master_level = MASTER_GAIN * volume.clamp(0.0, 1.0);
        if !self.activated || from == self.master_level {
            return;
        }
        if let Some(backend) = self.backend.as_mut() {
            let now = backend.now();
            backend.automate_master(&Envelope::master_glide(from, self.master_level), now);
        }
    }

    pub fn is_activated(&self) -> bool {
        self.activated
    }

    pub fn active_voices(&self) -> usize {
        self.pool.len()
    }

    fn audible(&self) -> bool {
        self.backend.as_ref().is_some_and(|b| b.is_running())
    }

    fn notify(&mut self, index: usize, length: f32) {
        if let Some(observer) = self.observer.as_mut() {
            let note = SCALE[index];
            observer.note_played(note.name, length, note.freq);
        }
    }

    /// Unlock output and fade the master in
    pub fn activate(&mut self) {
        let Some(backend) = self.backend.as_mut() else {
            return;
        };
        backend.resume();
        let now = backend.now();
        backend.automate_master(&Envelope::master_fade_in(self.master_level), now);
        self.activated = true;
        log::info!("Audio activated (master {:.2})", self.master_level);
    }

    /// Start the root and fifth drones (once)
    pub fn start_drones(&mut self) {
        if !self.drones.is_empty() {
            return;
        }
        let Some(backend) = self.backend.as_mut() else {
            return;
        };
        let specs = [
            DroneSpec {
                freq: DRONE_ROOT.freq,
                envelope: Envelope::drone(1e-4, 1.0, 0.005, 30.0),
                pan: DronePan::Fixed(0.0),
            },
            DroneSpec {
                freq: DRONE_FIFTH.freq,
                envelope: Envelope::drone(1e-4, 2.0, 0.0037, 35.0),
                pan: DronePan::FollowBall,
            },
        ];
        let now = backend.now();
        for spec in &specs {
            match backend.start_drone(spec, now) {
                Ok(index) => self.drones.push((index, spec.pan)),
                Err(e) => log::warn!("Drone at {} Hz unavailable: {}", spec.freq, e),
            }
        }
        log::debug!("{} drones running", self.drones.len());
    }

    /// Track the ball with the effect bus and the panned drone
    pub fn follow_ball(&mut self, pos: Vec2) {
        let Some(backend) = self.backend.as_mut() else {
            return;
        };
        backend.set_bus(&BusParams::from_ball(pos, self.canvas, &self.tuning));
        let pan = pan_for(pos.x, self.canvas.x);
        for (index, mode) in &self.drones {
            if *mode == DronePan::FollowBall {
                backend.set_drone_pan(*index, pan);
            }
        }
    }

    /// Voice a line or wall hit
    pub fn play_hit(&mut self, hit: &HitSound, now_ms: f64) -> TriggerOutcome {
        let mapped = length_to_index(hit.length, self.canvas, self.tuning.pitch_reach);
        let Some(index) = self.selector.select(mapped, now_ms, &mut self.rng) else {
            log::debug!("Dropped retrigger of {}", SCALE[mapped].name);
            return TriggerOutcome::Suppressed;
        };
        self.notify(index, hit.length);

        let base = SCALE[index].freq;
        let peak = voice_volume(hit.consecutive, hit.age_ms, base, hit.volume);
        let pan = pan_for(hit.pos.x, self.canvas.x);
        self.voice(index, pan, Envelope::tone(peak))
    }

    /// Voice a hexagon marker hit: a short pluck on one of the top notes
    ///
    /// Markers stay out of the hit notes' repetition history.
    pub fn play_marker(&mut self, pos: Vec2, volume: f32) -> TriggerOutcome {
        let index = self.rng.random_range(0..MARKER_NOTES);
        self.notify(index, MARKER_LENGTH);

        let pan = pan_for(pos.x, self.canvas.x);
        self.voice(index, pan, Envelope::pluck(MARKER_VOLUME * volume))
    }

    /// Voice the centred start tone
    pub fn play_start_tone(&mut self, now_ms: f64) -> TriggerOutcome {
        self.selector.mark_played(START_NOTE, now_ms);
        self.notify(START_NOTE, 0.0);
        let peak = voice_volume(1, 0.0, SCALE[START_NOTE].freq, START_VOLUME);
        self.voice(START_NOTE, 0.0, Envelope::tone(peak))
    }

    /// Schedule a detuned voice for a scale note, evicting if at the cap
    fn voice(&mut self, index: usize, pan: f32, envelope: Envelope) -> TriggerOutcome {
        if !self.audible() {
            return TriggerOutcome::Silent { note: index };
        }
        let cents = self.rng.random_range(-DETUNE_CENTS..=DETUNE_CENTS);
        let freq = SCALE[index].freq * cents_to_ratio(cents);
        let id = self.next_voice;

        let Some(backend) = self.backend.as_mut() else {
            return TriggerOutcome::Silent { note: index };
        };
        let now = backend.now();

        for done in self.pool.retire_finished(now) {
            backend.release_voice(done);
        }
        let evicted = self.pool.make_room();
        if let Some(old) = evicted {
            backend.stop_voice(old, now);
            log::debug!("Voice {} evicted at cap {}", old, self.pool.cap());
        }

        let spec = VoiceSpec {
            id,
            freq,
            pan,
            start_at: now,
            envelope,
        };
        if let Err(e) = backend.start_voice(&spec) {
            log::warn!("Voice failed to start: {}", e);
            return TriggerOutcome::Silent { note: index };
        }
        self.next_voice += 1;
        self.pool.push(id, spec.ends_at().unwrap_or(f64::INFINITY));

        TriggerOutcome::Played {
            note: index,
            freq,
            voice: id,
            evicted,
        }
    }
}
