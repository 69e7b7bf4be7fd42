//! Voices, gain envelopes, and the polyphony pool

use std::collections::VecDeque;

/// Handle for one started oscillator voice
pub type VoiceId = u64;

/// How a gain automation point is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Curve {
    /// Jump to the value at the point's time
    Set,
    Linear,
    Exponential,
}

/// One automation point, timed relative to the envelope start (seconds)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    pub at: f64,
    pub value: f32,
    pub curve: Curve,
}

const fn step(at: f64, value: f32, curve: Curve) -> Step {
    Step { at, value, curve }
}

/// Floor for exponential targets (they must stay positive)
pub const SILENCE: f32 = 0.001;

/// Duration of a master level glide (seconds)
const MASTER_GLIDE: f64 = 0.05;

/// A gain automation curve plus the time the source should stop
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub steps: Vec<Step>,
    /// Stop offset in seconds, `None` for sources that run forever
    pub stop_after: Option<f64>,
}

impl Envelope {
    /// Standard hit voice: slow swell, decay to 30%, hold, long tail
    pub fn tone(peak: f32) -> Self {
        let peak = peak.max(1e-4);
        Self {
            steps: vec![
                step(0.0, 0.0, Curve::Set),
                step(0.5, peak, Curve::Linear),
                step(0.7, peak * 0.3, Curve::Linear),
                step(0.7, peak * 0.3, Curve::Set),
                step(12.0, SILENCE, Curve::Exponential),
            ],
            stop_after: Some(12.0),
        }
    }

    /// Marker voice: quick pluck with a short tail
    pub fn pluck(peak: f32) -> Self {
        let peak = peak.max(1e-4);
        Self {
            steps: vec![
                step(0.0, 0.0, Curve::Set),
                step(0.05, peak, Curve::Linear),
                step(0.1, peak * 0.7, Curve::Linear),
                step(0.2, peak * 0.7, Curve::Set),
                step(1.5, SILENCE, Curve::Exponential),
            ],
            stop_after: Some(1.5),
        }
    }

    /// Master unmute: near-silent step, then a fast rise to `level`
    pub fn master_fade_in(level: f32) -> Self {
        let mut steps = vec![
            step(0.0, 0.0, Curve::Set),
            step(0.02, SILENCE, Curve::Exponential),
            step(0.07, level.max(SILENCE), Curve::Exponential),
        ];
        if level <= 0.0 {
            steps.push(step(0.07, 0.0, Curve::Set));
        }
        Self {
            steps,
            stop_after: None,
        }
    }

    /// Master level change: linear glide from `from` to `to`
    pub fn master_glide(from: f32, to: f32) -> Self {
        Self {
            steps: vec![
                step(0.0, from, Curve::Set),
                step(MASTER_GLIDE, to.max(0.0), Curve::Linear),
            ],
            stop_after: None,
        }
    }

    /// Drone swell: reach `floor` at `t1`, then creep to `level` by `t2`
    pub fn drone(floor: f32, t1: f64, level: f32, t2: f64) -> Self {
        Self {
            steps: vec![
                step(0.0, 0.0, Curve::Set),
                step(t1, floor, Curve::Exponential),
                step(t2, level, Curve::Exponential),
            ],
            stop_after: None,
        }
    }

    /// Highest value reached
    pub fn peak(&self) -> f32 {
        self.steps.iter().map(|s| s.value).fold(0.0, f32::max)
    }

    /// Evaluate the curve at `t` seconds after start
    ///
    /// Mirrors Web Audio ramp semantics: a ramp runs from the previous
    /// point to its own; an exponential ramp out of zero holds zero.
    pub fn value_at(&self, t: f64) -> f32 {
        let mut prev_t = 0.0;
        let mut prev_v = 0.0f32;
        for s in &self.steps {
            if t < s.at {
                let span = s.at - prev_t;
                let frac = if span > 0.0 { ((t - prev_t) / span) as f32 } else { 1.0 };
                return match s.curve {
                    Curve::Set => prev_v,
                    Curve::Linear => prev_v + (s.value - prev_v) * frac,
                    Curve::Exponential if prev_v > 0.0 && s.value > 0.0 => {
                        prev_v * (s.value / prev_v).powf(frac)
                    }
                    Curve::Exponential => prev_v,
                };
            }
            prev_t = s.at;
            prev_v = s.value;
        }
        prev_v
    }
}

/// Everything a backend needs to start a voice
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceSpec {
    pub id: VoiceId,
    /// Final (detuned) frequency in Hz
    pub freq: f32,
    /// Stereo position -1..1
    pub pan: f32,
    /// Audio-clock start time (seconds)
    pub start_at: f64,
    pub envelope: Envelope,
}

impl VoiceSpec {
    pub fn ends_at(&self) -> Option<f64> {
        self.envelope.stop_after.map(|d| self.start_at + d)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ActiveVoice {
    id: VoiceId,
    ends_at: f64,
}

/// FIFO pool enforcing the polyphony cap
#[derive(Debug, Clone)]
pub struct VoicePool {
    cap: usize,
    active: VecDeque<ActiveVoice>,
}

impl VoicePool {
    pub fn new(cap: usize) -> Self {
        Self {
            cap: cap.max(1),
            active: VecDeque::with_capacity(cap),
        }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Forget voices whose scheduled stop has passed
    pub fn retire_finished(&mut self, now: f64) -> Vec<VoiceId> {
        let mut done = Vec::new();
        self.active.retain(|v| {
            let alive = v.ends_at > now;
            if !alive {
                done.push(v.id);
            }
            alive
        });
        done
    }

    /// Make room for one more voice
    ///
    /// Returns the oldest voice when the pool is full; the caller must stop it.
    pub fn make_room(&mut self) -> Option<VoiceId> {
        if self.active.len() >= self.cap {
            self.active.pop_front().map(|v| v.id)
        } else {
            None
        }
    }

    pub fn push(&mut self, id: VoiceId, ends_at: f64) {
        self.active.push_back(ActiveVoice { id, ends_at });
    }

    pub fn ids(&self) -> impl Iterator<Item = VoiceId> + '_ {
        self.active.iter().map(|v| v.id)
    }

    pub fn clear(&mut self) -> Vec<VoiceId> {
        self.active.drain(..).map(|v| v.id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tone_shape() {
        let env = Envelope::tone(0.4);
        assert_eq!(env.value_at(0.0), 0.0);
        assert!((env.value_at(0.25) - 0.2).abs() < 1e-6);
        assert!((env.value_at(0.5) - 0.4).abs() < 1e-6);
        assert!((env.value_at(0.7) - 0.12).abs() < 1e-6);
        assert!(env.value_at(6.0) < 0.12);
        assert!((env.value_at(12.0) - SILENCE).abs() < 1e-6);
        assert_eq!(env.stop_after, Some(12.0));
        assert!((env.peak() - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_pluck_is_short() {
        let env = Envelope::pluck(0.45);
        assert_eq!(env.stop_after, Some(1.5));
        assert!((env.value_at(0.05) - 0.45).abs() < 1e-6);
        assert!((env.value_at(0.15) - 0.315).abs() < 1e-6);
    }

    #[test]
    fn test_master_fade_in_reaches_level() {
        let env = Envelope::master_fade_in(3.54);
        assert_eq!(env.value_at(0.01), 0.0);
        assert!((env.value_at(0.02) - SILENCE).abs() < 1e-6);
        assert!((env.value_at(1.0) - 3.54).abs() < 1e-6);
        assert!(env.stop_after.is_none());

        let muted = Envelope::master_fade_in(0.0);
        assert_eq!(muted.value_at(1.0), 0.0);
    }

    #[test]
    fn test_master_glide_starts_from_current() {
        let env = Envelope::master_glide(3.54, 1.77);
        assert_eq!(env.value_at(0.0), 3.54);
        assert!((env.value_at(0.025) - 2.655).abs() < 1e-5);
        assert_eq!(env.value_at(1.0), 1.77);
        assert_eq!(Envelope::master_glide(1.0, 0.0).value_at(1.0), 0.0);
    }

    #[test]
    fn test_zero_peak_kept_positive() {
        let env = Envelope::tone(0.0);
        assert!(env.peak() > 0.0);
    }

    #[test]
    fn test_pool_evicts_oldest_when_full() {
        let mut pool = VoicePool::new(3);
        for id in 0..3 {
            assert_eq!(pool.make_room(), None);
            pool.push(id, 100.0);
        }
        assert_eq!(pool.make_room(), Some(0));
        pool.push(3, 100.0);
        assert_eq!(pool.len(), 3);
        assert_eq!(pool.ids().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_pool_retires_finished() {
        let mut pool = VoicePool::new(4);
        pool.push(1, 5.0);
        pool.push(2, 20.0);
        assert_eq!(pool.retire_finished(10.0), vec![1]);
        assert_eq!(pool.len(), 1);
    }
}
