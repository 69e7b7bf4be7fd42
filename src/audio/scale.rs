//! Pitch scale and note selection
//!
//! Obstacle length picks a note from a fixed pentatonic-flavoured scale:
//! short strokes land on high notes, long ones on low notes. Repeats are
//! nudged to a neighbouring step and near-simultaneous duplicates dropped.

use glam::Vec2;
use rand::Rng;

/// A named scale degree
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Note {
    pub name: &'static str,
    pub freq: f32,
}

const fn note(name: &'static str, freq: f32) -> Note {
    Note { name, freq }
}

/// Scale, highest first
pub const SCALE: [Note; 14] = [
    note("D6", 1174.66),
    note("C6", 1046.50),
    note("A5", 880.00),
    note("A4", 440.00),
    note("G4", 392.00),
    note("E4", 329.63),
    note("D4", 293.66),
    note("C4", 261.63),
    note("B3", 246.94),
    note("G3", 196.00),
    note("E3", 164.81),
    note("C3", 130.81),
    note("A2", 110.00),
    note("D2", 73.42),
];

/// Index of D4, used for the start tone
pub const START_NOTE: usize = 6;

/// Markers pick from the top few notes
pub const MARKER_NOTES: usize = 3;

/// Drone pitches
pub const DRONE_ROOT: Note = note("D3", 146.83);
pub const DRONE_FIFTH: Note = note("A3", 220.00);

/// Window in which a repeated note is shifted to a neighbour (ms)
pub const REPEAT_WINDOW_MS: f64 = 6_000.0;
/// Window in which the same final note is dropped entirely (ms)
pub const RETRIGGER_WINDOW_MS: f64 = 30.0;

/// Breakpoint of the length curve
const CURVE_SPLIT: f32 = 0.67;

/// Map a stroke length to a scale index
///
/// Lengths are normalised against a quarter of the canvas diagonal times
/// `reach`. Below the split the curve is shallow, above it steep, so short
/// strokes spread over the high notes and long strokes over the low ones.
pub fn length_to_index(length: f32, canvas: Vec2, reach: f32) -> usize {
    let max_length = canvas.length() * 0.25 * reach;
    if max_length <= 0.0 || !length.is_finite() {
        return 0;
    }
    let n = (length.max(0.0) / max_length).min(1.0);

    let curved = if n < CURVE_SPLIT {
        (n / CURVE_SPLIT).powf(1.5) * CURVE_SPLIT
    } else {
        CURVE_SPLIT + ((n - CURVE_SPLIT) / (1.0 - CURVE_SPLIT)).powf(0.5) * (1.0 - CURVE_SPLIT)
    };

    let last = (SCALE.len() - 1) as f32;
    ((curved * last).round() as usize).min(SCALE.len() - 1)
}

/// Position of a frequency in the scale range (0 = lowest, 1 = highest)
pub fn pitch_progress(freq: f32) -> f32 {
    let lo = SCALE[SCALE.len() - 1].freq;
    let hi = SCALE[0].freq;
    ((freq - lo) / (hi - lo)).clamp(0.0, 1.0)
}

/// Frequency ratio for a detune in cents
#[inline]
pub fn cents_to_ratio(cents: f32) -> f32 {
    2f32.powf(cents / 1200.0)
}

/// Anti-repetition memory keyed by scale index
#[derive(Debug, Clone, Default)]
pub struct NoteSelector {
    last_played: [Option<f64>; SCALE.len()],
}

impl NoteSelector {
    pub fn new() -> Self {
        Self::default()
    }

    fn played_within(&self, index: usize, now_ms: f64, window_ms: f64) -> bool {
        self.last_played[index].is_some_and(|t| now_ms - t < window_ms)
    }

    /// Pick the note to play for a mapped index
    ///
    /// A note heard in the last few seconds moves one step up or down (coin
    /// flip, clamped at the ends). Returns `None` when the final note was
    /// just triggered.
    pub fn select(&mut self, mapped: usize, now_ms: f64, rng: &mut impl Rng) -> Option<usize> {
        let last = SCALE.len() - 1;
        let mapped = mapped.min(last);
        let mut index = mapped;

        if self.played_within(mapped, now_ms, REPEAT_WINDOW_MS) {
            let go_up: bool = rng.random_bool(0.5);
            index = if go_up && mapped > 0 {
                mapped - 1
            } else if !go_up && mapped < last {
                mapped + 1
            } else if mapped == 0 {
                1
            } else {
                last - 1
            };
        }

        if self.played_within(index, now_ms, RETRIGGER_WINDOW_MS) {
            return None;
        }
        self.last_played[index] = Some(now_ms);
        Some(index)
    }

    /// Record a note played outside of `select` (markers, start tone)
    pub fn mark_played(&mut self, index: usize, now_ms: f64) {
        if let Some(slot) = self.last_played.get_mut(index) {
            *slot = Some(now_ms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    const CANVAS: Vec2 = Vec2::new(1600.0, 1200.0);

    #[test]
    fn test_scale_descending() {
        assert!(SCALE.windows(2).all(|w| w[0].freq > w[1].freq));
        assert_eq!(SCALE[START_NOTE].name, "D4");
    }

    #[test]
    fn test_length_mapping_extremes() {
        assert_eq!(length_to_index(0.0, CANVAS, 1.34), 0);
        assert_eq!(length_to_index(10_000.0, CANVAS, 1.34), SCALE.len() - 1);
    }

    #[test]
    fn test_length_mapping_monotonic() {
        let mut prev = 0;
        for i in 0..200 {
            let idx = length_to_index(i as f32 * 5.0, CANVAS, 1.34);
            assert!(idx >= prev);
            prev = idx;
        }
    }

    #[test]
    fn test_length_mapping_breakpoint() {
        // diag 2000 -> max 670 at reach 1.34; n = 0.67 sits on the split
        let idx = length_to_index(0.67 * 670.0, CANVAS, 1.34);
        assert_eq!(idx, (0.67f32 * 13.0).round() as usize);
    }

    #[test]
    fn test_mobile_reach_maps_higher() {
        let len = 300.0;
        assert!(length_to_index(len, CANVAS, 3.0) < length_to_index(len, CANVAS, 1.34));
    }

    #[test]
    fn test_pitch_progress() {
        assert_eq!(pitch_progress(73.42), 0.0);
        assert_eq!(pitch_progress(1174.66), 1.0);
    }

    #[test]
    fn test_cents() {
        assert!((cents_to_ratio(1200.0) - 2.0).abs() < 1e-6);
        let r = cents_to_ratio(3.0);
        assert!(r > 1.0 && r < 1.002);
    }

    #[test]
    fn test_repeat_shifts_to_neighbour() {
        let mut rng = Pcg32::seed_from_u64(3);
        let mut sel = NoteSelector::new();
        assert_eq!(sel.select(5, 0.0, &mut rng), Some(5));
        let second = sel.select(5, 1_000.0, &mut rng).unwrap();
        assert!(second == 4 || second == 6, "got {second}");
    }

    #[test]
    fn test_repeat_after_window_keeps_note() {
        let mut rng = Pcg32::seed_from_u64(3);
        let mut sel = NoteSelector::new();
        sel.select(5, 0.0, &mut rng);
        assert_eq!(sel.select(5, REPEAT_WINDOW_MS + 1.0, &mut rng), Some(5));
    }

    #[test]
    fn test_shift_clamped_at_ends() {
        for seed in 0..16 {
            let mut rng = Pcg32::seed_from_u64(seed);
            let mut sel = NoteSelector::new();
            sel.select(0, 0.0, &mut rng);
            assert_eq!(sel.select(0, 100.0, &mut rng), Some(1));

            let last = SCALE.len() - 1;
            sel.select(last, 0.0, &mut rng);
            assert_eq!(sel.select(last, 100.0, &mut rng), Some(last - 1));
        }
    }

    #[test]
    fn test_retrigger_dropped() {
        let mut rng = Pcg32::seed_from_u64(9);
        let mut sel = NoteSelector::new();
        // Index 1 sounding, then 0 twice: the repeat shifts to 1, which is too recent
        assert_eq!(sel.select(1, 0.0, &mut rng), Some(1));
        assert_eq!(sel.select(0, 5.0, &mut rng), Some(0));
        assert_eq!(sel.select(0, 10.0, &mut rng), None);
        // Past the window it plays again
        assert_eq!(sel.select(0, 50.0, &mut rng), Some(1));
    }

    #[test]
    fn test_selection_deterministic_per_seed() {
        let run = |seed| {
            let mut rng = Pcg32::seed_from_u64(seed);
            let mut sel = NoteSelector::new();
            (0..20)
                .map(|i| sel.select(7, i as f64 * 100.0, &mut rng))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(11), run(11));
    }
}
