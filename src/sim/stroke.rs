//! Pointer strokes: turning a drag or tap into an obstacle

use glam::Vec2;

use crate::consts::{
    LINE_MIN_POINTS, STROKE_MAX_POINTS, STROKE_MIN_SPACING, TAP_MAX_DURATION_MS, TAP_MAX_EXTENT,
    TAP_MAX_POINTS,
};

/// What a finished stroke becomes
#[derive(Debug, Clone, PartialEq)]
pub enum StrokeOutcome {
    /// A quick tap: place a hexagon marker here
    Marker(Vec2),
    /// A drag long enough to become a line
    Line { points: Vec<Vec2>, start_ms: f64 },
    /// Too long for a tap, too short for a line
    Discarded,
}

/// An in-progress stroke
#[derive(Debug, Clone)]
pub struct Stroke {
    points: Vec<Vec2>,
    start_ms: f64,
}

impl Stroke {
    /// Start a stroke at the pointer-down position
    pub fn begin(pos: Vec2, now_ms: f64) -> Self {
        let mut points = Vec::with_capacity(32);
        points.push(pos);
        Self {
            points,
            start_ms: now_ms,
        }
    }

    /// Append a pointer-move position
    ///
    /// Positions within the sampling spacing of the last point are ignored.
    /// Returns whether the point was recorded.
    pub fn extend(&mut self, pos: Vec2) -> bool {
        let Some(last) = self.points.last() else {
            self.points.push(pos);
            return true;
        };
        if pos.distance(*last) <= STROKE_MIN_SPACING {
            return false;
        }

        self.points.push(pos);
        if self.points.len() > STROKE_MAX_POINTS {
            self.points.remove(0);
        }
        true
    }

    pub fn points(&self) -> &[Vec2] {
        &self.points
    }

    pub fn start_ms(&self) -> f64 {
        self.start_ms
    }

    /// Straight first-to-last segment shown while dragging
    pub fn preview_segment(&self) -> Option<(Vec2, Vec2)> {
        match (self.points.first(), self.points.last()) {
            (Some(a), Some(b)) if self.points.len() >= 2 => Some((*a, *b)),
            _ => None,
        }
    }

    /// Farthest distance of any point from the first one
    fn extent(&self) -> f32 {
        let Some(first) = self.points.first() else {
            return 0.0;
        };
        self.points
            .iter()
            .map(|p| p.distance(*first))
            .fold(0.0, f32::max)
    }

    fn is_tap(&self, now_ms: f64) -> bool {
        if now_ms - self.start_ms > TAP_MAX_DURATION_MS {
            return false;
        }
        self.points.len() <= TAP_MAX_POINTS
            || (self.points.len() <= LINE_MIN_POINTS && self.extent() <= TAP_MAX_EXTENT)
    }

    /// Classify the stroke on pointer-up
    pub fn finish(self, now_ms: f64) -> StrokeOutcome {
        if self.is_tap(now_ms) {
            StrokeOutcome::Marker(self.points[0])
        } else if self.points.len() > LINE_MIN_POINTS {
            StrokeOutcome::Line {
                points: self.points,
                start_ms: self.start_ms,
            }
        } else {
            StrokeOutcome::Discarded
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spacing_throttle() {
        let mut s = Stroke::begin(Vec2::ZERO, 0.0);
        assert!(!s.extend(Vec2::new(2.0, 2.0)));
        assert!(!s.extend(Vec2::new(3.0, 0.0)));
        assert!(s.extend(Vec2::new(3.5, 0.0)));
        assert_eq!(s.points().len(), 2);
    }

    #[test]
    fn test_single_tap_is_marker() {
        let s = Stroke::begin(Vec2::new(40.0, 60.0), 0.0);
        assert_eq!(s.finish(80.0), StrokeOutcome::Marker(Vec2::new(40.0, 60.0)));
    }

    #[test]
    fn test_three_point_wobble_is_marker() {
        let mut s = Stroke::begin(Vec2::new(100.0, 100.0), 0.0);
        s.extend(Vec2::new(104.0, 100.0));
        s.extend(Vec2::new(104.0, 104.0));
        assert_eq!(s.points().len(), 3);
        assert_eq!(s.finish(120.0), StrokeOutcome::Marker(Vec2::new(100.0, 100.0)));
    }

    #[test]
    fn test_long_press_without_drag_discarded() {
        let s = Stroke::begin(Vec2::ZERO, 0.0);
        assert_eq!(s.finish(TAP_MAX_DURATION_MS + 1.0), StrokeOutcome::Discarded);
    }

    #[test]
    fn test_short_drag_discarded() {
        let mut s = Stroke::begin(Vec2::ZERO, 0.0);
        for i in 1..4 {
            s.extend(Vec2::new(i as f32 * 20.0, 0.0));
        }
        assert_eq!(s.points().len(), 4);
        assert_eq!(s.finish(100.0), StrokeOutcome::Discarded);
    }

    #[test]
    fn test_eight_point_drag_is_line() {
        let mut s = Stroke::begin(Vec2::new(10.0, 10.0), 0.0);
        for i in 1..8 {
            s.extend(Vec2::new(10.0 + i as f32 * (120.0 / 7.0), 10.0));
        }
        let first = s.points()[0];
        let last = *s.points().last().unwrap();
        match s.finish(300.0) {
            StrokeOutcome::Line { points, start_ms } => {
                assert_eq!(points.len(), 8);
                assert_eq!(points[0], first);
                assert_eq!(*points.last().unwrap(), last);
                assert!((last.x - first.x - 120.0).abs() < 1e-3);
                assert_eq!(start_ms, 0.0);
            }
            other => panic!("expected line, got {other:?}"),
        }
    }

    #[test]
    fn test_stroke_cap_drops_oldest() {
        let mut s = Stroke::begin(Vec2::ZERO, 0.0);
        for i in 1..=STROKE_MAX_POINTS + 5 {
            s.extend(Vec2::new(i as f32 * 5.0, 0.0));
        }
        assert_eq!(s.points().len(), STROKE_MAX_POINTS);
        assert_eq!(s.points()[0], Vec2::new(30.0, 0.0));
    }

    #[test]
    fn test_preview_needs_two_points() {
        let mut s = Stroke::begin(Vec2::ZERO, 0.0);
        assert!(s.preview_segment().is_none());
        s.extend(Vec2::new(10.0, 0.0));
        s.extend(Vec2::new(20.0, 5.0));
        assert_eq!(
            s.preview_segment(),
            Some((Vec2::ZERO, Vec2::new(20.0, 5.0)))
        );
    }
}
