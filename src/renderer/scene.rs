//! Frame composition
//!
//! Builds a backend-independent [`FramePlan`]: what goes under the fog, how
//! strongly the background image shows, and what goes over the fog.

use glam::Vec2;

use super::shapes::{circle, segments_for, stroked_circle, thick_line};
use super::vertex::{Vertex, colors};
use crate::consts::{LINE_LIFETIME_MS, POINT_LIFETIME_MS};
use crate::remap;
use crate::settings::Tuning;
use crate::sim::{Ball, ObstacleRegistry};

/// Peak alpha (0..255) of a fresh obstacle
const OBSTACLE_ALPHA: f32 = 150.0;
/// Preview stroke alpha (0..255)
const PREVIEW_ALPHA: f32 = 150.0;
/// Frames for the trail to shrink to half size
const TRAIL_HALF_LIFE_FRAMES: f32 = 120.0;

/// How a batch is composited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blend {
    Alpha,
    Additive,
}

/// Vertices drawn with one blend mode
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub blend: Blend,
    pub vertices: Vec<Vertex>,
}

/// Everything the renderer needs for one frame
#[derive(Debug, Clone, Default)]
pub struct FramePlan {
    /// Drawn over the background, under the fog
    pub under_fog: Vec<Batch>,
    /// Background image opacity 0..1
    pub background_alpha: f32,
    /// Drawn over the fog
    pub over_fog: Vec<Batch>,
}

impl FramePlan {
    pub fn vertex_count(&self) -> usize {
        self.under_fog
            .iter()
            .chain(&self.over_fog)
            .map(|b| b.vertices.len())
            .sum()
    }
}

/// Breathing brightness of the ball, about 0.24..1.0
pub fn glow_factor(now_ms: f64) -> f32 {
    let t = now_ms as f32;
    let breathe = (t * 0.003).sin() * 0.3 + 0.7;
    let pulse = (t * 0.008).sin() * 0.2 + 0.8;
    breathe * pulse
}

/// Fog-clear stamp for a trail point `age` frames old: (diameter, alpha 0..255)
///
/// Shrinks exponentially to half the ball over the first two seconds of
/// frames, then tapers linearly to a fifth of that over the rest.
pub fn trail_stamp(age: usize, trail_len: usize, ball_size: f32) -> (f32, f32) {
    let age = age as f32;
    let remaining = trail_len as f32 - TRAIL_HALF_LIFE_FRAMES;

    let (size, alpha) = if age <= TRAIL_HALF_LIFE_FRAMES {
        (
            ball_size * 0.5f32.powf(age / TRAIL_HALF_LIFE_FRAMES),
            remap(age, 0.0, TRAIL_HALF_LIFE_FRAMES, 120.0, 60.0),
        )
    } else if remaining > 0.0 {
        let extra = age - TRAIL_HALF_LIFE_FRAMES;
        (
            ball_size * 0.5 * (1.0 - extra / remaining * 0.8),
            remap(extra, 0.0, remaining, 60.0, 10.0),
        )
    } else {
        (ball_size * 0.1, 10.0)
    };
    (size.max(1.0), alpha)
}

/// Faded line and marker strokes
pub fn obstacle_vertices(registry: &ObstacleRegistry, now_ms: f64, tuning: &Tuning) -> Vec<Vertex> {
    let mut vertices = Vec::new();
    let main = tuning.line_main_weight * 0.8;
    let glow = tuning.line_glow_weight;

    for line in registry.lines() {
        let progress = (line.age(now_ms) / LINE_LIFETIME_MS) as f32;
        if progress >= 1.0 || line.points.len() < 2 {
            continue;
        }
        let alpha = remap(progress, 0.0, 1.0, OBSTACLE_ALPHA, 0.0);
        let (a, b) = line.endpoints();
        vertices.extend(thick_line(a, b, glow, colors::white(alpha * tuning.line_glow_alpha)));
        vertices.extend(thick_line(a, b, main, colors::white(alpha)));
    }

    let diameter = tuning.point_radius();
    for point in registry.points() {
        let progress = (point.age(now_ms) / POINT_LIFETIME_MS) as f32;
        if progress >= 1.0 {
            continue;
        }
        let alpha = remap(progress, 0.0, 1.0, OBSTACLE_ALPHA, 0.0);
        let glow_color = colors::white(alpha * tuning.line_glow_alpha);
        vertices.extend(stroked_circle(point.center, diameter, glow, glow_color));
        vertices.extend(stroked_circle(point.center, diameter, main, colors::white(alpha)));
    }

    vertices
}

/// Layered glow, core and highlight of the ball
pub fn ball_vertices(ball: &Ball, glow: f32, tuning: &Tuning) -> Vec<Vertex> {
    let mut vertices = Vec::new();
    let size = ball.size;
    let layers = tuning.glow_layers.max(1);

    for i in (1..=layers).rev() {
        let alpha = remap(i as f32, 0.0, layers as f32, 255.0, 30.0) * glow;
        let r = (size + i as f32 * tuning.glow_spread) * 0.5;
        vertices.extend(circle(ball.pos, r, colors::white(alpha), segments_for(r)));
    }

    let r = size * 0.5;
    vertices.extend(circle(ball.pos, r, colors::white(255.0 * glow), segments_for(r)));

    let highlight = ball.pos - Vec2::splat(size * 0.15);
    let r = size * 0.2;
    vertices.extend(circle(highlight, r, colors::white(200.0 * glow), segments_for(r)));

    vertices
}

/// In-progress stroke: straight first-to-last segment
pub fn preview_vertices(segment: Option<(Vec2, Vec2)>, tuning: &Tuning) -> Vec<Vertex> {
    let Some((a, b)) = segment else {
        return Vec::new();
    };
    thick_line(a, b, tuning.line_main_weight * 0.8, colors::white(PREVIEW_ALPHA))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glow_range() {
        for t in 0..5_000 {
            let g = glow_factor(t as f64 * 7.0);
            assert!((0.2..=1.0).contains(&g), "glow {g}");
        }
    }

    #[test]
    fn test_trail_stamp_taper() {
        let (head, head_alpha) = trail_stamp(0, 600, 32.0);
        assert_eq!(head, 32.0);
        assert_eq!(head_alpha, 120.0);

        let (half, half_alpha) = trail_stamp(120, 600, 32.0);
        assert!((half - 16.0).abs() < 1e-4);
        assert_eq!(half_alpha, 60.0);

        let (tail, tail_alpha) = trail_stamp(600, 600, 32.0);
        assert!((tail - 3.2).abs() < 1e-4);
        assert_eq!(tail_alpha, 10.0);
    }

    #[test]
    fn test_trail_stamp_minimum_size() {
        let (size, _) = trail_stamp(600, 600, 4.0);
        assert_eq!(size, 1.0);
    }

    #[test]
    fn test_expired_obstacles_not_drawn() {
        let mut reg = ObstacleRegistry::new();
        reg.add_line(vec![Vec2::ZERO, Vec2::new(100.0, 0.0)], 0.0);
        let tuning = Tuning::desktop();
        assert!(!obstacle_vertices(&reg, 5_000.0, &tuning).is_empty());
        assert!(obstacle_vertices(&reg, LINE_LIFETIME_MS, &tuning).is_empty());
    }

    #[test]
    fn test_obstacle_fades() {
        let mut reg = ObstacleRegistry::new();
        reg.add_line(vec![Vec2::ZERO, Vec2::new(100.0, 0.0)], 0.0);
        let tuning = Tuning::desktop();
        let max_alpha = |now| {
            obstacle_vertices(&reg, now, &tuning)
                .iter()
                .map(|v| v.color[3])
                .fold(0.0, f32::max)
        };
        assert!((max_alpha(0.0) - 150.0 / 255.0).abs() < 1e-5);
        assert!(max_alpha(5_000.0) < max_alpha(0.0));
    }

    #[test]
    fn test_ball_layers() {
        let ball = Ball::new(Vec2::new(50.0, 50.0), Vec2::ZERO, 32.0);
        let tuning = Tuning::desktop();
        let v = ball_vertices(&ball, 1.0, &tuning);
        let extent = v
            .iter()
            .map(|p| Vec2::from(p.position).distance(ball.pos))
            .fold(0.0, f32::max);
        // Outermost layer: (32 + 8 * 6) / 2
        assert!((extent - 40.0).abs() < 1e-3);
    }

    #[test]
    fn test_preview_only_while_dragging() {
        let tuning = Tuning::desktop();
        assert!(preview_vertices(None, &tuning).is_empty());
        assert!(!preview_vertices(Some((Vec2::ZERO, Vec2::new(30.0, 0.0))), &tuning).is_empty());
    }
}
