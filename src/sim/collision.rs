//! Ball-vs-obstacle collision detection and response
//!
//! Obstacles are thin segments; the ball is a circle of the collision
//! radius. Fast balls are caught by also testing the swept path from the
//! previous position, so they cannot tunnel through a line between frames.

use glam::Vec2;

use super::ball::Ball;
use super::geometry::{
    distance_point_to_segment, min_distance_between_segments, reflect_velocity,
    segments_intersect,
};
use super::obstacles::ObstacleId;
use crate::consts::{
    BOUNCE_DAMPING, COLLISION_EPSILON, MIN_SPEED_RATIO, RETRIGGER_VOLUME, RETRIGGER_WINDOW_MS,
    STREAK_TIMEOUT_MS,
};

/// A detected ball-segment contact
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub a: Vec2,
    pub b: Vec2,
    /// The swept path crossed the segment
    pub crossed: bool,
}

/// Test the ball's sweep from `prev` to `pos` against segment `a`-`b`
///
/// Zero-length segments never collide.
pub fn segment_contact(prev: Vec2, pos: Vec2, a: Vec2, b: Vec2, radius: f32) -> Option<Contact> {
    if a.distance_squared(b) < f32::EPSILON {
        return None;
    }

    let distance = distance_point_to_segment(pos, a, b);
    let crossed = segments_intersect(prev, pos, a, b);
    let path_distance = min_distance_between_segments(prev, pos, a, b);

    (distance <= radius || crossed || path_distance <= radius).then_some(Contact { a, b, crossed })
}

/// Bounce the ball off a contact
///
/// The normal is oriented toward the side the ball approached from. A
/// crossed sweep is pulled back to the midpoint of the step before the
/// push-out. Speed is damped slightly and floored at a fraction of
/// `nominal_speed`.
pub fn resolve_contact(ball: &mut Ball, prev: Vec2, contact: &Contact, radius: f32, nominal_speed: f32) {
    let dir = (contact.b - contact.a).normalize_or_zero();
    if dir == Vec2::ZERO {
        return;
    }
    let mut normal = Vec2::new(-dir.y, dir.x);

    if contact.crossed {
        ball.pos = (prev + ball.pos) * 0.5;
    }

    let mut side = (ball.pos - contact.a).dot(normal);
    if contact.crossed || side.abs() < f32::EPSILON {
        side = (prev - contact.a).dot(normal);
    }
    if side < 0.0 {
        normal = -normal;
    }

    // Crossed sweeps may sit on the far side, so measure along the normal
    let distance = if contact.crossed {
        (ball.pos - contact.a).dot(normal)
    } else {
        distance_point_to_segment(ball.pos, contact.a, contact.b)
    };
    let penetration = radius - distance;
    if penetration > 0.0 {
        ball.pos += normal * (penetration + COLLISION_EPSILON);
    }

    ball.vel = reflect_velocity(ball.vel, normal) * BOUNCE_DAMPING;
    let min_speed = nominal_speed * MIN_SPEED_RATIO;
    if ball.vel.length() < min_speed {
        ball.vel = ball.vel.normalize_or(normal) * nominal_speed;
    }
}

/// Result of registering a hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitInfo {
    /// Hits in the current streak on the same obstacle (1 = first)
    pub consecutive: u32,
    /// Volume multiplier (reduced for rapid retriggers)
    pub volume: f32,
}

/// Tracks streaks of repeated hits on the same obstacle
#[derive(Debug, Clone, Default)]
pub struct HitTracker {
    last_obstacle: Option<ObstacleId>,
    consecutive: u32,
    last_hit_ms: Option<f64>,
}

impl HitTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn retrigger_volume(&self, now_ms: f64) -> f32 {
        match self.last_hit_ms {
            Some(t) if now_ms - t < RETRIGGER_WINDOW_MS => RETRIGGER_VOLUME,
            _ => 1.0,
        }
    }

    /// Register a line hit; repeated hits on one line extend the streak
    pub fn line_hit(&mut self, id: ObstacleId, now_ms: f64) -> HitInfo {
        let volume = self.retrigger_volume(now_ms);
        let streak_alive = self
            .last_hit_ms
            .is_some_and(|t| now_ms - t <= STREAK_TIMEOUT_MS);

        self.consecutive = if self.last_obstacle == Some(id) && streak_alive {
            self.consecutive + 1
        } else {
            1
        };
        self.last_obstacle = Some(id);
        self.last_hit_ms = Some(now_ms);

        HitInfo {
            consecutive: self.consecutive,
            volume,
        }
    }

    /// Register a marker hit; markers always start a fresh streak
    pub fn marker_hit(&mut self, now_ms: f64) -> HitInfo {
        let volume = self.retrigger_volume(now_ms);
        self.consecutive = 1;
        self.last_obstacle = None;
        self.last_hit_ms = Some(now_ms);
        HitInfo {
            consecutive: 1,
            volume,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
