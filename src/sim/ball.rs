//! The ball: integration, wall bounce, and trail

use std::collections::VecDeque;

use glam::Vec2;
use rand::Rng;

use crate::consts::{BALL_MIN_AXIS_SPEED, BALL_SPEED, TRAIL_LENGTH, WALL_SHORT_CHANCE};

/// Which walls were struck during a step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WallHits {
    pub x: bool,
    pub y: bool,
}

impl WallHits {
    pub fn count(&self) -> usize {
        self.x as usize + self.y as usize
    }
}

#[derive(Debug, Clone)]
pub struct Ball {
    pub pos: Vec2,
    /// Pixels per frame
    pub vel: Vec2,
    /// Diameter
    pub size: f32,
    /// Past positions, oldest first
    pub trail: VecDeque<Vec2>,
}

impl Ball {
    pub fn new(pos: Vec2, vel: Vec2, size: f32) -> Self {
        Self {
            pos,
            vel,
            size,
            trail: VecDeque::with_capacity(TRAIL_LENGTH),
        }
    }

    /// Place a ball at `center` with a random heading
    ///
    /// Each velocity component is drawn from [-speed, speed] and pushed out
    /// to at least 0.5 so the ball never crawls along an axis.
    pub fn spawn(center: Vec2, size: f32, rng: &mut impl Rng) -> Self {
        let mut axis = || {
            let v: f32 = rng.random_range(-BALL_SPEED..=BALL_SPEED);
            if v.abs() < BALL_MIN_AXIS_SPEED {
                if v < 0.0 {
                    -BALL_MIN_AXIS_SPEED
                } else {
                    BALL_MIN_AXIS_SPEED
                }
            } else {
                v
            }
        };
        let vel = Vec2::new(axis(), axis());
        Self::new(center, vel, size)
    }

    pub fn half_size(&self) -> f32 {
        self.size / 2.0
    }

    /// Push the current position onto the trail
    pub fn record_trail(&mut self) {
        self.trail.push_back(self.pos);
        while self.trail.len() > TRAIL_LENGTH {
            self.trail.pop_front();
        }
    }

    /// Advance one frame; returns the previous position
    pub fn integrate(&mut self) -> Vec2 {
        let prev = self.pos;
        self.pos += self.vel;
        prev
    }

    /// Bounce off the canvas edges
    ///
    /// Each axis is handled on its own: touching or passing an edge flips
    /// that velocity component and clamps the ball back inside.
    pub fn bounce_walls(&mut self, bounds: Vec2) -> WallHits {
        let half = self.half_size();
        let mut hits = WallHits::default();

        if self.pos.x - half <= 0.0 || self.pos.x + half >= bounds.x {
            self.vel.x = -self.vel.x;
            self.pos.x = self.pos.x.clamp(half, (bounds.x - half).max(half));
            hits.x = true;
        }
        if self.pos.y - half <= 0.0 || self.pos.y + half >= bounds.y {
            self.vel.y = -self.vel.y;
            self.pos.y = self.pos.y.clamp(half, (bounds.y - half).max(half));
            hits.y = true;
        }

        hits
    }

    pub fn speed(&self) -> f32 {
        self.vel.length()
    }
}

/// Pseudo line length for a wall strike
///
/// The canvas diagonal sets the range [0.1, 0.3] x diag, split at 0.2.
/// Short (high) lengths are picked 30% of the time.
pub fn wall_sound_length(diagonal: f32, rng: &mut impl Rng) -> f32 {
    let min = diagonal * 0.1;
    let max = diagonal * 0.3;
    let mid = (min + max) / 2.0;
    if max <= min {
        return min;
    }
    if rng.random_bool(WALL_SHORT_CHANCE) {
        rng.random_range(min..mid)
    } else {
        rng.random_range(mid..=max)
    }
}
