//! Simulation state and events

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;

use super::ball::Ball;
use super::collision::HitTracker;
use super::obstacles::{ObstacleId, ObstacleRegistry};
use super::ripple::Ripple;
use crate::settings::Tuning;

/// Something the rest of the app reacts to (sound, score)
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    /// Ball bounced off a canvas edge
    WallHit {
        pos: Vec2,
        /// Pseudo line length used for pitch
        length: f32,
    },
    /// Ball bounced off a drawn line
    LineHit {
        id: ObstacleId,
        pos: Vec2,
        /// Path length of the line
        length: f32,
        consecutive: u32,
        volume: f32,
        age_ms: f64,
    },
    /// Ball bounced off a hexagon marker
    MarkerHit {
        id: ObstacleId,
        pos: Vec2,
        volume: f32,
    },
}

/// Everything the ball simulation owns
#[derive(Debug, Clone)]
pub struct SimState {
    pub ball: Ball,
    pub obstacles: ObstacleRegistry,
    pub ripples: Vec<Ripple>,
    pub hits: HitTracker,
    /// Canvas size in pixels
    pub bounds: Vec2,
    pub tuning: Tuning,
    rng: Pcg32,
}

impl SimState {
    pub fn new(bounds: Vec2, tuning: Tuning, seed: u64) -> Self {
        let mut rng = Pcg32::seed_from_u64(seed);
        let ball = Ball::spawn(bounds / 2.0, tuning.ball_size, &mut rng);
        Self {
            ball,
            obstacles: ObstacleRegistry::new(),
            ripples: Vec::new(),
            hits: HitTracker::new(),
            bounds,
            tuning,
            rng,
        }
    }

    /// Respawn the ball at the centre with a fresh heading
    pub fn reset_ball(&mut self) {
        self.ball = Ball::spawn(self.bounds / 2.0, self.tuning.ball_size, &mut self.rng);
    }

    /// Clear obstacles, ripples and streaks, and respawn the ball
    pub fn reset(&mut self) {
        self.obstacles.clear();
        self.ripples.clear();
        self.hits.reset();
        self.reset_ball();
    }

    /// Adopt new canvas bounds, keeping the ball inside
    pub fn resize(&mut self, bounds: Vec2) {
        self.bounds = bounds;
        let half = self.ball.half_size();
        self.ball.pos = self
            .ball
            .pos
            .clamp(Vec2::splat(half), (bounds - half).max(Vec2::splat(half)));
    }

    pub fn diagonal(&self) -> f32 {
        self.bounds.length()
    }

    pub fn collision_radius(&self) -> f32 {
        self.tuning.collision_radius()
    }

    pub fn rng_mut(&mut self) -> &mut Pcg32 {
        &mut self.rng
    }

    pub fn spawn_ripple(&mut self, pos: Vec2, now_ms: f64) {
        self.ripples.push(Ripple::new(pos, now_ms));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ball_spawns_centered() {
        let state = SimState::new(Vec2::new(800.0, 600.0), Tuning::desktop(), 1);
        assert_eq!(state.ball.pos, Vec2::new(400.0, 300.0));
        assert_eq!(state.ball.size, 32.0);
    }

    #[test]
    fn test_same_seed_same_heading() {
        let a = SimState::new(Vec2::new(800.0, 600.0), Tuning::desktop(), 99);
        let b = SimState::new(Vec2::new(800.0, 600.0), Tuning::desktop(), 99);
        assert_eq!(a.ball.vel, b.ball.vel);
    }

    #[test]
    fn test_resize_keeps_ball_inside() {
        let mut state = SimState::new(Vec2::new(800.0, 600.0), Tuning::desktop(), 1);
        state.ball.pos = Vec2::new(780.0, 580.0);
        state.resize(Vec2::new(400.0, 300.0));
        assert_eq!(state.ball.pos, Vec2::new(384.0, 284.0));
    }

    #[test]
    fn test_reset_clears_world() {
        let mut state = SimState::new(Vec2::new(800.0, 600.0), Tuning::desktop(), 1);
        state.obstacles.add_point(Vec2::ZERO, 6.0, 0.0);
        state.spawn_ripple(Vec2::ZERO, 0.0);
        state.reset();
        assert_eq!(state.obstacles.point_count(), 0);
        assert!(state.ripples.is_empty());
        assert_eq!(state.ball.pos, Vec2::new(400.0, 300.0));
    }
}
