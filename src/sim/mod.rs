//! Deterministic simulation module
//!
//! Ball physics, obstacles and collisions live here. This module must be
//! pure and deterministic:
//! - Velocity in pixels per frame, one step per frame
//! - Seeded RNG only
//! - Stable iteration order (registration order)
//! - No rendering or platform dependencies

pub mod ball;
pub mod collision;
pub mod geometry;
pub mod obstacles;
pub mod ripple;
pub mod state;
pub mod stroke;
pub mod tick;

pub use ball::{Ball, WallHits, wall_sound_length};
pub use collision::{Contact, HitInfo, HitTracker, resolve_contact, segment_contact};
pub use geometry::{
    collision_curve, distance_point_to_segment, hexagon, min_distance_between_segments,
    polyline_length, segments_intersect, smooth_polyline,
};
pub use obstacles::{LineObstacle, ObstacleId, ObstacleRegistry, PointObstacle};
pub use ripple::Ripple;
pub use state::{SimEvent, SimState};
pub use stroke::{Stroke, StrokeOutcome};
pub use tick::{prune_obstacles, prune_ripples, step_ball};
