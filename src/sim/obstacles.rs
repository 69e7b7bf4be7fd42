//! Obstacle registry
//!
//! Drawn lines and tapped hexagon markers. Both expire by age and are
//! capacity-bounded with oldest-first eviction.

use std::collections::VecDeque;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::geometry::{collision_curve, hexagon, polyline_length};
use crate::consts::{LINE_LIFETIME_MS, MAX_LINES, MAX_POINTS, POINT_LIFETIME_MS};

/// Stable obstacle identity, unique within a registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObstacleId(pub u32);

/// A drawn line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineObstacle {
    pub id: ObstacleId,
    /// Raw stroke points as recorded
    pub points: Vec<Vec2>,
    /// Smoothed copy of the stroke (drawn, not collided)
    pub curve: Vec<Vec2>,
    /// Creation time (ms)
    pub start_ms: f64,
    /// Set once the line has cut its shape out of the fog
    pub fog_cleared: bool,
}

impl LineObstacle {
    /// Collision segment: first to last recorded point
    pub fn endpoints(&self) -> (Vec2, Vec2) {
        // Registry never stores lines with fewer than two points
        let first = self.points.first().copied().unwrap_or_default();
        let last = self.points.last().copied().unwrap_or_default();
        (first, last)
    }

    /// Path length of the stroke, used for pitch
    pub fn length(&self) -> f32 {
        polyline_length(&self.points)
    }

    pub fn age(&self, now_ms: f64) -> f64 {
        now_ms - self.start_ms
    }

    /// Remaining life as 0..1 (1 = just drawn)
    pub fn life_fraction(&self, now_ms: f64) -> f32 {
        (1.0 - self.age(now_ms) / LINE_LIFETIME_MS).clamp(0.0, 1.0) as f32
    }
}

/// A tapped hexagon marker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointObstacle {
    pub id: ObstacleId,
    pub center: Vec2,
    pub vertices: [Vec2; 6],
    pub start_ms: f64,
    pub fog_cleared: bool,
}

impl PointObstacle {
    /// The six hexagon edges, in vertex order
    pub fn edges(&self) -> impl Iterator<Item = (Vec2, Vec2)> + '_ {
        (0..6).map(|i| (self.vertices[i], self.vertices[(i + 1) % 6]))
    }

    pub fn age(&self, now_ms: f64) -> f64 {
        now_ms - self.start_ms
    }

    pub fn life_fraction(&self, now_ms: f64) -> f32 {
        (1.0 - self.age(now_ms) / POINT_LIFETIME_MS).clamp(0.0, 1.0) as f32
    }
}

/// All live obstacles, in registration order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObstacleRegistry {
    lines: VecDeque<LineObstacle>,
    points: VecDeque<PointObstacle>,
    next_id: u32,
}

impl ObstacleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_obstacle_id(&mut self) -> ObstacleId {
        let id = ObstacleId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Register a drawn line
    ///
    /// Returns `None` for strokes too short to form a segment. When the
    /// concurrent line cap is hit the oldest line is dropped.
    pub fn add_line(&mut self, points: Vec<Vec2>, start_ms: f64) -> Option<ObstacleId> {
        if points.len() < 2 {
            log::debug!("Skipping line with {} point(s)", points.len());
            return None;
        }

        let id = self.next_obstacle_id();
        let curve = collision_curve(&points);
        self.lines.push_back(LineObstacle {
            id,
            points,
            curve,
            start_ms,
            fog_cleared: false,
        });
        while self.lines.len() > MAX_LINES {
            self.lines.pop_front();
        }
        Some(id)
    }

    /// Register a hexagon marker
    pub fn add_point(&mut self, center: Vec2, radius: f32, start_ms: f64) -> ObstacleId {
        let id = self.next_obstacle_id();
        self.points.push_back(PointObstacle {
            id,
            center,
            vertices: hexagon(center, radius),
            start_ms,
            fog_cleared: false,
        });
        while self.points.len() > MAX_POINTS {
            self.points.pop_front();
        }
        id
    }

    /// Drop every obstacle whose age has reached its lifetime
    pub fn prune_expired(&mut self, now_ms: f64) {
        self.lines.retain(|l| now_ms - l.start_ms < LINE_LIFETIME_MS);
        self.points.retain(|p| now_ms - p.start_ms < POINT_LIFETIME_MS);
    }

    pub fn lines(&self) -> impl Iterator<Item = &LineObstacle> {
        self.lines.iter()
    }

    pub fn points(&self) -> impl Iterator<Item = &PointObstacle> {
        self.points.iter()
    }

    pub fn lines_mut(&mut self) -> impl Iterator<Item = &mut LineObstacle> {
        self.lines.iter_mut()
    }

    pub fn points_mut(&mut self) -> impl Iterator<Item = &mut PointObstacle> {
        self.points.iter_mut()
    }

    pub fn line(&self, id: ObstacleId) -> Option<&LineObstacle> {
        self.lines.iter().find(|l| l.id == id)
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    /// Ids of every live obstacle
    pub fn live_ids(&self) -> Vec<ObstacleId> {
        self.lines
            .iter()
            .map(|l| l.id)
            .chain(self.points.iter().map(|p| p.id))
            .collect()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.points.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stroke(n: usize) -> Vec<Vec2> {
        (0..n).map(|i| Vec2::new(i as f32 * 10.0, 0.0)).collect()
    }

    #[test]
    fn test_add_line_derives_endpoints_and_curve() {
        let mut reg = ObstacleRegistry::new();
        let id = reg.add_line(stroke(8), 0.0).unwrap();
        let line = reg.line(id).unwrap();
        assert_eq!(line.endpoints(), (Vec2::ZERO, Vec2::new(70.0, 0.0)));
        assert_eq!(line.curve.len(), 8);
        assert_eq!(line.length(), 70.0);
        assert!(!line.fog_cleared);
    }

    #[test]
    fn test_malformed_line_skipped() {
        let mut reg = ObstacleRegistry::new();
        assert!(reg.add_line(stroke(1), 0.0).is_none());
        assert_eq!(reg.line_count(), 0);
    }

    #[test]
    fn test_line_expiry_boundary() {
        let now = 50_000.0;
        let mut reg = ObstacleRegistry::new();
        reg.add_line(stroke(6), now - LINE_LIFETIME_MS - 1.0);
        let fresh = reg.add_line(stroke(6), now).unwrap();
        reg.prune_expired(now);
        let ids: Vec<_> = reg.lines().map(|l| l.id).collect();
        assert_eq!(ids, vec![fresh]);
    }

    #[test]
    fn test_point_expiry_boundary() {
        let now = 50_000.0;
        let mut reg = ObstacleRegistry::new();
        reg.add_point(Vec2::ZERO, 6.0, now - POINT_LIFETIME_MS - 1.0);
        reg.add_point(Vec2::ZERO, 6.0, now);
        reg.prune_expired(now);
        assert_eq!(reg.point_count(), 1);
    }

    #[test]
    fn test_point_capacity_evicts_oldest() {
        let mut reg = ObstacleRegistry::new();
        let first = reg.add_point(Vec2::ZERO, 6.0, 0.0);
        for i in 0..MAX_POINTS {
            reg.add_point(Vec2::splat(i as f32), 6.0, i as f64);
        }
        assert_eq!(reg.point_count(), MAX_POINTS);
        assert!(reg.points().all(|p| p.id != first));
    }

    #[test]
    fn test_line_capacity_evicts_oldest() {
        let mut reg = ObstacleRegistry::new();
        let first = reg.add_line(stroke(6), 0.0).unwrap();
        for _ in 0..MAX_LINES {
            reg.add_line(stroke(6), 1.0);
        }
        assert_eq!(reg.line_count(), MAX_LINES);
        assert!(reg.line(first).is_none());
    }

    #[test]
    fn test_ids_are_unique_across_kinds() {
        let mut reg = ObstacleRegistry::new();
        let a = reg.add_line(stroke(6), 0.0).unwrap();
        let b = reg.add_point(Vec2::ZERO, 6.0, 0.0);
        assert_ne!(a, b);
        assert_eq!(reg.live_ids().len(), 2);
    }

    #[test]
    fn test_hexagon_has_six_closed_edges() {
        let mut reg = ObstacleRegistry::new();
        reg.add_point(Vec2::new(10.0, 10.0), 5.0, 0.0);
        let point = reg.points().next().unwrap();
        let edges: Vec<_> = point.edges().collect();
        assert_eq!(edges.len(), 6);
        assert_eq!(edges[5].1, edges[0].0);
    }

    #[test]
    fn test_life_fraction() {
        let mut reg = ObstacleRegistry::new();
        let id = reg.add_line(stroke(6), 1_000.0).unwrap();
        let line = reg.line(id).unwrap();
        assert_eq!(line.life_fraction(1_000.0), 1.0);
        assert!((line.life_fraction(6_000.0) - 0.5).abs() < 1e-6);
        assert_eq!(line.life_fraction(20_000.0), 0.0);
    }
}
