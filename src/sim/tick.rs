//! Per-frame ball update
//!
//! Order per frame: trail, integrate, walls, then obstacles. At most one
//! obstacle is resolved per frame; lines are tested before markers, each in
//! registration order.

use glam::Vec2;

use super::ball::wall_sound_length;
use super::collision::{Contact, resolve_contact, segment_contact};
use super::state::{SimEvent, SimState};
use crate::consts::{BALL_SPEED, RIPPLE_LIFETIME_MS};

/// Advance the ball one frame and resolve collisions
pub fn step_ball(state: &mut SimState, now_ms: f64) -> Vec<SimEvent> {
    let mut events = Vec::new();

    state.ball.record_trail();
    let prev = state.ball.integrate();

    let walls = state.ball.bounce_walls(state.bounds);
    let diagonal = state.diagonal();
    for _ in 0..walls.count() {
        let length = wall_sound_length(diagonal, state.rng_mut());
        events.push(SimEvent::WallHit {
            pos: state.ball.pos,
            length,
        });
    }

    if let Some(event) = collide_lines(state, prev, now_ms) {
        events.push(event);
    } else if let Some(event) = collide_markers(state, prev, now_ms) {
        events.push(event);
    }

    events
}

fn collide_lines(state: &mut SimState, prev: Vec2, now_ms: f64) -> Option<SimEvent> {
    let radius = state.collision_radius();
    let pos = state.ball.pos;

    let (id, length, age_ms, contact) = state.obstacles.lines().find_map(|line| {
        if line.points.len() < 2 {
            return None;
        }
        let (a, b) = line.endpoints();
        let contact = segment_contact(prev, pos, a, b, radius)?;
        Some((line.id, line.length(), line.age(now_ms), contact))
    })?;

    let hit = state.hits.line_hit(id, now_ms);
    state.spawn_ripple(state.ball.pos, now_ms);
    bounce(state, prev, &contact);

    log::debug!(
        "line {:?} hit x{} (len {:.0}, vol {:.2})",
        id,
        hit.consecutive,
        length,
        hit.volume
    );

    Some(SimEvent::LineHit {
        id,
        pos: state.ball.pos,
        length,
        consecutive: hit.consecutive,
        volume: hit.volume,
        age_ms,
    })
}

fn collide_markers(state: &mut SimState, prev: Vec2, now_ms: f64) -> Option<SimEvent> {
    let radius = state.collision_radius();
    let pos = state.ball.pos;

    let (id, contact) = state.obstacles.points().find_map(|point| {
        point
            .edges()
            .find_map(|(a, b)| segment_contact(prev, pos, a, b, radius))
            .map(|contact| (point.id, contact))
    })?;

    let hit = state.hits.marker_hit(now_ms);
    state.spawn_ripple(state.ball.pos, now_ms);
    bounce(state, prev, &contact);

    log::debug!("marker {:?} hit (vol {:.2})", id, hit.volume);

    Some(SimEvent::MarkerHit {
        id,
        pos: state.ball.pos,
        volume: hit.volume,
    })
}

fn bounce(state: &mut SimState, prev: Vec2, contact: &Contact) {
    let radius = state.collision_radius();
    resolve_contact(&mut state.ball, prev, contact, radius, BALL_SPEED);
}

/// Drop expired obstacles
pub fn prune_obstacles(state: &mut SimState, now_ms: f64) {
    state.obstacles.prune_expired(now_ms);
}

/// Drop finished ripples
pub fn prune_ripples(state: &mut SimState, now_ms: f64) {
    state
        .ripples
        .retain(|r| now_ms - r.start_ms <= RIPPLE_LIFETIME_MS);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Tuning;

    fn state(w: f32, h: f32) -> SimState {
        SimState::new(Vec2::new(w, h), Tuning::desktop(), 5)
    }

    #[test]
    fn test_free_flight_keeps_velocity() {
        let mut s = state(800.0, 600.0);
        s.ball.pos = Vec2::new(400.0, 300.0);
        s.ball.vel = Vec2::new(1.25, -0.75);
        let events = step_ball(&mut s, 0.0);
        assert!(events.is_empty());
        assert_eq!(s.ball.vel, Vec2::new(1.25, -0.75));
        assert_eq!(s.ball.pos, Vec2::new(401.25, 299.25));
        assert_eq!(s.ball.trail.back().copied(), Some(Vec2::new(400.0, 300.0)));
    }

    #[test]
    fn test_wall_scenario() {
        let mut s = state(200.0, 200.0);
        s.ball.pos = Vec2::new(100.0, 100.0);
        s.ball.vel = Vec2::new(1.0, 1.0);
        let diag = s.diagonal();

        let mut frames = 0;
        let events = loop {
            let events = step_ball(&mut s, frames as f64 * 22.0);
            frames += 1;
            if !events.is_empty() || frames > 1000 {
                break events;
            }
        };

        assert!(s.ball.vel.x < 0.0);
        assert!(s.ball.vel.y < 0.0);
        assert_eq!(s.ball.pos.x, 200.0 - 16.0);
        // Diagonal travel strikes both walls on the same frame
        assert_eq!(events.len(), 2);
        for e in events {
            match e {
                SimEvent::WallHit { length, .. } => {
                    assert!(length >= diag * 0.1 && length <= diag * 0.3);
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn test_line_crossing_scenario() {
        let mut s = state(400.0, 400.0);
        let line: Vec<Vec2> = (0..=10)
            .map(|i| Vec2::new(50.0 + i as f32 * 10.0, 50.0))
            .collect();
        let id = s.obstacles.add_line(line, 0.0).unwrap();
        s.ball.pos = Vec2::new(100.0, 20.0);
        s.ball.vel = Vec2::new(0.0, 60.0);

        let events = step_ball(&mut s, 100.0);

        assert_eq!(events.len(), 1);
        match &events[0] {
            SimEvent::LineHit {
                id: hit,
                consecutive,
                length,
                age_ms,
                ..
            } => {
                assert_eq!(*hit, id);
                assert_eq!(*consecutive, 1);
                assert_eq!(*length, 100.0);
                assert_eq!(*age_ms, 100.0);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(s.ball.vel.y < 0.0);
        assert!(50.0 - s.ball.pos.y > s.collision_radius());
        assert_eq!(s.ripples.len(), 1);
    }

    #[test]
    fn test_only_first_obstacle_resolved() {
        let mut s = state(400.0, 400.0);
        let first = s
            .obstacles
            .add_line(vec![Vec2::new(50.0, 100.0), Vec2::new(150.0, 100.0)], 0.0)
            .unwrap();
        s.obstacles
            .add_line(vec![Vec2::new(50.0, 110.0), Vec2::new(150.0, 110.0)], 0.0);
        s.ball.pos = Vec2::new(100.0, 80.0);
        s.ball.vel = Vec2::new(0.0, 1.5);

        let events = step_ball(&mut s, 0.0);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], SimEvent::LineHit { id, .. } if id == first));
    }

    #[test]
    fn test_marker_hit() {
        let mut s = state(400.0, 400.0);
        let radius = s.tuning.point_radius();
        let id = s.obstacles.add_point(Vec2::new(200.0, 200.0), radius, 0.0);
        s.ball.pos = Vec2::new(200.0, 170.0);
        s.ball.vel = Vec2::new(0.0, 1.5);

        let events = step_ball(&mut s, 10.0);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], SimEvent::MarkerHit { id: hit, .. } if hit == id));
        assert_ne!(s.ball.vel, Vec2::new(0.0, 1.5));
        assert_eq!(s.ripples.len(), 1);
    }

    #[test]
    fn test_lines_take_priority_over_markers() {
        let mut s = state(400.0, 400.0);
        let radius = s.tuning.point_radius();
        s.obstacles.add_point(Vec2::new(100.0, 105.0), radius, 0.0);
        s.obstacles
            .add_line(vec![Vec2::new(50.0, 100.0), Vec2::new(150.0, 100.0)], 0.0);
        s.ball.pos = Vec2::new(100.0, 80.0);
        s.ball.vel = Vec2::new(0.0, 1.5);

        let events = step_ball(&mut s, 0.0);
        assert!(matches!(events[0], SimEvent::LineHit { .. }));
    }

    #[test]
    fn test_prune() {
        let mut s = state(400.0, 400.0);
        s.spawn_ripple(Vec2::ZERO, 0.0);
        s.obstacles
            .add_line(vec![Vec2::ZERO, Vec2::new(10.0, 0.0)], 0.0);
        prune_ripples(&mut s, RIPPLE_LIFETIME_MS + 1.0);
        prune_obstacles(&mut s, RIPPLE_LIFETIME_MS + 1.0);
        assert!(s.ripples.is_empty());
        assert_eq!(s.obstacles.line_count(), 1);
    }
}
