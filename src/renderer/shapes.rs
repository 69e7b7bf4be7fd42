//! Shape generation for 2D primitives
//!
//! All shapes are triangle lists in canvas pixels.

use glam::Vec2;
use std::f32::consts::PI;

use super::vertex::Vertex;

/// Segment count that keeps circles smooth without wasting triangles
pub fn segments_for(radius: f32) -> u32 {
    ((radius * 0.75) as u32).clamp(12, 64)
}

/// Generate vertices for a filled circle
pub fn circle(center: Vec2, radius: f32, color: [f32; 4], segments: u32) -> Vec<Vertex> {
    let mut vertices = Vec::with_capacity((segments * 3) as usize);
    if radius <= 0.0 {
        return vertices;
    }

    for i in 0..segments {
        let theta1 = (i as f32 / segments as f32) * 2.0 * PI;
        let theta2 = ((i + 1) as f32 / segments as f32) * 2.0 * PI;

        // Triangle from center to edge
        vertices.push(Vertex::new(center.x, center.y, color));
        vertices.push(Vertex::new(
            center.x + radius * theta1.cos(),
            center.y + radius * theta1.sin(),
            color,
        ));
        vertices.push(Vertex::new(
            center.x + radius * theta2.cos(),
            center.y + radius * theta2.sin(),
            color,
        ));
    }

    vertices
}

/// Generate vertices for a ring (hollow circle)
///
/// An inner radius of zero degenerates to a filled disc.
pub fn ring(
    center: Vec2,
    inner_radius: f32,
    outer_radius: f32,
    color: [f32; 4],
    segments: u32,
) -> Vec<Vertex> {
    let inner_radius = inner_radius.max(0.0);
    let mut vertices = Vec::with_capacity((segments * 6) as usize);
    if outer_radius <= inner_radius {
        return vertices;
    }

    let at = |r: f32, theta: f32| center + Vec2::new(r * theta.cos(), r * theta.sin());
    for i in 0..segments {
        let theta1 = (i as f32 / segments as f32) * 2.0 * PI;
        let theta2 = ((i + 1) as f32 / segments as f32) * 2.0 * PI;

        let inner1 = at(inner_radius, theta1);
        let outer1 = at(outer_radius, theta1);
        let inner2 = at(inner_radius, theta2);
        let outer2 = at(outer_radius, theta2);

        // Two triangles per segment
        vertices.push(Vertex::new(inner1.x, inner1.y, color));
        vertices.push(Vertex::new(outer1.x, outer1.y, color));
        vertices.push(Vertex::new(inner2.x, inner2.y, color));

        vertices.push(Vertex::new(inner2.x, inner2.y, color));
        vertices.push(Vertex::new(outer1.x, outer1.y, color));
        vertices.push(Vertex::new(outer2.x, outer2.y, color));
    }

    vertices
}

/// Generate vertices for a stroked ellipse outline of `diameter`
///
/// Matches a canvas `stroke` of `weight` around the outline.
pub fn stroked_circle(center: Vec2, diameter: f32, weight: f32, color: [f32; 4]) -> Vec<Vertex> {
    let r = diameter * 0.5;
    let outer = r + weight * 0.5;
    ring(center, r - weight * 0.5, outer, color, segments_for(outer))
}

/// Generate vertices for a thick segment with round caps
pub fn thick_line(a: Vec2, b: Vec2, width: f32, color: [f32; 4]) -> Vec<Vertex> {
    let half = width * 0.5;
    if half <= 0.0 {
        return Vec::new();
    }
    let segments = segments_for(half);
    let mut vertices = Vec::with_capacity(6 + (segments * 6) as usize);

    let dir = (b - a).normalize_or_zero();
    if dir == Vec2::ZERO {
        vertices.extend(circle(a, half, color, segments));
        return vertices;
    }

    let perp = Vec2::new(-dir.y, dir.x) * half;
    let (a1, a2, b1, b2) = (a + perp, a - perp, b + perp, b - perp);

    vertices.push(Vertex::new(a1.x, a1.y, color));
    vertices.push(Vertex::new(a2.x, a2.y, color));
    vertices.push(Vertex::new(b1.x, b1.y, color));

    vertices.push(Vertex::new(b1.x, b1.y, color));
    vertices.push(Vertex::new(a2.x, a2.y, color));
    vertices.push(Vertex::new(b2.x, b2.y, color));

    vertices.extend(half_disc(a, -dir, half, color, segments / 2));
    vertices.extend(half_disc(b, dir, half, color, segments / 2));
    vertices
}

/// Semicircle bulging toward `facing`
fn half_disc(
    center: Vec2,
    facing: Vec2,
    radius: f32,
    color: [f32; 4],
    segments: u32,
) -> Vec<Vertex> {
    let segments = segments.max(4);
    let start = facing.y.atan2(facing.x) - PI / 2.0;
    let at = |theta: f32| center + Vec2::new(radius * theta.cos(), radius * theta.sin());

    let mut vertices = Vec::with_capacity((segments * 3) as usize);
    for i in 0..segments {
        let p1 = at(start + (i as f32 / segments as f32) * PI);
        let p2 = at(start + ((i + 1) as f32 / segments as f32) * PI);
        vertices.push(Vertex::new(center.x, center.y, color));
        vertices.push(Vertex::new(p1.x, p1.y, color));
        vertices.push(Vertex::new(p2.x, p2.y, color));
    }
    vertices
}
