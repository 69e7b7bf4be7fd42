//! Collision ripples: expanding rings that wipe fog

use glam::Vec2;

use crate::consts::RIPPLE_LIFETIME_MS;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ripple {
    pub origin: Vec2,
    pub start_ms: f64,
}

impl Ripple {
    pub fn new(origin: Vec2, start_ms: f64) -> Self {
        Self { origin, start_ms }
    }

    /// Age as a 0..1 fraction of the lifetime
    pub fn progress(&self, now_ms: f64) -> f32 {
        ((now_ms - self.start_ms) / RIPPLE_LIFETIME_MS).clamp(0.0, 1.0) as f32
    }

    /// Ring radius; grows linearly to `max_radius`
    pub fn radius(&self, now_ms: f64, max_radius: f32) -> f32 {
        max_radius * self.progress(now_ms)
    }

    pub fn is_alive(&self, now_ms: f64) -> bool {
        now_ms - self.start_ms <= RIPPLE_LIFETIME_MS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_radius_grows_linearly() {
        let r = Ripple::new(Vec2::ZERO, 1_000.0);
        assert_eq!(r.radius(1_000.0, 300.0), 0.0);
        assert_eq!(r.radius(1_000.0 + RIPPLE_LIFETIME_MS / 2.0, 300.0), 150.0);
        assert_eq!(r.radius(1_000.0 + RIPPLE_LIFETIME_MS * 2.0, 300.0), 300.0);
    }

    #[test]
    fn test_expiry() {
        let r = Ripple::new(Vec2::ZERO, 0.0);
        assert!(r.is_alive(RIPPLE_LIFETIME_MS));
        assert!(!r.is_alive(RIPPLE_LIFETIME_MS + 1.0));
    }
}
