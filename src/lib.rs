//! GlassTones - a ball bouncing behind fogged glass
//!
//! Core modules:
//! - `sim`: Deterministic simulation (geometry, obstacles, ball, collisions)
//! - `fog`: Persistent fog alpha buffer
//! - `audio`: Tone engine with shared effect bus and drones
//! - `renderer`: Frame composition and WebGPU drawing
//! - `session`: Per-frame driver tying everything together
//! - `settings`: Device tuning and persisted preferences
//! - `schedule`, `score`, `assets`: start-sequence timeline, score
//!   bookkeeping, background image loading

pub mod assets;
pub mod audio;
pub mod fog;
pub mod renderer;
pub mod schedule;
pub mod score;
pub mod session;
pub mod settings;
pub mod sim;

pub use fog::FogLayer;
pub use score::{ScoreBoard, ScoreService};
pub use session::{FrameOutput, Session, SessionAction};
pub use settings::{DeviceClass, Settings, Tuning};

/// Device-independent constants
pub mod consts {
    /// Nominal ball speed (pixels per frame)
    pub const BALL_SPEED: f32 = 1.5;
    /// Smallest starting velocity component magnitude
    pub const BALL_MIN_AXIS_SPEED: f32 = 0.5;
    /// Trail positions kept for fog clearing
    pub const TRAIL_LENGTH: usize = 600;
    /// Collision radius margin beyond the visual ball radius
    pub const COLLISION_MARGIN: f32 = 12.0;
    /// Extra push-out beyond the residual penetration
    pub const COLLISION_EPSILON: f32 = 0.1;
    /// Per-bounce velocity damping
    pub const BOUNCE_DAMPING: f32 = 0.995;
    /// Speed floor after a bounce, as a fraction of nominal speed
    pub const MIN_SPEED_RATIO: f32 = 0.8;

    /// Obstacle lifetimes (ms)
    pub const LINE_LIFETIME_MS: f64 = 10_000.0;
    pub const POINT_LIFETIME_MS: f64 = 15_000.0;
    /// Concurrent obstacle caps (oldest evicted)
    pub const MAX_LINES: usize = 8;
    pub const MAX_POINTS: usize = 12;

    /// Stroke capture
    pub const STROKE_MAX_POINTS: usize = 200;
    pub const STROKE_MIN_SPACING: f32 = 3.0;
    pub const TAP_MAX_POINTS: usize = 2;
    /// A slightly wobbly tap may record one extra point within this extent
    pub const TAP_MAX_EXTENT: f32 = 15.0;
    pub const TAP_MAX_DURATION_MS: f64 = 500.0;
    /// Strokes need more than this many points to become a line
    pub const LINE_MIN_POINTS: usize = 5;

    /// Hit tracking
    pub const RETRIGGER_WINDOW_MS: f64 = 200.0;
    pub const RETRIGGER_VOLUME: f32 = 0.8;
    pub const STREAK_TIMEOUT_MS: f64 = 3_000.0;
    pub const LINE_HIT_SCORE: u32 = 10;
    pub const POINT_HIT_SCORE: f32 = 15.0;

    /// Wall sounds
    pub const WALL_VOLUME: f32 = 0.65;
    pub const WALL_SHORT_CHANCE: f64 = 0.3;

    /// Ripples
    pub const RIPPLE_LIFETIME_MS: f64 = 8_000.0;
    pub const RIPPLE_ERASE_ALPHA: f32 = 0.9;

    /// Fog
    pub const FOG_COLOR: [u8; 3] = [230, 230, 230];
    pub const LINE_ERASE_ALPHA: u8 = 200;

    /// Background
    pub const BACKGROUND_COLOR: [u8; 3] = [26, 26, 26];
    pub const BACKGROUND_FADE_DELAY_MS: f64 = 1_000.0;
    pub const BACKGROUND_FADE_MS: f64 = 2_000.0;
}

/// Map `v` from [in_lo, in_hi] to [out_lo, out_hi] without clamping
#[inline]
pub fn remap(v: f32, in_lo: f32, in_hi: f32, out_lo: f32, out_hi: f32) -> f32 {
    if (in_hi - in_lo).abs() < f32::EPSILON {
        return out_lo;
    }
    out_lo + (v - in_lo) * (out_hi - out_lo) / (in_hi - in_lo)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remap() {
        assert_eq!(remap(0.0, 0.0, 120.0, 120.0, 60.0), 120.0);
        assert_eq!(remap(120.0, 0.0, 120.0, 120.0, 60.0), 60.0);
        assert_eq!(remap(60.0, 0.0, 120.0, 120.0, 60.0), 90.0);
        assert_eq!(remap(3.0, 2.0, 2.0, 5.0, 9.0), 5.0);
    }
}
