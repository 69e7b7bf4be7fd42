//! Background image: load fallback chain, fade-in and cover placement

use glam::Vec2;

use crate::consts::{BACKGROUND_FADE_DELAY_MS, BACKGROUND_FADE_MS};

/// Primary background asset
pub const PRIMARY_BACKGROUND: &str = "assets/rust_bg.jpg";
/// Tried when the primary asset fails
pub const FALLBACK_BACKGROUND: &str = "assets/027_01.jpg";

/// Which asset the loader is on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundStage {
    Primary,
    Fallback,
    /// Both failed; plain background only
    Unavailable,
}

/// Tracks background loading and its fade-in
#[derive(Debug, Clone)]
pub struct BackgroundLoader {
    stage: BackgroundStage,
    loaded_at: Option<f64>,
}

impl Default for BackgroundLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl BackgroundLoader {
    pub fn new() -> Self {
        Self {
            stage: BackgroundStage::Primary,
            loaded_at: None,
        }
    }

    pub fn stage(&self) -> BackgroundStage {
        self.stage
    }

    /// Asset to request right now
    pub fn current_url(&self) -> Option<&'static str> {
        match self.stage {
            BackgroundStage::Primary => Some(PRIMARY_BACKGROUND),
            BackgroundStage::Fallback => Some(FALLBACK_BACKGROUND),
            BackgroundStage::Unavailable => None,
        }
    }

    /// The current asset failed; returns the next one to try
    pub fn on_error(&mut self) -> Option<&'static str> {
        self.stage = match self.stage {
            BackgroundStage::Primary => {
                log::warn!("Background {} failed, trying fallback", PRIMARY_BACKGROUND);
                BackgroundStage::Fallback
            }
            _ => {
                log::warn!("No background image available");
                BackgroundStage::Unavailable
            }
        };
        self.current_url()
    }

    /// The current asset finished loading at `now_ms`
    pub fn on_load(&mut self, now_ms: f64) {
        if self.stage != BackgroundStage::Unavailable {
            log::info!("Background loaded ({:?})", self.stage);
            self.loaded_at = Some(now_ms);
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded_at.is_some()
    }

    /// Image opacity 0..1: waits a second after load, then ramps over two
    pub fn fade_alpha(&self, now_ms: f64) -> f32 {
        let Some(loaded) = self.loaded_at else {
            return 0.0;
        };
        ((now_ms - loaded - BACKGROUND_FADE_DELAY_MS) / BACKGROUND_FADE_MS).clamp(0.0, 1.0) as f32
    }
}

/// Axis-aligned placement in canvas pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub pos: Vec2,
    pub size: Vec2,
}

/// Scale `image` to cover `canvas` keeping its aspect ratio, centred
pub fn cover_fit(image: Vec2, canvas: Vec2) -> Rect {
    if image.x <= 0.0 || image.y <= 0.0 {
        return Rect {
            pos: Vec2::ZERO,
            size: canvas,
        };
    }
    let scale = (canvas.x / image.x).max(canvas.y / image.y);
    let size = image * scale;
    Rect {
        pos: (canvas - size) * 0.5,
        size,
    }
}
