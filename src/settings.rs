//! Device profile and user preferences
//!
//! Every device-dependent constant lives on [`Tuning`], derived from the
//! [`DeviceClass`]. Preferences are persisted in LocalStorage.

use serde::{Deserialize, Serialize};

/// Broad device class; phones get a lighter fog, fewer voices, lower FPS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DeviceClass {
    #[default]
    Desktop,
    Mobile,
}

impl DeviceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceClass::Desktop => "Desktop",
            DeviceClass::Mobile => "Mobile",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "desktop" => Some(DeviceClass::Desktop),
            "mobile" | "phone" | "tablet" => Some(DeviceClass::Mobile),
            _ => None,
        }
    }

    /// Classify a browser user-agent string
    pub fn from_user_agent(ua: &str) -> Self {
        const MARKERS: [&str; 5] = ["iPhone", "iPad", "iPod", "Android", "Mobile"];
        if MARKERS.iter().any(|m| ua.contains(m)) {
            DeviceClass::Mobile
        } else {
            DeviceClass::Desktop
        }
    }

    /// Resolve the full tuning table for this device
    pub fn tuning(&self) -> Tuning {
        match self {
            DeviceClass::Desktop => Tuning::desktop(),
            DeviceClass::Mobile => Tuning::mobile(),
        }
    }
}

/// Device-dependent tuning values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tuning {
    /// Frame rate cap; ball velocity is expressed per frame
    pub fps: f32,
    /// Ball diameter in pixels
    pub ball_size: f32,

    // === Fog ===
    pub fog_initial_alpha: u8,
    pub refog_alpha: u8,
    pub refog_interval: u32,
    /// Fog buffer resolution relative to the canvas
    pub fog_scale: f32,

    // === Obstacle strokes ===
    pub line_main_weight: f32,
    pub line_glow_weight: f32,
    /// Glow stroke alpha relative to the main stroke
    pub line_glow_alpha: f32,

    // === Ripples ===
    pub ripple_max_radius: f32,
    pub ripple_thickness: f32,

    // === Ball glow ===
    pub glow_layers: u32,
    pub glow_spread: f32,
    pub ball_clear_padding: f32,

    // === Audio ===
    pub max_voices: usize,
    /// Multiplier on the quarter-diagonal reach used for pitch mapping
    pub pitch_reach: f32,
    pub reverb_seconds: f32,
    pub delay_time_range: (f32, f32),
    pub delay_mix_range: (f32, f32),
    pub delay_feedback_range: (f32, f32),
    pub chorus_mix: f32,
}

impl Tuning {
    pub fn desktop() -> Self {
        let line_main_weight = 23.5;
        Self {
            fps: 45.0,
            ball_size: 32.0,
            fog_initial_alpha: 232,
            refog_alpha: 25,
            refog_interval: 2,
            fog_scale: 1.0,
            line_main_weight,
            line_glow_weight: line_main_weight * 1.5,
            line_glow_alpha: 0.3,
            ripple_max_radius: 300.0,
            ripple_thickness: 20.0,
            glow_layers: 8,
            glow_spread: 6.0,
            ball_clear_padding: 12.0,
            max_voices: 32,
            pitch_reach: 1.34,
            reverb_seconds: 15.0,
            delay_time_range: (0.01, 0.4),
            delay_mix_range: (0.08, 0.40),
            delay_feedback_range: (0.15, 0.50),
            chorus_mix: 0.22,
        }
    }

    pub fn mobile() -> Self {
        Self {
            fps: 30.0,
            ball_size: 28.0,
            fog_initial_alpha: 220,
            refog_alpha: 18,
            refog_interval: 3,
            fog_scale: 0.5,
            line_main_weight: 22.0,
            line_glow_weight: 30.0,
            line_glow_alpha: 0.2,
            ripple_max_radius: 250.0,
            ripple_thickness: 18.0,
            glow_layers: 6,
            glow_spread: 4.0,
            ball_clear_padding: 8.0,
            max_voices: 16,
            pitch_reach: 3.0,
            reverb_seconds: 8.0,
            delay_time_range: (0.008, 0.25),
            delay_mix_range: (0.06, 0.30),
            delay_feedback_range: (0.10, 0.40),
            chorus_mix: 0.25,
        }
    }

    /// Radius used for ball-vs-obstacle tests (visual radius plus margin)
    pub fn collision_radius(&self) -> f32 {
        self.ball_size / 2.0 + crate::consts::COLLISION_MARGIN
    }

    /// Hexagon marker radius
    pub fn point_radius(&self) -> f32 {
        self.line_main_weight * 0.2875
    }

    /// Milliseconds per simulation frame
    pub fn frame_ms(&self) -> f64 {
        1000.0 / self.fps as f64
    }
}

impl Default for Tuning {
    fn default() -> Self {
        Self::desktop()
    }
}

/// Persisted preferences
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Device class; `None` means detect from the user agent at startup
    pub device: Option<DeviceClass>,
    /// Master output level (0.0 - 1.0), scales the nominal master gain
    pub master_volume: f32,
    /// Mute all audio
    pub muted: bool,
    /// Clear fog along the ball trail
    pub trails: bool,
    /// Show the note-name readout
    pub show_notes: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            device: None,
            master_volume: 1.0,
            muted: false,
            trails: true,
            show_notes: false,
        }
    }
}

impl Settings {
    /// Device class to run with, falling back to the detected one
    pub fn device_or(&self, detected: DeviceClass) -> DeviceClass {
        self.device.unwrap_or(detected)
    }

    /// Effective master level (respects mute)
    pub fn effective_volume(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.master_volume.clamp(0.0, 1.0)
        }
    }

    /// LocalStorage key
    const STORAGE_KEY: &'static str = "glass_tones_settings";

    /// Load settings from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(Some(json)) = storage.get_item(Self::STORAGE_KEY) {
                match serde_json::from_str(&json) {
                    Ok(settings) => {
                        log::info!("Loaded settings from LocalStorage");
                        return settings;
                    }
                    Err(e) => log::warn!("Ignoring unreadable settings: {}", e),
                }
            }
        }

        log::info!("Using default settings");
        Self::default()
    }

    /// Save settings to LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn save(&self) {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(json) = serde_json::to_string(self) {
                let _ = storage.set_item(Self::STORAGE_KEY, &json);
                log::info!("Settings saved");
            }
        }
    }

    /// Native stubs
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Self {
        Self::default()
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn save(&self) {
        // No-op for native
    }
}
