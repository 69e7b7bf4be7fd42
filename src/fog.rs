//! Fog layer
//!
//! A single-channel alpha buffer composited over the scene in a flat fog
//! colour. Light sources erase it (destination-out) and a periodic
//! translucent fill slowly paints it back (source-over). The blend math keeps
//! every value in 0..=255 on its own, so nothing is clamped explicitly.

use glam::Vec2;

/// Source-over blend of a single channel
/// Uses fast approximation: (x + 1 + (x >> 8)) >> 8 instead of x / 255
#[inline]
fn blend_channel(src: u8, dst: u8, alpha: u8) -> u8 {
    let alpha = alpha as u32;
    let result = src as u32 * alpha + dst as u32 * (255 - alpha);
    ((result + 1 + (result >> 8)) >> 8) as u8
}

/// Persistent fog alpha buffer
#[derive(Debug, Clone)]
pub struct FogLayer {
    alpha: Vec<u8>,
    width: u32,
    height: u32,
    /// Buffer pixels per canvas pixel
    scale: f32,
    initial_alpha: u8,
    /// Frames since the last resize; recovery is gated on this
    frame: u64,
    dirty: bool,
}

impl FogLayer {
    /// Fresh fog covering a `canvas` sized area
    pub fn new(canvas: Vec2, scale: f32, initial_alpha: u8) -> Self {
        let scale = scale.clamp(0.05, 4.0);
        let (width, height) = Self::buffer_size(canvas, scale);
        Self {
            alpha: vec![initial_alpha; (width * height) as usize],
            width,
            height,
            scale,
            initial_alpha,
            frame: 0,
            dirty: true,
        }
    }

    fn buffer_size(canvas: Vec2, scale: f32) -> (u32, u32) {
        let w = (canvas.x * scale).round().max(1.0) as u32;
        let h = (canvas.y * scale).round().max(1.0) as u32;
        (w, h)
    }

    /// Reallocate for a new canvas size; fog starts over and the recovery
    /// baseline restarts
    pub fn resize(&mut self, canvas: Vec2) {
        let (width, height) = Self::buffer_size(canvas, self.scale);
        self.width = width;
        self.height = height;
        self.alpha = vec![self.initial_alpha; (width * height) as usize];
        self.frame = 0;
        self.dirty = true;
        log::debug!("Fog resized to {}x{}", width, height);
    }

    /// Fill everything back to the initial alpha
    pub fn reset(&mut self) {
        self.alpha.fill(self.initial_alpha);
        self.frame = 0;
        self.dirty = true;
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Raw alpha bytes, row-major
    pub fn as_bytes(&self) -> &[u8] {
        &self.alpha
    }

    /// Whether the buffer changed since the last call
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Alpha under a canvas-space point (0 outside)
    pub fn alpha_at(&self, p: Vec2) -> u8 {
        let x = (p.x * self.scale).floor();
        let y = (p.y * self.scale).floor();
        if x < 0.0 || y < 0.0 || x >= self.width as f32 || y >= self.height as f32 {
            return 0;
        }
        self.alpha[y as usize * self.width as usize + x as usize]
    }

    /// Average alpha over the whole buffer (0..255)
    pub fn mean_alpha(&self) -> f32 {
        if self.alpha.is_empty() {
            return 0.0;
        }
        self.alpha.iter().map(|&a| a as u64).sum::<u64>() as f32 / self.alpha.len() as f32
    }

    /// Frame tick: every `interval` frames, paint `alpha` over everything
    ///
    /// Returns whether a recovery pass ran this frame.
    pub fn recover(&mut self, alpha: u8, interval: u32) -> bool {
        let interval = interval.max(1) as u64;
        let due = self.frame % interval == 0;
        self.frame += 1;
        if !due || alpha == 0 {
            return false;
        }
        for a in &mut self.alpha {
            *a = blend_channel(255, *a, alpha);
        }
        self.dirty = true;
        true
    }

    /// Erase a filled disc
    pub fn clear_circle(&mut self, center: Vec2, diameter: f32, strength: u8) {
        let r = diameter * 0.5 * self.scale;
        let c = center * self.scale;
        if r <= 0.0 {
            return;
        }
        let r_sq = r * r;
        self.erase_where(c - Vec2::splat(r), c + Vec2::splat(r), strength, |p| {
            p.distance_squared(c) <= r_sq
        });
    }

    /// Erase a round-capped stroke from `a` to `b`
    pub fn clear_stroke(&mut self, a: Vec2, b: Vec2, width: f32, strength: u8) {
        let half = width * 0.5 * self.scale;
        if half <= 0.0 {
            return;
        }
        let a = a * self.scale;
        let b = b * self.scale;
        let ab = b - a;
        let len_sq = ab.length_squared();
        let half_sq = half * half;
        self.erase_where(a.min(b) - Vec2::splat(half), a.max(b) + Vec2::splat(half), strength, |p| {
            let t = if len_sq > 0.0 {
                ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0)
            } else {
                0.0
            };
            p.distance_squared(a + ab * t) <= half_sq
        });
    }

    /// Erase an annulus centred on `center`
    ///
    /// The band spans `radius ± thickness / 2`.
    pub fn clear_ring(&mut self, center: Vec2, radius: f32, thickness: f32, strength: u8) {
        let outer = (radius + thickness * 0.5) * self.scale;
        let inner = ((radius - thickness * 0.5) * self.scale).max(0.0);
        if outer <= 0.0 {
            return;
        }
        let c = center * self.scale;
        let (inner_sq, outer_sq) = (inner * inner, outer * outer);
        self.erase_where(c - Vec2::splat(outer), c + Vec2::splat(outer), strength, |p| {
            let d = p.distance_squared(c);
            d >= inner_sq && d <= outer_sq
        });
    }

    /// Destination-out every pixel in the box whose centre passes `inside`
    fn erase_where(&mut self, min: Vec2, max: Vec2, strength: u8, inside: impl Fn(Vec2) -> bool) {
        if strength == 0 {
            return;
        }
        let x0 = min.x.floor().max(0.0) as i64;
        let y0 = min.y.floor().max(0.0) as i64;
        let x1 = (max.x.ceil() as i64).min(self.width as i64 - 1);
        let y1 = (max.y.ceil() as i64).min(self.height as i64 - 1);
        if x0 > x1 || y0 > y1 {
            return;
        }

        let width = self.width as usize;
        for y in y0..=y1 {
            let row = y as usize * width;
            for x in x0..=x1 {
                let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                if inside(p) {
                    let a = &mut self.alpha[row + x as usize];
                    *a = blend_channel(0, *a, strength);
                }
            }
        }
        self.dirty = true;
    }
}
