//! Per-frame shading inputs shared by every particle

use glam::{Vec2, Vec3};

use super::trail::TrailBuffer;
use crate::consts::TRAIL_MAX;
use crate::settings::FieldSettings;

/// Values the shading program reads each frame
#[derive(Debug, Clone, PartialEq)]
pub struct RenderUniforms {
    /// Seconds since mount
    pub time: f32,
    /// Trail samples, oldest first; only `trail_count` are valid
    pub trail: [Vec2; TRAIL_MAX],
    pub trail_count: usize,
    pub trail_radius: f32,
    pub strength: f32,
    /// Smoothed input speed in [0, 1]
    pub speed: f32,
    pub softness: f32,
    pub wave_freq: f32,
    pub wave_speed: f32,
    pub base_alpha: f32,
    pub band_contrast: f32,
    /// Linear RGB
    pub color_near: Vec3,
    /// Linear RGB
    pub color_far: Vec3,
}

impl RenderUniforms {
    pub fn new(settings: &FieldSettings) -> Self {
        let s = &settings.shading;
        Self {
            time: 0.0,
            trail: [Vec2::ZERO; TRAIL_MAX],
            trail_count: 0,
            trail_radius: s.trail_radius,
            strength: s.strength,
            speed: 0.0,
            softness: s.softness,
            wave_freq: s.wave_freq,
            wave_speed: s.wave_speed,
            base_alpha: s.base_alpha,
            band_contrast: s.band_contrast,
            color_near: settings.near_color.to_linear(),
            color_far: settings.far_color.to_linear(),
        }
    }

    /// Valid trail samples
    pub fn trail(&self) -> &[Vec2] {
        &self.trail[..self.trail_count]
    }

    /// Copy the trail's ordered samples and speed
    pub fn sync_trail(&mut self, trail: &TrailBuffer) {
        self.trail_count = trail.copy_ordered(&mut self.trail);
        self.speed = trail.speed();
    }
}

impl Default for RenderUniforms {
    fn default() -> Self {
        Self::new(&FieldSettings::default())
    }
}
