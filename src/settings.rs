//! Field configuration
//!
//! Supplied by the enclosing page as a JSON-compatible object. Every field
//! has a default, so `{}` is a valid configuration.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::consts::DEFAULT_DENSITY;
use crate::error::{ColorParseError, SettingsError};

/// sRGB color, components in 0..1
///
/// Serialized as a `#RRGGBB` hex string.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const WHITE: Color = Color { r: 1.0, g: 1.0, b: 1.0 };
    /// #66CCFF
    pub const LIGHT_BLUE: Color = Color {
        r: 102.0 / 255.0,
        g: 204.0 / 255.0,
        b: 1.0,
    };
    /// #0C0404
    pub const BACKGROUND: Color = Color {
        r: 12.0 / 255.0,
        g: 4.0 / 255.0,
        b: 4.0 / 255.0,
    };

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Parse `#RGB`, `#RRGGBB` (leading `#` optional)
    pub fn from_hex(s: &str) -> Result<Self, ColorParseError> {
        let digits = s.trim().trim_start_matches('#');
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ColorParseError::Digit(s.to_string()));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16).map_err(|_| ColorParseError::Digit(s.to_string()))
        };
        let (r, g, b) = match digits.len() {
            6 => (channel(0..2)?, channel(2..4)?, channel(4..6)?),
            // Shorthand: each digit repeats (#6CF == #66CCFF)
            3 => (channel(0..1)? * 17, channel(1..2)? * 17, channel(2..3)? * 17),
            _ => return Err(ColorParseError::Length(s.to_string())),
        };
        Ok(Self::rgb(
            r as f32 / 255.0,
            g as f32 / 255.0,
            b as f32 / 255.0,
        ))
    }

    pub fn to_hex(&self) -> String {
        let byte = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!("#{:02X}{:02X}{:02X}", byte(self.r), byte(self.g), byte(self.b))
    }

    /// Linear-light RGB for blending on an sRGB surface
    pub fn to_linear(&self) -> Vec3 {
        Vec3::new(
            srgb_to_linear(self.r),
            srgb_to_linear(self.g),
            srgb_to_linear(self.b),
        )
    }
}

impl TryFrom<String> for Color {
    type Error = ColorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Color::from_hex(&value)
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_hex()
    }
}

/// sRGB transfer function inverse
#[inline]
pub fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Trail response parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShadingParams {
    /// Envelope radius (NDC) at rest
    pub trail_radius: f32,
    /// Outward displacement at the trail centerline
    pub strength: f32,
    /// Gaussian sigma as a fraction of the radius
    pub softness: f32,
    /// Band frequency along the trail tangent (radians per NDC unit)
    pub wave_freq: f32,
    /// Band scroll speed (radians per second)
    pub wave_speed: f32,
    /// Visibility floor for particles far from the trail
    pub base_alpha: f32,
    /// 0 = no bands, 1 = full-depth bands
    pub band_contrast: f32,
}

impl Default for ShadingParams {
    fn default() -> Self {
        Self {
            trail_radius: 0.12,
            strength: 0.18,
            softness: 0.55,
            wave_freq: 60.0,
            wave_speed: 3.0,
            base_alpha: 0.18,
            band_contrast: 0.6,
        }
    }
}

/// Construction parameters for one mounted field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FieldSettings {
    /// Particles across X
    pub density: u32,
    /// Color at the trail
    pub near_color: Color,
    /// Color away from the trail
    pub far_color: Color,
    pub shading: ShadingParams,
}

impl Default for FieldSettings {
    fn default() -> Self {
        Self {
            density: DEFAULT_DENSITY,
            near_color: Color::WHITE,
            far_color: Color::LIGHT_BLUE,
            shading: ShadingParams::default(),
        }
    }
}

impl FieldSettings {
    /// Density with the two-column minimum applied
    pub fn effective_density(&self) -> u32 {
        self.density.max(2)
    }

    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Load from a JSON file (native preview)
    pub fn from_path(path: impl AsRef<std::path::Path>) -> Result<Self, SettingsError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Decode a JS options object
    ///
    /// Goes through `JSON.stringify`, so function-valued keys (`onBack`)
    /// are dropped. Undefined/null yields defaults.
    #[cfg(target_arch = "wasm32")]
    pub fn from_js(options: &wasm_bindgen::JsValue) -> Result<Self, SettingsError> {
        if options.is_undefined() || options.is_null() {
            return Ok(Self::default());
        }
        let json = js_sys::JSON::stringify(options)
            .ok()
            .and_then(|s| s.as_string())
            .unwrap_or_else(|| "{}".to_string());
        Self::from_json(&json)
    }
}
