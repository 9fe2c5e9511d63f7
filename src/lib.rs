//! Dispersion Field - a pointer-reactive particle field
//!
//! Core modules:
//! - `sim`: Particle lattice, input trail and per-frame shading state
//! - `renderer`: WebGPU pipeline evaluating every particle against the trail
//! - `platform`: Surface lifecycle (mount, listeners, resize, teardown)
//! - `settings`: Density, colors and shading parameters

pub mod error;
pub mod platform;
pub mod renderer;
pub mod settings;
pub mod sim;

pub use error::{ColorParseError, MountError, RenderError, SettingsError};
pub use settings::{Color, FieldSettings, ShadingParams};

/// Simulation constants
///
/// Values used by the per-particle evaluation must match `field_shader.wgsl`.
pub mod consts {
    /// Trail ring buffer capacity
    pub const TRAIL_MAX: usize = 64;
    /// Minimum distance (NDC) between two stored trail samples
    pub const MIN_SEGMENT: f32 = 0.005;
    /// Exponential smoothing factor applied to speed on every push
    pub const SPEED_SMOOTHING: f32 = 0.4;
    /// Segment length (in multiples of `MIN_SEGMENT`) that maps to full speed
    pub const SPEED_RANGE: f32 = 6.0;

    /// Default particles across X
    pub const DEFAULT_DENSITY: u32 = 460;
    /// Vertical lattice extent in NDC (lattice spans -0.9..0.9)
    pub const LATTICE_Y_EXTENT: f32 = 0.9;

    /// Idle drift
    pub const DRIFT_AMPLITUDE: f32 = 0.0010;
    pub const DRIFT_RATE: f32 = 0.45;
    pub const SEED_PHASE: f32 = 10.0;

    /// Trail radius growth at full speed
    pub const SPEED_RADIUS_GAIN: f32 = 0.6;
    /// Envelope below which particles are not displaced
    pub const ENVELOPE_THRESHOLD: f32 = 0.001;
    pub const JITTER_AMPLITUDE: f32 = 0.05;
    pub const NORMAL_PUSH: f32 = 0.9;
    pub const TANGENT_PUSH: f32 = 0.25;

    /// Point size in CSS pixels: (BASE + NEAR * envelope) * SCALE
    pub const POINT_BASE_SIZE: f32 = 1.4;
    pub const POINT_NEAR_SIZE: f32 = 2.4;
    pub const POINT_SCALE: f32 = 2.0;
    /// Fragments fainter than this are discarded
    pub const ALPHA_CUTOFF: f32 = 0.01;

    /// Device pixel ratio ceiling for the render surface
    pub const MAX_PIXEL_RATIO: f64 = 2.0;
}

/// Linear interpolation between `a` and `b`
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Hermite smoothstep, `edge0 < edge1`
#[inline]
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lerp_endpoints() {
        assert_eq!(lerp(2.0, 4.0, 0.0), 2.0);
        assert_eq!(lerp(2.0, 4.0, 1.0), 4.0);
        assert!((lerp(0.0, 1.0, 0.4) - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_smoothstep_clamps() {
        assert_eq!(smoothstep(0.0, 0.5, -1.0), 0.0);
        assert_eq!(smoothstep(0.0, 0.5, 0.75), 1.0);
        assert!((smoothstep(0.0, 0.5, 0.25) - 0.5).abs() < 1e-6);
    }
}
