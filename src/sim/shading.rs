//! Per-particle trail response
//!
//! CPU reference of the vertex/fragment math in `field_shader.wgsl`. The GPU
//! path evaluates the same function for every particle each frame; this copy
//! backs the tests and the native headless preview. Keep the two in sync.

use glam::{Vec2, Vec3};

use super::field::Particle;
use super::uniforms::RenderUniforms;
use crate::consts::*;
use crate::smoothstep;

/// Closest approach of a point to the trail polyline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailProximity {
    /// Perpendicular distance to the nearest segment
    pub distance: f32,
    /// Closest point on the trail
    pub nearest: Vec2,
    /// Unit direction of the nearest segment (oldest to newest)
    pub tangent: Vec2,
}

/// A particle after displacement and coloring
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadedPoint {
    /// Displaced position in NDC
    pub position: Vec2,
    /// Point diameter in CSS pixels
    pub size: f32,
    /// Linear RGB
    pub color: Vec3,
    /// Alpha at the point center, before the disc mask
    pub alpha: f32,
    pub envelope: f32,
}

/// Closest point to `p` on segment `a`-`b`
#[inline]
pub fn closest_point_on_segment(p: Vec2, a: Vec2, b: Vec2) -> Vec2 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= f32::EPSILON * f32::EPSILON {
        return a;
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

/// Nearest point and tangent over every consecutive trail pair
///
/// A single sample is its own nearest point with tangent +X; an empty trail
/// has no proximity.
pub fn trail_proximity(p: Vec2, trail: &[Vec2]) -> Option<TrailProximity> {
    match trail {
        [] => None,
        [only] => Some(TrailProximity {
            distance: p.distance(*only),
            nearest: *only,
            tangent: Vec2::X,
        }),
        _ => {
            let mut best = TrailProximity {
                distance: f32::INFINITY,
                nearest: trail[0],
                tangent: Vec2::X,
            };
            for pair in trail.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                let q = closest_point_on_segment(p, a, b);
                let d = p.distance(q);
                if d < best.distance {
                    best = TrailProximity {
                        distance: d,
                        nearest: q,
                        tangent: (b - a).normalize_or(Vec2::X),
                    };
                }
            }
            Some(best)
        }
    }
}

/// Gaussian falloff, widened by input speed
pub fn gaussian_envelope(distance: f32, trail_radius: f32, softness: f32, speed: f32) -> f32 {
    let radius = trail_radius * (1.0 + SPEED_RADIUS_GAIN * speed.clamp(0.0, 1.0));
    let sigma = (radius * softness).max(1e-6);
    (-(distance * distance) / (2.0 * sigma * sigma)).exp()
}

/// Longitudinal bands along the tangent, blended toward 1 by `1 - contrast`
pub fn band_pattern(along: f32, time: f32, wave_freq: f32, wave_speed: f32, contrast: f32) -> f32 {
    let phase = along * wave_freq - time * wave_speed;
    let bands = 0.5 + 0.5 * phase.cos();
    crate::lerp(1.0, bands, contrast)
}

/// Evaluate one particle against the frame's uniforms
pub fn shade(particle: &Particle, u: &RenderUniforms) -> ShadedPoint {
    let phi = u.time * DRIFT_RATE + particle.seed * SEED_PHASE;
    let mut p = particle.base + Vec2::new(phi.cos(), phi.sin()) * DRIFT_AMPLITUDE;

    let mut envelope = 0.0;
    let mut bands = 1.0;

    if let Some(hit) = trail_proximity(p, u.trail()) {
        envelope = gaussian_envelope(hit.distance, u.trail_radius, u.softness, u.speed);

        let offset = p - hit.nearest;
        let along = offset.dot(hit.tangent);
        bands = band_pattern(along, u.time, u.wave_freq, u.wave_speed, u.band_contrast);

        if envelope > ENVELOPE_THRESHOLD {
            let normal = offset.normalize_or(hit.tangent.perp());
            let push = envelope * (u.strength + JITTER_AMPLITUDE * (phi * 2.0).sin()) * NORMAL_PUSH;
            p += normal * push + hit.tangent * push * TANGENT_PUSH;
        }
    }

    let vis = u.base_alpha.max(envelope * bands);
    ShadedPoint {
        position: p,
        size: (POINT_BASE_SIZE + POINT_NEAR_SIZE * envelope) * POINT_SCALE,
        color: u.color_far.lerp(u.color_near, vis),
        alpha: vis,
        envelope,
    }
}

/// Fragment alpha inside the soft disc
///
/// `offset` is the fragment's position relative to the point center in
/// units of the point diameter (-0.5..0.5). `None` means discarded.
pub fn disc_alpha(alpha: f32, offset: Vec2) -> Option<f32> {
    let a = (1.0 - smoothstep(0.0, 0.5, offset.length())) * alpha;
    (a >= ALPHA_CUTOFF).then_some(a)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniforms_with_trail(points: &[Vec2]) -> RenderUniforms {
        let mut u = RenderUniforms::default();
        u.trail[..points.len()].copy_from_slice(points);
        u.trail_count = points.len();
        u
    }

    #[test]
    fn test_closest_point_clamps_to_ends() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(1.0, 0.0);
        assert_eq!(closest_point_on_segment(Vec2::new(0.5, 2.0), a, b), Vec2::new(0.5, 0.0));
        assert_eq!(closest_point_on_segment(Vec2::new(-3.0, 1.0), a, b), a);
        assert_eq!(closest_point_on_segment(Vec2::new(4.0, -1.0), a, b), b);
        // Degenerate segment
        assert_eq!(closest_point_on_segment(Vec2::new(4.0, -1.0), a, a), a);
    }

    #[test]
    fn test_proximity_picks_nearest_segment() {
        let trail = [
            Vec2::new(-0.5, 0.0),
            Vec2::new(0.0, 0.0),
            Vec2::new(0.0, 0.5),
        ];
        let hit = trail_proximity(Vec2::new(0.1, 0.3), &trail).unwrap();
        assert!((hit.distance - 0.1).abs() < 1e-6);
        assert!((hit.nearest - Vec2::new(0.0, 0.3)).length() < 1e-6);
        assert!((hit.tangent - Vec2::Y).length() < 1e-6);
    }

    #[test]
    fn test_single_sample_proximity() {
        let hit = trail_proximity(Vec2::new(0.3, 0.4), &[Vec2::ZERO]).unwrap();
        assert!((hit.distance - 0.5).abs() < 1e-6);
        assert_eq!(hit.tangent, Vec2::X);
        assert!(trail_proximity(Vec2::ZERO, &[]).is_none());
    }

    #[test]
    fn test_on_trail_envelope_is_one() {
        for softness in [0.01, 0.5, 3.0] {
            assert_eq!(gaussian_envelope(0.0, 0.12, softness, 0.0), 1.0);
            assert_eq!(gaussian_envelope(0.0, 0.12, softness, 1.0), 1.0);
        }
    }

    #[test]
    fn test_speed_widens_envelope() {
        let slow = gaussian_envelope(0.1, 0.12, 0.55, 0.0);
        let fast = gaussian_envelope(0.1, 0.12, 0.55, 1.0);
        assert!(fast > slow);
        // Speed beyond 1 is clamped
        assert_eq!(gaussian_envelope(0.1, 0.12, 0.55, 5.0), fast);
    }

    #[test]
    fn test_band_contrast_zero_is_flat() {
        for along in [0.0, 0.013, 0.4] {
            assert_eq!(band_pattern(along, 1.7, 60.0, 3.0, 0.0), 1.0);
        }
        assert!((band_pattern(0.0, 0.0, 60.0, 3.0, 1.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_trail_leaves_base_visibility() {
        let u = RenderUniforms::default();
        let particle = Particle {
            base: Vec2::new(0.2, 0.2),
            seed: 0.3,
        };
        let shaded = shade(&particle, &u);
        assert_eq!(shaded.envelope, 0.0);
        assert_eq!(shaded.alpha, u.base_alpha);
        assert!((shaded.position - particle.base).length() <= DRIFT_AMPLITUDE + 1e-6);
        assert!((shaded.size - POINT_BASE_SIZE * POINT_SCALE).abs() < 1e-6);
    }

    #[test]
    fn test_particle_on_trail_is_fully_lit_and_pushed() {
        // Horizontal trail through the particle's drifted position
        let particle = Particle {
            base: Vec2::new(0.0, 0.0),
            seed: 0.0,
        };
        let mut u = RenderUniforms::default();
        u.time = 0.0;
        // phi = 0, drift = (DRIFT_AMPLITUDE, 0), so the particle sits on y = 0
        let trail = [Vec2::new(-0.5, 0.0), Vec2::new(0.5, 0.0)];
        u.trail[..2].copy_from_slice(&trail);
        u.trail_count = 2;
        u.band_contrast = 0.0;

        let shaded = shade(&particle, &u);
        assert_eq!(shaded.envelope, 1.0);
        assert_eq!(shaded.alpha, 1.0);
        assert!((shaded.color - u.color_near).length() < 1e-6);
        // Pushed off the line with a forward (tangent) component
        let moved = shaded.position - Vec2::new(DRIFT_AMPLITUDE, 0.0);
        assert!(moved.length() > 0.1);
        assert!(moved.x > 0.0);
        assert!((shaded.size - (POINT_BASE_SIZE + POINT_NEAR_SIZE) * POINT_SCALE).abs() < 1e-5);
    }

    #[test]
    fn test_far_particle_is_not_displaced() {
        let particle = Particle {
            base: Vec2::new(0.9, 0.9),
            seed: 0.5,
        };
        let u = uniforms_with_trail(&[Vec2::new(-0.9, -0.9), Vec2::new(-0.8, -0.9)]);
        let shaded = shade(&particle, &u);
        assert!(shaded.envelope < ENVELOPE_THRESHOLD);
        assert!((shaded.position - particle.base).length() <= DRIFT_AMPLITUDE + 1e-6);
        assert_eq!(shaded.alpha, u.base_alpha);
    }

    #[test]
    fn test_disc_mask_fades_and_discards() {
        assert_eq!(disc_alpha(1.0, Vec2::ZERO), Some(1.0));
        assert!(disc_alpha(1.0, Vec2::new(0.5, 0.0)).is_none());
        let mid = disc_alpha(1.0, Vec2::new(0.25, 0.0)).unwrap();
        assert!((mid - 0.5).abs() < 1e-6);
        // Faint points vanish entirely
        assert!(disc_alpha(0.005, Vec2::ZERO).is_none());
    }
}
