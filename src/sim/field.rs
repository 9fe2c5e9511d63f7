//! Particle lattice generation
//!
//! The lattice is built once per mount from the density and the container's
//! aspect ratio and never changes afterwards (resizes only rescale the
//! surface).

use glam::Vec2;
use rand::Rng;

use crate::consts::LATTICE_Y_EXTENT;

/// A lattice point with its random phase seed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    /// Rest position in NDC
    pub base: Vec2,
    /// Phase seed in [0, 1)
    pub seed: f32,
}

/// Immutable particle lattice
#[derive(Debug, Clone)]
pub struct ParticleField {
    count_x: u32,
    count_y: u32,
    particles: Vec<Particle>,
}

impl ParticleField {
    /// Lattice dimensions for a density and a height/width aspect ratio
    pub fn lattice_dims(density: u32, aspect: f32) -> (u32, u32) {
        let count_x = density.max(2);
        let aspect = if aspect.is_finite() { aspect.max(0.0) } else { 0.0 };
        let rows = (count_x as f32 * LATTICE_Y_EXTENT * aspect).round();
        let count_y = (rows as u32).max(2);
        (count_x, count_y)
    }

    /// Build the lattice, drawing one seed per particle from `rng`
    pub fn generate<R: Rng + ?Sized>(density: u32, aspect: f32, rng: &mut R) -> Self {
        let (count_x, count_y) = Self::lattice_dims(density, aspect);
        let mut particles = Vec::with_capacity(count_x as usize * count_y as usize);

        for y in 0..count_y {
            let v = y as f32 / (count_y - 1) as f32;
            let py = -LATTICE_Y_EXTENT + v * 2.0 * LATTICE_Y_EXTENT;
            for x in 0..count_x {
                let u = x as f32 / (count_x - 1) as f32;
                particles.push(Particle {
                    base: Vec2::new(-1.0 + u * 2.0, py),
                    seed: rng.random::<f32>(),
                });
            }
        }

        log::debug!(
            "Generated {}x{} particle lattice ({} particles)",
            count_x,
            count_y,
            particles.len()
        );

        Self {
            count_x,
            count_y,
            particles,
        }
    }

    pub fn count_x(&self) -> u32 {
        self.count_x
    }

    pub fn count_y(&self) -> u32 {
        self.count_y
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Particle> {
        self.particles.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    #[test]
    fn test_wide_container_gets_two_rows() {
        let mut rng = Pcg32::seed_from_u64(1);
        // 2:1 container -> aspect 0.5, round(4 * 0.9 * 0.5) = 2
        let field = ParticleField::generate(4, 0.5, &mut rng);
        assert_eq!(field.count_x(), 4);
        assert_eq!(field.count_y(), 2);
        assert_eq!(field.len(), 8);
    }

    #[test]
    fn test_corners_hit_lattice_bounds() {
        let mut rng = Pcg32::seed_from_u64(2);
        let field = ParticleField::generate(10, 1.0, &mut rng);
        let first = field.particles()[0].base;
        let last = field.particles()[field.len() - 1].base;
        assert!((first - Vec2::new(-1.0, -0.9)).length() < 1e-6);
        assert!((last - Vec2::new(1.0, 0.9)).length() < 1e-6);
    }

    #[test]
    fn test_rows_are_row_major() {
        let mut rng = Pcg32::seed_from_u64(3);
        let field = ParticleField::generate(3, 1.0, &mut rng);
        let p = field.particles();
        // Same row shares y, x increases
        assert_eq!(p[0].base.y, p[1].base.y);
        assert!(p[1].base.x > p[0].base.x);
        assert!(p[3].base.y > p[0].base.y);
    }

    #[test]
    fn test_degenerate_aspect_falls_back_to_min_rows() {
        assert_eq!(ParticleField::lattice_dims(50, 0.0), (50, 2));
        assert_eq!(ParticleField::lattice_dims(50, f32::NAN), (50, 2));
        assert_eq!(ParticleField::lattice_dims(50, f32::INFINITY), (50, 2));
        assert_eq!(ParticleField::lattice_dims(1, 1.0), (2, 2));
    }

    #[test]
    fn test_same_seed_same_field() {
        let a = ParticleField::generate(8, 0.7, &mut Pcg32::seed_from_u64(42));
        let b = ParticleField::generate(8, 0.7, &mut Pcg32::seed_from_u64(42));
        assert_eq!(a.particles(), b.particles());
    }

    proptest! {
        #[test]
        fn prop_count_and_bounds(density in 2u32..120, aspect in 0.0f32..3.0, seed in any::<u64>()) {
            let mut rng = Pcg32::seed_from_u64(seed);
            let field = ParticleField::generate(density, aspect, &mut rng);
            let expected_y = ((density as f32 * 0.9 * aspect).round() as u32).max(2);

            prop_assert_eq!(field.count_x(), density);
            prop_assert_eq!(field.count_y(), expected_y);
            prop_assert_eq!(field.len(), (density * expected_y) as usize);

            for p in field.iter() {
                prop_assert!(p.base.x >= -1.0 - 1e-6 && p.base.x <= 1.0 + 1e-6);
                prop_assert!(p.base.y >= -0.9 - 1e-6 && p.base.y <= 0.9 + 1e-6);
                prop_assert!((0.0..1.0).contains(&p.seed));
            }
        }
    }
}
