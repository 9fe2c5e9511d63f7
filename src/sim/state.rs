//! Simulation state for one mounted field
//!
//! Owns the lattice, the trail and the frame uniforms. Created by `init`,
//! advanced once per display refresh by `tick`, released by `dispose`.

use rand::Rng;

use super::field::ParticleField;
use super::input::{InputEvent, apply_input};
use super::shading::{ShadedPoint, shade};
use super::trail::{PushOutcome, TrailBuffer};
use super::uniforms::RenderUniforms;
use crate::settings::FieldSettings;

pub struct SimulationState {
    field: ParticleField,
    trail: TrailBuffer,
    uniforms: RenderUniforms,
    frames: u64,
    disposed: bool,
}

impl SimulationState {
    /// Build the lattice for a container with the given height/width aspect
    pub fn init<R: Rng + ?Sized>(settings: &FieldSettings, aspect: f32, rng: &mut R) -> Self {
        let field = ParticleField::generate(settings.effective_density(), aspect, rng);
        log::info!(
            "Particle field ready: {}x{} ({} particles)",
            field.count_x(),
            field.count_y(),
            field.len()
        );
        Self {
            field,
            trail: TrailBuffer::new(),
            uniforms: RenderUniforms::new(settings),
            frames: 0,
            disposed: false,
        }
    }

    pub fn field(&self) -> &ParticleField {
        &self.field
    }

    pub fn trail(&self) -> &TrailBuffer {
        &self.trail
    }

    pub fn uniforms(&self) -> &RenderUniforms {
        &self.uniforms
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Feed one input message into the trail
    pub fn handle_input(&mut self, event: &InputEvent) -> Option<PushOutcome> {
        if self.disposed {
            return None;
        }
        apply_input(&mut self.trail, event)
    }

    /// Advance by a wall-clock delta (seconds) and refresh the uniforms
    pub fn tick(&mut self, dt: f32) -> &RenderUniforms {
        if !self.disposed {
            if dt.is_finite() && dt > 0.0 {
                self.uniforms.time += dt;
            }
            self.uniforms.sync_trail(&self.trail);
            self.frames += 1;
        }
        &self.uniforms
    }

    /// Evaluate every particle on the CPU with the current uniforms
    pub fn shade_all(&self) -> impl Iterator<Item = ShadedPoint> + '_ {
        self.field.iter().map(|p| shade(p, &self.uniforms))
    }

    /// Drop the trail; further input and ticks are ignored
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.trail.clear();
        self.uniforms.sync_trail(&self.trail);
        self.disposed = true;
        log::debug!("Simulation disposed after {} frames", self.frames);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::input::SurfaceRect;
    use glam::Vec2;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn state(density: u32, aspect: f32) -> SimulationState {
        let settings = FieldSettings {
            density,
            ..Default::default()
        };
        SimulationState::init(&settings, aspect, &mut Pcg32::seed_from_u64(7))
    }

    /// Client rect mapping 1px to 0.001 NDC around the origin
    fn rect() -> SurfaceRect {
        SurfaceRect::new(-1000.0, -1000.0, 2000.0, 2000.0)
    }

    fn move_to(ndc: Vec2) -> InputEvent {
        // Inverse of SurfaceRect::to_ndc for rect(): y is flipped
        InputEvent::PointerMove {
            client: Vec2::new(ndc.x * 1000.0, -ndc.y * 1000.0),
            rect: rect(),
        }
    }

    #[test]
    fn test_end_to_end_small_field() {
        let mut sim = state(4, 0.5);
        assert_eq!(sim.field().count_y(), 2);
        assert_eq!(sim.field().len(), 8);

        sim.handle_input(&move_to(Vec2::new(0.0, 0.0)));
        sim.handle_input(&move_to(Vec2::new(0.1, 0.0)));
        sim.handle_input(&move_to(Vec2::new(0.102, 0.0)));
        assert_eq!(sim.trail().len(), 2);
        let latest = sim.trail().latest().unwrap();
        assert!((latest - Vec2::new(0.102, 0.0)).length() < 1e-6);

        let u = sim.tick(1.0 / 60.0);
        assert_eq!(u.trail_count, 2);
        assert!((u.trail()[1] - Vec2::new(0.102, 0.0)).length() < 1e-6);
        assert!(u.speed > 0.0);
        assert_eq!(sim.shade_all().count(), 8);
    }

    #[test]
    fn test_tick_accumulates_wall_clock_time() {
        let mut sim = state(3, 1.0);
        sim.tick(0.25);
        sim.tick(0.5);
        assert!((sim.uniforms().time - 0.75).abs() < 1e-6);
        // Bogus deltas are ignored
        sim.tick(-1.0);
        sim.tick(f32::NAN);
        assert!((sim.uniforms().time - 0.75).abs() < 1e-6);
        assert_eq!(sim.frames(), 4);
    }

    #[test]
    fn test_leave_clears_uniform_trail_next_tick() {
        let mut sim = state(3, 1.0);
        sim.handle_input(&move_to(Vec2::new(0.2, 0.2)));
        sim.handle_input(&move_to(Vec2::new(0.4, 0.2)));
        assert_eq!(sim.tick(0.016).trail_count, 2);

        sim.handle_input(&InputEvent::PointerLeave);
        let u = sim.tick(0.016);
        assert_eq!(u.trail_count, 0);
        assert_eq!(u.speed, 0.0);
    }

    #[test]
    fn test_dispose_is_idempotent_and_freezes_state() {
        let mut sim = state(3, 1.0);
        sim.handle_input(&move_to(Vec2::new(0.2, 0.2)));
        sim.tick(0.1);
        sim.dispose();
        sim.dispose();
        assert!(sim.is_disposed());
        assert!(sim.trail().is_empty());

        assert_eq!(sim.handle_input(&move_to(Vec2::new(0.5, 0.5))), None);
        let time = sim.uniforms().time;
        sim.tick(1.0);
        assert_eq!(sim.uniforms().time, time);
        assert_eq!(sim.uniforms().trail_count, 0);
    }
}
