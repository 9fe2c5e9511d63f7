//! Particle field simulation
//!
//! Everything here is platform- and GPU-independent:
//! - Seeded RNG only (the lattice seeds)
//! - Wall-clock deltas in, uniforms out
//! - No rendering or browser dependencies

pub mod field;
pub mod input;
pub mod shading;
pub mod state;
pub mod trail;
pub mod uniforms;

pub use field::{Particle, ParticleField};
pub use input::{InputEvent, SurfaceRect, apply_input};
pub use shading::{
    ShadedPoint, TrailProximity, band_pattern, closest_point_on_segment, disc_alpha,
    gaussian_envelope, shade, trail_proximity,
};
pub use state::SimulationState;
pub use trail::{PushOutcome, TrailBuffer};
pub use uniforms::RenderUniforms;
