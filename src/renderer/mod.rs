//! WebGPU rendering module
//!
//! Instanced particle quads; all per-particle math runs in the vertex shader.

pub mod field_pipeline;
pub mod vertex;

pub use field_pipeline::FieldRenderState;
pub use vertex::ParticleInstance;
