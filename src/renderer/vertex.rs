//! Per-instance vertex data for the particle quads

use bytemuck::{Pod, Zeroable};

use crate::sim::Particle;

/// One lattice particle; the quad corners come from `vertex_index`
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct ParticleInstance {
    pub base: [f32; 2],
    pub seed: f32,
}

impl ParticleInstance {
    /// Vertices per particle quad (two triangles)
    pub const QUAD_VERTICES: u32 = 6;

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<ParticleInstance>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32,
                },
            ],
        }
    }
}

impl From<&Particle> for ParticleInstance {
    fn from(p: &Particle) -> Self {
        Self {
            base: p.base.to_array(),
            seed: p.seed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    #[test]
    fn test_instance_layout_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<ParticleInstance>(), 12);
        let layout = ParticleInstance::desc();
        assert_eq!(layout.array_stride, 12);
        assert_eq!(layout.step_mode, wgpu::VertexStepMode::Instance);
    }

    #[test]
    fn test_from_particle() {
        let p = Particle {
            base: Vec2::new(-0.25, 0.5),
            seed: 0.75,
        };
        let inst = ParticleInstance::from(&p);
        assert_eq!(inst.base, [-0.25, 0.5]);
        assert_eq!(inst.seed, 0.75);
    }
}
