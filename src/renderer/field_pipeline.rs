//! Particle field render pipeline
//!
//! Draws every lattice particle as an instanced quad with additive blending.
//! Displacement, sizing and coloring run in `field_shader.wgsl`; the trail
//! travels in a uniform block so the same program runs on WebGL2.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use super::vertex::ParticleInstance;
use crate::consts::TRAIL_MAX;
use crate::error::RenderError;
use crate::platform::{FrameTarget, Viewport};
use crate::settings::Color;
use crate::sim::{ParticleField, RenderUniforms};

/// Trail samples are packed two per vec4
const TRAIL_VEC4S: usize = TRAIL_MAX / 2;

const SHADER_SOURCE: &str = include_str!("field_shader.wgsl");

/// Largest surface that fits `max_dimension` on both sides, keeping aspect
pub fn fit_surface(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let max_dimension = max_dimension.max(1);
    let longest = width.max(height);
    if longest <= max_dimension {
        return (width.max(1), height.max(1));
    }
    let scale = max_dimension as f64 / longest as f64;
    let fit = |side: u32| ((side as f64 * scale).floor() as u32).clamp(1, max_dimension);
    (fit(width), fit(height))
}

// ============================================================================
// GPU DATA STRUCTURES (must match shader)
// ============================================================================

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct Globals {
    resolution: [f32; 2],           // offset 0
    time: f32,                      // offset 8
    trail_count: u32,               // offset 12
    trail_radius: f32,              // offset 16
    strength: f32,                  // offset 20
    speed: f32,                     // offset 24
    softness: f32,                  // offset 28
    wave_freq: f32,                 // offset 32
    wave_speed: f32,                // offset 36
    base_alpha: f32,                // offset 40
    band_contrast: f32,             // offset 44
    color_near: [f32; 4],           // offset 48
    color_far: [f32; 4],            // offset 64
    pixel_ratio: f32,               // offset 80
    _pad: [f32; 3],                 // pad trail to 16 bytes
    trail: [[f32; 4]; TRAIL_VEC4S], // offset 96
}

impl Globals {
    fn pack(u: &RenderUniforms, viewport: &Viewport) -> Self {
        let (width, height) = viewport.physical_size();

        let mut trail = [[0.0; 4]; TRAIL_VEC4S];
        for (i, p) in u.trail().iter().enumerate() {
            let slot = &mut trail[i / 2];
            let lane = (i % 2) * 2;
            slot[lane] = p.x;
            slot[lane + 1] = p.y;
        }

        Self {
            resolution: [width as f32, height as f32],
            time: u.time,
            trail_count: u.trail_count as u32,
            trail_radius: u.trail_radius,
            strength: u.strength,
            speed: u.speed,
            softness: u.softness,
            wave_freq: u.wave_freq,
            wave_speed: u.wave_speed,
            base_alpha: u.base_alpha,
            band_contrast: u.band_contrast,
            color_near: u.color_near.extend(1.0).to_array(),
            color_far: u.color_far.extend(1.0).to_array(),
            pixel_ratio: viewport.pixel_ratio as f32,
            _pad: [0.0; 3],
            trail,
        }
    }
}

// ============================================================================
// FIELD RENDER STATE
// ============================================================================

pub struct FieldRenderState {
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub pipeline: wgpu::RenderPipeline,

    globals_buffer: wgpu::Buffer,
    instance_buffer: wgpu::Buffer,
    instance_count: u32,
    bind_group: wgpu::BindGroup,

    viewport: Viewport,
    background: wgpu::Color,
    /// Device texture size cap; the surface never exceeds it
    max_dimension: u32,
    released: bool,
}

impl FieldRenderState {
    pub async fn new(
        surface: wgpu::Surface<'static>,
        adapter: &wgpu::Adapter,
        viewport: Viewport,
        field: &ParticleField,
    ) -> Result<Self, RenderError> {
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("field-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_webgl2_defaults()
                    .using_resolution(adapter.limits()),
                memory_hints: Default::default(),
                trace: Default::default(),
                experimental_features: Default::default(),
            })
            .await?;

        let surface_caps = surface.get_capabilities(adapter);
        log::info!("Surface formats: {:?}", surface_caps.formats);
        log::info!("Surface alpha modes: {:?}", surface_caps.alpha_modes);

        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or(RenderError::NoSurfaceFormat)?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        log::info!("Using surface format: {:?}", surface_format);

        let max_dimension = device.limits().max_texture_dimension_2d;
        let (width, height) = {
            let (w, h) = viewport.physical_size();
            fit_surface(w, h, max_dimension)
        };
        log::info!("Surface {}x{} (max texture dimension {})", width, height, max_dimension);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("field_shader"),
            source: wgpu::ShaderSource::Wgsl(SHADER_SOURCE.into()),
        });

        let globals_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("globals"),
            contents: bytemuck::bytes_of(&Globals::pack(&RenderUniforms::default(), &viewport)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let instances: Vec<ParticleInstance> = field.iter().map(ParticleInstance::from).collect();
        let instance_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("particles"),
            contents: bytemuck::cast_slice(&instances),
            usage: wgpu::BufferUsages::VERTEX,
        });
        log::info!("Uploaded {} particle instances", instances.len());

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("field_bind_group_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("field_bind_group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: globals_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("field_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("field_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[ParticleInstance::desc()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    // Additive: overlapping points brighten
                    blend: Some(wgpu::BlendState {
                        color: wgpu::BlendComponent {
                            src_factor: wgpu::BlendFactor::SrcAlpha,
                            dst_factor: wgpu::BlendFactor::One,
                            operation: wgpu::BlendOperation::Add,
                        },
                        alpha: wgpu::BlendComponent {
                            src_factor: wgpu::BlendFactor::One,
                            dst_factor: wgpu::BlendFactor::One,
                            operation: wgpu::BlendOperation::Add,
                        },
                    }),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        Ok(Self {
            surface,
            device,
            queue,
            config,
            pipeline,
            globals_buffer,
            instance_buffer,
            instance_count: instances.len() as u32,
            bind_group,
            viewport,
            background: clear_color(Color::BACKGROUND),
            max_dimension,
            released: false,
        })
    }

    pub fn resize(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        let (w, h) = viewport.physical_size();
        let (width, height) = fit_surface(w, h, self.max_dimension);
        if (width, height) != (w, h) {
            log::debug!("Surface {}x{} clamped to {}x{}", w, h, width, height);
        }
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    /// Upload this frame's uniforms and draw the field
    pub fn render(&mut self, uniforms: &RenderUniforms) -> Result<(), wgpu::SurfaceError> {
        self.queue.write_buffer(
            &self.globals_buffer,
            0,
            bytemuck::bytes_of(&Globals::pack(uniforms, &self.viewport)),
        );

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("field_encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("field_render_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.background),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            render_pass.set_pipeline(&self.pipeline);
            render_pass.set_bind_group(0, &self.bind_group, &[]);
            render_pass.set_vertex_buffer(0, self.instance_buffer.slice(..));
            render_pass.draw(0..ParticleInstance::QUAD_VERTICES, 0..self.instance_count);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}

impl FrameTarget for FieldRenderState {
    fn resize(&mut self, viewport: Viewport) {
        if !self.released {
            FieldRenderState::resize(self, viewport);
        }
    }

    fn draw(&mut self, uniforms: &RenderUniforms) {
        if self.released {
            return;
        }
        match self.render(uniforms) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let viewport = self.viewport;
                FieldRenderState::resize(self, viewport);
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("Out of memory");
            }
            Err(e) => {
                log::warn!("Render error: {:?}", e);
            }
        }
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.instance_buffer.destroy();
        self.globals_buffer.destroy();
        log::debug!("GPU buffers released");
    }
}

/// Background clear color in the surface's linear space
fn clear_color(color: Color) -> wgpu::Color {
    let linear = color.to_linear();
    wgpu::Color {
        r: linear.x as f64,
        g: linear.y as f64,
        b: linear.z as f64,
        a: 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use glam::Vec2;
    use wgpu::naga;

    use crate::consts;

    /// Named f32 `const` declarations in the shader
    fn shader_constants() -> HashMap<String, f32> {
        let module = naga::front::wgsl::parse_str(SHADER_SOURCE).expect("shader parses");
        module
            .constants
            .iter()
            .filter_map(|(_, c)| {
                let name = c.name.clone()?;
                match module.global_expressions[c.init] {
                    naga::Expression::Literal(naga::Literal::F32(v)) => Some((name, v)),
                    _ => None,
                }
            })
            .collect()
    }

    #[test]
    fn test_shader_validates() {
        let module = naga::front::wgsl::parse_str(SHADER_SOURCE).expect("shader parses");
        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::empty(),
        )
        .validate(&module)
        .expect("shader validates");
    }

    #[test]
    fn test_shader_constants_match_crate() {
        let shader = shader_constants();
        let expected = [
            ("DRIFT_AMPLITUDE", consts::DRIFT_AMPLITUDE),
            ("DRIFT_RATE", consts::DRIFT_RATE),
            ("SEED_PHASE", consts::SEED_PHASE),
            ("SPEED_RADIUS_GAIN", consts::SPEED_RADIUS_GAIN),
            ("ENVELOPE_THRESHOLD", consts::ENVELOPE_THRESHOLD),
            ("JITTER_AMPLITUDE", consts::JITTER_AMPLITUDE),
            ("NORMAL_PUSH", consts::NORMAL_PUSH),
            ("TANGENT_PUSH", consts::TANGENT_PUSH),
            ("POINT_BASE_SIZE", consts::POINT_BASE_SIZE),
            ("POINT_NEAR_SIZE", consts::POINT_NEAR_SIZE),
            ("POINT_SCALE", consts::POINT_SCALE),
            ("ALPHA_CUTOFF", consts::ALPHA_CUTOFF),
        ];
        for (name, value) in expected {
            assert_eq!(shader.get(name), Some(&value), "{name} differs from consts");
        }
    }

    #[test]
    fn test_hidpi_surface_fits_webgl2_limit() {
        let max = wgpu::Limits::downlevel_webgl2_defaults().max_texture_dimension_2d;
        let (w, h) = Viewport::new(1440.0, 900.0, 2.0).physical_size();
        assert_eq!((w, h), (2880, 1800));

        let (fw, fh) = fit_surface(w, h, max);
        assert!(fw <= max && fh <= max);
        assert_eq!(fw, max);
        // Aspect kept to within a pixel
        assert!((fh as f64 - fw as f64 * 1800.0 / 2880.0).abs() <= 1.0);
    }

    #[test]
    fn test_fit_surface_leaves_small_sizes() {
        assert_eq!(fit_surface(800, 600, 2048), (800, 600));
        assert_eq!(fit_surface(2048, 10, 2048), (2048, 10));
        assert_eq!(fit_surface(0, 0, 2048), (1, 1));
        // Extreme aspect never collapses to zero
        assert_eq!(fit_surface(100_000, 1, 2048), (2048, 1));
    }

    #[test]
    fn test_globals_layout_matches_shader() {
        assert_eq!(std::mem::size_of::<Globals>(), 608);
        assert_eq!(std::mem::offset_of!(Globals, color_near), 48);
        assert_eq!(std::mem::offset_of!(Globals, pixel_ratio), 80);
        assert_eq!(std::mem::offset_of!(Globals, trail), 96);
    }

    #[test]
    fn test_trail_packed_two_per_slot() {
        let mut u = RenderUniforms::default();
        let points = [
            Vec2::new(0.1, 0.2),
            Vec2::new(0.3, 0.4),
            Vec2::new(0.5, 0.6),
        ];
        u.trail[..3].copy_from_slice(&points);
        u.trail_count = 3;

        let g = Globals::pack(&u, &Viewport::new(640.0, 480.0, 1.0));
        assert_eq!(g.trail_count, 3);
        assert_eq!(g.trail[0], [0.1, 0.2, 0.3, 0.4]);
        assert_eq!(g.trail[1], [0.5, 0.6, 0.0, 0.0]);
        assert_eq!(g.trail[2], [0.0; 4]);
    }

    #[test]
    fn test_full_trail_fits() {
        let mut u = RenderUniforms::default();
        for (i, p) in u.trail.iter_mut().enumerate() {
            *p = Vec2::splat(i as f32);
        }
        u.trail_count = TRAIL_MAX;
        let g = Globals::pack(&u, &Viewport::new(10.0, 10.0, 1.0));
        assert_eq!(g.trail[TRAIL_VEC4S - 1], [62.0, 62.0, 63.0, 63.0]);
    }

    #[test]
    fn test_resolution_is_physical() {
        let g = Globals::pack(&RenderUniforms::default(), &Viewport::new(400.0, 300.0, 2.0));
        assert_eq!(g.resolution, [800.0, 600.0]);
        assert_eq!(g.pixel_ratio, 2.0);
        assert_eq!(g.color_near[3], 1.0);
    }

    #[test]
    fn test_background_is_dark_linear() {
        let c = clear_color(Color::BACKGROUND);
        assert!(c.r > c.g && c.g == c.b);
        assert!(c.r < 0.01);
        assert_eq!(c.a, 1.0);
    }
}
