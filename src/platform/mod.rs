//! Platform abstraction layer
//!
//! Handles browser/native differences for:
//! - Render surface ownership and sizing
//! - Input and resize listener registration
//! - Frame scheduling (requestAnimationFrame on web)
//!
//! `Lifecycle` drives any `SurfaceHost` + `FrameTarget` pair; `web` provides
//! the browser host.

pub mod lifecycle;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use lifecycle::Lifecycle;

use crate::consts::MAX_PIXEL_RATIO;
use crate::error::MountError;
use crate::settings::Color;
use crate::sim::RenderUniforms;

/// Inline style for the render surface; the background shows while nothing
/// is drawn
pub fn surface_style() -> String {
    format!(
        "display:block;width:100%;height:100%;background:{}",
        Color::BACKGROUND.to_hex()
    )
}

/// Container size and pixel density
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// CSS pixels
    pub width: f64,
    /// CSS pixels
    pub height: f64,
    /// Device pixel ratio, capped at `MAX_PIXEL_RATIO`
    pub pixel_ratio: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64, device_pixel_ratio: f64) -> Self {
        let pixel_ratio = if device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0 {
            device_pixel_ratio.min(MAX_PIXEL_RATIO)
        } else {
            1.0
        };
        Self {
            width: width.max(0.0),
            height: height.max(0.0),
            pixel_ratio,
        }
    }

    /// Surface size in physical pixels (never zero)
    pub fn physical_size(&self) -> (u32, u32) {
        let w = (self.width * self.pixel_ratio).round().max(1.0) as u32;
        let h = (self.height * self.pixel_ratio).round().max(1.0) as u32;
        (w, h)
    }

    /// Height over width, with a one-pixel minimum divisor
    pub fn aspect(&self) -> f32 {
        (self.height / self.width.max(1.0)) as f32
    }

    /// Nothing visible to draw into
    pub fn is_degenerate(&self) -> bool {
        self.width < 1.0 || self.height < 1.0
    }
}

/// Host callbacks the field listens to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subscription {
    /// Mouse only; finger motion arrives through `TouchMove`
    MouseMove,
    MouseLeave,
    /// Registered passive
    TouchMove,
    TouchEnd,
    /// Container resize observer
    Resize,
}

impl Subscription {
    pub const ALL: [Subscription; 5] = [
        Subscription::MouseMove,
        Subscription::MouseLeave,
        Subscription::TouchMove,
        Subscription::TouchEnd,
        Subscription::Resize,
    ];

    /// DOM event name (`None` for the resize observer)
    pub fn event_name(&self) -> Option<&'static str> {
        match self {
            Subscription::MouseMove => Some("mousemove"),
            Subscription::MouseLeave => Some("mouseleave"),
            Subscription::TouchMove => Some("touchmove"),
            Subscription::TouchEnd => Some("touchend"),
            Subscription::Resize => None,
        }
    }
}

/// Owner of the render surface and its event sources
pub trait SurfaceHost {
    /// Container size in CSS pixels, `None` once the container is gone
    fn container_size(&self) -> Option<(f64, f64)>;
    fn device_pixel_ratio(&self) -> f64;
    fn subscribe(&mut self, kind: Subscription) -> Result<(), MountError>;
    fn unsubscribe(&mut self, kind: Subscription);
    /// Set the surface's backing pixel size
    fn resize_surface(&mut self, width: u32, height: u32);
    /// Request one frame callback
    fn schedule_frame(&mut self);
    fn cancel_frame(&mut self);
    /// Detach the surface from its container
    fn remove_surface(&mut self);
}

/// GPU side of the frame: resize, draw, release
pub trait FrameTarget {
    fn resize(&mut self, viewport: Viewport);
    fn draw(&mut self, uniforms: &RenderUniforms);
    /// Free GPU buffers and programs
    fn release(&mut self);
}
