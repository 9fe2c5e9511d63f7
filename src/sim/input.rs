//! Pointer/touch sampling
//!
//! Raw client coordinates arrive as messages; each is mapped to NDC relative
//! to the surface's bounding rectangle and fed to the trail. No state lives
//! here.

use glam::Vec2;

use super::trail::{PushOutcome, TrailBuffer};

/// Bounding rectangle of the input surface, in client (CSS) pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl SurfaceRect {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Client coordinates to clamped NDC (+Y up)
    pub fn to_ndc(&self, client: Vec2) -> Vec2 {
        let width = self.width.max(f32::EPSILON);
        let height = self.height.max(f32::EPSILON);
        let x = ((client.x - self.left) / width) * 2.0 - 1.0;
        let y = -(((client.y - self.top) / height) * 2.0 - 1.0);
        Vec2::new(x, y).clamp(Vec2::splat(-1.0), Vec2::ONE)
    }
}

/// Input message delivered by the host
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    PointerMove { client: Vec2, rect: SurfaceRect },
    PointerLeave,
    TouchMove { client: Vec2, rect: SurfaceRect },
    TouchEnd,
}

impl InputEvent {
    /// Touch move from the active touch list; only the first touch counts
    pub fn first_touch<I>(touches: I, rect: SurfaceRect) -> Option<Self>
    where
        I: IntoIterator<Item = Vec2>,
    {
        touches
            .into_iter()
            .next()
            .map(|client| InputEvent::TouchMove { client, rect })
    }
}

/// Apply one input message to the trail
///
/// Returns the push outcome for moves, `None` for leave/end (which clear).
pub fn apply_input(trail: &mut TrailBuffer, event: &InputEvent) -> Option<PushOutcome> {
    match *event {
        InputEvent::PointerMove { client, rect } | InputEvent::TouchMove { client, rect } => {
            Some(trail.push(rect.to_ndc(client)))
        }
        InputEvent::PointerLeave | InputEvent::TouchEnd => {
            if !trail.is_empty() {
                log::trace!("Trail cleared ({} samples)", trail.len());
            }
            trail.clear();
            None
        }
    }
}
