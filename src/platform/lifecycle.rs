//! Surface lifecycle
//!
//! Mount, per-frame loop, resize and teardown for one field instance.
//! Every resource acquired in `start` has exactly one release path in
//! `teardown`, which is idempotent and also runs on drop.

use super::{FrameTarget, Subscription, SurfaceHost, Viewport};
use crate::error::MountError;
use crate::sim::{InputEvent, SimulationState};

enum Phase<T> {
    /// Surface attached, GPU target not yet created
    Pending,
    Running(Box<Running<T>>),
    Disposed,
}

struct Running<T> {
    sim: SimulationState,
    target: T,
    viewport: Viewport,
    subscriptions: Vec<Subscription>,
    last_frame_ms: Option<f64>,
}

pub struct Lifecycle<H: SurfaceHost, T: FrameTarget> {
    host: H,
    phase: Phase<T>,
}

impl<H: SurfaceHost, T: FrameTarget> Lifecycle<H, T> {
    pub fn new(host: H) -> Self {
        Self {
            host,
            phase: Phase::Pending,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn is_running(&self) -> bool {
        matches!(self.phase, Phase::Running(_))
    }

    pub fn is_disposed(&self) -> bool {
        matches!(self.phase, Phase::Disposed)
    }

    pub fn simulation(&self) -> Option<&SimulationState> {
        match &self.phase {
            Phase::Running(running) => Some(&running.sim),
            _ => None,
        }
    }

    /// Current container viewport, `None` if the container is gone
    pub fn viewport(&self) -> Option<Viewport> {
        let (w, h) = self.host.container_size()?;
        Some(Viewport::new(w, h, self.host.device_pixel_ratio()))
    }

    /// Register listeners and start the frame loop
    ///
    /// On any failure everything acquired so far (including `target` and
    /// the surface) is released and the lifecycle ends disposed.
    pub fn start(&mut self, sim: SimulationState, mut target: T) -> Result<(), MountError> {
        match self.phase {
            Phase::Pending => {}
            Phase::Running(_) => {
                target.release();
                return Err(MountError::AlreadyRunning);
            }
            Phase::Disposed => {
                target.release();
                return Err(MountError::Disposed);
            }
        }

        let Some(viewport) = self.viewport() else {
            target.release();
            self.teardown();
            return Err(MountError::ContainerMissing);
        };

        let mut subscriptions = Vec::with_capacity(Subscription::ALL.len());
        for kind in Subscription::ALL {
            if let Err(e) = self.host.subscribe(kind) {
                for done in subscriptions.drain(..) {
                    self.host.unsubscribe(done);
                }
                target.release();
                self.teardown();
                return Err(e);
            }
            subscriptions.push(kind);
        }

        let (w, h) = viewport.physical_size();
        self.host.resize_surface(w, h);
        target.resize(viewport);

        self.phase = Phase::Running(Box::new(Running {
            sim,
            target,
            viewport,
            subscriptions,
            last_frame_ms: None,
        }));
        self.host.schedule_frame();

        log::info!(
            "Field mounted at {}x{} css px (dpr {})",
            viewport.width,
            viewport.height,
            viewport.pixel_ratio
        );
        Ok(())
    }

    /// Route a pointer/touch message to the trail
    pub fn handle_input(&mut self, event: &InputEvent) {
        if let Phase::Running(running) = &mut self.phase {
            running.sim.handle_input(event);
        }
    }

    /// Resynchronize the surface with the container; the lattice is kept
    pub fn handle_resize(&mut self) {
        let Some(viewport) = self.viewport() else {
            return;
        };
        let Phase::Running(running) = &mut self.phase else {
            return;
        };
        if viewport == running.viewport {
            return;
        }
        running.viewport = viewport;
        let (w, h) = viewport.physical_size();
        self.host.resize_surface(w, h);
        running.target.resize(viewport);
        log::debug!("Surface resized to {}x{}", w, h);
    }

    /// One display refresh; `now_ms` is the frame timestamp in milliseconds
    pub fn frame(&mut self, now_ms: f64) {
        let Phase::Running(running) = &mut self.phase else {
            return;
        };

        let dt = match running.last_frame_ms {
            Some(last) => ((now_ms - last) / 1000.0).max(0.0),
            None => 0.0,
        };
        running.last_frame_ms = Some(now_ms);

        let uniforms = running.sim.tick(dt as f32);
        // Zero-sized container: keep time moving, draw once it has a size
        if !running.viewport.is_degenerate() {
            running.target.draw(uniforms);
        }

        self.host.schedule_frame();
    }

    /// Stop the loop and release everything; safe to call repeatedly
    pub fn teardown(&mut self) {
        match std::mem::replace(&mut self.phase, Phase::Disposed) {
            Phase::Running(mut running) => {
                self.host.cancel_frame();
                for kind in running.subscriptions.drain(..) {
                    self.host.unsubscribe(kind);
                }
                running.target.release();
                running.sim.dispose();
                self.host.remove_surface();
                log::info!("Field torn down after {} frames", running.sim.frames());
            }
            Phase::Pending => {
                self.host.remove_surface();
                log::info!("Field torn down before start");
            }
            Phase::Disposed => {}
        }
    }
}

impl<H: SurfaceHost, T: FrameTarget> Drop for Lifecycle<H, T> {
    fn drop(&mut self) {
        self.teardown();
    }
}
