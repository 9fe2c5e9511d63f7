//! Browser host
//!
//! Owns the canvas, DOM listeners, the container `ResizeObserver` and the
//! requestAnimationFrame callback. Every callback reaches the lifecycle
//! through a `Weak` handle, so a torn-down or dropped field ignores late
//! events.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use wasm_bindgen::prelude::*;
use web_sys::{
    AddEventListenerOptions, Document, Element, Event, HtmlCanvasElement, HtmlElement, MouseEvent,
    ResizeObserver, TouchEvent,
};

use super::{FrameTarget, Lifecycle, Subscription, SurfaceHost, Viewport, surface_style};
use crate::error::{MountError, RenderError};
use crate::renderer::FieldRenderState;
use crate::settings::{Color, FieldSettings};
use crate::sim::{InputEvent, ParticleField, SimulationState, SurfaceRect};

pub type WebLifecycle = Lifecycle<WebHost, FieldRenderState>;
type Session = Rc<RefCell<WebLifecycle>>;

/// Run `f` against the lifecycle if it is still alive and not busy
fn with_owner(owner: &Weak<RefCell<WebLifecycle>>, f: impl FnOnce(&mut WebLifecycle)) {
    let Some(session) = owner.upgrade() else {
        return;
    };
    let Ok(mut lifecycle) = session.try_borrow_mut() else {
        log::trace!("Lifecycle busy, callback skipped");
        return;
    };
    f(&mut lifecycle);
}

fn js_error(value: JsValue) -> String {
    value
        .as_string()
        .unwrap_or_else(|| format!("{:?}", value))
}

fn surface_rect(canvas: &HtmlCanvasElement) -> SurfaceRect {
    let rect = canvas.get_bounding_client_rect();
    SurfaceRect::new(
        rect.left() as f32,
        rect.top() as f32,
        rect.width() as f32,
        rect.height() as f32,
    )
}

/// DOM event to input message
fn translate(kind: Subscription, event: &Event, canvas: &HtmlCanvasElement) -> Option<InputEvent> {
    match kind {
        Subscription::MouseMove => {
            let mouse = event.dyn_ref::<MouseEvent>()?;
            Some(InputEvent::PointerMove {
                client: Vec2::new(mouse.client_x() as f32, mouse.client_y() as f32),
                rect: surface_rect(canvas),
            })
        }
        Subscription::TouchMove => {
            let touches = event.dyn_ref::<TouchEvent>()?.touches();
            let points = (0..touches.length())
                .filter_map(|i| touches.get(i))
                .map(|t| Vec2::new(t.client_x() as f32, t.client_y() as f32));
            InputEvent::first_touch(points, surface_rect(canvas))
        }
        Subscription::MouseLeave => Some(InputEvent::PointerLeave),
        Subscription::TouchEnd => Some(InputEvent::TouchEnd),
        Subscription::Resize => None,
    }
}

struct Listener {
    kind: Subscription,
    name: &'static str,
    closure: Closure<dyn FnMut(Event)>,
}

struct Observer {
    observer: ResizeObserver,
    _closure: Closure<dyn FnMut(js_sys::Array)>,
}

pub struct WebHost {
    window: web_sys::Window,
    container: Element,
    canvas: HtmlCanvasElement,
    owner: Weak<RefCell<WebLifecycle>>,
    listeners: Vec<Listener>,
    observer: Option<Observer>,
    frame_callback: Closure<dyn FnMut(f64)>,
    frame_id: Option<i32>,
    surface_attached: bool,
}

impl WebHost {
    fn new(
        window: web_sys::Window,
        container: Element,
        canvas: HtmlCanvasElement,
        owner: Weak<RefCell<WebLifecycle>>,
    ) -> Self {
        let frame_owner = owner.clone();
        let frame_callback = Closure::<dyn FnMut(_)>::new(move |now: f64| {
            with_owner(&frame_owner, |lifecycle| lifecycle.frame(now));
        });
        Self {
            window,
            container,
            canvas,
            owner,
            listeners: Vec::new(),
            observer: None,
            frame_callback,
            frame_id: None,
            surface_attached: true,
        }
    }

    pub fn canvas(&self) -> &HtmlCanvasElement {
        &self.canvas
    }

    fn observe_resize(&mut self) -> Result<(), MountError> {
        let owner = self.owner.clone();
        let closure = Closure::<dyn FnMut(_)>::new(move |_entries: js_sys::Array| {
            with_owner(&owner, |lifecycle| lifecycle.handle_resize());
        });
        let observer = ResizeObserver::new(closure.as_ref().unchecked_ref())
            .map_err(|e| MountError::Listener(Subscription::Resize, js_error(e)))?;
        observer.observe(&self.container);
        self.observer = Some(Observer {
            observer,
            _closure: closure,
        });
        Ok(())
    }

    fn listen(&mut self, kind: Subscription, name: &'static str) -> Result<(), MountError> {
        let owner = self.owner.clone();
        let canvas = self.canvas.clone();
        let closure = Closure::<dyn FnMut(_)>::new(move |event: Event| {
            if let Some(input) = translate(kind, &event, &canvas) {
                with_owner(&owner, |lifecycle| lifecycle.handle_input(&input));
            }
        });

        let callback = closure.as_ref().unchecked_ref();
        let result = if kind == Subscription::TouchMove {
            let options = AddEventListenerOptions::new();
            options.set_passive(true);
            self.container
                .add_event_listener_with_callback_and_add_event_listener_options(
                    name, callback, &options,
                )
        } else {
            self.container.add_event_listener_with_callback(name, callback)
        };
        result.map_err(|e| MountError::Listener(kind, js_error(e)))?;

        self.listeners.push(Listener {
            kind,
            name,
            closure,
        });
        Ok(())
    }
}

impl SurfaceHost for WebHost {
    fn container_size(&self) -> Option<(f64, f64)> {
        if !self.container.is_connected() {
            return None;
        }
        let rect = self.container.get_bounding_client_rect();
        Some((rect.width(), rect.height()))
    }

    fn device_pixel_ratio(&self) -> f64 {
        self.window.device_pixel_ratio()
    }

    fn subscribe(&mut self, kind: Subscription) -> Result<(), MountError> {
        match kind.event_name() {
            Some(name) => self.listen(kind, name),
            None => self.observe_resize(),
        }
    }

    fn unsubscribe(&mut self, kind: Subscription) {
        if kind == Subscription::Resize {
            if let Some(observer) = self.observer.take() {
                observer.observer.disconnect();
            }
            return;
        }
        let container = &self.container;
        self.listeners.retain(|listener| {
            if listener.kind != kind {
                return true;
            }
            if let Err(e) = container.remove_event_listener_with_callback(
                listener.name,
                listener.closure.as_ref().unchecked_ref(),
            ) {
                log::warn!("Failed to remove {} listener: {}", listener.name, js_error(e));
            }
            false
        });
    }

    fn resize_surface(&mut self, width: u32, height: u32) {
        self.canvas.set_width(width);
        self.canvas.set_height(height);
    }

    fn schedule_frame(&mut self) {
        match self
            .window
            .request_animation_frame(self.frame_callback.as_ref().unchecked_ref())
        {
            Ok(id) => self.frame_id = Some(id),
            Err(e) => log::warn!("requestAnimationFrame failed: {}", js_error(e)),
        }
    }

    fn cancel_frame(&mut self) {
        if let Some(id) = self.frame_id.take() {
            if let Err(e) = self.window.cancel_animation_frame(id) {
                log::warn!("cancelAnimationFrame failed: {}", js_error(e));
            }
        }
    }

    fn remove_surface(&mut self) {
        if self.surface_attached {
            self.canvas.remove();
            self.surface_attached = false;
        }
    }
}

fn create_canvas(document: &Document, container: &Element) -> Result<HtmlCanvasElement, MountError> {
    let canvas = document
        .create_element("canvas")
        .map_err(|e| MountError::Dom(js_error(e)))?
        .dyn_into::<HtmlCanvasElement>()
        .map_err(|_| MountError::Dom("created element is not a canvas".into()))?;
    canvas
        .set_attribute("style", &surface_style())
        .map_err(|e| MountError::Dom(js_error(e)))?;
    container
        .append_child(&canvas)
        .map_err(|e| MountError::Dom(js_error(e)))?;
    Ok(canvas)
}

async fn create_target(
    canvas: HtmlCanvasElement,
    viewport: Viewport,
    field: &ParticleField,
) -> Result<FieldRenderState, RenderError> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::BROWSER_WEBGPU | wgpu::Backends::GL,
        ..Default::default()
    });

    let surface = instance.create_surface(wgpu::SurfaceTarget::Canvas(canvas))?;

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        })
        .await?;

    log::info!("Using adapter: {:?}", adapter.get_info().name);

    FieldRenderState::new(surface, &adapter, viewport, field).await
}

/// Build the simulation and GPU target, then start the loop
async fn initialize(owner: Weak<RefCell<WebLifecycle>>, settings: FieldSettings) {
    if let Err(e) = start_field(&owner, &settings).await {
        log::warn!("Field disabled: {}", e);
        with_owner(&owner, |lifecycle| lifecycle.teardown());
    }
}

async fn start_field(
    owner: &Weak<RefCell<WebLifecycle>>,
    settings: &FieldSettings,
) -> Result<(), MountError> {
    let Some(session) = owner.upgrade() else {
        return Ok(());
    };
    let (viewport, canvas) = {
        let lifecycle = session.borrow();
        (lifecycle.viewport(), lifecycle.host().canvas().clone())
    };
    // Don't hold a strong handle across the GPU awaits
    drop(session);

    let viewport = viewport.ok_or(MountError::ContainerMissing)?;

    let mut rng = Pcg32::seed_from_u64(js_sys::Date::now() as u64);
    let sim = SimulationState::init(settings, viewport.aspect(), &mut rng);

    let mut target = create_target(canvas, viewport, sim.field()).await?;

    let Some(session) = owner.upgrade() else {
        target.release();
        return Ok(());
    };
    let Ok(mut lifecycle) = session.try_borrow_mut() else {
        target.release();
        log::warn!("Lifecycle busy at start");
        return Ok(());
    };
    lifecycle.start(sim, target)
}

/// Attach a field to `container`; GPU setup completes asynchronously
pub fn mount(container: Element, settings: FieldSettings) -> Result<Session, MountError> {
    let window = web_sys::window().ok_or(MountError::ContainerMissing)?;
    let document = window.document().ok_or(MountError::ContainerMissing)?;
    let canvas = create_canvas(&document, &container)?;

    let session = Rc::new_cyclic(|owner| {
        RefCell::new(Lifecycle::new(WebHost::new(
            window,
            container,
            canvas,
            owner.clone(),
        )))
    });
    wasm_bindgen_futures::spawn_local(initialize(Rc::downgrade(&session), settings));
    Ok(session)
}

/// Paint the field background on the container, returning the previous
/// inline value
fn paint_background(container: &Element) -> Option<String> {
    let style = container.dyn_ref::<HtmlElement>()?.style();
    let previous = style.get_property_value("background-color").ok()?;
    if let Err(e) = style.set_property("background-color", &Color::BACKGROUND.to_hex()) {
        log::warn!("Failed to set container background: {}", js_error(e));
    }
    Some(previous)
}

fn restore_background(container: &Element, previous: &str) {
    if let Some(element) = container.dyn_ref::<HtmlElement>() {
        if let Err(e) = element.style().set_property("background-color", previous) {
            log::warn!("Failed to restore container background: {}", js_error(e));
        }
    }
}

fn on_back_from(options: &JsValue) -> Option<js_sys::Function> {
    if !options.is_object() {
        return None;
    }
    js_sys::Reflect::get(options, &JsValue::from_str("onBack"))
        .ok()?
        .dyn_into::<js_sys::Function>()
        .ok()
}

fn settings_from(options: &JsValue) -> FieldSettings {
    FieldSettings::from_js(options).unwrap_or_else(|e| {
        log::warn!("Invalid field options, using defaults: {}", e);
        FieldSettings::default()
    })
}

/// JS handle for one mounted field
#[wasm_bindgen]
pub struct DispersionField {
    container: Option<Element>,
    session: Option<Session>,
    on_back: Option<js_sys::Function>,
    /// Container background before the first mount
    saved_background: Option<String>,
}

#[wasm_bindgen]
impl DispersionField {
    /// Mount into `container`; a missing container or unusable GPU leaves an
    /// inert handle
    #[wasm_bindgen(constructor)]
    pub fn new(container: Option<Element>, options: JsValue) -> DispersionField {
        let mut field = DispersionField {
            container,
            session: None,
            on_back: None,
            saved_background: None,
        };
        field.reconfigure(options);
        field
    }

    /// Tear down and remount with new density/colors
    pub fn reconfigure(&mut self, options: JsValue) {
        self.unmount();
        self.on_back = on_back_from(&options);

        let Some(container) = self.container.clone() else {
            log::warn!("No container element; field not mounted");
            return;
        };
        // Stays dark while the GPU starts and if it never does
        self.saved_background = paint_background(&container);
        match mount(container, settings_from(&options)) {
            Ok(session) => self.session = Some(session),
            Err(e) => log::warn!("Field not mounted: {}", e),
        }
    }

    pub fn unmount(&mut self) {
        if let Some(session) = self.session.take() {
            match session.try_borrow_mut() {
                Ok(mut lifecycle) => lifecycle.teardown(),
                // Torn down by Drop once the last handle goes
                Err(_) => log::warn!("Lifecycle busy during unmount"),
            }
        }
        if let (Some(container), Some(previous)) =
            (&self.container, self.saved_background.take())
        {
            restore_background(container, &previous);
        }
    }

    #[wasm_bindgen(js_name = goBack)]
    pub fn go_back(&self) {
        if let Some(callback) = &self.on_back {
            if let Err(e) = callback.call0(&JsValue::NULL) {
                log::warn!("onBack failed: {}", js_error(e));
            }
        }
    }

    #[wasm_bindgen(getter, js_name = isRunning)]
    pub fn is_running(&self) -> bool {
        self.session
            .as_ref()
            .and_then(|s| s.try_borrow().ok().map(|l| l.is_running()))
            .unwrap_or(false)
    }
}

impl Drop for DispersionField {
    fn drop(&mut self) {
        self.unmount();
    }
}
