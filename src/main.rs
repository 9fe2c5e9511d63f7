//! Dispersion Field entry point
//!
//! Web: mounts a field into `#dispersion` if the page has one.
//! Native: headless preview through the CPU reference shader.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod web_entry {
    use std::cell::RefCell;
    use wasm_bindgen::prelude::*;

    use dispersion_field::platform::web::DispersionField;

    thread_local! {
        static FIELD: RefCell<Option<DispersionField>> = const { RefCell::new(None) };
    }

    pub fn run() {
        console_error_panic_hook::set_once();
        if let Err(e) = console_log::init_with_level(log::Level::Info) {
            web_sys::console::warn_1(&format!("Logger init failed: {}", e).into());
        }

        log::info!("Dispersion Field starting...");

        let Some(document) = web_sys::window().and_then(|w| w.document()) else {
            log::warn!("No document; nothing to mount");
            return;
        };
        let Some(container) = document.get_element_by_id("dispersion") else {
            log::info!("No #dispersion element; waiting for `new DispersionField(...)`");
            return;
        };

        let options = container
            .get_attribute("data-options")
            .and_then(|json| match js_sys::JSON::parse(&json) {
                Ok(value) => Some(value),
                Err(_) => {
                    log::warn!("data-options is not valid JSON, using defaults");
                    None
                }
            })
            .unwrap_or(JsValue::UNDEFINED);

        let field = DispersionField::new(Some(container), options);
        FIELD.with(|slot| *slot.borrow_mut() = Some(field));
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn wasm_main() {
    web_entry::run();
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

#[cfg(not(target_arch = "wasm32"))]
mod preview {
    use std::f32::consts::TAU;

    use glam::Vec2;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    use dispersion_field::FieldSettings;
    use dispersion_field::consts::ENVELOPE_THRESHOLD;
    use dispersion_field::platform::Viewport;
    use dispersion_field::sim::{InputEvent, SimulationState, SurfaceRect};

    const WIDTH: f64 = 1280.0;
    const HEIGHT: f64 = 720.0;
    const FRAMES: u32 = 120;
    const FRAME_DT: f32 = 1.0 / 60.0;
    const SEED: u64 = 0x5EED;

    pub fn run(settings: &FieldSettings) {
        let viewport = Viewport::new(WIDTH, HEIGHT, 1.0);
        let mut rng = Pcg32::seed_from_u64(SEED);
        let mut sim = SimulationState::init(settings, viewport.aspect(), &mut rng);
        let rect = SurfaceRect::new(0.0, 0.0, WIDTH as f32, HEIGHT as f32);

        // Left-to-right sweep with a vertical wave
        for frame in 0..FRAMES {
            let t = frame as f32 / FRAMES as f32;
            let client = Vec2::new(
                (0.1 + 0.8 * t) * WIDTH as f32,
                (0.5 + 0.3 * (t * TAU * 1.5).sin()) * HEIGHT as f32,
            );
            sim.handle_input(&InputEvent::PointerMove { client, rect });
            sim.tick(FRAME_DT);
        }

        let mut disturbed = 0usize;
        let mut visibility = 0.0f64;
        let mut total = 0usize;
        for point in sim.shade_all() {
            total += 1;
            visibility += point.alpha as f64;
            if point.envelope > ENVELOPE_THRESHOLD {
                disturbed += 1;
            }
        }
        let mean_visibility = if total > 0 {
            visibility / total as f64
        } else {
            0.0
        };

        let u = sim.uniforms();
        log::info!(
            "{} frames, t={:.2}s, trail={} samples, speed={:.3}",
            sim.frames(),
            u.time,
            u.trail_count,
            u.speed
        );
        log::info!(
            "{}/{} particles disturbed, mean visibility {:.3}",
            disturbed,
            total,
            mean_visibility
        );

        println!(
            "Field {}x{}: {} particles, {} disturbed, mean visibility {:.3}, trail {} samples",
            sim.field().count_x(),
            sim.field().count_y(),
            total,
            disturbed,
            mean_visibility,
            u.trail_count
        );

        sim.dispose();
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    use dispersion_field::FieldSettings;

    env_logger::init();
    log::info!("Dispersion Field (native) starting...");
    log::info!("Native mode runs a headless preview - run with `trunk serve` for the web version");

    let settings = match std::env::args().nth(1) {
        Some(path) => match FieldSettings::from_path(&path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Failed to load {}: {}; using defaults", path, e);
                FieldSettings::default()
            }
        },
        None => FieldSettings::default(),
    };

    preview::run(&settings);
}
