//! GlassTones entry point
//!
//! Handles platform-specific initialization and runs the frame loop.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_game {
    use std::cell::RefCell;
    use std::rc::Rc;

    use glam::Vec2;
    use wasm_bindgen::prelude::*;
    use web_sys::{
        CanvasRenderingContext2d, Element, HtmlCanvasElement, HtmlImageElement, PointerEvent,
    };

    use glass_tones::audio::{AudioBackend, NoteObserver, WebAudioBackend};
    use glass_tones::renderer::RenderState;
    use glass_tones::score::{ScoreBoard, ScoreService};
    use glass_tones::sim::ObstacleId;
    use glass_tones::{DeviceClass, Session, SessionAction, Settings};

    /// Writes the last note into `#note-display`
    struct NoteDisplay {
        element: Element,
        visible: bool,
    }

    impl NoteObserver for NoteDisplay {
        fn note_played(&mut self, name: &str, length: f32, freq: f32) {
            log::debug!("{} (len {:.0}, {:.1} Hz)", name, length, freq);
            if self.visible {
                self.element
                    .set_text_content(Some(&format!("{} {:.1} Hz", name, freq)));
            }
        }
    }

    /// Score board that stores each new best
    struct StoredScore(ScoreBoard);

    impl ScoreService for StoredScore {
        fn add(&mut self, id: ObstacleId, points: u32) -> bool {
            let paid = self.0.add(id, points);
            if paid && self.0.total() == self.0.best {
                self.0.save();
            }
            paid
        }

        fn reset(&mut self) {
            self.0.reset();
        }

        fn retain(&mut self, live: &[ObstacleId]) {
            self.0.retain(live);
        }

        fn total(&self) -> u64 {
            self.0.total()
        }
    }

    /// App instance holding all state
    struct App {
        session: Session<WebAudioBackend>,
        render_state: Option<RenderState>,
        last_frame: f64,
        last_score: Option<u64>,
    }

    impl App {
        fn frame(&mut self, time: f64) {
            // Cap to the device frame rate
            let frame_ms = self.session.tuning().frame_ms();
            if time - self.last_frame < frame_ms - 1.0 {
                return;
            }
            self.last_frame = time;

            let output = self.session.frame(time);
            for action in &output.actions {
                if *action == SessionAction::HideStartMessage {
                    set_class("start-message", "hidden");
                }
            }

            if let Some(rs) = self.render_state.as_mut() {
                match rs.render(&output.plan, &mut self.session.fog) {
                    Ok(()) => {}
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        rs.reconfigure();
                    }
                    Err(e) => log::warn!("Frame dropped: {:?}", e),
                }
            }

            let total = self.session.score().total();
            if self.last_score != Some(total) {
                self.last_score = Some(total);
                if let Some(el) = document().and_then(|d| d.get_element_by_id("score")) {
                    el.set_text_content(Some(&total.to_string()));
                }
            }
        }
    }

    fn document() -> Option<web_sys::Document> {
        web_sys::window().and_then(|w| w.document())
    }

    fn now() -> f64 {
        web_sys::window()
            .and_then(|w| w.performance())
            .map(|p| p.now())
            .unwrap_or_else(js_sys::Date::now)
    }

    fn set_class(id: &str, class: &str) {
        if let Some(el) = document().and_then(|d| d.get_element_by_id(id)) {
            let _ = el.set_attribute("class", class);
        }
    }

    /// Canvas CSS size and the matching device-pixel size
    fn canvas_size(canvas: &HtmlCanvasElement) -> (Vec2, u32, u32) {
        let dpr = web_sys::window().map_or(1.0, |w| w.device_pixel_ratio());
        let css = Vec2::new(canvas.client_width() as f32, canvas.client_height() as f32);
        let width = (css.x as f64 * dpr) as u32;
        let height = (css.y as f64 * dpr) as u32;
        (css.max(Vec2::ONE), width.max(1), height.max(1))
    }

    pub async fn run() -> Result<(), JsValue> {
        console_error_panic_hook::set_once();
        let _ = console_log::init_with_level(log::Level::Info);

        log::info!("GlassTones starting...");

        let window = web_sys::window().ok_or("no window")?;
        let document = window.document().ok_or("no document")?;

        if let Some(loading) = document.get_element_by_id("loading") {
            let _ = loading.set_attribute("class", "hidden");
        }

        let canvas: HtmlCanvasElement = document
            .get_element_by_id("canvas")
            .ok_or("no canvas")?
            .dyn_into()?;

        let (css, width, height) = canvas_size(&canvas);
        canvas.set_width(width);
        canvas.set_height(height);

        let settings = Settings::load();
        let detected = DeviceClass::from_user_agent(&window.navigator().user_agent()?);
        let device = settings.device_or(detected);
        let tuning = device.tuning();
        log::info!("Device class: {}", device.as_str());

        let backend = match WebAudioBackend::new(&tuning) {
            Ok(backend) => Some(backend),
            Err(e) => {
                log::warn!("Audio disabled: {}", e);
                None
            }
        };

        let seed = js_sys::Date::now() as u64;
        let show_notes = settings.show_notes;
        let mut session = Session::new(css, tuning, settings, backend, seed);
        session.set_score_service(Box::new(StoredScore(ScoreBoard::load())));
        if let Some(element) = document.get_element_by_id("note-display") {
            session.set_observer(Box::new(NoteDisplay {
                element,
                visible: show_notes,
            }));
        }
        log::info!("Session initialized with seed: {}", seed);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::BROWSER_WEBGPU | wgpu::Backends::GL,
            ..Default::default()
        });

        let render_state = match instance.create_surface(wgpu::SurfaceTarget::Canvas(canvas.clone()))
        {
            Ok(surface) => {
                let adapter = instance
                    .request_adapter(&wgpu::RequestAdapterOptions {
                        power_preference: wgpu::PowerPreference::HighPerformance,
                        compatible_surface: Some(&surface),
                        force_fallback_adapter: false,
                    })
                    .await;
                match adapter {
                    Ok(adapter) => {
                        log::info!("Using adapter: {:?}", adapter.get_info().name);
                        RenderState::new(surface, &adapter, width, height)
                            .await
                            .map_err(|e| log::warn!("No device: {}", e))
                            .ok()
                    }
                    Err(e) => {
                        log::warn!("No adapter: {}", e);
                        None
                    }
                }
            }
            Err(e) => {
                log::warn!("No surface: {}", e);
                None
            }
        };

        let app = Rc::new(RefCell::new(App {
            session,
            render_state,
            last_frame: 0.0,
            last_score: None,
        }));
        if let Some(rs) = app.borrow_mut().render_state.as_mut() {
            rs.set_view(css);
        }

        setup_input_handlers(&canvas, app.clone());
        setup_start_button(app.clone());
        setup_resize(&canvas, app.clone());
        load_background(app.clone(), app.borrow().session.background().current_url());

        request_animation_frame(app);

        log::info!("GlassTones running!");
        Ok(())
    }

    fn pointer_pos(event: &PointerEvent) -> Vec2 {
        Vec2::new(event.offset_x() as f32, event.offset_y() as f32)
    }

    fn setup_input_handlers(canvas: &HtmlCanvasElement, app: Rc<RefCell<App>>) {
        {
            let app = app.clone();
            let canvas_clone = canvas.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: PointerEvent| {
                event.prevent_default();
                let _ = canvas_clone.set_pointer_capture(event.pointer_id());
                app.borrow_mut()
                    .session
                    .pointer_down(pointer_pos(&event), now());
            });
            let _ = canvas
                .add_event_listener_with_callback("pointerdown", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        {
            let app = app.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: PointerEvent| {
                app.borrow_mut().session.pointer_move(pointer_pos(&event));
            });
            let _ = canvas
                .add_event_listener_with_callback("pointermove", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        for name in ["pointerup", "pointercancel"] {
            let app = app.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: PointerEvent| {
                app.borrow_mut().session.pointer_up(now());
            });
            let _ = canvas.add_event_listener_with_callback(name, closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn setup_start_button(app: Rc<RefCell<App>>) {
        let Some(btn) = document().and_then(|d| d.get_element_by_id("start-button")) else {
            log::warn!("No start button; starting immediately");
            app.borrow_mut().session.start(now());
            return;
        };

        let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::MouseEvent| {
            let mut a = app.borrow_mut();
            // Resume inside the gesture so the context is running when the
            // master fade-in lands
            if let Some(backend) = a.session.audio_mut().backend_mut() {
                backend.resume();
            }
            a.session.start(now());
            set_class("start-button", "hidden");
            set_class("start-message", "fading");
        });
        let _ = btn.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn setup_resize(canvas: &HtmlCanvasElement, app: Rc<RefCell<App>>) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let canvas = canvas.clone();
        let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
            let (css, width, height) = canvas_size(&canvas);
            canvas.set_width(width);
            canvas.set_height(height);
            let mut a = app.borrow_mut();
            a.session.resize(css);
            if let Some(rs) = a.render_state.as_mut() {
                rs.resize(width, height);
                rs.set_view(css);
            }
            log::info!("Resized to {}x{}", css.x, css.y);
        });
        let _ = window.add_event_listener_with_callback("resize", closure.as_ref().unchecked_ref());
        closure.forget();
    }

    /// Read an image's pixels back through a scratch 2D canvas
    fn decode_image(img: &HtmlImageElement) -> Result<(u32, u32, Vec<u8>), JsValue> {
        let (w, h) = (img.natural_width(), img.natural_height());
        let scratch: HtmlCanvasElement = document()
            .ok_or("no document")?
            .create_element("canvas")?
            .dyn_into()?;
        scratch.set_width(w);
        scratch.set_height(h);
        let ctx: CanvasRenderingContext2d = scratch
            .get_context("2d")?
            .ok_or("no 2d context")?
            .dyn_into()?;
        ctx.draw_image_with_html_image_element(img, 0.0, 0.0)?;
        let data = ctx.get_image_data(0.0, 0.0, w as f64, h as f64)?;
        Ok((w, h, data.data().0))
    }

    /// Walk the background fallback chain
    fn load_background(app: Rc<RefCell<App>>, url: Option<&'static str>) {
        let Some(url) = url else {
            return;
        };
        let Ok(img) = HtmlImageElement::new() else {
            return;
        };

        {
            let app = app.clone();
            let img_clone = img.clone();
            let closure = Closure::once(move |_event: web_sys::Event| {
                let mut a = app.borrow_mut();
                match decode_image(&img_clone) {
                    Ok((w, h, rgba)) => {
                        if let Some(rs) = a.render_state.as_mut() {
                            rs.set_background(w, h, &rgba);
                        }
                        a.session.background_mut().on_load(now());
                    }
                    Err(e) => log::warn!("Background decode failed: {:?}", e),
                }
            });
            img.set_onload(Some(closure.as_ref().unchecked_ref()));
            closure.forget();
        }

        {
            let closure = Closure::once(move |_event: web_sys::Event| {
                let next = app.borrow_mut().session.background_mut().on_error();
                load_background(app, next);
            });
            img.set_onerror(Some(closure.as_ref().unchecked_ref()));
            closure.forget();
        }

        img.set_src(url);
    }

    fn request_animation_frame(app: Rc<RefCell<App>>) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let closure = Closure::once(move |time: f64| {
            app.borrow_mut().frame(time);
            request_animation_frame(app);
        });
        let _ = window.request_animation_frame(closure.as_ref().unchecked_ref());
        closure.forget();
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub async fn wasm_main() {
    if let Err(e) = wasm_game::run().await {
        log::error!("Startup failed: {:?}", e);
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("GlassTones (native) starting...");
    log::info!("Rendering needs a browser - run with `trunk serve`; simulating headless");

    headless::run(20_000.0);
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

/// Drive a session without a window or audio device and log what happens
#[cfg(not(target_arch = "wasm32"))]
mod headless {
    use glam::Vec2;

    use glass_tones::audio::RecordingBackend;
    use glass_tones::sim::SimEvent;
    use glass_tones::{DeviceClass, Session, Settings};

    pub fn run(duration_ms: f64) {
        let settings = Settings::load();
        let tuning = settings.device_or(DeviceClass::Desktop).tuning();
        let frame_ms = tuning.frame_ms();
        let canvas = Vec2::new(800.0, 600.0);
        let mut session = Session::new(canvas, tuning, settings, Some(RecordingBackend::new()), 42);

        session.start(0.0);

        // One line across the middle and a marker near the centre
        let mut now = 500.0;
        session.pointer_down(Vec2::new(200.0, 420.0), now);
        for i in 1..=10 {
            session.pointer_move(Vec2::new(200.0 + i as f32 * 40.0, 420.0));
        }
        now += 300.0;
        session.pointer_up(now);
        session.pointer_down(Vec2::new(420.0, 200.0), now);
        session.pointer_up(now + 50.0);

        let (mut walls, mut lines, mut markers) = (0, 0, 0);
        while now < duration_ms {
            let output = session.frame(now);
            for event in &output.events {
                match event {
                    SimEvent::WallHit { .. } => walls += 1,
                    SimEvent::LineHit { .. } => lines += 1,
                    SimEvent::MarkerHit { .. } => markers += 1,
                }
                log::info!("{:>7.0} ms  {:?}", now, event);
            }
            for action in &output.actions {
                log::info!("{:>7.0} ms  {:?}", now, action);
            }
            if let Some(backend) = session.audio_mut().backend_mut() {
                backend.advance(frame_ms / 1000.0);
            }
            now += frame_ms;
        }

        let voices = session
            .audio()
            .backend()
            .map_or(0, |b| b.started().count());
        log::info!(
            "{:.0} s: {} wall, {} line, {} marker hits; {} voices; score {}; fog {:.0}/255",
            duration_ms / 1000.0,
            walls,
            lines,
            markers,
            voices,
            session.score().total(),
            session.fog.mean_alpha()
        );
    }
}
