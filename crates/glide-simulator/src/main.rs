//! Desktop simulator for the glide widget framework.
//!
//! Runs glide-core in an SDL2 window via `embedded-graphics-simulator`. The
//! mouse stands in for a resistive panel whose raw readings are deliberately
//! skewed, so the calibration wizard has something to correct.
//!
//! # Key bindings
//!
//! | Key | Action                       |
//! |-----|------------------------------|
//! | C   | Calibration wizard           |
//! | L   | Scrolling list window        |
//! | M   | Toggle a list-style modal    |
//! | Q   | Quit                         |
//!
//! Mouse press, drag and release are forwarded as touch down, move and up.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::text::Alignment;
use embedded_graphics_simulator::{
    OutputSettingsBuilder, SimulatorDisplay, SimulatorEvent, Window as SimulatorWindow, sdl2::Keycode,
};
use log::{error, info, warn};

use glide_core::Glide;
use glide_core::calibration::{CalibrationDevice, CalibrationError, CalibrationSettings, CalibrationWindow};
use glide_core::config::GlideConfig;
use glide_core::modal::ModalKind;
use glide_core::storage::{MemoryStore, SettingsStore, StoreError};
use glide_core::touch::RawTouch;
use glide_core::ui::{Button, Container, TextBlock, WindowView};

// ---------------------------------------------------------------------------
// Display constants
// ---------------------------------------------------------------------------

const DISPLAY_WIDTH_PX: u32 = 320;
const DISPLAY_HEIGHT_PX: u32 = 240;

/// Pixel scale factor for the simulator window.
const WINDOW_SCALE: u32 = 2;

/// Target frame duration (~30 FPS).
const FRAME_DURATION: Duration = Duration::from_millis(33);

// ---------------------------------------------------------------------------
// Simulated touch panel
// ---------------------------------------------------------------------------

/// Correction installed by the last successful calibration.
#[derive(Debug, Clone, Copy)]
struct Affine {
    x: [f32; 3],
    y: [f32; 3],
}

impl Affine {
    fn apply(&self, raw: Point) -> Point {
        let (rx, ry) = (raw.x as f32, raw.y as f32);
        Point::new(
            (self.x[0] * rx + self.x[1] * ry + self.x[2]).round() as i32,
            (self.y[0] * rx + self.y[1] * ry + self.y[2]).round() as i32,
        )
    }

    /// Solve `screen = a * raw_x + b * raw_y + c` for both axes from the
    /// first three pairs (Cramer's rule).
    fn fit(settings: &CalibrationSettings) -> Option<Self> {
        if settings.point_count() < 3 {
            return None;
        }
        let r = |i: usize| (settings.cx[i] as f32, settings.cy[i] as f32);
        let (r0, r1, r2) = (r(0), r(1), r(2));
        let det = r0.0 * (r1.1 - r2.1) - r0.1 * (r1.0 - r2.0) + (r1.0 * r2.1 - r2.0 * r1.1);
        if det.abs() < f32::EPSILON {
            return None;
        }

        let solve = |s: [f32; 3]| {
            let a = (s[0] * (r1.1 - r2.1) - r0.1 * (s[1] - s[2]) + (s[1] * r2.1 - s[2] * r1.1)) / det;
            let b = (r0.0 * (s[1] - s[2]) - s[0] * (r1.0 - r2.0) + (r1.0 * s[2] - r2.0 * s[1])) / det;
            let c = (r0.0 * (r1.1 * s[2] - r2.1 * s[1]) - r0.1 * (r1.0 * s[2] - r2.0 * s[1])
                + s[0] * (r1.0 * r2.1 - r2.0 * r1.1))
                / det;
            [a, b, c]
        };
        let sx = [settings.sx[0] as f32, settings.sx[1] as f32, settings.sx[2] as f32];
        let sy = [settings.sy[0] as f32, settings.sy[1] as f32, settings.sy[2] as f32];
        Some(Self {
            x: solve(sx),
            y: solve(sy),
        })
    }
}

#[derive(Debug, Default)]
struct PanelState {
    correction: Option<Affine>,
    raw_mode: bool,
}

/// Mouse-driven panel with a skewed digitizer.
#[derive(Debug, Clone, Default)]
struct SimTouchPanel {
    state: Rc<RefCell<PanelState>>,
}

impl SimTouchPanel {
    /// What the digitizer would report for a finger at `screen`.
    fn digitize(screen: Point) -> Point {
        Point::new(screen.x * 9 / 10 + 12, screen.y * 11 / 10 - 6)
    }

    /// Touch point as the controller reports it after correction.
    fn read(&self, mouse: Point) -> Point {
        let raw = Self::digitize(mouse);
        let state = self.state.borrow();
        match state.correction {
            Some(correction) if !state.raw_mode => correction.apply(raw),
            _ => raw,
        }
    }
}

impl CalibrationDevice for SimTouchPanel {
    fn calibration_point_count(&mut self) -> usize {
        3
    }

    fn calibration_point(&mut self, index: usize) -> Point {
        match index {
            0 => Point::new(32, 24),
            1 => Point::new(288, 120),
            _ => Point::new(160, 216),
        }
    }

    fn start_calibration(&mut self) {
        self.state.borrow_mut().raw_mode = true;
    }

    fn set_calibration(&mut self, settings: &CalibrationSettings) -> Result<(), CalibrationError> {
        let mut state = self.state.borrow_mut();
        state.raw_mode = false;
        let correction = Affine::fit(settings).ok_or(CalibrationError::Rejected)?;
        info!("Installed correction {:?}", correction);
        state.correction = Some(correction);
        Ok(())
    }
}

/// In-memory store shared between the loader and every calibration window.
#[derive(Debug, Clone, Default)]
struct SharedStore(Rc<RefCell<MemoryStore>>);

impl SettingsStore for SharedStore {
    fn save(&mut self, settings: &CalibrationSettings) -> Result<(), StoreError> {
        self.0.borrow_mut().save(settings)
    }

    fn load(&mut self) -> Result<Option<CalibrationSettings>, StoreError> {
        self.0.borrow_mut().load()
    }
}

// ---------------------------------------------------------------------------
// Windows
// ---------------------------------------------------------------------------

type SimGlide = Glide<SimulatorDisplay<Rgb565>>;

fn show_calibration(glide: &mut SimGlide, panel: &SimTouchPanel, store: &SharedStore, closed: &Rc<Cell<bool>>) {
    let config = glide.config().calibration;
    let calibrated = glide.touch().is_calibrated();
    let mut wizard = match CalibrationWindow::new(glide.lcd_size(), panel.clone(), store.clone(), &config, calibrated) {
        Ok(wizard) => wizard,
        Err(e) => {
            error!("Cannot open calibration window: {}", e);
            return;
        }
    };
    let flag = closed.clone();
    wizard.window_mut().close.subscribe(move |_| flag.set(true));

    if let Err(e) = glide.set_main_window(Box::new(wizard)) {
        error!("Failed to show calibration window: {:?}", e);
    }
}

fn show_list(glide: &mut SimGlide) {
    let mut window = glide.create_window("list", DISPLAY_WIDTH_PX, DISPLAY_HEIGHT_PX);
    window.back_color = Rgb565::new(28, 58, 28);

    let header = TextBlock::new("header", 10, 0, 300, 30, "Drag to scroll")
        .with_alignment(Alignment::Center)
        .with_font_color(Rgb565::BLUE);
    window.add_child(Box::new(header));

    for i in 0..12 {
        let label = format!("Item {}", i + 1);
        let mut button = Button::new("", 20, 40 + i * 40, 280, 32, &label);
        button.base.tap.subscribe(|e| info!("Tapped {}", e.name));
        window.add_child(Box::new(button));
    }

    if let Err(e) = glide.set_main_window(Box::new(window)) {
        error!("Failed to show list window: {:?}", e);
    }
}

fn toggle_modal(glide: &mut SimGlide, close_requested: &Rc<Cell<bool>>) {
    if glide.is_modal_open(ModalKind::List) {
        if let Err(e) = glide.close_modal(ModalKind::List) {
            error!("Failed to close modal: {:?}", e);
        }
        return;
    }

    let mut overlay = Container::new("picker", 60, 40, 200, 160);
    let mut close = Button::new("close", 20, 110, 160, 32, "Close");
    let flag = close_requested.clone();
    close.base.tap.subscribe(move |_| flag.set(true));
    overlay.add_child(Box::new(TextBlock::new("title", 0, 20, 200, 40, "Modal overlay").with_alignment(Alignment::Center)));
    overlay.add_child(Box::new(close));

    if let Err(e) = glide.open_modal(ModalKind::List, Box::new(overlay)) {
        warn!("Cannot open modal: {:?}", e);
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    env_logger::init();
    info!("Starting glide simulator");
    info!(
        "Display: {}×{} (scale {}×)",
        DISPLAY_WIDTH_PX, DISPLAY_HEIGHT_PX, WINDOW_SCALE
    );
    info!("Keys: C=Calibrate  L=List  M=Modal  Q=Quit");

    let display = SimulatorDisplay::<Rgb565>::new(Size::new(DISPLAY_WIDTH_PX, DISPLAY_HEIGHT_PX));
    let output_settings = OutputSettingsBuilder::new().scale(WINDOW_SCALE).build();
    let mut window = SimulatorWindow::new("Glide Simulator", &output_settings);

    let mut glide = Glide::new(display, GlideConfig::default());
    let mut panel = SimTouchPanel::default();
    let mut store = SharedStore::default();

    let calibration_closed = Rc::new(Cell::new(false));
    let modal_close_requested = Rc::new(Cell::new(false));

    match glide.init_touch(&mut store, &mut panel) {
        Ok(true) => show_list(&mut glide),
        Ok(false) => show_calibration(&mut glide, &panel, &store, &calibration_closed),
        Err(e) => {
            warn!("Ignoring saved calibration: {:?}", e);
            show_calibration(&mut glide, &panel, &store, &calibration_closed);
        }
    }

    // The SDL window is lazily initialized on the first `update()` call.
    // We must call `update()` once before `events()` or it will panic.
    window.update(glide.display());
    let mut mouse_down = false;

    // -----------------------------------------------------------------------
    // Main loop
    // -----------------------------------------------------------------------
    'running: loop {
        let frame_start = Instant::now();

        // --- SDL events ---------------------------------------------------
        for event in window.events() {
            let raw = match event {
                SimulatorEvent::Quit => break 'running,

                SimulatorEvent::KeyDown { keycode, .. } => {
                    match keycode {
                        Keycode::Q | Keycode::Escape => break 'running,
                        Keycode::C => show_calibration(&mut glide, &panel, &store, &calibration_closed),
                        Keycode::L => show_list(&mut glide),
                        Keycode::M => toggle_modal(&mut glide, &modal_close_requested),
                        _ => {}
                    }
                    None
                }

                SimulatorEvent::MouseButtonDown { point, .. } => {
                    mouse_down = true;
                    Some(RawTouch::Down(panel.read(point)))
                }
                SimulatorEvent::MouseMove { point } if mouse_down => Some(RawTouch::Move(panel.read(point))),
                SimulatorEvent::MouseButtonUp { point, .. } => {
                    mouse_down = false;
                    Some(RawTouch::Up(panel.read(point)))
                }

                _ => None,
            };

            if let Some(raw) = raw
                && let Err(e) = glide.handle_raw_touch(raw)
            {
                error!("Touch dispatch error: {:?}", e);
            }
        }

        // --- Deferred window changes --------------------------------------
        if calibration_closed.replace(false) {
            info!("Calibration window closed");
            show_list(&mut glide);
        }
        if modal_close_requested.replace(false) && glide.is_modal_open(ModalKind::List) {
            toggle_modal(&mut glide, &modal_close_requested);
        }

        window.update(glide.display());

        // --- Frame pacing -------------------------------------------------
        let elapsed = frame_start.elapsed();
        if elapsed < FRAME_DURATION {
            std::thread::sleep(FRAME_DURATION - elapsed);
        }
    }

    info!("Simulator exiting");
}
