//! On-screen calibration wizard.

use alloc::boxed::Box;
use alloc::rc::Rc;
use core::cell::Cell;
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::text::Alignment;
use log::{info, warn};

use crate::calibration::{CalibrationDevice, CalibrationError, CalibrationStep, Calibrator};
use crate::config::CalibrationConfig;
use crate::storage::SettingsStore;
use crate::touch::TouchEventArgs;
use crate::ui::components::{Button, Canvas, TextBlock};
use crate::ui::core::FlushQueue;
use crate::ui::events::Subscription;
use crate::ui::window::{DispatchContext, Window, WindowView};

const MESSAGE: &str = "message";
const RECALIBRATE: &str = "recalibrate";
const DONE: &str = "done";
const CROSSHAIR: &str = "crosshair";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Start,
    Recalibrate,
    Done,
}

/// Full-screen window that walks the user through the crosshairs.
///
/// Raw touch-up positions are recorded while a pass is running. When the
/// last point is in, the correction is installed, optionally saved, and the
/// window asks to be closed through its `close` channel.
pub struct CalibrationWindow<C, S> {
    window: Window,
    calibrator: Calibrator,
    device: C,
    store: S,
    auto_save: bool,
    commands: Rc<Cell<Option<Command>>>,
    start_prompt: Option<Subscription>,
}

impl<C, S> CalibrationWindow<C, S>
where
    C: CalibrationDevice + 'static,
    S: SettingsStore + 'static,
{
    /// Build the wizard for a screen of `size`.
    ///
    /// With `auto_start` the first crosshair is shown immediately. Otherwise
    /// the window prompts for a tap, or offers to recalibrate when the panel
    /// is `already_calibrated`.
    pub fn new(
        size: Size,
        device: C,
        store: S,
        config: &CalibrationConfig,
        already_calibrated: bool,
    ) -> Result<Self, CalibrationError> {
        let commands = Rc::new(Cell::new(None));
        let mut window = Window::new("calibrationWindow", size.width, size.height).with_back_color(Rgb565::WHITE);
        let (width, height) = (size.width as i32, size.height as i32);

        let y = height / 2 - 50;
        let message = TextBlock::new(MESSAGE, (width - 300) / 2, y, 300, 50, "").with_alignment(Alignment::Center);
        window.add_child(Box::new(message));

        let button_y = y + 55;
        let mut recalibrate = Button::new(RECALIBRATE, (width - 200) / 2, button_y, 122, 32, "Recalibrate");
        recalibrate.base.visible = false;
        let c = commands.clone();
        recalibrate.base.tap.subscribe(move |_| c.set(Some(Command::Recalibrate)));
        let done_x = recalibrate.base.x + recalibrate.base.width as i32 + 10;
        window.add_child(Box::new(recalibrate));

        let mut done = Button::new(DONE, done_x, button_y, 68, 32, "Done");
        done.base.visible = false;
        let c = commands.clone();
        done.base.tap.subscribe(move |_| c.set(Some(Command::Done)));
        window.add_child(Box::new(done));

        let mut crosshair = Canvas::new(CROSSHAIR, 0, 0, size.width, size.height);
        crosshair.base.interactive = false;
        window.add_child(Box::new(crosshair));

        let mut wizard = Self {
            window,
            calibrator: Calibrator::new(),
            device,
            store,
            auto_save: config.auto_save,
            commands,
            start_prompt: None,
        };

        if config.auto_start {
            wizard.set_message("Touch the crosshair location.", Rgb565::BLACK);
            wizard.start()?;
        } else if already_calibrated {
            wizard.set_message("Touch is already calibrated.", Rgb565::RED);
            wizard.show_buttons(true);
        } else {
            wizard.set_message("Touch the screen to start.", Rgb565::BLACK);
            let c = wizard.commands.clone();
            wizard.start_prompt = Some(wizard.window.base.tap.subscribe(move |_| c.set(Some(Command::Start))));
            wizard.calibrator.await_first_touch();
        }

        Ok(wizard)
    }

    pub fn calibrator(&self) -> &Calibrator {
        &self.calibrator
    }

    pub fn device(&self) -> &C {
        &self.device
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn message(&self) -> &str {
        self.window.get::<TextBlock>(MESSAGE).map(|t| t.text()).unwrap_or("")
    }

    fn set_message(&mut self, text: &str, color: Rgb565) {
        if let Some(message) = self.window.get_mut::<TextBlock>(MESSAGE) {
            message.set_text(text);
            message.font_color = color;
            message.base.visible = true;
        }
    }

    fn show_message(&mut self, visible: bool) {
        if let Some(message) = self.window.child_by_name_mut(MESSAGE) {
            message.base_mut().visible = visible;
        }
    }

    fn show_buttons(&mut self, visible: bool) {
        for name in [RECALIBRATE, DONE] {
            if let Some(button) = self.window.child_by_name_mut(name) {
                button.base_mut().visible = visible;
            }
        }
    }

    fn crosshair_mut(&mut self) -> Option<&mut Canvas> {
        self.window.get_mut::<Canvas>(CROSSHAIR)
    }

    fn draw_crosshair(&mut self, point: Point) {
        let Some(canvas) = self.crosshair_mut() else {
            return;
        };
        let (x, y) = (point.x, point.y);
        canvas.clear();
        canvas.draw_line(Rgb565::RED, 1, x - 10, y, x - 2, y);
        canvas.draw_line(Rgb565::RED, 1, x + 10, y, x + 2, y);
        canvas.draw_line(Rgb565::RED, 1, x, y - 10, x, y - 2);
        canvas.draw_line(Rgb565::RED, 1, x, y + 10, x, y + 2);
    }

    /// Begin a pass and show the first crosshair. The caller redraws.
    fn start(&mut self) -> Result<(), CalibrationError> {
        let first = self.calibrator.begin(&mut self.device)?;
        self.show_message(false);
        self.show_buttons(false);
        self.draw_crosshair(first);
        Ok(())
    }

    fn restart(&mut self, flushes: &mut FlushQueue) {
        if let Err(e) = self.start() {
            warn!("Cannot start calibration: {}", e);
            self.set_message("Calibration is not available.", Rgb565::RED);
        }
        self.window.invalidate(flushes);
    }

    fn record(&mut self, raw: Point, cx: &mut DispatchContext<'_>) {
        match self.calibrator.record(raw, &mut self.device) {
            Ok(CalibrationStep::Next(point)) => {
                self.draw_crosshair(point);
                self.window.invalidate(cx.flushes);
            }
            Ok(CalibrationStep::Complete) => self.finish(cx),
            Ok(CalibrationStep::Ignored) => {}
            Err(e) => {
                warn!("Calibration failed: {}", e);
                if let Some(canvas) = self.crosshair_mut() {
                    canvas.clear();
                }
                // Take the panel out of raw mode again.
                let reverted = cx.touch.revert_calibration(&mut self.device).unwrap_or(false);
                let text = if reverted {
                    "Calibration failed. Previous settings kept."
                } else {
                    "Calibration failed."
                };
                self.set_message(text, Rgb565::RED);
                self.show_buttons(true);
                self.window.invalidate(cx.flushes);
            }
        }
    }

    fn finish(&mut self, cx: &mut DispatchContext<'_>) {
        let Some(settings) = self.calibrator.settings().cloned() else {
            return;
        };
        if let Some(canvas) = self.crosshair_mut() {
            canvas.clear();
        }
        cx.touch.install_calibration(settings.clone());

        let text = if !self.auto_save {
            "Calibration set but not saved."
        } else {
            match cx.touch.save_calibration(&mut self.store, &settings) {
                Ok(()) => "Calibration set and saved.",
                Err(e) => {
                    warn!("Failed to save calibration: {}", e);
                    "Calibration set but saving failed."
                }
            }
        };
        info!("{}", text);
        self.set_message(text, Rgb565::BLUE);
        self.show_buttons(true);
        self.window.invalidate(cx.flushes);
        self.window.request_close();
    }

    /// Reinstall the last saved calibration and report the outcome on screen.
    pub fn revert(&mut self, cx: &mut DispatchContext<'_>) -> Result<bool, CalibrationError> {
        let reverted = cx.touch.revert_calibration(&mut self.device)?;
        let text = if reverted {
            "Calibration reverted to previous settings."
        } else {
            "Calibration remains set. Cannot revert; previous settings do not exist."
        };
        self.set_message(text, Rgb565::BLUE);
        self.window.refresh_child(MESSAGE, cx.flushes);
        Ok(reverted)
    }

    fn apply_pending(&mut self, cx: &mut DispatchContext<'_>) {
        match self.commands.take() {
            Some(Command::Start) => {
                if let Some(prompt) = self.start_prompt.take() {
                    self.window.base.tap.unsubscribe(prompt);
                }
                self.restart(cx.flushes);
            }
            Some(Command::Recalibrate) => self.restart(cx.flushes),
            Some(Command::Done) => {
                self.window.request_close();
                if cx.touch.is_calibrated() {
                    self.set_message("Touch is already calibrated.", Rgb565::RED);
                    self.window.refresh_child(MESSAGE, cx.flushes);
                }
            }
            None => {}
        }
    }
}

impl<C, S> WindowView for CalibrationWindow<C, S>
where
    C: CalibrationDevice + 'static,
    S: SettingsStore + 'static,
{
    fn window(&self) -> &Window {
        &self.window
    }

    fn window_mut(&mut self) -> &mut Window {
        &mut self.window
    }

    fn on_touch_up(&mut self, e: &mut TouchEventArgs, cx: &mut DispatchContext<'_>) {
        if self.window.handles_events() && self.calibrator.is_calibrating() {
            self.record(e.point, cx);
        }
        self.window.touch_up(e, cx.flushes);
        self.apply_pending(cx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::CalibrationState;
    use crate::calibration::tests::MockDevice;
    use crate::storage::MemoryStore;
    use crate::touch::TouchDispatcher;
    use crate::ui::core::PendingFlush;
    use alloc::vec;

    const SCREEN: Size = Size::new(320, 240);

    fn tap(wizard: &mut CalibrationWindow<MockDevice, MemoryStore>, point: Point, cx: &mut DispatchContext<'_>) {
        wizard.on_touch_down(&mut TouchEventArgs::new(point), cx);
        wizard.on_touch_up(&mut TouchEventArgs::new(point), cx);
    }

    #[test]
    fn test_auto_start_records_three_points_and_saves() {
        let config = CalibrationConfig {
            auto_start: true,
            auto_save: true,
        };
        let mut wizard =
            CalibrationWindow::new(SCREEN, MockDevice::three_point(), MemoryStore::new(), &config, false).unwrap();
        wizard.window_mut().handle_events();
        let closed = Rc::new(Cell::new(false));
        let flag = closed.clone();
        wizard.window_mut().close.subscribe(move |_| flag.set(true));

        let mut flushes = FlushQueue::new();
        let mut touch = TouchDispatcher::new();
        let mut cx = DispatchContext {
            flushes: &mut flushes,
            touch: &mut touch,
        };

        assert_eq!(wizard.calibrator().state(), CalibrationState::Calibrating { index: 0 });
        tap(&mut wizard, Point::new(10, 10), &mut cx);
        tap(&mut wizard, Point::new(300, 10), &mut cx);
        assert!(!closed.get());
        tap(&mut wizard, Point::new(150, 290), &mut cx);

        assert!(closed.get());
        assert_eq!(wizard.device().installed.len(), 1);
        assert_eq!(wizard.device().installed[0].cx, vec![10, 300, 150]);
        assert_eq!(wizard.device().installed[0].cy, vec![10, 10, 290]);
        assert!(cx.touch.is_calibrated());
        assert!(wizard.store().bytes().is_some());
        assert_eq!(wizard.message(), "Calibration set and saved.");
        assert_eq!(cx.flushes.take(), PendingFlush::Window);
    }

    #[test]
    fn test_prompt_waits_for_first_tap() {
        let config = CalibrationConfig::default();
        let mut wizard =
            CalibrationWindow::new(SCREEN, MockDevice::three_point(), MemoryStore::new(), &config, false).unwrap();
        wizard.window_mut().handle_events();
        assert_eq!(wizard.calibrator().state(), CalibrationState::AwaitingFirstTouch);
        assert_eq!(wizard.message(), "Touch the screen to start.");

        let mut flushes = FlushQueue::new();
        let mut touch = TouchDispatcher::new();
        let mut cx = DispatchContext {
            flushes: &mut flushes,
            touch: &mut touch,
        };

        // The starting tap is not recorded as a sample.
        tap(&mut wizard, Point::new(5, 5), &mut cx);
        assert_eq!(wizard.calibrator().state(), CalibrationState::Calibrating { index: 0 });
        assert_eq!(wizard.device().starts, 1);

        tap(&mut wizard, Point::new(12, 14), &mut cx);
        assert_eq!(wizard.calibrator().state(), CalibrationState::Calibrating { index: 1 });
        assert_eq!(wizard.calibrator().settings().map(|s| s.cx[0]), Some(12));
        assert!(!wizard.window().base.tap.has_subscribers());
    }

    #[test]
    fn test_already_calibrated_offers_recalibration() {
        let config = CalibrationConfig::default();
        let mut wizard =
            CalibrationWindow::new(SCREEN, MockDevice::three_point(), MemoryStore::new(), &config, true).unwrap();
        wizard.window_mut().handle_events();
        assert_eq!(wizard.message(), "Touch is already calibrated.");
        assert_eq!(wizard.calibrator().state(), CalibrationState::Idle);

        let mut flushes = FlushQueue::new();
        let mut touch = TouchDispatcher::new();
        let mut cx = DispatchContext {
            flushes: &mut flushes,
            touch: &mut touch,
        };

        // Recalibrate button: x = (320 - 200) / 2 = 60, y = 120 - 50 + 55 = 125.
        tap(&mut wizard, Point::new(70, 130), &mut cx);
        assert_eq!(wizard.calibrator().state(), CalibrationState::Calibrating { index: 0 });
    }

    #[test]
    fn test_revert_without_saved_settings_reports_it() {
        let config = CalibrationConfig::default();
        let mut wizard =
            CalibrationWindow::new(SCREEN, MockDevice::three_point(), MemoryStore::new(), &config, true).unwrap();
        let mut flushes = FlushQueue::new();
        let mut touch = TouchDispatcher::new();
        let mut cx = DispatchContext {
            flushes: &mut flushes,
            touch: &mut touch,
        };
        assert_eq!(wizard.revert(&mut cx), Ok(false));
        assert!(wizard.message().starts_with("Calibration remains set."));
    }
}
