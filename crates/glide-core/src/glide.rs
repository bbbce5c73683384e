//! The coordinator tying windows, touch dispatch and the LCD together.
//!
//! [`Glide`] owns the single physical screen, the touch dispatcher, the
//! active ("main") window and the state of any open modal. Every touch goes
//! through [`Glide::raise`], which dispatches to the main window and then
//! drains the flush requests the dispatch produced.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::any::Any;
use core::ops::ControlFlow;
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;
use embedded_hal_async::delay::DelayNs;
use log::{debug, info, warn};

use crate::calibration::{CalibrationDevice, CalibrationError};
use crate::config::GlideConfig;
use crate::modal::{ModalKind, ModalResult, ModalSession};
use crate::screen::Screen;
use crate::storage::SettingsStore;
use crate::touch::{CancelToken, RawTouch, TouchDispatcher, TouchInput, TouchPanel, TouchPoller};
use crate::ui::core::{DisplayObject, FlushQueue, ObjectId, PendingFlush, overlaps};
use crate::ui::window::{DispatchContext, Window, WindowView};

/// Errors returned by the coordinator
#[derive(Debug)]
pub enum Error<E> {
    /// The display rejected a flush
    Display(E),
    /// A modal of this kind is already showing
    ModalAlreadyOpen(ModalKind),
    /// The operation needs a main window and none is set
    NoMainWindow,
    /// Loading or installing a calibration failed
    Calibration(CalibrationError),
}

impl<E> From<E> for Error<E> {
    fn from(e: E) -> Self {
        Self::Display(e)
    }
}

struct OpenModal {
    kind: ModalKind,
    overlay: ObjectId,
    /// `interactive` flags of the window's children before the modal opened
    saved: Vec<(ObjectId, bool)>,
}

impl OpenModal {
    /// Take the overlay off `window` and give its children their
    /// interactivity back.
    fn dismiss(self, window: &mut Window) -> Option<Box<dyn DisplayObject>> {
        let overlay = window.remove_child(self.overlay);
        for (id, interactive) in self.saved {
            if let Some(index) = window.index_of(id)
                && let Some(child) = window.child_at_mut(index)
            {
                child.base_mut().interactive = interactive;
            }
        }
        debug!(" Closed {:?}", self.kind);
        overlay
    }
}

pub struct Glide<D>
where
    D: DrawTarget<Color = Rgb565>,
{
    screen: Screen<D>,
    touch: TouchDispatcher,
    main_window: Option<Box<dyn WindowView>>,
    modals: Vec<OpenModal>,
    flushes: FlushQueue,
    config: GlideConfig,
}

impl<D> Glide<D>
where
    D: DrawTarget<Color = Rgb565>,
{
    pub fn new(display: D, config: GlideConfig) -> Self {
        let screen = Screen::new(display);
        info!("Glide started on {}x{} LCD", screen.size().width, screen.size().height);
        Self {
            screen,
            touch: TouchDispatcher::new(),
            main_window: None,
            modals: Vec::new(),
            flushes: FlushQueue::new(),
            config,
        }
    }

    pub fn lcd_size(&self) -> Size {
        self.screen.size()
    }

    pub fn config(&self) -> &GlideConfig {
        &self.config
    }

    pub fn touch(&self) -> &TouchDispatcher {
        &self.touch
    }

    pub fn touch_mut(&mut self) -> &mut TouchDispatcher {
        &mut self.touch
    }

    pub fn screen(&self) -> &Screen<D> {
        &self.screen
    }

    pub fn display(&self) -> &D {
        self.screen.display()
    }

    pub fn display_mut(&mut self) -> &mut D {
        self.screen.display_mut()
    }

    /// Install a saved calibration at startup, if one exists.
    pub fn init_touch<S, C>(&mut self, store: &mut S, device: &mut C) -> Result<bool, Error<D::Error>>
    where
        S: SettingsStore,
        C: CalibrationDevice,
    {
        self.touch.load_calibration(store, device).map_err(Error::Calibration)
    }

    /// A window sized `width` x `height` using the configured drag filter.
    pub fn create_window(&self, name: &str, width: u32, height: u32) -> Window {
        Window::new(name, width, height).with_max_ignored_touch_moves(self.config.touch.max_ignored_touch_moves)
    }

    // ------------------------------------------------------------------------
    // Main window
    // ------------------------------------------------------------------------

    /// Make `window` the active window and draw it.
    ///
    /// The previous window stops handling events before the new one starts,
    /// and is handed back so the caller can keep it around (for a transition
    /// or to show it again later).
    pub fn set_main_window(
        &mut self,
        window: Box<dyn WindowView>,
    ) -> Result<Option<Box<dyn WindowView>>, Error<D::Error>> {
        let previous = self.take_main_window();

        let mut window = window;
        window.window_mut().set_viewport(self.screen.size());
        window.window_mut().handle_events();
        {
            let mut cx = DispatchContext {
                flushes: &mut self.flushes,
                touch: &mut self.touch,
            };
            window.on_activate(&mut cx);
        }
        info!("Main window is now '{}'", window.window().base.name);
        self.main_window = Some(window);

        self.invalidate()?;
        Ok(previous)
    }

    /// Deactivate and remove the main window without replacing it.
    ///
    /// Open modals belong to the outgoing window and are closed first, so
    /// the window comes back without overlays and the next window gets
    /// normal dispatch.
    pub fn take_main_window(&mut self) -> Option<Box<dyn WindowView>> {
        let mut window = self.main_window.take()?;
        let mut suppressed = false;
        for modal in self.modals.drain(..).rev() {
            suppressed |= modal.kind.suppresses_dispatch();
            let _ = modal.dismiss(window.window_mut());
        }
        if suppressed {
            self.touch.set_ignore_all_events(false);
        }

        window.window_mut().ignore_events();
        let mut cx = DispatchContext {
            flushes: &mut self.flushes,
            touch: &mut self.touch,
        };
        window.on_deactivate(&mut cx);
        // Requests from the old window must not be composited from the new one.
        let _ = self.flushes.take();
        Some(window)
    }

    pub fn main_window(&self) -> Option<&dyn WindowView> {
        self.main_window.as_deref()
    }

    pub fn main_window_mut(&mut self) -> Option<&mut (dyn WindowView + 'static)> {
        self.main_window.as_deref_mut()
    }

    /// The main window as its concrete type.
    pub fn main_window_as<T: WindowView>(&self) -> Option<&T> {
        let view: &dyn Any = self.main_window.as_deref()?;
        view.downcast_ref::<T>()
    }

    pub fn main_window_as_mut<T: WindowView>(&mut self) -> Option<&mut T> {
        let view: &mut dyn Any = self.main_window.as_deref_mut()?;
        view.downcast_mut::<T>()
    }

    // ------------------------------------------------------------------------
    // Drawing
    // ------------------------------------------------------------------------

    /// Render the main window and push its visible part to the LCD.
    pub fn invalidate(&mut self) -> Result<(), Error<D::Error>> {
        let Some(window) = self.main_window.as_mut() else {
            return Err(Error::NoMainWindow);
        };
        window.window_mut().render(&mut self.flushes);
        self.flushes.push_window();
        self.drain_flushes()
    }

    /// Copy the visible slice of the main window to the screen and flush it.
    fn composite_window(&mut self) -> Result<(), Error<D::Error>> {
        let Some(view) = self.main_window.as_ref() else {
            return Ok(());
        };
        let window = view.window();
        self.screen
            .compose(window.screen_rect().top_left, window.surface(), &window.visible_area());
        self.screen.flush()?;
        Ok(())
    }

    /// Push `rect` (main-window coordinates, including scroll) to the LCD.
    ///
    /// Ignored when there is no main window. Only the part inside the
    /// window's viewport is composited, and nothing reaches the display when
    /// the rectangle is scrolled out of view.
    pub fn flush_rect(&mut self, rect: &Rectangle) -> Result<(), Error<D::Error>> {
        let Some(view) = self.main_window.as_ref() else {
            return Ok(());
        };
        let window = view.window();
        let visible = window.visible_area();
        if !overlaps(rect, &visible) {
            debug!(" Skipping flush of off-screen area {:?}", rect);
            return Ok(());
        }
        let source = rect.intersection(&visible);
        let dest = window.screen_rect().top_left + Point::new(source.top_left.x, source.top_left.y - window.list_y());

        self.screen.compose(dest, window.surface(), &source);
        self.screen.flush_area(&Rectangle::new(dest, source.size))?;
        Ok(())
    }

    fn drain_flushes(&mut self) -> Result<(), Error<D::Error>> {
        match self.flushes.take() {
            PendingFlush::Nothing => Ok(()),
            PendingFlush::Window => self.composite_window(),
            PendingFlush::Areas(areas) => {
                for area in areas.iter() {
                    self.flush_rect(area)?;
                }
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------------
    // Touch
    // ------------------------------------------------------------------------

    /// Normalize a controller sample and dispatch it.
    ///
    /// Returns `false` when the sample was dropped (a repeated move, or
    /// dispatch is switched off while a message box is open).
    pub fn handle_raw_touch(&mut self, raw: RawTouch) -> Result<bool, Error<D::Error>> {
        let Some(input) = self.touch.normalize(raw) else {
            return Ok(false);
        };
        self.raise(input)?;
        Ok(true)
    }

    /// Dispatch an event directly, bypassing normalization and the
    /// ignore-all switch. Modal poll loops inject their samples here.
    ///
    /// The main window sees the event first; other subscribers of the
    /// dispatcher then receive it as it arrived.
    pub fn raise(&mut self, input: TouchInput) -> Result<(), Error<D::Error>> {
        let mut broadcast = input;
        let mut input = input;

        if let Some(window) = self.main_window.as_mut()
            && window.window().handles_events()
        {
            let mut cx = DispatchContext {
                flushes: &mut self.flushes,
                touch: &mut self.touch,
            };
            match &mut input {
                TouchInput::Down(e) => window.on_touch_down(e, &mut cx),
                TouchInput::Up(e) => window.on_touch_up(e, &mut cx),
                TouchInput::Move(e) => window.on_touch_move(e, &mut cx),
                TouchInput::Gesture(e) => window.on_touch_gesture(e, &mut cx),
            }
        }
        self.touch.broadcast(&mut broadcast);

        self.drain_flushes()
    }

    // ------------------------------------------------------------------------
    // Modals
    // ------------------------------------------------------------------------

    pub fn is_modal_open(&self, kind: ModalKind) -> bool {
        self.modals.iter().any(|m| m.kind == kind)
    }

    /// Show `overlay` on top of the main window.
    ///
    /// Every existing child of the window is made non-interactive until the
    /// modal closes. A message box also switches normal dispatch off; its
    /// touches must then be fed through [`Glide::raise`] (see
    /// [`Glide::run_modal`]).
    pub fn open_modal(&mut self, kind: ModalKind, overlay: Box<dyn DisplayObject>) -> Result<ObjectId, Error<D::Error>> {
        if self.is_modal_open(kind) {
            warn!("{:?} is already open", kind);
            return Err(Error::ModalAlreadyOpen(kind));
        }
        let Some(view) = self.main_window.as_mut() else {
            return Err(Error::NoMainWindow);
        };

        let window = view.window_mut();
        let saved = window
            .children()
            .map(|child| (child.base().id(), child.base().interactive))
            .collect();
        window.set_children_interactive(false);
        let overlay = window.add_child(overlay);

        self.modals.push(OpenModal { kind, overlay, saved });
        if kind.suppresses_dispatch() {
            self.touch.set_ignore_all_events(true);
        }
        debug!(" Opened {:?}", kind);

        self.invalidate()?;
        Ok(overlay)
    }

    /// Remove the overlay of an open modal and give it back.
    ///
    /// Returns `Ok(None)` when no modal of that kind is open.
    pub fn close_modal(&mut self, kind: ModalKind) -> Result<Option<Box<dyn DisplayObject>>, Error<D::Error>> {
        let Some(index) = self.modals.iter().position(|m| m.kind == kind) else {
            return Ok(None);
        };
        let modal = self.modals.remove(index);
        if kind.suppresses_dispatch() && !self.modals.iter().any(|m| m.kind.suppresses_dispatch()) {
            self.touch.set_ignore_all_events(false);
        }

        let Some(view) = self.main_window.as_mut() else {
            return Ok(None);
        };
        let overlay = modal.dismiss(view.window_mut());

        self.invalidate()?;
        Ok(overlay)
    }

    /// Poll `panel` on behalf of an open modal until `session` completes.
    ///
    /// Samples are injected with [`Glide::raise`], so the overlay's buttons
    /// keep working while normal dispatch is switched off. A display error
    /// ends the loop early.
    pub async fn run_modal<P, Dl>(
        &mut self,
        panel: &mut P,
        delay: &mut Dl,
        session: &ModalSession,
    ) -> Result<ModalResult, Error<D::Error>>
    where
        P: TouchPanel,
        Dl: DelayNs,
    {
        let touch = &self.config.touch;
        let mut poller = TouchPoller::new(self.screen.size(), touch.jitter_threshold, touch.modal_poll_interval());
        let mut failure = None;

        poller
            .run(panel, delay, session.cancel_token(), |input| match self.raise(input) {
                Ok(()) => ControlFlow::Continue(()),
                Err(e) => {
                    failure = Some(e);
                    ControlFlow::Break(())
                }
            })
            .await;

        if let Some(e) = failure {
            return Err(e);
        }
        Ok(session.wait().await)
    }

    /// Follow a finger that is dragging a slider thumb or similar control.
    ///
    /// Normal dispatch is switched off while the drag lasts; the panel is
    /// polled at the drag interval and every sample goes through
    /// [`Glide::raise`]. Returns after the release has been raised, or
    /// when `cancel` fires.
    pub async fn run_drag<P, Dl>(
        &mut self,
        panel: &mut P,
        delay: &mut Dl,
        cancel: &CancelToken,
    ) -> Result<(), Error<D::Error>>
    where
        P: TouchPanel,
        Dl: DelayNs,
    {
        let touch = &self.config.touch;
        let mut poller = TouchPoller::new(self.screen.size(), touch.jitter_threshold, touch.drag_poll_interval());
        let was_ignoring = self.touch.ignore_all_events();
        self.touch.set_ignore_all_events(true);
        let mut result = Ok(());

        poller
            .run(panel, delay, cancel, |input| {
                let released = matches!(input, TouchInput::Up(_));
                match self.raise(input) {
                    Ok(()) if released => ControlFlow::Break(()),
                    Ok(()) => ControlFlow::Continue(()),
                    Err(e) => {
                        result = Err(e);
                        ControlFlow::Break(())
                    }
                }
            })
            .await;

        self.touch.set_ignore_all_events(was_ignoring);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::tests::MockDevice;
    use crate::storage::MemoryStore;
    use crate::touch::TouchEventArgs;
    use crate::ui::components::Button;
    use alloc::rc::Rc;
    use alloc::vec;
    use core::cell::Cell;
    use core::convert::Infallible;
    use embedded_graphics::Pixel;

    struct MockDisplay {
        size: Size,
        pushed: Vec<Rectangle>,
    }

    impl MockDisplay {
        fn new() -> Self {
            Self {
                size: Size::new(320, 240),
                pushed: Vec::new(),
            }
        }
    }

    impl OriginDimensions for MockDisplay {
        fn size(&self) -> Size {
            self.size
        }
    }

    impl DrawTarget for MockDisplay {
        type Color = Rgb565;
        type Error = Infallible;

        fn draw_iter<I>(&mut self, _pixels: I) -> Result<(), Self::Error>
        where
            I: IntoIterator<Item = Pixel<Self::Color>>,
        {
            Ok(())
        }

        fn fill_contiguous<I>(&mut self, area: &Rectangle, colors: I) -> Result<(), Self::Error>
        where
            I: IntoIterator<Item = Self::Color>,
        {
            self.pushed.push(*area);
            colors.into_iter().for_each(drop);
            Ok(())
        }
    }

    fn rect(x: i32, y: i32, w: u32, h: u32) -> Rectangle {
        Rectangle::new(Point::new(x, y), Size::new(w, h))
    }

    fn glide() -> Glide<MockDisplay> {
        Glide::new(MockDisplay::new(), GlideConfig::default())
    }

    /// 320x480 window with a button well below the first screenful.
    fn tall_window() -> Box<Window> {
        let mut window = Window::new("list", 320, 240);
        window.add_child(Box::new(Button::new("top", 0, 10, 100, 20, "Top")));
        window.add_child(Box::new(Button::new("low", 0, 150, 100, 20, "Low")));
        window.add_child(Box::new(Button::new("end", 0, 460, 100, 20, "End")));
        Box::new(window)
    }

    #[test]
    fn test_set_main_window_activates_and_flushes() {
        let mut glide = glide();
        assert!(glide.set_main_window(Box::new(Window::new("first", 320, 240))).unwrap().is_none());
        assert_eq!(glide.display().pushed, vec![rect(0, 0, 320, 240)]);

        let previous = glide.set_main_window(tall_window()).unwrap().unwrap();
        assert!(!previous.window().handles_events());
        assert_eq!(previous.window().base.name, "first");

        let active = glide.main_window().unwrap().window();
        assert!(active.handles_events());
        assert_eq!(active.viewport(), Size::new(320, 240));
        assert_eq!(active.list_max_y(), 240);
    }

    #[test]
    fn test_invalidate_without_window_is_an_error() {
        let mut glide = glide();
        assert!(matches!(glide.invalidate(), Err(Error::NoMainWindow)));
        // Flushing without a window is silently ignored.
        assert!(glide.flush_rect(&rect(0, 0, 10, 10)).is_ok());
    }

    #[test]
    fn test_flush_rect_accounts_for_scroll() {
        let mut glide = glide();
        glide.set_main_window(tall_window()).unwrap();
        glide.main_window_mut().unwrap().window_mut().set_list_y(100);
        glide.display_mut().pushed.clear();

        glide.flush_rect(&rect(0, 150, 100, 20)).unwrap();
        assert_eq!(glide.display().pushed, vec![rect(0, 50, 100, 20)]);

        // Content at y=460 is below the viewport (100..340).
        glide.flush_rect(&rect(0, 460, 100, 20)).unwrap();
        assert_eq!(glide.display().pushed.len(), 1);
    }

    #[test]
    fn test_button_press_flushes_its_rect() {
        let mut glide = glide();
        glide.set_main_window(tall_window()).unwrap();
        glide.display_mut().pushed.clear();

        assert!(glide.handle_raw_touch(RawTouch::Down(Point::new(10, 15))).unwrap());
        assert_eq!(glide.display().pushed, vec![rect(0, 10, 100, 20)]);
    }

    #[test]
    fn test_drag_scrolls_the_main_window() {
        let mut glide = glide();
        glide.set_main_window(tall_window()).unwrap();

        glide.handle_raw_touch(RawTouch::Down(Point::new(200, 200))).unwrap();
        glide.handle_raw_touch(RawTouch::Move(Point::new(200, 190))).unwrap();
        glide.handle_raw_touch(RawTouch::Move(Point::new(200, 180))).unwrap();
        glide.handle_raw_touch(RawTouch::Move(Point::new(200, 100))).unwrap();
        // Repeated identical move is dropped before reaching the window.
        assert!(!glide.handle_raw_touch(RawTouch::Move(Point::new(200, 100))).unwrap());
        glide.handle_raw_touch(RawTouch::Up(Point::new(200, 100))).unwrap();

        assert_eq!(glide.main_window().unwrap().window().list_y(), 100);
    }

    #[test]
    fn test_other_subscribers_get_the_raw_point() {
        let mut glide = glide();
        glide.set_main_window(tall_window()).unwrap();
        glide.main_window_mut().unwrap().window_mut().set_list_y(50);

        let seen = Rc::new(Cell::new(Point::zero()));
        let s = seen.clone();
        glide
            .touch_mut()
            .touch_down
            .subscribe(move |e: &mut TouchEventArgs| s.set(e.point));
        glide.handle_raw_touch(RawTouch::Down(Point::new(5, 5))).unwrap();
        assert_eq!(seen.get(), Point::new(5, 5));
    }

    #[test]
    fn test_modal_kind_opens_once_and_restores_interactivity() {
        let mut glide = glide();
        let mut window = Window::new("main", 320, 240);
        let mut disabled = Button::new("static", 0, 0, 50, 20, "x");
        disabled.base.interactive = false;
        window.add_child(Box::new(disabled));
        window.add_child(Box::new(Button::new("ok", 0, 30, 50, 20, "OK")));
        glide.set_main_window(Box::new(window)).unwrap();

        glide
            .open_modal(ModalKind::MessageBox, Box::new(Button::new("box", 60, 60, 200, 100, "?")))
            .unwrap();
        assert!(glide.touch().ignore_all_events());
        assert!(matches!(
            glide.open_modal(ModalKind::MessageBox, Box::new(Button::new("again", 0, 0, 1, 1, ""))),
            Err(Error::ModalAlreadyOpen(ModalKind::MessageBox))
        ));
        {
            let window = glide.main_window().unwrap().window();
            assert_eq!(window.num_children(), 3);
            assert!(!window.child_by_name("ok").unwrap().base().interactive);
            assert!(window.child_by_name("box").unwrap().base().interactive);
        }
        assert!(!glide.handle_raw_touch(RawTouch::Down(Point::new(10, 40))).unwrap());

        let overlay = glide.close_modal(ModalKind::MessageBox).unwrap().unwrap();
        assert_eq!(overlay.base().name, "box");
        assert!(!glide.touch().ignore_all_events());
        let window = glide.main_window().unwrap().window();
        assert_eq!(window.num_children(), 2);
        assert!(window.child_by_name("ok").unwrap().base().interactive);
        assert!(!window.child_by_name("static").unwrap().base().interactive);
        assert!(glide.close_modal(ModalKind::MessageBox).unwrap().is_none());
    }

    #[test]
    fn test_window_swap_closes_open_modals() {
        let mut glide = glide();
        let mut first = Window::new("first", 320, 240);
        first.add_child(Box::new(Button::new("old", 0, 0, 100, 40, "Old")));
        glide.set_main_window(Box::new(first)).unwrap();
        glide
            .open_modal(ModalKind::MessageBox, Box::new(Button::new("box", 60, 60, 200, 100, "?")))
            .unwrap();

        let taps = Rc::new(Cell::new(0));
        let t = taps.clone();
        let mut next = Window::new("next", 320, 240);
        let mut button = Button::new("go", 0, 0, 100, 40, "Go");
        button.base.tap.subscribe(move |_| t.set(t.get() + 1));
        next.add_child(Box::new(button));

        let previous = glide.set_main_window(Box::new(next)).unwrap().unwrap();
        assert!(!glide.is_modal_open(ModalKind::MessageBox));
        assert!(!glide.touch().ignore_all_events());
        let previous = previous.window();
        assert_eq!(previous.num_children(), 1);
        assert!(previous.child_by_name("old").unwrap().base().interactive);

        assert!(glide.handle_raw_touch(RawTouch::Down(Point::new(10, 10))).unwrap());
        assert!(glide.handle_raw_touch(RawTouch::Up(Point::new(10, 10))).unwrap());
        assert_eq!(taps.get(), 1);
    }

    #[test]
    fn test_take_main_window_keeps_manual_ignore_switch() {
        let mut glide = glide();
        glide.set_main_window(tall_window()).unwrap();
        glide.open_modal(ModalKind::List, Box::new(Button::new("list", 0, 0, 100, 100, ""))).unwrap();
        glide.touch_mut().set_ignore_all_events(true);

        let window = glide.take_main_window().unwrap();
        assert_eq!(window.window().num_children(), 3);
        assert!(glide.touch().ignore_all_events());
    }

    #[test]
    fn test_list_modal_keeps_dispatch_enabled() {
        let mut glide = glide();
        glide.set_main_window(tall_window()).unwrap();
        glide
            .open_modal(ModalKind::List, Box::new(Button::new("list", 0, 0, 100, 100, "")))
            .unwrap();
        assert!(!glide.touch().ignore_all_events());
        assert!(glide.is_modal_open(ModalKind::List));
    }

    struct ScriptedPanel {
        samples: Vec<Point>,
        next: usize,
    }

    impl TouchPanel for ScriptedPanel {
        fn last_touch_point(&mut self) -> Point {
            let point = self.samples.get(self.next).copied().unwrap_or(Point::new(-1, -1));
            self.next += 1;
            point
        }
    }

    struct NoDelay;

    impl DelayNs for NoDelay {
        async fn delay_ns(&mut self, _ns: u32) {}
    }

    /// Returns immediately but remembers every requested delay.
    #[derive(Default)]
    struct RecordingDelay {
        requested_ns: Vec<u32>,
    }

    impl DelayNs for RecordingDelay {
        async fn delay_ns(&mut self, ns: u32) {
            self.requested_ns.push(ns);
        }
    }

    #[test]
    fn test_run_modal_drives_overlay_buttons() {
        let mut glide = glide();
        glide.set_main_window(Box::new(Window::new("main", 320, 240))).unwrap();

        let session = Rc::new(ModalSession::new());
        let mut ok = Button::new("ok", 100, 100, 60, 30, "OK");
        let s = session.clone();
        ok.base.tap.subscribe(move |_| s.complete(ModalResult::Ok));
        glide.open_modal(ModalKind::MessageBox, Box::new(ok)).unwrap();

        let mut panel = ScriptedPanel {
            samples: vec![Point::new(110, 110), Point::new(-1, -1), Point::new(5, 5)],
            next: 0,
        };
        let mut delay = RecordingDelay::default();
        let result = embassy_futures::block_on(glide.run_modal(&mut panel, &mut delay, &session)).unwrap();

        assert_eq!(result, ModalResult::Ok);
        assert_eq!(panel.next, 2);
        // Polled at the configured modal interval.
        assert!(!delay.requested_ns.is_empty());
        assert!(delay.requested_ns.iter().all(|&ns| ns == 50_000_000));
    }

    #[test]
    fn test_run_drag_scrolls_until_release() {
        let mut glide = glide();
        glide.set_main_window(tall_window()).unwrap();

        let mut panel = ScriptedPanel {
            samples: vec![
                Point::new(200, 200),
                Point::new(200, 190),
                Point::new(200, 180),
                Point::new(200, 100),
                Point::new(-1, -1),
                Point::new(200, 200),
            ],
            next: 0,
        };
        let cancel = CancelToken::new();
        let mut delay = RecordingDelay::default();
        embassy_futures::block_on(glide.run_drag(&mut panel, &mut delay, &cancel)).unwrap();

        assert_eq!(glide.main_window().unwrap().window().list_y(), 100);
        assert_eq!(panel.next, 5);
        assert!(delay.requested_ns.iter().all(|&ns| ns == 30_000_000));
        assert!(!glide.touch().ignore_all_events());
    }

    #[test]
    fn test_cancelled_drag_never_polls() {
        let mut glide = glide();
        glide.set_main_window(tall_window()).unwrap();
        let mut panel = ScriptedPanel {
            samples: vec![Point::new(200, 200)],
            next: 0,
        };
        let cancel = CancelToken::new();
        cancel.cancel();

        embassy_futures::block_on(glide.run_drag(&mut panel, &mut NoDelay, &cancel)).unwrap();
        assert_eq!(panel.next, 0);
    }

    #[test]
    fn test_init_touch_loads_saved_calibration() {
        let mut glide = glide();
        let mut store = MemoryStore::new();
        store.save(&MockDevice::sample_settings()).unwrap();
        let mut device = MockDevice::three_point();

        assert!(glide.init_touch(&mut store, &mut device).unwrap());
        assert!(glide.touch().is_calibrated());
    }
}
