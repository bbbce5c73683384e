//! Top-level container bound to its own off-screen surface.
//!
//! A window owns the framebuffer every descendant draws into, its background,
//! and the vertical scroll offset (`list_y`). While it is the active window
//! it receives every touch broadcast: points are converted to window-local
//! coordinates (including the scroll offset) before reaching children, and
//! vertical drags scroll the already rendered surface without re-rendering.

use core::any::Any;
use core::ops::{Deref, DerefMut};
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;
use log::{debug, info};

use crate::framebuffer::FrameBuffer;
use crate::touch::{TouchDispatcher, TouchEventArgs, TouchGestureEventArgs};
use crate::ui::container::Container;
use crate::ui::core::{FlushQueue, ObjectId, UiContext};
use crate::ui::events::EventChannel;

/// Move samples ignored before a press becomes a drag.
pub const DEFAULT_MAX_IGNORED_TOUCH_MOVES: u32 = 1;

pub struct Window {
    container: Container,
    surface: FrameBuffer,
    pub back_color: Rgb565,
    back_image: Option<FrameBuffer>,
    list_y: i32,
    viewport: Size,
    handle_events: bool,
    moving: bool,
    ignored_touch_moves: u32,
    max_ignored_touch_moves: u32,
    last_press_y: i32,
    last_list_y: i32,
    /// Fired at the end of every full render.
    pub rendered: EventChannel<ObjectId>,
    /// Fired when the window asks to be closed.
    pub close: EventChannel<ObjectId>,
}

impl Window {
    /// Create a window with a surface of exactly `width` x `height`.
    ///
    /// The viewport defaults to the window size; the coordinator replaces it
    /// with the LCD size when the window becomes active.
    pub fn new(name: &str, width: u32, height: u32) -> Self {
        let size = Size::new(width, height);
        Self {
            container: Container::new(name, 0, 0, width, height).with_auto_height(true),
            surface: FrameBuffer::new(size),
            back_color: Rgb565::WHITE,
            back_image: None,
            list_y: 0,
            viewport: size,
            handle_events: false,
            moving: false,
            ignored_touch_moves: 0,
            max_ignored_touch_moves: DEFAULT_MAX_IGNORED_TOUCH_MOVES,
            last_press_y: 0,
            last_list_y: 0,
            rendered: EventChannel::new(),
            close: EventChannel::new(),
        }
    }

    pub fn with_back_color(mut self, color: Rgb565) -> Self {
        self.back_color = color;
        self
    }

    pub fn with_back_image(mut self, image: FrameBuffer) -> Self {
        self.back_image = Some(image);
        self
    }

    pub fn with_max_ignored_touch_moves(mut self, max: u32) -> Self {
        self.max_ignored_touch_moves = max;
        self
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn container_mut(&mut self) -> &mut Container {
        &mut self.container
    }

    pub fn id(&self) -> ObjectId {
        self.container.base.id()
    }

    pub fn surface(&self) -> &FrameBuffer {
        &self.surface
    }

    pub fn set_back_image(&mut self, image: Option<FrameBuffer>) {
        if let Some(mut old) = core::mem::replace(&mut self.back_image, image) {
            old.release();
        }
    }

    /// Current vertical scroll offset.
    pub fn list_y(&self) -> i32 {
        self.list_y
    }

    pub fn set_list_y(&mut self, list_y: i32) {
        self.list_y = list_y.clamp(0, self.list_max_y());
    }

    /// Largest valid scroll offset for the current content height.
    pub fn list_max_y(&self) -> i32 {
        (self.container.base.height as i32 - self.viewport.height as i32).max(0)
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Size) {
        self.viewport = viewport;
        self.list_y = self.list_y.clamp(0, self.list_max_y());
    }

    /// Area of the surface currently shown on screen.
    pub fn visible_area(&self) -> Rectangle {
        Rectangle::new(
            Point::new(0, self.list_y),
            Size::new(self.container.base.width, self.viewport.height),
        )
    }

    /// Where the window sits on the screen.
    pub fn screen_rect(&self) -> Rectangle {
        Rectangle::new(
            self.container.base.position(),
            Size::new(self.container.base.width, self.viewport.height),
        )
    }

    pub fn handles_events(&self) -> bool {
        self.handle_events
    }

    pub fn is_moving(&self) -> bool {
        self.moving
    }

    /// Start receiving touch broadcasts.
    pub fn handle_events(&mut self) {
        info!("Window '{}' now handles events", self.container.base.name);
        self.handle_events = true;
    }

    /// Stop receiving touch broadcasts and forget any drag in progress.
    pub fn ignore_events(&mut self) {
        info!("Window '{}' ignores events", self.container.base.name);
        self.handle_events = false;
        self.moving = false;
        self.ignored_touch_moves = 0;
    }

    /// Context rooted at the window surface, for drawing children directly.
    pub fn context<'a>(&'a mut self, flushes: &'a mut FlushQueue) -> (&'a mut Container, UiContext<'a>) {
        (&mut self.container, UiContext::new(&mut self.surface, flushes))
    }

    /// Repaint the whole surface: black, background, children.
    pub fn render(&mut self, flushes: &mut FlushQueue) {
        let size = self.container.base.size();
        if self.surface.size() != size && !self.surface.is_released() {
            self.surface.resize(size);
        }

        let area = Rectangle::new(Point::zero(), size);
        // Clearing first stops stale pixels showing through a translucent background.
        let Ok(()) = self.surface.fill_solid(&area, Rgb565::BLACK);
        let alpha = self.container.base.alpha;
        match &self.back_image {
            Some(image) => self.surface.draw_stretched(&area, image, alpha),
            None => self.surface.fill_rect_alpha(&area, self.back_color, alpha),
        }

        let (container, mut ctx) = self.context(flushes);
        container.render_children(&mut ctx);

        let mut id = self.id();
        self.rendered.emit(&mut id);
    }

    /// Render, then ask for the whole visible window to be composited.
    pub fn invalidate(&mut self, flushes: &mut FlushQueue) {
        self.render(flushes);
        flushes.push_window();
    }

    /// Repaint the background behind `rect` (window-local).
    pub fn fill_rect(&mut self, rect: &Rectangle) {
        let alpha = self.container.base.alpha;
        let Ok(()) = self.surface.fill_solid(rect, Rgb565::BLACK);
        match &self.back_image {
            Some(image) => {
                let area = Rectangle::new(Point::zero(), self.container.base.size());
                self.surface.draw_stretched_within(&area, image, alpha, rect);
            }
            None => self.surface.fill_rect_alpha(rect, self.back_color, alpha),
        }
    }

    /// Repaint the background under a direct child and invalidate it.
    /// Returns `false` if there is no such child.
    pub fn refresh_child(&mut self, name: &str, flushes: &mut FlushQueue) -> bool {
        let Some(rect) = self
            .container
            .child_by_name(name)
            .map(|c| c.base().local_rect())
        else {
            return false;
        };
        self.fill_rect(&rect);
        let (container, mut ctx) = self.context(flushes);
        if let Some(child) = container.child_by_name_mut(name)
            && child.base().visible
        {
            child.invalidate(&mut ctx);
        } else {
            ctx.request_flush(rect);
        }
        true
    }

    fn to_local(&self, point: Point) -> Point {
        point - self.container.base.position() + Point::new(0, self.list_y)
    }

    pub fn touch_down(&mut self, e: &mut TouchEventArgs, flushes: &mut FlushQueue) {
        if !self.handle_events {
            return;
        }
        self.last_press_y = e.point.y;
        self.last_list_y = self.list_y;

        e.point = self.to_local(e.point);
        let (container, mut ctx) = self.context(flushes);
        container.dispatch_touch_down(e, &mut ctx);
    }

    pub fn touch_up(&mut self, e: &mut TouchEventArgs, flushes: &mut FlushQueue) {
        if !self.handle_events {
            return;
        }
        self.moving = false;

        e.point = self.to_local(e.point);
        let (container, mut ctx) = self.context(flushes);
        container.dispatch_touch_up(e, &mut ctx);
    }

    /// Forward the move to children, then track the drag.
    ///
    /// The first `max_ignored_touch_moves` samples of a press are swallowed
    /// as jitter; the next one marks the press as moving, and every move
    /// after that scrolls to `last_list_y - (y - last_press_y)`.
    pub fn touch_move(&mut self, e: &mut TouchEventArgs, flushes: &mut FlushQueue) {
        if !self.handle_events {
            return;
        }
        let raw_y = e.point.y;

        e.point = self.to_local(e.point);
        {
            let (container, mut ctx) = self.context(flushes);
            container.dispatch_touch_move(e, &mut ctx);
        }

        if !self.moving {
            if self.ignored_touch_moves < self.max_ignored_touch_moves {
                self.ignored_touch_moves += 1;
            } else {
                self.ignored_touch_moves = 0;
                self.moving = true;
            }
        } else {
            let drag_distance = raw_y - self.last_press_y;
            let list_y = (self.last_list_y - drag_distance).clamp(0, self.list_max_y());
            if list_y != self.list_y {
                debug!(
                    " Window '{}' scrolled {} -> {}",
                    self.container.base.name, self.list_y, list_y
                );
                self.list_y = list_y;
                // The surface is already rendered; only the visible slice moves.
                flushes.push_window();
            }
        }
    }

    pub fn touch_gesture(&mut self, e: &mut TouchGestureEventArgs, flushes: &mut FlushQueue) {
        if !self.handle_events {
            return;
        }
        let (container, mut ctx) = self.context(flushes);
        container.dispatch_touch_gesture(e, &mut ctx);
    }

    /// Ask whoever owns the window to close it.
    pub fn request_close(&mut self) {
        let mut id = self.id();
        self.close.emit(&mut id);
    }

    /// Release the background image, the children and the surface.
    pub fn dispose(&mut self) {
        if let Some(mut image) = self.back_image.take() {
            image.release();
        }
        self.container.dispose_children();
        self.surface.release();
    }
}

impl Deref for Window {
    type Target = Container;

    fn deref(&self) -> &Container {
        &self.container
    }
}

impl DerefMut for Window {
    fn deref_mut(&mut self) -> &mut Container {
        &mut self.container
    }
}

/// Shared state handed to the active window for one dispatch.
pub struct DispatchContext<'a> {
    pub flushes: &'a mut FlushQueue,
    pub touch: &'a mut TouchDispatcher,
}

/// A window that can be installed as the coordinator's main window.
///
/// Plain windows use the default handlers. Windows with behaviour of their
/// own (such as the calibration wizard) wrap a [`Window`] and override the
/// hooks they need, calling back into the window for normal dispatch.
pub trait WindowView: Any {
    fn window(&self) -> &Window;

    fn window_mut(&mut self) -> &mut Window;

    fn on_touch_down(&mut self, e: &mut TouchEventArgs, cx: &mut DispatchContext<'_>) {
        self.window_mut().touch_down(e, cx.flushes);
    }

    fn on_touch_up(&mut self, e: &mut TouchEventArgs, cx: &mut DispatchContext<'_>) {
        self.window_mut().touch_up(e, cx.flushes);
    }

    fn on_touch_move(&mut self, e: &mut TouchEventArgs, cx: &mut DispatchContext<'_>) {
        self.window_mut().touch_move(e, cx.flushes);
    }

    fn on_touch_gesture(&mut self, e: &mut TouchGestureEventArgs, cx: &mut DispatchContext<'_>) {
        self.window_mut().touch_gesture(e, cx.flushes);
    }

    /// Called after the window starts handling events, before its first render.
    fn on_activate(&mut self, _cx: &mut DispatchContext<'_>) {}

    /// Called after the window stops handling events.
    fn on_deactivate(&mut self, _cx: &mut DispatchContext<'_>) {}

    fn dispose(&mut self) {
        self.window_mut().dispose();
    }
}

impl WindowView for Window {
    fn window(&self) -> &Window {
        self
    }

    fn window_mut(&mut self) -> &mut Window {
        self
    }
}
