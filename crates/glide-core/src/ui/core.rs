//! Core scene-graph types: object identity, the display object contract and
//! the context every render and touch pass runs in.

use alloc::boxed::Box;
use alloc::string::String;
use core::any::Any;
use core::cell::Cell;
use critical_section::Mutex;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;

use crate::framebuffer::{Blended, FrameBuffer};
use crate::touch::{TouchEventArgs, TouchGestureEventArgs};
use crate::ui::container::Container;
use crate::ui::events::{EventChannel, TapEventArgs};

/// Maximum number of distinct rectangles queued before they are merged.
const FLUSH_QUEUE_CAPACITY: usize = 8;

static NEXT_OBJECT_ID: Mutex<Cell<u32>> = Mutex::new(Cell::new(1));

/// Process-unique identity of a display object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u32);

impl ObjectId {
    pub fn next() -> Self {
        critical_section::with(|cs| {
            let counter = NEXT_OBJECT_ID.borrow(cs);
            let id = counter.get();
            counter.set(id.wrapping_add(1));
            Self(id)
        })
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

/// True if the two rectangles share at least one pixel.
pub fn overlaps(a: &Rectangle, b: &Rectangle) -> bool {
    !a.intersection(b).is_zero_sized()
}

/// State shared by every node of the scene graph.
///
/// Position is local to the parent container. `enabled` and `interactive`
/// are independent: a disabled object keeps its visuals while a
/// non-interactive one is simply skipped by touch dispatch.
pub struct ObjectBase {
    id: ObjectId,
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub alpha: u8,
    pub visible: bool,
    pub enabled: bool,
    pub interactive: bool,
    /// Opaque user data.
    pub tag: Option<Box<dyn Any>>,
    parent: Option<ObjectId>,
    pub tap: EventChannel<TapEventArgs>,
    pub gesture: EventChannel<TouchGestureEventArgs>,
}

impl ObjectBase {
    pub fn new(name: &str, x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            id: ObjectId::next(),
            name: String::from(name),
            x,
            y,
            width,
            height,
            alpha: 255,
            visible: true,
            enabled: true,
            interactive: true,
            tag: None,
            parent: None,
            tap: EventChannel::new(),
            gesture: EventChannel::new(),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn parent(&self) -> Option<ObjectId> {
        self.parent
    }

    pub(crate) fn set_parent(&mut self, parent: Option<ObjectId>) {
        self.parent = parent;
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Rectangle in the parent's coordinate space.
    pub fn local_rect(&self) -> Rectangle {
        Rectangle::new(self.position(), self.size())
    }

    /// Bottom edge in the parent's coordinate space.
    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    /// Whether touch dispatch offers events to this object at all.
    pub fn accepts_touch(&self) -> bool {
        self.enabled && self.visible && self.interactive
    }

    pub fn fire_tap(&mut self) {
        let mut args = TapEventArgs::new(self.id, &self.name);
        self.tap.emit(&mut args);
    }
}

/// Rectangles waiting to be pushed from the active window to the display.
///
/// Rectangles are in window-local coordinates. Once more than
/// `FLUSH_QUEUE_CAPACITY` distinct areas are queued they collapse into their
/// bounding box. A whole-window request supersedes individual areas.
#[derive(Debug, Default)]
pub struct FlushQueue {
    areas: heapless::Vec<Rectangle, FLUSH_QUEUE_CAPACITY>,
    window: bool,
}

/// What the coordinator has to push after a dispatch.
#[derive(Debug, PartialEq)]
pub enum PendingFlush {
    Nothing,
    Window,
    Areas(heapless::Vec<Rectangle, FLUSH_QUEUE_CAPACITY>),
}

impl FlushQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, area: Rectangle) {
        if self.window || area.is_zero_sized() {
            return;
        }
        if self.areas.contains(&area) {
            return;
        }
        if let Err(area) = self.areas.push(area) {
            let merged = self
                .areas
                .iter()
                .fold(area, |acc, r| bounding_box(&acc, r));
            self.areas.clear();
            // Capacity is non-zero, so a single element always fits.
            let _ = self.areas.push(merged);
        }
    }

    /// Request the whole visible window to be recomposited.
    pub fn push_window(&mut self) {
        self.window = true;
        self.areas.clear();
    }

    pub fn is_empty(&self) -> bool {
        !self.window && self.areas.is_empty()
    }

    pub fn take(&mut self) -> PendingFlush {
        if core::mem::take(&mut self.window) {
            self.areas.clear();
            PendingFlush::Window
        } else if self.areas.is_empty() {
            PendingFlush::Nothing
        } else {
            PendingFlush::Areas(core::mem::take(&mut self.areas))
        }
    }
}

/// Smallest rectangle containing both `a` and `b`.
pub fn bounding_box(a: &Rectangle, b: &Rectangle) -> Rectangle {
    let min_x = a.top_left.x.min(b.top_left.x);
    let min_y = a.top_left.y.min(b.top_left.y);

    let max_x = (a.top_left.x + a.size.width as i32).max(b.top_left.x + b.size.width as i32);
    let max_y = (a.top_left.y + a.size.height as i32).max(b.top_left.y + b.size.height as i32);

    Rectangle::new(
        Point::new(min_x, min_y),
        Size::new((max_x - min_x) as u32, (max_y - min_y) as u32),
    )
}

/// Render and dispatch context for one level of the scene graph.
///
/// Carries the owning window's surface, the flush queue, and the
/// accumulated origin of every ancestor container, so a child's resolved
/// rectangle is correct at any nesting depth.
pub struct UiContext<'a> {
    surface: &'a mut FrameBuffer,
    flushes: &'a mut FlushQueue,
    origin: Point,
}

impl<'a> UiContext<'a> {
    pub fn new(surface: &'a mut FrameBuffer, flushes: &'a mut FlushQueue) -> Self {
        Self {
            surface,
            flushes,
            origin: Point::zero(),
        }
    }

    /// Context for the children of a container positioned at `offset`.
    pub fn nested(&mut self, offset: Point) -> UiContext<'_> {
        UiContext {
            surface: &mut *self.surface,
            flushes: &mut *self.flushes,
            origin: self.origin + offset,
        }
    }

    pub fn origin(&self) -> Point {
        self.origin
    }

    /// Window-local rectangle of an object rendered in this context.
    pub fn resolve(&self, base: &ObjectBase) -> Rectangle {
        Rectangle::new(self.origin + base.position(), base.size())
    }

    pub fn surface(&mut self) -> &mut FrameBuffer {
        &mut *self.surface
    }

    /// Draw target blending at `alpha`.
    pub fn target(&mut self, alpha: u8) -> Blended<'_> {
        self.surface.blended(alpha)
    }

    pub fn request_flush(&mut self, area: Rectangle) {
        self.flushes.push(area);
    }

    pub fn request_window_flush(&mut self) {
        self.flushes.push_window();
    }
}

/// A node of the scene graph.
///
/// `render` draws the current visual state onto the window surface at the
/// object's resolved rectangle. `invalidate` is the only path from a state
/// change to the display: it renders, then queues the rectangle for flushing.
/// Touch handlers default to letting the event pass untouched.
pub trait DisplayObject: Any {
    fn base(&self) -> &ObjectBase;

    fn base_mut(&mut self) -> &mut ObjectBase;

    fn render(&mut self, _ctx: &mut UiContext<'_>) {}

    fn invalidate(&mut self, ctx: &mut UiContext<'_>) {
        self.render(ctx);
        let rect = ctx.resolve(self.base());
        ctx.request_flush(rect);
    }

    fn on_touch_down(&mut self, _e: &mut TouchEventArgs, _ctx: &mut UiContext<'_>) {}

    fn on_touch_up(&mut self, _e: &mut TouchEventArgs, _ctx: &mut UiContext<'_>) {}

    fn on_touch_move(&mut self, _e: &mut TouchEventArgs, _ctx: &mut UiContext<'_>) {}

    fn on_touch_gesture(&mut self, _e: &mut TouchGestureEventArgs, _ctx: &mut UiContext<'_>) {}

    /// Release exclusively owned drawing resources. Must be idempotent.
    fn dispose(&mut self) {}

    fn as_container(&self) -> Option<&Container> {
        None
    }

    fn as_container_mut(&mut self) -> Option<&mut Container> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x: i32, y: i32, w: u32, h: u32) -> Rectangle {
        Rectangle::new(Point::new(x, y), Size::new(w, h))
    }

    #[test]
    fn test_object_ids_are_unique() {
        let a = ObjectBase::new("a", 0, 0, 1, 1);
        let b = ObjectBase::new("b", 0, 0, 1, 1);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_overlap() {
        assert!(overlaps(&rect(0, 0, 10, 10), &rect(9, 9, 5, 5)));
        assert!(!overlaps(&rect(0, 0, 10, 10), &rect(10, 0, 5, 5)));
    }

    #[test]
    fn test_nested_context_accumulates_origin() {
        let mut surface = FrameBuffer::new(Size::new(8, 8));
        let mut flushes = FlushQueue::new();
        let mut ctx = UiContext::new(&mut surface, &mut flushes);
        let base = ObjectBase::new("leaf", 1, 2, 3, 3);

        let mut outer = ctx.nested(Point::new(10, 20));
        let inner = outer.nested(Point::new(5, 5));
        assert_eq!(inner.resolve(&base), rect(16, 27, 3, 3));
    }

    #[test]
    fn test_flush_queue_merges_when_full() {
        let mut queue = FlushQueue::new();
        for i in 0..FLUSH_QUEUE_CAPACITY as i32 {
            queue.push(rect(i * 10, 0, 5, 5));
        }
        queue.push(rect(0, 100, 5, 5));

        match queue.take() {
            PendingFlush::Areas(areas) => {
                assert_eq!(areas.len(), 1);
                assert_eq!(areas[0], rect(0, 0, 75, 105));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn test_window_request_supersedes_areas() {
        let mut queue = FlushQueue::new();
        queue.push(rect(0, 0, 5, 5));
        queue.push_window();
        queue.push(rect(1, 1, 5, 5));
        assert_eq!(queue.take(), PendingFlush::Window);
        assert_eq!(queue.take(), PendingFlush::Nothing);
    }
}
