//! Display object container: owns an ordered list of children and fans out
//! rendering and touch dispatch.
//!
//! Insertion order is render order (back to front). Hit testing walks the
//! children in reverse (front to back) and stops at the first claimant.

use alloc::boxed::Box;
use alloc::format;
use alloc::vec::Vec;
use core::any::Any;
use log::debug;

use crate::touch::{TouchEventArgs, TouchGestureEventArgs};
use crate::ui::core::{DisplayObject, ObjectBase, ObjectId, UiContext};

pub struct Container {
    pub base: ObjectBase,
    children: Vec<Box<dyn DisplayObject>>,
    pressed: bool,
    /// Grow `height` to cover every added child's bottom edge.
    pub auto_height: bool,
}

impl Container {
    pub fn new(name: &str, x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            base: ObjectBase::new(name, x, y, width, height),
            children: Vec::new(),
            pressed: false,
            auto_height: false,
        }
    }

    pub fn with_auto_height(mut self, auto_height: bool) -> Self {
        self.auto_height = auto_height;
        self
    }

    pub fn add_child(&mut self, child: Box<dyn DisplayObject>) -> ObjectId {
        self.add_child_at(None, child)
    }

    /// Insert `child` at `index`. `None` or an index past the end appends.
    ///
    /// Unnamed children are named `instance<N>` after the current child
    /// count, which is not guaranteed to be unique after removals.
    pub fn add_child_at(&mut self, index: Option<usize>, mut child: Box<dyn DisplayObject>) -> ObjectId {
        let count = self.children.len();
        let base = child.base_mut();
        if base.name.is_empty() {
            base.name = format!("instance{}", count);
        }
        base.set_parent(Some(self.base.id()));

        if self.auto_height {
            let bottom = base.bottom();
            if bottom > self.base.height as i32 {
                self.base.height = bottom as u32;
            }
        }

        let id = base.id();
        match index {
            Some(i) if i < count => self.children.insert(i, child),
            _ => self.children.push(child),
        }
        debug!(" Added {:?} to '{}' ({} children)", id, self.base.name, count + 1);
        id
    }

    /// Detach a child by identity, handing ownership back to the caller.
    pub fn remove_child(&mut self, id: ObjectId) -> Option<Box<dyn DisplayObject>> {
        let index = self.index_of(id)?;
        self.remove_child_at(index)
    }

    /// Detach the child at `index`; out of range is a no-op.
    pub fn remove_child_at(&mut self, index: usize) -> Option<Box<dyn DisplayObject>> {
        if index >= self.children.len() {
            return None;
        }
        let mut child = self.children.remove(index);
        child.base_mut().set_parent(None);
        Some(child)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.index_of(id).is_some()
    }

    pub fn index_of(&self, id: ObjectId) -> Option<usize> {
        self.children.iter().position(|c| c.base().id() == id)
    }

    pub fn child_by_name(&self, name: &str) -> Option<&(dyn DisplayObject + 'static)> {
        self.children
            .iter()
            .find(|c| c.base().name == name)
            .map(|c| c.as_ref())
    }

    pub fn child_by_name_mut(&mut self, name: &str) -> Option<&mut (dyn DisplayObject + 'static)> {
        self.children
            .iter_mut()
            .find(|c| c.base().name == name)
            .map(|c| c.as_mut())
    }

    pub fn child_at(&self, index: usize) -> Option<&(dyn DisplayObject + 'static)> {
        self.children.get(index).map(|c| c.as_ref())
    }

    pub fn child_at_mut(&mut self, index: usize) -> Option<&mut (dyn DisplayObject + 'static)> {
        self.children.get_mut(index).map(|c| c.as_mut())
    }

    /// Typed lookup by name.
    pub fn get<T: DisplayObject>(&self, name: &str) -> Option<&T> {
        let child: &dyn Any = self.child_by_name(name)?;
        child.downcast_ref::<T>()
    }

    pub fn get_mut<T: DisplayObject>(&mut self, name: &str) -> Option<&mut T> {
        let child: &mut dyn Any = self.child_by_name_mut(name)?;
        child.downcast_mut::<T>()
    }

    pub fn num_children(&self) -> usize {
        self.children.len()
    }

    pub fn children(&self) -> impl Iterator<Item = &(dyn DisplayObject + 'static)> {
        self.children.iter().map(|c| c.as_ref())
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    /// Set the `interactive` flag of every direct child.
    pub fn set_children_interactive(&mut self, interactive: bool) {
        for child in self.children.iter_mut() {
            child.base_mut().interactive = interactive;
        }
    }

    /// Render visible children in insertion order. `ctx` is this container's
    /// child coordinate space.
    pub fn render_children(&mut self, ctx: &mut UiContext<'_>) {
        for child in self.children.iter_mut() {
            if child.base().visible {
                child.render(ctx);
            }
        }
    }

    pub fn dispatch_touch_down(&mut self, e: &mut TouchEventArgs, ctx: &mut UiContext<'_>) {
        for child in self.children.iter_mut().rev() {
            if !child.base().accepts_touch() {
                continue;
            }
            child.on_touch_down(e, ctx);
            if !e.propagate() {
                break;
            }
        }

        if e.propagate() {
            self.pressed = true;
        }
    }

    pub fn dispatch_touch_up(&mut self, e: &mut TouchEventArgs, ctx: &mut UiContext<'_>) {
        for child in self.children.iter_mut().rev() {
            if !child.base().accepts_touch() {
                continue;
            }
            child.on_touch_up(e, ctx);
            if !e.propagate() {
                break;
            }
        }

        if e.propagate() && self.pressed {
            debug!(" Container '{}' tapped", self.base.name);
            self.base.fire_tap();
        }
        self.pressed = false;
    }

    pub fn dispatch_touch_move(&mut self, e: &mut TouchEventArgs, ctx: &mut UiContext<'_>) {
        for child in self.children.iter_mut().rev() {
            if !child.base().accepts_touch() {
                continue;
            }
            child.on_touch_move(e, ctx);
            if !e.propagate() {
                break;
            }
        }
    }

    pub fn dispatch_touch_gesture(&mut self, e: &mut TouchGestureEventArgs, ctx: &mut UiContext<'_>) {
        for child in self.children.iter_mut().rev() {
            if !child.base().accepts_touch() {
                continue;
            }
            child.on_touch_gesture(e, ctx);
            if !e.propagate() {
                break;
            }
        }

        if e.propagate() {
            self.base.gesture.emit(e);
        }
    }

    /// Dispose every child and empty the container.
    pub fn dispose_children(&mut self) {
        for child in self.children.iter_mut() {
            child.dispose();
        }
        self.children.clear();
    }
}

impl DisplayObject for Container {
    fn base(&self) -> &ObjectBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ObjectBase {
        &mut self.base
    }

    fn render(&mut self, ctx: &mut UiContext<'_>) {
        let mut inner = ctx.nested(self.base.position());
        self.render_children(&mut inner);
    }

    fn on_touch_down(&mut self, e: &mut TouchEventArgs, ctx: &mut UiContext<'_>) {
        let mut inner = ctx.nested(self.base.position());
        self.dispatch_touch_down(e, &mut inner);
    }

    fn on_touch_up(&mut self, e: &mut TouchEventArgs, ctx: &mut UiContext<'_>) {
        let mut inner = ctx.nested(self.base.position());
        self.dispatch_touch_up(e, &mut inner);
    }

    fn on_touch_move(&mut self, e: &mut TouchEventArgs, ctx: &mut UiContext<'_>) {
        let mut inner = ctx.nested(self.base.position());
        self.dispatch_touch_move(e, &mut inner);
    }

    fn on_touch_gesture(&mut self, e: &mut TouchGestureEventArgs, ctx: &mut UiContext<'_>) {
        let mut inner = ctx.nested(self.base.position());
        self.dispatch_touch_gesture(e, &mut inner);
    }

    fn dispose(&mut self) {
        self.dispose_children();
    }

    fn as_container(&self) -> Option<&Container> {
        Some(self)
    }

    fn as_container_mut(&mut self) -> Option<&mut Container> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framebuffer::FrameBuffer;
    use crate::ui::core::FlushQueue;
    use alloc::rc::Rc;
    use alloc::string::String;
    use alloc::vec;
    use core::cell::RefCell;
    use embedded_graphics::prelude::*;

    type Log = Rc<RefCell<Vec<String>>>;

    /// Leaf that records every touch-down it is offered and optionally claims it.
    struct Probe {
        base: ObjectBase,
        log: Log,
        claims: bool,
    }

    impl Probe {
        fn boxed(name: &str, x: i32, y: i32, w: u32, h: u32, log: &Log) -> Box<Self> {
            Box::new(Self {
                base: ObjectBase::new(name, x, y, w, h),
                log: log.clone(),
                claims: true,
            })
        }
    }

    impl DisplayObject for Probe {
        fn base(&self) -> &ObjectBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut ObjectBase {
            &mut self.base
        }

        fn on_touch_down(&mut self, e: &mut TouchEventArgs, ctx: &mut UiContext<'_>) {
            self.log.borrow_mut().push(self.base.name.clone());
            if self.claims && ctx.resolve(&self.base).contains(e.point) {
                e.stop_propagation();
            }
        }
    }

    fn with_ctx<F: FnOnce(&mut UiContext<'_>)>(f: F) {
        let mut surface = FrameBuffer::new(Size::new(200, 200));
        let mut flushes = FlushQueue::new();
        let mut ctx = UiContext::new(&mut surface, &mut flushes);
        f(&mut ctx);
    }

    #[test]
    fn test_hit_test_runs_front_to_back_and_stops_at_claimant() {
        let log: Log = Rc::default();
        let mut container = Container::new("root", 0, 0, 200, 200);
        container.add_child(Probe::boxed("a", 0, 0, 50, 50, &log));
        container.add_child(Probe::boxed("b", 10, 10, 50, 50, &log));
        container.add_child(Probe::boxed("c", 100, 100, 20, 20, &log));

        with_ctx(|ctx| {
            let mut e = TouchEventArgs::new(Point::new(20, 20));
            container.dispatch_touch_down(&mut e, ctx);
            assert!(!e.propagate());
        });
        assert_eq!(*log.borrow(), vec!["c", "b"]);
        assert!(!container.is_pressed());
    }

    #[test]
    fn test_skips_children_that_do_not_accept_touch() {
        let log: Log = Rc::default();
        let mut container = Container::new("root", 0, 0, 200, 200);
        let mut hidden = Probe::boxed("hidden", 0, 0, 50, 50, &log);
        hidden.base.visible = false;
        let mut disabled = Probe::boxed("disabled", 0, 0, 50, 50, &log);
        disabled.base.enabled = false;
        let mut passive = Probe::boxed("passive", 0, 0, 50, 50, &log);
        passive.base.interactive = false;
        container.add_child(hidden);
        container.add_child(disabled);
        container.add_child(passive);

        with_ctx(|ctx| {
            let mut e = TouchEventArgs::new(Point::new(5, 5));
            container.dispatch_touch_down(&mut e, ctx);
            assert!(e.propagate());
        });
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_container_self_tap_requires_unclaimed_down_and_up() {
        let taps = Rc::new(RefCell::new(0));
        let mut container = Container::new("panel", 0, 0, 100, 100);
        let counter = taps.clone();
        container.base.tap.subscribe(move |_| *counter.borrow_mut() += 1);

        with_ctx(|ctx| {
            let p = Point::new(10, 10);
            container.dispatch_touch_down(&mut TouchEventArgs::new(p), ctx);
            container.dispatch_touch_up(&mut TouchEventArgs::new(p), ctx);
            // An up without a preceding unclaimed down does nothing.
            container.dispatch_touch_up(&mut TouchEventArgs::new(p), ctx);
        });
        assert_eq!(*taps.borrow(), 1);
        assert!(!container.is_pressed());
    }

    #[test]
    fn test_claimed_up_clears_pressed_without_tap() {
        let log: Log = Rc::default();
        let taps = Rc::new(RefCell::new(0));
        let mut container = Container::new("panel", 0, 0, 100, 100);
        let counter = taps.clone();
        container.base.tap.subscribe(move |_| *counter.borrow_mut() += 1);

        with_ctx(|ctx| {
            let mut down = TouchEventArgs::new(Point::new(80, 80));
            container.dispatch_touch_down(&mut down, ctx);
            assert!(container.is_pressed());

            container.add_child(Probe::boxed("late", 0, 0, 100, 100, &log));
            let mut up = TouchEventArgs::new(Point::new(80, 80));
            up.stop_propagation();
            container.dispatch_touch_up(&mut up, ctx);
        });
        assert_eq!(*taps.borrow(), 0);
        assert!(!container.is_pressed());
    }

    #[test]
    fn test_auto_height_only_grows() {
        let log: Log = Rc::default();
        let mut container = Container::new("list", 0, 0, 100, 40).with_auto_height(true);
        container.add_child(Probe::boxed("", 0, 0, 10, 30, &log));
        assert_eq!(container.base.height, 40);
        container.add_child(Probe::boxed("", 0, 50, 10, 30, &log));
        assert_eq!(container.base.height, 80);
        container.add_child(Probe::boxed("", 0, 10, 10, 10, &log));
        assert_eq!(container.base.height, 80);
    }

    #[test]
    fn test_naming_insertion_and_removal() {
        let log: Log = Rc::default();
        let mut container = Container::new("root", 0, 0, 100, 100);
        let first = container.add_child(Probe::boxed("", 0, 0, 1, 1, &log));
        let second = container.add_child_at(Some(0), Probe::boxed("", 0, 0, 1, 1, &log));
        let third = container.add_child_at(Some(99), Probe::boxed("named", 0, 0, 1, 1, &log));

        assert_eq!(container.child_at(0).map(|c| c.base().id()), Some(second));
        assert_eq!(container.child_at(2).map(|c| c.base().id()), Some(third));
        assert_eq!(container.child_by_name("instance0").map(|c| c.base().id()), Some(first));
        assert_eq!(container.child_by_name("instance1").map(|c| c.base().id()), Some(second));
        assert!(container.get::<Probe>("named").is_some());
        assert!(container.get::<Container>("named").is_none());
        assert_eq!(
            container.child_at(1).and_then(|c| c.base().parent()),
            Some(container.base.id())
        );

        assert!(container.remove_child_at(7).is_none());
        let removed = container.remove_child(first).unwrap();
        assert_eq!(removed.base().parent(), None);
        assert!(!container.contains(first));
        assert_eq!(container.num_children(), 2);
    }

    #[test]
    fn test_nested_container_children_resolve_against_every_ancestor() {
        let log: Log = Rc::default();
        let mut outer = Container::new("outer", 0, 0, 200, 200);
        let mut inner = Container::new("inner", 50, 50, 100, 100);
        inner.add_child(Probe::boxed("deep", 10, 10, 10, 10, &log));
        outer.add_child(Box::new(inner));

        with_ctx(|ctx| {
            // Only the full ancestor walk puts "deep" at (60, 60).
            let mut e = TouchEventArgs::new(Point::new(65, 65));
            outer.dispatch_touch_down(&mut e, ctx);
            assert!(!e.propagate());
        });
        assert_eq!(*log.borrow(), vec!["deep"]);
    }
}
