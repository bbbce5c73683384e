//! Observer lists used for widget and dispatcher events.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;

use crate::ui::core::ObjectId;

/// Handle returned by [`EventChannel::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription(u32);

type Handler<A> = Box<dyn FnMut(&mut A)>;

/// An ordered list of subscribers for one kind of event.
///
/// Handlers run in subscription order and receive the event arguments
/// mutably so they can stop propagation.
pub struct EventChannel<A> {
    handlers: Vec<(Subscription, Handler<A>)>,
    next: u32,
}

impl<A> Default for EventChannel<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> EventChannel<A> {
    pub const fn new() -> Self {
        Self {
            handlers: Vec::new(),
            next: 0,
        }
    }

    pub fn subscribe<F>(&mut self, handler: F) -> Subscription
    where
        F: FnMut(&mut A) + 'static,
    {
        let id = Subscription(self.next);
        self.next = self.next.wrapping_add(1);
        self.handlers.push((id, Box::new(handler)));
        id
    }

    /// Remove a handler. Returns `false` if it was already gone.
    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(id, _)| *id != subscription);
        self.handlers.len() != before
    }

    pub fn emit(&mut self, args: &mut A) {
        for (_, handler) in self.handlers.iter_mut() {
            handler(args);
        }
    }

    pub fn has_subscribers(&self) -> bool {
        !self.handlers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn clear(&mut self) {
        self.handlers.clear();
    }
}

/// Arguments for tap, press and release notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapEventArgs {
    pub sender: ObjectId,
    pub name: String,
}

impl TapEventArgs {
    pub fn new(sender: ObjectId, name: &str) -> Self {
        Self {
            sender,
            name: String::from(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use core::cell::Cell;

    #[test]
    fn test_emit_reaches_every_subscriber_in_order() {
        let seen = Rc::new(Cell::new(0u32));
        let mut channel: EventChannel<u32> = EventChannel::new();

        let first = seen.clone();
        channel.subscribe(move |v| first.set(first.get() * 10 + *v));
        let second = seen.clone();
        channel.subscribe(move |v| second.set(second.get() * 10 + *v + 1));

        channel.emit(&mut 1);
        assert_eq!(seen.get(), 12);
    }

    #[test]
    fn test_unsubscribe_updates_has_subscribers() {
        let mut channel: EventChannel<()> = EventChannel::new();
        assert!(!channel.has_subscribers());

        let sub = channel.subscribe(|_| {});
        assert!(channel.has_subscribers());
        assert!(channel.unsubscribe(sub));
        assert!(!channel.unsubscribe(sub));
        assert!(!channel.has_subscribers());
    }
}
