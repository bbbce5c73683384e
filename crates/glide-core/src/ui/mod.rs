//! Retained-mode scene graph: display objects, containers, windows and the
//! small set of widgets used to exercise them.

pub mod components;
pub mod container;
pub mod core;
pub mod events;
pub mod window;

pub use self::core::{DisplayObject, FlushQueue, ObjectBase, ObjectId, PendingFlush, UiContext};
pub use components::{Button, Canvas, DrawCommand, TextBlock};
pub use container::Container;
pub use events::{EventChannel, Subscription, TapEventArgs};
pub use window::{DispatchContext, Window, WindowView};
