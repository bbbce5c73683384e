//! Touch input: event arguments, gesture codes and the dispatcher.

pub mod dispatcher;
pub mod poller;
pub mod repeat;

pub use dispatcher::TouchDispatcher;
pub use poller::{CancelToken, TouchPanel, TouchPoller};
pub use repeat::{RepeatSchedule, run_auto_repeat};

use embedded_graphics::prelude::Point;

/// A positional touch event travelling through the scene graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchEventArgs {
    pub point: Point,
    propagate: bool,
}

impl TouchEventArgs {
    pub fn new(point: Point) -> Self {
        Self {
            point,
            propagate: true,
        }
    }

    /// `false` once a handler has claimed the event.
    pub fn propagate(&self) -> bool {
        self.propagate
    }

    pub fn stop_propagation(&mut self) {
        self.propagate = false;
    }
}

/// Gesture kinds reported by the touch controller's recognizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum TouchGesture {
    NoGesture = 0,
    Begin = 1,
    End = 2,
    Right = 3,
    UpRight = 4,
    Up = 5,
    UpLeft = 6,
    Left = 7,
    DownLeft = 8,
    Down = 9,
    DownRight = 10,
    Tap = 11,
    DoubleTap = 12,
    Zoom = 114,
    Pan = 115,
    Rotate = 116,
    TwoFingerTap = 117,
    Rollover = 118,
    /// Start of the application defined range; any code from 200 up maps here.
    UserDefined = 200,
}

impl TouchGesture {
    /// Map a raw gesture code. Unknown codes below the user range map to `NoGesture`.
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => Self::Begin,
            2 => Self::End,
            3 => Self::Right,
            4 => Self::UpRight,
            5 => Self::Up,
            6 => Self::UpLeft,
            7 => Self::Left,
            8 => Self::DownLeft,
            9 => Self::Down,
            10 => Self::DownRight,
            11 => Self::Tap,
            12 => Self::DoubleTap,
            114 => Self::Zoom,
            115 => Self::Pan,
            116 => Self::Rotate,
            117 => Self::TwoFingerTap,
            118 => Self::Rollover,
            c if c >= 200 => Self::UserDefined,
            _ => Self::NoGesture,
        }
    }
}

/// A recognized gesture travelling through the scene graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchGestureEventArgs {
    pub gesture: TouchGesture,
    /// Raw code as reported, kept so user defined gestures stay distinguishable.
    pub code: u32,
    pub x: i32,
    pub y: i32,
    /// Zoom: distance between fingers. Rotate: angle in degrees.
    pub arguments: u16,
    pub timestamp_ms: u64,
    propagate: bool,
}

impl TouchGestureEventArgs {
    pub fn new(code: u32, x: i32, y: i32, arguments: u16, timestamp_ms: u64) -> Self {
        Self {
            gesture: TouchGesture::from_code(code),
            code,
            x,
            y,
            arguments,
            timestamp_ms,
            propagate: true,
        }
    }

    pub fn propagate(&self) -> bool {
        self.propagate
    }

    pub fn stop_propagation(&mut self) {
        self.propagate = false;
    }
}

/// A raw sample as delivered by the touch controller driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawTouch {
    Down(Point),
    Move(Point),
    Up(Point),
    Gesture {
        code: u32,
        x: i32,
        y: i32,
        arguments: u16,
        timestamp_ms: u64,
    },
}

/// A normalized event ready to be dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchInput {
    Down(TouchEventArgs),
    Move(TouchEventArgs),
    Up(TouchEventArgs),
    Gesture(TouchGestureEventArgs),
}

impl TouchInput {
    pub fn down(point: Point) -> Self {
        Self::Down(TouchEventArgs::new(point))
    }

    pub fn moved(point: Point) -> Self {
        Self::Move(TouchEventArgs::new(point))
    }

    pub fn up(point: Point) -> Self {
        Self::Up(TouchEventArgs::new(point))
    }

    pub fn propagate(&self) -> bool {
        match self {
            Self::Down(e) | Self::Move(e) | Self::Up(e) => e.propagate(),
            Self::Gesture(e) => e.propagate(),
        }
    }
}
