//! Hardware-independent core of the glide widget framework
//!
//! This crate holds the retained-mode scene graph, touch dispatch, window
//! scrolling, touchscreen calibration and the flush coordinator that ties a
//! window's off-screen surface to the physical LCD.
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both
//! embedded targets and desktop hosts (for the simulator and tests).

#![no_std]

extern crate alloc;

pub mod calibration;
pub mod config;
pub mod framebuffer;
pub mod glide;
pub mod modal;
pub mod screen;
pub mod storage;
pub mod touch;
pub mod ui;

pub use glide::{Error, Glide};
