//! Polled touch input for controllers without an interrupt line.
//!
//! Modal views (message boxes, list pickers, keyboards) and slider drags read
//! the controller in a loop instead of waiting for dispatched events. The
//! poller turns successive samples into down/move/up events, filtering moves
//! smaller than the jitter threshold.

use core::cell::Cell;
use core::ops::ControlFlow;

use critical_section::Mutex;
use embassy_futures::select::{Either, select};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::Duration;
use embedded_graphics::prelude::{Point, Size};
use embedded_hal_async::delay::DelayNs;
use log::debug;

use crate::touch::TouchInput;

/// Source of the most recent touch sample.
///
/// A point outside the panel bounds (conventionally negative) means no finger
/// is down.
pub trait TouchPanel {
    fn last_touch_point(&mut self) -> Point;
}

/// Cooperative cancellation for polling loops.
pub struct CancelToken {
    cancelled: Mutex<Cell<bool>>,
    signal: Signal<CriticalSectionRawMutex, ()>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub const fn new() -> Self {
        Self {
            cancelled: Mutex::new(Cell::new(false)),
            signal: Signal::new(),
        }
    }

    pub fn cancel(&self) {
        critical_section::with(|cs| self.cancelled.borrow(cs).set(true));
        self.signal.signal(());
    }

    pub fn is_cancelled(&self) -> bool {
        critical_section::with(|cs| self.cancelled.borrow(cs).get())
    }

    /// Re-arm the token for another loop.
    pub fn reset(&self) {
        critical_section::with(|cs| self.cancelled.borrow(cs).set(false));
        self.signal.reset();
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn wait(&self) {
        while !self.is_cancelled() {
            self.signal.wait().await;
        }
    }
}

pub struct TouchPoller {
    bounds: Size,
    threshold: u32,
    interval: Duration,
    touched: bool,
    last: Point,
}

impl TouchPoller {
    pub fn new(bounds: Size, threshold: u32, interval: Duration) -> Self {
        Self {
            bounds,
            threshold,
            interval,
            touched: false,
            last: Point::zero(),
        }
    }

    pub fn is_touched(&self) -> bool {
        self.touched
    }

    fn in_bounds(&self, point: Point) -> bool {
        point.x >= 0 && point.y >= 0 && point.x <= self.bounds.width as i32 && point.y <= self.bounds.height as i32
    }

    /// Feed one sample; returns the event it produces, if any.
    ///
    /// The release is reported at the last in-range position.
    pub fn sample(&mut self, point: Point) -> Option<TouchInput> {
        if self.in_bounds(point) {
            if !self.touched {
                self.touched = true;
                self.last = point;
                return Some(TouchInput::down(point));
            }
            let delta = point - self.last;
            if delta.x.unsigned_abs() > self.threshold || delta.y.unsigned_abs() > self.threshold {
                self.last = point;
                return Some(TouchInput::moved(point));
            }
            None
        } else if self.touched {
            self.touched = false;
            Some(TouchInput::up(self.last))
        } else {
            None
        }
    }

    /// Poll `panel` until `sink` breaks or `cancel` fires.
    pub async fn run<P, D, F>(&mut self, panel: &mut P, delay: &mut D, cancel: &CancelToken, mut sink: F)
    where
        P: TouchPanel,
        D: DelayNs,
        F: FnMut(TouchInput) -> ControlFlow<()>,
    {
        let interval_ms = self.interval.as_millis() as u32;
        debug!(" Touch poll started ({} ms)", interval_ms);
        while !cancel.is_cancelled() {
            let point = panel.last_touch_point();
            if let Some(input) = self.sample(point)
                && sink(input).is_break()
            {
                break;
            }

            if let Either::Second(()) = select(delay.delay_ms(interval_ms), cancel.wait()).await {
                break;
            }
        }
        debug!(" Touch poll stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use alloc::vec::Vec;

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

    #[test]
    fn test_sample_filters_jitter() {
        let mut poller = TouchPoller::new(Size::new(320, 240), 2, Duration::from_millis(50));
        assert_eq!(poller.sample(Point::new(-1, -1)), None);
        assert_eq!(poller.sample(Point::new(100, 100)), Some(TouchInput::down(Point::new(100, 100))));
        assert_eq!(poller.sample(Point::new(102, 101)), None);
        assert_eq!(poller.sample(Point::new(103, 100)), Some(TouchInput::moved(Point::new(103, 100))));
        assert_eq!(poller.sample(Point::new(-1, -1)), Some(TouchInput::up(Point::new(103, 100))));
        assert!(!poller.is_touched());
    }

    #[test]
    fn test_edges_are_in_range() {
        let mut poller = TouchPoller::new(Size::new(320, 240), 2, Duration::from_millis(50));
        assert!(poller.sample(Point::new(320, 240)).is_some());
        assert!(poller.is_touched());
        assert!(poller.sample(Point::new(321, 240)).is_some());
        assert!(!poller.is_touched());
    }

    #[test]
    fn test_run_stops_when_sink_breaks() {
        let mut panel = ScriptedPanel {
            samples: vec![Point::new(10, 10), Point::new(20, 10), Point::new(-1, -1), Point::new(50, 50)],
            next: 0,
        };
        let mut poller = TouchPoller::new(Size::new(100, 100), 2, Duration::from_millis(50));
        let cancel = CancelToken::new();
        let mut seen = Vec::new();

        embassy_futures::block_on(poller.run(&mut panel, &mut NoDelay, &cancel, |input| {
            let up = matches!(input, TouchInput::Up(_));
            seen.push(input);
            if up { ControlFlow::Break(()) } else { ControlFlow::Continue(()) }
        }));

        assert_eq!(
            seen,
            vec![
                TouchInput::down(Point::new(10, 10)),
                TouchInput::moved(Point::new(20, 10)),
                TouchInput::up(Point::new(20, 10)),
            ]
        );
        assert_eq!(panel.next, 3);
    }

    #[test]
    fn test_cancelled_token_skips_polling() {
        let mut panel = ScriptedPanel {
            samples: vec![Point::new(10, 10)],
            next: 0,
        };
        let mut poller = TouchPoller::new(Size::new(100, 100), 2, Duration::from_millis(50));
        let cancel = CancelToken::new();
        cancel.cancel();

        embassy_futures::block_on(poller.run(&mut panel, &mut NoDelay, &cancel, |_| ControlFlow::Continue(())));
        assert_eq!(panel.next, 0);
        assert!(embassy_futures::poll_once(cancel.wait()).is_ready());

        cancel.reset();
        assert!(!cancel.is_cancelled());
    }
}
