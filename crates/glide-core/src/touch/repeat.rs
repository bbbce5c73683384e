//! Press-and-hold auto-repeat (keyboard backspace style).

use embassy_futures::select::{Either, select};
use embedded_hal_async::delay::DelayNs;
use log::debug;

use crate::config::TouchConfig;
use crate::touch::poller::CancelToken;

/// Accelerating repeat clock.
///
/// The clock starts at 500 ms and advances one tick per call. A repeat fires
/// whenever the clock is a multiple of the current interval, and the interval
/// shrinks as the hold continues: 500 ms, then 400 at 600, 300 at 700, 200 at
/// 800, 100 at 900 and 50 from 1000 on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeatSchedule {
    time_ms: u32,
    interval_ms: u32,
    tick_ms: u32,
}

impl RepeatSchedule {
    pub fn new(tick_ms: u32) -> Self {
        Self {
            time_ms: 500,
            interval_ms: 500,
            tick_ms: tick_ms.max(1),
        }
    }

    pub fn time_ms(&self) -> u32 {
        self.time_ms
    }

    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }

    /// Advance one tick. Returns whether a repeat fires on this tick.
    pub fn tick(&mut self) -> bool {
        let fire = self.time_ms % self.interval_ms == 0;

        self.interval_ms = match self.time_ms {
            600 => 400,
            700 => 300,
            800 => 200,
            900 => 100,
            1000 => 50,
            _ => self.interval_ms,
        };
        self.time_ms = self.time_ms.saturating_add(self.tick_ms);
        fire
    }
}

/// Wait for the hold delay, then call `on_repeat` on every firing tick until
/// `cancel` fires (normally on touch up).
///
/// Returns the number of repeats delivered.
pub async fn run_auto_repeat<D, F>(delay: &mut D, cancel: &CancelToken, config: &TouchConfig, mut on_repeat: F) -> u32
where
    D: DelayNs,
    F: FnMut(),
{
    let hold_ms = config.repeat_hold().as_millis() as u32;
    let tick_ms = config.repeat_tick().as_millis() as u32;
    if let Either::Second(()) = select(delay.delay_ms(hold_ms), cancel.wait()).await {
        return 0;
    }

    let mut schedule = RepeatSchedule::new(tick_ms);
    let mut repeats = 0;
    debug!(" Auto-repeat started");
    while !cancel.is_cancelled() {
        if schedule.tick() {
            repeats += 1;
            on_repeat();
        }
        if let Either::Second(()) = select(delay.delay_ms(tick_ms), cancel.wait()).await {
            break;
        }
    }
    debug!(" Auto-repeat stopped after {} repeats", repeats);
    repeats
}
