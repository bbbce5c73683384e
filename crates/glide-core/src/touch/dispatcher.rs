//! Conduit from raw controller samples to the scene graph.
//!
//! The dispatcher normalizes raw samples (dropping repeated identical moves
//! and honouring the ignore-all switch used by modals), exposes four
//! broadcast channels, and tracks the panel's calibration state.

use embedded_graphics::prelude::Point;
use log::{debug, info, warn};

use crate::calibration::{CalibrationDevice, CalibrationError, CalibrationSettings};
use crate::storage::SettingsStore;
use crate::touch::{RawTouch, TouchEventArgs, TouchGestureEventArgs, TouchInput};
use crate::ui::events::EventChannel;

#[derive(Default)]
pub struct TouchDispatcher {
    ignore_all_events: bool,
    was_move: bool,
    last_touch: Point,
    calibrated: bool,
    settings: Option<CalibrationSettings>,
    saved: Option<CalibrationSettings>,
    pub touch_down: EventChannel<TouchEventArgs>,
    pub touch_up: EventChannel<TouchEventArgs>,
    pub touch_move: EventChannel<TouchEventArgs>,
    pub touch_gesture: EventChannel<TouchGestureEventArgs>,
}

impl TouchDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, raw samples are dropped before normalization.
    pub fn ignore_all_events(&self) -> bool {
        self.ignore_all_events
    }

    pub fn set_ignore_all_events(&mut self, ignore: bool) {
        debug!(" Touch dispatch ignore-all = {}", ignore);
        self.ignore_all_events = ignore;
    }

    /// Position of the most recent positional sample.
    pub fn last_touch(&self) -> Point {
        self.last_touch
    }

    /// Turn a raw sample into an event, or `None` if it should be dropped.
    ///
    /// A move identical to the previous move is dropped. Down and up always
    /// pass and reset the move tracking.
    pub fn normalize(&mut self, raw: RawTouch) -> Option<TouchInput> {
        if self.ignore_all_events {
            return None;
        }

        match raw {
            RawTouch::Move(point) => {
                if self.was_move && point == self.last_touch {
                    return None;
                }
                self.was_move = true;
                self.last_touch = point;
                Some(TouchInput::moved(point))
            }
            RawTouch::Down(point) => {
                self.was_move = false;
                self.last_touch = point;
                Some(TouchInput::down(point))
            }
            RawTouch::Up(point) => {
                self.was_move = false;
                self.last_touch = point;
                Some(TouchInput::up(point))
            }
            RawTouch::Gesture {
                code,
                x,
                y,
                arguments,
                timestamp_ms,
            } => Some(TouchInput::Gesture(TouchGestureEventArgs::new(
                code,
                x,
                y,
                arguments,
                timestamp_ms,
            ))),
        }
    }

    /// Deliver an event to every subscriber of its channel.
    pub fn broadcast(&mut self, input: &mut TouchInput) {
        match input {
            TouchInput::Down(e) => self.touch_down.emit(e),
            TouchInput::Up(e) => self.touch_up.emit(e),
            TouchInput::Move(e) => self.touch_move.emit(e),
            TouchInput::Gesture(e) => self.touch_gesture.emit(e),
        }
    }

    // ------------------------------------------------------------------------
    // Calibration state
    // ------------------------------------------------------------------------

    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    /// Settings of the correction currently installed in the panel.
    pub fn calibration(&self) -> Option<&CalibrationSettings> {
        self.settings.as_ref()
    }

    /// Settings last read from or written to durable storage.
    pub fn saved_calibration(&self) -> Option<&CalibrationSettings> {
        self.saved.as_ref()
    }

    /// Install a previously saved calibration, if there is one.
    ///
    /// Returns whether the panel is now calibrated from storage.
    pub fn load_calibration<S, C>(&mut self, store: &mut S, device: &mut C) -> Result<bool, CalibrationError>
    where
        S: SettingsStore,
        C: CalibrationDevice,
    {
        let Some(settings) = store.load()? else {
            info!("No saved touch calibration");
            return Ok(false);
        };
        if !settings.is_consistent() {
            warn!("Saved touch calibration has mismatched lengths");
            return Err(CalibrationError::LengthMismatch);
        }

        device.set_calibration(&settings)?;
        info!("Loaded touch calibration ({} points)", settings.point_count());
        self.calibrated = true;
        self.saved = Some(settings.clone());
        self.settings = Some(settings);
        Ok(true)
    }

    /// Record that `settings` is now installed in the panel.
    pub fn install_calibration(&mut self, settings: CalibrationSettings) {
        self.calibrated = true;
        self.settings = Some(settings);
    }

    pub fn save_calibration<S: SettingsStore>(
        &mut self,
        store: &mut S,
        settings: &CalibrationSettings,
    ) -> Result<(), CalibrationError> {
        store.save(settings)?;
        self.saved = Some(settings.clone());
        Ok(())
    }

    /// Reinstall the saved calibration.
    ///
    /// Returns `false` when nothing was ever saved, in which case the current
    /// correction stays in effect.
    pub fn revert_calibration<C: CalibrationDevice>(&mut self, device: &mut C) -> Result<bool, CalibrationError> {
        let Some(saved) = self.saved.clone() else {
            return Ok(false);
        };
        device.set_calibration(&saved)?;
        info!("Reverted touch calibration to saved settings");
        self.settings = Some(saved);
        Ok(true)
    }
}
