//! Runtime configuration for the framework.
//!
//! The configuration is a plain serde value so it can be shipped as a
//! postcard blob (for example from a flash partition) and decoded at boot.

use embassy_time::Duration;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::storage::StoreError;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct GlideConfig {
    pub touch: TouchConfig,
    pub calibration: CalibrationConfig,
}

/// Touch filtering and polling intervals.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TouchConfig {
    /// Move samples swallowed before a window treats a press as a drag.
    pub max_ignored_touch_moves: u32,
    /// Poll interval for message box style modals.
    pub modal_poll_interval_ms: u32,
    /// Poll interval while a slider thumb is being dragged.
    pub drag_poll_interval_ms: u32,
    /// Minimum travel (in either axis) before a polled move is reported.
    pub jitter_threshold: u32,
    /// Hold time before a key starts auto-repeating.
    pub repeat_hold_ms: u32,
    /// Resolution of the auto-repeat clock.
    pub repeat_tick_ms: u32,
}

impl Default for TouchConfig {
    fn default() -> Self {
        Self {
            max_ignored_touch_moves: 1,
            modal_poll_interval_ms: 50,
            drag_poll_interval_ms: 30,
            jitter_threshold: 2,
            repeat_hold_ms: 500,
            repeat_tick_ms: 50,
        }
    }
}

impl TouchConfig {
    pub fn modal_poll_interval(&self) -> Duration {
        Duration::from_millis(self.modal_poll_interval_ms as u64)
    }

    pub fn drag_poll_interval(&self) -> Duration {
        Duration::from_millis(self.drag_poll_interval_ms as u64)
    }

    pub fn repeat_hold(&self) -> Duration {
        Duration::from_millis(self.repeat_hold_ms as u64)
    }

    pub fn repeat_tick(&self) -> Duration {
        Duration::from_millis(self.repeat_tick_ms as u64)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CalibrationConfig {
    /// Skip the "touch to start" prompt and go straight to the first crosshair.
    pub auto_start: bool,
    /// Persist the settings as soon as the last point is recorded.
    pub auto_save: bool,
}

impl GlideConfig {
    /// Decode a configuration from a postcard blob.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StoreError> {
        postcard::from_bytes(bytes).map_err(|_| StoreError::Corrupt)
    }

    pub fn to_bytes(&self) -> Result<alloc::vec::Vec<u8>, StoreError> {
        postcard::to_allocvec(self).map_err(|_| StoreError::Encode)
    }

    /// Decode a configuration if one was provided, otherwise use defaults.
    ///
    /// A corrupt blob is logged and replaced by the defaults.
    pub fn load_or_default(bytes: Option<&[u8]>) -> Self {
        match bytes.map(Self::from_bytes) {
            Some(Ok(config)) => config,
            Some(Err(e)) => {
                warn!("Ignoring stored configuration: {}", e);
                Self::default()
            }
            None => Self::default(),
        }
    }
}
