//! Touchscreen calibration.
//!
//! Calibration pairs the screen coordinates of a handful of reference points
//! with the raw digitizer readings taken while the user touches each one. The
//! panel driver owns the numerical fit; this module collects the samples in
//! order, hands them over once, and keeps the record so it can be persisted.

pub mod window;

use alloc::vec::Vec;
use embedded_graphics::prelude::Point;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

use crate::storage::StoreError;

pub use window::CalibrationWindow;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalibrationError {
    #[error("Calibration needs at least 2 reference points, panel reports {0}")]
    TooFewPoints(usize),
    #[error("Touch panel rejected the calibration")]
    Rejected,
    #[error("Calibration record arrays differ in length")]
    LengthMismatch,
    #[error("Calibration storage error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for CalibrationError {
    fn from(error: StoreError) -> Self {
        CalibrationError::Store(error)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CalibrationPoint {
    pub x: i32,
    pub y: i32,
}

impl From<Point> for CalibrationPoint {
    fn from(point: Point) -> Self {
        Self { x: point.x, y: point.y }
    }
}

impl From<CalibrationPoint> for Point {
    fn from(point: CalibrationPoint) -> Self {
        Point::new(point.x, point.y)
    }
}

/// One calibration record.
///
/// `points` are the reference positions, `sx`/`sy` their screen coordinates
/// and `cx`/`cy` the raw readings taken at each of them. All five always
/// have the same length.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct CalibrationSettings {
    pub points: Vec<CalibrationPoint>,
    pub sx: Vec<i16>,
    pub sy: Vec<i16>,
    pub cx: Vec<i16>,
    pub cy: Vec<i16>,
}

impl CalibrationSettings {
    /// Zeroed record sized for `count` reference points.
    pub fn with_point_count(count: usize) -> Self {
        Self {
            points: alloc::vec![CalibrationPoint::default(); count],
            sx: alloc::vec![0; count],
            sy: alloc::vec![0; count],
            cx: alloc::vec![0; count],
            cy: alloc::vec![0; count],
        }
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    pub fn is_consistent(&self) -> bool {
        let n = self.points.len();
        self.sx.len() == n && self.sy.len() == n && self.cx.len() == n && self.cy.len() == n
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, StoreError> {
        postcard::to_allocvec(self).map_err(|_| StoreError::Encode)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StoreError> {
        let settings: Self = postcard::from_bytes(bytes).map_err(|_| StoreError::Corrupt)?;
        if !settings.is_consistent() {
            return Err(StoreError::Corrupt);
        }
        Ok(settings)
    }
}

/// The panel driver's calibration service.
pub trait CalibrationDevice {
    /// How many reference points the driver's fit needs.
    fn calibration_point_count(&mut self) -> usize;

    /// Screen coordinate of reference point `index`.
    fn calibration_point(&mut self, index: usize) -> Point;

    /// Switch the panel to raw (uncorrected) readings for a calibration pass.
    fn start_calibration(&mut self);

    /// Compute and install a correction from the reference/raw pairs.
    fn set_calibration(&mut self, settings: &CalibrationSettings) -> Result<(), CalibrationError>;
}

impl<C: CalibrationDevice + ?Sized> CalibrationDevice for &mut C {
    fn calibration_point_count(&mut self) -> usize {
        (**self).calibration_point_count()
    }

    fn calibration_point(&mut self, index: usize) -> Point {
        (**self).calibration_point(index)
    }

    fn start_calibration(&mut self) {
        (**self).start_calibration()
    }

    fn set_calibration(&mut self, settings: &CalibrationSettings) -> Result<(), CalibrationError> {
        (**self).set_calibration(settings)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationState {
    Idle,
    /// Waiting for any tap before the first crosshair is shown.
    AwaitingFirstTouch,
    Calibrating {
        index: usize,
    },
    Complete,
}

/// Outcome of recording one raw sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationStep {
    /// Show the crosshair at this reference point next.
    Next(Point),
    /// The last point was recorded and the correction is installed.
    Complete,
    /// No pass is running; the sample was not used.
    Ignored,
}

#[derive(Debug)]
pub struct Calibrator {
    state: CalibrationState,
    settings: Option<CalibrationSettings>,
}

impl Default for Calibrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Calibrator {
    pub const fn new() -> Self {
        Self {
            state: CalibrationState::Idle,
            settings: None,
        }
    }

    pub fn state(&self) -> CalibrationState {
        self.state
    }

    pub fn is_calibrating(&self) -> bool {
        matches!(self.state, CalibrationState::Calibrating { .. })
    }

    /// The record of the current or last pass.
    pub fn settings(&self) -> Option<&CalibrationSettings> {
        self.settings.as_ref()
    }

    /// Reference point the user should touch next, if a pass is running.
    pub fn current_point(&self) -> Option<Point> {
        match (self.state, &self.settings) {
            (CalibrationState::Calibrating { index }, Some(settings)) => settings.points.get(index).map(|&p| p.into()),
            _ => None,
        }
    }

    /// Wait for a tap before starting. Only meaningful from `Idle`.
    pub fn await_first_touch(&mut self) {
        if self.state == CalibrationState::Idle {
            self.state = CalibrationState::AwaitingFirstTouch;
        }
    }

    /// Start a pass: size the record for the panel's point count, fill in the
    /// reference points and put the panel in raw mode.
    ///
    /// Returns the first reference point.
    pub fn begin<C: CalibrationDevice>(&mut self, device: &mut C) -> Result<Point, CalibrationError> {
        let count = device.calibration_point_count();
        if count < 2 {
            warn!("Touch panel reports {} calibration points", count);
            return Err(CalibrationError::TooFewPoints(count));
        }

        let mut settings = CalibrationSettings::with_point_count(count);
        for index in 0..count {
            let point = device.calibration_point(index);
            settings.points[index] = point.into();
            settings.sx[index] = point.x as i16;
            settings.sy[index] = point.y as i16;
        }
        let first = settings.points[0].into();

        device.start_calibration();
        self.settings = Some(settings);
        self.state = CalibrationState::Calibrating { index: 0 };
        info!("Calibration started ({} points)", count);
        Ok(first)
    }

    /// Record the raw reading for the current reference point.
    ///
    /// After the last point the record is submitted to the device exactly
    /// once. If the device rejects it the pass is abandoned and the previous
    /// correction stays in effect.
    pub fn record<C: CalibrationDevice>(&mut self, raw: Point, device: &mut C) -> Result<CalibrationStep, CalibrationError> {
        let CalibrationState::Calibrating { index } = self.state else {
            return Ok(CalibrationStep::Ignored);
        };
        let Some(settings) = self.settings.as_mut() else {
            return Ok(CalibrationStep::Ignored);
        };

        settings.cx[index] = raw.x as i16;
        settings.cy[index] = raw.y as i16;
        debug!(" Calibration point {} raw = ({}, {})", index, raw.x, raw.y);

        let next = index + 1;
        if next < settings.point_count() {
            self.state = CalibrationState::Calibrating { index: next };
            return Ok(CalibrationStep::Next(settings.points[next].into()));
        }

        match device.set_calibration(settings) {
            Ok(()) => {
                info!("Calibration installed");
                self.state = CalibrationState::Complete;
                Ok(CalibrationStep::Complete)
            }
            Err(e) => {
                warn!("Touch panel rejected calibration: {}", e);
                self.state = CalibrationState::Idle;
                Err(CalibrationError::Rejected)
            }
        }
    }
}
