//! Durable storage for touch calibration.

pub mod sd_card;

use alloc::vec::Vec;
use thiserror_no_std::Error;

use crate::calibration::CalibrationSettings;

pub use sd_card::SdCardSettingsStore;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Failed to encode record")]
    Encode,
    #[error("Stored record is corrupt")]
    Corrupt,
    #[error("Storage device error: {0}")]
    Device(heapless::String<64>),
}

impl StoreError {
    /// Wrap a device error, keeping its debug text up to the last whole
    /// character that fits.
    pub fn device(error: impl core::fmt::Debug) -> Self {
        let mut message = heapless::String::new();
        // Running out of room ends formatting early; the prefix is kept.
        let _ = core::fmt::write(&mut Truncating(&mut message), format_args!("{:?}", error));
        StoreError::Device(message)
    }
}

/// Writes characters until the buffer is full.
struct Truncating<'a, const N: usize>(&'a mut heapless::String<N>);

impl<const N: usize> core::fmt::Write for Truncating<'_, N> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        for c in s.chars() {
            self.0.push(c).map_err(|_| core::fmt::Error)?;
        }
        Ok(())
    }
}

/// Somewhere to persist one calibration record.
pub trait SettingsStore {
    fn save(&mut self, settings: &CalibrationSettings) -> Result<(), StoreError>;

    /// `Ok(None)` means nothing has been saved yet.
    fn load(&mut self) -> Result<Option<CalibrationSettings>, StoreError>;
}

impl<S: SettingsStore + ?Sized> SettingsStore for &mut S {
    fn save(&mut self, settings: &CalibrationSettings) -> Result<(), StoreError> {
        (**self).save(settings)
    }

    fn load(&mut self) -> Result<Option<CalibrationSettings>, StoreError> {
        (**self).load()
    }
}

/// Keeps the encoded record in RAM.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    bytes: Option<Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing encoded record.
    pub fn with_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes: Some(bytes) }
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        self.bytes.as_deref()
    }
}

impl SettingsStore for MemoryStore {
    fn save(&mut self, settings: &CalibrationSettings) -> Result<(), StoreError> {
        self.bytes = Some(settings.to_bytes()?);
        Ok(())
    }

    fn load(&mut self) -> Result<Option<CalibrationSettings>, StoreError> {
        self.bytes.as_deref().map(CalibrationSettings::from_bytes).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_memory_store_round_trip() {
        let mut store = MemoryStore::new();
        assert_eq!(store.load(), Ok(None));

        let mut settings = CalibrationSettings::with_point_count(2);
        settings.cx[1] = 300;
        store.save(&settings).unwrap();
        assert_eq!(store.load(), Ok(Some(settings)));
    }

    #[test]
    fn test_corrupt_record_is_reported() {
        let mut store = MemoryStore::with_bytes(vec![0xff, 0xff, 0xff]);
        assert_eq!(store.load(), Err(StoreError::Corrupt));
    }

    #[test]
    fn test_device_error_message_is_truncated() {
        let long = "x".repeat(100);
        match StoreError::device(long) {
            StoreError::Device(message) => {
                assert_eq!(message.len(), 64);
                assert!(message.starts_with("\"xxxx"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_device_error_truncates_on_char_boundary() {
        // 63 ASCII bytes leave one byte, too little for the two-byte 'é'.
        let text = alloc::format!("{}é", "x".repeat(62));
        match StoreError::device(text) {
            StoreError::Device(message) => {
                assert_eq!(message.len(), 63);
                assert!(message.ends_with('x'));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
