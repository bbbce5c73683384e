use alloc::vec::Vec;
use embedded_sdmmc::{Mode, SdCard, TimeSource, VolumeIdx, VolumeManager};
use log::{debug, warn};

use crate::calibration::CalibrationSettings;
use crate::storage::{SettingsStore, StoreError};

const CALIBRATION_FILE: &str = "GLIDECAL.BIN";

/// Calibration settings kept in one file on the first FAT volume.
///
/// SD card operations are blocking and share the bus with the display, so
/// they should only run between frames.
pub struct SdCardSettingsStore<S, D, T>
where
    S: embedded_hal::spi::SpiDevice<u8>,
    D: embedded_hal::delay::DelayNs,
    T: TimeSource,
{
    volume_mgr: VolumeManager<SdCard<S, D>, T, 4, 4, 1>,
}

impl<S, D, T> SdCardSettingsStore<S, D, T>
where
    S: embedded_hal::spi::SpiDevice<u8>,
    D: embedded_hal::delay::DelayNs,
    T: TimeSource,
{
    pub fn new(sd_card: SdCard<S, D>, ts: T) -> Self {
        let volume_mgr = VolumeManager::new(sd_card, ts);

        Self { volume_mgr }
    }

    fn write_record(&self, bytes: &[u8]) -> Result<(), embedded_sdmmc::Error<embedded_sdmmc::SdCardError>> {
        let volume0 = self.volume_mgr.open_volume(VolumeIdx(0))?;
        let root_dir = volume0.open_root_dir()?;
        let file = root_dir.open_file_in_dir(CALIBRATION_FILE, Mode::ReadWriteCreateOrTruncate)?;

        file.write(bytes)?;

        // Close explicitly so errors surface instead of being lost on drop
        file.close()?;
        root_dir.close()?;
        volume0.close()?;

        Ok(())
    }

    fn read_record(&self) -> Result<Vec<u8>, embedded_sdmmc::Error<embedded_sdmmc::SdCardError>> {
        let volume0 = self.volume_mgr.open_volume(VolumeIdx(0))?;
        let root_dir = volume0.open_root_dir()?;
        let file = root_dir.open_file_in_dir(CALIBRATION_FILE, Mode::ReadOnly)?;

        let mut bytes = Vec::new();
        let mut chunk = [0u8; 64];
        loop {
            let read = file.read(&mut chunk)?;
            if read == 0 {
                break; // EOF
            }
            bytes.extend_from_slice(&chunk[..read]);
        }

        file.close()?;
        root_dir.close()?;
        volume0.close()?;

        Ok(bytes)
    }
}

impl<S, D, T> SettingsStore for SdCardSettingsStore<S, D, T>
where
    S: embedded_hal::spi::SpiDevice<u8>,
    D: embedded_hal::delay::DelayNs,
    T: TimeSource,
{
    fn save(&mut self, settings: &CalibrationSettings) -> Result<(), StoreError> {
        let bytes = settings.to_bytes()?;
        self.write_record(&bytes).map_err(|e| {
            warn!("Failed to write {}: {:?}", CALIBRATION_FILE, e);
            StoreError::device(e)
        })?;
        debug!(" Wrote {} bytes to {}", bytes.len(), CALIBRATION_FILE);
        Ok(())
    }

    fn load(&mut self) -> Result<Option<CalibrationSettings>, StoreError> {
        match self.read_record() {
            Ok(bytes) => CalibrationSettings::from_bytes(&bytes).map(Some),
            Err(embedded_sdmmc::Error::NotFound) => Ok(None),
            Err(e) => {
                warn!("Failed to read {}: {:?}", CALIBRATION_FILE, e);
                Err(StoreError::device(e))
            }
        }
    }
}
