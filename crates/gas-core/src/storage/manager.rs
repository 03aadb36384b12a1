use log::{info, warn};

use super::{CalibrationError, CalibrationRecord, PAGE_WORDS, PageStore};

/// Values the concentration engine works with, derived from the active
/// record on every successful load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorkingCalibration {
    pub record: CalibrationRecord,
    pub adc_count_zero: i32,
    /// nA per ppm
    pub sensitivity: i32,
    pub temperature_offset: i16,
}

impl From<CalibrationRecord> for WorkingCalibration {
    fn from(record: CalibrationRecord) -> Self {
        Self {
            record,
            adc_count_zero: record.adc_count_zero as i32,
            sensitivity: record.sensitivity,
            temperature_offset: record.temperature_offset,
        }
    }
}

/// Owner of the durable calibration page and of the active calibration.
///
/// The active calibration only ever changes through a successful
/// [`load`](Self::load); a page that fails validation is reported and
/// otherwise ignored, so the device keeps running on the last good values
/// (all zero until the first one is loaded).
pub struct CalibrationStore<S> {
    store: S,
    page: u16,
    active: WorkingCalibration,
}

impl<S: PageStore> CalibrationStore<S> {
    pub fn new(store: S, page: u16) -> Self {
        Self {
            store,
            page,
            active: WorkingCalibration::default(),
        }
    }

    pub fn active(&self) -> &WorkingCalibration {
        &self.active
    }

    pub fn page(&self) -> u16 {
        self.page
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Read and validate the calibration page, making it active on success.
    pub fn load(&mut self) -> Result<&WorkingCalibration, CalibrationError> {
        let mut words = [0u32; PAGE_WORDS];
        let record = self
            .store
            .read_page(self.page, &mut words)
            .map_err(CalibrationError::from)
            .and_then(|()| CalibrationRecord::from_page(&words));

        match record {
            Ok(record) => {
                self.active = WorkingCalibration::from(record);
                info!(
                    "Calibration: loaded for {} (zero {}, sensitivity {} nA/ppm)",
                    record.gas_type.label(),
                    record.adc_count_zero,
                    record.sensitivity
                );
                Ok(&self.active)
            }
            Err(e) => {
                warn!("Calibration: page {} rejected, keeping previous values: {}", self.page, e);
                Err(e)
            }
        }
    }

    /// Write `record` with a fresh checksum.
    ///
    /// The active calibration is not touched; follow up with
    /// [`load`](Self::load), or use [`save_and_reload`](Self::save_and_reload).
    pub fn save(&mut self, record: &CalibrationRecord) -> Result<(), CalibrationError> {
        let words = record.to_page();
        self.store.write_page(self.page, &words).map_err(|e| {
            warn!("Calibration: writing page {} failed: {}", self.page, e);
            CalibrationError::from(e)
        })
    }

    /// Persist `record` and make the durable copy the active one.
    pub fn save_and_reload(
        &mut self,
        record: &CalibrationRecord,
    ) -> Result<&WorkingCalibration, CalibrationError> {
        self.save(record)?;
        self.load()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gas::GasType;
    use crate::storage::calibration::tests::any_record;
    use crate::storage::{MemoryPageStore, StorageError};
    use proptest::prelude::*;

    const PAGE: u16 = 1;

    fn record() -> CalibrationRecord {
        CalibrationRecord {
            adc_count_zero: 107292,
            temperature_offset: -15,
            gas_type: GasType::Co,
            sensitivity: 290,
            ..CalibrationRecord::default()
        }
    }

    #[test]
    fn test_cold_start_keeps_zero_calibration() {
        let mut calibration = CalibrationStore::new(MemoryPageStore::<2>::new(), PAGE);

        assert!(matches!(
            calibration.load(),
            Err(CalibrationError::BadMagic { found: 0, .. })
        ));
        assert_eq!(*calibration.active(), WorkingCalibration::default());
    }

    #[test]
    fn test_save_and_reload_derives_working_values() {
        let mut calibration = CalibrationStore::new(MemoryPageStore::<2>::new(), PAGE);

        let active = *calibration.save_and_reload(&record()).unwrap();

        assert_eq!(active.adc_count_zero, 107292);
        assert_eq!(active.sensitivity, 290);
        assert_eq!(active.temperature_offset, -15);
        assert_eq!(active.record, record());
        assert_eq!(calibration.store().pages()[1], record().to_page());
    }

    #[test]
    fn test_save_alone_does_not_activate() {
        let mut calibration = CalibrationStore::new(MemoryPageStore::<2>::new(), PAGE);

        calibration.save(&record()).unwrap();

        assert_eq!(*calibration.active(), WorkingCalibration::default());
    }

    #[test]
    fn test_storage_failure_is_reported() {
        let mut calibration = CalibrationStore::new(MemoryPageStore::<1>::new(), PAGE);

        assert_eq!(
            calibration.save(&record()),
            Err(CalibrationError::Storage(StorageError::PageOutOfRange { page: PAGE }))
        );
        assert!(calibration.load().is_err());
    }

    proptest! {
        #[test]
        fn test_corrupted_page_leaves_active_calibration(
            stored in any_record(),
            index in 0usize..PAGE_WORDS,
            flip in 1u32..,
        ) {
            let mut calibration = CalibrationStore::new(MemoryPageStore::<2>::new(), PAGE);
            calibration.save_and_reload(&record()).unwrap();
            let before = *calibration.active();

            let mut page = stored.to_page();
            page[index] ^= flip;
            if let Some(target) = calibration.store_mut().page_mut(PAGE) {
                *target = page;
            }

            prop_assert!(calibration.load().is_err());
            prop_assert_eq!(*calibration.active(), before);
        }
    }
}
