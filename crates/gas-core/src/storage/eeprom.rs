//! Page view over a byte-addressed storage device

use embedded_storage::{ReadStorage, Storage};
use log::warn;

use super::{PAGE_WORDS, Page, PageStore, StorageError};

/// Size of one page in bytes.
pub const PAGE_BYTES: usize = PAGE_WORDS * 4;

/// Adapts any [`embedded_storage::Storage`] device to a [`PageStore`].
///
/// Page `n` occupies bytes `n * 64 .. n * 64 + 64`; words are stored
/// little-endian.
pub struct EepromPages<S> {
    storage: S,
}

impl<S: Storage> EepromPages<S> {
    pub const fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn into_inner(self) -> S {
        self.storage
    }

    fn offset(&self, page: u16) -> Result<u32, StorageError> {
        let start = usize::from(page) * PAGE_BYTES;
        if start + PAGE_BYTES > self.storage.capacity() {
            return Err(StorageError::PageOutOfRange { page });
        }
        u32::try_from(start).map_err(|_| StorageError::PageOutOfRange { page })
    }
}

impl<S: Storage> PageStore for EepromPages<S> {
    fn read_page(&mut self, page: u16, words: &mut Page) -> Result<(), StorageError> {
        let offset = self.offset(page)?;
        let mut bytes = [0u8; PAGE_BYTES];
        self.storage.read(offset, &mut bytes).map_err(|_| {
            warn!("EEPROM: read of page {} failed", page);
            StorageError::Device
        })?;

        for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(4)) {
            *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Ok(())
    }

    fn write_page(&mut self, page: u16, words: &Page) -> Result<(), StorageError> {
        let offset = self.offset(page)?;
        let mut bytes = [0u8; PAGE_BYTES];
        for (chunk, word) in bytes.chunks_exact_mut(4).zip(words) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }

        self.storage.write(offset, &bytes).map_err(|_| {
            warn!("EEPROM: write of page {} failed", page);
            StorageError::Device
        })
    }
}
