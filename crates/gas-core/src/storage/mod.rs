//! Durable calibration storage
//!
//! The device keeps its calibration in one fixed-size page of a word
//! addressed store. [`PageStore`] is the only thing the core needs from the
//! storage medium; [`CalibrationStore`] defines the layout of the page and
//! guards it with a magic marker and an XOR checksum.

pub mod calibration;
pub mod eeprom;
pub mod manager;
pub mod memory;

pub use calibration::*;
pub use eeprom::EepromPages;
pub use manager::*;
pub use memory::MemoryPageStore;

use thiserror_no_std::Error;

/// Number of 32-bit words in one page.
pub const PAGE_WORDS: usize = 16;

/// One page worth of words.
pub type Page = [u32; PAGE_WORDS];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StorageError {
    /// The page index is outside the store
    #[error("Page {page} is out of range")]
    PageOutOfRange { page: u16 },

    /// The underlying device reported a failure
    #[error("Storage device error")]
    Device,
}

/// Word-oriented page storage, e.g. a small EEPROM.
pub trait PageStore {
    fn read_page(&mut self, page: u16, words: &mut Page) -> Result<(), StorageError>;

    fn write_page(&mut self, page: u16, words: &Page) -> Result<(), StorageError>;
}

impl<T: PageStore + ?Sized> PageStore for &mut T {
    fn read_page(&mut self, page: u16, words: &mut Page) -> Result<(), StorageError> {
        (**self).read_page(page, words)
    }

    fn write_page(&mut self, page: u16, words: &Page) -> Result<(), StorageError> {
        (**self).write_page(page, words)
    }
}
