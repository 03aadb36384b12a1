use super::{PAGE_WORDS, Page, PageStore, StorageError};

/// RAM-backed page store.
///
/// Starts out zero-filled, like an erased-to-zero EEPROM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryPageStore<const PAGES: usize> {
    pages: [Page; PAGES],
}

impl<const PAGES: usize> MemoryPageStore<PAGES> {
    pub const fn new() -> Self {
        Self {
            pages: [[0; PAGE_WORDS]; PAGES],
        }
    }

    pub const fn from_pages(pages: [Page; PAGES]) -> Self {
        Self { pages }
    }

    pub fn pages(&self) -> &[Page; PAGES] {
        &self.pages
    }

    /// Direct access to a page, bypassing the store interface.
    pub fn page_mut(&mut self, page: u16) -> Option<&mut Page> {
        self.pages.get_mut(usize::from(page))
    }
}

impl<const PAGES: usize> Default for MemoryPageStore<PAGES> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const PAGES: usize> PageStore for MemoryPageStore<PAGES> {
    fn read_page(&mut self, page: u16, words: &mut Page) -> Result<(), StorageError> {
        let stored = self
            .pages
            .get(usize::from(page))
            .ok_or(StorageError::PageOutOfRange { page })?;
        *words = *stored;
        Ok(())
    }

    fn write_page(&mut self, page: u16, words: &Page) -> Result<(), StorageError> {
        let stored = self
            .pages
            .get_mut(usize::from(page))
            .ok_or(StorageError::PageOutOfRange { page })?;
        *stored = *words;
        Ok(())
    }
}
