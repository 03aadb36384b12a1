//! Simulator state kept between runs
//!
//! The state file holds the device configuration and the raw EEPROM pages,
//! encoded with postcard.

use std::fs;
use std::io;
use std::path::Path;

use gas_core::DeviceConfig;
use gas_core::storage::{MemoryPageStore, PAGE_WORDS, Page};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

/// Number of EEPROM pages the simulator provides.
pub const PAGES: usize = 4;

pub type Eeprom = MemoryPageStore<PAGES>;

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct SimState {
    pub config: DeviceConfig,
    pub pages: Vec<Page>,
}

impl SimState {
    pub fn eeprom(&self) -> Eeprom {
        let mut pages = [[0u32; PAGE_WORDS]; PAGES];
        for (slot, page) in pages.iter_mut().zip(&self.pages) {
            *slot = *page;
        }
        MemoryPageStore::from_pages(pages)
    }
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error("State file I/O failed: {0}")]
    Io(io::Error),

    #[error("State file encoding failed: {0}")]
    Encoding(postcard::Error),
}

/// Load the state file, falling back to a fresh device if it is missing or
/// unreadable.
pub fn load(path: &Path) -> SimState {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("No state file at {}, starting fresh", path.display());
            return SimState::default();
        }
        Err(e) => {
            warn!("Could not read {}: {}", path.display(), e);
            return SimState::default();
        }
    };

    match postcard::from_bytes(&bytes) {
        Ok(state) => {
            info!("Loaded state from {}", path.display());
            state
        }
        Err(e) => {
            warn!("Ignoring corrupt state file {}: {}", path.display(), e);
            SimState::default()
        }
    }
}

pub fn save(path: &Path, config: DeviceConfig, eeprom: &Eeprom) -> Result<(), StateError> {
    let state = SimState {
        config,
        pages: eeprom.pages().to_vec(),
    };
    let bytes = postcard::to_allocvec(&state).map_err(StateError::Encoding)?;
    fs::write(path, bytes).map_err(StateError::Io)?;
    info!("Saved state to {}", path.display());
    Ok(())
}
