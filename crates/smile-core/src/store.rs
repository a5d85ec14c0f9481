//! Flat key-value slot storage.
//!
//! The mirror persists exactly one slot (the remaining-compliments pool), so
//! the surface is deliberately tiny: read a named slot as text, write it,
//! delete it. The daemon provides a SQLite-backed implementation;
//! [`MemoryStore`] backs the unit tests.

use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("slot store backend: {0}")]
    Backend(String),
}

/// A flat key-value store of named text slots. No transactions, no expiry.
pub trait SlotStore {
    /// Read a slot, `None` if it has never been written (or was deleted).
    fn read(&self, slot: &str) -> Result<Option<String>, StoreError>;
    fn write(&mut self, slot: &str, value: &str) -> Result<(), StoreError>;
    fn delete(&mut self, slot: &str) -> Result<(), StoreError>;
}

/// In-memory slot store for tests and headless runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SlotStore for MemoryStore {
    fn read(&self, slot: &str) -> Result<Option<String>, StoreError> {
        Ok(self.slots.get(slot).cloned())
    }

    fn write(&mut self, slot: &str, value: &str) -> Result<(), StoreError> {
        self.slots.insert(slot.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&mut self, slot: &str) -> Result<(), StoreError> {
        self.slots.remove(slot);
        Ok(())
    }
}
