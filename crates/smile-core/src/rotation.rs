//! Compliment rotation — a bag-without-replacement with reshuffle on
//! exhaustion.
//!
//! The persisted pool holds the compliments not yet shown in the current
//! cycle. A draw removes a uniformly random entry and persists the
//! remainder; an empty (or never-written) pool refills from the fixed
//! source list before drawing. No compliment repeats until the full set
//! has been exhausted once.

use crate::store::{SlotStore, StoreError};
use rand::Rng;
use thiserror::Error;

/// Slot name the pool is persisted under.
pub const POOL_SLOT: &str = "remaining_compliments";

/// The fixed compliment source list.
pub const COMPLIMENTS: [&str; 6] = [
    "That smile lights up my world!",
    "You make every day brighter ❤️",
    "Remember our first sunset together?",
    "I love the way you laugh!",
    "Your smile could melt glaciers 🌋",
    "One grin from you and the day is saved!",
];

#[derive(Error, Debug)]
pub enum RotationError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("pool serialization: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Draws compliments without repetition within a cycle, persisting the
/// remaining pool through a [`SlotStore`].
pub struct ComplimentBag<S: SlotStore> {
    store: S,
}

impl<S: SlotStore> ComplimentBag<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Draw the next compliment.
    ///
    /// Refills the pool from [`COMPLIMENTS`] when it would otherwise be read
    /// empty, then removes and returns a uniformly random entry. The
    /// remainder is persisted on every call.
    pub fn next(&mut self) -> Result<String, RotationError> {
        let mut remaining = self.load()?;
        if remaining.is_empty() {
            tracing::debug!(count = COMPLIMENTS.len(), "pool exhausted, refilling");
            remaining = COMPLIMENTS.iter().map(|c| c.to_string()).collect();
        }

        let idx = rand::thread_rng().gen_range(0..remaining.len());
        let choice = remaining.swap_remove(idx);

        self.store
            .write(POOL_SLOT, &serde_json::to_string(&remaining)?)?;
        Ok(choice)
    }

    /// Drop the persisted pool entirely; the next draw starts a fresh cycle.
    pub fn clear(&mut self) -> Result<(), RotationError> {
        self.store.delete(POOL_SLOT)?;
        Ok(())
    }

    /// Compliments still unseen in the current cycle. Empty when the slot is
    /// absent or holds malformed data (a bad slot heals on the next draw).
    pub fn remaining(&self) -> Result<Vec<String>, RotationError> {
        self.load()
    }

    fn load(&self) -> Result<Vec<String>, RotationError> {
        match self.store.read(POOL_SLOT)? {
            None => Ok(Vec::new()),
            Some(text) => match serde_json::from_str(&text) {
                Ok(pool) => Ok(pool),
                Err(err) => {
                    tracing::warn!(error = %err, "pool slot malformed, starting a fresh cycle");
                    Ok(Vec::new())
                }
            },
        }
    }
}
