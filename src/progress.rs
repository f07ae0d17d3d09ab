//! Best star count per level and the unlock rule built on it.

use std::collections::BTreeMap;

#[cfg(feature = "serde_json")]
use anyhow::{Context, Result};

/// Stars needed on a level to open the next one.
pub const UNLOCK_STARS: u8 = 3;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProgressBook {
    best: BTreeMap<u32, u8>,
}

impl ProgressBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn best_stars(&self, level_id: u32) -> u8 {
        self.best.get(&level_id).copied().unwrap_or(0)
    }

    /// Stores `stars` if it beats the previous best. Returns whether it did.
    pub fn record(&mut self, level_id: u32, stars: u8) -> bool {
        if stars <= self.best_stars(level_id) {
            return false;
        }
        self.best.insert(level_id, stars);
        true
    }

    /// Level 1 is always open; every later level needs full stars on the one
    /// before it.
    pub fn is_unlocked(&self, level_id: u32) -> bool {
        match level_id {
            0 => false,
            1 => true,
            n => self.best_stars(n - 1) >= UNLOCK_STARS,
        }
    }

    /// Serialized as `{ "<level id>": <stars> }`, the shape kept in local
    /// storage.
    #[cfg(feature = "serde_json")]
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("serializing progress")
    }

    #[cfg(feature = "serde_json")]
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("parsing stored progress")
    }

    /// Merges another book (e.g. a remote copy), keeping the better value.
    pub fn merge(&mut self, other: &ProgressBook) {
        for (&level, &stars) in &other.best {
            self.record(level, stars);
        }
    }
}
