//! In-memory asset index.

use super::models::Asset;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Filename -> [`Asset`] map shared between request handlers and the refresh
/// task.
///
/// The lock is never held across an await. A rebuild assembles its map
/// without the lock and swaps it in with [`AssetIndex::replace`].
#[derive(Debug, Default)]
pub struct AssetIndex {
    assets: RwLock<HashMap<String, Asset>>,
}

impl AssetIndex {
    pub fn new() -> Self {
        Self::default()
    }

    // A panicking writer cannot leave the map half-updated: every mutation
    // is a single insert, remove or swap.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Asset>> {
        self.assets.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Asset>> {
        self.assets.write().unwrap_or_else(|p| p.into_inner())
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn get(&self, name: &str) -> Option<Asset> {
        self.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// Insert or overwrite one entry.
    pub fn store(&self, name: impl Into<String>, asset: Asset) {
        self.write().insert(name.into(), asset);
    }

    pub fn remove(&self, name: &str) -> Option<Asset> {
        self.write().remove(name)
    }

    /// Swap in a complete new generation of the index.
    pub fn replace(&self, assets: HashMap<String, Asset>) {
        *self.write() = assets;
    }

    /// All names, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.read().keys().cloned().collect();
        keys.sort_unstable();
        keys
    }
}
