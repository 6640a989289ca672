//! Asset store shared by the refresh cycle and readers
//!
//! A single readers-writer lock guards the whole map, so a reader always
//! sees the state left by a complete merge.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;

use overwatch_core::{Asset, Snapshot};

#[derive(Debug, Default)]
struct StoreInner {
    assets: HashMap<String, Asset>,
    last_refresh: Option<DateTime<Utc>>,
    merge_count: u64,
}

/// Authoritative id -> asset mapping
#[derive(Debug, Default)]
pub struct AssetStore {
    inner: RwLock<StoreInner>,
}

impl AssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace every asset of one batch and stamp the refresh time.
    ///
    /// The whole batch is applied under one write lock.
    pub fn merge(&self, assets: Vec<Asset>, at: DateTime<Utc>) -> usize {
        self.merge_and_purge(assets, at, None).0
    }

    /// Merge a batch and, when `stale_after` is set, drop assets not refreshed
    /// within it. Both happen under the same write lock.
    ///
    /// Returns the merged count and the purged ids.
    pub fn merge_and_purge(
        &self,
        assets: Vec<Asset>,
        at: DateTime<Utc>,
        stale_after: Option<Duration>,
    ) -> (usize, Vec<String>) {
        let count = assets.len();
        let mut inner = self.inner.write();

        for asset in assets {
            inner.assets.insert(asset.id.clone(), asset);
        }

        let purged = match stale_after {
            Some(max_age) => purge(&mut inner.assets, max_age, at),
            None => Vec::new(),
        };

        inner.last_refresh = Some(at);
        inner.merge_count += 1;

        (count, purged)
    }

    /// Copy of the current contents, ordered by rank then id
    pub fn snapshot(&self) -> Snapshot {
        let (mut assets, last_refresh) = {
            let inner = self.inner.read();
            (
                inner.assets.values().cloned().collect::<Vec<_>>(),
                inner.last_refresh,
            )
        };

        assets.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.id.cmp(&b.id)));

        Snapshot {
            assets,
            last_refresh,
        }
    }

    pub fn get(&self, id: &str) -> Option<Asset> {
        self.inner.read().assets.get(id).cloned()
    }

    /// Remove assets not refreshed within `max_age`, returning their ids
    pub fn purge_stale(&self, max_age: Duration, now: DateTime<Utc>) -> Vec<String> {
        purge(&mut self.inner.write().assets, max_age, now)
    }

    pub fn len(&self) -> usize {
        self.inner.read().assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.inner.read().last_refresh
    }

    pub fn stats(&self) -> StoreStats {
        let inner = self.inner.read();
        StoreStats {
            asset_count: inner.assets.len(),
            merge_count: inner.merge_count,
            last_refresh: inner.last_refresh,
        }
    }
}

fn purge(assets: &mut HashMap<String, Asset>, max_age: Duration, now: DateTime<Utc>) -> Vec<String> {
    let stale: Vec<String> = assets
        .values()
        .filter(|a| a.age(now).to_std().map(|age| age > max_age).unwrap_or(false))
        .map(|a| a.id.clone())
        .collect();

    for id in &stale {
        assets.remove(id);
    }

    stale
}

/// Statistics about the asset store
#[derive(Debug, Clone)]
pub struct StoreStats {
    pub asset_count: usize,
    pub merge_count: u64,
    pub last_refresh: Option<DateTime<Utc>>,
}
