//! Read-only access for API handlers and metric scrapes

use chrono::{DateTime, Utc};
use std::sync::Arc;

use overwatch_core::{Asset, QueryError, QueryResult, Snapshot};

use crate::registry::{InstrumentRegistry, RegistryError};
use crate::state::AssetStore;

#[derive(Debug, Clone)]
pub struct QueryService {
    store: Arc<AssetStore>,
    registry: Arc<InstrumentRegistry>,
}

impl QueryService {
    pub fn new(store: Arc<AssetStore>, registry: Arc<InstrumentRegistry>) -> Self {
        Self { store, registry }
    }

    /// All assets of the current snapshot, ordered by rank
    pub fn list(&self) -> Vec<Asset> {
        self.store.snapshot().assets
    }

    pub fn get(&self, id: &str) -> QueryResult<Asset> {
        self.store
            .get(id)
            .ok_or_else(|| QueryError::NotFound(id.to_string()))
    }

    pub fn snapshot(&self) -> Snapshot {
        self.store.snapshot()
    }

    pub fn asset_count(&self) -> usize {
        self.store.len()
    }

    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.store.last_refresh()
    }

    /// Prometheus text exposition of every instrument
    pub fn metrics(&self) -> Result<String, RegistryError> {
        self.registry.render()
    }

    pub fn metrics_content_type(&self) -> &'static str {
        self.registry.content_type()
    }
}
