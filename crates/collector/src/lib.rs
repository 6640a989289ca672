//! Market-data refresh engine
//!
//! Features:
//! - Periodic polling of a listings endpoint with a bounded fetch
//! - Tolerant normalization of nested and flat record layouts
//! - Idempotent Prometheus instrument registration
//! - Snapshot store shared by the refresh cycle and readers

pub mod fetcher;
pub mod normalizer;
pub mod query;
pub mod registry;
pub mod scheduler;
pub mod state;

pub use fetcher::{AssetSource, HttpFetcher};
pub use normalizer::{NormalizedBatch, Normalizer};
pub use query::QueryService;
pub use registry::{Instrument, InstrumentRegistry, RegistryError};
pub use scheduler::{Collector, CollectorError, CycleReport, SchedulerConfig};
pub use state::AssetStore;
