//! Refresh scheduler - drives fetch, normalize and merge on a fixed interval

use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use overwatch_core::{CollectorConfig, FetchError};

use crate::fetcher::{AssetSource, HttpFetcher};
use crate::normalizer::Normalizer;
use crate::registry::{InstrumentRegistry, RegistryError};
use crate::state::AssetStore;

/// Collector errors
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Collector is already running")]
    AlreadyRunning,
}

/// Scheduler configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub interval: Duration,
    pub fetch_timeout: Duration,
    pub stale_after: Option<Duration>,
    pub currencies: Vec<String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::from(&CollectorConfig::default())
    }
}

impl From<&CollectorConfig> for SchedulerConfig {
    fn from(config: &CollectorConfig) -> Self {
        Self {
            interval: config.interval(),
            fetch_timeout: config.fetch_timeout(),
            stale_after: config.stale_after(),
            currencies: config.currency_codes(),
        }
    }
}

/// Outcome of one successful refresh cycle
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub fetched: usize,
    pub merged: usize,
    pub skipped: usize,
    pub purged: usize,
    pub elapsed: Duration,
}

/// One fetch -> normalize -> merge pass, shared with the background task
struct Refresher {
    source: Arc<dyn AssetSource>,
    normalizer: Normalizer,
    store: Arc<AssetStore>,
    registry: Arc<InstrumentRegistry>,
    fetch_timeout: Duration,
    stale_after: Option<Duration>,
}

impl Refresher {
    async fn run_cycle(&self) -> Result<CycleReport, CollectorError> {
        let started = Instant::now();

        let records = match tokio::time::timeout(self.fetch_timeout, self.source.fetch()).await {
            Ok(Ok(records)) => records,
            Ok(Err(e)) => {
                self.registry.record_failure();
                return Err(e.into());
            }
            Err(_) => {
                self.registry.record_failure();
                return Err(FetchError::Timeout(self.fetch_timeout).into());
            }
        };

        let now = Utc::now();
        let batch = self.normalizer.normalize(&records, now);

        if let Err(e) = self.registry.record(&batch.assets) {
            self.registry.record_failure();
            return Err(e.into());
        }

        let (merged, purged) = self.store.merge_and_purge(batch.assets, now, self.stale_after);
        for id in &purged {
            self.registry.remove(id);
        }
        if !purged.is_empty() {
            info!("Purged {} stale assets", purged.len());
        }

        self.registry.record_success(now, self.store.len());

        Ok(CycleReport {
            fetched: records.len(),
            merged,
            skipped: batch.skipped,
            purged: purged.len(),
            elapsed: started.elapsed(),
        })
    }

    async fn run(self: Arc<Self>, interval: Duration, mut shutdown: oneshot::Receiver<()>) {
        info!(
            "Starting collector for {} every {:?}",
            self.source.origin(),
            interval
        );

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.run_cycle().await {
                        Ok(report) => {
                            info!("fetch {} coins", report.merged);
                            if report.skipped > 0 {
                                warn!("{} records skipped", report.skipped);
                            }
                            debug!("Refresh cycle completed in {:?}", report.elapsed);
                        }
                        Err(CollectorError::Registry(e)) => {
                            error!("Instrument registry invariant violated: {}", e);
                        }
                        Err(e) => {
                            error!("{}", e);
                        }
                    }
                }
                _ = &mut shutdown => {
                    info!("Collector shutdown requested");
                    break;
                }
            }
        }
    }
}

/// Periodic refresh engine
pub struct Collector {
    refresher: Arc<Refresher>,
    interval: Duration,
    handle: Option<JoinHandle<()>>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl Collector {
    pub fn new(
        config: SchedulerConfig,
        source: Arc<dyn AssetSource>,
        store: Arc<AssetStore>,
        registry: Arc<InstrumentRegistry>,
    ) -> Self {
        let refresher = Refresher {
            source,
            normalizer: Normalizer::new(&config.currencies),
            store,
            registry,
            fetch_timeout: config.fetch_timeout,
            stale_after: config.stale_after,
        };

        Self {
            refresher: Arc::new(refresher),
            interval: config.interval,
            handle: None,
            shutdown: None,
        }
    }

    /// Build a collector polling the configured HTTP endpoint
    pub fn from_config(
        config: &CollectorConfig,
        store: Arc<AssetStore>,
        registry: Arc<InstrumentRegistry>,
    ) -> Result<Self, CollectorError> {
        let fetcher = HttpFetcher::new(config.endpoint.clone(), config.fetch_timeout())?;
        Ok(Self::new(config.into(), Arc::new(fetcher), store, registry))
    }

    /// Run a single refresh cycle now
    pub async fn run_cycle(&self) -> Result<CycleReport, CollectorError> {
        self.refresher.run_cycle().await
    }

    /// Spawn the refresh loop; the first cycle runs immediately
    pub fn start(&mut self) -> Result<(), CollectorError> {
        if self.is_running() {
            return Err(CollectorError::AlreadyRunning);
        }

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let refresher = Arc::clone(&self.refresher);
        let interval = self.interval;

        self.handle = Some(tokio::spawn(refresher.run(interval, shutdown_rx)));
        self.shutdown = Some(shutdown_tx);

        Ok(())
    }

    /// Stop the refresh loop and wait for it to finish its current cycle
    pub async fn stop(&mut self) {
        info!("Stopping collector");

        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }

        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    error!("Collector task failed: {}", e);
                }
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Drop for Collector {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
