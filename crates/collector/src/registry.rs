//! Instrument registry backed by a Prometheus registry
//!
//! One gauge family per attribute name, labelled by asset id. Families are
//! created lazily the first time an attribute is seen and never registered
//! twice.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use prometheus::{Encoder, Gauge, GaugeVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use overwatch_core::{Asset, Quote};

/// Label carrying the asset id on every instrument
pub const ASSET_LABEL: &str = "asset";

/// Registry errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Failed to register instrument {name}: {source}")]
    Registration {
        name: String,
        #[source]
        source: prometheus::Error,
    },

    #[error("Failed to encode metrics: {0}")]
    Encode(String),
}

#[derive(Debug)]
struct InstrumentInner {
    name: String,
    gauges: GaugeVec,
}

/// Handle to one registered instrument
#[derive(Debug, Clone)]
pub struct Instrument {
    inner: Arc<InstrumentInner>,
}

impl Instrument {
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Set the latest value for an asset
    pub fn set(&self, asset_id: &str, value: f64) {
        self.inner.gauges.with_label_values(&[asset_id]).set(value);
    }

    /// Current value for an asset, if it has one
    pub fn get(&self, asset_id: &str) -> Option<f64> {
        use prometheus::core::Collector;

        self.inner.gauges.collect().iter().find_map(|family| {
            family
                .get_metric()
                .iter()
                .find(|m| {
                    m.get_label()
                        .iter()
                        .any(|l| l.get_name() == ASSET_LABEL && l.get_value() == asset_id)
                })
                .map(|m| m.get_gauge().get_value())
        })
    }

    /// True when both handles refer to the same registration
    pub fn same_as(&self, other: &Instrument) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn remove(&self, asset_id: &str) -> bool {
        self.inner.gauges.remove_label_values(&[asset_id]).is_ok()
    }
}

/// Name-to-instrument registry
pub struct InstrumentRegistry {
    namespace: String,
    registry: Registry,
    instruments: RwLock<HashMap<String, Instrument>>,

    refreshes: IntCounterVec,
    last_refresh: Gauge,
    asset_count: IntGauge,
}

impl InstrumentRegistry {
    pub fn new(namespace: impl Into<String>) -> Result<Self, RegistryError> {
        let namespace = namespace.into();
        let registry = Registry::new();

        let refreshes = IntCounterVec::new(
            Opts::new(
                format!("{namespace}_collector_refreshes_total"),
                "Refresh cycles by outcome",
            ),
            &["outcome"],
        )
        .map_err(|e| registration(format!("{namespace}_collector_refreshes_total"), e))?;
        let last_refresh = Gauge::new(
            format!("{namespace}_collector_last_refresh_timestamp_seconds"),
            "Unix time of the last successful refresh",
        )
        .map_err(|e| registration(format!("{namespace}_collector_last_refresh_timestamp_seconds"), e))?;
        let asset_count = IntGauge::new(
            format!("{namespace}_collector_assets"),
            "Assets held in the store",
        )
        .map_err(|e| registration(format!("{namespace}_collector_assets"), e))?;

        registry
            .register(Box::new(refreshes.clone()))
            .map_err(|e| registration(format!("{namespace}_collector_refreshes_total"), e))?;
        registry
            .register(Box::new(last_refresh.clone()))
            .map_err(|e| registration(format!("{namespace}_collector_last_refresh_timestamp_seconds"), e))?;
        registry
            .register(Box::new(asset_count.clone()))
            .map_err(|e| registration(format!("{namespace}_collector_assets"), e))?;

        Ok(Self {
            namespace,
            registry,
            instruments: RwLock::new(HashMap::new()),
            refreshes,
            last_refresh,
            asset_count,
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Exported name for an attribute
    pub fn metric_name(&self, attribute: &str) -> String {
        format!("{}_{}", self.namespace, attribute)
    }

    /// Return the instrument for `attribute`, registering it on first use
    pub fn ensure(&self, attribute: &str) -> Result<Instrument, RegistryError> {
        if let Some(existing) = self.instruments.read().get(attribute) {
            return Ok(existing.clone());
        }

        let mut instruments = self.instruments.write();
        // Another caller may have registered it between the two locks
        if let Some(existing) = instruments.get(attribute) {
            return Ok(existing.clone());
        }

        let name = self.metric_name(attribute);
        let gauges = GaugeVec::new(Opts::new(name.clone(), help(attribute)), &[ASSET_LABEL])
            .map_err(|e| registration(name.clone(), e))?;
        self.registry
            .register(Box::new(gauges.clone()))
            .map_err(|e| registration(name.clone(), e))?;

        debug!("Registered instrument {}", name);

        let instrument = Instrument {
            inner: Arc::new(InstrumentInner { name, gauges }),
        };
        instruments.insert(attribute.to_string(), instrument.clone());

        Ok(instrument)
    }

    /// Set the latest value for an asset under an instrument
    pub fn update(&self, instrument: &Instrument, asset_id: &str, value: f64) {
        instrument.set(asset_id, value);
    }

    /// Export every attribute of every asset.
    ///
    /// All instruments are ensured before any value is written, so a
    /// registration failure leaves every series untouched.
    pub fn record(&self, assets: &[Asset]) -> Result<usize, RegistryError> {
        let samples: Vec<(&str, Vec<(String, f64)>)> = assets
            .iter()
            .map(|a| (a.id.as_str(), a.attributes()))
            .collect();

        let attributes: BTreeSet<&str> = samples
            .iter()
            .flat_map(|(_, attrs)| attrs.iter().map(|(name, _)| name.as_str()))
            .collect();

        let mut handles = HashMap::with_capacity(attributes.len());
        for attribute in attributes {
            handles.insert(attribute, self.ensure(attribute)?);
        }

        let mut written = 0;
        for (asset_id, attrs) in &samples {
            for (attribute, value) in attrs {
                if let Some(instrument) = handles.get(attribute.as_str()) {
                    self.update(instrument, asset_id, *value);
                    written += 1;
                }
            }
        }

        Ok(written)
    }

    /// Drop an asset's series from every instrument
    pub fn remove(&self, asset_id: &str) -> usize {
        self.instruments
            .read()
            .values()
            .filter(|instrument| instrument.remove(asset_id))
            .count()
    }

    pub fn get(&self, attribute: &str) -> Option<Instrument> {
        self.instruments.read().get(attribute).cloned()
    }

    pub fn contains(&self, attribute: &str) -> bool {
        self.instruments.read().contains_key(attribute)
    }

    /// Number of attribute instruments (collector self-metrics excluded)
    pub fn len(&self) -> usize {
        self.instruments.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn record_success(&self, at: DateTime<Utc>, assets: usize) {
        self.refreshes.with_label_values(&["success"]).inc();
        self.last_refresh.set(at.timestamp() as f64);
        self.asset_count.set(assets as i64);
    }

    pub fn record_failure(&self) {
        self.refreshes.with_label_values(&["failure"]).inc();
    }

    pub fn refresh_count(&self, outcome: &str) -> u64 {
        self.refreshes.with_label_values(&[outcome]).get()
    }

    /// Text exposition of everything registered
    pub fn render(&self) -> Result<String, RegistryError> {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buffer = Vec::new();

        encoder
            .encode(&families, &mut buffer)
            .map_err(|e| RegistryError::Encode(e.to_string()))?;

        String::from_utf8(buffer).map_err(|e| RegistryError::Encode(e.to_string()))
    }

    /// Content type of [`render`](Self::render) output
    pub fn content_type(&self) -> &'static str {
        prometheus::TEXT_FORMAT
    }
}

impl std::fmt::Debug for InstrumentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstrumentRegistry")
            .field("namespace", &self.namespace)
            .field("instruments", &self.len())
            .finish()
    }
}

fn registration(name: String, source: prometheus::Error) -> RegistryError {
    RegistryError::Registration { name, source }
}

fn help(attribute: &str) -> String {
    let (field, currency) = split_currency(attribute);

    let text = match field {
        "price" => "Current price of the asset",
        "volume_24h" => "Volume of the asset in past 24 hours",
        "market_cap" => "Market capitalization of the asset",
        "percent_change_1h" => "Percent change in 1 hour",
        "percent_change_24h" => "Percent change in 24 hours",
        "percent_change_7d" => "Percent change in 7 days",
        "available_supply" => "Available supply",
        "total_supply" => "Total supply",
        "max_supply" => "Maximum supply",
        "rank" => "Market capitalization rank",
        _ => return format!("Asset attribute {attribute}"),
    };

    match currency {
        Some(cur) => format!("{text} ({})", cur.to_uppercase()),
        None => text.to_string(),
    }
}

/// Split `<quote field>_<currency>` into its parts
fn split_currency(attribute: &str) -> (&str, Option<&str>) {
    Quote::default()
        .fields()
        .iter()
        .find_map(|(field, _)| {
            let currency = attribute.strip_prefix(field)?.strip_prefix('_')?;
            let valid = !currency.is_empty() && currency.chars().all(|c| c.is_ascii_alphanumeric());
            valid.then_some((*field, Some(currency)))
        })
        .unwrap_or((attribute, None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn asset(name: &str, price: f64) -> Asset {
        let mut asset = Asset::new(name, "SYM", Utc::now());
        asset.quotes.insert(
            "USD".to_string(),
            Quote {
                price,
                ..Default::default()
            },
        );
        asset
    }

    #[test]
    fn test_ensure_is_idempotent() {
        let registry = InstrumentRegistry::new("coin").unwrap();

        let first = registry.ensure("price_usd").unwrap();
        let second = registry.ensure("price_usd").unwrap();

        assert!(first.same_as(&second));
        assert_eq!(first.name(), "coin_price_usd");
        assert_eq!(registry.len(), 1);

        registry.update(&first, "bitcoin", 1.0);
        let families = registry.registry.gather();
        let count = families.iter().filter(|f| f.get_name() == "coin_price_usd").count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_concurrent_ensure_registers_once() {
        let registry = Arc::new(InstrumentRegistry::new("coin").unwrap());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.ensure("market_cap_usd").unwrap())
            })
            .collect();

        let instruments: Vec<Instrument> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(registry.len(), 1);
        assert!(instruments.windows(2).all(|w| w[0].same_as(&w[1])));
    }

    #[test]
    fn test_record_exports_every_attribute() {
        let registry = InstrumentRegistry::new("coin").unwrap();
        let assets = vec![asset("Bitcoin", 6500.5), asset("Ethereum", 320.0)];

        let written = registry.record(&assets).unwrap();

        // rank, three supplies, six quote fields
        assert_eq!(registry.len(), 10);
        assert_eq!(written, 20);
        for (attribute, _) in assets[0].attributes() {
            assert!(registry.contains(&attribute), "missing {attribute}");
        }

        let price = registry.get("price_usd").unwrap();
        assert_eq!(price.get("bitcoin"), Some(6500.5));
        assert_eq!(price.get("ethereum"), Some(320.0));
        assert_eq!(price.get("dogecoin"), None);
    }

    #[test]
    fn test_record_overwrites_values() {
        let registry = InstrumentRegistry::new("coin").unwrap();

        registry.record(&[asset("Bitcoin", 100.0)]).unwrap();
        registry.record(&[asset("Bitcoin", 200.0)]).unwrap();

        assert_eq!(registry.len(), 10);
        assert_eq!(registry.get("price_usd").unwrap().get("bitcoin"), Some(200.0));
    }

    #[test]
    fn test_remove_drops_series() {
        let registry = InstrumentRegistry::new("coin").unwrap();
        registry
            .record(&[asset("Bitcoin", 100.0), asset("Ethereum", 10.0)])
            .unwrap();

        assert_eq!(registry.remove("bitcoin"), 10);
        assert_eq!(registry.remove("bitcoin"), 0);
        assert_eq!(registry.get("price_usd").unwrap().get("bitcoin"), None);
        assert_eq!(registry.get("price_usd").unwrap().get("ethereum"), Some(10.0));
    }

    #[test]
    fn test_render_exposition() {
        let registry = InstrumentRegistry::new("coin").unwrap();
        registry.record(&[asset("Bitcoin Cash", 250.0)]).unwrap();
        registry.record_success(Utc::now(), 1);

        let text = registry.render().unwrap();

        assert!(text.contains("# HELP coin_price_usd Current price of the asset (USD)"));
        assert!(text.contains("# TYPE coin_price_usd gauge"));
        assert!(text.contains(r#"coin_price_usd{asset="bitcoin-cash"} 250"#));
        assert!(text.contains(r#"coin_collector_refreshes_total{outcome="success"} 1"#));
        assert!(text.contains("coin_collector_assets 1"));
    }

    #[test]
    fn test_invalid_attribute_name_is_rejected() {
        let registry = InstrumentRegistry::new("coin").unwrap();
        let err = registry.ensure("bad-name").unwrap_err();
        assert!(matches!(err, RegistryError::Registration { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_help_text() {
        assert_eq!(help("price_usd"), "Current price of the asset (USD)");
        assert_eq!(help("percent_change_7d_cny"), "Percent change in 7 days (CNY)");
        assert_eq!(help("market_cap_usdt"), "Market capitalization of the asset (USDT)");
        assert_eq!(help("volume_24h_btc"), "Volume of the asset in past 24 hours (BTC)");
        assert_eq!(help("max_supply"), "Maximum supply");
        assert_eq!(help("something_else"), "Asset attribute something_else");
    }
}
