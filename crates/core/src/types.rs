//! Core type definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Derive the canonical asset identifier from a display name.
///
/// Lower-cases the name and replaces every space with a hyphen, so
/// "Bitcoin Cash" becomes "bitcoin-cash". Two assets with the same display
/// name share an identifier.
pub fn derive_asset_id(name: &str) -> String {
    name.to_lowercase().replace(' ', "-")
}

/// Per-currency market figures for an asset
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub price: f64,
    pub volume_24h: f64,
    pub market_cap: f64,
    pub percent_change_1h: f64,
    pub percent_change_24h: f64,
    pub percent_change_7d: f64,
}

impl Quote {
    /// Attribute suffixes paired with their values, in exposition order
    pub fn fields(&self) -> [(&'static str, f64); 6] {
        [
            ("price", self.price),
            ("volume_24h", self.volume_24h),
            ("market_cap", self.market_cap),
            ("percent_change_1h", self.percent_change_1h),
            ("percent_change_24h", self.percent_change_24h),
            ("percent_change_7d", self.percent_change_7d),
        ]
    }
}

/// A tracked market asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub rank: u32,
    pub available_supply: f64,
    pub total_supply: f64,
    pub max_supply: f64,
    /// Quotes keyed by upper-case currency code
    pub quotes: BTreeMap<String, Quote>,
    pub last_updated: DateTime<Utc>,
}

impl Asset {
    pub fn new(name: &str, symbol: &str, last_updated: DateTime<Utc>) -> Self {
        Self {
            id: derive_asset_id(name),
            name: name.to_string(),
            symbol: symbol.to_string(),
            rank: 0,
            available_supply: 0.0,
            total_supply: 0.0,
            max_supply: 0.0,
            quotes: BTreeMap::new(),
            last_updated,
        }
    }

    pub fn quote(&self, currency: &str) -> Option<&Quote> {
        self.quotes.get(&currency.to_uppercase())
    }

    /// Flat attribute set exported as instruments.
    ///
    /// Currency-scoped fields are suffixed with the lower-cased currency
    /// code (`price_usd`, `market_cap_cny`, ...).
    pub fn attributes(&self) -> Vec<(String, f64)> {
        let mut attrs = vec![
            ("rank".to_string(), self.rank as f64),
            ("available_supply".to_string(), self.available_supply),
            ("total_supply".to_string(), self.total_supply),
            ("max_supply".to_string(), self.max_supply),
        ];

        for (currency, quote) in &self.quotes {
            let suffix = currency.to_lowercase();
            for (field, value) in quote.fields() {
                attrs.push((format!("{field}_{suffix}"), value));
            }
        }

        attrs
    }

    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.last_updated
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) #{}", self.name, self.symbol, self.rank)
    }
}

/// Point-in-time copy of the asset store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub assets: Vec<Asset>,
    pub last_refresh: Option<DateTime<Utc>>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.id == id)
    }
}
