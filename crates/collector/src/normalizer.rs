//! Raw record normalization
//!
//! Turns upstream listings records into [`Asset`]s. Two record layouts are
//! understood:
//! - listings records with a nested `quote.<CUR>` section per currency
//! - legacy ticker records with flat `price_<cur>` style fields
//!
//! Numbers may be native JSON numbers or numeric strings. Anything missing
//! or unparseable becomes `0.0`.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use serde_json::{Map, Value};
use tracing::warn;

use overwatch_core::{Asset, Quote};

/// Result of normalizing one fetched batch
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    pub assets: Vec<Asset>,
    /// Records dropped because no identifier could be derived
    pub skipped: usize,
}

/// Record normalizer for a fixed set of quote currencies
#[derive(Debug, Clone)]
pub struct Normalizer {
    currencies: Vec<String>,
}

impl Normalizer {
    pub fn new<S: AsRef<str>>(currencies: &[S]) -> Self {
        let mut seen = HashSet::new();
        let codes: Vec<String> = currencies
            .iter()
            .map(|c| c.as_ref().trim().to_uppercase())
            .filter(|c| !c.is_empty() && seen.insert(c.clone()))
            .collect();

        Self { currencies: codes }
    }

    pub fn currencies(&self) -> &[String] {
        &self.currencies
    }

    pub fn normalize(&self, records: &[Value], now: DateTime<Utc>) -> NormalizedBatch {
        let mut batch = NormalizedBatch {
            assets: Vec::with_capacity(records.len()),
            skipped: 0,
        };

        for record in records {
            match self.normalize_record(record, now) {
                Some(asset) => batch.assets.push(asset),
                None => {
                    warn!("Skipping record without a usable name: {}", truncate(record));
                    batch.skipped += 1;
                }
            }
        }

        batch
    }

    /// Normalize one record; `None` when it has no display name
    pub fn normalize_record(&self, record: &Value, now: DateTime<Utc>) -> Option<Asset> {
        let record = record.as_object()?;
        let name = record
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|n| !n.is_empty())?;
        let symbol = record.get("symbol").and_then(Value::as_str).unwrap_or_default();

        let mut asset = Asset::new(name, symbol.trim(), now);
        asset.rank = number(field(record, &["cmc_rank", "rank"])) as u32;
        asset.available_supply = number(field(record, &["available_supply", "circulating_supply"]));
        asset.total_supply = number(field(record, &["total_supply"]));
        asset.max_supply = number(field(record, &["max_supply"]));

        for currency in &self.currencies {
            asset.quotes.insert(currency.clone(), quote(record, currency));
        }

        Some(asset)
    }
}

fn quote(record: &Map<String, Value>, currency: &str) -> Quote {
    let nested = record
        .get("quote")
        .and_then(|q| q.get(currency))
        .and_then(Value::as_object);
    let cur = currency.to_lowercase();

    let pick = |nested_key: &str, flat_key: &str| -> f64 {
        nested
            .and_then(|n| present(n.get(nested_key)))
            .or_else(|| present(record.get(flat_key)))
            .map(|v| number(Some(v)))
            .unwrap_or(0.0)
    };

    Quote {
        price: pick("price", &format!("price_{cur}")),
        volume_24h: pick("volume_24h", &format!("24h_volume_{cur}")),
        market_cap: pick("market_cap", &format!("market_cap_{cur}")),
        percent_change_1h: pick("percent_change_1h", "percent_change_1h"),
        percent_change_24h: pick("percent_change_24h", "percent_change_24h"),
        percent_change_7d: pick("percent_change_7d", "percent_change_7d"),
    }
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

/// First non-null value among `keys`
fn field<'a>(record: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| present(record.get(*k)))
}

/// Read a number encoded natively or as a string; anything else is zero
fn number(value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    parsed.filter(|f| f.is_finite()).unwrap_or(0.0)
}

fn truncate(record: &Value) -> String {
    let mut text = record.to_string();
    if text.len() > 120 {
        let mut cut = 120;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
        text.push_str("...");
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn normalizer() -> Normalizer {
        Normalizer::new(&["USD", "cny"])
    }

    #[test]
    fn test_nested_quote_record() {
        let record = json!({
            "name": "Bitcoin",
            "symbol": "BTC",
            "cmc_rank": 1,
            "circulating_supply": 19_000_000,
            "total_supply": 19_000_000,
            "max_supply": 21_000_000,
            "quote": {
                "USD": {
                    "price": 6500.5,
                    "volume_24h": 1.5e10,
                    "market_cap": 1.2e11,
                    "percent_change_1h": -0.25,
                    "percent_change_24h": 1.5,
                    "percent_change_7d": 4.0
                },
                "CNY": {"price": 45000.0, "volume_24h": 1.0e11, "market_cap": 8.0e11}
            }
        });

        let asset = normalizer().normalize_record(&record, Utc::now()).unwrap();

        assert_eq!(asset.id, "bitcoin");
        assert_eq!(asset.symbol, "BTC");
        assert_eq!(asset.rank, 1);
        assert_eq!(asset.available_supply, 19_000_000.0);
        assert_eq!(asset.max_supply, 21_000_000.0);

        let usd = asset.quote("USD").unwrap();
        assert_eq!(usd.price, 6500.5);
        assert_eq!(usd.percent_change_1h, -0.25);

        let cny = asset.quote("CNY").unwrap();
        assert_eq!(cny.price, 45000.0);
        assert_eq!(cny.percent_change_7d, 0.0);
    }

    #[test]
    fn test_legacy_flat_record_with_string_numbers() {
        let record = json!({
            "name": "Bitcoin Cash",
            "symbol": "BCH",
            "rank": "4",
            "price_usd": "1250.75",
            "24h_volume_usd": "800000000.0",
            "market_cap_usd": "21000000000",
            "price_cny": "8300.1",
            "available_supply": "16900000.0",
            "total_supply": "16900000.0",
            "max_supply": null,
            "percent_change_1h": "0.5",
            "percent_change_24h": "-3.2",
            "percent_change_7d": "12.0"
        });

        let asset = normalizer().normalize_record(&record, Utc::now()).unwrap();

        assert_eq!(asset.id, "bitcoin-cash");
        assert_eq!(asset.rank, 4);
        assert_eq!(asset.available_supply, 16_900_000.0);
        assert_eq!(asset.max_supply, 0.0);

        let usd = asset.quote("USD").unwrap();
        assert_eq!(usd.price, 1250.75);
        assert_eq!(usd.volume_24h, 800_000_000.0);
        assert_eq!(usd.market_cap, 21_000_000_000.0);
        assert_eq!(usd.percent_change_24h, -3.2);

        let cny = asset.quote("CNY").unwrap();
        assert_eq!(cny.price, 8300.1);
        assert_eq!(cny.market_cap, 0.0);
        assert_eq!(cny.percent_change_7d, 12.0);
    }

    #[test]
    fn test_malformed_quote_yields_zeros() {
        let records = vec![
            json!({"name": "Ethereum", "symbol": "ETH", "quote": "unavailable"}),
            json!({"name": "Tether", "symbol": "USDT", "quote": {"USD": {"price": "abc", "market_cap": {}}}}),
            json!({"name": "Dogecoin", "symbol": "DOGE"}),
        ];

        let batch = normalizer().normalize(&records, Utc::now());

        assert_eq!(batch.assets.len(), 3);
        assert_eq!(batch.skipped, 0);
        for asset in &batch.assets {
            assert_eq!(asset.quotes.len(), 2);
            assert!(asset.quotes.values().all(|q| *q == Quote::default()));
        }
    }

    #[test]
    fn test_records_without_name_are_skipped() {
        let records = vec![
            json!({"symbol": "???"}),
            json!("just a string"),
            json!({"name": "   "}),
            json!({"name": "Litecoin", "symbol": "LTC"}),
        ];

        let batch = normalizer().normalize(&records, Utc::now());

        assert_eq!(batch.skipped, 3);
        assert_eq!(batch.assets.len(), 1);
        assert_eq!(batch.assets[0].id, "litecoin");
    }

    #[test]
    fn test_currencies_are_deduplicated_in_order() {
        let normalizer = Normalizer::new(&["usd", "CNY", " USD ", "", "cny", "eur"]);
        assert_eq!(normalizer.currencies(), ["USD", "CNY", "EUR"]);
    }

    #[test]
    fn test_normalization_is_deterministic() {
        let record = json!({"name": "Binance Coin", "symbol": "BNB", "cmc_rank": 3,
                            "quote": {"USD": {"price": 300.0}}});
        let now = Utc::now();

        let first = normalizer().normalize_record(&record, now);
        let second = normalizer().normalize_record(&record, now);

        assert_eq!(first, second);
        assert_eq!(first.unwrap().id, "binance-coin");
    }

    #[test]
    fn test_number_rejects_non_finite() {
        assert_eq!(number(Some(&json!("NaN"))), 0.0);
        assert_eq!(number(Some(&json!("inf"))), 0.0);
        assert_eq!(number(Some(&json!(" 42.5 "))), 42.5);
        assert_eq!(number(Some(&json!(true))), 0.0);
        assert_eq!(number(None), 0.0);
    }
}
