//! Upstream market-data fetchers

use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use overwatch_core::{FetchError, FetchResult};

/// Source of raw asset records
#[async_trait::async_trait]
pub trait AssetSource: Send + Sync {
    /// Perform one read against the upstream and return its raw records
    async fn fetch(&self) -> FetchResult<Vec<Value>>;

    /// Human-readable origin, used in logs
    fn origin(&self) -> &str;
}

/// HTTP listings fetcher
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> FetchResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("crypto-market-overwatch/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Request(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn classify(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Request(err.to_string())
        }
    }
}

#[async_trait::async_trait]
impl AssetSource for HttpFetcher {
    async fn fetch(&self) -> FetchResult<Vec<Value>> {
        debug!("Fetching listings from {}", self.endpoint);

        let response = self
            .client
            .get(&self.endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|e| self.classify(e))?;
        parse_records(&body)
    }

    fn origin(&self) -> &str {
        &self.endpoint
    }
}

/// Split a listings body into raw records.
///
/// Accepts a bare JSON array or an object carrying the array under `data`.
pub fn parse_records(body: &[u8]) -> FetchResult<Vec<Value>> {
    let json: Value =
        serde_json::from_slice(body).map_err(|e| FetchError::MalformedBody(e.to_string()))?;

    match json {
        Value::Array(records) => Ok(records),
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(records)) => Ok(records),
            Some(other) => Err(FetchError::MalformedBody(format!(
                "expected an array under \"data\", found {}",
                kind(&other)
            ))),
            None => Err(FetchError::MalformedBody(
                "object body has no \"data\" field".to_string(),
            )),
        },
        other => Err(FetchError::MalformedBody(format!(
            "expected an array or object, found {}",
            kind(&other)
        ))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
