//! DexScreener REST price fetcher.
//!
//! Fetches the USD price of a single pair on every call. Any failure is
//! reported as a `FeedError`; a missing price is never treated as zero.

use crate::error::FeedError;
use crate::source::PriceSource;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Configuration for the DexScreener fetcher.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// API root, without trailing slash
    pub base_url: String,
    /// Chain id used in the pair path (e.g. "ton")
    pub chain: String,
    /// Pair or token address
    pub token_address: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            base_url: DexScreenerFetcher::BASE_URL.to_string(),
            chain: "ton".to_string(),
            token_address: String::new(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// DexScreener pair price fetcher.
pub struct DexScreenerFetcher {
    client: reqwest::Client,
    url: String,
}

impl DexScreenerFetcher {
    pub const BASE_URL: &'static str = "https://api.dexscreener.com";

    /// Create a fetcher with its own HTTP client.
    pub fn new(config: &FetcherConfig) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            url: Self::pair_url(config),
        })
    }

    /// Templated pair URL.
    pub fn pair_url(config: &FetcherConfig) -> String {
        format!(
            "{}/latest/dex/pairs/{}/{}",
            config.base_url.trim_end_matches('/'),
            config.chain,
            config.token_address
        )
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn request_price(&self) -> Result<f64, FeedError> {
        let response = self.client.get(&self.url).send().await?;

        if !response.status().is_success() {
            return Err(FeedError::Status(response.status().as_u16()));
        }

        let body = response.text().await?;
        parse_price_payload(&body)
    }
}

#[async_trait]
impl PriceSource for DexScreenerFetcher {
    async fn fetch_price(&self) -> Result<f64, FeedError> {
        match self.request_price().await {
            Ok(price) => {
                debug!(price, "Fetched price");
                Ok(price)
            }
            Err(e) if e.is_transient() => {
                warn!(url = %self.url, error = %e, "Price feed unavailable");
                Err(e)
            }
            Err(e) => {
                error!(url = %self.url, error = %e, "Price feed returned unusable data");
                Err(e)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct PairResponse {
    pair: Option<PairData>,
}

#[derive(Debug, Deserialize)]
struct PairData {
    #[serde(rename = "priceUsd")]
    price_usd: Option<PriceValue>,
}

/// The API sends prices as strings, but numbers are accepted too.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PriceValue {
    Number(f64),
    Text(String),
}

/// Parse `{ "pair": { "priceUsd": ... } }` into a non-negative price.
pub fn parse_price_payload(body: &str) -> Result<f64, FeedError> {
    let response: PairResponse = serde_json::from_str(body)?;

    let pair = response.pair.ok_or(FeedError::MissingField("pair"))?;
    let value = pair.price_usd.ok_or(FeedError::MissingField("pair.priceUsd"))?;

    let price = match value {
        PriceValue::Number(n) => n,
        PriceValue::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| FeedError::InvalidPrice(s.clone()))?,
    };

    if !price.is_finite() || price < 0.0 {
        return Err(FeedError::InvalidPrice(price.to_string()));
    }

    Ok(price)
}
