//! Price source abstraction.

use crate::FeedError;
use async_trait::async_trait;

/// Anything that can report the current price of the watched token.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Fetch the current price in USD.
    async fn fetch_price(&self) -> Result<f64, FeedError>;
}
