//! Price monitoring cycle.

use crate::db::Database;
use crate::telegram::TelegramError;
use async_trait::async_trait;
use pricewatch_core::{format_price, PriceChange, Slot};
use pricewatch_feeds::PriceSource;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum NotifierError {
    #[error("Database error: {0}")]
    Db(#[from] crate::db::DbError),
    #[error("Telegram error: {0}")]
    Telegram(#[from] TelegramError),
}

/// Delivers alert messages to users.
#[async_trait]
pub trait AlertSender: Send + Sync {
    async fn send_alert(&self, user_id: i64, message: &str) -> Result<(), TelegramError>;
}

/// Outcome of one monitoring cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub price: f64,
    pub change: Option<PriceChange>,
    /// Armed watches evaluated
    pub checked: usize,
    pub fired: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Checks armed watches against the current price and alerts their owners.
pub struct Notifier {
    db: Database,
    source: Arc<dyn PriceSource>,
    sender: Arc<dyn AlertSender>,
    last_price: RwLock<Option<f64>>,
}

impl Notifier {
    /// Create a new notifier.
    pub fn new(db: Database, source: Arc<dyn PriceSource>, sender: Arc<dyn AlertSender>) -> Self {
        Self {
            db,
            source,
            sender,
            last_price: RwLock::new(None),
        }
    }

    /// Price seen by the previous successful cycle.
    pub fn last_price(&self) -> Option<f64> {
        self.last_price.read().ok().and_then(|p| *p)
    }

    fn swap_last_price(&self, price: f64) -> Option<f64> {
        match self.last_price.write() {
            Ok(mut lock) => lock.replace(price),
            Err(_) => None,
        }
    }

    /// Run one cycle. Returns `None` when the price could not be fetched.
    pub async fn run_cycle(&self) -> Result<Option<CycleReport>, NotifierError> {
        let price = match self.source.fetch_price().await {
            Ok(price) => price,
            Err(e) => {
                debug!(error = %e, "Skipping cycle: no price");
                return Ok(None);
            }
        };

        let previous = self.swap_last_price(price);
        let change = PriceChange::between(previous, price);

        let watches = self.db.armed_watches().await?;
        let mut report = CycleReport {
            price,
            change,
            checked: watches.len(),
            fired: 0,
            delivered: 0,
            failed: 0,
        };

        for watch in watches.iter().filter(|w| w.fires_at(price)) {
            report.fired += 1;

            let message = format_alert_message(watch.slot, price, change);
            match self.sender.send_alert(watch.user_id, &message).await {
                Ok(()) => {
                    info!(
                        user_id = watch.user_id,
                        slot = %watch.slot,
                        kind = %watch.kind,
                        threshold = watch.threshold,
                        price,
                        "Alert sent"
                    );
                    report.delivered += 1;
                }
                Err(e) => {
                    error!(user_id = watch.user_id, error = %e, "Failed to send alert");
                    report.failed += 1;
                }
            }

            // Reset regardless of delivery so the watch cannot fire again
            match self.db.reset_fired(watch).await {
                Ok(true) => {}
                Ok(false) => {
                    warn!(
                        user_id = watch.user_id,
                        slot = %watch.slot,
                        "Watch changed during cycle, not reset"
                    );
                }
                Err(e) => {
                    error!(
                        user_id = watch.user_id,
                        slot = %watch.slot,
                        error = %e,
                        "Failed to reset fired watch"
                    );
                }
            }
        }

        Ok(Some(report))
    }
}

/// Format a threshold hit as an alert message.
pub fn format_alert_message(slot: Slot, price: f64, change: Option<PriceChange>) -> String {
    let mut msg = format!(
        "❗️ <b>Price Alert</b> (slot {})\n\n<b>Price:</b> {}",
        slot,
        format_price(price)
    );

    if let Some(change) = change {
        msg.push_str(&format!("\n⚙️ <b>Change:</b> {}", change.display()));
    }

    let now = chrono::Utc::now();
    msg.push_str(&format!("\n\n⏰ {}", now.format("%Y-%m-%d %H:%M:%S UTC")));

    msg
}
