//! Price helpers shared by the monitor and the bot.

/// Smallest absolute percent change worth reporting.
pub const MIN_REPORTED_CHANGE_PCT: f64 = 0.01;

/// Percent change between two observations, rounded to 2 decimals.
/// A previous price of zero yields 0.
pub fn percent_change(previous: f64, current: f64) -> f64 {
    if previous == 0.0 {
        return 0.0;
    }
    let pct = (current - previous) / previous * 100.0;
    (pct * 100.0).round() / 100.0
}

/// Change annotation attached to alerts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceChange {
    /// Rounded percent change
    pub percent: f64,
}

impl PriceChange {
    /// Returns `None` when there is no previous price or the move is too small.
    pub fn between(previous: Option<f64>, current: f64) -> Option<Self> {
        let percent = percent_change(previous?, current);
        if percent.abs() > MIN_REPORTED_CHANGE_PCT {
            Some(Self { percent })
        } else {
            None
        }
    }

    #[inline]
    pub fn is_up(&self) -> bool {
        self.percent > 0.0
    }

    /// Rendered annotation, e.g. `+1.25% 🟢`.
    pub fn display(&self) -> String {
        if self.is_up() {
            format!("+{:.2}% 🟢", self.percent)
        } else {
            format!("{:.2}% 🔴", self.percent)
        }
    }
}

/// Format price with appropriate precision based on magnitude.
pub fn format_price(price: f64) -> String {
    if price == 0.0 {
        return "$0".to_string();
    }
    let abs_price = price.abs();
    if abs_price >= 1000.0 {
        format!("${:.2}", price)
    } else if abs_price >= 1.0 {
        format!("${:.4}", price)
    } else if abs_price >= 0.01 {
        format!("${:.6}", price)
    } else if abs_price >= 0.0001 {
        format!("${:.8}", price)
    } else {
        format!("${:.10}", price)
    }
}
