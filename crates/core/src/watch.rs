//! Watch slots and comparison types.

use crate::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tolerance used when checking an `Equal` watch.
pub const EQUAL_EPSILON: f64 = 1e-5;

/// Maximum distance between an `Equal` threshold and the current price
/// accepted when the watch is configured.
pub const EQUAL_SLACK: f64 = 0.1;

/// One of the three watch slots a user owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Slot(u8);

impl Slot {
    /// Number of slots every user gets.
    pub const COUNT: u8 = 3;

    /// All slots in display order.
    pub const ALL: [Slot; 3] = [Slot(1), Slot(2), Slot(3)];

    /// Create a slot, rejecting anything outside 1..=3.
    pub fn new(n: i64) -> Result<Self, CoreError> {
        if (1..=Self::COUNT as i64).contains(&n) {
            Ok(Self(n as u8))
        } else {
            Err(CoreError::InvalidSlot(n))
        }
    }

    #[inline]
    pub fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Slot {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let n = s
            .trim()
            .parse::<i64>()
            .map_err(|_| CoreError::InvalidSlot(0))?;
        Slot::new(n)
    }
}

/// Condition a watch checks against the price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonType {
    Above,
    Equal,
    Below,
    /// Slot is disabled.
    #[default]
    None,
}

impl ComparisonType {
    /// Types a user can pick, in keyboard order.
    pub const SELECTABLE: [ComparisonType; 3] = [
        ComparisonType::Above,
        ComparisonType::Below,
        ComparisonType::Equal,
    ];

    /// Token stored in the database and in callback data.
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonType::Above => "above",
            ComparisonType::Equal => "equal",
            ComparisonType::Below => "below",
            ComparisonType::None => "none",
        }
    }

    /// Capitalized name for buttons and messages.
    pub fn label(&self) -> &'static str {
        match self {
            ComparisonType::Above => "Above",
            ComparisonType::Equal => "Equal",
            ComparisonType::Below => "Below",
            ComparisonType::None => "None",
        }
    }

    /// Parse a stored column value. Accepts `none` in addition to the user tokens.
    pub fn from_stored(s: &str) -> Result<Self, CoreError> {
        if s.trim().eq_ignore_ascii_case("none") {
            return Ok(ComparisonType::None);
        }
        s.parse()
    }

    /// Evaluate the condition. `None` never matches.
    pub fn is_met(&self, price: f64, threshold: f64) -> bool {
        match self {
            ComparisonType::Above => price > threshold,
            ComparisonType::Equal => (price - threshold).abs() < EQUAL_EPSILON,
            ComparisonType::Below => price < threshold,
            ComparisonType::None => false,
        }
    }
}

impl fmt::Display for ComparisonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComparisonType {
    type Err = CoreError;

    /// Parses user input. `none` is not a user-selectable type.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim().to_lowercase();
        match token.as_str() {
            "above" | "выше" => Ok(ComparisonType::Above),
            "equal" | "равно" => Ok(ComparisonType::Equal),
            "below" | "ниже" => Ok(ComparisonType::Below),
            _ => Err(CoreError::UnknownComparison(s.trim().to_string())),
        }
    }
}

/// A persisted watch row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Watch {
    /// Telegram user (and private chat) id
    pub user_id: i64,
    pub slot: Slot,
    pub threshold: f64,
    pub kind: ComparisonType,
}

impl Watch {
    /// Disabled watch as created for a new user.
    pub fn empty(user_id: i64, slot: Slot) -> Self {
        Self {
            user_id,
            slot,
            threshold: 0.0,
            kind: ComparisonType::None,
        }
    }

    #[inline]
    pub fn is_armed(&self) -> bool {
        self.kind != ComparisonType::None
    }

    /// Check whether this watch fires at the given price.
    pub fn fires_at(&self, price: f64) -> bool {
        self.kind.is_met(price, self.threshold)
    }

    /// Button text for the watch summary keyboard.
    pub fn summary_label(&self) -> String {
        if self.kind == ComparisonType::None && self.threshold == 0.0 {
            format!("Slot {}: None", self.slot)
        } else {
            format!("Slot {}: ({}) {}", self.slot, self.kind.label(), self.threshold)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_slot_bounds() {
        assert!(Slot::new(0).is_err());
        assert_eq!(Slot::new(1).unwrap().get(), 1);
        assert_eq!(Slot::new(3).unwrap().get(), 3);
        assert!(Slot::new(4).is_err());
        assert!(Slot::new(-1).is_err());
    }

    #[test]
    fn test_slot_from_str() {
        assert_eq!("2".parse::<Slot>().unwrap(), Slot::ALL[1]);
        assert!("x".parse::<Slot>().is_err());
        assert!("9".parse::<Slot>().is_err());
    }

    #[test]
    fn test_comparison_from_user_tokens() {
        assert_eq!("выше".parse::<ComparisonType>().unwrap(), ComparisonType::Above);
        assert_eq!("ВЫШЕ".parse::<ComparisonType>().unwrap(), ComparisonType::Above);
        assert_eq!(" Равно ".parse::<ComparisonType>().unwrap(), ComparisonType::Equal);
        assert_eq!("ниже".parse::<ComparisonType>().unwrap(), ComparisonType::Below);
        assert_eq!("Above".parse::<ComparisonType>().unwrap(), ComparisonType::Above);
        assert!("none".parse::<ComparisonType>().is_err());
        assert!("sideways".parse::<ComparisonType>().is_err());
    }

    #[test]
    fn test_comparison_from_stored() {
        assert_eq!(ComparisonType::from_stored("none").unwrap(), ComparisonType::None);
        assert_eq!(ComparisonType::from_stored("below").unwrap(), ComparisonType::Below);
        assert!(ComparisonType::from_stored("garbage").is_err());
    }

    #[test]
    fn test_none_never_fires() {
        for price in [0.0, 1.0, 100.0, 1e9] {
            assert!(!ComparisonType::None.is_met(price, 0.0));
            assert!(!ComparisonType::None.is_met(price, price));
        }
    }

    #[test]
    fn test_threshold_comparisons() {
        assert!(ComparisonType::Above.is_met(101.0, 100.0));
        assert!(!ComparisonType::Above.is_met(100.0, 100.0));
        assert!(ComparisonType::Below.is_met(99.0, 100.0));
        assert!(!ComparisonType::Below.is_met(100.0, 100.0));
        assert!(ComparisonType::Equal.is_met(100.0, 100.0));
        assert!(ComparisonType::Equal.is_met(100.000001, 100.0));
        assert!(!ComparisonType::Equal.is_met(100.0001, 100.0));
    }

    #[test]
    fn test_summary_label() {
        let slot = Slot::new(2).unwrap();
        assert_eq!(Watch::empty(7, slot).summary_label(), "Slot 2: None");

        let watch = Watch {
            user_id: 7,
            slot,
            threshold: 1.5,
            kind: ComparisonType::Below,
        };
        assert_eq!(watch.summary_label(), "Slot 2: (Below) 1.5");
        assert!(watch.is_armed());
        assert!(watch.fires_at(1.0));
    }
}
