//! Inline keyboard callback data.
//!
//! Format: `config_slot:<slot>`, `type:<slot>:<token>`, `delete:<slot>`,
//! `save_config:<slot>`.

use pricewatch_core::{ComparisonType, Slot};
use std::fmt;
use std::str::FromStr;

/// Action encoded in a button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    /// Open the config menu of a slot
    ConfigSlot(Slot),
    /// Pick the comparison type for a slot
    SetType(Slot, ComparisonType),
    /// Disable a slot
    Delete(Slot),
    /// Persist the staged draft of a slot
    Save(Slot),
}

impl fmt::Display for CallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackAction::ConfigSlot(slot) => write!(f, "config_slot:{}", slot),
            CallbackAction::SetType(slot, kind) => write!(f, "type:{}:{}", slot, kind.as_str()),
            CallbackAction::Delete(slot) => write!(f, "delete:{}", slot),
            CallbackAction::Save(slot) => write!(f, "save_config:{}", slot),
        }
    }
}

/// Callback data that does not decode to an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCallback(pub String);

impl fmt::Display for UnknownCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown callback data: {}", self.0)
    }
}

impl std::error::Error for UnknownCallback {}

impl FromStr for CallbackAction {
    type Err = UnknownCallback;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || UnknownCallback(s.to_string());
        let mut parts = s.split(':');
        let kind = parts.next().ok_or_else(unknown)?;
        let slot: Slot = parts
            .next()
            .ok_or_else(unknown)?
            .parse()
            .map_err(|_| unknown())?;

        let action = match kind {
            "config_slot" => CallbackAction::ConfigSlot(slot),
            "type" => {
                let token = parts.next().ok_or_else(unknown)?;
                let comparison = token.parse().map_err(|_| unknown())?;
                CallbackAction::SetType(slot, comparison)
            }
            "delete" => CallbackAction::Delete(slot),
            "save_config" => CallbackAction::Save(slot),
            _ => return Err(unknown()),
        };

        if parts.next().is_some() {
            return Err(unknown());
        }
        Ok(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn slot(n: i64) -> Slot {
        Slot::new(n).unwrap()
    }

    #[test]
    fn test_encode() {
        assert_eq!(CallbackAction::ConfigSlot(slot(1)).to_string(), "config_slot:1");
        assert_eq!(
            CallbackAction::SetType(slot(2), ComparisonType::Below).to_string(),
            "type:2:below"
        );
        assert_eq!(CallbackAction::Delete(slot(3)).to_string(), "delete:3");
        assert_eq!(CallbackAction::Save(slot(1)).to_string(), "save_config:1");
    }

    #[test]
    fn test_decode_legacy_type_token() {
        assert_eq!(
            "type:1:равно".parse::<CallbackAction>().unwrap(),
            CallbackAction::SetType(slot(1), ComparisonType::Equal)
        );
    }

    #[test]
    fn test_decode_rejects_garbage() {
        for data in [
            "",
            "config_slot",
            "config_slot:9",
            "type:1",
            "type:1:none",
            "delete:1:extra",
            "launch:1",
        ] {
            assert!(data.parse::<CallbackAction>().is_err(), "{data}");
        }
    }
}
