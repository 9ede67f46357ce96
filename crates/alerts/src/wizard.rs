//! Per-user watch configuration flow.
//!
//! A user picks a slot, then a comparison type, then types a threshold. The
//! result is a staged draft that is only persisted when the user presses
//! Save. Everything here is in memory and is lost on restart.

use dashmap::DashMap;
use pricewatch_core::{ComparisonType, Slot, EQUAL_SLACK};

/// Step the user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    AwaitingType,
    AwaitingThreshold,
}

/// In-flight wizard of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingSetup {
    pub slot: Slot,
    pub stage: Stage,
}

/// Watch being assembled for a slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Draft {
    pub kind: ComparisonType,
    /// Set once the threshold passed validation
    pub threshold: Option<f64>,
}

/// A complete draft waiting for confirmation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StagedWatch {
    pub slot: Slot,
    pub kind: ComparisonType,
    pub threshold: f64,
}

/// Result of typing a comparison type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TypeOutcome {
    Accepted { slot: Slot, kind: ComparisonType },
    Invalid,
    NotAwaiting,
}

/// Result of typing a threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThresholdOutcome {
    Staged(StagedWatch),
    InvalidNumber,
    /// Equal threshold too far from the current price; state unchanged.
    TooFarFromPrice { current_price: f64 },
    /// Condition already holds; draft discarded.
    AlreadySatisfied { current_price: f64 },
    NotAwaiting,
}

/// Parse a typed threshold. Non-finite values are rejected.
pub fn parse_threshold(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Session store for in-flight wizards and staged drafts.
#[derive(Debug, Default)]
pub struct WizardSessions {
    pending: DashMap<i64, PendingSetup>,
    drafts: DashMap<(i64, Slot), Draft>,
}

impl WizardSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current wizard of a user, if any.
    pub fn pending(&self, user_id: i64) -> Option<PendingSetup> {
        self.pending.get(&user_id).map(|p| *p)
    }

    /// Start configuring a slot. Replaces whatever wizard was in flight.
    pub fn open_slot(&self, user_id: i64, slot: Slot) {
        self.pending.insert(
            user_id,
            PendingSetup {
                slot,
                stage: Stage::AwaitingType,
            },
        );
        self.drafts.remove(&(user_id, slot));
    }

    /// Comparison type picked from the menu.
    pub fn choose_type(&self, user_id: i64, slot: Slot, kind: ComparisonType) {
        self.drafts.insert(
            (user_id, slot),
            Draft {
                kind,
                threshold: None,
            },
        );
        self.pending.insert(
            user_id,
            PendingSetup {
                slot,
                stage: Stage::AwaitingThreshold,
            },
        );
    }

    /// Comparison type typed as text.
    pub fn submit_type_text(&self, user_id: i64, text: &str) -> TypeOutcome {
        let setup = match self.pending(user_id) {
            Some(setup) if setup.stage == Stage::AwaitingType => setup,
            _ => return TypeOutcome::NotAwaiting,
        };

        match text.parse::<ComparisonType>() {
            Ok(kind) => {
                self.choose_type(user_id, setup.slot, kind);
                TypeOutcome::Accepted {
                    slot: setup.slot,
                    kind,
                }
            }
            Err(_) => TypeOutcome::Invalid,
        }
    }

    /// Threshold typed as text. `current_price` is `None` when the price
    /// could not be fetched, in which case the price checks are skipped.
    pub fn submit_threshold(
        &self,
        user_id: i64,
        text: &str,
        current_price: Option<f64>,
    ) -> ThresholdOutcome {
        let slot = match self.pending(user_id) {
            Some(setup) if setup.stage == Stage::AwaitingThreshold => setup.slot,
            _ => return ThresholdOutcome::NotAwaiting,
        };

        let Some(draft) = self.drafts.get(&(user_id, slot)).map(|d| *d) else {
            self.pending.remove(&user_id);
            return ThresholdOutcome::NotAwaiting;
        };

        let Some(threshold) = parse_threshold(text) else {
            return ThresholdOutcome::InvalidNumber;
        };

        if let Some(price) = current_price {
            let met = draft.kind.is_met(price, threshold);

            if draft.kind == ComparisonType::Equal
                && !met
                && (price - threshold).abs() > EQUAL_SLACK
            {
                return ThresholdOutcome::TooFarFromPrice {
                    current_price: price,
                };
            }

            if met {
                self.pending.remove(&user_id);
                self.drafts.remove(&(user_id, slot));
                return ThresholdOutcome::AlreadySatisfied {
                    current_price: price,
                };
            }
        }

        self.drafts.insert(
            (user_id, slot),
            Draft {
                kind: draft.kind,
                threshold: Some(threshold),
            },
        );
        self.pending.remove(&user_id);

        ThresholdOutcome::Staged(StagedWatch {
            slot,
            kind: draft.kind,
            threshold,
        })
    }

    /// Remove and return a complete draft for saving.
    pub fn take_draft(&self, user_id: i64, slot: Slot) -> Option<StagedWatch> {
        let (_, draft) = self
            .drafts
            .remove_if(&(user_id, slot), |_, d| d.threshold.is_some())?;

        draft.threshold.map(|threshold| StagedWatch {
            slot,
            kind: draft.kind,
            threshold,
        })
    }

    /// Drop everything in flight for a slot. Returns true if anything was removed.
    pub fn cancel_slot(&self, user_id: i64, slot: Slot) -> bool {
        let wizard = self
            .pending
            .remove_if(&user_id, |_, p| p.slot == slot)
            .is_some();
        let draft = self.drafts.remove(&(user_id, slot)).is_some();
        wizard || draft
    }
}
