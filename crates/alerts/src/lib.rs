//! Telegram price alerts.
//!
//! This crate provides:
//! - SQLite storage for per-user watch slots
//! - The slot configuration wizard and its session store
//! - Telegram bot integration for commands, menus and notifications
//! - The monitoring cycle that fires and resets watches

pub mod callback;
pub mod db;
pub mod notifier;
pub mod telegram;
pub mod wizard;

pub use callback::CallbackAction;
pub use db::{Database, DbError};
pub use notifier::{AlertSender, CycleReport, Notifier, NotifierError};
pub use telegram::{TelegramBot, TelegramError};
pub use wizard::WizardSessions;
