//! Core data types for the price watch bot.

pub mod error;
pub mod price;
pub mod watch;

pub use error::*;
pub use price::*;
pub use watch::*;
