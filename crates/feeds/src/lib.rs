//! Price feed for the watched token.
//!
//! - `source` - the `PriceSource` trait the monitor and the bot depend on
//! - `rest` - DexScreener REST fetcher and payload parsing

pub mod error;
pub mod rest;
pub mod source;

pub use error::*;
pub use rest::*;
pub use source::*;
