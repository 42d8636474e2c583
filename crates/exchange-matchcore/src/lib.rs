//! # exchange-matchcore
//!
//! **Continuous price/time-priority matching.**
//!
//! - [`OrderBook`]: resting orders of one direction, best price first,
//!   FIFO within a price level
//! - [`MatchEngine`]: a BUY book and a SELL book, the last trade price and
//!   the last processed sequence id
//! - [`determinism`]: digests for checking that two replays agree
//!
//! No balance checks and no I/O happen here. The engine is driven by a
//! single writer; callers settle the returned [`MatchResult`]s.
//!
//! [`MatchResult`]: exchange_types::MatchResult

pub mod determinism;
pub mod engine;
pub mod orderbook;
pub mod price_level;

pub use determinism::compute_book_digest;
pub use engine::MatchEngine;
pub use orderbook::OrderBook;
pub use price_level::PriceLevel;
