//! # exchange-clearing
//!
//! Turns match results and cancellations into ledger movements.
//!
//! ```text
//! MatchEngine ──MatchResult──► ClearingService ──transfer/unfreeze──► AssetService
//!                                     │
//!                                     └──► removed orders (filled or cancelled)
//! ```
//!
//! Fills are settled in the exact order they happened. A BUY taker that
//! trades below its limit gets the price improvement refunded from its own
//! reservation before paying the maker.

pub mod clearing;

pub use clearing::ClearingService;
