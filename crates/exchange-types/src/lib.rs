//! # exchange-types
//!
//! Shared types, errors, and configuration for the exchange core.
//!
//! This crate is the leaf dependency of the workspace: every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`SequenceId`], [`OrderId`], [`UserId`], [`MarketPair`]
//! - **Order model**: [`Order`], [`Direction`], [`OrderStatus`]
//! - **Ledger model**: [`Balance`], [`TransferKind`], exact arithmetic in [`amount`]
//! - **Match output**: [`MatchResult`], [`MatchDetail`]
//! - **Events**: [`PendingEvent`], [`SequencedEvent`], [`EventRecord`], [`UniqueEventRecord`]
//! - **Egress**: [`ApiResult`], [`ApiError`], [`ApiPayload`]
//! - **Read views**: [`OrderBookSnapshot`], [`BookLevel`]
//! - **Configuration**: [`EngineConfig`], [`MarketConfig`], [`SequencerConfig`]
//! - **Errors**: [`ExchangeError`] with `EX_ERR_` prefix codes
//! - **Constants**: system-wide limits and defaults

pub mod amount;
pub mod api;
pub mod balance;
pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod ids;
pub mod match_result;
pub mod order;
pub mod snapshot;

// Re-export all primary types at crate root for ergonomic imports:
//   use exchange_types::{Order, Direction, MatchResult, ...};

pub use amount::{exact_add, exact_mul, exact_sub};
pub use api::*;
pub use balance::*;
pub use config::*;
pub use error::*;
pub use event::*;
pub use ids::*;
pub use match_result::*;
pub use order::*;
pub use snapshot::*;

// Constants are accessed via `exchange_types::constants::FOO`
// (not re-exported to avoid name collisions).
