//! # exchange-engine
//!
//! Puts the sequencer, the match engine, clearing and the ledger together
//! into one deterministic pipeline.
//!
//! - [`TradingEngine`]: applies sequenced events in order (placement,
//!   cancellation, transfers) and reports [`EngineEvent`]s
//! - [`OrderRegistry`] / [`OrderReader`]: open orders per user
//! - [`EngineRuntime`] / [`EngineHandle`]: the engine on its own thread,
//!   fed by a channel, with request/response correlation and a timeout
//! - [`telemetry`]: tracing subscriber setup
//!
//! ## Single writer
//!
//! Only the engine thread mutates books and balances. Everything handed out
//! by [`EngineHandle`] is a reader: [`exchange_ledger::AssetReader`],
//! [`OrderReader`] and the published [`exchange_types::OrderBookSnapshot`].
//! Readers may see an event half applied; they never block the writer.

pub mod engine;
pub mod events;
pub mod registry;
pub mod runtime;
pub mod telemetry;

pub use engine::TradingEngine;
pub use events::{EngineEvent, MatchRecord};
pub use registry::{OrderReader, OrderRegistry};
pub use runtime::{ApiResponse, EngineHandle, EngineRuntime};
