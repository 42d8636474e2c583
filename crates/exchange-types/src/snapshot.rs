//! Read-only projections of engine state.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::SequenceId;

/// Aggregated quantity resting at one price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Decimal,
    pub quantity: Decimal,
}

/// Depth view of both books, most favorable price first on each side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    /// Last sequence id processed by the match engine.
    pub sequence_id: SequenceId,
    /// Price of the most recent trade (zero before the first trade).
    pub market_price: Decimal,
    /// Bids, highest first.
    pub buy: Vec<BookLevel>,
    /// Asks, lowest first.
    pub sell: Vec<BookLevel>,
}

impl OrderBookSnapshot {
    #[must_use]
    pub fn best_bid(&self) -> Option<Decimal> {
        self.buy.first().map(|l| l.price)
    }

    #[must_use]
    pub fn best_ask(&self) -> Option<Decimal> {
        self.sell.first().map(|l| l.price)
    }
}
