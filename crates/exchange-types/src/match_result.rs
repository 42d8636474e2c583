//! Output of the continuous matcher.
//!
//! A [`MatchResult`] is the taker order (after matching) plus one
//! [`MatchDetail`] per maker it consumed, in the order the fills happened.
//! Orders are carried by value as post-match snapshots; the book stays the
//! sole owner of resting orders.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Order, OrderId, UserId, exact_mul};

/// One fill between the taker and a single resting maker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchDetail {
    /// Execution price, always the maker's resting price.
    pub price: Decimal,
    /// Executed quantity in the base asset.
    pub quantity: Decimal,
    pub taker_order_id: OrderId,
    pub taker_user_id: UserId,
    /// The maker as it stands after this fill.
    pub maker: Order,
}

impl MatchDetail {
    /// Quote amount = price × quantity, `None` if it is not exact.
    #[must_use]
    pub fn quote_amount(&self) -> Option<Decimal> {
        exact_mul(self.price, self.quantity)
    }

    /// Whether this fill exhausted the maker.
    #[must_use]
    pub fn maker_filled(&self) -> bool {
        self.maker.is_filled()
    }
}

impl std::fmt::Display for MatchDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} @ {} (taker {}, maker {})",
            self.quantity, self.price, self.taker_order_id, self.maker.id
        )
    }
}

/// Result of processing one taker order against the book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    /// The taker as it stands after matching.
    pub taker: Order,
    /// Fills in the exact order they occurred; settlement replays them in this order.
    pub details: Vec<MatchDetail>,
}

impl MatchResult {
    #[must_use]
    pub fn new(taker: Order) -> Self {
        Self {
            taker,
            details: Vec::new(),
        }
    }

    /// Total base quantity matched.
    #[must_use]
    pub fn matched_quantity(&self) -> Decimal {
        self.details.iter().map(|d| d.quantity).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.details.is_empty()
    }
}

impl std::fmt::Display for MatchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.details.is_empty() {
            return write!(f, "no matched.");
        }
        write!(f, "{} matched: ", self.details.len())?;
        for (i, detail) in self.details.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{detail}")?;
        }
        Ok(())
    }
}
