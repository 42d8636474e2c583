//! Order types for the exchange core.
//!
//! An order is created by the trading engine when an order request is
//! sequenced, mutated only by matching or cancellation, and removed from
//! the live book as soon as it is fully filled or cancelled.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{OrderId, SequenceId, UserId};

/// Which side of the book this order is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Buy,
    Sell,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    PartialFilled,
    FullyFilled,
    PartialCancelled,
    FullyCancelled,
}

impl OrderStatus {
    /// Status after matching left `unfilled` of `quantity`.
    #[must_use]
    pub fn after_fill(unfilled: Decimal, quantity: Decimal) -> Self {
        if unfilled.is_zero() {
            Self::FullyFilled
        } else if unfilled == quantity {
            Self::Pending
        } else {
            Self::PartialFilled
        }
    }

    /// Status after a cancellation with `unfilled` of `quantity` left.
    #[must_use]
    pub fn after_cancel(unfilled: Decimal, quantity: Decimal) -> Self {
        if unfilled == quantity {
            Self::FullyCancelled
        } else {
            Self::PartialCancelled
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::PartialFilled => write!(f, "PARTIAL_FILLED"),
            Self::FullyFilled => write!(f, "FULLY_FILLED"),
            Self::PartialCancelled => write!(f, "PARTIAL_CANCELLED"),
            Self::FullyCancelled => write!(f, "FULLY_CANCELLED"),
        }
    }
}

/// A limit order.
///
/// Invariant: `0 <= unfilled_quantity <= quantity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Sequence id of the event that created this order.
    pub sequence_id: SequenceId,
    pub user_id: UserId,
    pub direction: Direction,
    pub price: Decimal,
    pub quantity: Decimal,
    pub unfilled_quantity: Decimal,
    pub status: OrderStatus,
    /// Sequencer timestamp (ms) of the creating event.
    pub created_at: i64,
    /// Sequencer timestamp (ms) of the last mutation.
    pub updated_at: i64,
}

impl Order {
    /// A fresh, unmatched order.
    #[must_use]
    pub fn new(
        sequence_id: SequenceId,
        user_id: UserId,
        direction: Direction,
        price: Decimal,
        quantity: Decimal,
        created_at: i64,
    ) -> Self {
        Self {
            id: OrderId::from(sequence_id),
            sequence_id,
            user_id,
            direction,
            price,
            quantity,
            unfilled_quantity: quantity,
            status: OrderStatus::Pending,
            created_at,
            updated_at: created_at,
        }
    }

    /// Record a new remaining quantity and status.
    pub fn update(&mut self, unfilled_quantity: Decimal, status: OrderStatus, ts: i64) {
        self.unfilled_quantity = unfilled_quantity;
        self.status = status;
        self.updated_at = ts;
    }

    /// Whether this order, as a taker, trades against a maker resting at `maker_price`.
    #[must_use]
    pub fn crosses(&self, maker_price: Decimal) -> bool {
        match self.direction {
            Direction::Buy => self.price >= maker_price,
            Direction::Sell => self.price <= maker_price,
        }
    }

    #[must_use]
    pub fn is_filled(&self) -> bool {
        self.unfilled_quantity.is_zero()
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl Order {
    /// A pending limit order with explicit id and user.
    pub fn dummy(
        id: u64,
        user: u64,
        direction: Direction,
        price: Decimal,
        quantity: Decimal,
    ) -> Self {
        let created_at = i64::try_from(id).unwrap_or(i64::MAX);
        Self::new(
            SequenceId(id),
            UserId(user),
            direction,
            price,
            quantity,
            created_at,
        )
    }
}
