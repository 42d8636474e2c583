//! Determinism verification utilities.
//!
//! Replaying the same event log must leave the same books. The book state is
//! reduced to a SHA-256 digest so two runs can be compared without diffing
//! every resting order.

use exchange_types::{Direction, Order};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

use crate::MatchEngine;

fn hash_decimal(hasher: &mut Sha256, value: Decimal) {
    hasher.update(value.normalize().to_string().as_bytes());
    hasher.update(b";");
}

fn hash_order(hasher: &mut Sha256, order: &Order) {
    hasher.update(order.id.0.to_le_bytes());
    hasher.update(order.sequence_id.0.to_le_bytes());
    hasher.update(order.user_id.0.to_le_bytes());
    hasher.update([match order.direction {
        Direction::Buy => 0u8,
        Direction::Sell => 1u8,
    }]);
    hash_decimal(hasher, order.price);
    hash_decimal(hasher, order.quantity);
    hash_decimal(hasher, order.unfilled_quantity);
    hasher.update(order.status.to_string().as_bytes());
    hasher.update(order.created_at.to_le_bytes());
    hasher.update(order.updated_at.to_le_bytes());
}

/// Digest over the full state of a match engine: last sequence id, market
/// price and every resting order in priority order on both sides.
#[must_use]
pub fn compute_book_digest(engine: &MatchEngine) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"exchange:book:v1:");
    hasher.update(engine.sequence_id().0.to_le_bytes());
    hash_decimal(&mut hasher, engine.market_price());
    for direction in [Direction::Buy, Direction::Sell] {
        let book = engine.book(direction);
        hasher.update((book.order_count() as u64).to_le_bytes());
        for order in book.orders() {
            hash_order(&mut hasher, order);
        }
    }
    hasher.finalize().into()
}
