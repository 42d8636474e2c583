//! Egress events published after each sequenced event is processed.

use exchange_types::{ApiResult, Direction, MatchDetail, Order, OrderId, SequenceId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One executed trade, as published to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// Sequence id of the taker's order request.
    pub sequence_id: SequenceId,
    pub price: Decimal,
    pub quantity: Decimal,
    pub taker_order_id: OrderId,
    pub taker_user_id: UserId,
    pub taker_direction: Direction,
    pub maker_order_id: OrderId,
    pub maker_user_id: UserId,
    pub created_at: i64,
}

impl MatchRecord {
    #[must_use]
    pub fn new(sequence_id: SequenceId, taker: &Order, detail: &MatchDetail) -> Self {
        Self {
            sequence_id,
            price: detail.price,
            quantity: detail.quantity,
            taker_order_id: taker.id,
            taker_user_id: taker.user_id,
            taker_direction: taker.direction,
            maker_order_id: detail.maker.id,
            maker_user_id: detail.maker.user_id,
            created_at: taker.updated_at,
        }
    }
}

/// Everything the engine tells the outside world.
///
/// For one sequenced event the order is: trades in fill order, then order
/// updates and removals, then the correlated [`ApiResult`] if the event
/// carried a `ref_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngineEvent {
    Matched(MatchRecord),
    /// An order that is still open after this event.
    OrderUpdated(Order),
    /// An order that is filled or cancelled and has left the book.
    OrderClosed(Order),
    ApiResult(ApiResult),
}

impl EngineEvent {
    /// The correlated result, if this is one.
    #[must_use]
    pub fn as_api_result(&self) -> Option<&ApiResult> {
        match self {
            Self::ApiResult(result) => Some(result),
            _ => None,
        }
    }
}
