//! Continuous price/time-priority matcher.
//!
//! ```text
//! process_order(sequence_id, taker) -> MatchResult
//! ```
//!
//! The taker walks the opposite book from its best price while it still
//! crosses. Every fill prints at the maker's resting price. Any remainder
//! rests in the taker's own book.
//!
//! The engine owns every resting order. A [`MatchResult`] carries post-fill
//! copies, in fill order, for settlement and notification.

use std::fmt;

use exchange_types::*;
use rust_decimal::Decimal;

use crate::OrderBook;

/// Both books of one market plus the last trade price.
#[derive(Debug)]
pub struct MatchEngine {
    buy_book: OrderBook,
    sell_book: OrderBook,
    market_price: Decimal,
    sequence_id: SequenceId,
}

impl MatchEngine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buy_book: OrderBook::new(Direction::Buy),
            sell_book: OrderBook::new(Direction::Sell),
            market_price: Decimal::ZERO,
            sequence_id: SequenceId::ZERO,
        }
    }

    /// Price of the most recent trade, zero before the first one.
    #[must_use]
    pub fn market_price(&self) -> Decimal {
        self.market_price
    }

    /// Sequence id of the last processed order.
    #[must_use]
    pub fn sequence_id(&self) -> SequenceId {
        self.sequence_id
    }

    #[must_use]
    pub fn book(&self, direction: Direction) -> &OrderBook {
        match direction {
            Direction::Buy => &self.buy_book,
            Direction::Sell => &self.sell_book,
        }
    }

    /// A resting order on either side.
    #[must_use]
    pub fn get_order(&self, order_id: OrderId) -> Option<&Order> {
        self.buy_book
            .get(order_id)
            .or_else(|| self.sell_book.get(order_id))
    }

    // =================================================================
    // Matching
    // =================================================================

    /// Match `taker` against the opposite book and rest any remainder.
    ///
    /// # Errors
    /// [`ExchangeError::InvalidOrder`] for a non-positive quantity or an
    /// order that already traded; [`ExchangeError::DuplicateOrder`] if an
    /// order with the taker's id is already resting.
    pub fn process_order(&mut self, sequence_id: SequenceId, mut taker: Order) -> Result<MatchResult> {
        if taker.quantity <= Decimal::ZERO || taker.unfilled_quantity != taker.quantity {
            return Err(ExchangeError::InvalidOrder {
                reason: format!(
                    "order {} must be fresh with positive quantity (quantity={}, unfilled={})",
                    taker.id, taker.quantity, taker.unfilled_quantity
                ),
            });
        }
        if self.get_order(taker.id).is_some() {
            return Err(ExchangeError::DuplicateOrder(taker.id));
        }
        self.sequence_id = sequence_id;

        let ts = taker.created_at;
        let (maker_book, taker_book) = match taker.direction {
            Direction::Buy => (&mut self.sell_book, &mut self.buy_book),
            Direction::Sell => (&mut self.buy_book, &mut self.sell_book),
        };

        let mut details = Vec::new();
        let mut unfilled = taker.unfilled_quantity;
        let mut last_price = None;

        while !unfilled.is_zero() {
            let Some(maker) = maker_book.best_mut() else {
                break;
            };
            if !taker.crosses(maker.price) {
                break;
            }
            let price = maker.price;
            let quantity = unfilled.min(maker.unfilled_quantity);
            unfilled -= quantity;

            let maker_unfilled = maker.unfilled_quantity - quantity;
            let maker_status = OrderStatus::after_fill(maker_unfilled, maker.quantity);
            maker.update(maker_unfilled, maker_status, ts);

            let maker = if maker_unfilled.is_zero() {
                maker_book
                    .pop_best()
                    .ok_or_else(|| ExchangeError::invariant("best maker vanished mid-match"))?
            } else {
                maker.clone()
            };
            tracing::trace!(
                taker = %taker.id, maker = %maker.id, %price, %quantity,
                "fill"
            );
            last_price = Some(price);
            details.push(MatchDetail {
                price,
                quantity,
                taker_order_id: taker.id,
                taker_user_id: taker.user_id,
                maker,
            });
        }

        taker.update(unfilled, OrderStatus::after_fill(unfilled, taker.quantity), ts);
        if !unfilled.is_zero() {
            taker_book.add(taker.clone())?;
        }
        if let Some(price) = last_price {
            self.market_price = price;
        }

        Ok(MatchResult { taker, details })
    }

    // =================================================================
    // Cancellation
    // =================================================================

    /// Remove a resting order and mark it cancelled at `ts`.
    ///
    /// # Errors
    /// [`ExchangeError::InvariantViolation`] if the order is not resting in
    /// the book its direction names.
    pub fn cancel(&mut self, ts: i64, order: &Order) -> Result<Order> {
        let book = match order.direction {
            Direction::Buy => &mut self.buy_book,
            Direction::Sell => &mut self.sell_book,
        };
        let mut removed = book.remove(order.id).ok_or_else(|| {
            ExchangeError::invariant(format!(
                "order not found: {} in {} book",
                order.id, order.direction
            ))
        })?;
        let status = OrderStatus::after_cancel(removed.unfilled_quantity, removed.quantity);
        removed.update(removed.unfilled_quantity, status, ts);
        Ok(removed)
    }

    // =================================================================
    // Projections
    // =================================================================

    /// Aggregated depth of both books, at most `max_depth` levels per side.
    #[must_use]
    pub fn order_book_snapshot(&self, max_depth: usize) -> OrderBookSnapshot {
        OrderBookSnapshot {
            sequence_id: self.sequence_id,
            market_price: self.market_price,
            buy: self.buy_book.depth(max_depth),
            sell: self.sell_book.depth(max_depth),
        }
    }
}

impl Default for MatchEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Price ladder: asks highest first, a separator, then bids highest first.
impl fmt::Display for MatchEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} market price: {}", self.sequence_id, self.market_price)?;
        let asks: Vec<_> = self.sell_book.levels().collect();
        for level in asks.iter().rev() {
            writeln!(
                f,
                "  SELL {:>12} {:>12} ({})",
                level.price.to_string(),
                level.total_quantity().to_string(),
                level.len()
            )?;
        }
        writeln!(f, "  ----")?;
        for level in self.buy_book.levels() {
            writeln!(
                f,
                "  BUY  {:>12} {:>12} ({})",
                level.price.to_string(),
                level.total_quantity().to_string(),
                level.len()
            )?;
        }
        Ok(())
    }
}
