//! Settlement of match results and cancellations.
//!
//! Every order reserved funds when it was placed:
//! - BUY: `price × quantity` of the quote asset
//! - SELL: `quantity` of the base asset
//!
//! Clearing only ever moves frozen funds, so each step is a
//! [`AssetService::transfer`] or [`AssetService::unfreeze`] that must
//! succeed. A failure means the ledger and the books disagree and is
//! returned as a fatal [`ExchangeError::InvariantViolation`].
//!
//! Orders that can no longer change are returned to the caller as removal
//! notifications instead of being pushed into a history store from here.

use exchange_ledger::AssetService;
use exchange_types::{
    Asset, Direction, ExchangeError, MarketPair, MatchDetail, MatchResult, Order, Result,
    TransferKind, exact_mul, exact_sub,
};
use rust_decimal::Decimal;

/// Settles one market against the ledger.
#[derive(Debug, Clone)]
pub struct ClearingService {
    market: MarketPair,
}

impl ClearingService {
    #[must_use]
    pub fn new(market: MarketPair) -> Self {
        Self { market }
    }

    #[must_use]
    pub fn market(&self) -> &MarketPair {
        &self.market
    }

    /// The asset and amount an order of this shape must freeze on placement.
    ///
    /// # Errors
    /// [`ExchangeError::AmountOverflow`] if `price × quantity` is not exact.
    pub fn reservation(
        &self,
        direction: Direction,
        price: Decimal,
        quantity: Decimal,
    ) -> Result<(&Asset, Decimal)> {
        match direction {
            Direction::Buy => {
                let amount =
                    exact_mul(price, quantity).ok_or_else(|| ExchangeError::AmountOverflow {
                        reason: format!("{price} × {quantity} {}", self.market.quote),
                    })?;
                Ok((&self.market.quote, amount))
            }
            Direction::Sell => Ok((&self.market.base, quantity)),
        }
    }

    /// Settle every fill of `result` in the order it happened.
    ///
    /// Returns the orders that this result closed: filled makers in fill
    /// order, then the taker if it was filled too.
    ///
    /// # Errors
    /// [`ExchangeError::InvariantViolation`] if any frozen balance is short.
    pub fn clear_match_result(
        &self,
        assets: &mut AssetService,
        result: &MatchResult,
    ) -> Result<Vec<Order>> {
        let taker = &result.taker;
        let mut removed = Vec::new();

        for detail in &result.details {
            match taker.direction {
                Direction::Buy => self.clear_buy_taker(assets, taker, detail)?,
                Direction::Sell => self.clear_sell_taker(assets, taker, detail)?,
            }
            if detail.maker.is_filled() {
                removed.push(detail.maker.clone());
            }
        }
        if taker.is_filled() {
            removed.push(taker.clone());
        }
        Ok(removed)
    }

    fn clear_buy_taker(
        &self,
        assets: &mut AssetService,
        taker: &Order,
        detail: &MatchDetail,
    ) -> Result<()> {
        let maker = &detail.maker;
        let quote = &self.market.quote;
        let base = &self.market.base;

        if taker.price > detail.price {
            let refund = exact_sub(taker.price, detail.price)
                .and_then(|diff| exact_mul(diff, detail.quantity))
                .ok_or_else(|| {
                    ExchangeError::invariant(format!("refund for order {} overflows", taker.id))
                })?;
            assets.unfreeze(taker.user_id, quote, refund)?;
            tracing::debug!(
                user = %taker.user_id, order = %taker.id, %refund,
                "price improvement refunded"
            );
        }
        assets.transfer(
            TransferKind::FrozenToAvailable,
            taker.user_id,
            maker.user_id,
            quote,
            quote_amount(detail)?,
        )?;
        assets.transfer(
            TransferKind::FrozenToAvailable,
            maker.user_id,
            taker.user_id,
            base,
            detail.quantity,
        )?;
        tracing::debug!(
            taker = %taker.id, maker = %maker.id,
            price = %detail.price, quantity = %detail.quantity,
            "cleared buy taker fill"
        );
        Ok(())
    }

    fn clear_sell_taker(
        &self,
        assets: &mut AssetService,
        taker: &Order,
        detail: &MatchDetail,
    ) -> Result<()> {
        let maker = &detail.maker;
        assets.transfer(
            TransferKind::FrozenToAvailable,
            taker.user_id,
            maker.user_id,
            &self.market.base,
            detail.quantity,
        )?;
        assets.transfer(
            TransferKind::FrozenToAvailable,
            maker.user_id,
            taker.user_id,
            &self.market.quote,
            quote_amount(detail)?,
        )?;
        tracing::debug!(
            taker = %taker.id, maker = %maker.id,
            price = %detail.price, quantity = %detail.quantity,
            "cleared sell taker fill"
        );
        Ok(())
    }

    /// Release what a cancelled order still had reserved.
    ///
    /// Returns the order as its removal notification.
    ///
    /// # Errors
    /// [`ExchangeError::InvariantViolation`] if less than the remaining
    /// reservation is frozen.
    pub fn clear_cancel_order(&self, assets: &mut AssetService, order: &Order) -> Result<Order> {
        let (asset, amount) = self
            .reservation(order.direction, order.price, order.unfilled_quantity)
            .and_then(|(asset, amount)| {
                assets.unfreeze(order.user_id, asset, amount)?;
                Ok((asset, amount))
            })
            .map_err(|err| {
                ExchangeError::invariant(format!("cancel of order {}: {err}", order.id))
            })?;
        tracing::debug!(
            order = %order.id, user = %order.user_id, asset = %asset, %amount,
            "cancel cleared"
        );
        Ok(order.clone())
    }
}

/// A fill's quote amount. The order it came from reserved at least this
/// much, so it is always exact.
fn quote_amount(detail: &MatchDetail) -> Result<Decimal> {
    detail.quote_amount().ok_or_else(|| {
        ExchangeError::invariant(format!(
            "fill {} × {} of order {} overflows",
            detail.price, detail.quantity, detail.taker_order_id
        ))
    })
}

#[cfg(test)]
mod tests {
    use exchange_types::*;

    use super::*;

    fn d(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    fn market() -> MarketPair {
        MarketPair::new("BTC", "USD")
    }

    fn fund(assets: &mut AssetService, user: u64, asset: &str, amount: i64) {
        assets
            .try_transfer(
                TransferKind::AvailableToAvailable,
                UserId::DEBT,
                UserId(user),
                asset,
                d(amount),
                false,
            )
            .unwrap();
    }

    #[test]
    fn reservation_per_direction() {
        let clearing = ClearingService::new(market());
        let (asset, amount) = clearing.reservation(Direction::Buy, d(100), d(3)).unwrap();
        assert_eq!((asset.as_str(), amount), ("USD", d(300)));
        let (asset, amount) = clearing.reservation(Direction::Sell, d(100), d(3)).unwrap();
        assert_eq!((asset.as_str(), amount), ("BTC", d(3)));
    }

    #[test]
    fn reservation_that_cannot_be_exact_is_rejected() {
        let clearing = ClearingService::new(market());
        let price = Decimal::from_i128_with_scale(100_000_000_000_000_000_000, 0);
        let err = clearing
            .reservation(Direction::Buy, price, Decimal::from(10_000_000_000_i64))
            .unwrap_err();
        assert!(matches!(err, ExchangeError::AmountOverflow { .. }), "{err}");
        assert!(!err.is_fatal());

        let price: Decimal = "1234567890123456.78".parse().unwrap();
        let quantity: Decimal = "12345678901.23".parse().unwrap();
        assert!(clearing.reservation(Direction::Buy, price, quantity).is_err());
        // SELL reserves the quantity itself.
        assert!(clearing.reservation(Direction::Sell, price, quantity).is_ok());
    }

    #[test]
    fn empty_result_removes_nothing() {
        let clearing = ClearingService::new(market());
        let mut assets = AssetService::new();
        let result = MatchResult::new(Order::dummy(1, 2, Direction::Buy, d(100), d(1)));
        assert!(clearing.clear_match_result(&mut assets, &result).unwrap().is_empty());
    }

    #[test]
    fn cancel_buy_releases_quote_for_remaining_quantity() {
        let clearing = ClearingService::new(market());
        let mut assets = AssetService::new();
        fund(&mut assets, 2, "USD", 1000);
        assets.try_freeze(UserId(2), "USD", d(1000)).unwrap();

        let mut order = Order::dummy(1, 2, Direction::Buy, d(100), d(10));
        order.update(d(6), OrderStatus::PartialCancelled, 5);
        let removed = clearing.clear_cancel_order(&mut assets, &order).unwrap();
        assert_eq!(removed.id, order.id);

        let bal = assets.balance(UserId(2), "USD");
        assert_eq!(bal.available, d(600));
        assert_eq!(bal.frozen, d(400));
    }

    #[test]
    fn cancel_without_reservation_is_fatal() {
        let clearing = ClearingService::new(market());
        let mut assets = AssetService::new();
        let order = Order::dummy(1, 2, Direction::Sell, d(100), d(1));
        let err = clearing.clear_cancel_order(&mut assets, &order).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn fill_without_reservation_is_fatal() {
        let clearing = ClearingService::new(market());
        let mut assets = AssetService::new();
        let mut maker = Order::dummy(1, 3, Direction::Sell, d(100), d(1));
        maker.update(Decimal::ZERO, OrderStatus::FullyFilled, 2);
        let mut taker = Order::dummy(2, 2, Direction::Buy, d(100), d(1));
        taker.update(Decimal::ZERO, OrderStatus::FullyFilled, 2);
        let result = MatchResult {
            details: vec![MatchDetail {
                price: d(100),
                quantity: d(1),
                taker_order_id: taker.id,
                taker_user_id: taker.user_id,
                maker,
            }],
            taker,
        };
        let err = clearing.clear_match_result(&mut assets, &result).unwrap_err();
        assert!(matches!(err, ExchangeError::InvariantViolation { .. }));
    }
}
