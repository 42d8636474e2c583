//! Open orders per user.
//!
//! Mirrors the books from the engine's point of view: an order is present
//! from the moment it rests until it is filled or cancelled. The engine loop
//! is the only writer; [`OrderReader`] handles serve queries from any thread.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use exchange_types::{Order, OrderId, UserId};

type OpenOrders = DashMap<UserId, BTreeMap<OrderId, Order>>;

/// Concurrent read handle onto the registry.
#[derive(Debug, Clone, Default)]
pub struct OrderReader {
    orders: Arc<OpenOrders>,
}

impl OrderReader {
    /// A user's open orders, oldest first.
    #[must_use]
    pub fn open_orders(&self, user_id: UserId) -> Vec<Order> {
        self.orders
            .get(&user_id)
            .map(|open| open.value().values().cloned().collect())
            .unwrap_or_default()
    }

    /// One open order, only if it belongs to `user_id`.
    #[must_use]
    pub fn open_order(&self, user_id: UserId, order_id: OrderId) -> Option<Order> {
        self.orders
            .get(&user_id)
            .and_then(|open| open.value().get(&order_id).cloned())
    }

    /// Total open orders across all users.
    #[must_use]
    pub fn len(&self) -> usize {
        self.orders.iter().map(|open| open.value().len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The writer side. Not `Clone`: exactly one owner mutates it.
#[derive(Debug, Default)]
pub struct OrderRegistry {
    view: OrderReader,
}

impl OrderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn reader(&self) -> OrderReader {
        self.view.clone()
    }

    #[must_use]
    pub fn open_order(&self, user_id: UserId, order_id: OrderId) -> Option<Order> {
        self.view.open_order(user_id, order_id)
    }

    #[must_use]
    pub fn open_orders(&self, user_id: UserId) -> Vec<Order> {
        self.view.open_orders(user_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.view.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.view.is_empty()
    }

    /// Insert or refresh an open order.
    pub fn upsert(&mut self, order: &Order) {
        self.view
            .orders
            .entry(order.user_id)
            .or_default()
            .value_mut()
            .insert(order.id, order.clone());
    }

    /// Drop a closed order.
    pub fn remove(&mut self, order: &Order) -> Option<Order> {
        let removed = self
            .view
            .orders
            .get_mut(&order.user_id)
            .and_then(|mut open| open.value_mut().remove(&order.id));
        self.view
            .orders
            .remove_if(&order.user_id, |_, open| open.is_empty());
        removed
    }
}

#[cfg(test)]
mod tests {
    use exchange_types::{Direction, OrderStatus, SequenceId};
    use rust_decimal::Decimal;

    use super::*;

    fn order(id: u64, user: u64) -> Order {
        Order::new(
            SequenceId(id),
            UserId(user),
            Direction::Buy,
            Decimal::new(100, 0),
            Decimal::new(5, 0),
            0,
        )
    }

    #[test]
    fn upsert_then_remove() {
        let mut registry = OrderRegistry::new();
        let reader = registry.reader();
        registry.upsert(&order(3, 2));
        registry.upsert(&order(1, 2));
        registry.upsert(&order(2, 7));

        let ids: Vec<OrderId> = reader.open_orders(UserId(2)).iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![OrderId(1), OrderId(3)]);
        assert_eq!(reader.len(), 3);

        assert!(registry.remove(&order(1, 2)).is_some());
        assert!(registry.remove(&order(1, 2)).is_none());
        assert_eq!(reader.open_orders(UserId(2)).len(), 1);
    }

    #[test]
    fn upsert_refreshes_snapshot() {
        let mut registry = OrderRegistry::new();
        let mut o = order(1, 2);
        registry.upsert(&o);
        o.update(Decimal::new(2, 0), OrderStatus::PartialFilled, 9);
        registry.upsert(&o);
        let stored = registry.open_order(UserId(2), OrderId(1)).unwrap();
        assert_eq!(stored.status, OrderStatus::PartialFilled);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn lookup_is_scoped_to_owner() {
        let mut registry = OrderRegistry::new();
        registry.upsert(&order(1, 2));
        assert!(registry.open_order(UserId(3), OrderId(1)).is_none());
        assert!(registry.open_order(UserId(2), OrderId(1)).is_some());
    }

    #[test]
    fn empty_user_entries_are_dropped() {
        let mut registry = OrderRegistry::new();
        registry.upsert(&order(1, 2));
        registry.remove(&order(1, 2));
        assert!(registry.is_empty());
        assert!(registry.open_orders(UserId(2)).is_empty());
    }
}
