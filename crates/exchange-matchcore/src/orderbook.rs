//! One side of the market.
//!
//! Price levels live in a `BTreeMap<Decimal, PriceLevel>` in ascending price
//! order. Which end is "best" depends on the book's direction:
//! - **BUY** book: highest price first (last key)
//! - **SELL** book: lowest price first (first key)
//!
//! An auxiliary `HashMap<OrderId, Decimal>` enables O(log N) cancellation.

use std::collections::{BTreeMap, HashMap};

use exchange_types::*;
use rust_decimal::Decimal;

use crate::price_level::PriceLevel;

/// Resting orders of one direction, ranked by price then arrival.
#[derive(Debug)]
pub struct OrderBook {
    pub direction: Direction,
    levels: BTreeMap<Decimal, PriceLevel>,
    /// Fast lookup: `OrderId -> price`.
    index: HashMap<OrderId, Decimal>,
}

impl OrderBook {
    #[must_use]
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            levels: BTreeMap::new(),
            index: HashMap::new(),
        }
    }

    // =================================================================
    // Insertion / removal
    // =================================================================

    /// Rest an order at the back of its price level.
    pub fn add(&mut self, order: Order) -> Result<()> {
        if self.index.contains_key(&order.id) {
            return Err(ExchangeError::DuplicateOrder(order.id));
        }
        if order.direction != self.direction {
            return Err(ExchangeError::invariant(format!(
                "{} order {} added to {} book",
                order.direction, order.id, self.direction
            )));
        }
        self.index.insert(order.id, order.price);
        self.levels
            .entry(order.price)
            .or_insert_with(|| PriceLevel::new(order.price))
            .push_back(order);
        Ok(())
    }

    /// Remove an order by ID. `None` if it is not resting here.
    pub fn remove(&mut self, order_id: OrderId) -> Option<Order> {
        let price = self.index.remove(&order_id)?;
        let level = self.levels.get_mut(&price)?;
        let order = level.remove_order(order_id);
        if level.is_empty() {
            self.levels.remove(&price);
        }
        order
    }

    // =================================================================
    // Best order access (for the matcher)
    // =================================================================

    fn best_key(&self) -> Option<Decimal> {
        match self.direction {
            Direction::Buy => self.levels.keys().next_back().copied(),
            Direction::Sell => self.levels.keys().next().copied(),
        }
    }

    /// Most favorable resting price, or `None` if the book is empty.
    #[must_use]
    pub fn best_price(&self) -> Option<Decimal> {
        self.best_key()
    }

    /// The order with the highest priority.
    #[must_use]
    pub fn best(&self) -> Option<&Order> {
        let key = self.best_key()?;
        self.levels.get(&key).and_then(PriceLevel::front)
    }

    pub fn best_mut(&mut self) -> Option<&mut Order> {
        let key = self.best_key()?;
        self.levels.get_mut(&key).and_then(PriceLevel::front_mut)
    }

    /// Remove and return the order with the highest priority.
    pub fn pop_best(&mut self) -> Option<Order> {
        let key = self.best_key()?;
        let level = self.levels.get_mut(&key)?;
        let order = level.pop_front()?;
        if level.is_empty() {
            self.levels.remove(&key);
        }
        self.index.remove(&order.id);
        Some(order)
    }

    // =================================================================
    // Queries
    // =================================================================

    #[must_use]
    pub fn get(&self, order_id: OrderId) -> Option<&Order> {
        let price = self.index.get(&order_id)?;
        self.levels.get(price)?.get(order_id)
    }

    #[must_use]
    pub fn contains(&self, order_id: OrderId) -> bool {
        self.index.contains_key(&order_id)
    }

    /// Iterate levels from best to worst.
    pub fn levels(&self) -> Box<dyn Iterator<Item = &PriceLevel> + '_> {
        match self.direction {
            Direction::Buy => Box::new(self.levels.values().rev()),
            Direction::Sell => Box::new(self.levels.values()),
        }
    }

    /// Iterate orders in matching priority.
    pub fn orders(&self) -> impl Iterator<Item = &Order> {
        self.levels().flat_map(|level| level.orders.iter())
    }

    /// Up to `max_depth` aggregated levels, best first.
    #[must_use]
    pub fn depth(&self, max_depth: usize) -> Vec<BookLevel> {
        self.levels()
            .take(max_depth)
            .map(PriceLevel::to_book_level)
            .collect()
    }

    /// Number of resting orders.
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.index.len()
    }

    /// Number of distinct price levels.
    #[must_use]
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use exchange_types::*;
    use rust_decimal::Decimal;

    use super::*;

    fn order(id: u64, direction: Direction, price: i64, qty: i64) -> Order {
        Order::dummy(id, 10, direction, Decimal::new(price, 0), Decimal::new(qty, 0))
    }

    #[test]
    fn buy_book_best_is_highest() {
        let mut book = OrderBook::new(Direction::Buy);
        book.add(order(1, Direction::Buy, 90, 1)).unwrap();
        book.add(order(2, Direction::Buy, 100, 1)).unwrap();
        book.add(order(3, Direction::Buy, 95, 1)).unwrap();

        assert_eq!(book.best_price(), Some(Decimal::new(100, 0)));
        let prices: Vec<Decimal> = book.levels().map(|l| l.price).collect();
        assert_eq!(
            prices,
            vec![Decimal::new(100, 0), Decimal::new(95, 0), Decimal::new(90, 0)]
        );
    }

    #[test]
    fn sell_book_best_is_lowest() {
        let mut book = OrderBook::new(Direction::Sell);
        book.add(order(1, Direction::Sell, 110, 1)).unwrap();
        book.add(order(2, Direction::Sell, 101, 1)).unwrap();
        book.add(order(3, Direction::Sell, 105, 1)).unwrap();

        assert_eq!(book.best().unwrap().id, OrderId(2));
        let prices: Vec<Decimal> = book.levels().map(|l| l.price).collect();
        assert_eq!(
            prices,
            vec![Decimal::new(101, 0), Decimal::new(105, 0), Decimal::new(110, 0)]
        );
    }

    #[test]
    fn same_price_is_fifo() {
        let mut book = OrderBook::new(Direction::Sell);
        book.add(order(7, Direction::Sell, 100, 1)).unwrap();
        book.add(order(8, Direction::Sell, 100, 1)).unwrap();
        assert_eq!(book.pop_best().unwrap().id, OrderId(7));
        assert_eq!(book.pop_best().unwrap().id, OrderId(8));
        assert!(book.pop_best().is_none());
        assert!(book.is_empty());
    }

    #[test]
    fn remove_drops_empty_level() {
        let mut book = OrderBook::new(Direction::Buy);
        book.add(order(1, Direction::Buy, 100, 1)).unwrap();
        assert_eq!(book.level_count(), 1);

        let removed = book.remove(OrderId(1)).unwrap();
        assert_eq!(removed.id, OrderId(1));
        assert_eq!(book.level_count(), 0);
        assert!(book.remove(OrderId(1)).is_none());
    }

    #[test]
    fn duplicate_order_rejected() {
        let mut book = OrderBook::new(Direction::Buy);
        let o = order(1, Direction::Buy, 100, 1);
        book.add(o.clone()).unwrap();
        assert!(matches!(book.add(o), Err(ExchangeError::DuplicateOrder(_))));
    }

    #[test]
    fn wrong_direction_rejected() {
        let mut book = OrderBook::new(Direction::Buy);
        let err = book.add(order(1, Direction::Sell, 100, 1)).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn depth_aggregates_and_truncates() {
        let mut book = OrderBook::new(Direction::Buy);
        book.add(order(1, Direction::Buy, 100, 2)).unwrap();
        book.add(order(2, Direction::Buy, 100, 3)).unwrap();
        book.add(order(3, Direction::Buy, 99, 1)).unwrap();
        book.add(order(4, Direction::Buy, 98, 1)).unwrap();

        let depth = book.depth(2);
        assert_eq!(depth.len(), 2);
        assert_eq!(depth[0].price, Decimal::new(100, 0));
        assert_eq!(depth[0].quantity, Decimal::new(5, 0));
        assert_eq!(depth[1].price, Decimal::new(99, 0));
        assert!(book.depth(0).is_empty());
    }

    #[test]
    fn orders_iterate_in_priority() {
        let mut book = OrderBook::new(Direction::Sell);
        book.add(order(1, Direction::Sell, 102, 1)).unwrap();
        book.add(order(2, Direction::Sell, 101, 1)).unwrap();
        book.add(order(3, Direction::Sell, 101, 1)).unwrap();
        let ids: Vec<OrderId> = book.orders().map(|o| o.id).collect();
        assert_eq!(ids, vec![OrderId(2), OrderId(3), OrderId(1)]);
        assert_eq!(book.get(OrderId(3)).unwrap().price, Decimal::new(101, 0));
        assert_eq!(book.order_count(), 3);
    }
}
