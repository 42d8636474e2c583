//! The engine thread behind its async handle.

use std::time::Duration;

use exchange_engine::{EngineEvent, EngineRuntime};
use exchange_sequencer::{EventStore, JournalEventStore, MemoryEventStore};
use exchange_types::*;
use rust_decimal::Decimal;

fn d(n: i64) -> Decimal {
    Decimal::new(n, 0)
}

fn deposit(user: u64, asset: &str, amount: Decimal) -> EventPayload {
    EventPayload::Transfer(TransferRequest {
        from_user: UserId::DEBT,
        to_user: UserId(user),
        asset: asset.into(),
        amount,
        sufficient: false,
        ref_id: None,
        created_at: 0,
    })
}

fn order(user: u64, direction: Direction, price: Decimal, qty: Decimal) -> EventPayload {
    EventPayload::OrderRequest(OrderRequest {
        user_id: UserId(user),
        direction,
        price,
        quantity: qty,
        ref_id: None,
        created_at: 0,
    })
}

/// Memory store whose appends take `delay`.
struct SlowStore {
    inner: MemoryEventStore,
    delay: Duration,
}

impl EventStore for SlowStore {
    fn append_batch(&mut self, events: &[EventRecord], uniques: &[UniqueEventRecord]) -> Result<()> {
        std::thread::sleep(self.delay);
        self.inner.append_batch(events, uniques)
    }

    fn unique_event(&self, unique_id: &str) -> Result<Option<UniqueEventRecord>> {
        self.inner.unique_event(unique_id)
    }

    fn last_event(&self) -> Result<Option<EventRecord>> {
        self.inner.last_event()
    }

    fn read_after(&self, after: SequenceId, limit: usize) -> Result<Vec<EventRecord>> {
        self.inner.read_after(after, limit)
    }
}

#[tokio::test]
async fn request_round_trip_and_read_views() {
    let (handle, task) =
        EngineRuntime::start(&EngineConfig::default(), MemoryEventStore::new()).unwrap();

    handle.request(deposit(2, "USD", d(1000))).await.unwrap();
    handle.request(deposit(3, "BTC", d(2))).await.unwrap();

    let mut book = handle.watch_order_book();
    let placed = handle.request(order(3, Direction::Sell, d(100), d(2))).await.unwrap();
    let ApiPayload::OrderCreated { order: resting } = &placed else {
        panic!("unexpected {placed:?}");
    };
    book.wait_for(|snap| snap.best_ask() == Some(d(100))).await.unwrap();
    assert_eq!(handle.orders().open_orders(UserId(3)).len(), 1);

    let mut events = handle.subscribe();
    let filled = handle.request(order(2, Direction::Buy, d(110), d(2))).await.unwrap();
    let ApiPayload::OrderCreated { order: taker } = &filled else {
        panic!("unexpected {filled:?}");
    };
    assert_eq!(taker.status, OrderStatus::FullyFilled);
    let EngineEvent::Matched(trade) = events.recv().await.unwrap() else {
        panic!("expected the trade first");
    };
    assert_eq!(trade.maker_order_id, resting.id);
    assert_eq!(trade.price, d(100));

    let usd = handle.assets().get_asset(UserId(2), "USD").unwrap();
    assert_eq!(usd, Balance { available: d(800), frozen: Decimal::ZERO });
    assert!(handle.orders().is_empty());

    let missing = handle
        .request(EventPayload::OrderCancel(OrderCancel {
            user_id: UserId(2),
            ref_order_id: resting.id,
            ref_id: None,
            created_at: 0,
        }))
        .await
        .unwrap_err();
    assert_eq!(missing.code, ApiErrorCode::OrderNotFound);

    drop(handle);
    let engine = task.await.unwrap().unwrap();
    assert_eq!(engine.sequence_id(), SequenceId(5));
    assert_eq!(engine.order_book_snapshot(5).market_price, d(100));
}

#[tokio::test]
async fn slow_result_times_out_and_is_discarded() {
    let config = EngineConfig {
        request_timeout_ms: 20,
        ..EngineConfig::default()
    };
    let store = SlowStore {
        inner: MemoryEventStore::new(),
        delay: Duration::from_millis(200),
    };
    let (handle, task) = EngineRuntime::start(&config, store).unwrap();

    let err = handle.request(deposit(2, "USD", d(10))).await.unwrap_err();
    assert_eq!(err.code, ApiErrorCode::OperationTimeout);

    // The timed-out deposit still went through; only the caller gave up.
    let assets = handle.assets().clone();
    drop(handle);
    let engine = task.await.unwrap().unwrap();
    assert_eq!(engine.sequence_id(), SequenceId(1));
    assert_eq!(assets.get_asset(UserId(2), "USD").unwrap().available, d(10));
}

#[tokio::test]
async fn restart_recovers_state_from_the_journal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.journal");
    let config = EngineConfig::default();

    let digest = {
        let (handle, task) =
            EngineRuntime::start(&config, JournalEventStore::open(&path).unwrap()).unwrap();
        handle.request(deposit(2, "USD", d(500))).await.unwrap();
        handle
            .request(order(2, Direction::Buy, d(100), d(3)))
            .await
            .unwrap();
        drop(handle);
        task.await.unwrap().unwrap().state_digest()
    };

    let (handle, task) =
        EngineRuntime::start(&config, JournalEventStore::open(&path).unwrap()).unwrap();
    assert_eq!(handle.order_book().best_bid(), Some(d(100)));
    assert_eq!(handle.orders().open_orders(UserId(2)).len(), 1);

    let cancelled = handle
        .request(EventPayload::OrderCancel(OrderCancel {
            user_id: UserId(2),
            ref_order_id: OrderId(2),
            ref_id: None,
            created_at: 0,
        }))
        .await
        .unwrap();
    assert!(matches!(cancelled, ApiPayload::OrderCancelled { .. }));
    drop(handle);
    let engine = task.await.unwrap().unwrap();
    assert_eq!(engine.sequence_id(), SequenceId(3));
    assert_ne!(engine.state_digest(), digest);
}

#[tokio::test]
async fn oversized_requests_are_rejected_and_replay_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.journal");
    let config = EngineConfig::default();
    let huge = Decimal::from_i128_with_scale(50_000_000_000_000_000_000_000_000_000, 0);

    let digest = {
        let (handle, task) =
            EngineRuntime::start(&config, JournalEventStore::open(&path).unwrap()).unwrap();
        handle.request(deposit(2, "USD", d(1000))).await.unwrap();
        let price = Decimal::from_i128_with_scale(100_000_000_000_000_000_000, 0);
        let err = handle
            .request(order(2, Direction::Buy, price, d(10_000_000_000)))
            .await
            .unwrap_err();
        assert_eq!(err.code, ApiErrorCode::ParameterInvalid);
        handle.request(deposit(3, "USD", huge)).await.unwrap();
        let err = handle.request(deposit(3, "USD", huge)).await.unwrap_err();
        assert_eq!(err.code, ApiErrorCode::ParameterInvalid);
        drop(handle);
        let engine = task.await.unwrap().unwrap();
        assert!(!engine.is_halted());
        engine.state_digest()
    };

    let (handle, task) =
        EngineRuntime::start(&config, JournalEventStore::open(&path).unwrap()).unwrap();
    let balance = handle.assets().get_asset(UserId(3), "USD").unwrap();
    assert_eq!(balance.available, huge);
    assert_eq!(handle.assets().get_asset(UserId(2), "USD").unwrap().frozen, Decimal::ZERO);
    drop(handle);
    let engine = task.await.unwrap().unwrap();
    assert_eq!(engine.sequence_id(), SequenceId(4));
    assert_eq!(engine.state_digest(), digest);
}

#[tokio::test]
async fn invalid_config_is_rejected_before_start() {
    let mut config = EngineConfig::default();
    config.market.quote = config.market.base.clone();
    let Err(err) = EngineRuntime::start(&config, MemoryEventStore::new()) else {
        panic!("engine started with base == quote");
    };
    assert!(matches!(err, ExchangeError::Configuration(_)));
}
