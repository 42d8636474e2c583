//! Async shell around the engine.
//!
//! ```text
//!  EngineHandle::submit / request ──mpsc──► engine thread
//!                                            │ batch ≤ max_batch_size
//!                                            │ Sequencer::sequence (durable)
//!                                            │ TradingEngine::process, in order
//!  EngineHandle::subscribe ◄──broadcast───── EngineEvent
//!  EngineHandle::order_book ◄──watch──────── OrderBookSnapshot after each batch
//!  EngineHandle::assets / orders ─────────── concurrent readers
//! ```
//!
//! The engine thread is the only writer. It runs on tokio's blocking pool
//! because every batch ends in a synchronous journal write.

use std::sync::Arc;
use std::time::Duration;

use exchange_ledger::AssetReader;
use exchange_sequencer::{Clock, EventStore, Sequencer, SystemClock};
use exchange_types::{
    ApiError, ApiErrorCode, ApiPayload, ApiResult, EngineConfig, EventPayload, ExchangeError,
    OrderBookSnapshot, PendingEvent, Result, SequenceId, SequencedEvent, constants,
};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use crate::engine::TradingEngine;
use crate::events::EngineEvent;
use crate::registry::OrderReader;

/// Attempts at sequencing one batch before it is dropped.
const MAX_SEQUENCE_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(20);

/// Outcome of a correlated request.
pub type ApiResponse = std::result::Result<ApiPayload, ApiError>;

/// Cloneable client of a running engine.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    ingress: mpsc::Sender<PendingEvent>,
    events: broadcast::Sender<EngineEvent>,
    book: watch::Receiver<Arc<OrderBookSnapshot>>,
    assets: AssetReader,
    orders: OrderReader,
    request_timeout: Duration,
}

impl EngineHandle {
    /// Queue an event without waiting for its result.
    pub async fn submit(&self, event: PendingEvent) -> Result<()> {
        self.ingress
            .send(event)
            .await
            .map_err(|_| ExchangeError::EngineUnavailable("ingress channel closed".into()))
    }

    /// Submit `payload` and wait for its result.
    pub async fn request(&self, payload: EventPayload) -> ApiResponse {
        self.request_event(PendingEvent::new(payload)).await
    }

    /// Submit `event` under a fresh `ref_id` and wait for the matching
    /// [`ApiResult`].
    ///
    /// Gives up with `OPERATION_TIMEOUT` after the configured timeout; a
    /// result published later is ignored. An event dropped as a duplicate
    /// produces no result and also times out.
    pub async fn request_event(&self, mut event: PendingEvent) -> ApiResponse {
        let ref_id = uuid::Uuid::now_v7().to_string();
        event.payload.set_ref_id(ref_id.clone());
        let mut results = self.events.subscribe();
        self.submit(event).await.map_err(|err| ApiError::from(&err))?;

        let wait = async {
            loop {
                match results.recv().await {
                    Ok(EngineEvent::ApiResult(result)) if result.ref_id == ref_id => {
                        return result.result;
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(%ref_id, skipped, "result subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(ApiError::new(
                            ApiErrorCode::InternalServerError,
                            "engine stopped",
                        ));
                    }
                }
            }
        };
        match tokio::time::timeout(self.request_timeout, wait).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(%ref_id, timeout = ?self.request_timeout, "request timed out");
                Err(ApiError::timeout())
            }
        }
    }

    /// Every event the engine publishes from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Book depth as of the last processed batch.
    #[must_use]
    pub fn order_book(&self) -> Arc<OrderBookSnapshot> {
        self.book.borrow().clone()
    }

    #[must_use]
    pub fn watch_order_book(&self) -> watch::Receiver<Arc<OrderBookSnapshot>> {
        self.book.clone()
    }

    #[must_use]
    pub fn assets(&self) -> &AssetReader {
        &self.assets
    }

    #[must_use]
    pub fn orders(&self) -> &OrderReader {
        &self.orders
    }
}

/// State owned by the engine thread.
pub struct EngineRuntime<S, C = SystemClock> {
    engine: TradingEngine,
    sequencer: Sequencer<S, C>,
    ingress: mpsc::Receiver<PendingEvent>,
    events: broadcast::Sender<EngineEvent>,
    book: watch::Sender<Arc<OrderBookSnapshot>>,
    max_batch_size: usize,
    book_depth: usize,
}

impl<S: EventStore + 'static> EngineRuntime<S, SystemClock> {
    /// Recover from `store` and start the engine thread.
    ///
    /// Must be called from within a tokio runtime. The join handle yields
    /// the engine once every [`EngineHandle`] is dropped, or the fatal
    /// error that stopped it.
    pub fn start(
        config: &EngineConfig,
        store: S,
    ) -> Result<(EngineHandle, JoinHandle<Result<TradingEngine>>)> {
        Self::start_with_clock(config, store, SystemClock)
    }
}

impl<S: EventStore + 'static, C: Clock + 'static> EngineRuntime<S, C> {
    pub fn start_with_clock(
        config: &EngineConfig,
        store: S,
        clock: C,
    ) -> Result<(EngineHandle, JoinHandle<Result<TradingEngine>>)> {
        config.validate()?;
        let mut engine = TradingEngine::new(config);
        engine.replay_store(&store)?;
        let sequencer = Sequencer::with_clock(store, clock)?;
        if sequencer.sequence_id() != engine.sequence_id() {
            return Err(ExchangeError::invariant(format!(
                "sequencer resumed at {} but replay stopped at {}",
                sequencer.sequence_id(),
                engine.sequence_id()
            )));
        }

        let (ingress_tx, ingress_rx) = mpsc::channel(config.channel_capacity);
        let (events_tx, _) = broadcast::channel(config.channel_capacity);
        let snapshot = Arc::new(engine.order_book_snapshot(config.order_book_depth));
        let (book_tx, book_rx) = watch::channel(snapshot);

        let handle = EngineHandle {
            ingress: ingress_tx,
            events: events_tx.clone(),
            book: book_rx,
            assets: engine.asset_reader(),
            orders: engine.order_reader(),
            request_timeout: Duration::from_millis(config.request_timeout_ms),
        };
        tracing::info!(
            engine = constants::ENGINE_NAME,
            version = constants::VERSION,
            market = %config.market.symbol(),
            sequence_id = %engine.sequence_id(),
            max_batch_size = config.sequencer.max_batch_size,
            "engine started"
        );

        let runtime = Self {
            engine,
            sequencer,
            ingress: ingress_rx,
            events: events_tx,
            book: book_tx,
            max_batch_size: config.sequencer.max_batch_size,
            book_depth: config.order_book_depth,
        };
        let task = tokio::task::spawn_blocking(move || runtime.run());
        Ok((handle, task))
    }

    fn run(mut self) -> Result<TradingEngine> {
        while let Some(first) = self.ingress.blocking_recv() {
            let mut batch = vec![first];
            while batch.len() < self.max_batch_size {
                match self.ingress.try_recv() {
                    Ok(event) => batch.push(event),
                    Err(_) => break,
                }
            }
            self.handle_batch(batch)?;
        }
        tracing::info!(sequence_id = %self.engine.sequence_id(), "engine stopped");
        Ok(self.engine)
    }

    fn handle_batch(&mut self, batch: Vec<PendingEvent>) -> Result<()> {
        let Some(sequenced) = self.sequence_with_retry(batch) else {
            return Ok(());
        };
        for event in &sequenced {
            match self.engine.process(event) {
                Ok(out) => self.publish(out),
                Err(err) => {
                    self.reject(event, &err);
                    return Err(err);
                }
            }
        }
        self.engine.check_supply()?;
        self.book
            .send_replace(Arc::new(self.engine.order_book_snapshot(self.book_depth)));
        Ok(())
    }

    /// Sequence a batch, retrying store failures. `None` once it is dropped.
    fn sequence_with_retry(&mut self, batch: Vec<PendingEvent>) -> Option<Vec<SequencedEvent>> {
        let mut attempt = 1;
        loop {
            match self.sequencer.sequence(batch.clone()) {
                Ok(sequenced) => return Some(sequenced),
                Err(err) if attempt < MAX_SEQUENCE_ATTEMPTS => {
                    tracing::warn!(attempt, %err, "sequencing failed, retrying");
                    std::thread::sleep(RETRY_BACKOFF * attempt);
                    attempt += 1;
                }
                Err(err) => {
                    tracing::error!(attempts = attempt, count = batch.len(), %err, "batch dropped");
                    let error = ApiError::from(&err);
                    for pending in &batch {
                        if let Some(ref_id) = pending.payload.ref_id() {
                            self.send(EngineEvent::ApiResult(ApiResult {
                                ref_id: ref_id.to_string(),
                                sequence_id: SequenceId::ZERO,
                                result: Err(error.clone()),
                            }));
                        }
                    }
                    return None;
                }
            }
        }
    }

    /// Answer the event that stopped the engine.
    fn reject(&self, event: &SequencedEvent, err: &ExchangeError) {
        if let Some(ref_id) = event.payload.ref_id() {
            self.send(EngineEvent::ApiResult(ApiResult {
                ref_id: ref_id.to_string(),
                sequence_id: event.sequence_id,
                result: Err(ApiError::from(err)),
            }));
        }
    }

    fn publish(&self, out: Vec<EngineEvent>) {
        for event in out {
            self.send(event);
        }
    }

    fn send(&self, event: EngineEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
