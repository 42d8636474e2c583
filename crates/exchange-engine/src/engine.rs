//! The single-writer state machine behind the exchange.
//!
//! ```text
//! SequencedEvent ──► TradingEngine::process
//!                      ├─ ORDER_REQUEST: validate → try_freeze → MatchEngine::process_order
//!                      │                 → ClearingService::clear_match_result
//!                      ├─ ORDER_CANCEL:  registry lookup → MatchEngine::cancel
//!                      │                 → ClearingService::clear_cancel_order
//!                      └─ TRANSFER:      AssetService::try_transfer (AVAILABLE → AVAILABLE)
//!                    ──► Vec<EngineEvent>
//! ```
//!
//! Events must arrive in sequence order with no gaps. Business rejections
//! become error [`ApiResult`]s and the engine moves on; anything fatal halts
//! the engine, and every later call fails until it is rebuilt by replay.

use exchange_clearing::ClearingService;
use exchange_ledger::{AssetReader, AssetService, SupplyConservation};
use exchange_matchcore::{MatchEngine, compute_book_digest};
use exchange_sequencer::EventStore;
use exchange_types::{
    ApiError, ApiPayload, ApiResult, EngineConfig, EventPayload, EventRecord, ExchangeError,
    MarketConfig, Order, OrderBookSnapshot, OrderCancel, OrderRequest, Result, SequenceId,
    SequencedEvent, TransferKind, TransferRequest,
};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

use crate::events::{EngineEvent, MatchRecord};
use crate::registry::{OrderReader, OrderRegistry};

/// Records read from a store per page during replay.
const REPLAY_PAGE_SIZE: usize = 1_000;

#[derive(Debug)]
pub struct TradingEngine {
    market: MarketConfig,
    verify_supply: bool,
    assets: AssetService,
    match_engine: MatchEngine,
    clearing: ClearingService,
    registry: OrderRegistry,
    /// Last sequence id applied.
    sequence_id: SequenceId,
    /// Why the engine stopped, once it has.
    halted: Option<String>,
}

impl TradingEngine {
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            market: config.market.clone(),
            verify_supply: config.verify_supply,
            assets: AssetService::new(),
            match_engine: MatchEngine::new(),
            clearing: ClearingService::new(config.market.pair()),
            registry: OrderRegistry::new(),
            sequence_id: SequenceId::ZERO,
            halted: None,
        }
    }

    // =================================================================
    // Read access
    // =================================================================

    #[must_use]
    pub fn sequence_id(&self) -> SequenceId {
        self.sequence_id
    }

    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }

    #[must_use]
    pub fn assets(&self) -> &AssetService {
        &self.assets
    }

    #[must_use]
    pub fn asset_reader(&self) -> AssetReader {
        self.assets.reader()
    }

    #[must_use]
    pub fn order_reader(&self) -> OrderReader {
        self.registry.reader()
    }

    #[must_use]
    pub fn match_engine(&self) -> &MatchEngine {
        &self.match_engine
    }

    #[must_use]
    pub fn order_book_snapshot(&self, max_depth: usize) -> OrderBookSnapshot {
        self.match_engine.order_book_snapshot(max_depth)
    }

    /// SHA-256 over both books and every balance, hex encoded.
    ///
    /// Two engines that applied the same events report the same digest.
    #[must_use]
    pub fn state_digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(b"exchange:state:v1:");
        hasher.update(self.sequence_id.0.to_le_bytes());
        hasher.update(compute_book_digest(&self.match_engine));
        for (user, balances) in self.assets.reader().snapshot() {
            for (asset, balance) in balances {
                let line = format!(
                    "{}|{asset}|{}|{};",
                    user.0,
                    balance.available.normalize(),
                    balance.frozen.normalize()
                );
                hasher.update(line.as_bytes());
            }
        }
        hex::encode(hasher.finalize())
    }

    // =================================================================
    // Event processing
    // =================================================================

    /// Apply one sequenced event.
    ///
    /// # Errors
    /// A gap in the sequence, a fatal invariant violation, or any call
    /// after the engine has halted.
    pub fn process(&mut self, event: &SequencedEvent) -> Result<Vec<EngineEvent>> {
        self.ensure_running()?;
        if event.previous_id != self.sequence_id || event.sequence_id != self.sequence_id.next() {
            let gap = ExchangeError::SequenceGap {
                expected: self.sequence_id,
                actual: event.previous_id,
            };
            return Err(self.halt(gap));
        }

        let mut out = Vec::new();
        let outcome = match &event.payload {
            EventPayload::OrderRequest(req) => self.create_order(event, req, &mut out),
            EventPayload::OrderCancel(req) => self.cancel_order(event, req, &mut out),
            EventPayload::Transfer(req) => self.transfer(req).map(|()| ApiPayload::Transferred),
        };
        self.sequence_id = event.sequence_id;

        let result = match outcome {
            Ok(payload) => Ok(payload),
            Err(err) if err.is_fatal() => return Err(self.halt(err)),
            Err(err) => {
                tracing::debug!(
                    sequence_id = %event.sequence_id,
                    kind = event.payload.kind(),
                    %err,
                    "event rejected"
                );
                Err(ApiError::from(&err))
            }
        };
        if let Some(ref_id) = event.payload.ref_id() {
            out.push(EngineEvent::ApiResult(ApiResult {
                ref_id: ref_id.to_string(),
                sequence_id: event.sequence_id,
                result,
            }));
        }
        Ok(out)
    }

    /// Apply a batch, then check supply conservation if enabled.
    pub fn process_batch(&mut self, events: &[SequencedEvent]) -> Result<Vec<EngineEvent>> {
        let mut out = Vec::new();
        for event in events {
            out.extend(self.process(event)?);
        }
        self.check_supply()?;
        Ok(out)
    }

    /// Verify that every asset still sums to zero across all users.
    ///
    /// A no-op unless `verify_supply` is configured.
    pub fn check_supply(&mut self) -> Result<()> {
        if !self.verify_supply {
            return Ok(());
        }
        match SupplyConservation::new().verify_ledger(&self.assets.reader()) {
            Ok(()) => Ok(()),
            Err(err) => Err(self.halt(err)),
        }
    }

    /// Rebuild state from persisted records. Output events are discarded.
    ///
    /// Returns the number of records applied.
    pub fn replay<I>(&mut self, records: I) -> Result<usize>
    where
        I: IntoIterator<Item = EventRecord>,
    {
        let mut applied = 0;
        for record in records {
            let event = record.decode()?;
            self.process(&event)?;
            applied += 1;
        }
        self.check_supply()?;
        Ok(applied)
    }

    /// Replay every record in `store` after the current sequence id.
    pub fn replay_store<S: EventStore>(&mut self, store: &S) -> Result<usize> {
        let mut applied = 0;
        loop {
            let page = store.read_after(self.sequence_id, REPLAY_PAGE_SIZE)?;
            if page.is_empty() {
                break;
            }
            applied += self.replay(page)?;
        }
        tracing::info!(applied, sequence_id = %self.sequence_id, "replay complete");
        Ok(applied)
    }

    fn ensure_running(&self) -> Result<()> {
        match &self.halted {
            Some(reason) => Err(ExchangeError::Internal(format!("engine halted: {reason}"))),
            None => Ok(()),
        }
    }

    fn halt(&mut self, err: ExchangeError) -> ExchangeError {
        tracing::error!(sequence_id = %self.sequence_id, %err, "engine halted");
        self.halted = Some(err.to_string());
        err
    }

    // =================================================================
    // Handlers
    // =================================================================

    fn create_order(
        &mut self,
        event: &SequencedEvent,
        req: &OrderRequest,
        out: &mut Vec<EngineEvent>,
    ) -> Result<ApiPayload> {
        check_order_value("price", req.price, self.market.price_scale, self.market.max_price)?;
        check_order_value(
            "quantity",
            req.quantity,
            self.market.quantity_scale,
            self.market.max_quantity,
        )?;

        let (asset, amount) = self
            .clearing
            .reservation(req.direction, req.price, req.quantity)
            .map_err(|err| ExchangeError::InvalidOrder {
                reason: err.to_string(),
            })?;
        let asset = asset.clone();
        if !self.assets.try_freeze(req.user_id, &asset, amount)? {
            let available = self.assets.balance(req.user_id, &asset).available;
            return Err(ExchangeError::InsufficientBalance {
                needed: amount,
                available,
            });
        }

        let order = Order::new(
            event.sequence_id,
            req.user_id,
            req.direction,
            req.price,
            req.quantity,
            event.created_at,
        );
        let result = self.match_engine.process_order(event.sequence_id, order)?;
        let removed = self.clearing.clear_match_result(&mut self.assets, &result)?;

        for detail in &result.details {
            out.push(EngineEvent::Matched(MatchRecord::new(
                event.sequence_id,
                &result.taker,
                detail,
            )));
        }
        for detail in &result.details {
            if !detail.maker.is_filled() {
                self.registry.upsert(&detail.maker);
                out.push(EngineEvent::OrderUpdated(detail.maker.clone()));
            }
        }
        if !result.taker.is_filled() {
            self.registry.upsert(&result.taker);
            out.push(EngineEvent::OrderUpdated(result.taker.clone()));
        }
        for order in removed {
            self.registry.remove(&order);
            out.push(EngineEvent::OrderClosed(order));
        }

        tracing::debug!(
            order = %result.taker.id,
            user = %result.taker.user_id,
            status = %result.taker.status,
            fills = result.details.len(),
            "order processed"
        );
        Ok(ApiPayload::OrderCreated {
            order: result.taker,
        })
    }

    fn cancel_order(
        &mut self,
        event: &SequencedEvent,
        req: &OrderCancel,
        out: &mut Vec<EngineEvent>,
    ) -> Result<ApiPayload> {
        let resting = self
            .registry
            .open_order(req.user_id, req.ref_order_id)
            .ok_or(ExchangeError::OrderNotFound(req.ref_order_id))?;
        let cancelled = self.match_engine.cancel(event.created_at, &resting)?;
        let removed = self.clearing.clear_cancel_order(&mut self.assets, &cancelled)?;
        self.registry.remove(&removed);
        out.push(EngineEvent::OrderClosed(removed));

        tracing::debug!(
            order = %cancelled.id,
            user = %cancelled.user_id,
            status = %cancelled.status,
            "order cancelled"
        );
        Ok(ApiPayload::OrderCancelled { order: cancelled })
    }

    fn transfer(&mut self, req: &TransferRequest) -> Result<()> {
        if req.amount <= Decimal::ZERO {
            return Err(invalid_transfer(format!("amount must be positive, got {}", req.amount)));
        }
        if req.asset.is_empty() {
            return Err(invalid_transfer("asset must be set".into()));
        }
        if req.from_user == req.to_user {
            return Err(invalid_transfer(format!("{} transfers to itself", req.from_user)));
        }
        if req.amount.normalize().scale() > self.market.amount_scale() {
            return Err(invalid_transfer(format!(
                "amount {} has more than {} decimal places",
                req.amount,
                self.market.amount_scale()
            )));
        }
        if !req.sufficient && !req.from_user.is_debt() {
            return Err(invalid_transfer(format!(
                "{} may not transfer without a balance check",
                req.from_user
            )));
        }

        let done = self
            .assets
            .try_transfer(
                TransferKind::AvailableToAvailable,
                req.from_user,
                req.to_user,
                &req.asset,
                req.amount,
                req.sufficient,
            )
            .map_err(|err| match err {
                ExchangeError::AmountOverflow { reason } => invalid_transfer(reason),
                other => other,
            })?;
        if !done {
            return Err(ExchangeError::InsufficientBalance {
                needed: req.amount,
                available: self.assets.balance(req.from_user, &req.asset).available,
            });
        }
        Ok(())
    }
}

fn check_order_value(field: &str, value: Decimal, scale: u32, max: Decimal) -> Result<()> {
    if value <= Decimal::ZERO {
        return Err(ExchangeError::InvalidOrder {
            reason: format!("{field} must be positive, got {value}"),
        });
    }
    if value > max {
        return Err(ExchangeError::InvalidOrder {
            reason: format!("{field} {value} exceeds the market limit {max}"),
        });
    }
    if value.normalize().scale() > scale {
        return Err(ExchangeError::InvalidOrder {
            reason: format!("{field} {value} has more than {scale} decimal places"),
        });
    }
    Ok(())
}

fn invalid_transfer(reason: String) -> ExchangeError {
    ExchangeError::InvalidTransfer { reason }
}
