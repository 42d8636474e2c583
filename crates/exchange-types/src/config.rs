//! Configuration types for the exchange engine.
//!
//! Every field has a default, so a config file only needs to name what it
//! overrides:
//!
//! ```json
//! { "market": { "base": "ETH", "quote": "USD" }, "order_book_depth": 20 }
//! ```

use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{ExchangeError, MarketPair, Result, constants, exact_mul};

/// Per-market configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// Base asset (e.g., "BTC").
    pub base: String,
    /// Quote asset (e.g., "USD").
    pub quote: String,
    /// Maximum decimal places in a price.
    pub price_scale: u32,
    /// Maximum decimal places in a quantity.
    pub quantity_scale: u32,
    /// Largest accepted order price.
    pub max_price: Decimal,
    /// Largest accepted order quantity.
    pub max_quantity: Decimal,
}

impl MarketConfig {
    #[must_use]
    pub fn pair(&self) -> MarketPair {
        MarketPair::new(self.base.clone(), self.quote.clone())
    }

    /// Returns the market symbol (e.g., "BTC/USD").
    #[must_use]
    pub fn symbol(&self) -> String {
        self.pair().to_string()
    }

    /// Decimal places of a quote amount (`price × quantity`).
    #[must_use]
    pub fn amount_scale(&self) -> u32 {
        self.price_scale + self.quantity_scale
    }

    /// Checks that the largest order the limits admit settles exactly.
    fn validate_limits(&self) -> Result<()> {
        if self.max_price <= Decimal::ZERO || self.max_quantity <= Decimal::ZERO {
            return Err(ExchangeError::Configuration(
                "market.max_price and market.max_quantity must be positive".into(),
            ));
        }
        if self.amount_scale() > constants::MAX_DECIMAL_SCALE {
            return Err(ExchangeError::Configuration(format!(
                "market price_scale + quantity_scale must be at most {}",
                constants::MAX_DECIMAL_SCALE
            )));
        }
        let largest = scaled(self.max_price, self.price_scale)
            .zip(scaled(self.max_quantity, self.quantity_scale))
            .and_then(|(price, quantity)| exact_mul(price, quantity));
        if largest.is_none() {
            return Err(ExchangeError::Configuration(format!(
                "market.max_price {} × market.max_quantity {} does not fit at {} decimal places",
                self.max_price,
                self.max_quantity,
                self.amount_scale()
            )));
        }
        Ok(())
    }
}

/// `value × 10^scale`, `None` on overflow.
fn scaled(value: Decimal, scale: u32) -> Option<Decimal> {
    (0..scale).try_fold(value, |acc, _| exact_mul(acc, Decimal::TEN))
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            base: constants::DEFAULT_BASE_ASSET.to_string(),
            quote: constants::DEFAULT_QUOTE_ASSET.to_string(),
            price_scale: constants::PRICE_SCALE,
            quantity_scale: constants::QUANTITY_SCALE,
            max_price: Decimal::from(constants::DEFAULT_MAX_PRICE),
            max_quantity: Decimal::from(constants::DEFAULT_MAX_QUANTITY),
        }
    }
}

/// Sequencer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    /// Maximum events sequenced in one atomic batch.
    pub max_batch_size: usize,
    /// Path of the append-only journal; `None` keeps events in memory.
    pub journal_path: Option<String>,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            max_batch_size: constants::DEFAULT_MAX_BATCH_SIZE,
            journal_path: None,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub market: MarketConfig,
    pub sequencer: SequencerConfig,
    /// Price levels per side in published book snapshots.
    pub order_book_depth: usize,
    /// How long a correlated request waits for its result.
    pub request_timeout_ms: u64,
    /// Capacity of the ingress and egress channels.
    pub channel_capacity: usize,
    /// Log filter used when `RUST_LOG` is unset.
    pub log_level: String,
    /// Emit logs as JSON lines.
    pub log_json: bool,
    /// Check per-asset supply conservation after every batch.
    pub verify_supply: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            market: MarketConfig::default(),
            sequencer: SequencerConfig::default(),
            order_book_depth: constants::DEFAULT_ORDER_BOOK_DEPTH,
            request_timeout_ms: constants::DEFAULT_REQUEST_TIMEOUT_MS,
            channel_capacity: constants::DEFAULT_CHANNEL_CAPACITY,
            log_level: constants::DEFAULT_LOG_LEVEL.to_string(),
            log_json: false,
            verify_supply: true,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)
            .map_err(|e| ExchangeError::Configuration(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, parse and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ExchangeError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.market.base.is_empty() || self.market.quote.is_empty() {
            return Err(ExchangeError::Configuration(
                "market base and quote must be set".into(),
            ));
        }
        if self.market.base == self.market.quote {
            return Err(ExchangeError::Configuration(format!(
                "market base and quote must differ, both are {}",
                self.market.base
            )));
        }
        self.market.validate_limits()?;
        if self.sequencer.max_batch_size == 0 {
            return Err(ExchangeError::Configuration(
                "sequencer.max_batch_size must be > 0".into(),
            ));
        }
        if self.channel_capacity == 0 {
            return Err(ExchangeError::Configuration(
                "channel_capacity must be > 0".into(),
            ));
        }
        Ok(())
    }
}
