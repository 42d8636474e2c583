//! System-wide constants for the exchange core.

/// Reserved account that funds external deposits (its balances may go negative).
pub const DEBT_USER_ID: u64 = 1;

/// Default base asset of the single market.
pub const DEFAULT_BASE_ASSET: &str = "BTC";

/// Default quote asset of the single market.
pub const DEFAULT_QUOTE_ASSET: &str = "USD";

/// Maximum decimal places accepted for prices.
pub const PRICE_SCALE: u32 = 2;

/// Maximum decimal places accepted for quantities.
pub const QUANTITY_SCALE: u32 = 2;

/// Maximum events the orchestration loop hands to the sequencer at once.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 1000;

/// Most decimal places a `rust_decimal::Decimal` can carry.
pub const MAX_DECIMAL_SCALE: u32 = 28;

/// Default upper bound on an order price, in quote units.
pub const DEFAULT_MAX_PRICE: i64 = 1_000_000_000_000;

/// Default upper bound on an order quantity, in base units.
pub const DEFAULT_MAX_QUANTITY: i64 = 1_000_000_000_000;

/// Default number of aggregated price levels per side in book snapshots.
pub const DEFAULT_ORDER_BOOK_DEPTH: usize = 100;

/// Default time a correlated request waits for its result.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 500;

/// Default capacity of the ingress and egress channels.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 10_000;

/// Default log filter when `RUST_LOG` is not set.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "exchange-core";
