//! Error types for the exchange core.
//!
//! All errors use the `EX_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Order errors
//! - 2xx: Balance errors
//! - 3xx: Sequencing / storage errors
//! - 5xx: Matching errors
//! - 6xx: Clearing / invariant errors
//! - 9xx: General / internal errors
//!
//! Every variant also has a [`Severity`], which decides how the engine loop
//! reacts to it.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{OrderId, SequenceId};

/// How a failure propagates through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Expected outcome, reported to the caller as a structured API error.
    Business,
    /// Ledger or book state can no longer be trusted; processing halts.
    Invariant,
    /// Storage or I/O failure; the whole batch is rejected and retried.
    Infrastructure,
}

/// Central error enum for all exchange-core operations.
#[derive(Debug, Error)]
pub enum ExchangeError {
    // =================================================================
    // Order Errors (1xx)
    // =================================================================
    /// The requested order was not found (or belongs to another user).
    #[error("EX_ERR_100: Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The order failed validation (non-positive price, bad scale, etc.).
    #[error("EX_ERR_101: Invalid order: {reason}")]
    InvalidOrder { reason: String },

    /// An order with this ID is already resting in the book.
    #[error("EX_ERR_102: Order already exists: {0}")]
    DuplicateOrder(OrderId),

    // =================================================================
    // Balance Errors (2xx)
    // =================================================================
    /// Not enough available balance to freeze or transfer.
    #[error("EX_ERR_200: Insufficient available balance: need {needed}, have {available}")]
    InsufficientBalance { needed: Decimal, available: Decimal },

    /// A transfer was requested with a negative amount.
    #[error("EX_ERR_201: Negative transfer amount: {0}")]
    NegativeAmount(Decimal),

    /// A transfer request was rejected before touching the ledger.
    #[error("EX_ERR_202: Invalid transfer: {reason}")]
    InvalidTransfer { reason: String },

    /// The result of a balance change cannot be represented exactly.
    #[error("EX_ERR_203: Amount overflow: {reason}")]
    AmountOverflow { reason: String },

    // =================================================================
    // Sequencing / Storage Errors (3xx)
    // =================================================================
    /// The durable event store rejected or failed a write.
    #[error("EX_ERR_300: Event store failure: {0}")]
    Storage(String),

    /// A persisted record breaks the gap-free sequence chain.
    #[error("EX_ERR_301: Sequence gap: expected previous {expected}, got {actual}")]
    SequenceGap {
        expected: SequenceId,
        actual: SequenceId,
    },

    // =================================================================
    // Matching Errors (5xx)
    // =================================================================
    /// Cross-run determinism check failed.
    #[error("EX_ERR_501: Determinism violation: expected {expected}, got {actual}")]
    DeterminismViolation { expected: String, actual: String },

    // =================================================================
    // Clearing / Invariant Errors (6xx)
    // =================================================================
    /// Bookkeeping guaranteed this could not happen, yet it did.
    #[error("EX_ERR_600: Invariant violation: {reason}")]
    InvariantViolation { reason: String },

    /// Per-asset supply no longer sums to the expected total.
    #[error("EX_ERR_601: Supply invariant violation: {reason}")]
    SupplyInvariantViolation { reason: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("EX_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("EX_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config file, missing fields, etc.).
    #[error("EX_ERR_902: Configuration error: {0}")]
    Configuration(String),

    /// I/O error (disk, network).
    #[error("EX_ERR_903: I/O error: {0}")]
    Io(String),

    /// The engine task is gone or its channels are closed.
    #[error("EX_ERR_904: Engine unavailable: {0}")]
    EngineUnavailable(String),
}

impl ExchangeError {
    /// Shorthand for an [`ExchangeError::InvariantViolation`].
    pub fn invariant(reason: impl Into<String>) -> Self {
        Self::InvariantViolation {
            reason: reason.into(),
        }
    }

    /// Classify this error for propagation.
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Self::OrderNotFound(_)
            | Self::InvalidOrder { .. }
            | Self::InsufficientBalance { .. }
            | Self::InvalidTransfer { .. }
            | Self::AmountOverflow { .. } => Severity::Business,
            Self::DuplicateOrder(_)
            | Self::NegativeAmount(_)
            | Self::SequenceGap { .. }
            | Self::DeterminismViolation { .. }
            | Self::InvariantViolation { .. }
            | Self::SupplyInvariantViolation { .. }
            | Self::Internal(_) => Severity::Invariant,
            Self::Storage(_)
            | Self::Serialization(_)
            | Self::Configuration(_)
            | Self::Io(_)
            | Self::EngineUnavailable(_) => Severity::Infrastructure,
        }
    }

    /// Whether the engine must stop processing after this error.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Invariant
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, ExchangeError>;

impl From<std::io::Error> for ExchangeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
