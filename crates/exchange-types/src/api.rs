//! Results emitted back to request originators, correlated by `ref_id`.

use serde::{Deserialize, Serialize};

use crate::{ExchangeError, Order, SequenceId};

/// User-facing error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiErrorCode {
    NoEnoughAsset,
    OrderNotFound,
    ParameterInvalid,
    OperationTimeout,
    InternalServerError,
}

impl std::fmt::Display for ApiErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NoEnoughAsset => "NO_ENOUGH_ASSET",
            Self::OrderNotFound => "ORDER_NOT_FOUND",
            Self::ParameterInvalid => "PARAMETER_INVALID",
            Self::OperationTimeout => "OPERATION_TIMEOUT",
            Self::InternalServerError => "INTERNAL_SERVER_ERROR",
        };
        f.write_str(s)
    }
}

/// Structured error returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

impl ApiError {
    #[must_use]
    pub fn new(code: ApiErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn timeout() -> Self {
        Self::new(ApiErrorCode::OperationTimeout, "Operation timeout.")
    }
}

impl From<&ExchangeError> for ApiError {
    fn from(err: &ExchangeError) -> Self {
        let code = match err {
            ExchangeError::InsufficientBalance { .. } => ApiErrorCode::NoEnoughAsset,
            ExchangeError::OrderNotFound(_) => ApiErrorCode::OrderNotFound,
            ExchangeError::InvalidOrder { .. }
            | ExchangeError::InvalidTransfer { .. }
            | ExchangeError::AmountOverflow { .. } => ApiErrorCode::ParameterInvalid,
            _ => ApiErrorCode::InternalServerError,
        };
        Self::new(code, err.to_string())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Successful outcome of one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiPayload {
    /// The order as it stands after its initial matching pass.
    OrderCreated { order: Order },
    /// The order as it stands after cancellation.
    OrderCancelled { order: Order },
    Transferred,
}

/// Result for the event that carried `ref_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResult {
    pub ref_id: String,
    pub sequence_id: SequenceId,
    pub result: std::result::Result<ApiPayload, ApiError>,
}

impl ApiResult {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}
