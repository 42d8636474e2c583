//! Balance tracking types for the ledger.
//!
//! Every (user, asset) pair has an `available` balance (spendable) and a
//! `frozen` balance (reserved by open orders until they fill or cancel).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::exact_add;

/// A single balance entry for a (user, asset) pair.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Balance {
    /// Spendable for new orders / transfers.
    pub available: Decimal,
    /// Reserved for open orders awaiting matching or cancellation.
    pub frozen: Decimal,
}

impl Balance {
    /// Create a zero balance.
    #[must_use]
    pub fn new() -> Self {
        Self {
            available: Decimal::ZERO,
            frozen: Decimal::ZERO,
        }
    }

    /// Total balance (available + frozen), `None` if it is not exact.
    #[must_use]
    pub fn total(&self) -> Option<Decimal> {
        exact_add(self.available, self.frozen)
    }

    /// Whether this entry has no balance at all.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.available.is_zero() && self.frozen.is_zero()
    }
}

impl Default for Balance {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Balance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "available={}, frozen={}", self.available, self.frozen)
    }
}

/// Which sub-balances a ledger transfer moves between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferKind {
    /// Source available → destination available.
    AvailableToAvailable,
    /// Source available → destination frozen (a freeze when source == destination).
    AvailableToFrozen,
    /// Source frozen → destination available (an unfreeze when source == destination).
    FrozenToAvailable,
}

impl std::fmt::Display for TransferKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AvailableToAvailable => write!(f, "AVAILABLE_TO_AVAILABLE"),
            Self::AvailableToFrozen => write!(f, "AVAILABLE_TO_FROZEN"),
            Self::FrozenToAvailable => write!(f, "FROZEN_TO_AVAILABLE"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balance_default_is_zero() {
        let entry = Balance::default();
        assert_eq!(entry.available, Decimal::ZERO);
        assert_eq!(entry.frozen, Decimal::ZERO);
        assert!(entry.is_zero());
    }

    #[test]
    fn balance_total() {
        let entry = Balance {
            available: Decimal::new(100, 0),
            frozen: Decimal::new(50, 0),
        };
        assert_eq!(entry.total(), Some(Decimal::new(150, 0)));
        assert!(!entry.is_zero());
        assert_eq!(format!("{entry}"), "available=100, frozen=50");
    }

    #[test]
    fn transfer_kind_display() {
        assert_eq!(
            TransferKind::FrozenToAvailable.to_string(),
            "FROZEN_TO_AVAILABLE"
        );
    }
}
