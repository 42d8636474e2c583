//! Supply conservation invariant checker.
//!
//! External funds enter through the debt account, whose balance goes
//! negative by exactly what it hands out. Every other movement is an
//! internal transfer, so for every asset:
//! ```text
//! Σ(available + frozen) over all users, debt included == baseline
//! ```
//! The baseline is zero for a ledger built purely from events.

use std::collections::BTreeMap;

use exchange_types::{Asset, ExchangeError, Result};
use rust_decimal::Decimal;

use crate::AssetReader;

/// Expected per-asset totals.
#[derive(Debug, Clone, Default)]
pub struct SupplyConservation {
    baseline: BTreeMap<Asset, Decimal>,
}

impl SupplyConservation {
    /// Every asset is expected to net to zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn expected_supply(&self, asset: &str) -> Decimal {
        self.baseline.get(asset).copied().unwrap_or(Decimal::ZERO)
    }

    /// # Errors
    /// Returns [`ExchangeError::SupplyInvariantViolation`] if actual ≠ expected.
    pub fn verify(&self, asset: &str, actual_supply: Decimal) -> Result<()> {
        let expected = self.expected_supply(asset);
        if actual_supply != expected {
            return Err(ExchangeError::SupplyInvariantViolation {
                reason: format!("asset {asset}: actual supply {actual_supply} != expected {expected}"),
            });
        }
        Ok(())
    }

    /// Check every asset known to the ledger or to the baseline.
    ///
    /// # Errors
    /// Returns the first [`ExchangeError::SupplyInvariantViolation`] found.
    pub fn verify_ledger(&self, reader: &AssetReader) -> Result<()> {
        let mut assets = reader.assets();
        assets.extend(self.baseline.keys().cloned());
        for asset in assets {
            let actual = reader.total_supply(&asset).ok_or_else(|| {
                ExchangeError::SupplyInvariantViolation {
                    reason: format!("asset {asset}: supply cannot be summed exactly"),
                }
            })?;
            self.verify(&asset, actual)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use exchange_types::{TransferKind, UserId};

    use super::*;
    use crate::AssetService;

    fn fund(svc: &mut AssetService, user: u64, asset: &str, amount: i64) {
        svc.try_transfer(
            TransferKind::AvailableToAvailable,
            UserId::DEBT,
            UserId(user),
            asset,
            Decimal::new(amount, 0),
            false,
        )
        .unwrap();
    }

    #[test]
    fn empty_supply_is_zero() {
        let sc = SupplyConservation::new();
        assert_eq!(sc.expected_supply("BTC"), Decimal::ZERO);
        assert!(sc.verify("BTC", Decimal::ZERO).is_ok());
    }

    #[test]
    fn debt_funded_ledger_nets_to_zero() {
        let mut svc = AssetService::new();
        fund(&mut svc, 2, "USD", 1000);
        fund(&mut svc, 3, "BTC", 5);
        svc.try_freeze(UserId(2), "USD", Decimal::new(300, 0)).unwrap();
        SupplyConservation::new().verify_ledger(&svc.reader()).unwrap();
    }

    #[test]
    fn verify_fails_when_imbalanced() {
        let err = SupplyConservation::new()
            .verify("BTC", Decimal::new(11, 0))
            .unwrap_err();
        assert!(matches!(err, ExchangeError::SupplyInvariantViolation { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn missing_asset_counts_as_zero_actual() {
        let mut sc = SupplyConservation::new();
        sc.baseline.insert("ETH".into(), Decimal::ONE);
        let svc = AssetService::new();
        assert!(sc.verify_ledger(&svc.reader()).is_err());
    }
}
