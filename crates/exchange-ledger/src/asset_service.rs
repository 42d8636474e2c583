//! The asset ledger.
//!
//! Tracks per-(user, asset) balances with available/frozen accounting.
//! Every movement goes through [`AssetService::try_transfer`]; freeze,
//! unfreeze and settlement transfers are thin wrappers around it.
//!
//! A failed check leaves the ledger untouched. A successful transfer debits
//! the source and credits the destination under the same `&mut self`
//! borrow, so no other writer can interleave.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::sync::Arc;

use dashmap::DashMap;
use exchange_types::{
    Asset, Balance, ExchangeError, Result, TransferKind, UserId, exact_add, exact_sub,
};
use rust_decimal::Decimal;

type Ledger = DashMap<UserId, BTreeMap<Asset, Balance>>;

// ---------------------------------------------------------------------------
// AssetReader
// ---------------------------------------------------------------------------

/// Cloneable read-only view of the ledger.
///
/// Safe to use from any thread while the engine keeps writing.
#[derive(Debug, Clone, Default)]
pub struct AssetReader {
    ledger: Arc<Ledger>,
}

impl AssetReader {
    /// Balance of one asset, `None` if the user never touched it.
    #[must_use]
    pub fn get_asset(&self, user_id: UserId, asset: &str) -> Option<Balance> {
        self.ledger
            .get(&user_id)
            .and_then(|assets| assets.value().get(asset).copied())
    }

    /// All balances of a user, keyed by asset. Empty for unknown users.
    #[must_use]
    pub fn get_assets(&self, user_id: UserId) -> BTreeMap<Asset, Balance> {
        self.ledger
            .get(&user_id)
            .map(|assets| assets.value().clone())
            .unwrap_or_default()
    }

    /// Sum of available + frozen across all users, debt account included.
    ///
    /// `None` if the sum cannot be represented exactly.
    #[must_use]
    pub fn total_supply(&self, asset: &str) -> Option<Decimal> {
        self.ledger
            .iter()
            .filter_map(|entry| entry.value().get(asset).map(Balance::total))
            .try_fold(Decimal::ZERO, |sum, total| exact_add(sum, total?))
    }

    /// Every asset that appears anywhere in the ledger.
    #[must_use]
    pub fn assets(&self) -> BTreeSet<Asset> {
        self.ledger
            .iter()
            .flat_map(|entry| entry.value().keys().cloned().collect::<Vec<_>>())
            .collect()
    }

    /// Ordered copy of the whole ledger.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<UserId, BTreeMap<Asset, Balance>> {
        self.ledger
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    /// Human-readable dump, one line per non-zero (user, asset), ordered.
    #[must_use]
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (user, assets) in self.snapshot() {
            for (asset, balance) in assets.iter().filter(|(_, b)| !b.is_zero()) {
                let _ = writeln!(out, "{user} {asset}: {balance}");
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// AssetService
// ---------------------------------------------------------------------------

/// The single writer of the ledger.
///
/// Deliberately not `Clone`: hand out [`AssetReader`]s via [`Self::reader`].
#[derive(Debug, Default)]
pub struct AssetService {
    view: AssetReader,
}

impl AssetService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A read-only handle sharing this ledger.
    #[must_use]
    pub fn reader(&self) -> AssetReader {
        self.view.clone()
    }

    #[must_use]
    pub fn get_asset(&self, user_id: UserId, asset: &str) -> Option<Balance> {
        self.view.get_asset(user_id, asset)
    }

    /// Balance of one asset, zero if the user never touched it.
    #[must_use]
    pub fn balance(&self, user_id: UserId, asset: &str) -> Balance {
        self.get_asset(user_id, asset).unwrap_or_default()
    }

    #[must_use]
    pub fn get_assets(&self, user_id: UserId) -> BTreeMap<Asset, Balance> {
        self.view.get_assets(user_id)
    }

    #[must_use]
    pub fn total_supply(&self, asset: &str) -> Option<Decimal> {
        self.view.total_supply(asset)
    }

    #[must_use]
    pub fn dump(&self) -> String {
        self.view.dump()
    }

    /// Move `amount` of `asset` from one user's balance to another's.
    ///
    /// | kind                   | source side | destination side |
    /// |------------------------|-------------|------------------|
    /// | `AvailableToAvailable` | available   | available        |
    /// | `AvailableToFrozen`    | available   | frozen           |
    /// | `FrozenToAvailable`    | frozen      | available        |
    ///
    /// With `check_balance`, returns `Ok(false)` and changes nothing when the
    /// source side holds less than `amount`. Without it the source may go
    /// negative. A zero amount is a successful no-op.
    ///
    /// # Errors
    /// Returns [`ExchangeError::NegativeAmount`] if `amount < 0`, and
    /// [`ExchangeError::AmountOverflow`] (changing nothing) if either side
    /// would leave the exactly representable range.
    pub fn try_transfer(
        &mut self,
        kind: TransferKind,
        from: UserId,
        to: UserId,
        asset: &str,
        amount: Decimal,
        check_balance: bool,
    ) -> Result<bool> {
        if amount < Decimal::ZERO {
            return Err(ExchangeError::NegativeAmount(amount));
        }
        if amount.is_zero() {
            return Ok(true);
        }

        let source = self.balance(from, asset);
        let held = match kind {
            TransferKind::AvailableToAvailable | TransferKind::AvailableToFrozen => {
                source.available
            }
            TransferKind::FrozenToAvailable => source.frozen,
        };
        if check_balance && held < amount {
            tracing::debug!(
                %from, %to, asset, %amount, %held, %kind,
                "transfer rejected: insufficient balance"
            );
            return Ok(false);
        }

        let overflow = || {
            tracing::warn!(
                %from, %to, asset, %amount, %kind,
                "transfer rejected: amount overflow"
            );
            ExchangeError::AmountOverflow {
                reason: format!("{kind} transfer of {amount} {asset} from {from} to {to}"),
            }
        };
        let mut debited = source;
        let side = match kind {
            TransferKind::AvailableToAvailable | TransferKind::AvailableToFrozen => {
                &mut debited.available
            }
            TransferKind::FrozenToAvailable => &mut debited.frozen,
        };
        *side = exact_sub(*side, amount).ok_or_else(overflow)?;

        let mut credited = if from == to { debited } else { self.balance(to, asset) };
        let side = match kind {
            TransferKind::AvailableToAvailable | TransferKind::FrozenToAvailable => {
                &mut credited.available
            }
            TransferKind::AvailableToFrozen => &mut credited.frozen,
        };
        *side = exact_add(*side, amount).ok_or_else(overflow)?;

        // Both sides are computed before either is written.
        if from != to {
            self.store(from, asset, debited);
        }
        self.store(to, asset, credited);
        Ok(true)
    }

    /// Checked transfer that must succeed.
    ///
    /// # Errors
    /// Returns [`ExchangeError::InvariantViolation`] if the source is short
    /// or the amount overflows: the caller's bookkeeping guaranteed neither.
    pub fn transfer(
        &mut self,
        kind: TransferKind,
        from: UserId,
        to: UserId,
        asset: &str,
        amount: Decimal,
    ) -> Result<()> {
        let done = self
            .try_transfer(kind, from, to, asset, amount, true)
            .map_err(|err| match err {
                ExchangeError::AmountOverflow { reason } => ExchangeError::invariant(reason),
                other => other,
            })?;
        if done {
            return Ok(());
        }
        let source = self.balance(from, asset);
        tracing::error!(
            %from, %to, asset, %amount, %kind, balance = %source,
            "settlement transfer failed"
        );
        Err(ExchangeError::invariant(format!(
            "{kind} transfer of {amount} {asset} from {from} to {to} failed ({source})"
        )))
    }

    /// Available → frozen on the same account. `Ok(false)` if short.
    ///
    /// # Errors
    /// Returns [`ExchangeError::NegativeAmount`] if `amount < 0`, or
    /// [`ExchangeError::AmountOverflow`] if the frozen side would overflow.
    pub fn try_freeze(&mut self, user_id: UserId, asset: &str, amount: Decimal) -> Result<bool> {
        let ok = self.try_transfer(
            TransferKind::AvailableToFrozen,
            user_id,
            user_id,
            asset,
            amount,
            true,
        )?;
        if ok {
            tracing::debug!(user = %user_id, asset, %amount, "frozen");
        }
        Ok(ok)
    }

    /// Frozen → available on the same account.
    ///
    /// # Errors
    /// Returns [`ExchangeError::InvariantViolation`] if less than `amount`
    /// is frozen.
    pub fn unfreeze(&mut self, user_id: UserId, asset: &str, amount: Decimal) -> Result<()> {
        self.transfer(
            TransferKind::FrozenToAvailable,
            user_id,
            user_id,
            asset,
            amount,
        )?;
        tracing::debug!(user = %user_id, asset, %amount, "unfrozen");
        Ok(())
    }

    fn store(&mut self, user_id: UserId, asset: &str, balance: Balance) {
        let mut assets = self.view.ledger.entry(user_id).or_default();
        assets.value_mut().insert(asset.to_string(), balance);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USD: &str = "USD";
    const BTC: &str = "BTC";

    fn d(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    fn funded(user: UserId, asset: &str, amount: Decimal) -> AssetService {
        let mut svc = AssetService::new();
        svc.try_transfer(
            TransferKind::AvailableToAvailable,
            UserId::DEBT,
            user,
            asset,
            amount,
            false,
        )
        .unwrap();
        svc
    }

    #[test]
    fn unknown_user_has_no_assets() {
        let svc = AssetService::new();
        assert_eq!(svc.get_asset(UserId(7), USD), None);
        assert!(svc.get_assets(UserId(7)).is_empty());
        assert_eq!(svc.balance(UserId(7), USD), Balance::new());
    }

    #[test]
    fn unchecked_transfer_lets_debt_go_negative() {
        let svc = funded(UserId(2), USD, d(1000));
        assert_eq!(svc.balance(UserId::DEBT, USD).available, d(-1000));
        assert_eq!(svc.balance(UserId(2), USD).available, d(1000));
        assert_eq!(svc.total_supply(USD), Some(Decimal::ZERO));
    }

    #[test]
    fn checked_transfer_insufficient_changes_nothing() {
        let mut svc = funded(UserId(2), USD, d(100));
        let before = svc.reader().snapshot();
        let ok = svc
            .try_transfer(
                TransferKind::AvailableToAvailable,
                UserId(2),
                UserId(3),
                USD,
                d(101),
                true,
            )
            .unwrap();
        assert!(!ok);
        assert_eq!(svc.reader().snapshot(), before);
        assert_eq!(svc.get_asset(UserId(3), USD), None);
    }

    #[test]
    fn negative_amount_is_an_error() {
        let mut svc = funded(UserId(2), USD, d(100));
        let err = svc
            .try_transfer(
                TransferKind::AvailableToAvailable,
                UserId(2),
                UserId(3),
                USD,
                d(-1),
                false,
            )
            .unwrap_err();
        assert!(matches!(err, ExchangeError::NegativeAmount(_)));
        assert_eq!(svc.balance(UserId(2), USD).available, d(100));
    }

    #[test]
    fn zero_amount_is_a_noop() {
        let mut svc = AssetService::new();
        assert!(
            svc.try_transfer(
                TransferKind::FrozenToAvailable,
                UserId(2),
                UserId(3),
                BTC,
                Decimal::ZERO,
                true,
            )
            .unwrap()
        );
        assert!(svc.reader().snapshot().is_empty());
    }

    #[test]
    fn freeze_and_unfreeze_same_account() {
        let mut svc = funded(UserId(2), USD, d(1000));
        assert!(svc.try_freeze(UserId(2), USD, d(400)).unwrap());
        let bal = svc.balance(UserId(2), USD);
        assert_eq!(bal.available, d(600));
        assert_eq!(bal.frozen, d(400));

        svc.unfreeze(UserId(2), USD, d(150)).unwrap();
        let bal = svc.balance(UserId(2), USD);
        assert_eq!(bal.available, d(750));
        assert_eq!(bal.frozen, d(250));
    }

    #[test]
    fn freeze_insufficient_returns_false() {
        let mut svc = funded(UserId(2), USD, d(100));
        assert!(!svc.try_freeze(UserId(2), USD, d(200)).unwrap());
        assert_eq!(svc.balance(UserId(2), USD).available, d(100));
        assert_eq!(svc.balance(UserId(2), USD).frozen, Decimal::ZERO);
    }

    #[test]
    fn unfreeze_more_than_frozen_is_invariant_violation() {
        let mut svc = funded(UserId(2), USD, d(100));
        svc.try_freeze(UserId(2), USD, d(10)).unwrap();
        let err = svc.unfreeze(UserId(2), USD, d(11)).unwrap_err();
        assert!(matches!(err, ExchangeError::InvariantViolation { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn frozen_to_available_between_users() {
        let mut svc = funded(UserId(2), USD, d(500));
        svc.try_freeze(UserId(2), USD, d(500)).unwrap();
        svc.transfer(TransferKind::FrozenToAvailable, UserId(2), UserId(3), USD, d(300))
            .unwrap();
        assert_eq!(svc.balance(UserId(2), USD).frozen, d(200));
        assert_eq!(svc.balance(UserId(3), USD).available, d(300));
        assert_eq!(svc.total_supply(USD), Some(Decimal::ZERO));
    }

    #[test]
    fn reader_sees_writer_updates() {
        let mut svc = AssetService::new();
        let reader = svc.reader();
        assert!(reader.get_asset(UserId(2), BTC).is_none());
        svc.try_transfer(
            TransferKind::AvailableToAvailable,
            UserId::DEBT,
            UserId(2),
            BTC,
            d(3),
            false,
        )
        .unwrap();
        assert_eq!(reader.get_asset(UserId(2), BTC).unwrap().available, d(3));
        assert_eq!(reader.assets().into_iter().collect::<Vec<_>>(), vec![BTC.to_string()]);
    }

    #[test]
    fn reader_is_usable_from_another_thread() {
        let svc = funded(UserId(2), USD, d(42));
        let reader = svc.reader();
        let seen = std::thread::spawn(move || reader.get_asset(UserId(2), USD))
            .join()
            .unwrap();
        assert_eq!(seen.unwrap().available, d(42));
    }

    #[test]
    fn dump_is_ordered_by_user_then_asset() {
        let mut svc = funded(UserId(3), USD, d(1));
        svc.try_transfer(
            TransferKind::AvailableToAvailable,
            UserId::DEBT,
            UserId(2),
            BTC,
            d(2),
            false,
        )
        .unwrap();
        let dump = svc.dump();
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("user:1 BTC"), "{dump}");
        assert!(lines[2].starts_with("user:2 BTC"), "{dump}");
        assert!(lines[3].starts_with("user:3 USD"), "{dump}");
    }

    #[test]
    fn dump_skips_zero_balances() {
        let mut svc = funded(UserId(2), USD, d(5));
        svc.try_transfer(
            TransferKind::AvailableToAvailable,
            UserId(2),
            UserId(3),
            USD,
            d(5),
            true,
        )
        .unwrap();
        let dump = svc.dump();
        assert!(!dump.contains("user:2"), "{dump}");
        assert_eq!(dump.lines().count(), 2);
    }

    #[test]
    fn deposit_past_the_decimal_range_changes_nothing() {
        let huge = Decimal::from_i128_with_scale(50_000_000_000_000_000_000_000_000_000, 0);
        let mut svc = funded(UserId(2), USD, huge);
        let err = svc
            .try_transfer(
                TransferKind::AvailableToAvailable,
                UserId::DEBT,
                UserId(2),
                USD,
                huge,
                false,
            )
            .unwrap_err();
        assert!(matches!(err, ExchangeError::AmountOverflow { .. }), "{err}");
        assert_eq!(svc.balance(UserId(2), USD).available, huge);
        assert_eq!(svc.balance(UserId::DEBT, USD).available, -huge);
        assert_eq!(svc.total_supply(USD), Some(Decimal::ZERO));
    }

    #[test]
    fn credit_that_would_round_is_rejected() {
        let big = Decimal::from_i128_with_scale(10_000_000_000_000_000_000_000_000_000, 0);
        let mut svc = funded(UserId(2), USD, big);
        let err = svc
            .try_transfer(
                TransferKind::AvailableToAvailable,
                UserId::DEBT,
                UserId(2),
                USD,
                Decimal::new(1, 4),
                false,
            )
            .unwrap_err();
        assert!(matches!(err, ExchangeError::AmountOverflow { .. }));
        assert_eq!(svc.balance(UserId(2), USD).available, big);
    }

    #[test]
    fn random_transfers_conserve_supply() {
        use rand::{Rng, SeedableRng, rngs::StdRng};

        let mut rng = StdRng::seed_from_u64(7);
        let mut svc = AssetService::new();
        for user in 2..6 {
            svc.try_transfer(
                TransferKind::AvailableToAvailable,
                UserId::DEBT,
                UserId(user),
                USD,
                d(1_000),
                false,
            )
            .unwrap();
        }
        for _ in 0..500 {
            let from = UserId(rng.gen_range(2..6));
            let to = UserId(rng.gen_range(2..6));
            let amount = Decimal::new(rng.gen_range(0..50_000), 2);
            let kind = match rng.gen_range(0..3) {
                0 => TransferKind::AvailableToAvailable,
                1 => TransferKind::AvailableToFrozen,
                _ => TransferKind::FrozenToAvailable,
            };
            svc.try_transfer(kind, from, to, USD, amount, true).unwrap();
            let bal = svc.balance(from, USD);
            assert!(bal.available >= Decimal::ZERO && bal.frozen >= Decimal::ZERO);
        }
        assert_eq!(svc.total_supply(USD), Some(Decimal::ZERO));
    }
}
