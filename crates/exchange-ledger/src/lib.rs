//! # exchange-ledger
//!
//! **Asset ledger**: per-(user, asset) balances split into `available` and
//! `frozen`.
//!
//! ## Ownership
//!
//! ```text
//! AssetService (one, &mut)  ──writes──►  Arc<DashMap<UserId, BTreeMap<Asset, Balance>>>
//! AssetReader  (many, Clone) ──reads───►           (same map)
//! ```
//!
//! Only the engine thread owns the [`AssetService`]. Any number of
//! [`AssetReader`] handles may query balances concurrently; a reader sees
//! every individual balance update atomically, though a multi-leg transfer
//! may be observed half-applied.
//!
//! [`SupplyConservation`] checks that the ledger nets to the expected
//! per-asset total after every batch.

pub mod asset_service;
pub mod supply_conservation;

pub use asset_service::{AssetReader, AssetService};
pub use supply_conservation::SupplyConservation;
