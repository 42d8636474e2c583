//! Exact decimal arithmetic for prices, quantities and balances.
//!
//! `rust_decimal` operators panic on overflow, and once a result needs more
//! than 28 significant digits they round it. Ledger amounts must be exact,
//! so these helpers return `None` in both cases.
//!
//! A result is exact when it keeps the scale the operands imply. Zero
//! operands are short-circuited by `rust_decimal` and are exact anyway.

use rust_decimal::Decimal;

/// `a + b`, or `None` if the sum overflows or loses precision.
#[must_use]
pub fn exact_add(a: Decimal, b: Decimal) -> Option<Decimal> {
    let sum = a.checked_add(b)?;
    keeps_scale(sum, a, b, a.scale().max(b.scale()))
}

/// `a - b`, or `None` if the difference overflows or loses precision.
#[must_use]
pub fn exact_sub(a: Decimal, b: Decimal) -> Option<Decimal> {
    let diff = a.checked_sub(b)?;
    keeps_scale(diff, a, b, a.scale().max(b.scale()))
}

/// `a × b`, or `None` if the product overflows or loses precision.
#[must_use]
pub fn exact_mul(a: Decimal, b: Decimal) -> Option<Decimal> {
    let product = a.checked_mul(b)?;
    keeps_scale(product, a, b, a.scale() + b.scale())
}

fn keeps_scale(result: Decimal, a: Decimal, b: Decimal, scale: u32) -> Option<Decimal> {
    (a.is_zero() || b.is_zero() || result.scale() >= scale).then_some(result)
}
