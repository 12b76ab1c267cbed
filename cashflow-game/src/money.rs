//! Integer money helpers centralizing percentage truncation.
//!
//! All money in the engine is `i64` cents. Percentages (interest, down
//! payments) are applied here, exactly once, with explicit truncation
//! toward zero; no other module performs rate arithmetic.

/// Money in integer cents.
pub type Money = i64;

/// Apply a whole-number percentage to an amount, truncating toward zero.
///
/// Widens to `i128` internally so `amount * pct` cannot overflow.
#[must_use]
pub fn pct_of(amount_cents: Money, pct: u32) -> Money {
    let scaled = i128::from(amount_cents) * i128::from(pct) / 100;
    Money::try_from(scaled).unwrap_or(if scaled < 0 { Money::MIN } else { Money::MAX })
}

/// Multiply a per-unit amount by a unit count, saturating on overflow.
#[must_use]
pub fn times_units(amount_cents: Money, units: u32) -> Money {
    amount_cents.saturating_mul(Money::from(units))
}
