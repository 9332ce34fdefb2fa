//! Decimal numeric helpers shared by the pricing, curve and allocation code.
//!
//! Compounding is done by iterative multiplication rather than `powd` so that
//! integer-period discounting stays exact to the last decimal digit. Only the
//! fractional part of an exponent (stub periods) goes through a series
//! expansion.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::BondAnalyticsError;
use crate::BondAnalyticsResult;

/// Terms used by the binomial expansion of fractional powers.
const BINOMIAL_TERMS: u32 = 15;

/// Smallest binomial term still worth adding.
const BINOMIAL_EPSILON: Decimal = dec!(0.00000000001);

/// `base^exponent` for a non-negative exponent.
///
/// The whole part of the exponent is applied by repeated multiplication with
/// overflow checks; the fractional part (0 < f < 1) by [`pow_fraction`].
pub fn compound(base: Decimal, exponent: Decimal) -> BondAnalyticsResult<Decimal> {
    if exponent < Decimal::ZERO {
        return Err(BondAnalyticsError::invalid_input(
            "exponent",
            "a non-negative number of periods",
            exponent,
        ));
    }

    let whole = exponent.trunc();
    let frac = exponent - whole;

    let mut result = Decimal::ONE;
    for _ in 0..decimal_to_u32(whole) {
        result = result
            .checked_mul(base)
            .ok_or_else(|| BondAnalyticsError::NumericalOverflow {
                context: format!("compounding {base} over {exponent} periods"),
            })?;
    }

    if !frac.is_zero() {
        result = result
            .checked_mul(pow_fraction(base, frac))
            .ok_or_else(|| BondAnalyticsError::NumericalOverflow {
                context: format!("compounding {base} over {exponent} periods"),
            })?;
    }

    Ok(result)
}

/// `base^frac` for `0 <= frac <= 1` via the binomial series
/// (1+x)^f = sum C(f,k) x^k, which converges for |x| < 1. Periodic
/// discount bases always sit in (0, 2).
pub fn pow_fraction(base: Decimal, frac: Decimal) -> Decimal {
    if frac.is_zero() || base == Decimal::ONE {
        return Decimal::ONE;
    }
    if frac == Decimal::ONE {
        return base;
    }

    let x = base - Decimal::ONE;
    let mut result = Decimal::ONE;
    let mut term = Decimal::ONE;

    for k in 1..=BINOMIAL_TERMS {
        let k_dec = Decimal::from(k);
        term *= (frac - k_dec + Decimal::ONE) * x / k_dec;
        result += term;
        if term.abs() < BINOMIAL_EPSILON {
            break;
        }
    }

    result
}

/// Convert a non-negative Decimal to u32, rounding to the nearest integer.
/// Negative or out-of-range values map to 0.
pub fn decimal_to_u32(d: Decimal) -> u32 {
    let rounded = d.round();
    if rounded < Decimal::ZERO {
        0
    } else {
        rounded.to_u32().unwrap_or(0)
    }
}

/// Round a currency amount to cents (banker's rounding, as Decimal does).
pub fn round_to_cents(amount: Decimal) -> Decimal {
    amount.round_dp(2)
}

/// Check that a set of allocation weights lies in [0, 1] individually and
/// sums to 1 within `tolerance`.
pub fn check_weights(
    field: &str,
    weights: &[Decimal],
    tolerance: Decimal,
) -> BondAnalyticsResult<()> {
    for (i, w) in weights.iter().enumerate() {
        if *w < Decimal::ZERO || *w > Decimal::ONE {
            return Err(BondAnalyticsError::invalid_input(
                format!("{field}[{i}]"),
                "a weight between 0 and 1",
                w,
            ));
        }
    }

    let sum: Decimal = weights.iter().sum();
    if (sum - Decimal::ONE).abs() > tolerance {
        return Err(BondAnalyticsError::weights_sum(
            format!("{field} must sum to 1"),
            sum,
        ));
    }

    Ok(())
}
