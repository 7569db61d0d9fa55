//! Exact integer arithmetic shared by the calculators.
//!
//! Validators must agree bit-for-bit, so nothing here uses floating point
//! for a value that reaches the result map. Every `value * weight / sum`
//! widens to `u128` before multiplying.

use crate::domain::DividendError;

/// `floor(value * numerator / denominator)` with a 128-bit intermediate.
///
/// A zero denominator yields zero: an empty weight pool distributes nothing.
pub fn mul_div(value: u64, numerator: u64, denominator: u64) -> Result<u64, DividendError> {
    if denominator == 0 {
        return Ok(0);
    }
    let product = value as u128 * numerator as u128;
    u64::try_from(product / denominator as u128).map_err(|_| {
        DividendError::overflow(format!("{value} * {numerator} / {denominator}"))
    })
}

/// Like [`mul_div`] for a 128-bit left operand (pool-wide sums).
pub fn mul_div_wide(value: u128, numerator: u64, denominator: u64) -> Result<u64, DividendError> {
    if denominator == 0 {
        return Ok(0);
    }
    let product = value
        .checked_mul(numerator as u128)
        .ok_or_else(|| DividendError::overflow(format!("{value} * {numerator}")))?;
    u64::try_from(product / denominator as u128).map_err(|_| {
        DividendError::overflow(format!("{value} * {numerator} / {denominator}"))
    })
}

/// Floor of the integer cube root.
pub fn icbrt(n: u128) -> u128 {
    if n < 8 {
        return u128::from(n > 0);
    }
    // Float estimate, then exact correction in both directions.
    let mut root = (n as f64).cbrt() as u128;
    while cube(root).map_or(true, |c| c > n) {
        root -= 1;
    }
    while cube(root + 1).map_or(false, |c| c <= n) {
        root += 1;
    }
    root
}

fn cube(x: u128) -> Option<u128> {
    x.checked_mul(x)?.checked_mul(x)
}

/// Spread weight of a child contribution.
///
/// Linear (`10x`) up to the breakpoint, then `x + 9 * breakpoint`. The two
/// branches meet at `x == breakpoint`.
pub fn decay(amount: u64, breakpoint: u64) -> Result<u64, DividendError> {
    let decayed = if amount <= breakpoint {
        amount.checked_mul(10)
    } else {
        breakpoint
            .checked_mul(9)
            .and_then(|cap| amount.checked_add(cap))
    };
    decayed.ok_or_else(|| DividendError::overflow(format!("decay({amount})")))
}

/// `floor(cbrt(amount / unit) * unit)`, evaluated as `icbrt(amount * unit^2)`.
pub fn dampen(amount: u64, unit: u64) -> Result<u64, DividendError> {
    let scaled = (unit as u128)
        .checked_mul(unit as u128)
        .and_then(|unit_sq| unit_sq.checked_mul(amount as u128))
        .ok_or_else(|| DividendError::overflow(format!("dampen({amount}) with unit {unit}")))?;
    u64::try_from(icbrt(scaled))
        .map_err(|_| DividendError::overflow(format!("dampen({amount}) exceeds u64")))
}

pub fn checked_add(a: u64, b: u64, context: &str) -> Result<u64, DividendError> {
    a.checked_add(b)
        .ok_or_else(|| DividendError::overflow(format!("{context}: {a} + {b}")))
}

pub fn checked_sub(a: u64, b: u64, context: &str) -> Result<u64, DividendError> {
    a.checked_sub(b)
        .ok_or_else(|| DividendError::overflow(format!("{context}: {a} - {b}")))
}
