//! Money amounts: parsing user input and rounding to cents.

use crate::errors::{Error, Result};

/// Rounds to two decimal places.
#[must_use]
pub fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Checks that `amount` is a usable transaction amount and returns it rounded to cents.
///
/// # Errors
/// [`Error::InvalidAmount`] if the amount is not finite or is not positive once rounded.
/// Values so large that scaling to cents overflows count as not finite.
pub fn validate_amount(amount: f64) -> Result<f64> {
    if !amount.is_finite() {
        return Err(Error::InvalidAmount {
            amount: amount.to_string(),
        });
    }
    let rounded = round_to_cents(amount);
    if !rounded.is_finite() || rounded <= 0.0 {
        return Err(Error::InvalidAmount {
            amount: amount.to_string(),
        });
    }
    Ok(rounded)
}

/// Parses an amount typed by a user.
///
/// Accepts `.` or `,` as the decimal separator. Digits beyond the second decimal
/// are dropped, not rounded: `"12.349"` is `12.34`.
///
/// # Errors
/// [`Error::InvalidAmount`] for empty, signed, non-numeric or non-positive input.
pub fn parse_amount(input: &str) -> Result<f64> {
    let invalid = || Error::InvalidAmount {
        amount: input.to_string(),
    };

    let normalized = input.trim().replace(',', ".");
    let (whole, fraction) = match normalized.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (normalized.as_str(), ""),
    };

    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty()) || !all_digits(whole) || !all_digits(fraction) {
        return Err(invalid());
    }

    let cents: String = fraction.chars().take(2).collect();
    let truncated = if cents.is_empty() {
        whole.to_string()
    } else {
        format!("{}.{cents}", if whole.is_empty() { "0" } else { whole })
    };

    let value: f64 = truncated.parse().map_err(|_| invalid())?;
    validate_amount(value).map_err(|_| invalid())
}
