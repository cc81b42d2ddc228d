//! Token unit conversion.
//!
//! The ledger works in integer minor units (`u128`). Persisted records and
//! the run report use whole-token decimal strings with a fixed number of
//! fractional digits equal to the token's decimals, so `499` minor units of
//! a 2-decimal token render as `"4.99"` and of a 0-decimal token as `"499"`.

use crate::{Result, TypesError};

/// Largest supported decimals value (`10^38` still fits in `u128`).
pub const MAX_DECIMALS: u8 = 38;

/// `10^decimals` as `u128`.
pub fn pow10(decimals: u8) -> Result<u128> {
    if decimals > MAX_DECIMALS {
        return Err(TypesError::UnsupportedDecimals(decimals));
    }
    Ok(10u128.pow(u32::from(decimals)))
}

/// Convert a whole-token count into minor units.
pub fn whole_to_units(whole: u64, decimals: u8) -> Result<u128> {
    u128::from(whole)
        .checked_mul(pow10(decimals)?)
        .ok_or_else(|| TypesError::InvalidAmount {
            value: whole.to_string(),
            reason: "overflows u128 minor units".to_string(),
        })
}

/// Render minor units as a fixed-precision whole-token decimal string.
pub fn format_units(amount: u128, decimals: u8) -> Result<String> {
    let scale = pow10(decimals)?;
    let whole = amount / scale;
    if decimals == 0 {
        return Ok(whole.to_string());
    }
    let frac = amount % scale;
    Ok(format!(
        "{whole}.{frac:0width$}",
        width = usize::from(decimals)
    ))
}

/// Parse a whole-token decimal string back into minor units.
///
/// # Errors
///
/// - [`TypesError::InvalidAmount`] on non-digits, more fractional digits
///   than `decimals`, or overflow
pub fn parse_units(value: &str, decimals: u8) -> Result<u128> {
    let invalid = |reason: &str| TypesError::InvalidAmount {
        value: value.to_string(),
        reason: reason.to_string(),
    };
    let scale = pow10(decimals)?;
    let (whole, frac) = match value.split_once('.') {
        Some((w, f)) => (w, f),
        None => (value, ""),
    };
    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("whole part must be decimal digits"));
    }
    if !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("fractional part must be decimal digits"));
    }
    if frac.len() > usize::from(decimals) {
        return Err(invalid("more fractional digits than token decimals"));
    }
    let whole: u128 = whole.parse().map_err(|_| invalid("overflow"))?;
    let frac_units: u128 = if frac.is_empty() {
        0
    } else {
        let padded = format!("{frac:0<width$}", width = usize::from(decimals));
        padded.parse().map_err(|_| invalid("overflow"))?
    };
    whole
        .checked_mul(scale)
        .and_then(|v| v.checked_add(frac_units))
        .ok_or_else(|| invalid("overflow"))
}

/// Serde adapter that stores `u128` minor-unit amounts as decimal strings,
/// accepting plain JSON integers on input.
pub mod amount_str {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    /// Serialize as a decimal string.
    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    /// Deserialize from a decimal string or an unsigned integer.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        struct AmountVisitor;

        impl Visitor<'_> for AmountVisitor {
            type Value = u128;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an unsigned integer or decimal string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<u128, E> {
                Ok(u128::from(v))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<u128, E> {
                v.trim().parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}
