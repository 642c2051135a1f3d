//! Money Conversion Module
//!
//! Unified conversion between the internal paise representation (`u64`)
//! and the client-facing decimal string representation. All conversions
//! MUST go through this module.
//!
//! ## Design Principles
//! 1. Explicit error handling: no silent truncation
//! 2. Strict formats at the boundary: reject `.5`, `5.`, negatives
//! 3. Internal unit is paise, scale factor 10^2

use crate::core_types::AMOUNT_DECIMALS;
use rust_decimal::prelude::*;
use thiserror::Error;

/// Money conversion errors
#[derive(Debug, Error)]
pub enum MoneyError {
    #[error("Precision overflow: provided {provided} decimals, max allowed {max}")]
    PrecisionOverflow { provided: u32, max: u32 },

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Amount too large, would overflow")]
    Overflow,

    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Convert a client amount string to internal paise.
///
/// # Errors
/// * `PrecisionOverflow` - more than 2 decimal places
/// * `InvalidAmount` - zero or negative
/// * `Overflow` - result would overflow u64
/// * `InvalidFormat` - malformed string
///
/// # Example
/// ```
/// use skillpay::money::parse_amount;
/// assert_eq!(parse_amount("500.00").unwrap(), 50_000);
/// assert_eq!(parse_amount("1.5").unwrap(), 150);
/// ```
pub fn parse_amount(amount_str: &str) -> Result<u64, MoneyError> {
    let amount_str = amount_str.trim();
    if amount_str.is_empty() {
        return Err(MoneyError::InvalidFormat("empty string".into()));
    }

    if amount_str.starts_with('-') || amount_str.starts_with('+') {
        return Err(MoneyError::InvalidAmount);
    }

    let parts: Vec<&str> = amount_str.split('.').collect();
    let (whole, frac) = match parts.len() {
        1 => (parts[0], ""),
        2 => {
            // Require both sides of the dot to be non-empty.
            // This prevents ambiguous formats like ".5" or "5."
            if parts[0].is_empty() {
                return Err(MoneyError::InvalidFormat(
                    "missing leading zero (e.g., use 0.5 instead of .5)".into(),
                ));
            }
            if parts[1].is_empty() {
                return Err(MoneyError::InvalidFormat(
                    "missing fractional part (e.g., use 5.0 instead of 5.)".into(),
                ));
            }
            (parts[0], parts[1])
        }
        _ => return Err(MoneyError::InvalidFormat("multiple decimal points".into())),
    };

    // Reject if too many decimals - no silent truncation
    if frac.len() > AMOUNT_DECIMALS as usize {
        return Err(MoneyError::PrecisionOverflow {
            provided: frac.len() as u32,
            max: AMOUNT_DECIMALS,
        });
    }

    let whole_num: u64 = whole.parse::<u64>().map_err(|e| {
        let err_str = e.to_string();
        if err_str.contains("too large") || err_str.contains("overflow") {
            MoneyError::Overflow
        } else {
            MoneyError::InvalidFormat(format!("invalid character in whole part: {}", whole))
        }
    })?;

    let frac_num: u64 = if frac.is_empty() {
        0
    } else {
        let frac_padded = format!("{:0<width$}", frac, width = AMOUNT_DECIMALS as usize);
        frac_padded[..AMOUNT_DECIMALS as usize]
            .parse::<u64>()
            .map_err(|_| MoneyError::InvalidFormat("invalid fractional part".into()))?
    };

    let multiplier = 10u64.pow(AMOUNT_DECIMALS);
    let amount = whole_num
        .checked_mul(multiplier)
        .and_then(|v| v.checked_add(frac_num))
        .ok_or(MoneyError::Overflow)?;

    if amount == 0 {
        return Err(MoneyError::InvalidAmount);
    }

    Ok(amount)
}

/// Convert a Decimal to internal paise.
///
/// Used at the gateway boundary where `rust_decimal::Decimal` handles
/// JSON deserialization.
pub fn parse_decimal(decimal: Decimal) -> Result<u64, MoneyError> {
    if decimal.is_sign_negative() || decimal.is_zero() {
        return Err(MoneyError::InvalidAmount);
    }

    if decimal.scale() > AMOUNT_DECIMALS {
        return Err(MoneyError::PrecisionOverflow {
            provided: decimal.scale(),
            max: AMOUNT_DECIMALS,
        });
    }

    let multiplier = Decimal::from(10u64.pow(AMOUNT_DECIMALS));
    let result = decimal * multiplier;

    // Should not have fractional part after scaling
    if !result.fract().is_zero() {
        return Err(MoneyError::PrecisionOverflow {
            provided: decimal.scale(),
            max: AMOUNT_DECIMALS,
        });
    }

    result.to_u64().ok_or(MoneyError::Overflow)
}

/// Convert internal paise to a display string ("500.00").
pub fn format_amount(value: u64) -> String {
    let decimal_value = Decimal::from(value) / Decimal::from(10u64.pow(AMOUNT_DECIMALS));
    format!("{:.prec$}", decimal_value, prec = AMOUNT_DECIMALS as usize)
}

/// Convert signed paise to a display string (for balance deltas).
pub fn format_amount_signed(value: i64) -> String {
    let formatted = format_amount(value.unsigned_abs());
    if value < 0 {
        format!("-{}", formatted)
    } else {
        formatted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn parse_amount_variations() {
        assert_eq!(parse_amount("1.23").unwrap(), 123);
        assert_eq!(parse_amount("500").unwrap(), 50_000);
        assert_eq!(parse_amount("500.00").unwrap(), 50_000);
        assert_eq!(parse_amount("001.23").unwrap(), 123);
        assert_eq!(parse_amount("0.01").unwrap(), 1);

        // Zero rejected - amounts must be positive
        assert!(parse_amount("0").is_err());
        assert!(parse_amount("0.00").is_err());
    }

    #[test]
    fn parse_amount_invalid_formats() {
        let cases = [
            "1,000.00", // commas
            "1.2.3",    // multiple dots
            "1. 23",    // internal spaces
            "+1.23",    // explicit plus
            "-1.23",    // negative
            "1e2",      // scientific notation
            ".",        // lone dot
            ".5",       // missing leading zero
            "5.",       // missing fractional part
            "",         // empty
        ];
        for case in cases {
            assert!(parse_amount(case).is_err(), "should reject: {:?}", case);
        }
    }

    #[test]
    fn parse_amount_precision_limit() {
        assert!(parse_amount("1.23").is_ok());
        let res = parse_amount("1.234");
        assert!(matches!(
            res,
            Err(MoneyError::PrecisionOverflow {
                provided: 3,
                max: 2
            })
        ));
    }

    #[test]
    fn parse_amount_u64_boundary() {
        // u64::MAX = 18,446,744,073,709,551,615 paise
        assert_eq!(
            parse_amount("184467440737095516.15").unwrap(),
            u64::MAX
        );
        assert!(matches!(
            parse_amount("184467440737095516.16"),
            Err(MoneyError::Overflow)
        ));
    }

    #[test]
    fn parse_decimal_edge_cases() {
        let d = Decimal::from_str("1.230").unwrap(); // scale 3
        assert!(parse_decimal(d).is_err());

        let d = Decimal::from_str("1.23").unwrap();
        assert_eq!(parse_decimal(d).unwrap(), 123);

        assert!(parse_decimal(Decimal::ZERO).is_err());
        assert!(parse_decimal(Decimal::from_str("-1").unwrap()).is_err());
    }

    #[test]
    fn format_roundtrip() {
        for val in [1u64, 99, 100, 2_500, 50_000, 150_000] {
            let formatted = format_amount(val);
            assert_eq!(parse_amount(&formatted).unwrap(), val);
        }
    }

    #[test]
    fn format_signed() {
        assert_eq!(format_amount_signed(-50_000), "-500.00");
        assert_eq!(format_amount_signed(2_500), "25.00");
    }
}
