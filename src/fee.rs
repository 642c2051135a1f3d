//! Platform fee calculation
//!
//! All fee rates use 10^6 precision: 50_000 = 5.00%

/// Fee rate precision (10^6 = 1,000,000)
pub const FEE_PRECISION: u64 = 1_000_000;

/// Default platform fee rate (50_000 = 5%)
pub const DEFAULT_PLATFORM_FEE: u64 = 50_000;

/// Calculate the platform fee from a gross amount and rate.
///
/// Rounds half-up. Uses u128 intermediate to prevent overflow.
///
/// # Arguments
/// * `gross` - Amount in paise
/// * `rate` - Fee rate in 10^6 precision (50_000 = 5%)
///
/// # Example
/// ```
/// use skillpay::fee::platform_fee;
/// // ₹500.00 * 5% = ₹25.00
/// assert_eq!(platform_fee(50_000, 50_000), 2_500);
/// ```
#[inline]
pub fn platform_fee(gross: u64, rate: u64) -> u64 {
    let scaled = gross as u128 * rate as u128;
    ((scaled + FEE_PRECISION as u128 / 2) / FEE_PRECISION as u128) as u64
}

/// Split a gross amount into (fee, provider_net).
///
/// The fee is fixed at escrow-lock time and never recomputed.
/// Invariant: `fee + net == gross` for every input.
#[inline]
pub fn split_gross(gross: u64, rate: u64) -> (u64, u64) {
    let fee = platform_fee(gross, rate).min(gross);
    (fee, gross - fee)
}
