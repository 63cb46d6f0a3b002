use alloy_primitives::U256;
use alloy_primitives::utils::Unit;

/// 10^decimals as a 256-bit integer. Callers keep `decimals` at or below 77.
pub fn exp10(decimals: u8) -> U256 {
    if decimals == 18 { Unit::ETHER.wei() } else { U256::from(10).pow(U256::from(decimals)) }
}

/// Converts a raw integer amount into floating point units.
///
/// Whole parts beyond `u128` saturate to `f64::MAX`; fractional parts beyond `u128`
/// (more than 38 decimals) are dropped.
pub fn to_units(value: U256, decimals: u8) -> f64 {
    if decimals == 0 {
        return u128::try_from(value).map(|v| v as f64).unwrap_or(f64::MAX);
    }

    let (whole, frac) = value.div_rem(exp10(decimals));
    let whole = u128::try_from(whole).map(|v| v as f64).unwrap_or(f64::MAX);
    let frac = u128::try_from(frac).map(|v| v as f64).unwrap_or(0.0);
    whole + frac / 10f64.powi(decimals as i32)
}
