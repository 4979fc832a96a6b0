use ethers::types::U256;
use ethers::utils::{format_units, parse_units};

use crate::errors::CustomError;

/// Decimals used by ETH and by both DEX tokens.
pub const TOKEN_DECIMALS: u32 = 18;

/// Precision of quotes and rates.
pub const DISPLAY_DECIMALS: usize = 6;

/// Parses a user-entered decimal amount into base units.
pub fn to_wei(amount: &str, decimals: u32) -> Result<U256, CustomError> {
    let amount = amount.trim();
    if amount.is_empty() || amount.starts_with('-') {
        return Err(CustomError::InvalidAmountError(amount.to_string()));
    }
    parse_units(amount, decimals)
        .map(U256::from)
        .map_err(|_| CustomError::InvalidAmountError(amount.to_string()))
}

/// Formats base units as a decimal string without trailing zeros.
pub fn to_eth(amount: U256, decimals: u32) -> Result<String, CustomError> {
    let formatted = format_units(amount, decimals)
        .map_err(|e| CustomError::InvalidAmountError(e.to_string()))?;
    Ok(trim_decimal(&formatted))
}

/// Lossy conversion used for price ratios only.
pub fn to_f64(amount: U256, decimals: u32) -> Result<f64, CustomError> {
    to_eth(amount, decimals)?
        .parse::<f64>()
        .map_err(|e| CustomError::InvalidAmountError(e.to_string()))
}

fn trim_decimal(value: &str) -> String {
    if !value.contains('.') {
        return value.to_string();
    }
    let trimmed = value.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Parses a form field; `None` for empty, non-numeric or non-positive input.
pub fn parse_positive(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
}

pub fn format_fixed(value: f64) -> String {
    format!("{:.prec$}", value.max(0.0), prec = DISPLAY_DECIMALS)
}

/// `0x1234...abcd`
pub fn format_address(address: &str) -> String {
    if address.len() <= 10 {
        return address.to_string();
    }
    format!("{}...{}", &address[..6], &address[address.len() - 4..])
}

/// Amount corresponding to `percent` of `balance`, e.g. the 25/50/75/MAX
/// shortcuts next to the input field.
pub fn amount_for_percentage(balance: &str, percent: u8) -> Result<String, CustomError> {
    if percent > 100 {
        return Err(CustomError::ValidationError(format!(
            "percentage must be between 0 and 100, got {}",
            percent
        )));
    }
    let wei = to_wei(balance, TOKEN_DECIMALS)?;
    let share = wei * U256::from(percent) / U256::from(100u8);
    to_eth(share, TOKEN_DECIMALS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_between_decimal_and_wei() {
        let wei = to_wei("1.5", 18).unwrap();
        assert_eq!(wei, U256::from(1_500_000_000_000_000_000u128));
        assert_eq!(to_eth(wei, 18).unwrap(), "1.5");
        assert_eq!(to_eth(U256::zero(), 18).unwrap(), "0");
    }

    #[test]
    fn rejects_bad_amounts() {
        assert!(to_wei("", 18).is_err());
        assert!(to_wei("-1", 18).is_err());
        assert!(to_wei("abc", 18).is_err());
    }

    #[test]
    fn parse_positive_filters_non_positive() {
        assert_eq!(parse_positive("2.5"), Some(2.5));
        assert_eq!(parse_positive("0"), None);
        assert_eq!(parse_positive("-3"), None);
        assert_eq!(parse_positive(""), None);
        assert_eq!(parse_positive("1e400"), None);
    }

    #[test]
    fn shortens_addresses() {
        assert_eq!(
            format_address("0x349847d1DBCa0E1F191ec29a5E1f15e3dA215d55"),
            "0x3498...5d55"
        );
        assert_eq!(format_address("0x12"), "0x12");
    }

    #[test]
    fn percentage_of_balance() {
        assert_eq!(amount_for_percentage("2", 50).unwrap(), "1");
        assert_eq!(amount_for_percentage("1", 25).unwrap(), "0.25");
        assert_eq!(amount_for_percentage("0.3", 100).unwrap(), "0.3");
        assert_eq!(amount_for_percentage("5", 0).unwrap(), "0");
        assert!(amount_for_percentage("1", 101).is_err());
    }

    #[test]
    fn fixed_formatting_never_goes_negative() {
        assert_eq!(format_fixed(1.0 / 3.0), "0.333333");
        assert_eq!(format_fixed(-2.0), "0.000000");
    }
}
