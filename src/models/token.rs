use std::{fmt, str::FromStr};

use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};

use crate::errors::CustomError;

/// Shown instead of a balance while no wallet is connected.
pub const BALANCE_PLACEHOLDER: &str = "-";

/// Label of a swap side with no token chosen yet.
pub const UNSELECTED_TOKEN: &str = "Select Token";

/// The fixed set of assets the DEX trades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TokenSymbol {
    Eth,
    Usdt,
    Usdc,
}

impl TokenSymbol {
    pub const ALL: [TokenSymbol; 3] = [TokenSymbol::Eth, TokenSymbol::Usdt, TokenSymbol::Usdc];

    /// ERC20 tokens registered on the DEX contract.
    pub const ERC20: [TokenSymbol; 2] = [TokenSymbol::Usdt, TokenSymbol::Usdc];

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenSymbol::Eth => "ETH",
            TokenSymbol::Usdt => "USDT",
            TokenSymbol::Usdc => "USDC",
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, TokenSymbol::Eth)
    }
}

impl fmt::Display for TokenSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenSymbol {
    type Err = CustomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ETH" => Ok(TokenSymbol::Eth),
            "USDT" => Ok(TokenSymbol::Usdt),
            "USDC" => Ok(TokenSymbol::Usdc),
            _ => Err(CustomError::TokenNotFoundError(s.to_string())),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenBalance {
    pub token_address: Option<String>, // None for native token
    pub symbol: TokenSymbol,
    pub balance: U256,
    pub decimals: u8,
    pub formatted_balance: String,
}

#[derive(Debug, Serialize)]
pub struct TokenInfo {
    pub symbol: TokenSymbol,
    pub key: H256,
    pub address: Option<Address>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_symbols_case_insensitively() {
        assert_eq!("eth".parse::<TokenSymbol>().unwrap(), TokenSymbol::Eth);
        assert_eq!(" USDC ".parse::<TokenSymbol>().unwrap(), TokenSymbol::Usdc);
        assert!(UNSELECTED_TOKEN.parse::<TokenSymbol>().is_err());
    }

    #[test]
    fn serializes_as_symbol() {
        let json = serde_json::to_string(&TokenSymbol::Usdt).unwrap();
        assert_eq!(json, "\"USDT\"");
    }
}
