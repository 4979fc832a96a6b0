use ethers::types::Address;
use serde::Serialize;

use super::token::TokenSymbol;

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioEntry {
    pub symbol: TokenSymbol,
    pub balance: String,
    pub usd_price: f64,
    pub usd_value: f64,
    /// Share of the total value in percent, 0 when the portfolio is empty.
    pub share: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Portfolio {
    pub address: Address,
    pub entries: Vec<PortfolioEntry>,
    pub total_usd: f64,
}
