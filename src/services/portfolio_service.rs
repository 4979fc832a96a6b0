use ethers::types::{Address, U256};
use log::warn;

use crate::{
    errors::CustomError,
    models::{
        portfolio::{Portfolio, PortfolioEntry},
        token::TokenSymbol,
    },
    utils::format::{to_eth, to_f64, TOKEN_DECIMALS},
};

use super::blockchain_service::DexGateway;

pub const DEFAULT_ETH_USD_PRICE: f64 = 2460.0;
const STABLECOIN_USD_PRICE: f64 = 1.0;

/// Values a wallet's holdings in USD at fixed reference prices.
pub struct PortfolioService<'a> {
    gateway: &'a dyn DexGateway,
    eth_usd_price: f64,
}

impl<'a> PortfolioService<'a> {
    pub fn new(gateway: &'a dyn DexGateway, eth_usd_price: f64) -> Self {
        Self {
            gateway,
            eth_usd_price,
        }
    }

    pub fn usd_price(&self, token: TokenSymbol) -> f64 {
        match token {
            TokenSymbol::Eth => self.eth_usd_price,
            TokenSymbol::Usdt | TokenSymbol::Usdc => STABLECOIN_USD_PRICE,
        }
    }

    async fn balance(&self, token: TokenSymbol, address: Address) -> Result<U256, CustomError> {
        match self.gateway.token_balance(token, address).await {
            Ok(balance) => Ok(balance),
            Err(e) if token.is_native() => Err(e),
            Err(e) => {
                warn!("Error fetching {} balance for {:?}: {}", token, address, e);
                Ok(U256::zero())
            }
        }
    }

    pub async fn portfolio(&self, address: Address) -> Result<Portfolio, CustomError> {
        let mut entries = Vec::with_capacity(TokenSymbol::ALL.len());
        for token in TokenSymbol::ALL {
            let raw = self.balance(token, address).await?;
            let usd_price = self.usd_price(token);
            entries.push(PortfolioEntry {
                symbol: token,
                balance: to_eth(raw, TOKEN_DECIMALS)?,
                usd_price,
                usd_value: to_f64(raw, TOKEN_DECIMALS)? * usd_price,
                share: 0.0,
            });
        }

        let total_usd: f64 = entries.iter().map(|entry| entry.usd_value).sum();
        if total_usd > 0.0 {
            for entry in &mut entries {
                entry.share = entry.usd_value / total_usd * 100.0;
            }
        }

        Ok(Portfolio {
            address,
            entries,
            total_usd,
        })
    }
}

/// Wei-denominated price the DEX stores for a token worth `usd` dollars.
pub fn usd_to_wei(usd: f64, eth_usd: f64) -> Result<U256, CustomError> {
    if !usd.is_finite() || usd <= 0.0 {
        return Err(CustomError::InvalidAmountError(usd.to_string()));
    }
    if !eth_usd.is_finite() || eth_usd <= 0.0 {
        return Err(CustomError::ValidationError(format!(
            "invalid ETH price {}",
            eth_usd
        )));
    }
    let wei = (usd / eth_usd * 1e18).floor();
    if wei < 1.0 || wei >= u128::MAX as f64 {
        return Err(CustomError::InvalidAmountError(usd.to_string()));
    }
    Ok(U256::from(wei as u128))
}
