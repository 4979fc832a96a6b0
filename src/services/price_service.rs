use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;

use crate::{
    errors::CustomError,
    models::token::TokenSymbol,
    utils::format::{format_fixed, parse_positive, to_f64, TOKEN_DECIMALS},
};

use super::blockchain_service::DexGateway;

/// Used when a token has no cached price yet.
const FALLBACK_PRICE: f64 = 1.0;

/// Token prices in ETH, as last read from the DEX.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PriceCache {
    prices: BTreeMap<TokenSymbol, f64>,
    refreshed_at: Option<DateTime<Utc>>,
}

impl PriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prices(prices: impl IntoIterator<Item = (TokenSymbol, f64)>) -> Self {
        Self {
            prices: prices.into_iter().collect(),
            refreshed_at: Some(Utc::now()),
        }
    }

    /// Reads every ERC20 price from the contract. Tokens that fail keep their
    /// previous value; the refresh itself only fails if nothing could be read.
    pub async fn refresh(&mut self, gateway: &dyn DexGateway) -> Result<(), CustomError> {
        let mut last_error = None;
        let mut fetched = 0;

        for token in TokenSymbol::ERC20 {
            match gateway.token_price(token).await {
                Ok(raw) => {
                    self.prices.insert(token, to_f64(raw, TOKEN_DECIMALS)?);
                    fetched += 1;
                }
                Err(e) => {
                    warn!("Error fetching {} price: {}", token, e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if fetched == 0 => Err(e),
            _ => {
                self.refreshed_at = Some(Utc::now());
                info!("Token prices refreshed: {:?}", self.prices);
                Ok(())
            }
        }
    }

    pub fn clear(&mut self) {
        self.prices.clear();
        self.refreshed_at = None;
    }

    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    /// ETH per token; ETH itself is 1.
    pub fn price(&self, token: TokenSymbol) -> f64 {
        if token.is_native() {
            return 1.0;
        }
        self.prices
            .get(&token)
            .copied()
            .filter(|p| *p > 0.0)
            .unwrap_or(FALLBACK_PRICE)
    }

    /// Amount of `dest` received for `input` of `src`.
    pub fn quote_output(&self, src: TokenSymbol, dest: TokenSymbol, input: &str) -> Option<String> {
        let amount = parse_positive(input)?;
        let out = match (src.is_native(), dest.is_native()) {
            _ if src == dest => return None,
            (false, false) => amount * self.price(src) / self.price(dest),
            (true, false) => amount / self.price(dest),
            (false, true) => amount * self.price(src),
            (true, true) => return None,
        };
        Some(format_fixed(out))
    }

    /// Amount of `src` needed to receive `output` of `dest`.
    pub fn quote_input(&self, src: TokenSymbol, dest: TokenSymbol, output: &str) -> Option<String> {
        let amount = parse_positive(output)?;
        let input = match (src.is_native(), dest.is_native()) {
            _ if src == dest => return None,
            (false, false) => amount * self.price(dest) / self.price(src),
            (true, false) => amount * self.price(dest),
            (false, true) => amount / self.price(src),
            (true, true) => return None,
        };
        Some(format_fixed(input))
    }

    /// How much `dest` one unit of `src` buys.
    pub fn exchange_rate(&self, src: TokenSymbol, dest: TokenSymbol) -> Option<String> {
        self.quote_output(src, dest, "1")
    }

    pub fn snapshot(&self) -> BTreeMap<TokenSymbol, f64> {
        TokenSymbol::ERC20
            .iter()
            .map(|token| (*token, self.price(*token)))
            .collect()
    }
}
