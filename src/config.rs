use std::env;

use ethers::types::Address;

use crate::{
    errors::CustomError,
    services::{
        contract::{parse_address, DEFAULT_DEX_ADDRESS},
        network_config::{get_network_config, SEPOLIA_CHAIN_ID},
        portfolio_service::DEFAULT_ETH_USD_PRICE,
    },
};

const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub rpc_url: String,
    pub chain_id: u64,
    pub dex_address: Address,
    pub private_key: Option<String>,
    pub allowed_origins: Vec<String>,
    pub eth_usd_price: f64,
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_var<T: std::str::FromStr>(name: &str, default: &str) -> Result<T, CustomError> {
    let raw = var_or(name, default);
    raw.trim()
        .parse()
        .map_err(|_| CustomError::ValidationError(format!("invalid {}: {}", name, raw)))
}

impl Config {
    pub fn from_env() -> Result<Self, CustomError> {
        let chain_id: u64 = parse_var("CHAIN_ID", &SEPOLIA_CHAIN_ID.to_string())?;
        let default_rpc = get_network_config(chain_id)?.rpc_url;

        let eth_usd_price: f64 = parse_var("ETH_USD_PRICE", &DEFAULT_ETH_USD_PRICE.to_string())?;
        if !eth_usd_price.is_finite() || eth_usd_price <= 0.0 {
            return Err(CustomError::ValidationError(format!(
                "invalid ETH_USD_PRICE: {}",
                eth_usd_price
            )));
        }

        Ok(Self {
            host: var_or("HOST", "127.0.0.1"),
            port: parse_var("PORT", "8080")?,
            rpc_url: var_or("RPC_URL", &default_rpc),
            chain_id,
            dex_address: parse_address(&var_or("DEX_CONTRACT_ADDRESS", DEFAULT_DEX_ADDRESS))?,
            private_key: env::var("PRIVATE_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            allowed_origins: var_or("ALLOWED_ORIGINS", DEFAULT_ALLOWED_ORIGINS)
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect(),
            eth_usd_price,
        })
    }
}
