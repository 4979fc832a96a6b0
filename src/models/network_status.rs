use ethers::types::Address;
use serde::Serialize;

/// Chain the DEX gateway is bound to, as reported by `/network`.
#[derive(Debug, Serialize)]
pub struct NetworkStatus {
    pub chain_id: u64,
    pub name: String,
    pub symbol: String,
    pub latest_block: u64,
    pub gas_price_gwei: String,
    pub dex_address: Address,
    /// Explorer page of the DEX contract, when the chain has an explorer.
    pub dex_explorer_url: Option<String>,
}
