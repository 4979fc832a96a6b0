use ethers::types::Address;
use serde::{Deserialize, Serialize};

/// Notifications pushed by the wallet provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    AccountsChanged(Vec<Address>),
    ChainChanged(u64),
}

#[derive(Debug, Default, Deserialize)]
pub struct SwitchNetworkRequest {
    pub chain_id: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CurrentNetwork {
    pub chain_id: u64,
    pub name: String,
}
