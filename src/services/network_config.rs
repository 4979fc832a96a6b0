use crate::{
    errors::CustomError,
    models::network_config::{AddChainParams, NativeCurrency, NetworkConfig},
};

pub const MAINNET_CHAIN_ID: u64 = 1;
pub const GOERLI_CHAIN_ID: u64 = 5;
pub const SEPOLIA_CHAIN_ID: u64 = 11155111;
pub const HARDHAT_CHAIN_ID: u64 = 31337;

/// Get network configuration based on chain ID
pub fn get_network_config(chain_id: u64) -> Result<NetworkConfig, CustomError> {
    match chain_id {
        MAINNET_CHAIN_ID => Ok(NetworkConfig {
            chain_id,
            name: "Ethereum Mainnet".to_string(),
            rpc_url: "https://eth.llamarpc.com".to_string(),
            symbol: "ETH".to_string(),
            block_explorer: "https://etherscan.io".to_string(),
        }),
        GOERLI_CHAIN_ID => Ok(NetworkConfig {
            chain_id,
            name: "Goerli Testnet".to_string(),
            rpc_url: "https://eth-goerli.g.alchemy.com/v2/YOUR-API-KEY".to_string(),
            symbol: "ETH".to_string(),
            block_explorer: "https://goerli.etherscan.io".to_string(),
        }),
        SEPOLIA_CHAIN_ID => Ok(NetworkConfig {
            chain_id,
            name: "Sepolia Testnet".to_string(),
            rpc_url: "https://ethereum-sepolia-rpc.publicnode.com".to_string(),
            symbol: "SEP".to_string(),
            block_explorer: "https://sepolia.etherscan.io".to_string(),
        }),
        HARDHAT_CHAIN_ID => Ok(NetworkConfig {
            chain_id,
            name: "Hardhat Local".to_string(),
            rpc_url: "http://127.0.0.1:8545".to_string(),
            symbol: "ETH".to_string(),
            block_explorer: String::new(),
        }),
        _ => Err(CustomError::UnsupportedChainError(chain_id)),
    }
}

/// Display name of a chain, including ones we have no config for.
pub fn network_name(chain_id: u64) -> String {
    get_network_config(chain_id)
        .map(|config| config.name)
        .unwrap_or_else(|_| format!("Chain ID: {}", chain_id))
}

pub fn to_hex_chain_id(chain_id: u64) -> String {
    format!("0x{:x}", chain_id)
}

/// Parameters used to register a known network with a wallet that lacks it.
pub fn add_chain_params(chain_id: u64) -> Result<AddChainParams, CustomError> {
    let config = get_network_config(chain_id)?;
    let currency_name = match chain_id {
        SEPOLIA_CHAIN_ID => "Sepolia Ether".to_string(),
        _ => "Ether".to_string(),
    };

    Ok(AddChainParams {
        chain_id: to_hex_chain_id(chain_id),
        chain_name: config.name,
        native_currency: NativeCurrency {
            name: currency_name,
            symbol: config.symbol,
            decimals: 18,
        },
        rpc_urls: vec![config.rpc_url],
        block_explorer_urls: if config.block_explorer.is_empty() {
            Vec::new()
        } else {
            vec![config.block_explorer]
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sepolia_add_chain_params() {
        let params = add_chain_params(SEPOLIA_CHAIN_ID).unwrap();
        assert_eq!(params.chain_id, "0xaa36a7");
        assert_eq!(params.native_currency.symbol, "SEP");
        assert_eq!(params.native_currency.decimals, 18);
        assert_eq!(params.block_explorer_urls, vec!["https://sepolia.etherscan.io"]);
        assert_eq!(params.chain_id_u64(), Some(SEPOLIA_CHAIN_ID));
    }

    #[test]
    fn unknown_chains_get_a_generic_name() {
        assert_eq!(network_name(SEPOLIA_CHAIN_ID), "Sepolia Testnet");
        assert_eq!(network_name(42), "Chain ID: 42");
        assert!(matches!(
            get_network_config(42),
            Err(CustomError::UnsupportedChainError(42))
        ));
    }
}
