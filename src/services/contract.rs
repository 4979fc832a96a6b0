use std::{str::FromStr, sync::Arc};

use ethers::{contract::abigen, providers::Middleware, types::Address, utils::keccak256};

use crate::{errors::CustomError, models::token::TokenSymbol};

pub const DEFAULT_DEX_ADDRESS: &str = "0x349847d1DBCa0E1F191ec29a5E1f15e3dA215d55";

abigen!(
    EthereumDex,
    r#"[
        function owner() view returns (address)
        function tokenPrices(bytes32 key) view returns (uint256)
        function tokenInstances(bytes32 key) view returns (address)
        function getTokenBalance(bytes32 key, address account) view returns (uint256)
        function swapEthToToken(bytes32 key) payable returns (uint256)
        function swapTokenToEth(bytes32 key, uint256 amount) returns (uint256)
        function swapTokenToToken(bytes32 srcKey, bytes32 destKey, uint256 amount)
        function withdrawFees()
        function updateTokenPrice(bytes32 key, uint256 price)
    ]"#
);

abigen!(
    Erc20Token,
    r#"[
        function balanceOf(address owner) view returns (uint256)
        function allowance(address owner, address spender) view returns (uint256)
        function approve(address spender, uint256 amount) returns (bool)
        function decimals() view returns (uint8)
        function symbol() view returns (string)
    ]"#
);

/// The DEX indexes tokens by `keccak256(symbol)`.
pub fn token_key(token: TokenSymbol) -> [u8; 32] {
    keccak256(token.as_str().as_bytes())
}

pub fn parse_address(address: &str) -> Result<Address, CustomError> {
    Address::from_str(address.trim())
        .map_err(|_| CustomError::InvalidAddressError(address.to_string()))
}

/// Builds contract handles bound to one client (read-only provider or signer).
#[derive(Debug)]
pub struct DexContracts<M> {
    address: Address,
    client: Arc<M>,
}

impl<M> Clone for DexContracts<M> {
    fn clone(&self) -> Self {
        Self {
            address: self.address,
            client: self.client.clone(),
        }
    }
}

impl<M: Middleware> DexContracts<M> {
    pub fn new(address: Address, client: Arc<M>) -> Self {
        Self { address, client }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn client(&self) -> Arc<M> {
        self.client.clone()
    }

    pub fn dex(&self) -> EthereumDex<M> {
        EthereumDex::new(self.address, self.client.clone())
    }

    pub fn erc20(&self, token_address: Address) -> Erc20Token<M> {
        Erc20Token::new(token_address, self.client.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_keys_are_keccak_of_symbol() {
        assert_eq!(token_key(TokenSymbol::Usdt), keccak256(b"USDT"));
        assert_ne!(token_key(TokenSymbol::Usdt), token_key(TokenSymbol::Usdc));
    }

    #[test]
    fn default_address_parses() {
        let address = parse_address(DEFAULT_DEX_ADDRESS).unwrap();
        assert_eq!(
            format!("{:?}", address),
            DEFAULT_DEX_ADDRESS.to_lowercase()
        );
        assert!(matches!(
            parse_address("not-an-address"),
            Err(CustomError::InvalidAddressError(_))
        ));
    }
}
