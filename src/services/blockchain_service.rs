use async_trait::async_trait;
use ethers::{
    abi::Detokenize,
    contract::ContractCall,
    middleware::SignerMiddleware,
    providers::{Http, Middleware, Provider},
    signers::{LocalWallet, Signer},
    types::{Address, U256, U64},
};
use log::{debug, info};
use std::sync::Arc;

use crate::{
    errors::CustomError,
    models::{
        network_config::NetworkConfig, network_status::NetworkStatus, swap::SwapReceipt,
        token::TokenSymbol,
    },
    utils::format::to_eth,
};

use super::{
    contract::{token_key, DexContracts},
    network_config::get_network_config,
};

const GWEI_DECIMALS: u32 = 9;

/// Everything the application asks of the DEX contract and the chain.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DexGateway: Send + Sync {
    /// `tokenPrices(key)`: wei of ETH per whole token.
    async fn token_price(&self, token: TokenSymbol) -> Result<U256, CustomError>;

    /// `tokenInstances(key)`: address of the ERC20 behind a symbol.
    async fn token_address(&self, token: TokenSymbol) -> Result<Address, CustomError>;

    /// `getTokenBalance(key, owner)`, or the native balance for ETH.
    async fn token_balance(&self, token: TokenSymbol, owner: Address) -> Result<U256, CustomError>;

    async fn eth_balance(&self, owner: Address) -> Result<U256, CustomError>;

    async fn owner(&self) -> Result<Address, CustomError>;

    /// ERC20 allowance granted by `owner` to the DEX.
    async fn allowance(&self, token: TokenSymbol, owner: Address) -> Result<U256, CustomError>;

    async fn network_status(&self) -> Result<NetworkStatus, CustomError>;

    async fn approve(&self, token: TokenSymbol, amount: U256) -> Result<SwapReceipt, CustomError>;

    async fn swap_eth_to_token(
        &self,
        token: TokenSymbol,
        value: U256,
    ) -> Result<SwapReceipt, CustomError>;

    async fn swap_token_to_eth(
        &self,
        token: TokenSymbol,
        amount: U256,
    ) -> Result<SwapReceipt, CustomError>;

    async fn swap_token_to_token(
        &self,
        src: TokenSymbol,
        dest: TokenSymbol,
        amount: U256,
    ) -> Result<SwapReceipt, CustomError>;

    async fn withdraw_fees(&self) -> Result<SwapReceipt, CustomError>;

    async fn update_token_price(
        &self,
        token: TokenSymbol,
        price: U256,
    ) -> Result<SwapReceipt, CustomError>;
}

/// `DexGateway` backed by a JSON-RPC client, optionally wrapped in a signer.
#[derive(Debug)]
pub struct DexClient<M> {
    contracts: DexContracts<M>,
    config: NetworkConfig,
    can_sign: bool,
}

pub type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

fn contract_err<E: std::fmt::Display>(e: E) -> CustomError {
    CustomError::from_rpc_message(e.to_string())
}

fn erc20_key(token: TokenSymbol) -> Result<[u8; 32], CustomError> {
    if token.is_native() {
        return Err(CustomError::TokenNotFoundError(format!(
            "{} is not an ERC20 token",
            token
        )));
    }
    Ok(token_key(token))
}

/// Connects to the configured RPC endpoint and checks it serves `chain_id`.
pub async fn connect_provider(rpc_url: &str, chain_id: u64) -> Result<Provider<Http>, CustomError> {
    let provider = Provider::<Http>::try_from(rpc_url)
        .map_err(|e| CustomError::NetworkError(e.to_string()))?;

    let connected_chain_id = provider
        .get_chainid()
        .await
        .map_err(|e| CustomError::StringifiedProviderError(e.to_string()))?;

    if connected_chain_id.as_u64() != chain_id {
        return Err(CustomError::NetworkError(format!(
            "RPC endpoint serves chain {} but {} was requested",
            connected_chain_id, chain_id
        )));
    }

    Ok(provider)
}

/// Builds the gateway: signing when a wallet key is configured, read-only otherwise.
pub fn build_gateway(
    provider: Provider<Http>,
    dex_address: Address,
    chain_id: u64,
    wallet: Option<LocalWallet>,
) -> Result<Arc<dyn DexGateway>, CustomError> {
    let config = get_network_config(chain_id)?;

    Ok(match wallet {
        Some(wallet) => {
            info!("DEX gateway signing as {:?}", wallet.address());
            let signer: SignerClient =
                SignerMiddleware::new(provider, wallet.with_chain_id(chain_id));
            let contracts = DexContracts::new(dex_address, Arc::new(signer));
            Arc::new(DexClient::new(contracts, config, true))
        }
        None => {
            info!("DEX gateway is read-only, no wallet key configured");
            let contracts = DexContracts::new(dex_address, Arc::new(provider));
            Arc::new(DexClient::new(contracts, config, false))
        }
    })
}

impl<M: Middleware + 'static> DexClient<M> {
    pub fn new(contracts: DexContracts<M>, config: NetworkConfig, can_sign: bool) -> Self {
        Self {
            contracts,
            config,
            can_sign,
        }
    }

    fn ensure_signer(&self) -> Result<(), CustomError> {
        if self.can_sign {
            Ok(())
        } else {
            Err(CustomError::WalletNotInstalledError)
        }
    }

    /// Sends a transaction and waits until it is mined.
    async fn submit<D: Detokenize>(
        &self,
        label: &str,
        call: ContractCall<M, D>,
    ) -> Result<SwapReceipt, CustomError> {
        self.ensure_signer()?;

        let pending = call.send().await.map_err(contract_err)?;
        info!("{} submitted: {:?}", label, *pending);

        let receipt = pending
            .await?
            .ok_or(CustomError::TransactionReceiptFailedError)?;

        if receipt.status != Some(U64::from(1)) {
            return Err(CustomError::TransactionFailedError);
        }

        debug!(
            "{} mined in block {:?}, gas used {:?}",
            label, receipt.block_number, receipt.gas_used
        );
        Ok(SwapReceipt::from(&receipt))
    }
}

#[async_trait]
impl<M: Middleware + 'static> DexGateway for DexClient<M> {
    async fn token_price(&self, token: TokenSymbol) -> Result<U256, CustomError> {
        let key = erc20_key(token)?;
        self.contracts
            .dex()
            .token_prices(key)
            .call()
            .await
            .map_err(contract_err)
    }

    async fn token_address(&self, token: TokenSymbol) -> Result<Address, CustomError> {
        let key = erc20_key(token)?;
        let address = self
            .contracts
            .dex()
            .token_instances(key)
            .call()
            .await
            .map_err(contract_err)?;

        if address.is_zero() {
            return Err(CustomError::TokenNotFoundError(token.to_string()));
        }
        Ok(address)
    }

    async fn token_balance(&self, token: TokenSymbol, owner: Address) -> Result<U256, CustomError> {
        if token.is_native() {
            return self.eth_balance(owner).await;
        }
        self.contracts
            .dex()
            .get_token_balance(token_key(token), owner)
            .call()
            .await
            .map_err(contract_err)
    }

    async fn eth_balance(&self, owner: Address) -> Result<U256, CustomError> {
        self.contracts
            .client()
            .get_balance(owner, None)
            .await
            .map_err(|e| CustomError::StringifiedProviderError(e.to_string()))
    }

    async fn owner(&self) -> Result<Address, CustomError> {
        self.contracts
            .dex()
            .owner()
            .call()
            .await
            .map_err(contract_err)
    }

    async fn allowance(&self, token: TokenSymbol, owner: Address) -> Result<U256, CustomError> {
        let token_address = self.token_address(token).await?;
        self.contracts
            .erc20(token_address)
            .allowance(owner, self.contracts.address())
            .call()
            .await
            .map_err(contract_err)
    }

    async fn network_status(&self) -> Result<NetworkStatus, CustomError> {
        let client = self.contracts.client();
        let latest_block = client
            .get_block_number()
            .await
            .map_err(|e| CustomError::StringifiedProviderError(e.to_string()))?;
        let gas_price = client
            .get_gas_price()
            .await
            .map_err(|e| CustomError::StringifiedProviderError(e.to_string()))?;

        let dex_address = self.contracts.address();
        let dex_explorer_url = (!self.config.block_explorer.is_empty())
            .then(|| format!("{}/address/{:?}", self.config.block_explorer, dex_address));

        Ok(NetworkStatus {
            chain_id: self.config.chain_id,
            name: self.config.name.clone(),
            symbol: self.config.symbol.clone(),
            latest_block: latest_block.as_u64(),
            gas_price_gwei: to_eth(gas_price, GWEI_DECIMALS)?,
            dex_address,
            dex_explorer_url,
        })
    }

    async fn approve(&self, token: TokenSymbol, amount: U256) -> Result<SwapReceipt, CustomError> {
        self.ensure_signer()?;
        let token_address = self.token_address(token).await?;
        let erc20 = self.contracts.erc20(token_address);
        let call = erc20.approve(self.contracts.address(), amount);
        self.submit(&format!("approve {}", token), call).await
    }

    async fn swap_eth_to_token(
        &self,
        token: TokenSymbol,
        value: U256,
    ) -> Result<SwapReceipt, CustomError> {
        let key = erc20_key(token)?;
        let call = self.contracts.dex().swap_eth_to_token(key).value(value);
        self.submit(&format!("swap ETH -> {}", token), call).await
    }

    async fn swap_token_to_eth(
        &self,
        token: TokenSymbol,
        amount: U256,
    ) -> Result<SwapReceipt, CustomError> {
        let key = erc20_key(token)?;
        let call = self.contracts.dex().swap_token_to_eth(key, amount);
        self.submit(&format!("swap {} -> ETH", token), call).await
    }

    async fn swap_token_to_token(
        &self,
        src: TokenSymbol,
        dest: TokenSymbol,
        amount: U256,
    ) -> Result<SwapReceipt, CustomError> {
        let src_key = erc20_key(src)?;
        let dest_key = erc20_key(dest)?;
        let call = self
            .contracts
            .dex()
            .swap_token_to_token(src_key, dest_key, amount);
        self.submit(&format!("swap {} -> {}", src, dest), call).await
    }

    async fn withdraw_fees(&self) -> Result<SwapReceipt, CustomError> {
        let call = self.contracts.dex().withdraw_fees();
        self.submit("withdraw fees", call).await
    }

    async fn update_token_price(
        &self,
        token: TokenSymbol,
        price: U256,
    ) -> Result<SwapReceipt, CustomError> {
        let key = erc20_key(token)?;
        let call = self.contracts.dex().update_token_price(key, price);
        self.submit(&format!("update {} price", token), call).await
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use ethers::types::H256;
    use tokio::sync::Semaphore;

    /// Price reads and ETH swaps wait on the gate, so a test can keep them in
    /// flight. Without a gate they never finish.
    pub struct GatedGateway {
        gate: Option<Arc<Semaphore>>,
    }

    impl GatedGateway {
        pub fn new(gate: Arc<Semaphore>) -> Self {
            Self { gate: Some(gate) }
        }

        pub fn hanging() -> Self {
            Self { gate: None }
        }

        async fn wait(&self) {
            match &self.gate {
                Some(gate) => drop(gate.acquire().await),
                None => std::future::pending::<()>().await,
            }
        }
    }

    #[async_trait]
    impl DexGateway for GatedGateway {
        async fn token_price(&self, _token: TokenSymbol) -> Result<U256, CustomError> {
            self.wait().await;
            Ok(U256::exp10(15))
        }

        async fn token_address(&self, _token: TokenSymbol) -> Result<Address, CustomError> {
            Err(CustomError::NotFoundError)
        }

        async fn token_balance(&self, _: TokenSymbol, _: Address) -> Result<U256, CustomError> {
            Ok(U256::exp10(18))
        }

        async fn eth_balance(&self, _owner: Address) -> Result<U256, CustomError> {
            Ok(U256::exp10(18))
        }

        async fn owner(&self) -> Result<Address, CustomError> {
            Err(CustomError::NotFoundError)
        }

        async fn allowance(&self, _: TokenSymbol, _: Address) -> Result<U256, CustomError> {
            Ok(U256::zero())
        }

        async fn network_status(&self) -> Result<NetworkStatus, CustomError> {
            Err(CustomError::NotFoundError)
        }

        async fn approve(&self, _: TokenSymbol, _: U256) -> Result<SwapReceipt, CustomError> {
            Err(CustomError::NotFoundError)
        }

        async fn swap_eth_to_token(
            &self,
            _token: TokenSymbol,
            _value: U256,
        ) -> Result<SwapReceipt, CustomError> {
            self.wait().await;
            Ok(SwapReceipt {
                transaction_hash: H256::repeat_byte(0x22),
                block_number: None,
                gas_used: None,
            })
        }

        async fn swap_token_to_eth(
            &self,
            _: TokenSymbol,
            _: U256,
        ) -> Result<SwapReceipt, CustomError> {
            Err(CustomError::NotFoundError)
        }

        async fn swap_token_to_token(
            &self,
            _: TokenSymbol,
            _: TokenSymbol,
            _: U256,
        ) -> Result<SwapReceipt, CustomError> {
            Err(CustomError::NotFoundError)
        }

        async fn withdraw_fees(&self) -> Result<SwapReceipt, CustomError> {
            Err(CustomError::NotFoundError)
        }

        async fn update_token_price(
            &self,
            _: TokenSymbol,
            _: U256,
        ) -> Result<SwapReceipt, CustomError> {
            Err(CustomError::NotFoundError)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::network_config::SEPOLIA_CHAIN_ID;
    use ethers::{
        abi::{encode, Token},
        providers::MockProvider,
        types::Bytes,
    };

    fn mocked_client(can_sign: bool) -> (DexClient<Provider<MockProvider>>, MockProvider) {
        let (provider, mock) = Provider::mocked();
        let contracts = DexContracts::new(Address::repeat_byte(0x11), Arc::new(provider));
        let config = get_network_config(SEPOLIA_CHAIN_ID).unwrap();
        (DexClient::new(contracts, config, can_sign), mock)
    }

    #[tokio::test]
    async fn reads_owner_from_contract() {
        let (client, mock) = mocked_client(false);
        let owner = Address::repeat_byte(0x42);
        mock.push::<Bytes, _>(Bytes::from(encode(&[Token::Address(owner)])))
            .unwrap();

        assert_eq!(client.owner().await.unwrap(), owner);
    }

    #[tokio::test]
    async fn reads_token_price() {
        let (client, mock) = mocked_client(false);
        let price = U256::exp10(15);
        mock.push::<Bytes, _>(Bytes::from(encode(&[Token::Uint(price)])))
            .unwrap();

        assert_eq!(client.token_price(TokenSymbol::Usdt).await.unwrap(), price);
    }

    #[tokio::test]
    async fn eth_has_no_contract_price() {
        let (client, _mock) = mocked_client(false);
        assert!(matches!(
            client.token_price(TokenSymbol::Eth).await,
            Err(CustomError::TokenNotFoundError(_))
        ));
    }

    #[tokio::test]
    async fn writes_require_a_signing_wallet() {
        let (client, _mock) = mocked_client(false);
        let result = client
            .swap_eth_to_token(TokenSymbol::Usdc, U256::exp10(16))
            .await;
        assert!(matches!(result, Err(CustomError::WalletNotInstalledError)));
    }
}
