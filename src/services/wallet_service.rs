use std::{
    collections::{BTreeMap, BTreeSet},
    str::FromStr,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, RwLock,
    },
};

use async_trait::async_trait;
use ethers::{
    signers::{LocalWallet, Signer},
    types::Address,
};
use log::{debug, error, info, warn};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::broadcast;

use crate::{
    errors::{CustomError, UNRECOGNIZED_CHAIN_CODE},
    models::{
        network_config::AddChainParams,
        token::{TokenSymbol, BALANCE_PLACEHOLDER},
        wallet::{CurrentNetwork, WalletEvent},
    },
    utils::format::{format_address, to_eth, TOKEN_DECIMALS},
};

use super::{
    blockchain_service::DexGateway,
    network_config::{
        add_chain_params, network_name, to_hex_chain_id, MAINNET_CHAIN_ID, SEPOLIA_CHAIN_ID,
    },
};

const UNSUPPORTED_METHOD_CODE: i64 = 4200;
const EVENT_CAPACITY: usize = 16;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WalletProvider: Send + Sync {
    fn is_installed(&self) -> bool;

    /// One wallet RPC call (`eth_requestAccounts`, `wallet_switchEthereumChain`, ...).
    async fn request(&self, method: &str, params: Value) -> Result<Value, CustomError>;

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent>;
}

/// Wallet provider holding a local signing key.
pub struct LocalKeyWallet {
    signer: Option<LocalWallet>,
    authorized: AtomicBool,
    chain_id: AtomicU64,
    known_chains: RwLock<BTreeSet<u64>>,
    events: broadcast::Sender<WalletEvent>,
}

fn parse_param<T: serde::de::DeserializeOwned>(params: &Value) -> Result<T, CustomError> {
    let first = params
        .get(0)
        .cloned()
        .ok_or_else(|| CustomError::ValidationError("missing request parameter".into()))?;
    serde_json::from_value(first).map_err(|e| CustomError::ValidationError(e.to_string()))
}

fn parse_hex_chain_id(value: &str) -> Result<u64, CustomError> {
    u64::from_str_radix(value.trim_start_matches("0x"), 16)
        .map_err(|_| CustomError::ValidationError(format!("invalid chain id {}", value)))
}

impl LocalKeyWallet {
    pub fn new(signer: Option<LocalWallet>, chain_id: u64) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            signer,
            authorized: AtomicBool::new(false),
            chain_id: AtomicU64::new(chain_id),
            known_chains: RwLock::new([MAINNET_CHAIN_ID, chain_id].into_iter().collect()),
            events,
        }
    }

    /// A missing key yields a wallet that reports itself as not installed.
    pub fn from_private_key(private_key: Option<&str>, chain_id: u64) -> Result<Self, CustomError> {
        let signer = private_key
            .map(|key| {
                LocalWallet::from_str(key.trim().trim_start_matches("0x"))
                    .map(|wallet| wallet.with_chain_id(chain_id))
                    .map_err(|e| CustomError::ValidationError(format!("invalid PRIVATE_KEY: {}", e)))
            })
            .transpose()?;
        Ok(Self::new(signer, chain_id))
    }

    pub fn signer(&self) -> Option<LocalWallet> {
        self.signer.clone()
    }

    fn authorized_accounts(&self) -> Vec<Address> {
        match &self.signer {
            Some(signer) if self.authorized.load(Ordering::SeqCst) => vec![signer.address()],
            _ => Vec::new(),
        }
    }

    fn emit(&self, event: WalletEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    fn is_known_chain(&self, chain_id: u64) -> bool {
        self.known_chains
            .read()
            .map(|chains| chains.contains(&chain_id))
            .unwrap_or(false)
    }
}

#[async_trait]
impl WalletProvider for LocalKeyWallet {
    fn is_installed(&self) -> bool {
        self.signer.is_some()
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, CustomError> {
        debug!("wallet request {} {}", method, params);
        match method {
            "eth_requestAccounts" => {
                if self.signer.is_none() {
                    return Err(CustomError::WalletNotInstalledError);
                }
                if !self.authorized.swap(true, Ordering::SeqCst) {
                    self.emit(WalletEvent::AccountsChanged(self.authorized_accounts()));
                }
                Ok(json!(self.authorized_accounts()))
            }
            "eth_accounts" => Ok(json!(self.authorized_accounts())),
            "eth_chainId" => Ok(json!(to_hex_chain_id(self.chain_id.load(Ordering::SeqCst)))),
            "wallet_switchEthereumChain" => {
                #[derive(serde::Deserialize)]
                #[serde(rename_all = "camelCase")]
                struct SwitchParams {
                    chain_id: String,
                }
                let target = parse_hex_chain_id(&parse_param::<SwitchParams>(&params)?.chain_id)?;
                if !self.is_known_chain(target) {
                    return Err(CustomError::WalletRpcError {
                        code: UNRECOGNIZED_CHAIN_CODE,
                        message: format!("Unrecognized chain ID {}", to_hex_chain_id(target)),
                    });
                }
                if self.chain_id.swap(target, Ordering::SeqCst) != target {
                    self.emit(WalletEvent::ChainChanged(target));
                }
                Ok(Value::Null)
            }
            "wallet_addEthereumChain" => {
                let chain: AddChainParams = parse_param(&params)?;
                let chain_id = chain.chain_id_u64().ok_or_else(|| {
                    CustomError::ValidationError(format!("invalid chain id {}", chain.chain_id))
                })?;
                if let Ok(mut chains) = self.known_chains.write() {
                    chains.insert(chain_id);
                }
                info!("Wallet learned chain {} ({})", chain.chain_name, chain_id);
                Ok(Value::Null)
            }
            "wallet_revokePermissions" => {
                if self.authorized.swap(false, Ordering::SeqCst) {
                    self.emit(WalletEvent::AccountsChanged(Vec::new()));
                }
                Ok(Value::Null)
            }
            _ => Err(CustomError::WalletRpcError {
                code: UNSUPPORTED_METHOD_CODE,
                message: format!("Unsupported method {}", method),
            }),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WalletSnapshot {
    pub installed: bool,
    pub account: Option<Address>,
    pub display_account: Option<String>,
    pub network: Option<CurrentNetwork>,
    pub on_expected_network: bool,
    pub is_connecting: bool,
    pub error: Option<String>,
    pub balances: BTreeMap<TokenSymbol, String>,
}

/// Connected account, chain and balance displays shared by the whole API.
pub struct WalletContext {
    provider: Arc<dyn WalletProvider>,
    expected_chain_id: u64,
    account: Option<Address>,
    chain_id: Option<u64>,
    is_connecting: bool,
    error: Option<String>,
    balances: BTreeMap<TokenSymbol, String>,
}

fn placeholder_balances() -> BTreeMap<TokenSymbol, String> {
    TokenSymbol::ALL
        .into_iter()
        .map(|token| (token, BALANCE_PLACEHOLDER.to_string()))
        .collect()
}

fn parse_accounts(value: Value) -> Result<Vec<Address>, CustomError> {
    serde_json::from_value(value).map_err(|e| CustomError::StringifiedProviderError(e.to_string()))
}

impl WalletContext {
    pub fn new(provider: Arc<dyn WalletProvider>, expected_chain_id: u64) -> Self {
        Self {
            provider,
            expected_chain_id,
            account: None,
            chain_id: None,
            is_connecting: false,
            error: None,
            balances: placeholder_balances(),
        }
    }

    pub fn account(&self) -> Option<Address> {
        self.account
    }

    pub fn chain_id(&self) -> Option<u64> {
        self.chain_id
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn balances(&self) -> &BTreeMap<TokenSymbol, String> {
        &self.balances
    }

    pub fn is_installed(&self) -> bool {
        self.provider.is_installed()
    }

    pub fn current_network(&self) -> Option<CurrentNetwork> {
        self.chain_id.map(|chain_id| CurrentNetwork {
            chain_id,
            name: network_name(chain_id),
        })
    }

    async fn read_chain_id(&mut self) {
        match self.provider.request("eth_chainId", json!([])).await {
            Ok(Value::String(hex)) => self.chain_id = parse_hex_chain_id(&hex).ok(),
            Ok(other) => warn!("Unexpected eth_chainId response: {}", other),
            Err(e) => error!("Error getting network: {}", e),
        }
    }

    /// Silently restores a session the wallet already authorised and loads
    /// its balances.
    pub async fn check_connection(&mut self, gateway: &dyn DexGateway) {
        if !self.is_installed() {
            return;
        }
        match self
            .provider
            .request("eth_accounts", json!([]))
            .await
            .and_then(parse_accounts)
        {
            Ok(accounts) => {
                if let Some(account) = accounts.first() {
                    info!("Wallet already connected as {:?}", account);
                    self.account = Some(*account);
                    self.read_chain_id().await;
                    self.refresh_balances(gateway).await;
                }
            }
            Err(e) => error!("Error checking connection: {}", e),
        }
    }

    pub async fn connect_wallet(&mut self) -> Result<Option<Address>, CustomError> {
        if !self.is_installed() {
            self.error =
                Some("Wallet is not installed. Please configure a wallet to use this app.".into());
            return Err(CustomError::WalletNotInstalledError);
        }

        self.is_connecting = true;
        self.error = None;

        let result = self
            .provider
            .request("eth_requestAccounts", json!([]))
            .await
            .and_then(parse_accounts);

        let outcome = match result {
            Ok(accounts) => {
                if let Some(account) = accounts.first() {
                    info!("Wallet connected as {:?}", account);
                    self.account = Some(*account);
                    self.read_chain_id().await;
                }
                Ok(self.account)
            }
            Err(e) => {
                error!("Error connecting wallet: {}", e);
                self.error = Some("Failed to connect wallet. Please try again.".into());
                Err(e)
            }
        };

        self.is_connecting = false;
        outcome
    }

    /// Revokes the wallet's authorisation so the account is not restored on
    /// the next connection check, then resets the context.
    pub async fn disconnect_wallet(&mut self) {
        if let Err(e) = self
            .provider
            .request("wallet_revokePermissions", json!([{ "eth_accounts": {} }]))
            .await
        {
            warn!("Error revoking wallet permissions: {}", e);
        }
        self.reset_connection();
    }

    /// Forgets the account and puts every balance display back to the placeholder.
    fn reset_connection(&mut self) {
        if let Some(account) = self.account.take() {
            info!("Wallet {:?} disconnected", account);
        }
        self.error = None;
        self.balances = placeholder_balances();
    }

    pub async fn switch_to_sepolia(&mut self) -> Result<(), CustomError> {
        self.switch_network(SEPOLIA_CHAIN_ID).await
    }

    /// Switches the wallet's chain, registering it first if the wallet does
    /// not know it.
    pub async fn switch_network(&mut self, chain_id: u64) -> Result<(), CustomError> {
        if !self.is_installed() {
            self.error = Some("Wallet is not installed".into());
            return Err(CustomError::WalletNotInstalledError);
        }

        let name = network_name(chain_id);
        let switch_params = json!([{ "chainId": to_hex_chain_id(chain_id) }]);

        match self
            .provider
            .request("wallet_switchEthereumChain", switch_params.clone())
            .await
        {
            Ok(_) => {}
            Err(CustomError::WalletRpcError { code, .. }) if code == UNRECOGNIZED_CHAIN_CODE => {
                let params = add_chain_params(chain_id)?;
                let added = self
                    .provider
                    .request("wallet_addEthereumChain", json!([params]))
                    .await;
                if let Err(e) = added {
                    error!("Error adding chain {}: {}", chain_id, e);
                    self.error = Some(format!("Failed to add {} network to wallet", name));
                    return Err(e);
                }
                if let Err(e) = self
                    .provider
                    .request("wallet_switchEthereumChain", switch_params)
                    .await
                {
                    self.error = Some(format!("Failed to switch to {} network", name));
                    return Err(e);
                }
            }
            Err(e) => {
                error!("Error switching to chain {}: {}", chain_id, e);
                self.error = Some(format!("Failed to switch to {} network", name));
                return Err(e);
            }
        }

        self.error = None;
        self.chain_id = Some(chain_id);
        Ok(())
    }

    /// Applies a wallet notification. Returns true when cached view state
    /// (balances, prices) no longer matches the wallet.
    pub fn handle_event(&mut self, event: WalletEvent) -> bool {
        match event {
            WalletEvent::AccountsChanged(accounts) => match accounts.first() {
                None => {
                    self.reset_connection();
                    true
                }
                Some(account) if Some(*account) != self.account => {
                    info!("Wallet account changed to {:?}", account);
                    self.account = Some(*account);
                    self.balances = placeholder_balances();
                    true
                }
                Some(_) => false,
            },
            WalletEvent::ChainChanged(chain_id) => {
                info!("Wallet chain changed to {}", chain_id);
                self.chain_id = Some(chain_id);
                self.balances = placeholder_balances();
                true
            }
        }
    }

    /// Reloads the balance displays for the connected account. A token that
    /// cannot be read shows `0`.
    pub async fn refresh_balances(&mut self, gateway: &dyn DexGateway) {
        let Some(account) = self.account else {
            self.balances = placeholder_balances();
            return;
        };

        for token in TokenSymbol::ALL {
            let display = match gateway.token_balance(token, account).await {
                Ok(raw) => to_eth(raw, TOKEN_DECIMALS).unwrap_or_else(|_| "0".into()),
                Err(e) => {
                    warn!("Error fetching {} balance: {}", token, e);
                    "0".to_string()
                }
            };
            self.balances.insert(token, display);
        }
    }

    pub fn snapshot(&self) -> WalletSnapshot {
        WalletSnapshot {
            installed: self.is_installed(),
            account: self.account,
            display_account: self
                .account
                .map(|account| format_address(&format!("{:?}", account))),
            network: self.current_network(),
            on_expected_network: self.chain_id == Some(self.expected_chain_id),
            is_connecting: self.is_connecting,
            error: self.error.clone(),
            balances: self.balances.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        errors::USER_REJECTED_CODE,
        services::{blockchain_service::MockDexGateway, network_config::HARDHAT_CHAIN_ID},
    };
    use ethers::types::U256;

    const TEST_KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    fn local_wallet(chain_id: u64) -> Arc<LocalKeyWallet> {
        Arc::new(LocalKeyWallet::from_private_key(Some(TEST_KEY), chain_id).unwrap())
    }

    #[tokio::test]
    async fn connect_authorises_the_local_key() {
        let wallet = local_wallet(SEPOLIA_CHAIN_ID);
        let expected = wallet.signer().unwrap().address();
        let mut events = wallet.subscribe();
        let mut ctx = WalletContext::new(wallet, SEPOLIA_CHAIN_ID);

        ctx.check_connection(&MockDexGateway::new()).await;
        assert_eq!(ctx.account(), None);

        let account = ctx.connect_wallet().await.unwrap();
        assert_eq!(account, Some(expected));
        assert_eq!(ctx.chain_id(), Some(SEPOLIA_CHAIN_ID));
        assert!(ctx.snapshot().on_expected_network);
        assert_eq!(
            events.recv().await.unwrap(),
            WalletEvent::AccountsChanged(vec![expected])
        );
    }

    #[tokio::test]
    async fn missing_key_means_not_installed() {
        let wallet = Arc::new(LocalKeyWallet::from_private_key(None, SEPOLIA_CHAIN_ID).unwrap());
        let mut ctx = WalletContext::new(wallet, SEPOLIA_CHAIN_ID);

        let err = ctx.connect_wallet().await.unwrap_err();
        assert!(matches!(err, CustomError::WalletNotInstalledError));
        assert!(ctx.error().is_some());
        assert!(!ctx.snapshot().installed);
    }

    #[tokio::test]
    async fn disconnect_resets_balances_to_placeholder() {
        let mut gateway = MockDexGateway::new();
        gateway
            .expect_token_balance()
            .returning(|_, _| Ok(U256::exp10(18)));

        let mut ctx = WalletContext::new(local_wallet(SEPOLIA_CHAIN_ID), SEPOLIA_CHAIN_ID);
        ctx.connect_wallet().await.unwrap();
        ctx.refresh_balances(&gateway).await;
        assert!(ctx.balances().values().all(|b| b == "1"));

        ctx.disconnect_wallet().await;
        assert_eq!(ctx.account(), None);
        assert!(ctx.balances().values().all(|b| b == BALANCE_PLACEHOLDER));
        assert_eq!(ctx.balances().len(), TokenSymbol::ALL.len());
    }

    #[tokio::test]
    async fn disconnect_revokes_the_authorisation() {
        let mut gateway = MockDexGateway::new();
        gateway
            .expect_token_balance()
            .returning(|_, _| Ok(U256::exp10(18)));
        let wallet = local_wallet(SEPOLIA_CHAIN_ID);
        let mut ctx = WalletContext::new(wallet.clone(), SEPOLIA_CHAIN_ID);

        // a second context restores the authorised account with balances
        ctx.connect_wallet().await.unwrap();
        let mut restored = WalletContext::new(wallet.clone(), SEPOLIA_CHAIN_ID);
        restored.check_connection(&gateway).await;
        assert_eq!(restored.account(), ctx.account());
        assert!(restored.balances().values().all(|b| b == "1"));

        ctx.disconnect_wallet().await;
        let accounts = wallet.request("eth_accounts", json!([])).await.unwrap();
        assert_eq!(accounts, json!([]));

        let mut later = WalletContext::new(wallet, SEPOLIA_CHAIN_ID);
        later.check_connection(&gateway).await;
        assert_eq!(later.account(), None);
    }

    #[tokio::test]
    async fn unreadable_balance_shows_zero() {
        let mut gateway = MockDexGateway::new();
        gateway
            .expect_token_balance()
            .returning(|token, _| match token {
                TokenSymbol::Usdc => Err(CustomError::ContractError("reverted".into())),
                _ => Ok(U256::exp10(17)),
            });

        let mut ctx = WalletContext::new(local_wallet(SEPOLIA_CHAIN_ID), SEPOLIA_CHAIN_ID);
        ctx.connect_wallet().await.unwrap();
        ctx.refresh_balances(&gateway).await;

        assert_eq!(ctx.balances()[&TokenSymbol::Eth], "0.1");
        assert_eq!(ctx.balances()[&TokenSymbol::Usdc], "0");
    }

    #[tokio::test]
    async fn switching_to_unknown_chain_adds_it_first() {
        let wallet = local_wallet(HARDHAT_CHAIN_ID);
        let mut events = wallet.subscribe();
        let mut ctx = WalletContext::new(wallet, SEPOLIA_CHAIN_ID);
        ctx.connect_wallet().await.unwrap();
        assert!(!ctx.snapshot().on_expected_network);

        ctx.switch_to_sepolia().await.unwrap();
        assert_eq!(ctx.chain_id(), Some(SEPOLIA_CHAIN_ID));
        assert_eq!(ctx.error(), None);
        assert!(ctx.snapshot().on_expected_network);

        // AccountsChanged from the connect, then the chain switch
        events.recv().await.unwrap();
        assert_eq!(
            events.recv().await.unwrap(),
            WalletEvent::ChainChanged(SEPOLIA_CHAIN_ID)
        );
    }

    #[tokio::test]
    async fn user_rejection_is_reported() {
        let mut provider = MockWalletProvider::new();
        provider.expect_is_installed().return_const(true);
        provider.expect_request().returning(|_, _| {
            Err(CustomError::WalletRpcError {
                code: USER_REJECTED_CODE,
                message: "User rejected the request.".into(),
            })
        });

        let mut ctx = WalletContext::new(Arc::new(provider), SEPOLIA_CHAIN_ID);
        let err = ctx.connect_wallet().await.unwrap_err();

        assert_eq!(err.user_message(), "Transaction rejected by user");
        assert_eq!(ctx.account(), None);
        assert_eq!(
            ctx.error(),
            Some("Failed to connect wallet. Please try again.")
        );
    }

    #[test]
    fn account_events_update_the_context() {
        let mut ctx = WalletContext::new(local_wallet(SEPOLIA_CHAIN_ID), SEPOLIA_CHAIN_ID);
        let first = Address::repeat_byte(1);
        let second = Address::repeat_byte(2);

        assert!(ctx.handle_event(WalletEvent::AccountsChanged(vec![first])));
        assert!(!ctx.handle_event(WalletEvent::AccountsChanged(vec![first])));
        assert!(ctx.handle_event(WalletEvent::AccountsChanged(vec![second])));
        assert_eq!(ctx.account(), Some(second));

        assert!(ctx.handle_event(WalletEvent::AccountsChanged(vec![])));
        assert_eq!(ctx.account(), None);

        assert!(ctx.handle_event(WalletEvent::ChainChanged(HARDHAT_CHAIN_ID)));
        assert_eq!(ctx.current_network().unwrap().name, "Hardhat Local");
    }
}
