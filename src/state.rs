use std::{collections::HashMap, sync::Arc};

use actix_web::web;
use chrono::{DateTime, Duration, Utc};
use ethers::types::Address;
use log::{debug, info, warn};
use tokio::sync::{broadcast, Mutex, RwLock};
use uuid::Uuid;

use crate::{
    errors::CustomError,
    models::wallet::WalletEvent,
    services::{
        blockchain_service::DexGateway, price_service::PriceCache, swap_form::SwapForm,
        wallet_service::WalletContext,
    },
};

const SESSION_IDLE_MINUTES: i64 = 30;
const MAX_SESSIONS: usize = 1024;

struct SessionEntry {
    form: SwapForm,
    last_touched: DateTime<Utc>,
}

/// Swap forms by session id. Idle sessions expire and the store is capped.
pub struct SessionStore {
    entries: HashMap<Uuid, SessionEntry>,
    idle_timeout: Duration,
    capacity: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(Duration::minutes(SESSION_IDLE_MINUTES), MAX_SESSIONS)
    }
}

impl SessionStore {
    pub fn new(idle_timeout: Duration, capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            idle_timeout,
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Drops sessions untouched for longer than the idle timeout. Sessions
    /// with a transaction in flight are kept.
    pub fn evict_idle(&mut self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.idle_timeout;
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.form.is_tx_pending() || entry.last_touched > cutoff);
        before - self.entries.len()
    }

    pub fn insert(&mut self, id: Uuid, form: SwapForm) -> Result<(), CustomError> {
        let now = Utc::now();
        let evicted = self.evict_idle(now);
        if evicted > 0 {
            info!("Evicted {} idle swap sessions", evicted);
        }

        while self.entries.len() >= self.capacity {
            let oldest = self
                .entries
                .iter()
                .filter(|(_, entry)| !entry.form.is_tx_pending())
                .min_by_key(|(_, entry)| entry.last_touched)
                .map(|(id, _)| *id)
                .ok_or_else(|| {
                    CustomError::ValidationError("too many active swap sessions".to_string())
                })?;
            self.entries.remove(&oldest);
        }

        self.entries.insert(
            id,
            SessionEntry {
                form,
                last_touched: now,
            },
        );
        Ok(())
    }

    pub fn get_mut(&mut self, id: &Uuid) -> Result<&mut SwapForm, CustomError> {
        let entry = self
            .entries
            .get_mut(id)
            .ok_or(CustomError::SessionNotFoundError(*id))?;
        entry.last_touched = Utc::now();
        Ok(&mut entry.form)
    }

    pub fn remove(&mut self, id: &Uuid) -> Result<SwapForm, CustomError> {
        if self.get_mut(id)?.is_tx_pending() {
            return Err(CustomError::TransactionPendingError);
        }
        self.entries
            .remove(id)
            .map(|entry| entry.form)
            .ok_or(CustomError::SessionNotFoundError(*id))
    }

    /// Clears the pending mark of a session whose submit never wrote back.
    pub fn release(&mut self, id: &Uuid) {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.form.end_transaction();
        }
    }
}

/// Everything the handlers share.
pub struct AppState {
    pub gateway: Arc<dyn DexGateway>,
    pub wallet: Mutex<WalletContext>,
    pub prices: RwLock<PriceCache>,
    pub sessions: Mutex<SessionStore>,
    pub dex_address: Address,
    pub eth_usd_price: f64,
}

impl AppState {
    pub fn new(
        gateway: Arc<dyn DexGateway>,
        wallet: WalletContext,
        dex_address: Address,
        eth_usd_price: f64,
    ) -> Self {
        Self {
            gateway,
            wallet: Mutex::new(wallet),
            prices: RwLock::new(PriceCache::new()),
            sessions: Mutex::new(SessionStore::default()),
            dex_address,
            eth_usd_price,
        }
    }

    pub async fn account(&self) -> Option<Address> {
        self.wallet.lock().await.account()
    }

    /// Reads prices into a copy of the cache and swaps it in, so quotes keep
    /// being served while the contract is queried.
    pub async fn refresh_prices(&self) -> Result<PriceCache, CustomError> {
        let mut next = self.prices.read().await.clone();
        next.refresh(self.gateway.as_ref()).await?;
        *self.prices.write().await = next.clone();
        Ok(next)
    }

    /// Drops the cached prices and reads them again from the DEX.
    pub async fn reload_prices(&self) {
        let mut next = PriceCache::new();
        if let Err(e) = next.refresh(self.gateway.as_ref()).await {
            warn!("Error refreshing token prices: {}", e);
        }
        *self.prices.write().await = next;
    }
}

/// Applies wallet notifications until the provider goes away.
pub async fn watch_wallet_events(
    state: web::Data<AppState>,
    mut events: broadcast::Receiver<WalletEvent>,
) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Missed {} wallet events", skipped);
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        debug!("wallet event {:?}", event);

        let chain_changed = matches!(event, WalletEvent::ChainChanged(_));
        let mut wallet = state.wallet.lock().await;
        if !wallet.handle_event(event) {
            continue;
        }
        wallet.refresh_balances(state.gateway.as_ref()).await;
        drop(wallet);

        if chain_changed {
            state.reload_prices().await;
        }
    }
}
