// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Application state owner.
//!
//! One [`AppState`] handle is created by the host and cloned into the payment
//! flow and the balance sync. Every change goes through [`AppState::dispatch`],
//! which returns the new snapshot and publishes an [`AppEvent`] to
//! subscribers. Balance and decimals are mirrored to the local key-value store
//! so the last known values show up immediately on the next launch. The cached
//! balance is tied to the wallet it was read for and dropped when another
//! wallet is set.

use std::sync::Arc;

use std::str::FromStr;

use alloy::primitives::{Address, U256};
use tokio::sync::{broadcast, RwLock};
use tracing::warn;

use crate::blockchain::TokenBalance;
use crate::currency;
use crate::storage::KeyValueStore;
use crate::wallet::Wallet;

/// Store key of the last known balance, in base units.
pub const BALANCE_KEY: &str = "pai.balance";
/// Store key of the wallet the cached balance belongs to.
pub const BALANCE_OWNER_KEY: &str = "pai.balance.owner";
/// Store key of the token decimals.
pub const DECIMALS_KEY: &str = "pai.decimals";

const EVENT_CAPACITY: usize = 64;

/// Snapshot of the application state.
#[derive(Debug, Clone, Default)]
pub struct ApplicationState {
    pub wallet: Option<Wallet>,
    pub balance: Option<TokenBalance>,
    /// Wallet `balance` was read for
    pub balance_owner: Option<Address>,
    pub decimals: Option<u8>,
    pub error: Option<String>,
}

impl ApplicationState {
    pub fn wallet_address(&self) -> Option<Address> {
        self.wallet.as_ref().map(Wallet::address)
    }
}

/// State changes accepted by [`AppState::dispatch`].
#[derive(Debug, Clone)]
pub enum AppAction {
    SetWallet(Option<Wallet>),
    SetBalance(TokenBalance),
    SetDecimals(u8),
    SetError(Option<String>),
}

/// Published after every dispatched action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    WalletChanged(Option<Address>),
    BalanceUpdated(TokenBalance),
    DecimalsUpdated(u8),
    ErrorChanged(Option<String>),
}

#[derive(Clone)]
pub struct AppState {
    inner: Arc<RwLock<ApplicationState>>,
    events: broadcast::Sender<AppEvent>,
    store: Option<Arc<dyn KeyValueStore>>,
}

impl AppState {
    /// State without persistence.
    pub fn new() -> Self {
        Self::build(ApplicationState::default(), None)
    }

    /// Restore cached balance and decimals from `store` and persist future
    /// updates to it.
    pub fn hydrate(store: Arc<dyn KeyValueStore>) -> Self {
        let initial = restore(store.as_ref());
        Self::build(initial, Some(store))
    }

    fn build(initial: ApplicationState, store: Option<Arc<dyn KeyValueStore>>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(RwLock::new(initial)),
            events,
            store,
        }
    }

    pub async fn snapshot(&self) -> ApplicationState {
        self.inner.read().await.clone()
    }

    pub async fn wallet(&self) -> Option<Wallet> {
        self.inner.read().await.wallet.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.events.subscribe()
    }

    /// Apply `action` and return the resulting state.
    pub async fn dispatch(&self, action: AppAction) -> ApplicationState {
        let (snapshot, event) = {
            let mut state = self.inner.write().await;
            let event = match action {
                AppAction::SetWallet(wallet) => {
                    let address = wallet.as_ref().map(Wallet::address);
                    if state.balance_owner != address {
                        state.balance = None;
                        state.balance_owner = None;
                    }
                    state.wallet = wallet;
                    AppEvent::WalletChanged(address)
                }
                AppAction::SetBalance(balance) => {
                    state.balance_owner = state.wallet_address();
                    state.decimals = Some(balance.decimals);
                    state.balance = Some(balance.clone());
                    AppEvent::BalanceUpdated(balance)
                }
                AppAction::SetDecimals(decimals) => {
                    state.decimals = Some(decimals);
                    AppEvent::DecimalsUpdated(decimals)
                }
                AppAction::SetError(error) => {
                    state.error = error.clone();
                    AppEvent::ErrorChanged(error)
                }
            };
            (state.clone(), event)
        };

        self.persist(&event, &snapshot);
        // No receivers is fine
        let _ = self.events.send(event);
        snapshot
    }

    fn persist(&self, event: &AppEvent, snapshot: &ApplicationState) {
        let Some(store) = &self.store else {
            return;
        };

        let result = match event {
            AppEvent::WalletChanged(_) if snapshot.balance.is_none() => store
                .remove(BALANCE_KEY)
                .and_then(|_| store.remove(BALANCE_OWNER_KEY)),
            AppEvent::BalanceUpdated(balance) => store
                .set(BALANCE_KEY, &balance.balance_raw.to_string())
                .and_then(|_| store.set(DECIMALS_KEY, &balance.decimals.to_string()))
                .and_then(|_| match snapshot.balance_owner {
                    Some(owner) => store.set(BALANCE_OWNER_KEY, &owner.to_string()),
                    None => store.remove(BALANCE_OWNER_KEY),
                }),
            AppEvent::DecimalsUpdated(decimals) => store.set(DECIMALS_KEY, &decimals.to_string()),
            _ => Ok(()),
        };

        if let Err(e) = result {
            warn!(error = %e, "Failed to persist application state");
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

fn restore(store: &dyn KeyValueStore) -> ApplicationState {
    let read = |key: &str| match store.get(key) {
        Ok(value) => value,
        Err(e) => {
            warn!(key, error = %e, "Failed to read cached state");
            None
        }
    };

    let decimals = read(DECIMALS_KEY).and_then(|d| d.parse::<u8>().ok());
    let balance = match (read(BALANCE_KEY), decimals) {
        (Some(raw), Some(decimals)) => U256::from_str_radix(&raw, 10).ok().map(|raw| TokenBalance {
            balance_raw: raw,
            balance_formatted: currency::format_units(raw, decimals),
            decimals,
        }),
        _ => None,
    };
    let balance_owner = balance
        .as_ref()
        .and(read(BALANCE_OWNER_KEY))
        .and_then(|owner| Address::from_str(&owner).ok());

    ApplicationState {
        balance,
        balance_owner,
        decimals,
        ..Default::default()
    }
}
