// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Balance and Transfer Sync
//!
//! Keeps the displayed balance and history of the active wallet current.
//!
//! ## Strategy
//!
//! 1. **Subscriptions**: one `Transfer` subscription for transfers *from* the
//!    wallet and one for transfers *to* it.
//! 2. **Balance**: fetched once when the watcher starts and exactly once per
//!    delivered event. Each event also invalidates the cached history.
//! 3. **History**: read on demand through [`HistoryScanner`], a bounded walk
//!    backward over fixed block windows.
//!
//! ## Lifetime
//!
//! A [`SyncHandle`] owns both subscriptions. Stopping or dropping it releases
//! them. [`BalanceSync::follow_wallet`] re-subscribes whenever the wallet
//! address changes, tearing the previous pair down first.

use std::sync::Arc;

use alloy::primitives::Address;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::blockchain::{ChainError, ChainReader, TokenBalance, TransferFilter, TransferLog};
use crate::currency;
use crate::state::{AppAction, AppEvent, AppState};
use crate::storage::HistoryCache;

pub mod events;
pub mod history;

pub use events::{PollingEventSource, TransferEventSource, TransferSubscription};
pub use history::HistoryScanner;

/// Spawns and re-targets the per-wallet sync task.
#[derive(Clone)]
pub struct BalanceSync {
    chain: Arc<dyn ChainReader>,
    source: Arc<dyn TransferEventSource>,
    app: AppState,
    cache: Option<Arc<HistoryCache>>,
}

impl BalanceSync {
    pub fn new(
        chain: Arc<dyn ChainReader>,
        source: Arc<dyn TransferEventSource>,
        app: AppState,
    ) -> Self {
        Self {
            chain,
            source,
            app,
            cache: None,
        }
    }

    /// Invalidate this cache whenever a watched transfer arrives.
    pub fn with_history_cache(mut self, cache: Arc<HistoryCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Start watching `address`.
    pub fn watch(&self, address: Address) -> SyncHandle {
        let sent = self.source.subscribe(TransferFilter::From(address));
        let received = self.source.subscribe(TransferFilter::To(address));
        let shutdown = CancellationToken::new();

        let task = tokio::spawn(self.clone().run(address, sent, received, shutdown.clone()));

        SyncHandle {
            address,
            shutdown,
            task: Some(task),
        }
    }

    /// Follow the wallet in the application state until `shutdown` fires.
    pub async fn follow_wallet(self, shutdown: CancellationToken) {
        let mut events = self.app.subscribe();
        let mut current = self
            .app
            .snapshot()
            .await
            .wallet_address()
            .map(|address| self.watch(address));

        loop {
            let event = tokio::select! {
                event = events.recv() => event,
                _ = shutdown.cancelled() => break,
            };

            let address = match event {
                Ok(AppEvent::WalletChanged(address)) => address,
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Wallet follower lagged, resyncing");
                    self.app.snapshot().await.wallet_address()
                }
                Err(RecvError::Closed) => break,
            };

            if current.as_ref().map(SyncHandle::address) == address {
                continue;
            }

            if let Some(previous) = current.take() {
                previous.stop().await;
            }
            current = address.map(|address| self.watch(address));
        }

        if let Some(handle) = current {
            handle.stop().await;
        }
    }

    async fn run(
        self,
        address: Address,
        mut sent: TransferSubscription,
        mut received: TransferSubscription,
        shutdown: CancellationToken,
    ) {
        tracing::info!(address = %address, "Balance sync starting");
        let mut decimals = None;

        self.refresh_balance(address, &mut decimals).await;

        loop {
            let log = tokio::select! {
                Some(log) = sent.next() => log,
                Some(log) = received.next() => log,
                _ = shutdown.cancelled() => break,
                else => break,
            };

            self.on_transfer(address, &log);
            self.refresh_balance(address, &mut decimals).await;
        }

        sent.unsubscribe();
        received.unsubscribe();
        tracing::info!(address = %address, "Balance sync stopped");
    }

    fn on_transfer(&self, address: Address, log: &TransferLog) {
        tracing::debug!(
            address = %address,
            tx_hash = %log.tx_hash,
            block = log.block_number,
            "Watched transfer observed"
        );
        if let Some(cache) = &self.cache {
            cache.invalidate(address);
        }
    }

    async fn refresh_balance(&self, address: Address, decimals: &mut Option<u8>) {
        match self.fetch_balance(address, decimals).await {
            Ok(balance) => {
                self.app.dispatch(AppAction::SetBalance(balance)).await;
            }
            Err(e) => tracing::warn!(address = %address, error = %e, "Balance refresh failed"),
        }
    }

    async fn fetch_balance(
        &self,
        address: Address,
        decimals: &mut Option<u8>,
    ) -> Result<TokenBalance, ChainError> {
        let decimals = match *decimals {
            Some(d) => d,
            None => *decimals.insert(self.chain.decimals().await?),
        };
        let raw = self.chain.balance_of(address).await?;

        Ok(TokenBalance {
            balance_raw: raw,
            balance_formatted: currency::format_units(raw, decimals),
            decimals,
        })
    }
}

/// Running sync for one address.
#[derive(Debug)]
pub struct SyncHandle {
    address: Address,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SyncHandle {
    pub fn address(&self) -> Address {
        self.address
    }

    /// Stop the sync and wait until both subscriptions are released.
    pub async fn stop(mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Balance sync task ended abnormally");
            }
        }
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use alloy::primitives::{address, B256, U256};
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use super::*;
    use crate::wallet::Wallet;

    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const OTHER_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

    struct CountingChain {
        balance_reads: AtomicUsize,
    }

    #[async_trait]
    impl ChainReader for CountingChain {
        async fn chain_id(&self) -> Result<u64, ChainError> {
            Ok(1)
        }
        async fn block_number(&self) -> Result<u64, ChainError> {
            Ok(1)
        }
        async fn block_timestamp(&self, _number: u64) -> Result<u64, ChainError> {
            Ok(0)
        }
        async fn decimals(&self) -> Result<u8, ChainError> {
            Ok(2)
        }
        async fn balance_of(&self, _owner: Address) -> Result<U256, ChainError> {
            let n = self.balance_reads.fetch_add(1, Ordering::SeqCst) as u64;
            Ok(U256::from(1_000 + n))
        }
        async fn permit_nonce(&self, _owner: Address) -> Result<U256, ChainError> {
            Ok(U256::ZERO)
        }
        async fn transfer_nonce(&self, _owner: Address) -> Result<U256, ChainError> {
            Ok(U256::ZERO)
        }
        async fn transfer_logs(
            &self,
            _filter: TransferFilter,
            _from_block: u64,
            _to_block: u64,
        ) -> Result<Vec<TransferLog>, ChainError> {
            Ok(Vec::new())
        }
    }

    /// Event source driven by the test.
    #[derive(Default)]
    struct StubSource {
        senders: Mutex<Vec<(TransferFilter, mpsc::Sender<TransferLog>)>>,
    }

    impl StubSource {
        async fn emit(&self, log: TransferLog) -> usize {
            let targets: Vec<_> = self
                .senders
                .lock()
                .unwrap()
                .iter()
                .filter(|(filter, tx)| filter.matches(log.from, log.to) && !tx.is_closed())
                .map(|(_, tx)| tx.clone())
                .collect();
            for tx in &targets {
                let _ = tx.send(log.clone()).await;
            }
            targets.len()
        }

        fn active(&self) -> Vec<TransferFilter> {
            self.senders
                .lock()
                .unwrap()
                .iter()
                .filter(|(_, tx)| !tx.is_closed())
                .map(|(filter, _)| *filter)
                .collect()
        }
    }

    impl TransferEventSource for StubSource {
        fn subscribe(&self, filter: TransferFilter) -> TransferSubscription {
            let (tx, rx) = mpsc::channel(16);
            self.senders.lock().unwrap().push((filter, tx));
            TransferSubscription::new(filter, rx, CancellationToken::new())
        }
    }

    fn transfer(from: Address, to: Address, block: u64) -> TransferLog {
        TransferLog {
            tx_hash: B256::with_last_byte(block as u8),
            log_index: 0,
            block_number: block,
            from,
            to,
            value: U256::from(1u64),
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    fn setup() -> (Arc<CountingChain>, Arc<StubSource>, AppState, BalanceSync) {
        let chain = Arc::new(CountingChain {
            balance_reads: AtomicUsize::new(0),
        });
        let source = Arc::new(StubSource::default());
        let app = AppState::new();
        let sync = BalanceSync::new(chain.clone(), source.clone(), app.clone());
        (chain, source, app, sync)
    }

    #[tokio::test]
    async fn one_fetch_on_start_and_one_per_event() {
        let (chain, source, app, sync) = setup();
        let me = address!("1111111111111111111111111111111111111111");
        let other = address!("2222222222222222222222222222222222222222");

        let handle = sync.watch(me);
        settle().await;
        assert_eq!(chain.balance_reads.load(Ordering::SeqCst), 1);

        assert_eq!(source.emit(transfer(other, me, 10)).await, 1);
        settle().await;
        assert_eq!(chain.balance_reads.load(Ordering::SeqCst), 2);

        assert_eq!(source.emit(transfer(me, other, 11)).await, 1);
        settle().await;
        assert_eq!(chain.balance_reads.load(Ordering::SeqCst), 3);

        // Unrelated transfer matches neither filter
        assert_eq!(source.emit(transfer(other, other, 12)).await, 0);
        settle().await;
        assert_eq!(chain.balance_reads.load(Ordering::SeqCst), 3);

        let balance = app.snapshot().await.balance.unwrap();
        assert_eq!(balance.balance_formatted, "10.02");

        handle.stop().await;
    }

    #[tokio::test]
    async fn stop_releases_subscriptions_and_fetches() {
        let (chain, source, _app, sync) = setup();
        let me = address!("1111111111111111111111111111111111111111");

        let handle = sync.watch(me);
        settle().await;
        assert_eq!(source.active().len(), 2);

        handle.stop().await;
        assert!(source.active().is_empty());

        let before = chain.balance_reads.load(Ordering::SeqCst);
        assert_eq!(source.emit(transfer(me, me, 20)).await, 0);
        settle().await;
        assert_eq!(chain.balance_reads.load(Ordering::SeqCst), before);
    }

    #[tokio::test]
    async fn events_invalidate_history_cache() {
        let (_chain, source, _app, sync) = setup();
        let me = address!("1111111111111111111111111111111111111111");
        let cache = Arc::new(HistoryCache::new(4, Duration::from_secs(60)));
        let sync = sync.with_history_cache(cache.clone());

        cache.put(me, Vec::new());
        let handle = sync.watch(me);
        source.emit(transfer(me, me, 30)).await;
        settle().await;

        assert!(cache.get(me).is_none());
        handle.stop().await;
    }

    #[tokio::test]
    async fn follows_wallet_changes() {
        let (_chain, source, app, sync) = setup();
        let shutdown = CancellationToken::new();
        let follower = tokio::spawn(sync.follow_wallet(shutdown.clone()));
        settle().await;
        assert!(source.active().is_empty());

        let first = Wallet::from_key_material(DEV_KEY).unwrap();
        let first_address = first.address();
        app.dispatch(AppAction::SetWallet(Some(first))).await;
        settle().await;
        assert_eq!(
            source.active(),
            vec![TransferFilter::From(first_address), TransferFilter::To(first_address)]
        );

        let second = Wallet::from_key_material(OTHER_KEY).unwrap();
        let second_address = second.address();
        app.dispatch(AppAction::SetWallet(Some(second))).await;
        settle().await;
        assert_eq!(
            source.active(),
            vec![TransferFilter::From(second_address), TransferFilter::To(second_address)]
        );

        app.dispatch(AppAction::SetWallet(None)).await;
        settle().await;
        assert!(source.active().is_empty());

        shutdown.cancel();
        follower.await.unwrap();
    }
}
