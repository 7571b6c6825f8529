// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bounded transfer history.
//!
//! History is read straight from chain logs, walking backward from the head
//! in fixed windows. Only `max_windows * window_blocks` blocks are ever
//! scanned, so transfers older than that are not listed.

use std::collections::HashSet;
use std::sync::Arc;

use alloy::primitives::{Address, B256};

use crate::blockchain::{ChainError, ChainReader, TransferFilter, TransferRecord};
use crate::config::PayflowConfig;
use crate::storage::HistoryCache;

/// Default block span of one `eth_getLogs` window.
pub const DEFAULT_WINDOW_BLOCKS: u64 = 10_000;

/// Default number of windows per refresh.
pub const DEFAULT_MAX_WINDOWS: u32 = 3;

/// Inclusive block ranges to scan, newest first.
pub fn windows(head: u64, window_blocks: u64, max_windows: u32) -> Vec<(u64, u64)> {
    let span = window_blocks.max(1);
    let mut ranges = Vec::new();
    let mut to = head;

    for _ in 0..max_windows {
        let from = to.saturating_sub(span - 1);
        ranges.push((from, to));
        if from == 0 {
            break;
        }
        to = from - 1;
    }

    ranges
}

/// Reads and caches the transfer history of a wallet.
#[derive(Clone)]
pub struct HistoryScanner {
    chain: Arc<dyn ChainReader>,
    cache: Option<Arc<HistoryCache>>,
    window_blocks: u64,
    max_windows: u32,
}

impl HistoryScanner {
    pub fn new(chain: Arc<dyn ChainReader>) -> Self {
        Self {
            chain,
            cache: None,
            window_blocks: DEFAULT_WINDOW_BLOCKS,
            max_windows: DEFAULT_MAX_WINDOWS,
        }
    }

    /// Scanner using the configured window size and count.
    pub fn from_config(config: &PayflowConfig, chain: Arc<dyn ChainReader>) -> Self {
        Self::new(chain).with_windows(config.history_window_blocks, config.history_max_windows)
    }

    pub fn with_cache(mut self, cache: Arc<HistoryCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_windows(mut self, window_blocks: u64, max_windows: u32) -> Self {
        self.window_blocks = window_blocks;
        self.max_windows = max_windows;
        self
    }

    pub fn cache(&self) -> Option<&Arc<HistoryCache>> {
        self.cache.as_ref()
    }

    /// History of `owner`, newest first, served from cache when fresh.
    pub async fn history(&self, owner: Address) -> Result<Vec<TransferRecord>, ChainError> {
        if let Some(cached) = self.cache.as_ref().and_then(|c| c.get(owner)) {
            return Ok(cached);
        }

        let records = self.scan(owner).await?;
        if let Some(cache) = &self.cache {
            cache.put(owner, records.clone());
        }
        Ok(records)
    }

    /// Scan the chain, bypassing the cache.
    ///
    /// A window whose queries fail is logged and skipped; the refresh only
    /// fails when the head block cannot be read.
    pub async fn scan(&self, owner: Address) -> Result<Vec<TransferRecord>, ChainError> {
        let head = self.chain.block_number().await?;
        let mut seen: HashSet<(B256, u64)> = HashSet::new();
        let mut records = Vec::new();

        for (from, to) in windows(head, self.window_blocks, self.max_windows) {
            let sent = self
                .chain
                .transfer_logs(TransferFilter::From(owner), from, to)
                .await;
            let received = self
                .chain
                .transfer_logs(TransferFilter::To(owner), from, to)
                .await;

            let (sent, received) = match (sent, received) {
                (Ok(sent), Ok(received)) => (sent, received),
                (Err(e), _) | (_, Err(e)) => {
                    tracing::warn!(error = %e, from, to, "Skipping history window");
                    continue;
                }
            };

            tracing::debug!(
                from_block = from,
                to_block = to,
                sent = sent.len(),
                received = received.len(),
                "Scanned history window"
            );

            for log in sent.into_iter().chain(received) {
                if seen.insert((log.tx_hash, log.log_index)) {
                    records.push(TransferRecord::from_log(log, owner));
                }
            }
        }

        records.sort_by(|a, b| {
            b.block_number
                .cmp(&a.block_number)
                .then(b.log_index.cmp(&a.log_index))
        });
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use alloy::primitives::{address, U256};
    use async_trait::async_trait;

    use super::*;
    use crate::blockchain::{Direction, TransferLog};

    const OWNER: Address = address!("1111111111111111111111111111111111111111");
    const OTHER: Address = address!("2222222222222222222222222222222222222222");

    struct LogChain {
        head: u64,
        logs: Vec<TransferLog>,
        failing_range: Option<(u64, u64)>,
        queries: Mutex<Vec<(TransferFilter, u64, u64)>>,
    }

    impl LogChain {
        fn new(head: u64, logs: Vec<TransferLog>) -> Self {
            Self {
                head,
                logs,
                failing_range: None,
                queries: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChainReader for LogChain {
        async fn chain_id(&self) -> Result<u64, ChainError> {
            Ok(1)
        }
        async fn block_number(&self) -> Result<u64, ChainError> {
            Ok(self.head)
        }
        async fn block_timestamp(&self, _number: u64) -> Result<u64, ChainError> {
            Ok(0)
        }
        async fn decimals(&self) -> Result<u8, ChainError> {
            Ok(18)
        }
        async fn balance_of(&self, _owner: Address) -> Result<U256, ChainError> {
            Ok(U256::ZERO)
        }
        async fn permit_nonce(&self, _owner: Address) -> Result<U256, ChainError> {
            Ok(U256::ZERO)
        }
        async fn transfer_nonce(&self, _owner: Address) -> Result<U256, ChainError> {
            Ok(U256::ZERO)
        }
        async fn transfer_logs(
            &self,
            filter: TransferFilter,
            from_block: u64,
            to_block: u64,
        ) -> Result<Vec<TransferLog>, ChainError> {
            self.queries.lock().unwrap().push((filter, from_block, to_block));
            if self.failing_range == Some((from_block, to_block)) {
                return Err(ChainError::Rpc("query returned more than 10000 results".into()));
            }
            Ok(self
                .logs
                .iter()
                .filter(|l| (from_block..=to_block).contains(&l.block_number))
                .filter(|l| filter.matches(l.from, l.to))
                .cloned()
                .collect())
        }
    }

    fn log(block: u64, index: u64, from: Address, to: Address) -> TransferLog {
        TransferLog {
            tx_hash: B256::with_last_byte(block as u8),
            log_index: index,
            block_number: block,
            from,
            to,
            value: U256::from(block),
        }
    }

    #[test]
    fn windows_walk_backward_without_gaps() {
        assert_eq!(
            windows(25_000, 10_000, 3),
            vec![(15_001, 25_000), (5_001, 15_000), (0, 5_000)]
        );
        assert_eq!(
            windows(100_000, 10_000, 3),
            vec![(90_001, 100_000), (80_001, 90_000), (70_001, 80_000)]
        );
    }

    #[test]
    fn windows_stop_at_genesis() {
        assert_eq!(windows(500, 10_000, 3), vec![(0, 500)]);
        assert!(windows(500, 10_000, 0).is_empty());
    }

    #[tokio::test]
    async fn merges_sorts_and_dedupes() {
        let chain = Arc::new(LogChain::new(
            50_000,
            vec![
                log(49_000, 1, OWNER, OTHER),
                log(45_000, 0, OTHER, OWNER),
                log(48_000, 2, OWNER, OWNER),
                log(1_000, 0, OTHER, OWNER), // beyond the lookback
            ],
        ));
        let scanner = HistoryScanner::new(chain.clone());

        let records = scanner.history(OWNER).await.unwrap();
        let blocks: Vec<u64> = records.iter().map(|r| r.block_number).collect();
        assert_eq!(blocks, vec![49_000, 48_000, 45_000]);

        assert_eq!(records[0].direction, Direction::Sent);
        assert_eq!(records[1].direction, Direction::SelfTransfer);
        assert_eq!(records[2].direction, Direction::Received);

        // Two filters per window, three windows
        assert_eq!(chain.queries.lock().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn failing_window_is_skipped() {
        let mut chain = LogChain::new(
            30_000,
            vec![log(25_000, 0, OWNER, OTHER), log(15_000, 0, OTHER, OWNER)],
        );
        chain.failing_range = Some((20_001, 30_000));
        let scanner = HistoryScanner::new(Arc::new(chain));

        let records = scanner.scan(OWNER).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].block_number, 15_000);
    }

    #[tokio::test]
    async fn custom_window_configuration() {
        let chain = Arc::new(LogChain::new(1_000, vec![]));
        let scanner = HistoryScanner::new(chain.clone()).with_windows(100, 2);
        scanner.scan(OWNER).await.unwrap();

        let ranges: Vec<(u64, u64)> = chain
            .queries
            .lock()
            .unwrap()
            .iter()
            .map(|(_, from, to)| (*from, *to))
            .collect();
        assert_eq!(ranges, vec![(901, 1_000), (901, 1_000), (801, 900), (801, 900)]);
    }

    #[tokio::test]
    async fn windows_follow_environment_config() {
        let config = PayflowConfig::from_lookup(|key: &str| {
            match key {
                "PAI_CLEARING_ADDRESS" => Some("0x1111111111111111111111111111111111111111"),
                "PAI_RELAYER_URL" => Some("https://relayer.example/pay"),
                "PAI_HISTORY_WINDOW_BLOCKS" => Some("250"),
                "PAI_HISTORY_MAX_WINDOWS" => Some("2"),
                _ => None,
            }
            .map(String::from)
        })
        .unwrap();

        let chain = Arc::new(LogChain::new(1_000, vec![]));
        HistoryScanner::from_config(&config, chain.clone())
            .scan(OWNER)
            .await
            .unwrap();

        let mut ranges: Vec<(u64, u64)> = chain
            .queries
            .lock()
            .unwrap()
            .iter()
            .map(|(_, from, to)| (*from, *to))
            .collect();
        ranges.dedup();
        assert_eq!(ranges, vec![(751, 1_000), (501, 750)]);
    }

    #[tokio::test]
    async fn cached_history_skips_chain() {
        let chain = Arc::new(LogChain::new(10, vec![log(5, 0, OWNER, OTHER)]));
        let cache = Arc::new(HistoryCache::new(8, Duration::from_secs(60)));
        let scanner = HistoryScanner::new(chain.clone()).with_cache(cache.clone());

        scanner.history(OWNER).await.unwrap();
        let after_first = chain.queries.lock().unwrap().len();
        scanner.history(OWNER).await.unwrap();
        assert_eq!(chain.queries.lock().unwrap().len(), after_first);

        cache.invalidate(OWNER);
        scanner.history(OWNER).await.unwrap();
        assert!(chain.queries.lock().unwrap().len() > after_first);
    }
}
