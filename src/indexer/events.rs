// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! `Transfer` event subscriptions.
//!
//! A [`TransferSubscription`] is a scoped handle: dropping it stops the
//! producer behind it, so listeners cannot outlive the component that
//! created them.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::blockchain::{ChainReader, TransferFilter, TransferLog};
use crate::config::PayflowConfig;

/// Default poll interval when caught up to chain head.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

const EVENT_BUFFER: usize = 64;

/// Live stream of `Transfer` logs matching one filter.
#[derive(Debug)]
pub struct TransferSubscription {
    filter: TransferFilter,
    events: mpsc::Receiver<TransferLog>,
    cancel: CancellationToken,
}

impl TransferSubscription {
    pub fn new(
        filter: TransferFilter,
        events: mpsc::Receiver<TransferLog>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            filter,
            events,
            cancel,
        }
    }

    pub fn filter(&self) -> TransferFilter {
        self.filter
    }

    /// Next matching log, or `None` once the producer stopped.
    pub async fn next(&mut self) -> Option<TransferLog> {
        self.events.recv().await
    }

    /// Stop the producer. Also done on drop.
    pub fn unsubscribe(&mut self) {
        self.cancel.cancel();
        self.events.close();
    }
}

impl Drop for TransferSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Anything that can deliver `Transfer` logs for a filter.
pub trait TransferEventSource: Send + Sync {
    fn subscribe(&self, filter: TransferFilter) -> TransferSubscription;
}

/// Event source that polls `eth_getLogs` on an interval.
///
/// Only logs mined after the subscription was created are delivered.
pub struct PollingEventSource {
    chain: Arc<dyn ChainReader>,
    poll_interval: Duration,
}

impl PollingEventSource {
    pub fn new(chain: Arc<dyn ChainReader>) -> Self {
        Self {
            chain,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Source polling at the configured interval.
    pub fn from_config(config: &PayflowConfig, chain: Arc<dyn ChainReader>) -> Self {
        Self::new(chain).with_poll_interval(config.poll_interval)
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

impl TransferEventSource for PollingEventSource {
    fn subscribe(&self, filter: TransferFilter) -> TransferSubscription {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let cancel = CancellationToken::new();

        tokio::spawn(poll_transfers(
            self.chain.clone(),
            filter,
            self.poll_interval,
            tx,
            cancel.clone(),
        ));

        TransferSubscription::new(filter, rx, cancel)
    }
}

/// Poll loop behind one subscription. Runs until cancelled or the receiver
/// is gone.
async fn poll_transfers(
    chain: Arc<dyn ChainReader>,
    filter: TransferFilter,
    poll_interval: Duration,
    tx: mpsc::Sender<TransferLog>,
    shutdown: CancellationToken,
) {
    tracing::debug!(filter = ?filter, "Transfer poller starting");
    let mut next_block: Option<u64> = None;

    loop {
        if shutdown.is_cancelled() || tx.is_closed() {
            break;
        }

        match chain.block_number().await {
            Ok(head) => {
                let from = *next_block.get_or_insert(head + 1);
                if from <= head {
                    match chain.transfer_logs(filter, from, head).await {
                        Ok(logs) => {
                            for log in logs {
                                if tx.send(log).await.is_err() {
                                    tracing::debug!(filter = ?filter, "Transfer poller receiver gone");
                                    return;
                                }
                            }
                            next_block = Some(head + 1);
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, from, to = head, "Transfer poll failed, will retry");
                        }
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "Failed to read head block, will retry"),
        }

        tokio::select! {
            _ = tokio::time::sleep(poll_interval) => {},
            _ = shutdown.cancelled() => break,
        }
    }

    tracing::debug!(filter = ?filter, "Transfer poller stopped");
}
