// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! LRU cache for transfer history first-page lookups.
//!
//! A history refresh costs several `eth_getLogs` calls, so the merged result
//! is kept per wallet address until it expires or a watched `Transfer` event
//! invalidates it.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use alloy::primitives::Address;
use lru::LruCache;

use crate::blockchain::TransferRecord;

/// Cached entry: merged history + insertion timestamp.
struct CacheEntry {
    records: Vec<TransferRecord>,
    inserted_at: Instant,
}

/// In-process LRU cache for hot wallet history lookups.
pub struct HistoryCache {
    cache: Mutex<LruCache<Address, CacheEntry>>,
    ttl: Duration,
}

impl HistoryCache {
    /// Create a new cache with the given capacity and TTL.
    ///
    /// - `capacity`: Max number of wallet addresses to cache.
    /// - `ttl`: Time-to-live for each cache entry.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
            ttl,
        }
    }

    /// Get the cached history for a wallet address.
    ///
    /// Returns `None` if not cached or expired.
    pub fn get(&self, wallet: Address) -> Option<Vec<TransferRecord>> {
        let mut cache = self.cache.lock().ok()?;
        if let Some(entry) = cache.get(&wallet) {
            if entry.inserted_at.elapsed() < self.ttl {
                return Some(entry.records.clone());
            }
            cache.pop(&wallet);
        }
        None
    }

    pub fn put(&self, wallet: Address, records: Vec<TransferRecord>) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(
                wallet,
                CacheEntry {
                    records,
                    inserted_at: Instant::now(),
                },
            );
        }
    }

    pub fn invalidate(&self, wallet: Address) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.pop(&wallet);
        }
    }
}
