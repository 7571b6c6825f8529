// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Collaborators
//!
//! The payment core persists very little on its own: the wallet seed, the
//! memo attached to each successful payment, and the last known balance.
//! Both stores are plain string key-value maps behind a trait so the host
//! application can plug in its platform keychain and preferences store.
//!
//! ## Stores
//!
//! - [`SecureStorage`]: holds the wallet seed under [`MNEMONIC_KEY`]. Only
//!   [`crate::wallet::Wallet::load_or_create`] touches it; the payment flow
//!   receives an already materialised signer.
//! - [`KeyValueStore`]: memos keyed by transaction identifier plus the cached
//!   application state (`pai.balance`, `pai.decimals`).
//!
//! ## Implementations
//!
//! - [`InMemoryStore`]: process-local map, used by tests and ephemeral hosts
//! - [`FileStore`]: one JSON document on disk, rewritten atomically

use std::io;

pub mod file_store;
pub mod history_cache;
pub mod memo;
pub mod memory;

pub use file_store::FileStore;
pub use history_cache::HistoryCache;
pub use memo::MemoRepository;
pub use memory::InMemoryStore;

/// Secure storage key holding the wallet seed material.
pub const MNEMONIC_KEY: &str = "MNEMONIC_KEY";

/// Errors raised by storage backends.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A writer panicked while holding the store lock
    #[error("store lock poisoned")]
    Poisoned,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Local key-value store for non-secret data.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    fn remove(&self, key: &str) -> StoreResult<()>;
}

/// Platform secure storage (keychain / keystore) for key material.
pub trait SecureStorage: Send + Sync {
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> StoreResult<()>;
}
