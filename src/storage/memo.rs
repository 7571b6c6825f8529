// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Memo persistence.
//!
//! A memo is stored only after its payment succeeded, under the identifier of
//! the relayed transaction. History screens read it back by the same key.

use std::sync::Arc;

use super::{KeyValueStore, StoreResult};

const MEMO_PREFIX: &str = "memo.";

#[derive(Clone)]
pub struct MemoRepository {
    store: Arc<dyn KeyValueStore>,
}

impl MemoRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn key(tx_id: &str) -> String {
        format!("{MEMO_PREFIX}{}", tx_id.to_lowercase())
    }

    pub fn save(&self, tx_id: &str, memo: &str) -> StoreResult<()> {
        self.store.set(&Self::key(tx_id), memo)
    }

    pub fn memo_for(&self, tx_id: &str) -> StoreResult<Option<String>> {
        self.store.get(&Self::key(tx_id))
    }
}
