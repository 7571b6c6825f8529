// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! PAI Wallet - Gasless Payment Core
//!
//! This crate implements the payment side of the PAI mobile wallet: the
//! holder signs an ERC-2612 permit and a clearing-contract `pay`
//! authorization, a relayer submits both on chain and pays the gas, and the
//! wallet tracks the attempt and the resulting balance.
//!
//! ## Modules
//!
//! - `currency` - Decimal amount parsing and display formatting
//! - `blockchain` - Chain reads, contract bindings, EIP-712 signing
//! - `providers` - Relayer HTTP client
//! - `payflow` - Payment state machine
//! - `indexer` - Balance and transfer history sync
//! - `state` - Application state owner
//! - `storage` - Key-value and secure storage collaborators
//! - `wallet` - Wallet bootstrap from secure storage
//!
//! ## Wiring
//!
//! ```rust,ignore
//! let config = PayflowConfig::from_env()?;
//! telemetry::init_tracing(config.log_format);
//!
//! let chain: Arc<dyn ChainReader> = Arc::new(PaiChainClient::from_config(&config)?);
//! let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(data_dir.join("kv.json")));
//! let app = AppState::hydrate(store.clone());
//!
//! let wallet = Wallet::load_or_create(&keychain)?;
//! app.dispatch(AppAction::SetWallet(Some(wallet))).await;
//!
//! let source = Arc::new(PollingEventSource::from_config(&config, chain.clone()));
//! tokio::spawn(BalanceSync::new(chain.clone(), source, app.clone()).follow_wallet(shutdown));
//!
//! let history = HistoryScanner::from_config(&config, chain.clone());
//!
//! let flow = PaymentFlow::from_config(&config, chain, app, MemoRepository::new(store))?;
//! ```

pub mod blockchain;
pub mod config;
pub mod currency;
pub mod error;
pub mod indexer;
pub mod payflow;
pub mod providers;
pub mod state;
pub mod storage;
pub mod telemetry;
pub mod wallet;

pub use config::{ConfigError, LogFormat, PayflowConfig};
pub use error::{FailureKind, NetworkError, PayflowError, PreconditionError};
pub use payflow::{PaymentFlow, Recipient, TxStatus};
pub use state::{AppAction, AppEvent, AppState};
pub use wallet::Wallet;
