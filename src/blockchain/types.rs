// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Blockchain types and constants.

use alloy::primitives::{address, Address, B256, U256};
use serde::{Deserialize, Serialize};

/// Public JSON-RPC endpoint of Polygon Mumbai, where the PAI token is deployed.
pub const DEFAULT_RPC_URL: &str = "https://rpc-mumbai.maticvigil.com";

/// PAI token address on Mumbai.
pub const PAI_TOKEN_ADDRESS: Address = address!("875414b39658b198971a44bfb149efa1105a1667");

/// EIP-712 domain name declared by the PAI token contract.
pub const PAI_TOKEN_NAME: &str = "Peso Argentino Intangible";

/// Default EIP-712 domain name of the clearing contract.
pub const DEFAULT_CLEARING_NAME: &str = "ACH";

/// EIP-712 domain version used by both contracts.
pub const DOMAIN_VERSION: &str = "1";

/// Identity of a contract that verifies EIP-712 signatures.
///
/// `name` and `version` must match what the contract hashes into its domain
/// separator, otherwise every signature is rejected on chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractDomain {
    pub name: String,
    pub version: String,
    pub address: Address,
}

impl ContractDomain {
    pub fn new(name: impl Into<String>, address: Address) -> Self {
        Self {
            name: name.into(),
            version: DOMAIN_VERSION.to_string(),
            address,
        }
    }

    /// The PAI token on Mumbai.
    pub fn pai_token() -> Self {
        Self::new(PAI_TOKEN_NAME, PAI_TOKEN_ADDRESS)
    }
}

/// Token balance snapshot for a wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBalance {
    /// Balance in base units
    pub balance_raw: U256,
    /// Balance with decimals applied (not grouped, not truncated)
    pub balance_formatted: String,
    /// Number of decimals
    pub decimals: u8,
}

/// Which side of a `Transfer` event the watched wallet is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Sent,
    Received,
    SelfTransfer,
}

/// Filter for `Transfer` events of the token contract.
///
/// Exactly one side is normally set; the sync component watches one filter
/// per side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferFilter {
    /// Transfers whose `from` is the address
    From(Address),
    /// Transfers whose `to` is the address
    To(Address),
}

impl TransferFilter {
    pub fn address(&self) -> Address {
        match self {
            Self::From(addr) | Self::To(addr) => *addr,
        }
    }

    /// Whether a decoded transfer satisfies this filter.
    pub fn matches(&self, from: Address, to: Address) -> bool {
        match self {
            Self::From(addr) => *addr == from,
            Self::To(addr) => *addr == to,
        }
    }
}

/// A decoded `Transfer(address,address,uint256)` log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferLog {
    pub tx_hash: B256,
    pub log_index: u64,
    pub block_number: u64,
    pub from: Address,
    pub to: Address,
    pub value: U256,
}

/// A transfer as shown in the wallet history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub tx_hash: B256,
    pub log_index: u64,
    pub block_number: u64,
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub direction: Direction,
}

impl TransferRecord {
    /// Classify a log relative to the wallet `owner`.
    pub fn from_log(log: TransferLog, owner: Address) -> Self {
        let direction = match (log.from == owner, log.to == owner) {
            (true, true) => Direction::SelfTransfer,
            (true, false) => Direction::Sent,
            _ => Direction::Received,
        };
        Self {
            tx_hash: log.tx_hash,
            log_index: log.log_index,
            block_number: log.block_number,
            from: log.from,
            to: log.to,
            value: log.value,
            direction,
        }
    }
}
