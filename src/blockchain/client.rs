// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Chain read access for the payment flow and the transfer sync.
//!
//! The rest of the crate only sees the [`ChainReader`] trait, so tests can run
//! the full payment flow against a stub. [`PaiChainClient`] is the alloy
//! HTTP implementation used in the app.

use alloy::{
    eips::BlockNumberOrTag,
    network::Ethereum,
    primitives::{Address, U256},
    providers::{
        fillers::{BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller},
        Identity, Provider, ProviderBuilder, RootProvider,
    },
    rpc::types::{Filter, Log},
    sol_types::SolEvent,
};
use async_trait::async_trait;

use crate::config::PayflowConfig;

use super::erc20::{ClearingContract, Erc20Contract, IERC20Permit};
use super::types::{TransferFilter, TransferLog};

/// HTTP provider type for the L2 chain (with all fillers).
type HttpProvider = FillProvider<
    JoinFill<
        Identity,
        JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
    >,
    RootProvider<Ethereum>,
>;

/// Read-only chain access needed by the payment core.
///
/// Every method is a suspension point; none of them mutate chain state.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// EIP-155 chain id of the connected network.
    async fn chain_id(&self) -> Result<u64, ChainError>;

    /// Current block height.
    async fn block_number(&self) -> Result<u64, ChainError>;

    /// Unix timestamp (seconds) of the given block.
    async fn block_timestamp(&self, number: u64) -> Result<u64, ChainError>;

    /// Decimals declared by the token contract.
    async fn decimals(&self) -> Result<u8, ChainError>;

    /// Token balance of `owner` in base units.
    async fn balance_of(&self, owner: Address) -> Result<U256, ChainError>;

    /// ERC-2612 permit nonce of `owner` on the token contract.
    async fn permit_nonce(&self, owner: Address) -> Result<U256, ChainError>;

    /// `pay` authorization nonce of `owner` on the clearing contract.
    async fn transfer_nonce(&self, owner: Address) -> Result<U256, ChainError>;

    /// Token `Transfer` logs matching `filter` within `[from_block, to_block]`.
    async fn transfer_logs(
        &self,
        filter: TransferFilter,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<TransferLog>, ChainError>;
}

/// alloy-backed [`ChainReader`] for the PAI token and its clearing contract.
pub struct PaiChainClient {
    provider: HttpProvider,
    token: Address,
    clearing: Address,
}

impl PaiChainClient {
    /// Create a new client against the given RPC endpoint.
    pub fn new(rpc_url: &str, token: Address, clearing: Address) -> Result<Self, ChainError> {
        let url: url::Url = rpc_url
            .parse()
            .map_err(|e: url::ParseError| ChainError::InvalidRpcUrl(e.to_string()))?;

        let provider = ProviderBuilder::new().connect_http(url);

        Ok(Self {
            provider,
            token,
            clearing,
        })
    }

    /// Create a client for the contracts named in `config`.
    pub fn from_config(config: &PayflowConfig) -> Result<Self, ChainError> {
        Self::new(
            config.rpc_url.as_str(),
            config.token.address,
            config.clearing.address,
        )
    }

    /// Token contract address.
    pub fn token(&self) -> Address {
        self.token
    }

    /// Clearing contract address.
    pub fn clearing(&self) -> Address {
        self.clearing
    }

    /// Token name as reported by the contract.
    pub async fn token_name(&self) -> Result<String, ChainError> {
        Erc20Contract::new(&self.provider, self.token).name().await
    }
}

#[async_trait]
impl ChainReader for PaiChainClient {
    async fn chain_id(&self) -> Result<u64, ChainError> {
        self.provider
            .get_chain_id()
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))
    }

    async fn block_timestamp(&self, number: u64) -> Result<u64, ChainError> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(number))
            .await
            .map_err(|e| ChainError::Rpc(format!("Failed to get block: {}", e)))?
            .ok_or(ChainError::MissingBlock(number))?;

        Ok(block.header.timestamp)
    }

    async fn decimals(&self) -> Result<u8, ChainError> {
        Erc20Contract::new(&self.provider, self.token).decimals().await
    }

    async fn balance_of(&self, owner: Address) -> Result<U256, ChainError> {
        Erc20Contract::new(&self.provider, self.token)
            .balance_of(owner)
            .await
    }

    async fn permit_nonce(&self, owner: Address) -> Result<U256, ChainError> {
        Erc20Contract::new(&self.provider, self.token)
            .nonces(owner)
            .await
    }

    async fn transfer_nonce(&self, owner: Address) -> Result<U256, ChainError> {
        ClearingContract::new(&self.provider, self.clearing)
            .nonces(owner)
            .await
    }

    async fn transfer_logs(
        &self,
        filter: TransferFilter,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<TransferLog>, ChainError> {
        let base = Filter::new()
            .address(self.token)
            .event_signature(IERC20Permit::Transfer::SIGNATURE_HASH)
            .from_block(from_block)
            .to_block(to_block);

        let query = match filter {
            TransferFilter::From(addr) => base.topic1(addr.into_word()),
            TransferFilter::To(addr) => base.topic2(addr.into_word()),
        };

        let logs = self
            .provider
            .get_logs(&query)
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))?;

        Ok(logs.iter().filter_map(decode_transfer).collect())
    }
}

/// Decode a raw `Transfer` log; logs that are pending or malformed are skipped.
fn decode_transfer(log: &Log) -> Option<TransferLog> {
    let decoded = match log.log_decode::<IERC20Permit::Transfer>() {
        Ok(decoded) => decoded,
        Err(e) => {
            tracing::warn!(error = %e, "Skipping undecodable Transfer log");
            return None;
        }
    };
    let event = decoded.inner.data;

    Some(TransferLog {
        tx_hash: log.transaction_hash?,
        log_index: log.log_index?,
        block_number: log.block_number?,
        from: event.from,
        to: event.to,
        value: event.value,
    })
}

/// Errors that can occur during chain reads.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChainError {
    #[error("Invalid RPC URL: {0}")]
    InvalidRpcUrl(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Contract error: {0}")]
    Contract(String),

    #[error("Block {0} not found")]
    MissingBlock(u64),
}
