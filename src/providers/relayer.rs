// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relayer integration for gasless payments.
//!
//! The relayer receives both signatures, calls `permit` on the token and
//! `pay` on the clearing contract, and pays the gas. Success is the HTTP
//! status alone; the response body is only inspected for an optional
//! transaction hash and never decides the outcome.

use std::time::Duration;

use alloy::primitives::{Address, B256, U256};
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{serde_as, DisplayFromStr};
use tracing::{debug, info};
use url::Url;

use crate::blockchain::RsvSignature;
use crate::error::NetworkError;

/// Client-side deadline for one relayer call.
pub const DEFAULT_RELAYER_TIMEOUT: Duration = Duration::from_secs(35);

/// Body of `POST <relayer-url>`.
///
/// Integer fields are decimal strings on the wire.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayPayload {
    pub signer_address: Address,
    pub recipient: Address,
    /// Clearing contract, the spender approved by the permit
    pub spender: Address,
    #[serde_as(as = "DisplayFromStr")]
    pub wei: U256,
    #[serde_as(as = "DisplayFromStr")]
    pub fee: U256,
    /// Clearing contract nonce used in the transfer authorization
    #[serde_as(as = "DisplayFromStr")]
    pub nonce: U256,
    #[serde_as(as = "DisplayFromStr")]
    pub deadline: U256,
    pub permit_signature: RsvSignature,
    pub transfer_signature: RsvSignature,
}

/// Outcome of an accepted relayer call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayResponse {
    pub status: u16,
    /// Hash of the relayed transaction, if the relayer reported one
    pub transaction_hash: Option<B256>,
}

/// Errors returned by [`RelayerClient::submit`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayerError {
    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error("relayer responded with status {status}")]
    Rejected { status: u16 },
}

#[derive(Debug, Clone)]
pub struct RelayerClient {
    endpoint: Url,
    timeout: Duration,
    http: Client,
}

impl RelayerClient {
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, NetworkError> {
        let http = Client::builder()
            .build()
            .map_err(|e| NetworkError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            endpoint,
            timeout,
            http,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// POST `payload` as JSON to the relayer.
    ///
    /// The whole exchange is bounded by the client timeout; when it fires the
    /// in-flight request is dropped, which aborts the connection. Non-2xx
    /// answers are returned as [`RelayerError::Rejected`] and never retried.
    pub async fn submit<T>(&self, payload: &T) -> Result<RelayResponse, RelayerError>
    where
        T: Serialize + ?Sized,
    {
        info!(endpoint = %self.endpoint, "Sending payment to relayer");

        let request = self
            .http
            .post(self.endpoint.clone())
            .header(header::CACHE_CONTROL, "no-cache")
            .json(payload);

        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Ok::<_, reqwest::Error>((status, body))
        };

        let (status, body) = match tokio::time::timeout(self.timeout, exchange).await {
            Err(_) => return Err(NetworkError::Timeout(self.timeout).into()),
            Ok(Err(e)) if e.is_timeout() => return Err(NetworkError::Timeout(self.timeout).into()),
            Ok(Err(e)) => return Err(NetworkError::Transport(e.to_string()).into()),
            Ok(Ok(exchange)) => exchange,
        };

        if !status.is_success() {
            debug!(status = status.as_u16(), body = %body, "Relayer rejected payment");
            return Err(RelayerError::Rejected {
                status: status.as_u16(),
            });
        }

        Ok(RelayResponse {
            status: status.as_u16(),
            transaction_hash: extract_transaction_hash(&body),
        })
    }
}

/// Look for a transaction hash in a relayer response body.
fn extract_transaction_hash(body: &str) -> Option<B256> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["transactionHash", "txHash", "hash"]
        .iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))
        .and_then(|s| s.parse().ok())
}
