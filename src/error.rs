// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Error taxonomy of the payment core.
//!
//! `InvalidAmount` and `Precondition` are raised synchronously before any
//! I/O or state transition. Everything else happens while a payment is in
//! flight and ends the attempt in the ERROR state; [`PayflowError::kind`]
//! keeps the cause alongside the human-readable message.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::blockchain::{ChainError, SigningError};
use crate::currency::AmountError;
use crate::providers::relayer::RelayerError;

/// Transport-level failures talking to the relayer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    #[error("relayer did not answer within {0:?}")]
    Timeout(Duration),

    #[error("relayer request failed: {0}")]
    Transport(String),
}

/// Missing or invalid input detected before a payment starts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PreconditionError {
    #[error("no wallet is loaded")]
    MissingWallet,

    #[error("no amount entered")]
    MissingAmount,

    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("no recipient selected")]
    MissingRecipient,

    #[error("recipient address `{0}` is not a 20-byte hex address")]
    InvalidRecipient(String),

    #[error("payment attempt already finished; restart the flow")]
    AttemptFinished,

    #[error("payment details cannot change while a payment is in progress")]
    Locked,
}

/// Any failure of the payment core.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PayflowError {
    #[error("invalid amount: {0}")]
    InvalidAmount(#[from] AmountError),

    #[error("precondition failed: {0}")]
    Precondition(#[from] PreconditionError),

    #[error("signing failed: {0}")]
    Signing(#[from] SigningError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error("relayer rejected payment [status:{status}]")]
    Relay { status: u16 },

    #[error("chain read failed: {0}")]
    ChainRead(#[from] ChainError),
}

impl From<RelayerError> for PayflowError {
    fn from(e: RelayerError) -> Self {
        match e {
            RelayerError::Network(inner) => Self::Network(inner),
            RelayerError::Rejected { status } => Self::Relay { status },
        }
    }
}

/// Structured cause recorded with the ERROR state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum FailureKind {
    InvalidAmount,
    Precondition,
    Signing,
    Timeout,
    Network,
    Relay { status: u16 },
    ChainRead,
}

impl PayflowError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::InvalidAmount(_) => FailureKind::InvalidAmount,
            Self::Precondition(_) => FailureKind::Precondition,
            Self::Signing(_) => FailureKind::Signing,
            Self::Network(NetworkError::Timeout(_)) => FailureKind::Timeout,
            Self::Network(NetworkError::Transport(_)) => FailureKind::Network,
            Self::Relay { status } => FailureKind::Relay { status: *status },
            Self::ChainRead(_) => FailureKind::ChainRead,
        }
    }
}
