// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Blockchain integration for the PAI token on its L2 network.
//!
//! This module provides functionality for:
//! - Reading balances, nonces, decimals and block data
//! - Querying token `Transfer` logs by block range
//! - EIP-712 signing of permits and transfer authorizations

pub mod client;
pub mod erc20;
pub mod signing;
pub mod types;

pub use client::{ChainError, ChainReader, PaiChainClient};
pub use signing::{
    PermitAuthorization, RsvSignature, SigningError, TransferAuthorization,
};
pub use types::*;
