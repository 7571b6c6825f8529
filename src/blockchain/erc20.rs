// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token and clearing contract bindings.

use alloy::{
    primitives::{Address, U256},
    providers::Provider,
    sol,
};

use super::client::ChainError;

// ERC-20 with the ERC-2612 permit extension
sol! {
    #[sol(rpc)]
    interface IERC20Permit {
        event Transfer(address indexed from, address indexed to, uint256 value);

        function name() external view returns (string);
        function decimals() external view returns (uint8);
        function balanceOf(address account) external view returns (uint256);
        function nonces(address owner) external view returns (uint256);
    }
}

// Clearing contract that redeems `pay` authorizations on behalf of the sender
sol! {
    #[sol(rpc)]
    interface IClearing {
        function nonces(address owner) external view returns (uint256);
    }
}

/// Read-only wrapper around the PAI token contract.
pub struct Erc20Contract<P> {
    contract: IERC20Permit::IERC20PermitInstance<P>,
}

impl<P: Provider + Clone> Erc20Contract<P> {
    pub fn new(provider: &P, address: Address) -> Self {
        Self {
            contract: IERC20Permit::new(address, provider.clone()),
        }
    }

    /// Get the token name.
    pub async fn name(&self) -> Result<String, ChainError> {
        self.contract
            .name()
            .call()
            .await
            .map_err(|e| ChainError::Contract(e.to_string()))
    }

    /// Get the token decimals.
    pub async fn decimals(&self) -> Result<u8, ChainError> {
        self.contract
            .decimals()
            .call()
            .await
            .map_err(|e| ChainError::Contract(e.to_string()))
    }

    /// Get the balance of an address in base units.
    pub async fn balance_of(&self, owner: Address) -> Result<U256, ChainError> {
        self.contract
            .balanceOf(owner)
            .call()
            .await
            .map_err(|e| ChainError::Contract(e.to_string()))
    }

    /// Get the ERC-2612 permit nonce of an address.
    pub async fn nonces(&self, owner: Address) -> Result<U256, ChainError> {
        self.contract
            .nonces(owner)
            .call()
            .await
            .map_err(|e| ChainError::Contract(e.to_string()))
    }
}

/// Read-only wrapper around the clearing contract.
pub struct ClearingContract<P> {
    contract: IClearing::IClearingInstance<P>,
}

impl<P: Provider + Clone> ClearingContract<P> {
    pub fn new(provider: &P, address: Address) -> Self {
        Self {
            contract: IClearing::new(address, provider.clone()),
        }
    }

    /// Get the next `pay` authorization nonce of an address.
    pub async fn nonces(&self, owner: Address) -> Result<U256, ChainError> {
        self.contract
            .nonces(owner)
            .call()
            .await
            .map_err(|e| ChainError::Contract(e.to_string()))
    }
}
