// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet bootstrap.
//!
//! The app owns exactly one key for its whole lifetime. It is generated on
//! first launch, written to secure storage under [`MNEMONIC_KEY`], and read
//! back on every later launch. A wallet is only re-created when the storage
//! has been cleared.

use std::fmt;

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use tracing::info;

use crate::blockchain::signing::signer_from_key_material;
use crate::blockchain::SigningError;
use crate::storage::{SecureStorage, StoreError, MNEMONIC_KEY};

/// The holder's signing key and derived address.
#[derive(Clone)]
pub struct Wallet {
    signer: PrivateKeySigner,
}

// Never print key material
impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

impl Wallet {
    pub fn from_signer(signer: PrivateKeySigner) -> Self {
        Self { signer }
    }

    /// Parse stored key material (PEM, BIP-39 phrase or hex key).
    pub fn from_key_material(material: &str) -> Result<Self, WalletError> {
        Ok(Self::from_signer(signer_from_key_material(material)?))
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }

    /// Read the wallet from secure storage, creating and persisting a new
    /// key if none exists yet.
    pub fn load_or_create(storage: &dyn SecureStorage) -> Result<Self, WalletError> {
        if let Some(material) = storage.get(MNEMONIC_KEY)? {
            let wallet = Self::from_key_material(&material)?;
            info!(address = %wallet.address(), "Loaded wallet from secure storage");
            return Ok(wallet);
        }

        let (signer, pem) = generate_signer()?;
        storage.set(MNEMONIC_KEY, &pem)?;

        let wallet = Self::from_signer(signer);
        info!(address = %wallet.address(), "Created new wallet");
        Ok(wallet)
    }
}

/// Generate a fresh secp256k1 key and its PKCS#8 PEM encoding.
fn generate_signer() -> Result<(PrivateKeySigner, String), WalletError> {
    use k256::pkcs8::{EncodePrivateKey, LineEnding};

    let signer = PrivateKeySigner::random();
    let pem = signer
        .credential()
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| WalletError::KeyGeneration(e.to_string()))?;

    Ok((signer, pem.to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("secure storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("stored key material is invalid: {0}")]
    InvalidKey(#[from] SigningError),

    #[error("key generation failed: {0}")]
    KeyGeneration(String),
}
