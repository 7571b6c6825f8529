// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! EIP-712 typed-data signing for gasless payments.
//!
//! A payment carries two signatures over the same amount and deadline:
//!
//! - an ERC-2612 `Permit` against the token domain, letting the clearing
//!   contract pull the funds, and
//! - a `pay` authorization against the clearing contract domain, naming the
//!   receiver and the relayer allowed to submit it.
//!
//! The struct hashes and domain separators are produced by alloy's
//! [`SolStruct`] implementation, so the encoding is exactly what the
//! verifying contracts compute. Signing is RFC 6979 deterministic.

use alloy::{
    primitives::{Address, Signature, B256, U256},
    signers::{
        local::{coins_bip39::English, MnemonicBuilder, PrivateKeySigner},
        SignerSync,
    },
    sol,
    sol_types::{eip712_domain, Eip712Domain, SolStruct},
};
use k256::SecretKey;
use serde::{Deserialize, Serialize};

use super::types::ContractDomain;

sol! {
    /// ERC-2612 permit message.
    #[derive(Debug, PartialEq, Eq)]
    struct Permit {
        address owner;
        address spender;
        uint256 value;
        uint256 nonce;
        uint256 deadline;
    }

    /// Clearing contract transfer authorization. The type name is part of
    /// the type hash and must stay lowercase.
    #[allow(non_camel_case_types)]
    #[derive(Debug, PartialEq, Eq)]
    struct pay {
        address sender;
        address receiver;
        uint256 amount;
        uint256 fee;
        uint256 nonce;
        uint256 expiry;
        address relayer;
    }
}

/// Values signed by the token holder to approve the clearing contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermitAuthorization {
    pub owner: Address,
    pub spender: Address,
    pub value: U256,
    pub nonce: U256,
    pub deadline: U256,
}

impl From<&PermitAuthorization> for Permit {
    fn from(auth: &PermitAuthorization) -> Self {
        Permit {
            owner: auth.owner,
            spender: auth.spender,
            value: auth.value,
            nonce: auth.nonce,
            deadline: auth.deadline,
        }
    }
}

/// Values signed by the token holder to authorize one relayed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferAuthorization {
    pub sender: Address,
    pub receiver: Address,
    pub amount: U256,
    pub fee: U256,
    pub nonce: U256,
    pub expiry: U256,
    pub relayer: Address,
}

impl From<&TransferAuthorization> for pay {
    fn from(auth: &TransferAuthorization) -> Self {
        pay {
            sender: auth.sender,
            receiver: auth.receiver,
            amount: auth.amount,
            fee: auth.fee,
            nonce: auth.nonce,
            expiry: auth.expiry,
            relayer: auth.relayer,
        }
    }
}

/// A 65-byte ECDSA signature split into `r`, `s` and `v` (27 or 28).
///
/// Serializes as `{"r": "0x..", "s": "0x..", "v": 27}`, the shape the relayer
/// feeds into `permit(..., v, r, s)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RsvSignature {
    pub r: B256,
    pub s: B256,
    pub v: u8,
}

impl From<Signature> for RsvSignature {
    fn from(sig: Signature) -> Self {
        Self {
            r: B256::from(sig.r().to_be_bytes::<32>()),
            s: B256::from(sig.s().to_be_bytes::<32>()),
            v: 27 + u8::from(sig.v()),
        }
    }
}

impl RsvSignature {
    /// Concatenated `r || s || v`.
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[..32].copy_from_slice(self.r.as_slice());
        out[32..64].copy_from_slice(self.s.as_slice());
        out[64] = self.v;
        out
    }

    /// `0x`-prefixed hex of [`Self::to_bytes`].
    pub fn to_hex(&self) -> String {
        format!("0x{}", alloy::hex::encode(self.to_bytes()))
    }

    /// Recover the signing address for a given EIP-712 hash.
    pub fn recover(&self, hash: &B256) -> Result<Address, SigningError> {
        let sig = Signature::from_raw(&self.to_bytes())
            .map_err(|e| SigningError::Signer(format!("invalid signature: {e}")))?;
        sig.recover_address_from_prehash(hash)
            .map_err(|e| SigningError::Signer(format!("recovery failed: {e}")))
    }
}

/// Build the EIP-712 domain of a verifying contract.
pub fn domain(chain_id: u64, contract: &ContractDomain) -> Eip712Domain {
    eip712_domain! {
        name: contract.name.clone(),
        version: contract.version.clone(),
        chain_id: chain_id,
        verifying_contract: contract.address,
    }
}

/// EIP-712 signing hash of a permit under the token domain.
pub fn permit_signing_hash(chain_id: u64, token: &ContractDomain, auth: &PermitAuthorization) -> B256 {
    Permit::from(auth).eip712_signing_hash(&domain(chain_id, token))
}

/// EIP-712 signing hash of a transfer authorization under the clearing domain.
pub fn transfer_signing_hash(
    chain_id: u64,
    clearing: &ContractDomain,
    auth: &TransferAuthorization,
) -> B256 {
    pay::from(auth).eip712_signing_hash(&domain(chain_id, clearing))
}

/// Sign an ERC-2612 permit.
pub fn sign_permit(
    chain_id: u64,
    token: &ContractDomain,
    auth: &PermitAuthorization,
    signer: &PrivateKeySigner,
) -> Result<RsvSignature, SigningError> {
    let hash = permit_signing_hash(chain_id, token, auth);
    sign_hash(signer, &hash)
}

/// Sign a clearing contract `pay` authorization.
pub fn sign_transfer_authorization(
    chain_id: u64,
    clearing: &ContractDomain,
    auth: &TransferAuthorization,
    signer: &PrivateKeySigner,
) -> Result<RsvSignature, SigningError> {
    let hash = transfer_signing_hash(chain_id, clearing, auth);
    sign_hash(signer, &hash)
}

fn sign_hash(signer: &PrivateKeySigner, hash: &B256) -> Result<RsvSignature, SigningError> {
    signer
        .sign_hash_sync(hash)
        .map(RsvSignature::from)
        .map_err(|e| SigningError::Signer(e.to_string()))
}

/// Parse stored key material into a signer.
///
/// Accepts a PEM private key, a BIP-39 phrase (first account of the standard
/// Ethereum path) or a hex private key.
pub fn signer_from_key_material(material: &str) -> Result<PrivateKeySigner, SigningError> {
    let material = material.trim();
    if material.starts_with("-----BEGIN") {
        signer_from_pem(material.as_bytes())
    } else if material.split_whitespace().count() > 1 {
        signer_from_mnemonic(material)
    } else {
        signer_from_hex(material)
    }
}

/// Create a signer from a hex private key, with or without `0x`.
pub fn signer_from_hex(private_key_hex: &str) -> Result<PrivateKeySigner, SigningError> {
    let stripped = private_key_hex
        .strip_prefix("0x")
        .unwrap_or(private_key_hex);
    let key_bytes =
        alloy::hex::decode(stripped).map_err(|e| SigningError::InvalidKey(e.to_string()))?;

    PrivateKeySigner::from_slice(&key_bytes).map_err(|e| SigningError::InvalidKey(e.to_string()))
}

/// Create a signer from a BIP-39 phrase at `m/44'/60'/0'/0/0`.
pub fn signer_from_mnemonic(phrase: &str) -> Result<PrivateKeySigner, SigningError> {
    MnemonicBuilder::<English>::default()
        .phrase(phrase)
        .index(0u32)
        .map_err(|e| SigningError::InvalidKey(e.to_string()))?
        .build()
        .map_err(|e| SigningError::InvalidKey(e.to_string()))
}

/// Parse a private key from PEM format to hex string.
///
/// Both SEC1 (`EC PRIVATE KEY`) and PKCS#8 (`PRIVATE KEY`) encodings are
/// accepted. The result is 64 hex characters without `0x`.
pub fn pem_to_hex(pem_bytes: &[u8]) -> Result<String, SigningError> {
    let pem_str = std::str::from_utf8(pem_bytes)
        .map_err(|e| SigningError::InvalidKey(format!("Invalid UTF-8: {}", e)))?;

    let pem = pem::parse(pem_str)
        .map_err(|e| SigningError::InvalidKey(format!("Invalid PEM: {}", e)))?;

    let secret_key = SecretKey::from_sec1_der(pem.contents())
        .or_else(|_| parse_pkcs8_to_secret_key(pem.contents()))
        .map_err(|e| SigningError::InvalidKey(format!("Invalid key format: {}", e)))?;

    Ok(alloy::hex::encode(secret_key.to_bytes()))
}

fn parse_pkcs8_to_secret_key(der: &[u8]) -> Result<SecretKey, String> {
    use k256::pkcs8::DecodePrivateKey;
    SecretKey::from_pkcs8_der(der).map_err(|e| e.to_string())
}

/// Create a signer from a PEM-encoded private key.
pub fn signer_from_pem(pem_bytes: &[u8]) -> Result<PrivateKeySigner, SigningError> {
    let hex_key = pem_to_hex(pem_bytes)?;
    signer_from_hex(&hex_key)
}

/// Errors raised while loading keys or signing.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SigningError {
    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    #[error("Signer error: {0}")]
    Signer(String),
}
