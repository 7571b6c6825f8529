// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! by the payment core. Hosts either call [`PayflowConfig::from_env`] at
//! startup or build a config in code with [`PayflowConfig::new`].
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `PAI_RPC_URL` | JSON-RPC endpoint of the L2 chain | Polygon Mumbai public RPC |
//! | `PAI_TOKEN_ADDRESS` | Token contract, verifying contract of the permit | PAI on Mumbai |
//! | `PAI_TOKEN_NAME` | EIP-712 domain name of the token | `Peso Argentino Intangible` |
//! | `PAI_CLEARING_ADDRESS` | Clearing contract, permit spender and `pay` verifying contract | Required |
//! | `PAI_CLEARING_NAME` | EIP-712 domain name of the clearing contract | `ACH` |
//! | `PAI_RELAYER_URL` | Relayer POST endpoint | Required |
//! | `PAI_RELAYER_TIMEOUT_SECS` | Client-side relayer timeout | `35` |
//! | `PAI_HISTORY_WINDOW_BLOCKS` | Block span of one history window | `10000` |
//! | `PAI_HISTORY_MAX_WINDOWS` | Windows scanned per history refresh | `3` |
//! | `PAI_POLL_INTERVAL_SECS` | Transfer event polling interval | `5` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |
//!
//! The signature deadline window is not configurable; see
//! [`crate::payflow::DEADLINE_WINDOW_SECS`].

use std::env;
use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::Address;
use url::Url;

use crate::blockchain::{
    ContractDomain, DEFAULT_CLEARING_NAME, DEFAULT_RPC_URL, PAI_TOKEN_ADDRESS, PAI_TOKEN_NAME,
};
use crate::indexer::events::DEFAULT_POLL_INTERVAL;
use crate::indexer::history::{DEFAULT_MAX_WINDOWS, DEFAULT_WINDOW_BLOCKS};
use crate::providers::relayer::DEFAULT_RELAYER_TIMEOUT;

pub const RPC_URL_ENV: &str = "PAI_RPC_URL";
pub const TOKEN_ADDRESS_ENV: &str = "PAI_TOKEN_ADDRESS";
pub const TOKEN_NAME_ENV: &str = "PAI_TOKEN_NAME";
pub const CLEARING_ADDRESS_ENV: &str = "PAI_CLEARING_ADDRESS";
pub const CLEARING_NAME_ENV: &str = "PAI_CLEARING_NAME";
pub const RELAYER_URL_ENV: &str = "PAI_RELAYER_URL";
pub const RELAYER_TIMEOUT_ENV: &str = "PAI_RELAYER_TIMEOUT_SECS";
pub const HISTORY_WINDOW_ENV: &str = "PAI_HISTORY_WINDOW_BLOCKS";
pub const HISTORY_MAX_WINDOWS_ENV: &str = "PAI_HISTORY_MAX_WINDOWS";
pub const POLL_INTERVAL_ENV: &str = "PAI_POLL_INTERVAL_SECS";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Invalid {
                var: LOG_FORMAT_ENV,
                reason: format!("expected `json` or `pretty`, got `{other}`"),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Everything needed to wire the payment flow and the sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayflowConfig {
    pub rpc_url: Url,
    pub token: ContractDomain,
    pub clearing: ContractDomain,
    pub relayer_url: Url,
    pub relayer_timeout: Duration,
    pub history_window_blocks: u64,
    pub history_max_windows: u32,
    pub poll_interval: Duration,
    pub log_format: LogFormat,
}

impl PayflowConfig {
    /// Config with defaults for everything except the two deployment-specific
    /// values.
    pub fn new(clearing_address: Address, relayer_url: Url) -> Result<Self, ConfigError> {
        let rpc_url = parse_url(RPC_URL_ENV, DEFAULT_RPC_URL)?;
        Ok(Self {
            rpc_url,
            token: ContractDomain::new(PAI_TOKEN_NAME, PAI_TOKEN_ADDRESS),
            clearing: ContractDomain::new(DEFAULT_CLEARING_NAME, clearing_address),
            relayer_url,
            relayer_timeout: DEFAULT_RELAYER_TIMEOUT,
            history_window_blocks: DEFAULT_WINDOW_BLOCKS,
            history_max_windows: DEFAULT_MAX_WINDOWS,
            poll_interval: DEFAULT_POLL_INTERVAL,
            log_format: LogFormat::default(),
        })
    }

    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from any key lookup; `from_env` with an injectable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let clearing_address = get(CLEARING_ADDRESS_ENV)
            .ok_or(ConfigError::Missing(CLEARING_ADDRESS_ENV))
            .and_then(|v| parse_address(CLEARING_ADDRESS_ENV, &v))?;
        let relayer_url = get(RELAYER_URL_ENV)
            .ok_or(ConfigError::Missing(RELAYER_URL_ENV))
            .and_then(|v| parse_url(RELAYER_URL_ENV, &v))?;

        let mut config = Self::new(clearing_address, relayer_url)?;

        if let Some(v) = get(RPC_URL_ENV) {
            config.rpc_url = parse_url(RPC_URL_ENV, &v)?;
        }
        if let Some(v) = get(TOKEN_ADDRESS_ENV) {
            config.token.address = parse_address(TOKEN_ADDRESS_ENV, &v)?;
        }
        if let Some(v) = get(TOKEN_NAME_ENV) {
            config.token.name = v;
        }
        if let Some(v) = get(CLEARING_NAME_ENV) {
            config.clearing.name = v;
        }
        if let Some(v) = get(RELAYER_TIMEOUT_ENV) {
            config.relayer_timeout = Duration::from_secs(parse_positive(RELAYER_TIMEOUT_ENV, &v)?);
        }
        if let Some(v) = get(HISTORY_WINDOW_ENV) {
            config.history_window_blocks = parse_positive(HISTORY_WINDOW_ENV, &v)?;
        }
        if let Some(v) = get(HISTORY_MAX_WINDOWS_ENV) {
            config.history_max_windows = parse_positive(HISTORY_MAX_WINDOWS_ENV, &v)?;
        }
        if let Some(v) = get(POLL_INTERVAL_ENV) {
            config.poll_interval = Duration::from_secs(parse_positive(POLL_INTERVAL_ENV, &v)?);
        }
        if let Some(v) = get(LOG_FORMAT_ENV) {
            config.log_format = v.parse()?;
        }

        Ok(config)
    }

    pub fn with_rpc_url(mut self, rpc_url: Url) -> Self {
        self.rpc_url = rpc_url;
        self
    }

    pub fn with_token(mut self, token: ContractDomain) -> Self {
        self.token = token;
        self
    }

    pub fn with_clearing_name(mut self, name: impl Into<String>) -> Self {
        self.clearing.name = name.into();
        self
    }

    pub fn with_relayer_timeout(mut self, timeout: Duration) -> Self {
        self.relayer_timeout = timeout;
        self
    }

    pub fn with_history_windows(mut self, window_blocks: u64, max_windows: u32) -> Self {
        self.history_window_blocks = window_blocks;
        self.history_max_windows = max_windows;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

fn parse_url(var: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value.trim()).map_err(|e| ConfigError::Invalid {
        var,
        reason: e.to_string(),
    })
}

fn parse_address(var: &'static str, value: &str) -> Result<Address, ConfigError> {
    Address::from_str(value.trim()).map_err(|e| ConfigError::Invalid {
        var,
        reason: e.to_string(),
    })
}

fn parse_positive<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr + PartialEq + Default,
    T::Err: std::fmt::Display,
{
    let parsed: T = value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        reason: e.to_string(),
    })?;
    if parsed == T::default() {
        return Err(ConfigError::Invalid {
            var,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use alloy::primitives::address;

    use super::*;

    const CLEARING: &str = "0x1111111111111111111111111111111111111111";

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_with_required_values() {
        let config = PayflowConfig::from_lookup(lookup(&[
            (CLEARING_ADDRESS_ENV, CLEARING),
            (RELAYER_URL_ENV, "https://relayer.example/api/pay"),
        ]))
        .unwrap();

        assert_eq!(config.rpc_url, Url::parse(DEFAULT_RPC_URL).unwrap());
        assert_eq!(config.clearing.address, address!("1111111111111111111111111111111111111111"));
        assert_eq!(config.clearing.name, "ACH");
        assert_eq!(config.token, ContractDomain::pai_token());
        assert_eq!(config.relayer_timeout, Duration::from_secs(35));
        assert_eq!(config.history_window_blocks, 10_000);
        assert_eq!(config.history_max_windows, 3);
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn missing_required_values() {
        let err = PayflowConfig::from_lookup(lookup(&[(RELAYER_URL_ENV, "https://r.example")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::Missing(CLEARING_ADDRESS_ENV));

        let err =
            PayflowConfig::from_lookup(lookup(&[(CLEARING_ADDRESS_ENV, CLEARING)])).unwrap_err();
        assert_eq!(err, ConfigError::Missing(RELAYER_URL_ENV));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = PayflowConfig::from_lookup(lookup(&[
            (CLEARING_ADDRESS_ENV, CLEARING),
            (CLEARING_NAME_ENV, "Clearing"),
            (RELAYER_URL_ENV, "https://r.example"),
            (RELAYER_TIMEOUT_ENV, "10"),
            (HISTORY_WINDOW_ENV, "5000"),
            (HISTORY_MAX_WINDOWS_ENV, "4"),
            (LOG_FORMAT_ENV, "JSON"),
        ]))
        .unwrap();

        assert_eq!(config.clearing.name, "Clearing");
        assert_eq!(config.relayer_timeout, Duration::from_secs(10));
        assert_eq!(config.history_window_blocks, 5_000);
        assert_eq!(config.history_max_windows, 4);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn rejects_invalid_values() {
        let base = [
            (CLEARING_ADDRESS_ENV, CLEARING),
            (RELAYER_URL_ENV, "https://r.example"),
        ];

        let mut pairs = base.to_vec();
        pairs.push((RELAYER_TIMEOUT_ENV, "0"));
        assert!(matches!(
            PayflowConfig::from_lookup(lookup(&pairs)),
            Err(ConfigError::Invalid { var: RELAYER_TIMEOUT_ENV, .. })
        ));

        let mut pairs = base.to_vec();
        pairs.push((TOKEN_ADDRESS_ENV, "0x1234"));
        assert!(matches!(
            PayflowConfig::from_lookup(lookup(&pairs)),
            Err(ConfigError::Invalid { var: TOKEN_ADDRESS_ENV, .. })
        ));

        let mut pairs = base.to_vec();
        pairs.push((LOG_FORMAT_ENV, "xml"));
        assert!(matches!(
            PayflowConfig::from_lookup(lookup(&pairs)),
            Err(ConfigError::Invalid { var: LOG_FORMAT_ENV, .. })
        ));
    }

    #[test]
    fn builder_setters() {
        let config = PayflowConfig::new(
            address!("1111111111111111111111111111111111111111"),
            Url::parse("https://r.example").unwrap(),
        )
        .unwrap()
        .with_clearing_name("Other")
        .with_history_windows(100, 1)
        .with_relayer_timeout(Duration::from_secs(1));

        assert_eq!(config.clearing.name, "Other");
        assert_eq!(config.history_window_blocks, 100);
        assert_eq!(config.relayer_timeout, Duration::from_secs(1));
    }
}
