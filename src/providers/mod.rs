// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Remote services the payment core talks to over HTTP.

pub mod relayer;

pub use relayer::{RelayPayload, RelayResponse, RelayerClient, RelayerError};
