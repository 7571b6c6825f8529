// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Gasless payment flow.
//!
//! [`PayflowState`] holds what the user entered and where the attempt stands;
//! [`PaymentFlow`] drives one attempt from confirmation to a terminal state.

pub mod machine;
pub mod state;

pub use machine::{ConfirmOutcome, PaymentFlow, Submission, DEADLINE_WINDOW_SECS};
pub use state::{PayflowAction, PayflowState, Recipient, TxStatus, ValidatedPayment};
