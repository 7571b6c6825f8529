// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Payment flow state and its reducer.

use std::str::FromStr;

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::currency;
use crate::error::{FailureKind, PayflowError, PreconditionError};
use crate::providers::RelayResponse;
use crate::wallet::Wallet;

/// Payment recipient.
///
/// Identity is the address; `id` and `name` come from the address book and
/// are display hints only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub address: String,
}

impl Recipient {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            address: address.into(),
        }
    }

    /// Name to show, falling back to the shortened address.
    pub fn display_name(&self) -> String {
        if self.name.trim().is_empty() {
            currency::shorten_address(&self.address)
        } else {
            self.name.clone()
        }
    }

    fn parsed_address(&self) -> Result<Address, PreconditionError> {
        let raw = self.address.trim();
        let hex = raw.strip_prefix("0x").unwrap_or(raw);
        if hex.len() != 40 {
            return Err(PreconditionError::InvalidRecipient(self.address.clone()));
        }
        Address::from_str(raw).map_err(|_| PreconditionError::InvalidRecipient(self.address.clone()))
    }
}

/// Lifecycle of one payment attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxStatus {
    #[default]
    Undefined,
    InProgress,
    Success,
    Error,
}

impl TxStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }
}

/// Inputs accepted by [`PayflowState::apply`].
#[derive(Debug, Clone)]
pub enum PayflowAction {
    SetRecipient(Recipient),
    SetAmount(String),
    SetMemo(Option<String>),
    /// UNDEFINED -> IN_PROGRESS, opening a new attempt id
    Start,
    Progress { attempt: u64, value: f64 },
    /// IN_PROGRESS -> SUCCESS
    Succeeded { attempt: u64, receipt: RelayResponse },
    /// IN_PROGRESS -> ERROR
    Failed {
        attempt: u64,
        message: String,
        kind: FailureKind,
    },
}

/// State of the payment screen, owned by one [`super::PaymentFlow`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PayflowState {
    pub recipient: Option<Recipient>,
    pub amount: Option<String>,
    pub memo: Option<String>,
    pub tx_status: TxStatus,
    pub error: Option<String>,
    /// Structured cause of `error`
    pub failure: Option<FailureKind>,
    pub receipt: Option<RelayResponse>,
    /// Advisory completion fraction in `[0, 1]`
    pub progress: f64,
    /// Id of the current or last attempt; survives a reset
    pub attempt: u64,
}

/// Inputs of a payment that passed the synchronous checks.
#[derive(Debug, Clone)]
pub struct ValidatedPayment {
    pub wallet: Wallet,
    pub recipient: Address,
    pub amount: String,
    pub memo: Option<String>,
    /// Attempt this payment belongs to, assigned on start
    pub attempt: u64,
}

impl PayflowState {
    /// Apply `action` in place.
    ///
    /// Payment details can only change before the attempt starts. Progress
    /// and completion are ignored unless they belong to the running attempt,
    /// so a late result can never move another attempt.
    pub fn apply(&mut self, action: PayflowAction) -> Result<(), PreconditionError> {
        match action {
            PayflowAction::SetRecipient(recipient) => {
                self.ensure_editable()?;
                self.recipient = Some(recipient);
            }
            PayflowAction::SetAmount(amount) => {
                self.ensure_editable()?;
                self.amount = Some(amount);
            }
            PayflowAction::SetMemo(memo) => {
                self.ensure_editable()?;
                self.memo = memo.filter(|m| !m.trim().is_empty());
            }
            PayflowAction::Start => match self.tx_status {
                TxStatus::Undefined => {
                    self.attempt += 1;
                    self.tx_status = TxStatus::InProgress;
                    self.error = None;
                    self.failure = None;
                    self.progress = 0.0;
                }
                TxStatus::InProgress => return Err(PreconditionError::Locked),
                TxStatus::Success | TxStatus::Error => {
                    return Err(PreconditionError::AttemptFinished)
                }
            },
            PayflowAction::Progress { attempt, value } => {
                if self.is_running(attempt) {
                    self.progress = self.progress.max(value.clamp(0.0, 1.0));
                }
            }
            PayflowAction::Succeeded { attempt, receipt } => {
                if !self.is_running(attempt) {
                    debug!(
                        attempt,
                        current = self.attempt,
                        status = ?self.tx_status,
                        "Ignoring success outside its attempt"
                    );
                    return Ok(());
                }
                self.tx_status = TxStatus::Success;
                self.receipt = Some(receipt);
                self.progress = 1.0;
            }
            PayflowAction::Failed {
                attempt,
                message,
                kind,
            } => {
                if !self.is_running(attempt) {
                    debug!(
                        attempt,
                        current = self.attempt,
                        status = ?self.tx_status,
                        "Ignoring failure outside its attempt"
                    );
                    return Ok(());
                }
                self.tx_status = TxStatus::Error;
                self.error = Some(message);
                self.failure = Some(kind);
                self.progress = 1.0;
            }
        }
        Ok(())
    }

    fn is_running(&self, attempt: u64) -> bool {
        self.tx_status == TxStatus::InProgress && self.attempt == attempt
    }

    /// Fresh inputs for a new session, keeping the attempt counter so ids
    /// are never reused.
    pub fn reset(&mut self) {
        *self = Self {
            attempt: self.attempt,
            ..Self::default()
        };
    }

    fn ensure_editable(&self) -> Result<(), PreconditionError> {
        match self.tx_status {
            TxStatus::Undefined => Ok(()),
            TxStatus::InProgress => Err(PreconditionError::Locked),
            TxStatus::Success | TxStatus::Error => Err(PreconditionError::AttemptFinished),
        }
    }

    /// Local checks run before any I/O: wallet, amount and recipient.
    pub fn validate(&self, wallet: Option<Wallet>) -> Result<ValidatedPayment, PayflowError> {
        let wallet = wallet.ok_or(PreconditionError::MissingWallet)?;

        let amount = self
            .amount
            .as_deref()
            .filter(|a| !a.is_empty())
            .ok_or(PreconditionError::MissingAmount)?;
        // Grammar and sign; the real scale is only known once decimals are read
        currency::to_base_units(amount, 0)?;
        if amount.chars().all(|c| c == '0' || c == '.') {
            return Err(PreconditionError::ZeroAmount.into());
        }

        let recipient = self
            .recipient
            .as_ref()
            .ok_or(PreconditionError::MissingRecipient)?
            .parsed_address()?;

        Ok(ValidatedPayment {
            wallet,
            recipient,
            amount: amount.to_string(),
            memo: self.memo.clone(),
            attempt: self.attempt,
        })
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::address;

    use super::*;
    use crate::currency::AmountError;

    fn wallet() -> Wallet {
        Wallet::from_key_material(
            "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
        )
        .unwrap()
    }

    fn ready() -> PayflowState {
        let mut state = PayflowState::default();
        state
            .apply(PayflowAction::SetRecipient(Recipient::new(
                "Ana",
                "0x2222222222222222222222222222222222222222",
            )))
            .unwrap();
        state.apply(PayflowAction::SetAmount("12.5".into())).unwrap();
        state
    }

    fn relay_ok() -> RelayResponse {
        RelayResponse {
            status: 200,
            transaction_hash: None,
        }
    }

    #[test]
    fn validate_accepts_complete_input() {
        let payment = ready().validate(Some(wallet())).unwrap();
        assert_eq!(payment.recipient, address!("2222222222222222222222222222222222222222"));
        assert_eq!(payment.amount, "12.5");
    }

    #[test]
    fn validate_reports_missing_pieces_in_order() {
        let state = ready();
        assert!(matches!(
            state.validate(None),
            Err(PayflowError::Precondition(PreconditionError::MissingWallet))
        ));

        let mut no_amount = ready();
        no_amount.amount = Some(String::new());
        assert!(matches!(
            no_amount.validate(Some(wallet())),
            Err(PayflowError::Precondition(PreconditionError::MissingAmount))
        ));

        let mut no_recipient = ready();
        no_recipient.recipient = None;
        assert!(matches!(
            no_recipient.validate(Some(wallet())),
            Err(PayflowError::Precondition(PreconditionError::MissingRecipient))
        ));
    }

    #[test]
    fn validate_rejects_bad_amounts() {
        let mut state = ready();
        for bad in ["abc", "1.2.3", "+1", "1,000", " 1", "1 ", "  "] {
            state.amount = Some(bad.into());
            assert!(matches!(
                state.validate(Some(wallet())),
                Err(PayflowError::InvalidAmount(AmountError::Malformed(_)))
            ));
        }

        state.amount = Some("-5".into());
        assert!(matches!(
            state.validate(Some(wallet())),
            Err(PayflowError::InvalidAmount(AmountError::Negative(_)))
        ));

        state.amount = Some("0.00".into());
        assert!(matches!(
            state.validate(Some(wallet())),
            Err(PayflowError::Precondition(PreconditionError::ZeroAmount))
        ));
    }

    #[test]
    fn validate_rejects_short_address() {
        let mut state = ready();
        state.recipient = Some(Recipient::new("Bob", "0x1234"));
        assert!(matches!(
            state.validate(Some(wallet())),
            Err(PayflowError::Precondition(PreconditionError::InvalidRecipient(_)))
        ));
    }

    #[test]
    fn edits_are_locked_once_started() {
        let mut state = ready();
        state.apply(PayflowAction::Start).unwrap();

        assert_eq!(
            state.apply(PayflowAction::SetAmount("1".into())),
            Err(PreconditionError::Locked)
        );
        assert_eq!(state.apply(PayflowAction::Start), Err(PreconditionError::Locked));
        assert_eq!(state.amount.as_deref(), Some("12.5"));
    }

    #[test]
    fn terminal_states_do_not_move() {
        let mut state = ready();
        state.apply(PayflowAction::Start).unwrap();
        state
            .apply(PayflowAction::Succeeded {
                attempt: 1,
                receipt: relay_ok(),
            })
            .unwrap();
        assert_eq!(state.tx_status, TxStatus::Success);

        state
            .apply(PayflowAction::Failed {
                attempt: 1,
                message: "late".into(),
                kind: FailureKind::Network,
            })
            .unwrap();
        assert_eq!(state.tx_status, TxStatus::Success);
        assert_eq!(state.error, None);
        assert_eq!(state.apply(PayflowAction::Start), Err(PreconditionError::AttemptFinished));
    }

    #[test]
    fn completion_requires_in_progress() {
        let mut state = ready();
        state
            .apply(PayflowAction::Succeeded {
                attempt: 0,
                receipt: relay_ok(),
            })
            .unwrap();
        assert_eq!(state.tx_status, TxStatus::Undefined);
    }

    #[test]
    fn results_of_an_earlier_attempt_are_ignored() {
        let mut state = ready();
        state.apply(PayflowAction::Start).unwrap();
        assert_eq!(state.attempt, 1);

        state.reset();
        assert_eq!(state.tx_status, TxStatus::Undefined);
        assert_eq!(state.attempt, 1);

        state
            .apply(PayflowAction::SetRecipient(Recipient::new(
                "Ana",
                "0x2222222222222222222222222222222222222222",
            )))
            .unwrap();
        state.apply(PayflowAction::SetAmount("2".into())).unwrap();
        state.apply(PayflowAction::Start).unwrap();
        assert_eq!(state.attempt, 2);

        state
            .apply(PayflowAction::Progress {
                attempt: 1,
                value: 0.9,
            })
            .unwrap();
        state
            .apply(PayflowAction::Succeeded {
                attempt: 1,
                receipt: relay_ok(),
            })
            .unwrap();
        assert_eq!(state.tx_status, TxStatus::InProgress);
        assert_eq!(state.progress, 0.0);
        assert!(state.receipt.is_none());

        state
            .apply(PayflowAction::Failed {
                attempt: 2,
                message: "relayer rejected payment [status:500]".into(),
                kind: FailureKind::Relay { status: 500 },
            })
            .unwrap();
        assert_eq!(state.tx_status, TxStatus::Error);
    }

    #[test]
    fn progress_never_decreases() {
        let mut state = ready();
        state.apply(PayflowAction::Start).unwrap();
        let progress = |value| PayflowAction::Progress { attempt: 1, value };
        state.apply(progress(0.4)).unwrap();
        state.apply(progress(0.25)).unwrap();
        assert_eq!(state.progress, 0.4);
        state.apply(progress(7.0)).unwrap();
        assert_eq!(state.progress, 1.0);
    }

    #[test]
    fn failure_keeps_message_and_kind() {
        let mut state = ready();
        state.apply(PayflowAction::Start).unwrap();
        state
            .apply(PayflowAction::Failed {
                attempt: 1,
                message: "relayer rejected payment [status:500]".into(),
                kind: FailureKind::Relay { status: 500 },
            })
            .unwrap();

        assert_eq!(state.tx_status, TxStatus::Error);
        assert_eq!(state.failure, Some(FailureKind::Relay { status: 500 }));
        assert!(state.error.as_deref().unwrap().contains("500"));
    }

    #[test]
    fn display_name_falls_back_to_short_address() {
        let named = Recipient::new("Ana", "0x2222222222222222222222222222222222222222");
        assert_eq!(named.display_name(), "Ana");

        let unnamed = Recipient::new("", "0x2222222222222222222222222222222222222222");
        assert_eq!(unnamed.display_name(), currency::shorten_address(&unnamed.address));
    }

    #[test]
    fn status_serializes_screaming_case() {
        assert_eq!(serde_json::to_string(&TxStatus::InProgress).unwrap(), r#""IN_PROGRESS""#);
    }
}
