// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Payment state machine.
//!
//! ```text
//! UNDEFINED --confirm--> IN_PROGRESS --+--> SUCCESS
//!                                      +--> ERROR
//! ```
//!
//! [`PaymentFlow::confirm_payment`] only validates and flips the status.
//! The chain reads, signing and relayer call run in a spawned task started
//! by that transition, so the caller returns immediately and observes the
//! outcome through [`PaymentFlow::subscribe`]. There is no cancel and no
//! retry: a finished attempt stays finished until [`PaymentFlow::reset`].

use std::sync::Arc;

use alloy::primitives::U256;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::state::{PayflowAction, PayflowState, Recipient, TxStatus, ValidatedPayment};
use crate::blockchain::signing::{sign_permit, sign_transfer_authorization};
use crate::blockchain::{
    ChainReader, ContractDomain, PermitAuthorization, RsvSignature, TransferAuthorization,
};
use crate::config::PayflowConfig;
use crate::currency;
use crate::error::{NetworkError, PayflowError, PreconditionError};
use crate::providers::{RelayPayload, RelayResponse, RelayerClient};
use crate::state::AppState;
use crate::storage::MemoRepository;

/// Validity of both signatures, counted from the latest block timestamp.
///
/// The relayer and the contracts reject authorizations past this window.
pub const DEADLINE_WINDOW_SECS: u64 = 60;

// Progress reported while an attempt runs
const PROGRESS_STARTED: f64 = 0.25;
const PROGRESS_CONTRACTS: f64 = 0.30;
const PROGRESS_PREPARED: f64 = 0.40;
const PROGRESS_SIGNED: f64 = 0.50;

/// Result of [`PaymentFlow::confirm_payment`].
#[derive(Debug)]
pub enum ConfirmOutcome {
    /// The attempt started; the handle resolves to its terminal status.
    Started(JoinHandle<TxStatus>),
    /// An attempt is already running; nothing was done.
    AlreadyInProgress,
}

/// A relayer submission that was accepted.
#[derive(Debug, Clone)]
pub struct Submission {
    pub receipt: RelayResponse,
    pub deadline: U256,
    pub transfer_signature: RsvSignature,
}

impl Submission {
    /// Key under which the memo of this payment is stored.
    pub fn memo_key(&self) -> String {
        match self.receipt.transaction_hash {
            Some(hash) => format!("{hash:#x}"),
            None => self.transfer_signature.to_hex(),
        }
    }
}

struct Inner {
    chain: Arc<dyn ChainReader>,
    relayer: RelayerClient,
    token: ContractDomain,
    clearing: ContractDomain,
    app: AppState,
    memos: MemoRepository,
    state: watch::Sender<PayflowState>,
}

/// One payment screen session. Cloning shares the same session.
#[derive(Clone)]
pub struct PaymentFlow {
    inner: Arc<Inner>,
}

impl PaymentFlow {
    pub fn new(
        chain: Arc<dyn ChainReader>,
        relayer: RelayerClient,
        token: ContractDomain,
        clearing: ContractDomain,
        app: AppState,
        memos: MemoRepository,
    ) -> Self {
        let (state, _) = watch::channel(PayflowState::default());
        Self {
            inner: Arc::new(Inner {
                chain,
                relayer,
                token,
                clearing,
                app,
                memos,
                state,
            }),
        }
    }

    /// Wire a flow from configuration.
    pub fn from_config(
        config: &PayflowConfig,
        chain: Arc<dyn ChainReader>,
        app: AppState,
        memos: MemoRepository,
    ) -> Result<Self, NetworkError> {
        let relayer = RelayerClient::new(config.relayer_url.clone(), config.relayer_timeout)?;
        Ok(Self::new(
            chain,
            relayer,
            config.token.clone(),
            config.clearing.clone(),
            app,
            memos,
        ))
    }

    /// Current state snapshot.
    pub fn state(&self) -> PayflowState {
        self.inner.state.borrow().clone()
    }

    /// Receive every state change, including progress updates.
    pub fn subscribe(&self) -> watch::Receiver<PayflowState> {
        self.inner.state.subscribe()
    }

    pub fn set_recipient(&self, recipient: Recipient) -> Result<(), PreconditionError> {
        self.update(PayflowAction::SetRecipient(recipient))
    }

    pub fn set_amount(&self, amount: impl Into<String>) -> Result<(), PreconditionError> {
        self.update(PayflowAction::SetAmount(amount.into()))
    }

    pub fn set_memo(&self, memo: Option<String>) -> Result<(), PreconditionError> {
        self.update(PayflowAction::SetMemo(memo))
    }

    /// Leave the flow: drop all inputs and return to UNDEFINED.
    ///
    /// A running attempt keeps running. Its progress and result carry its
    /// attempt id, which no longer matches, so they never land in the fresh
    /// state or in a later attempt.
    pub fn reset(&self) {
        self.inner.state.send_modify(PayflowState::reset);
    }

    fn update(&self, action: PayflowAction) -> Result<(), PreconditionError> {
        let mut result = Ok(());
        self.inner.state.send_if_modified(|state| {
            let before = state.clone();
            result = state.apply(action);
            *state != before
        });
        result
    }

    /// Validate the inputs and move UNDEFINED -> IN_PROGRESS.
    ///
    /// Validation failures are returned before anything changes. Calling
    /// this again while the attempt runs is a no-op; calling it after the
    /// attempt finished is an error.
    pub async fn confirm_payment(&self) -> Result<ConfirmOutcome, PayflowError> {
        let wallet = self.inner.app.wallet().await;

        let mut gate: Result<Option<ValidatedPayment>, PayflowError> = Ok(None);
        self.inner.state.send_if_modified(|state| {
            gate = match state.tx_status {
                TxStatus::InProgress => Ok(None),
                TxStatus::Success | TxStatus::Error => {
                    Err(PreconditionError::AttemptFinished.into())
                }
                TxStatus::Undefined => state.validate(wallet).map(Some),
            };
            match &mut gate {
                Ok(Some(payment)) => {
                    let started = state.apply(PayflowAction::Start).is_ok();
                    payment.attempt = state.attempt;
                    started
                }
                _ => false,
            }
        });

        let Some(payment) = gate? else {
            return Ok(ConfirmOutcome::AlreadyInProgress);
        };

        info!(
            attempt = payment.attempt,
            sender = %payment.wallet.address(),
            recipient = %payment.recipient,
            amount = %payment.amount,
            "Payment started"
        );

        let flow = self.clone();
        Ok(ConfirmOutcome::Started(tokio::spawn(async move {
            flow.run_attempt(payment).await
        })))
    }

    /// Run one attempt and return its own terminal status, whether or not
    /// the flow was reset meanwhile.
    async fn run_attempt(&self, payment: ValidatedPayment) -> TxStatus {
        let attempt = payment.attempt;
        match self.process_payment(&payment).await {
            Ok(submission) => {
                info!(
                    attempt,
                    status = submission.receipt.status,
                    tx_hash = ?submission.receipt.transaction_hash,
                    "Payment accepted by relayer"
                );
                let _ = self.update(PayflowAction::Succeeded {
                    attempt,
                    receipt: submission.receipt.clone(),
                });
                if let Some(memo) = payment.memo {
                    self.persist_memo(&submission, memo).await;
                }
                TxStatus::Success
            }
            Err(e) => {
                warn!(attempt, error = %e, kind = ?e.kind(), "Payment failed");
                let _ = self.update(PayflowAction::Failed {
                    attempt,
                    message: e.to_string(),
                    kind: e.kind(),
                });
                TxStatus::Error
            }
        }
    }

    /// Store the memo off the runtime workers; failures are only logged.
    async fn persist_memo(&self, submission: &Submission, memo: String) {
        let key = submission.memo_key();
        let memos = self.inner.memos.clone();
        let task_key = key.clone();
        let saved = tokio::task::spawn_blocking(move || memos.save(&task_key, &memo)).await;

        match saved {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(tx = %key, error = %e, "Failed to store memo"),
            Err(e) => warn!(tx = %key, error = %e, "Memo task did not complete"),
        }
    }

    fn progress(&self, attempt: u64, value: f64) {
        let _ = self.update(PayflowAction::Progress { attempt, value });
    }

    /// Execute one attempt: read chain state, sign both authorizations and
    /// hand them to the relayer. Steps run strictly in order.
    pub async fn process_payment(
        &self,
        payment: &ValidatedPayment,
    ) -> Result<Submission, PayflowError> {
        let chain = self.inner.chain.as_ref();
        let attempt = payment.attempt;
        self.progress(attempt, PROGRESS_STARTED);

        let owner = payment.wallet.address();
        let spender = self.inner.clearing.address;
        self.progress(attempt, PROGRESS_CONTRACTS);

        let chain_id = chain.chain_id().await?;
        let head = chain.block_number().await?;
        let timestamp = chain.block_timestamp(head).await?;
        let permit_nonce = chain.permit_nonce(owner).await?;
        let transfer_nonce = chain.transfer_nonce(owner).await?;

        let deadline = U256::from(timestamp) + U256::from(DEADLINE_WINDOW_SECS);

        let decimals = chain.decimals().await?;
        let wei = currency::to_base_units(&payment.amount, decimals)?;
        if wei.is_zero() {
            return Err(PreconditionError::ZeroAmount.into());
        }
        self.progress(attempt, PROGRESS_PREPARED);

        let permit = PermitAuthorization {
            owner,
            spender,
            value: wei,
            nonce: permit_nonce,
            deadline,
        };
        let transfer = TransferAuthorization {
            sender: owner,
            receiver: payment.recipient,
            amount: wei,
            fee: U256::ZERO,
            nonce: transfer_nonce,
            expiry: deadline,
            relayer: spender,
        };

        let signer = payment.wallet.signer();
        let permit_signature = sign_permit(chain_id, &self.inner.token, &permit, signer)?;
        let transfer_signature =
            sign_transfer_authorization(chain_id, &self.inner.clearing, &transfer, signer)?;
        self.progress(attempt, PROGRESS_SIGNED);

        let payload = RelayPayload {
            signer_address: owner,
            recipient: payment.recipient,
            spender,
            wei,
            fee: U256::ZERO,
            nonce: transfer_nonce,
            deadline,
            permit_signature,
            transfer_signature,
        };

        let receipt = self.inner.relayer.submit(&payload).await?;

        Ok(Submission {
            receipt,
            deadline,
            transfer_signature,
        })
    }
}
