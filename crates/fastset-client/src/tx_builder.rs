//! TxBuilder: construct a token-transfer `Transaction` with nonce, timestamp, and user data.

use std::time::{SystemTime, UNIX_EPOCH};

use fastset_crypto::{sign_transaction, transaction_hash};
use fastset_types::{
    Address, Amount, ClaimType, CryptoError, Nonce, Signer, TokenId, Transaction,
    TransactionEnvelope, TransactionHash,
};
use thiserror::Error;

/// Transaction builder validation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TxBuilderError {
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("invalid transfer: {0}")]
    InvalidTransfer(&'static str),
    #[error("signing error: {0}")]
    Signing(#[from] CryptoError),
}

/// A built transaction with its hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltTx {
    pub transaction: Transaction,
    pub hash: TransactionHash,
}

impl BuiltTx {
    pub fn sign<S: Signer + ?Sized>(&self, signer: &S) -> Result<TransactionEnvelope, TxBuilderError> {
        if signer.address() != self.transaction.sender {
            return Err(TxBuilderError::InvalidTransfer(
                "signer does not control the sender account",
            ));
        }
        Ok(sign_transaction(signer, self.transaction.clone())?)
    }
}

/// Fluent builder for token transfers. Defaults: native token, current time, no user data.
///
/// The builder refuses self-transfers and zero amounts. Envelopes signed elsewhere are not
/// held to that rule.
#[derive(Debug, Clone, Default)]
pub struct TxBuilder {
    sender: Option<Address>,
    recipient: Option<Address>,
    amount: Option<Amount>,
    token_id: Option<TokenId>,
    nonce: Option<Nonce>,
    timestamp_nanos: Option<u128>,
    user_data: Option<[u8; 32]>,
}

impl TxBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transfer(mut self, sender: Address, recipient: Address, amount: Amount) -> Self {
        self.sender = Some(sender);
        self.recipient = Some(recipient);
        self.amount = Some(amount);
        self
    }

    pub fn with_sender(mut self, sender: Address) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn with_recipient(mut self, recipient: Address) -> Self {
        self.recipient = Some(recipient);
        self
    }

    pub fn with_amount(mut self, amount: Amount) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_token(mut self, token_id: TokenId) -> Self {
        self.token_id = Some(token_id);
        self
    }

    pub fn with_nonce(mut self, nonce: Nonce) -> Self {
        self.nonce = Some(nonce);
        self
    }

    pub fn with_timestamp_nanos(mut self, timestamp_nanos: u128) -> Self {
        self.timestamp_nanos = Some(timestamp_nanos);
        self
    }

    pub fn with_user_data(mut self, user_data: [u8; 32]) -> Self {
        self.user_data = Some(user_data);
        self
    }

    pub fn build(self) -> Result<BuiltTx, TxBuilderError> {
        let sender = self.sender.ok_or(TxBuilderError::MissingField("sender"))?;
        let recipient = self
            .recipient
            .ok_or(TxBuilderError::MissingField("recipient"))?;
        let amount = self.amount.ok_or(TxBuilderError::MissingField("amount"))?;
        let nonce = self.nonce.ok_or(TxBuilderError::MissingField("nonce"))?;

        if sender == recipient {
            return Err(TxBuilderError::InvalidTransfer(
                "sender and recipient must be different",
            ));
        }
        if amount.is_zero() {
            return Err(TxBuilderError::InvalidTransfer("amount must be > 0"));
        }

        let transaction = Transaction {
            sender,
            recipient,
            nonce,
            timestamp_nanos: self.timestamp_nanos.unwrap_or_else(now_nanos),
            claim: ClaimType::token_transfer(
                self.token_id.unwrap_or_else(TokenId::native),
                amount,
                self.user_data,
            ),
        };
        let hash = transaction_hash(&transaction);
        Ok(BuiltTx { transaction, hash })
    }

    /// Builds and signs in one step. The sender defaults to the signer's address.
    pub fn sign<S: Signer + ?Sized>(
        mut self,
        signer: &S,
    ) -> Result<TransactionEnvelope, TxBuilderError> {
        if self.sender.is_none() {
            self.sender = Some(signer.address());
        }
        self.build()?.sign(signer)
    }
}

pub fn now_nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default()
}
