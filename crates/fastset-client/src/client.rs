//! FastSetClient: high-level facade over validator fan-out, attestation collection,
//! certificate submission, the proxy shortcut, and local nonce bookkeeping.
//!
//! A client built with [`FastSetClient::for_proxy`] has no committee. It can read state and
//! submit through the proxy, but it cannot assemble or check certificates itself.

use std::collections::HashMap;

use fastset_crypto::{transaction_hash, verify_envelope};
use fastset_rpc::{
    methods, AccountInfoParams, AccountInfoResponse, FaucetDripParams, NonceRange,
    ProxySubmitTransactionResult, RpcErrorObject, SubmitCertificateParams,
    SubmitTransactionParams, SubmitTransactionResponse, TokenInfoParams, TokenInfoResponse,
};
use fastset_types::{
    Address, Amount, Committee, Nonce, SignatureScheme, Signer, TokenId, Transaction,
    TransactionCertificate, TransactionEnvelope,
};
use futures::future::join_all;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    account::{AccountError, LocalAccount, PendingStatus, PendingTransfer},
    cert_manager::{CertManager, CertManagerError},
    submission::{Submission, SubmissionError, SubmissionState},
    transport::{MultiValidatorTransport, RequestMeta, RpcTransport, TransportError},
    tx_builder::{TxBuilder, TxBuilderError},
};

/// High-level client facade errors.
#[derive(Debug, Error)]
pub enum FastSetClientError {
    /// Error object reported by a validator or proxy, unchanged.
    #[error(transparent)]
    Rpc(RpcErrorObject),
    #[error(transparent)]
    Transport(TransportError),
    #[error(transparent)]
    Builder(#[from] TxBuilderError),
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    #[error(transparent)]
    CertManager(#[from] CertManagerError),
    #[error(transparent)]
    Account(#[from] AccountError),
    #[error("unexpected response payload: {0}")]
    Decode(String),
    #[error("no validator at index {0}")]
    UnknownValidator(usize),
    #[error("no validators configured")]
    NoValidators,
    #[error("no proxy endpoint configured")]
    NoProxy,
    #[error("no committee configured")]
    NoCommittee,
}

impl From<TransportError> for FastSetClientError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Rpc(rpc) => Self::Rpc(rpc),
            other => Self::Transport(other),
        }
    }
}

impl FastSetClientError {
    pub fn rpc_error(&self) -> Option<&RpcErrorObject> {
        match self {
            Self::Rpc(err) => Some(err),
            _ => None,
        }
    }

    /// The network expected a different nonce; re-query it and re-sign.
    pub fn is_stale_nonce(&self) -> bool {
        self.rpc_error().is_some_and(RpcErrorObject::is_invalid_nonce)
    }
}

/// Client for one FastSet committee, reached through per-validator transports and an
/// optional proxy.
pub struct FastSetClient<T, S>
where
    T: RpcTransport + Clone,
    S: SignatureScheme + Clone,
{
    validators: MultiValidatorTransport<T>,
    proxy: Option<T>,
    scheme: S,
    committee: Option<Committee>,
    meta: RequestMeta,
    accounts: HashMap<Address, LocalAccount>,
    cert_manager: Option<CertManager<S>>,
}

impl<T, S> FastSetClient<T, S>
where
    T: RpcTransport + Clone,
    S: SignatureScheme + Clone,
{
    pub fn new(validators: MultiValidatorTransport<T>, committee: Committee, scheme: S) -> Self {
        Self {
            validators,
            proxy: None,
            cert_manager: Some(CertManager::new(scheme.clone(), committee.clone())),
            scheme,
            committee: Some(committee),
            meta: RequestMeta::default(),
            accounts: HashMap::new(),
        }
    }

    /// A client that only talks to a proxy. Certificates the proxy returns are passed
    /// through unchecked.
    pub fn for_proxy(proxy: T, scheme: S) -> Self {
        Self {
            validators: MultiValidatorTransport::new(Vec::new()),
            proxy: Some(proxy),
            cert_manager: None,
            scheme,
            committee: None,
            meta: RequestMeta::default(),
            accounts: HashMap::new(),
        }
    }

    pub fn with_proxy(mut self, proxy: T) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn with_request_meta(mut self, meta: RequestMeta) -> Self {
        self.meta = meta;
        self
    }

    pub fn committee(&self) -> Option<&Committee> {
        self.committee.as_ref()
    }

    /// Verified certificates seen by this client. `None` without a committee.
    pub fn cert_manager(&self) -> Option<&CertManager<S>> {
        self.cert_manager.as_ref()
    }

    fn require_committee(&self) -> Result<&Committee, FastSetClientError> {
        self.committee.as_ref().ok_or(FastSetClientError::NoCommittee)
    }

    pub fn account(&self, address: &Address) -> Option<&LocalAccount> {
        self.accounts.get(address)
    }

    /// Starts an unsigned submission after checking the transaction locally.
    pub fn prepare(&self, transaction: Transaction) -> Result<Submission<S>, FastSetClientError> {
        Ok(Submission::new(
            self.scheme.clone(),
            self.require_committee()?.clone(),
            transaction,
        ))
    }

    /// Starts a submission for an envelope signed elsewhere. A multisig below its quorum
    /// is refused here, before any request is sent.
    pub fn prepare_signed(
        &self,
        envelope: TransactionEnvelope,
    ) -> Result<Submission<S>, FastSetClientError> {
        Ok(Submission::from_envelope(
            self.scheme.clone(),
            self.require_committee()?.clone(),
            envelope,
        )?)
    }

    /// Account state from the proxy if configured, otherwise from the first validator that
    /// knows the account. `None` means no validator has seen it.
    pub async fn account_info(
        &self,
        address: Address,
    ) -> Result<Option<AccountInfoResponse>, FastSetClientError> {
        let params = encode(&AccountInfoParams::new(address))?;
        match self
            .query(methods::PROXY_GET_ACCOUNT_INFO, methods::SET_GET_ACCOUNT_INFO, params)
            .await
        {
            Ok(value) => decode(value).map(Some),
            Err(FastSetClientError::Rpc(err)) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Metadata for each requested token, in request order. Unknown tokens come back as
    /// `None` entries.
    pub async fn token_info(
        &self,
        token_ids: Vec<TokenId>,
    ) -> Result<TokenInfoResponse, FastSetClientError> {
        let params = encode(&TokenInfoParams { token_ids })?;
        let value = self
            .query(methods::PROXY_GET_TOKEN_INFO, methods::SET_GET_TOKEN_INFO, params)
            .await?;
        decode(value)
    }

    /// Certificates of the account's transactions within `range`, in nonce order. With a
    /// committee each one is verified and stored in the certificate manager.
    pub async fn certificates_by_nonce(
        &mut self,
        address: Address,
        range: NonceRange,
    ) -> Result<Vec<TransactionCertificate>, FastSetClientError> {
        let params = encode(&AccountInfoParams::new(address).with_certificates(range))?;
        let info: AccountInfoResponse = match self
            .query(methods::PROXY_GET_ACCOUNT_INFO, methods::SET_GET_ACCOUNT_INFO, params)
            .await
        {
            Ok(value) => decode(value)?,
            Err(FastSetClientError::Rpc(err)) if err.is_not_found() => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };
        let certificates = info.requested_certificates.unwrap_or_default();
        if let Some(manager) = self.cert_manager.as_mut() {
            for certificate in &certificates {
                manager.record(certificate.clone())?;
            }
        }
        debug!(address = %address, count = certificates.len(), "certificates fetched");
        Ok(certificates)
    }

    /// Asks the proxy if configured, otherwise each validator in turn until one answers.
    /// When none does, a not-found error wins over the others.
    async fn query(
        &self,
        proxy_method: &str,
        validator_method: &str,
        params: Value,
    ) -> Result<Value, FastSetClientError> {
        if let Some(proxy) = &self.proxy {
            return Ok(proxy.call(proxy_method, params, &self.meta).await?);
        }

        let mut errors = Vec::new();
        for transport in self.validators.validators() {
            match transport
                .call(validator_method, params.clone(), &self.meta)
                .await
            {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if !err.rpc_error().is_some_and(RpcErrorObject::is_not_found) {
                        warn!(
                            endpoint = transport.name(),
                            method = validator_method,
                            error = %err,
                            "query failed"
                        );
                    }
                    errors.push(err);
                }
            }
        }
        let not_found = errors
            .iter()
            .position(|err| err.rpc_error().is_some_and(RpcErrorObject::is_not_found));
        match not_found {
            Some(index) => Err(errors.swap_remove(index).into()),
            None if errors.is_empty() => Err(FastSetClientError::NoValidators),
            None => Err(errors.swap_remove(0).into()),
        }
    }

    /// The nonce the network expects next. An unknown account starts at zero.
    pub async fn next_nonce(&self, address: Address) -> Result<Nonce, FastSetClientError> {
        Ok(self
            .account_info(address)
            .await?
            .map(|info| info.next_nonce)
            .unwrap_or(0))
    }

    /// Re-reads the account from the network into local state.
    pub async fn refresh_account(
        &mut self,
        address: Address,
    ) -> Result<&LocalAccount, FastSetClientError> {
        let info = self.account_info(address).await?;
        let account = self
            .accounts
            .entry(address)
            .or_insert_with(|| LocalAccount::new(address, 0));
        match &info {
            Some(info) => account.refresh(info),
            None => account.sync_nonce(0),
        }
        debug!(address = %address, next_nonce = account.next_nonce(), "account refreshed");
        Ok(account)
    }

    /// Sends the envelope to one validator and records its attestation.
    pub async fn submit_to_validator(
        &self,
        index: usize,
        submission: &mut Submission<S>,
    ) -> Result<SubmitTransactionResponse, FastSetClientError> {
        let transport = self
            .validators
            .get(index)
            .ok_or(FastSetClientError::UnknownValidator(index))?;
        let envelope = submission.begin_submit(1)?;
        let params = encode(&SubmitTransactionParams::from(envelope))?;
        let value = transport
            .call(methods::SET_SUBMIT_TRANSACTION, params, &self.meta)
            .await?;
        let response: SubmitTransactionResponse = decode(value)?;
        submission.record_attestation(&response)?;
        debug!(
            endpoint = transport.name(),
            tx_hash = %submission.hash(),
            state = %submission.state(),
            "attestation recorded"
        );
        Ok(response)
    }

    /// Sends the envelope to every validator concurrently and records each attestation as it
    /// arrives. Returns the resulting state, which is `AttestationCollected` once quorum is
    /// met. If no validator attests, the first validator error is returned.
    pub async fn collect_attestations(
        &self,
        submission: &mut Submission<S>,
    ) -> Result<SubmissionState, FastSetClientError> {
        if self.validators.validator_count() == 0 {
            return Err(FastSetClientError::NoValidators);
        }
        let quorum = submission.committee().quorum();
        let envelope = submission.begin_submit(self.validators.validator_count())?;
        let sink = submission.attestation_sink()?;
        let params = encode(&SubmitTransactionParams::from(envelope))?;

        let results = join_all(self.validators.validators().iter().map(|transport| {
            let sink = sink.clone();
            let params = params.clone();
            async move {
                let outcome = async {
                    let value = transport
                        .call(methods::SET_SUBMIT_TRANSACTION, params, &self.meta)
                        .await?;
                    let response: SubmitTransactionResponse = decode(value)?;
                    sink.record(&response)?;
                    Ok::<_, FastSetClientError>(response.transaction_hash)
                }
                .await;
                (transport.name().to_string(), outcome)
            }
        }))
        .await;

        let mut accepted = 0usize;
        let mut first_error = None;
        for (endpoint, outcome) in results {
            match outcome {
                Ok(reported) => {
                    accepted += 1;
                    submission.note_reported_hash(reported);
                }
                Err(err) => {
                    warn!(endpoint = %endpoint, error = %err, "validator did not attest");
                    first_error.get_or_insert(err);
                }
            }
        }

        let state = submission.state();
        info!(
            tx_hash = %submission.hash(),
            attestations = accepted,
            quorum,
            state = %state,
            "attestation round finished"
        );
        match (accepted, first_error) {
            (0, Some(err)) => Err(err),
            _ => Ok(state),
        }
    }

    /// Assembles the certificate and broadcasts it to every validator. Refuses while the
    /// submission holds fewer than quorum attestations.
    pub async fn submit_certificate(
        &mut self,
        submission: &mut Submission<S>,
    ) -> Result<TransactionCertificate, FastSetClientError> {
        let certificate = submission.certify()?;
        let params = encode(&SubmitCertificateParams::from(certificate.clone()))?;
        let results = self
            .validators
            .call_all(methods::SET_SUBMIT_TRANSACTION_CERTIFICATE, params, &self.meta)
            .await;

        let mut acks = 0usize;
        let mut first_error = None;
        for (transport, result) in self.validators.validators().iter().zip(results) {
            match result {
                Ok(_) => acks += 1,
                Err(err) => {
                    warn!(endpoint = transport.name(), error = %err, "certificate not accepted");
                    first_error.get_or_insert(err);
                }
            }
        }
        if acks == 0 {
            return Err(first_error
                .map(FastSetClientError::from)
                .unwrap_or(FastSetClientError::NoValidators));
        }

        let hash = match self.cert_manager.as_mut() {
            Some(manager) => manager.record(certificate.clone())?,
            None => transaction_hash(certificate.transaction()),
        };
        info!(tx_hash = %hash, acks, "certificate submitted");
        Ok(certificate)
    }

    /// Builds, signs, and certifies a transfer from the signer's account, reserving the
    /// nonce locally. On a stale-nonce rejection the account is refreshed from the network
    /// so the next attempt uses the right nonce.
    pub async fn send_transfer<Sg: Signer + ?Sized>(
        &mut self,
        signer: &Sg,
        recipient: Address,
        token_id: TokenId,
        amount: Amount,
    ) -> Result<TransactionCertificate, FastSetClientError> {
        self.require_committee()?;
        let sender = signer.address();
        let nonce = self.reserve_nonce(sender).await?;
        let result = self
            .drive_transfer(signer, recipient, token_id, amount, nonce)
            .await;

        let account = self
            .accounts
            .entry(sender)
            .or_insert_with(|| LocalAccount::new(sender, nonce));
        match &result {
            Ok(certificate) => {
                account.commit_nonce(nonce)?;
                let hash = transaction_hash(certificate.transaction());
                account.set_status(&hash, PendingStatus::Certified)?;
            }
            Err(err) => {
                account.release_nonce(nonce)?;
                if err.is_stale_nonce() {
                    warn!(sender = %sender, nonce, "stale nonce, refreshing account");
                    if let Err(refresh_err) = self.refresh_account(sender).await {
                        warn!(sender = %sender, error = %refresh_err, "account refresh failed");
                    }
                }
            }
        }
        result
    }

    async fn reserve_nonce(&mut self, sender: Address) -> Result<Nonce, FastSetClientError> {
        if !self.accounts.contains_key(&sender) {
            let next_nonce = self.next_nonce(sender).await?;
            self.accounts
                .insert(sender, LocalAccount::new(sender, next_nonce));
        }
        let account = self
            .accounts
            .entry(sender)
            .or_insert_with(|| LocalAccount::new(sender, 0));
        Ok(account.reserve_nonce())
    }

    async fn drive_transfer<Sg: Signer + ?Sized>(
        &mut self,
        signer: &Sg,
        recipient: Address,
        token_id: TokenId,
        amount: Amount,
        nonce: Nonce,
    ) -> Result<TransactionCertificate, FastSetClientError> {
        let sender = signer.address();
        let built = TxBuilder::new()
            .with_transfer(sender, recipient, amount)
            .with_token(token_id)
            .with_nonce(nonce)
            .build()?;
        let mut submission = self.prepare(built.transaction)?;
        submission.sign(signer)?;
        if let Some(account) = self.accounts.get_mut(&sender) {
            account.add_pending(PendingTransfer {
                hash: built.hash,
                nonce,
                token_id,
                amount,
                status: PendingStatus::Pending,
            });
        }

        let outcome = match self.collect_attestations(&mut submission).await {
            Ok(_) => self.submit_certificate(&mut submission).await,
            Err(err) => Err(err),
        };
        if outcome.is_err() {
            if let Some(account) = self.accounts.get_mut(&sender) {
                account.set_status(&built.hash, PendingStatus::Failed)?;
            }
        }
        outcome
    }

    /// Submits through the proxy, which collects attestations and broadcasts the
    /// certificate. Incomplete outcomes are returned as values; resubmitting the unchanged
    /// envelope is safe.
    ///
    /// The envelope's authorization is checked before sending. A returned certificate that
    /// fails the local committee check is logged and still handed back, since the network
    /// has already accepted it.
    pub async fn proxy_submit(
        &mut self,
        envelope: TransactionEnvelope,
    ) -> Result<ProxySubmitTransactionResult, FastSetClientError> {
        let proxy = self.proxy.as_ref().ok_or(FastSetClientError::NoProxy)?;
        verify_envelope(&self.scheme, &envelope).map_err(SubmissionError::from)?;
        let tx_hash = transaction_hash(&envelope.transaction);
        let params = encode(&SubmitTransactionParams::from(envelope))?;
        let value = proxy
            .call(methods::PROXY_SUBMIT_TRANSACTION, params, &self.meta)
            .await?;
        let result: ProxySubmitTransactionResult = decode(value)?;
        match (&result, self.cert_manager.as_mut()) {
            (ProxySubmitTransactionResult::Success(certificate), Some(manager)) => {
                match manager.record(certificate.clone()) {
                    Ok(_) => info!(tx_hash = %tx_hash, "proxy returned certificate"),
                    Err(err) => warn!(
                        tx_hash = %tx_hash,
                        error = %err,
                        "proxy certificate failed local verification"
                    ),
                }
            }
            (ProxySubmitTransactionResult::Success(certificate), None) => info!(
                tx_hash = %tx_hash,
                attestations = certificate.signatures.len(),
                "proxy returned certificate"
            ),
            (incomplete, _) => {
                info!(tx_hash = %tx_hash, outcome = ?incomplete, "proxy submission incomplete");
            }
        }
        Ok(result)
    }

    pub async fn faucet_drip(
        &self,
        recipient: Address,
        amount: Amount,
        token_id: Option<TokenId>,
    ) -> Result<(), FastSetClientError> {
        let proxy = self.proxy.as_ref().ok_or(FastSetClientError::NoProxy)?;
        let params = encode(&FaucetDripParams {
            recipient,
            amount,
            token_id,
        })?;
        proxy
            .call(methods::PROXY_FAUCET_DRIP, params, &self.meta)
            .await?;
        debug!(recipient = %recipient, amount = %amount, "faucet drip");
        Ok(())
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Value, FastSetClientError> {
    serde_json::to_value(value).map_err(|err| FastSetClientError::Decode(err.to_string()))
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, FastSetClientError> {
    serde_json::from_value(value).map_err(|err| FastSetClientError::Decode(err.to_string()))
}
