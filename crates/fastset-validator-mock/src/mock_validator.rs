//! MockValidator: in-memory validator with nonce and balance tracking, equivocation guard,
//! idempotent attestation, certificate application, and token metadata.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{Arc, Mutex},
};

use fastset_crypto::{
    multisig_account_address, sign_attestation, transaction_hash, verify_certificate,
    verify_envelope, Ed25519KeyPair, Ed25519Scheme,
};
use fastset_rpc::{
    codes, methods, parse_params, AccountInfoParams, AccountInfoResponse, RpcErrorObject,
    SubmitCertificateParams, SubmitTransactionParams, SubmitTransactionResponse, TokenInfoParams,
    TokenInfoResponse, TokenMetadata,
};
use fastset_types::{
    Address, Amount, Balance, ClaimType, Committee, Nonce, SignatureOrMultiSig, Signer, TokenId,
    TransactionCertificate, TransactionEnvelope, TransactionHash, ValidatorName,
};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::handler::{reject, to_result, RpcHandler};

pub type SharedValidator = Arc<Mutex<MockValidator>>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountState {
    pub next_nonce: Nonce,
    pub balances: HashMap<TokenId, Amount>,
}

impl AccountState {
    pub fn balance(&self, token_id: &TokenId) -> Amount {
        self.balances.get(token_id).copied().unwrap_or(Amount::ZERO)
    }
}

#[derive(Debug, Clone)]
struct Attestation {
    hash: TransactionHash,
    response: SubmitTransactionResponse,
}

#[derive(Debug, Clone)]
pub struct MockValidator {
    name: String,
    keypair: Ed25519KeyPair,
    committee: Committee,
    accounts: HashMap<Address, AccountState>,
    attested: HashMap<(Address, Nonce), Attestation>,
    applied: HashSet<TransactionHash>,
    certificates: BTreeMap<(Address, Nonce), TransactionCertificate>,
    tokens: HashMap<TokenId, TokenMetadata>,
    offline: bool,
}

impl MockValidator {
    pub fn new(name: impl Into<String>, keypair: Ed25519KeyPair, committee: Committee) -> Self {
        Self {
            name: name.into(),
            keypair,
            committee,
            accounts: HashMap::new(),
            attested: HashMap::new(),
            applied: HashSet::new(),
            certificates: BTreeMap::new(),
            tokens: HashMap::new(),
            offline: false,
        }
    }

    pub fn into_shared(self) -> SharedValidator {
        Arc::new(Mutex::new(self))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> ValidatorName {
        self.keypair.address()
    }

    pub fn committee(&self) -> &Committee {
        &self.committee
    }

    pub fn account(&self, address: &Address) -> Option<&AccountState> {
        self.accounts.get(address)
    }

    pub fn balance_of(&self, address: &Address, token_id: &TokenId) -> Amount {
        self.accounts
            .get(address)
            .map(|account| account.balance(token_id))
            .unwrap_or(Amount::ZERO)
    }

    pub fn next_nonce(&self, address: &Address) -> Nonce {
        self.accounts
            .get(address)
            .map(|account| account.next_nonce)
            .unwrap_or(0)
    }

    pub fn is_applied(&self, hash: &TransactionHash) -> bool {
        self.applied.contains(hash)
    }

    pub fn register_token(&mut self, token_id: TokenId, metadata: TokenMetadata) {
        self.tokens.insert(token_id, metadata);
    }

    /// While offline every request fails with `UNAVAILABLE`.
    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    pub fn is_offline(&self) -> bool {
        self.offline
    }

    /// Adds funds to an account, creating it if needed.
    pub fn credit(
        &mut self,
        address: Address,
        token_id: TokenId,
        amount: Amount,
    ) -> Result<(), RpcErrorObject> {
        let account = self.accounts.entry(address).or_default();
        let updated = account
            .balance(&token_id)
            .checked_add(amount)
            .ok_or_else(|| reject(codes::INVALID_TRANSACTION, "balance overflow"))?;
        account.balances.insert(token_id, updated);
        Ok(())
    }

    /// Genesis allocation: overwrites whatever balance the account held.
    pub fn set_balance(&mut self, address: Address, token_id: TokenId, amount: Amount) {
        self.accounts
            .entry(address)
            .or_default()
            .balances
            .insert(token_id, amount);
    }

    pub fn submit_transaction(
        &mut self,
        params: SubmitTransactionParams,
    ) -> Result<SubmitTransactionResponse, RpcErrorObject> {
        let envelope = TransactionEnvelope::from(params);
        let tx = &envelope.transaction;
        self.check_authorization(&envelope)?;

        let hash = transaction_hash(tx);
        if let Some(existing) = self.attested.get(&(tx.sender, tx.nonce)) {
            if existing.hash == hash {
                debug!(validator = %self.name, tx_hash = %hash, "re-attesting known transaction");
                return Ok(existing.response.clone());
            }
            return Err(reject(
                codes::CONFLICTING_TRANSACTION,
                "a different transaction was already attested for this nonce",
            )
            .with_data(json!({ "nonce": tx.nonce })));
        }

        let expected = self.next_nonce(&tx.sender);
        if tx.nonce != expected {
            return Err(reject(
                codes::INVALID_NONCE,
                format!("expected nonce {expected}, got {}", tx.nonce),
            )
            .with_data(json!({ "expected": expected, "got": tx.nonce })));
        }

        let ClaimType::TokenTransfer(transfer) = &tx.claim;
        if self.balance_of(&tx.sender, &transfer.token_id) < transfer.amount {
            return Err(reject(codes::INSUFFICIENT_BALANCE, "insufficient balance"));
        }

        let signature = sign_attestation(&self.keypair, &envelope)
            .map_err(|err| reject(codes::INTERNAL_ERROR, err.to_string()))?;
        let response = SubmitTransactionResponse {
            validator: self.address(),
            signature,
            next_nonce: tx.nonce.saturating_add(1),
            transaction_hash: hash,
        };
        self.attested.insert(
            (tx.sender, tx.nonce),
            Attestation {
                hash,
                response: response.clone(),
            },
        );
        debug!(validator = %self.name, tx_hash = %hash, nonce = tx.nonce, "transaction attested");
        Ok(response)
    }

    pub fn submit_certificate(
        &mut self,
        certificate: TransactionCertificate,
    ) -> Result<(), RpcErrorObject> {
        verify_certificate(&Ed25519Scheme, &self.committee, &certificate)
            .map_err(|err| reject(codes::INVALID_CERTIFICATE, err.to_string()))?;
        let tx = certificate.transaction();
        let hash = transaction_hash(tx);
        if self.applied.contains(&hash) {
            debug!(validator = %self.name, tx_hash = %hash, "certificate already applied");
            return Ok(());
        }
        self.check_authorization(&certificate.envelope)?;

        let expected = self.next_nonce(&tx.sender);
        if tx.nonce != expected {
            return Err(reject(
                codes::INVALID_NONCE,
                format!("expected nonce {expected}, got {}", tx.nonce),
            )
            .with_data(json!({ "expected": expected, "got": tx.nonce })));
        }

        let ClaimType::TokenTransfer(transfer) = &tx.claim;
        let sender_balance = self
            .balance_of(&tx.sender, &transfer.token_id)
            .checked_sub(transfer.amount)
            .ok_or_else(|| reject(codes::INSUFFICIENT_BALANCE, "insufficient balance"))?;
        // A self-transfer only spends the nonce.
        if tx.recipient != tx.sender {
            let recipient_balance = self
                .balance_of(&tx.recipient, &transfer.token_id)
                .checked_add(transfer.amount)
                .ok_or_else(|| reject(codes::INVALID_TRANSACTION, "balance overflow"))?;
            self.accounts
                .entry(tx.sender)
                .or_default()
                .balances
                .insert(transfer.token_id, sender_balance);
            self.accounts
                .entry(tx.recipient)
                .or_default()
                .balances
                .insert(transfer.token_id, recipient_balance);
        }
        self.accounts.entry(tx.sender).or_default().next_nonce = tx.nonce.saturating_add(1);

        self.attested.remove(&(tx.sender, tx.nonce));
        self.applied.insert(hash);
        self.certificates
            .insert((tx.sender, tx.nonce), certificate.clone());
        info!(
            validator = %self.name,
            tx_hash = %hash,
            sender = %tx.sender,
            nonce = tx.nonce,
            "certificate applied"
        );
        Ok(())
    }

    pub fn account_info(
        &self,
        params: &AccountInfoParams,
    ) -> Result<AccountInfoResponse, RpcErrorObject> {
        let account = self.accounts.get(&params.address).ok_or_else(|| {
            reject(
                codes::ACCOUNT_NOT_FOUND,
                format!("account {} not found", params.address),
            )
        })?;
        let token_balance = match &params.token_balances_filter {
            None => Vec::new(),
            Some(filter) if filter.is_empty() => {
                let mut all: Vec<_> = account
                    .balances
                    .iter()
                    .filter(|(token_id, _)| !token_id.is_native())
                    .map(|(token_id, amount)| (*token_id, Balance::from_amount(*amount)))
                    .collect();
                all.sort_by_key(|(token_id, _)| *token_id);
                all
            }
            Some(filter) => filter
                .iter()
                .map(|token_id| (*token_id, Balance::from_amount(account.balance(token_id))))
                .collect(),
        };
        let requested_certificates = params.certificate_by_nonce.map(|range| {
            self.certificates
                .range((params.address, range.start)..)
                .take_while(|((sender, nonce), _)| {
                    *sender == params.address && range.contains(*nonce)
                })
                .map(|(_, certificate)| certificate.clone())
                .collect()
        });
        Ok(AccountInfoResponse {
            sender: params.address,
            balance: Balance::from_amount(account.balance(&TokenId::native())),
            next_nonce: account.next_nonce,
            token_balance,
            requested_certificates,
        })
    }

    pub fn token_info(&self, params: &TokenInfoParams) -> TokenInfoResponse {
        TokenInfoResponse {
            requested_token_metadata: params
                .token_ids
                .iter()
                .map(|token_id| (*token_id, self.tokens.get(token_id).cloned()))
                .collect(),
        }
    }

    fn check_authorization(&self, envelope: &TransactionEnvelope) -> Result<(), RpcErrorObject> {
        verify_envelope(&Ed25519Scheme, envelope)
            .map_err(|err| reject(codes::INVALID_SIGNATURE, err.to_string()))?;
        if let SignatureOrMultiSig::MultiSig(multisig) = &envelope.signature {
            if multisig_account_address(&multisig.config) != envelope.transaction.sender {
                return Err(reject(
                    codes::INVALID_SIGNATURE,
                    "multisig config does not control the sender account",
                ));
            }
        }
        Ok(())
    }
}

impl RpcHandler for MockValidator {
    fn handle(&mut self, method: &str, params: Value) -> Result<Value, RpcErrorObject> {
        if self.offline {
            return Err(reject(
                codes::UNAVAILABLE,
                format!("validator {} is offline", self.name),
            ));
        }
        debug!(validator = %self.name, method, "handling request");
        match method {
            methods::SET_SUBMIT_TRANSACTION => {
                let params: SubmitTransactionParams = parse_params(params)?;
                to_result(&self.submit_transaction(params)?)
            }
            methods::SET_SUBMIT_TRANSACTION_CERTIFICATE => {
                let params: SubmitCertificateParams = parse_params(params)?;
                self.submit_certificate(params.into())?;
                Ok(Value::Null)
            }
            methods::SET_GET_ACCOUNT_INFO => {
                let params: AccountInfoParams = parse_params(params)?;
                to_result(&self.account_info(&params)?)
            }
            methods::SET_GET_TOKEN_INFO => {
                let params: TokenInfoParams = parse_params(params)?;
                to_result(&self.token_info(&params))
            }
            other => Err(RpcErrorObject::method_not_found(other)),
        }
    }
}
