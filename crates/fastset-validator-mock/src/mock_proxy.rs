//! MockProxy: fans a transaction out to every validator, assembles the certificate, and
//! broadcasts it back.

use std::sync::{Arc, Mutex};

use fastset_crypto::{is_quorum_satisfied, CertificateAssembler, Ed25519Scheme};
use fastset_rpc::{
    codes, methods, parse_params, AccountInfoParams, AccountInfoResponse, FaucetDripParams,
    ProxySubmitTransactionResult, RpcErrorObject, SubmitCertificateParams,
    SubmitTransactionParams, SubmitTransactionResponse, TokenInfoParams, TokenInfoResponse,
};
use serde::de::DeserializeOwned;
use fastset_types::{Committee, SignatureOrMultiSig, TokenId, TransactionEnvelope};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    handler::{reject, to_result, RpcHandler},
    mock_validator::SharedValidator,
};

pub type SharedProxy = Arc<Mutex<MockProxy>>;

#[derive(Clone)]
pub struct MockProxy {
    committee: Committee,
    validators: Vec<SharedValidator>,
}

impl MockProxy {
    pub fn new(committee: Committee, validators: Vec<SharedValidator>) -> Self {
        Self {
            committee,
            validators,
        }
    }

    pub fn into_shared(self) -> SharedProxy {
        Arc::new(Mutex::new(self))
    }

    pub fn committee(&self) -> &Committee {
        &self.committee
    }

    pub fn submit_transaction(
        &mut self,
        params: SubmitTransactionParams,
    ) -> Result<ProxySubmitTransactionResult, RpcErrorObject> {
        let envelope = TransactionEnvelope::from(params.clone());
        if let SignatureOrMultiSig::MultiSig(multisig) = &envelope.signature {
            if !is_quorum_satisfied(multisig) {
                info!(sender = %envelope.transaction.sender, "multisig below quorum");
                return Ok(ProxySubmitTransactionResult::IncompleteMultiSig);
            }
        }

        let request = to_result(&params)?;
        let mut assembler =
            CertificateAssembler::new(Ed25519Scheme, self.committee.clone(), envelope);
        let mut first_error = None;
        for validator in &self.validators {
            let attestation = call(validator, methods::SET_SUBMIT_TRANSACTION, request.clone())
                .and_then(|value| {
                    serde_json::from_value::<SubmitTransactionResponse>(value)
                        .map_err(|err| reject(codes::INTERNAL_ERROR, err.to_string()))
                });
            match attestation {
                Ok(response) => {
                    if let Err(err) = assembler.add_attestation(response.validator, response.signature)
                    {
                        warn!(validator = %response.validator, error = %err, "attestation rejected");
                    }
                }
                Err(err) => {
                    warn!(code = err.code, error = %err.message, "validator refused transaction");
                    first_error.get_or_insert(err);
                }
            }
        }

        if assembler.attestation_count() == 0 {
            if let Some(err) = first_error {
                return Err(err);
            }
        }
        if !assembler.is_complete() {
            info!(
                attestations = assembler.attestation_count(),
                quorum = self.committee.quorum(),
                "attestations below quorum"
            );
            return Ok(ProxySubmitTransactionResult::IncompleteVerifierSigs);
        }

        let certificate = assembler
            .finalize()
            .map_err(|err| reject(codes::INTERNAL_ERROR, err.to_string()))?;
        let certificate_params = to_result(&SubmitCertificateParams::from(certificate.clone()))?;
        for validator in &self.validators {
            if let Err(err) = call(
                validator,
                methods::SET_SUBMIT_TRANSACTION_CERTIFICATE,
                certificate_params.clone(),
            ) {
                warn!(code = err.code, error = %err.message, "certificate broadcast failed");
            }
        }
        info!(
            sender = %certificate.transaction().sender,
            nonce = certificate.transaction().nonce,
            "certificate assembled and broadcast"
        );
        Ok(ProxySubmitTransactionResult::Success(certificate))
    }

    /// Credits the recipient on every validator, online or not.
    pub fn faucet_drip(&mut self, params: FaucetDripParams) -> Result<(), RpcErrorObject> {
        let token_id = params.token_id.unwrap_or_else(TokenId::native);
        for validator in &self.validators {
            let mut validator = validator
                .lock()
                .map_err(|_| reject(codes::INTERNAL_ERROR, "validator state poisoned"))?;
            validator.credit(params.recipient, token_id, params.amount)?;
        }
        debug!(recipient = %params.recipient, amount = %params.amount, "faucet drip");
        Ok(())
    }

    /// Account info from the first validator that answers.
    pub fn account_info(
        &self,
        params: &AccountInfoParams,
    ) -> Result<AccountInfoResponse, RpcErrorObject> {
        self.first_answer(methods::SET_GET_ACCOUNT_INFO, to_result(params)?)
    }

    /// Token metadata from the first validator that answers.
    pub fn token_info(&self, params: &TokenInfoParams) -> Result<TokenInfoResponse, RpcErrorObject> {
        self.first_answer(methods::SET_GET_TOKEN_INFO, to_result(params)?)
    }

    fn first_answer<T: DeserializeOwned>(
        &self,
        method: &str,
        request: Value,
    ) -> Result<T, RpcErrorObject> {
        let mut first_error = None;
        for validator in &self.validators {
            match call(validator, method, request.clone()) {
                Ok(value) => return parse_params(value),
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }
        Err(first_error.unwrap_or_else(|| reject(codes::UNAVAILABLE, "no validators configured")))
    }
}

fn call(validator: &SharedValidator, method: &str, params: Value) -> Result<Value, RpcErrorObject> {
    let mut validator = validator
        .lock()
        .map_err(|_| reject(codes::INTERNAL_ERROR, "validator state poisoned"))?;
    validator.handle(method, params)
}

impl RpcHandler for MockProxy {
    fn handle(&mut self, method: &str, params: Value) -> Result<Value, RpcErrorObject> {
        debug!(method, "proxy handling request");
        match method {
            methods::PROXY_SUBMIT_TRANSACTION => {
                let params: SubmitTransactionParams = parse_params(params)?;
                to_result(&self.submit_transaction(params)?)
            }
            methods::PROXY_FAUCET_DRIP => {
                let params: FaucetDripParams = parse_params(params)?;
                self.faucet_drip(params)?;
                Ok(Value::Null)
            }
            methods::PROXY_GET_ACCOUNT_INFO => {
                let params: AccountInfoParams = parse_params(params)?;
                to_result(&self.account_info(&params)?)
            }
            methods::PROXY_GET_TOKEN_INFO => {
                let params: TokenInfoParams = parse_params(params)?;
                to_result(&self.token_info(&params)?)
            }
            other => Err(RpcErrorObject::method_not_found(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use fastset_crypto::{sign_into, sign_transaction, verify_certificate, Ed25519KeyPair, Ed25519Scheme};
    use fastset_rpc::{codes, methods, AccountInfoParams, FaucetDripParams, ProxySubmitTransactionResult};
    use fastset_types::{
        Address, Amount, ClaimType, MultiSig, MultiSigConfig, SignatureOrMultiSig, Signer, TokenId,
        Transaction, TransactionEnvelope,
    };
    use serde_json::json;

    use crate::{handler::RpcHandler, scenarios::DemoScenario};

    fn transfer(sender: Address, recipient: Address, nonce: u64) -> Transaction {
        Transaction {
            sender,
            recipient,
            nonce,
            timestamp_nanos: 1_700_000_000_000_000_000,
            claim: ClaimType::token_transfer(TokenId::native(), Amount::from(0xffffu64), None),
        }
    }

    fn set_offline(scenario: &DemoScenario, indices: &[usize], offline: bool) {
        for index in indices {
            scenario.validators[*index].lock().unwrap().set_offline(offline);
        }
    }

    #[test]
    fn proxy_certifies_on_all_validators() {
        let scenario = DemoScenario::new(4).unwrap();
        let alice = &scenario.accounts.alice;
        let bob = &scenario.accounts.bob;
        let envelope =
            sign_transaction(alice, transfer(alice.address(), bob.address(), 0)).unwrap();

        let result = scenario
            .proxy
            .lock()
            .unwrap()
            .submit_transaction(envelope.clone().into())
            .unwrap();
        let certificate = result.certificate().expect("success").clone();
        assert_eq!(certificate.envelope, envelope);
        assert_eq!(certificate.signatures.len(), 4);
        assert!(verify_certificate(&Ed25519Scheme, &scenario.committee, &certificate).is_ok());
        for validator in &scenario.validators {
            assert_eq!(validator.lock().unwrap().next_nonce(&alice.address()), 1);
        }
    }

    #[test]
    fn one_offline_validator_still_reaches_quorum() {
        let scenario = DemoScenario::new(4).unwrap();
        set_offline(&scenario, &[3], true);
        let alice = &scenario.accounts.alice;
        let envelope = sign_transaction(
            alice,
            transfer(alice.address(), scenario.accounts.carol.address(), 0),
        )
        .unwrap();
        let result = scenario
            .proxy
            .lock()
            .unwrap()
            .submit_transaction(envelope.into())
            .unwrap();
        assert_eq!(result.certificate().map(|c| c.signatures.len()), Some(3));
        assert_eq!(scenario.validators[3].lock().unwrap().next_nonce(&alice.address()), 0);
    }

    #[test]
    fn incomplete_attestations_are_retryable_with_the_same_envelope() {
        let scenario = DemoScenario::new(4).unwrap();
        set_offline(&scenario, &[2, 3], true);
        let alice = &scenario.accounts.alice;
        let envelope =
            sign_transaction(alice, transfer(alice.address(), scenario.accounts.bob.address(), 0))
                .unwrap();
        let mut proxy = scenario.proxy.lock().unwrap();
        assert_eq!(
            proxy.submit_transaction(envelope.clone().into()).unwrap(),
            ProxySubmitTransactionResult::IncompleteVerifierSigs
        );

        set_offline(&scenario, &[2, 3], false);
        let retried = proxy.submit_transaction(envelope.into()).unwrap();
        assert!(!retried.is_incomplete());
    }

    #[test]
    fn unanimous_rejection_is_an_rpc_error() {
        let scenario = DemoScenario::new(4).unwrap();
        let alice = &scenario.accounts.alice;
        let stale =
            sign_transaction(alice, transfer(alice.address(), scenario.accounts.bob.address(), 3))
                .unwrap();
        let err = scenario
            .proxy
            .lock()
            .unwrap()
            .submit_transaction(stale.into())
            .unwrap_err();
        assert_eq!(err.code, codes::INVALID_NONCE);
    }

    #[test]
    fn multisig_below_quorum_is_reported() {
        let scenario = DemoScenario::new(4).unwrap();
        let signers: Vec<_> = (1..=3u8).map(|i| Ed25519KeyPair::from_seed([0x60 + i; 32])).collect();
        let config = MultiSigConfig {
            authorized_signers: signers.iter().map(|s| s.address()).collect(),
            quorum: 2,
            nonce: 0,
        };
        let tx = transfer(
            fastset_crypto::multisig_account_address(&config),
            scenario.accounts.bob.address(),
            0,
        );
        let mut multisig = MultiSig::new(config);
        sign_into(&Ed25519Scheme, &mut multisig, &tx, &signers[0]).unwrap();
        let envelope = TransactionEnvelope {
            transaction: tx,
            signature: SignatureOrMultiSig::MultiSig(multisig),
        };
        let result = scenario
            .proxy
            .lock()
            .unwrap()
            .submit_transaction(envelope.into())
            .unwrap();
        assert_eq!(result, ProxySubmitTransactionResult::IncompleteMultiSig);
    }

    #[test]
    fn faucet_and_account_info_over_json() {
        let scenario = DemoScenario::new(4).unwrap();
        let fresh = Ed25519KeyPair::from_seed([0x99; 32]);
        let mut proxy = scenario.proxy.lock().unwrap();

        let err = proxy
            .account_info(&AccountInfoParams::new(fresh.address()))
            .unwrap_err();
        assert!(err.is_not_found());

        let params = serde_json::to_value(FaucetDripParams {
            recipient: fresh.address(),
            amount: Amount::from(0x1000u64),
            token_id: None,
        })
        .unwrap();
        assert_eq!(proxy.handle(methods::PROXY_FAUCET_DRIP, params).unwrap(), json!(null));

        let info = proxy
            .handle(
                methods::PROXY_GET_ACCOUNT_INFO,
                json!({ "address": fresh.address() }),
            )
            .unwrap();
        assert_eq!(info["balance"], json!("1000"));
        assert_eq!(info["next_nonce"], json!(0));
    }

    #[test]
    fn token_info_falls_through_offline_validators() {
        let scenario = DemoScenario::new(4).unwrap();
        set_offline(&scenario, &[0, 1], true);
        let token = scenario.accounts.token;
        let value = scenario
            .proxy
            .lock()
            .unwrap()
            .handle(
                methods::PROXY_GET_TOKEN_INFO,
                json!({ "token_ids": [token, TokenId::native()] }),
            )
            .unwrap();
        let response: fastset_rpc::TokenInfoResponse = serde_json::from_value(value).unwrap();
        assert_eq!(response.metadata(&token).map(|m| m.decimals), Some(6));
        assert!(response.metadata(&TokenId::native()).is_some());

        set_offline(&scenario, &[2, 3], true);
        let err = scenario
            .proxy
            .lock()
            .unwrap()
            .token_info(&fastset_rpc::TokenInfoParams { token_ids: vec![token] })
            .unwrap_err();
        assert_eq!(err.code, codes::UNAVAILABLE);
    }
}
