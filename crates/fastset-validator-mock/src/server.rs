//! Serves the in-memory validators and proxy over HTTP through the jsonrpsee server, so live
//! clients can be pointed at them.

use std::{net::SocketAddr, sync::Mutex};

use async_trait::async_trait;
use fastset_rpc::{
    codes, methods, to_params, AccountInfoParams, AccountInfoResponse, FaucetDripParams,
    NonceRange, ProxyApiServer, ProxySubmitTransactionResult, RpcErrorObject,
    SubmitCertificateParams, SubmitTransactionParams, SubmitTransactionResponse,
    TokenInfoParams, TokenInfoResponse, ValidatorApiServer,
};
use fastset_types::{
    Address, Amount, Signature, SignatureOrMultiSig, TokenId, Transaction, ValidatorName,
};
use jsonrpsee::{
    core::RpcResult,
    server::{Server, ServerHandle},
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::info;

use crate::{
    handler::RpcHandler, mock_proxy::SharedProxy, mock_validator::SharedValidator,
    scenarios::DemoScenario,
};

/// Runs one call through the handler, the same path `MockTransport` takes.
fn dispatch<H, P, R>(handler: &Mutex<H>, method: &str, params: &P) -> RpcResult<R>
where
    H: RpcHandler + ?Sized,
    P: Serialize,
    R: DeserializeOwned,
{
    let params = to_params(params)
        .map_err(|err| RpcErrorObject::new(codes::INTERNAL_ERROR, err.to_string()))?;
    let value = handler
        .lock()
        .map_err(|_| RpcErrorObject::new(codes::INTERNAL_ERROR, "handler state poisoned"))?
        .handle(method, params)?;
    Ok(serde_json::from_value(value)
        .map_err(|err| RpcErrorObject::new(codes::INTERNAL_ERROR, err.to_string()))?)
}

/// `set_` namespace backed by a mock validator.
#[derive(Clone)]
pub struct ValidatorService {
    validator: SharedValidator,
}

impl ValidatorService {
    pub fn new(validator: SharedValidator) -> Self {
        Self { validator }
    }
}

#[async_trait]
impl ValidatorApiServer for ValidatorService {
    async fn submit_transaction(
        &self,
        transaction: Transaction,
        signature: SignatureOrMultiSig,
    ) -> RpcResult<SubmitTransactionResponse> {
        let params = SubmitTransactionParams {
            transaction,
            signature,
        };
        dispatch(&*self.validator, methods::SET_SUBMIT_TRANSACTION, &params)
    }

    async fn submit_transaction_certificate(
        &self,
        transaction: Transaction,
        signature: SignatureOrMultiSig,
        validator_signatures: Vec<(ValidatorName, Signature)>,
    ) -> RpcResult<()> {
        let params = SubmitCertificateParams {
            transaction,
            signature,
            validator_signatures,
        };
        dispatch(
            &*self.validator,
            methods::SET_SUBMIT_TRANSACTION_CERTIFICATE,
            &params,
        )
    }

    async fn get_account_info(
        &self,
        address: Address,
        token_balances_filter: Option<Vec<TokenId>>,
        certificate_by_nonce: Option<NonceRange>,
    ) -> RpcResult<AccountInfoResponse> {
        let params = AccountInfoParams {
            address,
            token_balances_filter,
            certificate_by_nonce,
        };
        dispatch(&*self.validator, methods::SET_GET_ACCOUNT_INFO, &params)
    }

    async fn get_token_info(&self, token_ids: Vec<TokenId>) -> RpcResult<TokenInfoResponse> {
        dispatch(
            &*self.validator,
            methods::SET_GET_TOKEN_INFO,
            &TokenInfoParams { token_ids },
        )
    }
}

/// `proxy_` namespace backed by the mock proxy.
#[derive(Clone)]
pub struct ProxyService {
    proxy: SharedProxy,
}

impl ProxyService {
    pub fn new(proxy: SharedProxy) -> Self {
        Self { proxy }
    }
}

#[async_trait]
impl ProxyApiServer for ProxyService {
    async fn submit_transaction(
        &self,
        transaction: Transaction,
        signature: SignatureOrMultiSig,
    ) -> RpcResult<ProxySubmitTransactionResult> {
        let params = SubmitTransactionParams {
            transaction,
            signature,
        };
        dispatch(&*self.proxy, methods::PROXY_SUBMIT_TRANSACTION, &params)
    }

    async fn faucet_drip(
        &self,
        recipient: Address,
        amount: Amount,
        token_id: Option<TokenId>,
    ) -> RpcResult<()> {
        let params = FaucetDripParams {
            recipient,
            amount,
            token_id,
        };
        dispatch(&*self.proxy, methods::PROXY_FAUCET_DRIP, &params)
    }

    async fn get_account_info(
        &self,
        address: Address,
        token_balances_filter: Option<Vec<TokenId>>,
        certificate_by_nonce: Option<NonceRange>,
    ) -> RpcResult<AccountInfoResponse> {
        let params = AccountInfoParams {
            address,
            token_balances_filter,
            certificate_by_nonce,
        };
        dispatch(&*self.proxy, methods::PROXY_GET_ACCOUNT_INFO, &params)
    }

    async fn get_token_info(&self, token_ids: Vec<TokenId>) -> RpcResult<TokenInfoResponse> {
        dispatch(
            &*self.proxy,
            methods::PROXY_GET_TOKEN_INFO,
            &TokenInfoParams { token_ids },
        )
    }
}

/// Starts an HTTP server for one validator. Bind to port 0 to pick a free port; the bound
/// address is returned. The server runs until the handle is stopped or dropped.
pub async fn serve_validator(
    validator: SharedValidator,
    addr: SocketAddr,
) -> std::io::Result<(SocketAddr, ServerHandle)> {
    let server = Server::builder().build(addr).await?;
    let local_addr = server.local_addr()?;
    let handle = server.start(ValidatorService::new(validator).into_rpc());
    info!(%local_addr, "validator rpc listening");
    Ok((local_addr, handle))
}

/// Starts an HTTP server for the proxy.
pub async fn serve_proxy(
    proxy: SharedProxy,
    addr: SocketAddr,
) -> std::io::Result<(SocketAddr, ServerHandle)> {
    let server = Server::builder().build(addr).await?;
    let local_addr = server.local_addr()?;
    let handle = server.start(ProxyService::new(proxy).into_rpc());
    info!(%local_addr, "proxy rpc listening");
    Ok((local_addr, handle))
}

/// A scenario served on loopback ports. Dropping it shuts the servers down.
pub struct ServedNetwork {
    pub proxy_url: String,
    /// `(name, url)` per validator, in committee order.
    pub validator_urls: Vec<(String, String)>,
    handles: Vec<ServerHandle>,
}

impl ServedNetwork {
    pub async fn start(scenario: &DemoScenario) -> std::io::Result<Self> {
        let loopback = SocketAddr::from(([127, 0, 0, 1], 0));
        let mut handles = Vec::with_capacity(scenario.validators.len() + 1);
        let mut validator_urls = Vec::with_capacity(scenario.validators.len());
        for (index, validator) in scenario.validators.iter().enumerate() {
            let name = validator
                .lock()
                .map(|validator| validator.name().to_string())
                .unwrap_or_else(|_| format!("validator-{index}"));
            let (addr, handle) = serve_validator(validator.clone(), loopback).await?;
            validator_urls.push((name, format!("http://{addr}")));
            handles.push(handle);
        }
        let (addr, handle) = serve_proxy(scenario.proxy.clone(), loopback).await?;
        handles.push(handle);
        Ok(Self {
            proxy_url: format!("http://{addr}"),
            validator_urls,
            handles,
        })
    }

    pub fn stop(self) {
        for handle in self.handles {
            // Already stopped is fine.
            let _ = handle.stop();
        }
    }
}
