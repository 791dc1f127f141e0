//! JSON-RPC interfaces of validators and proxies.
//!
//! Params travel by name (`param_kind = map`), matching the `*Params` structs in
//! [`crate::messages`]. Each trait generates a client extension for any jsonrpsee client and a
//! server trait whose `into_rpc` yields an `RpcModule`.

use fastset_types::{
    Address, Amount, Signature, SignatureOrMultiSig, TokenId, Transaction, ValidatorName,
};
use jsonrpsee::{core::RpcResult, proc_macros::rpc};

use crate::messages::{
    AccountInfoResponse, NonceRange, ProxySubmitTransactionResult, SubmitTransactionResponse,
    TokenInfoResponse,
};

/// Validator namespace.
#[rpc(client, server, namespace = "set")]
pub trait ValidatorApi {
    /// Asks the validator to attest the transaction.
    #[method(name = "submitTransaction", param_kind = map)]
    async fn submit_transaction(
        &self,
        transaction: Transaction,
        signature: SignatureOrMultiSig,
    ) -> RpcResult<SubmitTransactionResponse>;

    #[method(name = "submitTransactionCertificate", param_kind = map)]
    async fn submit_transaction_certificate(
        &self,
        transaction: Transaction,
        signature: SignatureOrMultiSig,
        validator_signatures: Vec<(ValidatorName, Signature)>,
    ) -> RpcResult<()>;

    #[method(name = "getAccountInfo", param_kind = map)]
    async fn get_account_info(
        &self,
        address: Address,
        token_balances_filter: Option<Vec<TokenId>>,
        certificate_by_nonce: Option<NonceRange>,
    ) -> RpcResult<AccountInfoResponse>;

    #[method(name = "getTokenInfo", param_kind = map)]
    async fn get_token_info(&self, token_ids: Vec<TokenId>) -> RpcResult<TokenInfoResponse>;
}

/// Proxy namespace.
#[rpc(client, server, namespace = "proxy")]
pub trait ProxyApi {
    /// Fans the transaction out to the committee and returns the certificate once quorum
    /// is reached.
    #[method(name = "submitTransaction", param_kind = map)]
    async fn submit_transaction(
        &self,
        transaction: Transaction,
        signature: SignatureOrMultiSig,
    ) -> RpcResult<ProxySubmitTransactionResult>;

    #[method(name = "faucetDrip", param_kind = map)]
    async fn faucet_drip(
        &self,
        recipient: Address,
        amount: Amount,
        token_id: Option<TokenId>,
    ) -> RpcResult<()>;

    #[method(name = "getAccountInfo", param_kind = map)]
    async fn get_account_info(
        &self,
        address: Address,
        token_balances_filter: Option<Vec<TokenId>>,
        certificate_by_nonce: Option<NonceRange>,
    ) -> RpcResult<AccountInfoResponse>;

    #[method(name = "getTokenInfo", param_kind = map)]
    async fn get_token_info(&self, token_ids: Vec<TokenId>) -> RpcResult<TokenInfoResponse>;
}
