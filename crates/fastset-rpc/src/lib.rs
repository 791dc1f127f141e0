//! JSON-RPC wire contract for FastSet validators (`set_`) and proxies (`proxy_`).

pub mod api;
pub mod convert;
pub mod error;
pub mod messages;
pub mod methods;

pub use api::{ProxyApiClient, ProxyApiServer, ValidatorApiClient, ValidatorApiServer};
pub use error::{codes, parse_params, to_params, RpcErrorObject};
pub use messages::{
    AccountInfoParams, AccountInfoResponse, FaucetDripParams, NonceRange,
    ProxySubmitTransactionResult, SubmitCertificateParams, SubmitTransactionParams,
    SubmitTransactionResponse, TokenInfoParams, TokenInfoResponse, TokenMetadata,
};
