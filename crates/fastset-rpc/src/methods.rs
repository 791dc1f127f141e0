//! Method names. Validators serve the `set_` namespace, proxies the `proxy_` namespace.

pub const SET_SUBMIT_TRANSACTION: &str = "set_submitTransaction";
pub const SET_SUBMIT_TRANSACTION_CERTIFICATE: &str = "set_submitTransactionCertificate";
pub const SET_GET_ACCOUNT_INFO: &str = "set_getAccountInfo";
pub const SET_GET_TOKEN_INFO: &str = "set_getTokenInfo";

pub const PROXY_SUBMIT_TRANSACTION: &str = "proxy_submitTransaction";
pub const PROXY_FAUCET_DRIP: &str = "proxy_faucetDrip";
pub const PROXY_GET_ACCOUNT_INFO: &str = "proxy_getAccountInfo";
pub const PROXY_GET_TOKEN_INFO: &str = "proxy_getTokenInfo";
