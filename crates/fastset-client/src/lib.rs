//! FastSet client library.
//!
//! This crate exposes:
//! - transport abstractions (`RpcTransport`, `HttpTransport`, `MockTransport`, multi-validator wrapper),
//! - transaction construction (`TxBuilder`),
//! - the per-transaction submission state machine (`Submission`),
//! - verified certificate storage (`CertManager`),
//! - local account state with nonce reservation (`LocalAccount`),
//! - the high-level client facade (`FastSetClient`) for transfer, proxy, and faucet flows.

pub mod account;
pub mod cert_manager;
pub mod client;
pub mod submission;
pub mod transport;
pub mod tx_builder;

pub use account::{AccountError, LocalAccount, PendingStatus, PendingTransfer};
pub use cert_manager::{CertManager, CertManagerError};
pub use client::{FastSetClient, FastSetClientError};
pub use submission::{AttestationSink, Submission, SubmissionError, SubmissionState};
pub use transport::{
    retry_with_backoff, HttpTransport, MockTransport, MultiValidatorTransport, RequestMeta,
    RetryPolicy, RpcTransport, TransportConfig, TransportError, ValidatorEndpoint,
};
pub use tx_builder::{now_nanos, BuiltTx, TxBuilder, TxBuilderError};
