use std::str::FromStr;
use std::sync::{
    atomic::{AtomicU32, AtomicU64, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use fastset_rpc::{codes, RpcErrorObject};
use fastset_validator_mock::SharedHandler;
use futures::future::join_all;
use jsonrpsee::{
    core::{client::ClientT, params::ObjectParams, ClientError},
    http_client::HttpClient,
};
use rand::Rng;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Per-request deadline and retry behavior.
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub timeout_ms: u64,
    pub retry_policy: RetryPolicy,
}

impl Default for RequestMeta {
    fn default() -> Self {
        Self {
            timeout_ms: 3_000,
            retry_policy: RetryPolicy::default(),
        }
    }
}

impl From<&TransportConfig> for RequestMeta {
    fn from(config: &TransportConfig) -> Self {
        Self {
            timeout_ms: config.request_timeout_ms,
            retry_policy: config.retry_policy.clone(),
        }
    }
}

/// Retry behavior for transport operations.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff_ms: 50,
            max_backoff_ms: 500,
            jitter_ms: 20,
        }
    }
}

/// Validator endpoint configuration. Parses from `name=url` or a bare `url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorEndpoint {
    pub name: String,
    pub url: String,
}

impl FromStr for ValidatorEndpoint {
    type Err = TransportError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        let (name, url) = match value.split_once('=') {
            Some((name, url)) => (name.trim(), url.trim()),
            None => (value, value),
        };
        if url.is_empty() || name.is_empty() {
            return Err(TransportError::Internal(format!(
                "invalid validator endpoint `{value}`"
            )));
        }
        Ok(Self {
            name: name.to_string(),
            url: url.to_string(),
        })
    }
}

/// Transport configuration shared by validator and proxy clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub validators: Vec<ValidatorEndpoint>,
    pub proxy: Option<String>,
    pub request_timeout_ms: u64,
    pub retry_policy: RetryPolicy,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            validators: Vec::new(),
            proxy: None,
            request_timeout_ms: 3_000,
            retry_policy: RetryPolicy::default(),
        }
    }
}

impl TransportConfig {
    pub fn http_validators(&self) -> Result<Vec<HttpTransport>, TransportError> {
        self.validators
            .iter()
            .map(|endpoint| {
                HttpTransport::new(&endpoint.name, &endpoint.url, self.request_timeout_ms)
            })
            .collect()
    }

    pub fn http_proxy(&self) -> Result<Option<HttpTransport>, TransportError> {
        self.proxy
            .as_deref()
            .map(|url| HttpTransport::new("proxy", url, self.request_timeout_ms))
            .transpose()
    }
}

/// Error model for transport operations.
#[derive(Debug, Error, Clone)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("endpoint unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Rpc(#[from] RpcErrorObject),
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("internal transport error: {0}")]
    Internal(String),
}

impl TransportError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Unavailable(_) => true,
            Self::Rpc(err) => err.code == codes::UNAVAILABLE,
            Self::Decode(_) | Self::Internal(_) => false,
        }
    }

    pub fn rpc_error(&self) -> Option<&RpcErrorObject> {
        match self {
            Self::Rpc(err) => Some(err),
            _ => None,
        }
    }
}

/// A JSON-RPC endpoint: a validator (`set_` methods) or a proxy (`proxy_` methods).
#[async_trait(?Send)]
pub trait RpcTransport {
    fn name(&self) -> &str;

    async fn call(
        &self,
        method: &str,
        params: Value,
        meta: &RequestMeta,
    ) -> Result<Value, TransportError>;
}

/// JSON-RPC over HTTP, through the jsonrpsee client.
#[derive(Clone)]
pub struct HttpTransport {
    name: String,
    url: String,
    client: Arc<HttpClient>,
}

impl HttpTransport {
    pub fn new(name: &str, url: &str, request_timeout_ms: u64) -> Result<Self, TransportError> {
        let client = HttpClient::builder()
            .request_timeout(Duration::from_millis(request_timeout_ms))
            .build(url)
            .map_err(|err| TransportError::Internal(err.to_string()))?;
        Ok(Self {
            name: name.to_string(),
            url: url.to_string(),
            client: Arc::new(client),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// The underlying client, for the typed `ValidatorApiClient` and `ProxyApiClient` calls.
    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    async fn send_once(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        let params = object_params(params)?;
        self.client
            .request::<Value, _>(method, params)
            .await
            .map_err(TransportError::from)
    }
}

/// Params travel by name, so a params value must be a JSON object (or null for none).
fn object_params(params: Value) -> Result<ObjectParams, TransportError> {
    let mut object = ObjectParams::new();
    match params {
        Value::Null => {}
        Value::Object(entries) => {
            for (name, value) in entries {
                object
                    .insert(&name, value)
                    .map_err(|err| TransportError::Internal(err.to_string()))?;
            }
        }
        other => {
            return Err(TransportError::Internal(format!(
                "params must be a JSON object, got {other}"
            )))
        }
    }
    Ok(object)
}

impl From<ClientError> for TransportError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Call(object) => Self::Rpc(object.into()),
            ClientError::RequestTimeout => Self::Timeout,
            ClientError::Transport(err) => Self::Unavailable(err.to_string()),
            ClientError::ParseError(err) => Self::Decode(err.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

#[async_trait(?Send)]
impl RpcTransport for HttpTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(
        &self,
        method: &str,
        params: Value,
        meta: &RequestMeta,
    ) -> Result<Value, TransportError> {
        debug!(endpoint = %self.name, method, "sending request");
        retry_with_backoff(meta, || self.send_once(method, params.clone())).await
    }
}

/// In-memory transport backed by a mock validator or proxy. Params, results and error
/// objects still pass through JSON text.
#[derive(Clone)]
pub struct MockTransport {
    name: String,
    handler: SharedHandler,
    requests: Arc<AtomicU64>,
    failures: Arc<AtomicU32>,
}

impl MockTransport {
    pub fn new(name: impl Into<String>, handler: SharedHandler) -> Self {
        Self {
            name: name.into(),
            handler,
            requests: Arc::new(AtomicU64::new(0)),
            failures: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Number of attempts that reached this transport, including injected failures.
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::SeqCst)
    }

    /// Makes the next `count` attempts fail with `Unavailable`.
    pub fn fail_next(&self, count: u32) {
        self.failures.store(count, Ordering::SeqCst);
    }

    fn send_once(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let injected = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if injected {
            return Err(TransportError::Unavailable(format!(
                "{} injected failure",
                self.name
            )));
        }

        let params = roundtrip(&params)?;
        let result = {
            let mut handler = self
                .handler
                .lock()
                .map_err(|_| TransportError::Unavailable("mutex poisoned".to_string()))?;
            handler.handle(method, params)
        };
        match result {
            Ok(value) => roundtrip(&value),
            Err(err) => Err(TransportError::Rpc(roundtrip(&err)?)),
        }
    }
}

fn roundtrip<T: serde::Serialize + serde::de::DeserializeOwned>(
    value: &T,
) -> Result<T, TransportError> {
    let wire = serde_json::to_vec(value).map_err(|err| TransportError::Internal(err.to_string()))?;
    serde_json::from_slice(&wire).map_err(|err| TransportError::Decode(err.to_string()))
}

#[async_trait(?Send)]
impl RpcTransport for MockTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(
        &self,
        method: &str,
        params: Value,
        meta: &RequestMeta,
    ) -> Result<Value, TransportError> {
        debug!(endpoint = %self.name, method, "sending request");
        retry_with_backoff(meta, || {
            let params = params.clone();
            async move { self.send_once(method, params) }
        })
        .await
    }
}

/// Fan-out wrapper that sends the same request to every validator in parallel.
#[derive(Clone)]
pub struct MultiValidatorTransport<T: RpcTransport + Clone> {
    validators: Vec<T>,
}

impl<T: RpcTransport + Clone> MultiValidatorTransport<T> {
    pub fn new(validators: Vec<T>) -> Self {
        Self { validators }
    }

    pub fn validator_count(&self) -> usize {
        self.validators.len()
    }

    pub fn validators(&self) -> &[T] {
        &self.validators
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.validators.get(index)
    }

    /// Results come back in validator order.
    pub async fn call_all(
        &self,
        method: &str,
        params: Value,
        meta: &RequestMeta,
    ) -> Vec<Result<Value, TransportError>> {
        join_all(
            self.validators
                .iter()
                .map(|transport| transport.call(method, params.clone(), meta)),
        )
        .await
    }
}

pub async fn retry_with_backoff<T, F, Fut>(
    meta: &RequestMeta,
    mut op: F,
) -> Result<T, TransportError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, TransportError>>,
{
    let deadline = Instant::now() + Duration::from_millis(meta.timeout_ms);
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.is_retryable() {
                    return Err(err);
                }
                if attempt >= meta.retry_policy.max_retries {
                    return Err(err);
                }
                let now = Instant::now();
                if now >= deadline {
                    return Err(TransportError::Timeout);
                }

                let delay = backoff_delay_ms(attempt, &meta.retry_policy);
                attempt += 1;
                let remaining = deadline.saturating_duration_since(now).as_millis() as u64;
                if delay > remaining {
                    return Err(TransportError::Timeout);
                }
                debug!(attempt, delay_ms = delay, error = %err, "retrying request");
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
        }
    }
}

fn backoff_delay_ms(attempt: u32, policy: &RetryPolicy) -> u64 {
    let exp = policy
        .initial_backoff_ms
        .saturating_mul(2u64.saturating_pow(attempt));
    let capped = exp.min(policy.max_backoff_ms);
    let jitter = if policy.jitter_ms == 0 {
        0
    } else {
        rand::thread_rng().gen_range(0..=policy.jitter_ms)
    };
    capped.saturating_add(jitter)
}
