//! Demo binary: single-validator, quorum, proxy and HTTP flows over a local network, or one
//! transfer against live endpoints when `--proxy-url` / `--validators` are given.

use clap::Parser;
use fastset_client::{
    FastSetClient, HttpTransport, MockTransport, MultiValidatorTransport, RequestMeta,
    RpcTransport, TransportConfig, TxBuilder, ValidatorEndpoint,
};
use fastset_crypto::{Ed25519KeyPair, Ed25519Scheme};
use fastset_rpc::{NonceRange, ProxyApiClient, ProxySubmitTransactionResult};
use fastset_types::{Address, Amount, Committee, Signer, TokenId};
use fastset_validator_mock::{DemoScenario, ServedNetwork, SharedHandler};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

type DemoResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser, Debug)]
#[command(name = "fastset-demo", about = "Run FastSet transfer flows")]
struct Cli {
    /// Proxy JSON-RPC URL.
    #[arg(long, env = "FASTSET_PROXY_URL")]
    proxy_url: Option<String>,

    /// Validator endpoints as `name=url`, comma separated.
    #[arg(long, env = "FASTSET_VALIDATORS", value_delimiter = ',')]
    validators: Vec<ValidatorEndpoint>,

    /// Committee member addresses (bech32m or hex), comma separated. Required with
    /// `--validators`.
    #[arg(long, env = "FASTSET_COMMITTEE", value_delimiter = ',')]
    committee: Vec<Address>,

    /// Hex-encoded 32-byte Ed25519 seed of the sending account.
    #[arg(long, env = "FASTSET_SENDER_SEED")]
    sender_seed: Option<String>,

    /// Recipient address (bech32m or hex).
    #[arg(long, env = "FASTSET_RECIPIENT")]
    recipient: Option<Address>,

    /// Transfer amount, hex.
    #[arg(long, env = "FASTSET_AMOUNT", default_value = "ffff")]
    amount: Amount,

    /// Ask the proxy faucet for this amount (hex) before sending.
    #[arg(long, env = "FASTSET_FAUCET")]
    faucet: Option<Amount>,

    /// Per-request timeout in milliseconds.
    #[arg(long, env = "FASTSET_TIMEOUT_MS", default_value = "3000")]
    timeout_ms: u64,

    /// Validators in the in-memory network.
    #[arg(long, default_value = "4")]
    validator_count: usize,
}

impl Cli {
    fn is_live(&self) -> bool {
        self.proxy_url.is_some() || !self.validators.is_empty()
    }
}

fn in_memory_client(
    scenario: &DemoScenario,
    meta: RequestMeta,
) -> FastSetClient<MockTransport, Ed25519Scheme> {
    let transports = scenario
        .validators
        .iter()
        .enumerate()
        .map(|(index, validator)| {
            let handler: SharedHandler = validator.clone();
            MockTransport::new(format!("validator-{index}"), handler)
        })
        .collect();
    let proxy: SharedHandler = scenario.proxy.clone();
    FastSetClient::new(
        MultiValidatorTransport::new(transports),
        scenario.committee.clone(),
        Ed25519Scheme,
    )
    .with_proxy(MockTransport::new("proxy", proxy))
    .with_request_meta(meta)
}

fn set_offline(scenario: &DemoScenario, indices: &[usize], offline: bool) -> DemoResult<()> {
    for index in indices {
        let validator = scenario
            .validators
            .get(*index)
            .ok_or("no such validator")?;
        validator
            .lock()
            .map_err(|_| "validator mutex poisoned")?
            .set_offline(offline);
    }
    Ok(())
}

async fn single_validator_flow(meta: RequestMeta) -> DemoResult<()> {
    let scenario = DemoScenario::single_validator()?;
    let accounts = &scenario.accounts;
    let mut client = in_memory_client(&scenario, meta);

    info!("Single validator: Alice -> Bob 0xffff");
    let certificate = client
        .send_transfer(
            &accounts.alice,
            accounts.bob.address(),
            TokenId::native(),
            Amount::from(0xffffu64),
        )
        .await?;
    info!(
        nonce = certificate.transaction().nonce,
        attestations = certificate.signatures.len(),
        "certificate formed"
    );
    let info = client.account_info(accounts.bob.address()).await?;
    if let Some(info) = info {
        info!(balance = %info.balance, "Bob's native balance");
    }
    Ok(())
}

async fn quorum_flow(validator_count: usize, meta: RequestMeta) -> DemoResult<()> {
    let scenario = DemoScenario::new(validator_count)?;
    let accounts = &scenario.accounts;
    let mut client = in_memory_client(&scenario, meta);
    info!(
        validators = scenario.committee.len(),
        quorum = scenario.committee.quorum(),
        "Quorum flow"
    );

    // Take down as many validators as the committee tolerates.
    let spare: Vec<usize> =
        (scenario.committee.quorum()..scenario.committee.len()).collect();
    set_offline(&scenario, &spare, true)?;
    let nonce = client.next_nonce(accounts.alice.address()).await?;
    let built = TxBuilder::new()
        .with_transfer(accounts.alice.address(), accounts.carol.address(), Amount::from(42u64))
        .with_nonce(nonce)
        .build()?;
    let mut submission = client.prepare(built.transaction)?;
    submission.sign(&accounts.alice)?;
    let state = client.collect_attestations(&mut submission).await?;
    info!(%state, "Alice -> Carol attestations");
    let certificate = client.submit_certificate(&mut submission).await?;
    info!(
        tx_hash = %built.hash,
        attestations = certificate.signatures.len(),
        "Alice -> Carol certified"
    );
    set_offline(&scenario, &spare, false)?;

    info!("Bob -> Carol 5 of the demo token");
    let certificate = client
        .send_transfer(
            &accounts.bob,
            accounts.carol.address(),
            accounts.token,
            Amount::from(5u64),
        )
        .await?;
    info!(
        attestations = certificate.signatures.len(),
        "Bob -> Carol certified"
    );
    Ok(())
}

async fn proxy_flow(meta: RequestMeta) -> DemoResult<()> {
    let scenario = DemoScenario::new(4)?;
    let mut client = in_memory_client(&scenario, meta);
    let dora = Ed25519KeyPair::from_seed([0x44; 32]);
    let recipient = scenario.accounts.bob.address();

    client
        .faucet_drip(dora.address(), Amount::from(0x10_0000u64), None)
        .await?;
    info!(address = %dora.address(), "Dora funded by the faucet");

    let nonce = client.next_nonce(dora.address()).await?;
    let envelope = TxBuilder::new()
        .with_transfer(dora.address(), recipient, Amount::from(0x1000u64))
        .with_nonce(nonce)
        .sign(&dora)?;

    set_offline(&scenario, &[1, 2], true)?;
    let result = client.proxy_submit(envelope.clone()).await?;
    info!(outcome = ?result, "proxy submit with two validators offline");

    set_offline(&scenario, &[1, 2], false)?;
    match client.proxy_submit(envelope).await? {
        ProxySubmitTransactionResult::Success(certificate) => info!(
            attestations = certificate.signatures.len(),
            "proxy returned a certificate"
        ),
        other => warn!(outcome = ?other, "proxy submission still incomplete"),
    }
    Ok(())
}

/// The same network served over HTTP: a committee client talking to each validator, then a
/// proxy-only client that knows no committee.
async fn http_flow(meta: RequestMeta) -> DemoResult<()> {
    let scenario = DemoScenario::new(4)?;
    let network = ServedNetwork::start(&scenario).await?;
    let accounts = &scenario.accounts;
    info!(proxy = %network.proxy_url, validators = network.validator_urls.len(), "HTTP flow");

    let validators = network
        .validator_urls
        .iter()
        .map(|(name, url)| HttpTransport::new(name, url, meta.timeout_ms))
        .collect::<Result<Vec<_>, _>>()?;
    let proxy = HttpTransport::new("proxy", &network.proxy_url, meta.timeout_ms)?;
    let mut client: FastSetClient<HttpTransport, Ed25519Scheme> = FastSetClient::new(
        MultiValidatorTransport::new(validators),
        scenario.committee.clone(),
        Ed25519Scheme,
    )
    .with_request_meta(meta.clone());
    let certificate = client
        .send_transfer(
            &accounts.carol,
            accounts.alice.address(),
            TokenId::native(),
            Amount::from(7u64),
        )
        .await?;
    info!(
        nonce = certificate.transaction().nonce,
        attestations = certificate.signatures.len(),
        "Carol -> Alice certified over HTTP"
    );
    let history = client
        .certificates_by_nonce(accounts.carol.address(), NonceRange::new(0, 10))
        .await?;
    info!(count = history.len(), "Carol's certificates");

    let tokens = ProxyApiClient::get_token_info(proxy.client(), vec![accounts.token]).await?;
    if let Some(metadata) = tokens.metadata(&accounts.token) {
        info!(name = %metadata.token_name, supply = %metadata.total_supply, "demo token");
    }

    let mut proxy_client: FastSetClient<HttpTransport, Ed25519Scheme> =
        FastSetClient::for_proxy(proxy, Ed25519Scheme).with_request_meta(meta);
    let nonce = proxy_client.next_nonce(accounts.bob.address()).await?;
    let envelope = TxBuilder::new()
        .with_transfer(accounts.bob.address(), accounts.carol.address(), Amount::from(9u64))
        .with_nonce(nonce)
        .sign(&accounts.bob)?;
    let result = proxy_client.proxy_submit(envelope).await?;
    info!(outcome = ?result, "proxy-only submission over HTTP");

    network.stop();
    Ok(())
}

async fn live_flow(cli: &Cli) -> DemoResult<()> {
    let config = TransportConfig {
        validators: cli.validators.clone(),
        proxy: cli.proxy_url.clone(),
        request_timeout_ms: cli.timeout_ms,
        ..TransportConfig::default()
    };
    let seed_hex = cli
        .sender_seed
        .as_deref()
        .ok_or("--sender-seed is required in live mode")?;
    let seed: [u8; 32] = hex::decode(seed_hex.trim_start_matches("0x"))?
        .try_into()
        .map_err(|_| "sender seed must be 32 bytes")?;
    let sender = Ed25519KeyPair::from_seed(seed);
    let recipient = cli
        .recipient
        .ok_or("--recipient is required in live mode")?;

    let mut client: FastSetClient<HttpTransport, Ed25519Scheme> = if config.validators.is_empty()
    {
        let proxy = config
            .http_proxy()?
            .ok_or("--proxy-url or --validators is required in live mode")?;
        info!(endpoint = proxy.name(), url = proxy.url(), "using proxy only");
        FastSetClient::for_proxy(proxy, Ed25519Scheme)
    } else {
        let committee = Committee::new(cli.committee.clone())?;
        let mut client = FastSetClient::new(
            MultiValidatorTransport::new(config.http_validators()?),
            committee,
            Ed25519Scheme,
        );
        if let Some(proxy) = config.http_proxy()? {
            info!(endpoint = proxy.name(), url = proxy.url(), "using proxy");
            client = client.with_proxy(proxy);
        }
        client
    }
    .with_request_meta(RequestMeta::from(&config));

    if let Some(amount) = cli.faucet {
        client.faucet_drip(sender.address(), amount, None).await?;
        info!(address = %sender.address(), %amount, "faucet drip requested");
    }

    if client.committee().is_none() {
        let nonce = client.next_nonce(sender.address()).await?;
        let envelope = TxBuilder::new()
            .with_transfer(sender.address(), recipient, cli.amount)
            .with_nonce(nonce)
            .sign(&sender)?;
        let result = client.proxy_submit(envelope).await?;
        info!(outcome = ?result, "proxy submission finished");
    } else {
        let certificate = client
            .send_transfer(&sender, recipient, TokenId::native(), cli.amount)
            .await?;
        info!(
            nonce = certificate.transaction().nonce,
            attestations = certificate.signatures.len(),
            "transfer certified"
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> DemoResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    if cli.is_live() {
        return live_flow(&cli).await;
    }

    let meta = RequestMeta::default();
    single_validator_flow(meta.clone()).await?;
    quorum_flow(cli.validator_count, meta.clone()).await?;
    proxy_flow(meta.clone()).await?;
    http_flow(meta).await?;
    Ok(())
}
