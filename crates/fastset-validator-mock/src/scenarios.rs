use fastset_crypto::Ed25519KeyPair;
use fastset_rpc::TokenMetadata;
use fastset_types::{Address, Amount, Committee, Signer, TokenId, ValidationError};

use crate::{
    mock_proxy::{MockProxy, SharedProxy},
    mock_validator::{MockValidator, SharedValidator},
};

pub const VALIDATOR_NAMES: [&str; 4] = ["Dave", "Edgar", "Frank", "Grace"];

#[derive(Debug, Clone)]
pub struct DemoAccounts {
    pub alice: Ed25519KeyPair,
    pub bob: Ed25519KeyPair,
    pub carol: Ed25519KeyPair,
    pub token: TokenId,
}

impl DemoAccounts {
    fn new() -> Self {
        Self {
            alice: Ed25519KeyPair::from_seed([0x11; 32]),
            bob: Ed25519KeyPair::from_seed([0x22; 32]),
            carol: Ed25519KeyPair::from_seed([0x33; 32]),
            token: TokenId::new([0xaa; 32]),
        }
    }

    fn genesis(&self) -> Vec<(Address, TokenId, Amount)> {
        let native = TokenId::native();
        vec![
            (self.alice.address(), native, Amount::from(1_000_000u64)),
            (self.alice.address(), self.token, Amount::from(15u64)),
            (self.bob.address(), native, Amount::from(500_000u64)),
            (self.bob.address(), self.token, Amount::from(5u64)),
            (self.carol.address(), native, Amount::from(500_000u64)),
        ]
    }

    /// Native token plus the demo token, with supplies matching the genesis balances.
    fn tokens(&self) -> Vec<(TokenId, TokenMetadata)> {
        let genesis = self.genesis();
        let supply = |token_id: TokenId| {
            genesis
                .iter()
                .filter(|(_, id, _)| *id == token_id)
                .fold(Amount::ZERO, |total, (_, _, amount)| {
                    total.checked_add(*amount).unwrap_or(total)
                })
        };
        vec![
            (
                TokenId::native(),
                TokenMetadata {
                    update_id: 0,
                    admin: Address::default(),
                    token_name: "SET".to_string(),
                    decimals: 18,
                    total_supply: supply(TokenId::native()),
                    mints: Vec::new(),
                },
            ),
            (
                self.token,
                TokenMetadata {
                    update_id: 0,
                    admin: self.alice.address(),
                    token_name: "DEMO".to_string(),
                    decimals: 6,
                    total_supply: supply(self.token),
                    mints: vec![self.alice.address()],
                },
            ),
        ]
    }
}

/// A funded in-memory network: validators sharing one committee plus a proxy in front of them.
#[derive(Clone)]
pub struct DemoScenario {
    pub accounts: DemoAccounts,
    pub committee: Committee,
    pub validators: Vec<SharedValidator>,
    pub proxy: SharedProxy,
}

impl DemoScenario {
    pub fn new(validator_count: usize) -> Result<Self, ValidationError> {
        let keys: Vec<(String, Ed25519KeyPair)> = (0..validator_count)
            .map(|index| {
                let name = VALIDATOR_NAMES
                    .get(index)
                    .map(|name| name.to_string())
                    .unwrap_or_else(|| format!("Validator-{index}"));
                let seed = [0x41u8.wrapping_add(index as u8); 32];
                (name, Ed25519KeyPair::from_seed(seed))
            })
            .collect();
        let committee = Committee::new(keys.iter().map(|(_, key)| key.address()).collect())?;

        let accounts = DemoAccounts::new();
        let genesis = accounts.genesis();
        let tokens = accounts.tokens();
        let validators: Vec<SharedValidator> = keys
            .into_iter()
            .map(|(name, key)| {
                let mut validator = MockValidator::new(name, key, committee.clone());
                for (address, token_id, amount) in &genesis {
                    validator.set_balance(*address, *token_id, *amount);
                }
                for (token_id, metadata) in &tokens {
                    validator.register_token(*token_id, metadata.clone());
                }
                validator.into_shared()
            })
            .collect();
        let proxy = MockProxy::new(committee.clone(), validators.clone()).into_shared();

        Ok(Self {
            accounts,
            committee,
            validators,
            proxy,
        })
    }

    /// One validator, quorum one.
    pub fn single_validator() -> Result<Self, ValidationError> {
        Self::new(1)
    }

    pub fn validator(&self, name: &str) -> Option<&SharedValidator> {
        self.validators.iter().find(|validator| {
            validator
                .lock()
                .map(|validator| validator.name() == name)
                .unwrap_or(false)
        })
    }
}
