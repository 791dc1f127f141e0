//! Params and results exchanged with validators and proxies.

use fastset_types::{
    Address, Amount, Balance, Nonce, Signature, SignatureOrMultiSig, TokenId, Transaction,
    TransactionCertificate, TransactionHash, ValidatorName,
};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// `set_submitTransaction` and `proxy_submitTransaction` params.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitTransactionParams {
    pub transaction: Transaction,
    pub signature: SignatureOrMultiSig,
}

/// A validator's attestation of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitTransactionResponse {
    pub validator: ValidatorName,
    pub signature: Signature,
    pub next_nonce: Nonce,
    pub transaction_hash: TransactionHash,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitCertificateParams {
    pub transaction: Transaction,
    pub signature: SignatureOrMultiSig,
    pub validator_signatures: Vec<(ValidatorName, Signature)>,
}

/// Up to `limit` consecutive nonces starting at `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceRange {
    pub start: Nonce,
    pub limit: usize,
}

impl NonceRange {
    pub fn new(start: Nonce, limit: usize) -> Self {
        Self { start, limit }
    }

    pub fn contains(&self, nonce: Nonce) -> bool {
        nonce >= self.start && u128::from(nonce - self.start) < self.limit as u128
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfoParams {
    pub address: Address,
    /// `Some(vec![])` asks for every non-native token the account holds.
    #[serde(default)]
    pub token_balances_filter: Option<Vec<TokenId>>,
    #[serde(default)]
    pub certificate_by_nonce: Option<NonceRange>,
}

impl AccountInfoParams {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            token_balances_filter: None,
            certificate_by_nonce: None,
        }
    }

    pub fn with_tokens(mut self, token_ids: Vec<TokenId>) -> Self {
        self.token_balances_filter = Some(token_ids);
        self
    }

    pub fn with_certificates(mut self, range: NonceRange) -> Self {
        self.certificate_by_nonce = Some(range);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfoResponse {
    pub sender: Address,
    pub balance: Balance,
    pub next_nonce: Nonce,
    #[serde(default)]
    pub token_balance: Vec<(TokenId, Balance)>,
    /// Present when `certificate_by_nonce` was requested, in nonce order.
    #[serde(default)]
    pub requested_certificates: Option<Vec<TransactionCertificate>>,
}

impl AccountInfoResponse {
    pub fn token_balance(&self, token_id: &TokenId) -> Option<Balance> {
        self.token_balance
            .iter()
            .find(|(id, _)| id == token_id)
            .map(|(_, balance)| *balance)
    }
}

/// Token metadata as the validators record it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub update_id: Nonce,
    pub admin: Address,
    pub token_name: String,
    pub decimals: u8,
    pub total_supply: Amount,
    pub mints: Vec<Address>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfoParams {
    pub token_ids: Vec<TokenId>,
}

/// One entry per requested token, in request order. Unknown tokens map to `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfoResponse {
    pub requested_token_metadata: Vec<(TokenId, Option<TokenMetadata>)>,
}

impl TokenInfoResponse {
    pub fn metadata(&self, token_id: &TokenId) -> Option<&TokenMetadata> {
        self.requested_token_metadata
            .iter()
            .find(|(id, _)| id == token_id)
            .and_then(|(_, metadata)| metadata.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaucetDripParams {
    pub recipient: Address,
    pub amount: Amount,
    #[serde(default)]
    pub token_id: Option<TokenId>,
}

/// Outcome of `proxy_submitTransaction`.
///
/// On the wire: `{"Success": certificate}`, `{"IncompleteVerifierSigs": []}` or
/// `{"IncompleteMultiSig": []}`. Bare variant names are accepted when reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxySubmitTransactionResult {
    Success(TransactionCertificate),
    IncompleteVerifierSigs,
    IncompleteMultiSig,
}

impl ProxySubmitTransactionResult {
    const SUCCESS: &'static str = "Success";
    const INCOMPLETE_VERIFIER_SIGS: &'static str = "IncompleteVerifierSigs";
    const INCOMPLETE_MULTI_SIG: &'static str = "IncompleteMultiSig";

    pub fn certificate(&self) -> Option<&TransactionCertificate> {
        match self {
            Self::Success(certificate) => Some(certificate),
            _ => None,
        }
    }

    pub fn is_incomplete(&self) -> bool {
        !matches!(self, Self::Success(_))
    }

    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::String(name) => Self::unit_variant(&name),
            Value::Object(map) if map.len() == 1 => {
                let Some((name, payload)) = map.into_iter().next() else {
                    return Err("empty result object".to_string());
                };
                if name == Self::SUCCESS {
                    return serde_json::from_value(payload)
                        .map(Self::Success)
                        .map_err(|err| err.to_string());
                }
                match &payload {
                    Value::Null => Self::unit_variant(&name),
                    Value::Array(items) if items.is_empty() => Self::unit_variant(&name),
                    _ => Err(format!("unexpected payload for `{name}`")),
                }
            }
            other => Err(format!("unexpected proxy result: {other}")),
        }
    }

    fn unit_variant(name: &str) -> Result<Self, String> {
        match name {
            Self::INCOMPLETE_VERIFIER_SIGS => Ok(Self::IncompleteVerifierSigs),
            Self::INCOMPLETE_MULTI_SIG => Ok(Self::IncompleteMultiSig),
            other => Err(format!("unknown proxy result variant `{other}`")),
        }
    }
}

impl Serialize for ProxySubmitTransactionResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        match self {
            Self::Success(certificate) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(Self::SUCCESS, certificate)?;
                map.end()
            }
            Self::IncompleteVerifierSigs => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(Self::INCOMPLETE_VERIFIER_SIGS, &[(); 0])?;
                map.end()
            }
            Self::IncompleteMultiSig => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(Self::INCOMPLETE_MULTI_SIG, &[(); 0])?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for ProxySubmitTransactionResult {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use fastset_types::{
        Address, Amount, Balance, ClaimType, Signature, SignatureOrMultiSig, TokenId, Transaction,
        TransactionCertificate, TransactionEnvelope,
    };
    use serde_json::json;

    use super::{
        AccountInfoParams, AccountInfoResponse, FaucetDripParams, NonceRange,
        ProxySubmitTransactionResult, TokenInfoResponse, TokenMetadata,
    };

    fn certificate() -> TransactionCertificate {
        TransactionCertificate {
            envelope: TransactionEnvelope {
                transaction: Transaction {
                    sender: Address::new([1; 32]),
                    recipient: Address::new([2; 32]),
                    nonce: 0,
                    timestamp_nanos: 1,
                    claim: ClaimType::token_transfer(TokenId::native(), Amount::from(1u64), None),
                },
                signature: SignatureOrMultiSig::Signature(Signature::new([3; 64])),
            },
            signatures: vec![(Address::new([4; 32]), Signature::new([5; 64]))],
        }
    }

    #[test]
    fn proxy_result_wire_forms() {
        assert_eq!(
            serde_json::to_value(ProxySubmitTransactionResult::IncompleteVerifierSigs).unwrap(),
            json!({ "IncompleteVerifierSigs": [] })
        );
        assert_eq!(
            serde_json::to_string(&ProxySubmitTransactionResult::IncompleteMultiSig).unwrap(),
            r#"{"IncompleteMultiSig":[]}"#
        );
        let success = ProxySubmitTransactionResult::Success(certificate());
        let encoded = serde_json::to_value(&success).unwrap();
        assert!(encoded.get("Success").is_some());
        let decoded: ProxySubmitTransactionResult = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, success);
        assert_eq!(decoded.certificate(), Some(&certificate()));
    }

    #[test]
    fn proxy_result_accepts_empty_tuple_forms() {
        let verifier: ProxySubmitTransactionResult =
            serde_json::from_value(json!({ "IncompleteVerifierSigs": [] })).unwrap();
        assert_eq!(verifier, ProxySubmitTransactionResult::IncompleteVerifierSigs);
        let multisig: ProxySubmitTransactionResult =
            serde_json::from_value(json!("IncompleteMultiSig")).unwrap();
        assert!(multisig.is_incomplete());
        assert!(serde_json::from_value::<ProxySubmitTransactionResult>(json!("Bogus")).is_err());
        assert!(
            serde_json::from_value::<ProxySubmitTransactionResult>(json!({ "IncompleteMultiSig": [1] }))
                .is_err()
        );
    }

    #[test]
    fn account_info_parses_negative_balances_and_extra_fields() {
        let raw = json!({
            "sender": vec![7u8; 32],
            "balance": "-ff",
            "next_nonce": 3,
            "pending_confirmation": null,
            "token_balance": [[vec![9u8; 32], "10"]]
        });
        let info: AccountInfoResponse = serde_json::from_value(raw).unwrap();
        assert!(info.balance.is_negative());
        assert_eq!(info.next_nonce, 3);
        assert_eq!(info.requested_certificates, None);
        assert_eq!(
            info.token_balance(&TokenId::new([9; 32])),
            Some(Balance::from_amount(Amount::from(16u64)))
        );
    }

    #[test]
    fn faucet_token_is_optional() {
        let params: FaucetDripParams =
            serde_json::from_value(json!({ "recipient": vec![1u8; 32], "amount": "de0b6b3a7640000" }))
                .unwrap();
        assert_eq!(params.token_id, None);
        assert_eq!(params.amount, Amount::from(1_000_000_000_000_000_000u64));
    }

    #[test]
    fn nonce_range_bounds() {
        let range = NonceRange::new(3, 2);
        assert!(!range.contains(2));
        assert!(range.contains(3) && range.contains(4));
        assert!(!range.contains(5));
        assert!(!NonceRange::new(0, 0).contains(0));
        assert!(NonceRange::new(u64::MAX, usize::MAX).contains(u64::MAX));
    }

    #[test]
    fn account_info_params_carry_certificate_window() {
        let params = AccountInfoParams::new(Address::new([1; 32]))
            .with_tokens(vec![])
            .with_certificates(NonceRange::new(0, 10));
        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(value["certificate_by_nonce"], json!({ "start": 0, "limit": 10 }));
        assert_eq!(value["token_balances_filter"], json!([]));
        let bare: AccountInfoParams =
            serde_json::from_value(json!({ "address": vec![1u8; 32] })).unwrap();
        assert_eq!(bare, AccountInfoParams::new(Address::new([1; 32])));
    }

    #[test]
    fn token_info_lists_unknown_tokens_as_null() {
        let known = TokenId::new([0xaa; 32]);
        let unknown = TokenId::new([0xab; 32]);
        let raw = json!({
            "requested_token_metadata": [
                [vec![0xaau8; 32], {
                    "update_id": 1,
                    "admin": vec![2u8; 32],
                    "token_name": "DEMO",
                    "decimals": 6,
                    "total_supply": "f4240",
                    "mints": [vec![2u8; 32]]
                }],
                [vec![0xabu8; 32], null]
            ]
        });
        let response: TokenInfoResponse = serde_json::from_value(raw).unwrap();
        let metadata: &TokenMetadata = response.metadata(&known).expect("known token");
        assert_eq!(metadata.decimals, 6);
        assert_eq!(metadata.total_supply, Amount::from(1_000_000u64));
        assert_eq!(response.metadata(&unknown), None);
        assert_eq!(response.requested_token_metadata.len(), 2);
    }
}
