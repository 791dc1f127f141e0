//! Transaction model: claims, transactions, envelopes, multisig, and certificates.
//!
//! Every type here has an explicit canonical encoding. The encoding of `Transaction` is the
//! exact byte string signed under the `Transaction` domain.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{
    amount::Amount,
    codec::{put_variant, Canonical, Reader},
    error::{FormatError, ValidationError},
    ids::{Address, Nonce, Signature, TokenId, UserData},
    traits::Signable,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTransfer {
    pub token_id: TokenId,
    pub amount: Amount,
    pub user_data: UserData,
}

impl Canonical for TokenTransfer {
    fn encode_into(&self, out: &mut Vec<u8>) {
        self.token_id.encode_into(out);
        self.amount.encode_into(out);
        self.user_data.encode_into(out);
    }

    fn decode_from(reader: &mut Reader<'_>) -> Result<Self, FormatError> {
        Ok(Self {
            token_id: TokenId::decode_from(reader)?,
            amount: Amount::decode_from(reader)?,
            user_data: UserData::decode_from(reader)?,
        })
    }
}

/// The operation a transaction requests. Variant indices are part of the wire contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimType {
    TokenTransfer(TokenTransfer),
}

impl ClaimType {
    const TOKEN_TRANSFER: u32 = 0;

    pub fn token_transfer(token_id: TokenId, amount: Amount, user_data: UserData) -> Self {
        Self::TokenTransfer(TokenTransfer {
            token_id,
            amount,
            user_data,
        })
    }
}

impl Canonical for ClaimType {
    fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Self::TokenTransfer(transfer) => {
                put_variant(out, Self::TOKEN_TRANSFER);
                transfer.encode_into(out);
            }
        }
    }

    fn decode_from(reader: &mut Reader<'_>) -> Result<Self, FormatError> {
        match reader.read_variant()? {
            Self::TOKEN_TRANSFER => Ok(Self::TokenTransfer(TokenTransfer::decode_from(reader)?)),
            value => Err(FormatError::InvalidDiscriminant {
                type_name: "ClaimType",
                value,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: Address,
    pub recipient: Address,
    pub nonce: Nonce,
    #[serde(with = "crate::serde_helpers::u128_number_or_string")]
    pub timestamp_nanos: u128,
    pub claim: ClaimType,
}

impl Transaction {
    pub fn token_transfer(&self) -> Option<&TokenTransfer> {
        match &self.claim {
            ClaimType::TokenTransfer(transfer) => Some(transfer),
        }
    }
}

impl Canonical for Transaction {
    fn encode_into(&self, out: &mut Vec<u8>) {
        self.sender.encode_into(out);
        self.recipient.encode_into(out);
        self.nonce.encode_into(out);
        self.timestamp_nanos.encode_into(out);
        self.claim.encode_into(out);
    }

    fn decode_from(reader: &mut Reader<'_>) -> Result<Self, FormatError> {
        Ok(Self {
            sender: Address::decode_from(reader)?,
            recipient: Address::decode_from(reader)?,
            nonce: Nonce::decode_from(reader)?,
            timestamp_nanos: u128::decode_from(reader)?,
            claim: ClaimType::decode_from(reader)?,
        })
    }
}

impl Signable for Transaction {
    const TYPE_NAME: &'static str = "Transaction";
}

/// Authority policy of a multisig account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiSigConfig {
    pub authorized_signers: Vec<Address>,
    pub quorum: u64,
    /// Distinguishes accounts sharing the same committee and quorum.
    pub nonce: Nonce,
}

impl MultiSigConfig {
    pub fn is_authorized(&self, signer: &Address) -> bool {
        self.authorized_signers.contains(signer)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut seen = HashSet::with_capacity(self.authorized_signers.len());
        for signer in &self.authorized_signers {
            if !seen.insert(signer) {
                return Err(ValidationError::Message(format!(
                    "duplicate authorized signer {signer}"
                )));
            }
        }
        if self.quorum == 0 || self.quorum > self.authorized_signers.len() as u64 {
            return Err(ValidationError::Message(format!(
                "quorum {} out of range 1..={}",
                self.quorum,
                self.authorized_signers.len()
            )));
        }
        Ok(())
    }
}

impl Canonical for MultiSigConfig {
    fn encode_into(&self, out: &mut Vec<u8>) {
        self.authorized_signers.encode_into(out);
        self.quorum.encode_into(out);
        self.nonce.encode_into(out);
    }

    fn decode_from(reader: &mut Reader<'_>) -> Result<Self, FormatError> {
        Ok(Self {
            authorized_signers: Vec::<Address>::decode_from(reader)?,
            quorum: u64::decode_from(reader)?,
            nonce: Nonce::decode_from(reader)?,
        })
    }
}

impl Signable for MultiSigConfig {
    const TYPE_NAME: &'static str = "MultiSigConfig";
}

/// Aggregate of signer signatures. Entries keep insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiSig {
    pub config: MultiSigConfig,
    pub signatures: Vec<(Address, Signature)>,
}

impl MultiSig {
    pub fn new(config: MultiSigConfig) -> Self {
        Self {
            config,
            signatures: Vec::new(),
        }
    }

    pub fn has_signer(&self, signer: &Address) -> bool {
        self.signatures.iter().any(|(existing, _)| existing == signer)
    }

    /// Distinct authorized signers present in the aggregate.
    pub fn distinct_authorized_signers(&self) -> usize {
        self.signatures
            .iter()
            .map(|(signer, _)| signer)
            .filter(|signer| self.config.is_authorized(signer))
            .collect::<HashSet<_>>()
            .len()
    }
}

impl Canonical for MultiSig {
    fn encode_into(&self, out: &mut Vec<u8>) {
        self.config.encode_into(out);
        self.signatures.encode_into(out);
    }

    fn decode_from(reader: &mut Reader<'_>) -> Result<Self, FormatError> {
        Ok(Self {
            config: MultiSigConfig::decode_from(reader)?,
            signatures: Vec::<(Address, Signature)>::decode_from(reader)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureOrMultiSig {
    Signature(Signature),
    MultiSig(MultiSig),
}

impl SignatureOrMultiSig {
    const SIGNATURE: u32 = 0;
    const MULTI_SIG: u32 = 1;
}

impl Canonical for SignatureOrMultiSig {
    fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Self::Signature(signature) => {
                put_variant(out, Self::SIGNATURE);
                signature.encode_into(out);
            }
            Self::MultiSig(multisig) => {
                put_variant(out, Self::MULTI_SIG);
                multisig.encode_into(out);
            }
        }
    }

    fn decode_from(reader: &mut Reader<'_>) -> Result<Self, FormatError> {
        match reader.read_variant()? {
            Self::SIGNATURE => Ok(Self::Signature(Signature::decode_from(reader)?)),
            Self::MULTI_SIG => Ok(Self::MultiSig(MultiSig::decode_from(reader)?)),
            value => Err(FormatError::InvalidDiscriminant {
                type_name: "SignatureOrMultiSig",
                value,
            }),
        }
    }
}

/// A transaction plus its authorizing signature; the unit submitted to validators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEnvelope {
    pub transaction: Transaction,
    pub signature: SignatureOrMultiSig,
}

impl Canonical for TransactionEnvelope {
    fn encode_into(&self, out: &mut Vec<u8>) {
        self.transaction.encode_into(out);
        self.signature.encode_into(out);
    }

    fn decode_from(reader: &mut Reader<'_>) -> Result<Self, FormatError> {
        Ok(Self {
            transaction: Transaction::decode_from(reader)?,
            signature: SignatureOrMultiSig::decode_from(reader)?,
        })
    }
}

impl Signable for TransactionEnvelope {
    const TYPE_NAME: &'static str = "TransactionEnvelope";
}

/// An envelope plus validator attestations. Proves finality once the attestations reach the
/// committee quorum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionCertificate {
    pub envelope: TransactionEnvelope,
    pub signatures: Vec<(Address, Signature)>,
}

impl TransactionCertificate {
    pub fn transaction(&self) -> &Transaction {
        &self.envelope.transaction
    }

    pub fn signers(&self) -> impl Iterator<Item = &Address> {
        self.signatures.iter().map(|(validator, _)| validator)
    }
}

impl Canonical for TransactionCertificate {
    fn encode_into(&self, out: &mut Vec<u8>) {
        self.envelope.encode_into(out);
        self.signatures.encode_into(out);
    }

    fn decode_from(reader: &mut Reader<'_>) -> Result<Self, FormatError> {
        Ok(Self {
            envelope: TransactionEnvelope::decode_from(reader)?,
            signatures: Vec::<(Address, Signature)>::decode_from(reader)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ClaimType, MultiSig, MultiSigConfig, SignatureOrMultiSig, Transaction,
        TransactionCertificate, TransactionEnvelope,
    };
    use crate::{
        codec::{decode, encode, Canonical},
        error::FormatError,
        ids::{Address, Signature, TokenId},
        Amount,
    };

    fn sample_transaction() -> Transaction {
        Transaction {
            sender: Address::new([0x01; 32]),
            recipient: Address::new([0x02; 32]),
            nonce: 7,
            timestamp_nanos: 1_700_000_000_000_000_000,
            claim: ClaimType::token_transfer(TokenId::native(), Amount::from(0xffffu64), None),
        }
    }

    #[test]
    fn transaction_golden_layout() {
        let bytes = encode(&sample_transaction());
        // sender(32) recipient(32) nonce(8) timestamp(16) tag(1) token(32) amount(32) user_data(1)
        assert_eq!(bytes.len(), 32 + 32 + 8 + 16 + 1 + 32 + 32 + 1);
        assert_eq!(&bytes[..32], &[0x01; 32]);
        assert_eq!(&bytes[32..64], &[0x02; 32]);
        assert_eq!(&bytes[64..72], &7u64.to_le_bytes());
        assert_eq!(&bytes[72..88], &1_700_000_000_000_000_000u128.to_le_bytes());
        assert_eq!(bytes[88], 0, "TokenTransfer discriminant");
        assert_eq!(&bytes[89..93], &[0xfa, 0x57, 0x5e, 0x70]);
        assert_eq!(&bytes[121..124], &[0xff, 0xff, 0x00]);
        assert_eq!(bytes[153], 0, "absent user data");
    }

    #[test]
    fn user_data_adds_presence_flag_and_payload() {
        let mut tx = sample_transaction();
        tx.claim = ClaimType::token_transfer(TokenId::native(), Amount::from(1u64), Some([9; 32]));
        let bytes = encode(&tx);
        assert_eq!(bytes.len(), 154 + 32);
        assert_eq!(bytes[153], 1);
        assert_eq!(decode::<Transaction>(&bytes).unwrap(), tx);
    }

    #[test]
    fn unknown_claim_discriminant_is_format_error() {
        let mut bytes = encode(&sample_transaction());
        bytes[88] = 5;
        assert_eq!(
            decode::<Transaction>(&bytes),
            Err(FormatError::InvalidDiscriminant {
                type_name: "ClaimType",
                value: 5
            })
        );
    }

    #[test]
    fn unknown_signature_discriminant_is_format_error() {
        let err = SignatureOrMultiSig::from_canonical_bytes(&[2]).expect_err("must fail");
        assert!(matches!(
            err,
            FormatError::InvalidDiscriminant {
                type_name: "SignatureOrMultiSig",
                value: 2
            }
        ));
    }

    #[test]
    fn multisig_signatures_keep_insertion_order() {
        let config = MultiSigConfig {
            authorized_signers: vec![Address::new([3; 32]), Address::new([1; 32])],
            quorum: 2,
            nonce: 0,
        };
        let mut multisig = MultiSig::new(config);
        multisig.signatures.push((Address::new([3; 32]), Signature::new([0xaa; 64])));
        multisig.signatures.push((Address::new([1; 32]), Signature::new([0xbb; 64])));
        let envelope = TransactionEnvelope {
            transaction: sample_transaction(),
            signature: SignatureOrMultiSig::MultiSig(multisig.clone()),
        };
        let bytes = encode(&envelope);
        let decoded = decode::<TransactionEnvelope>(&bytes).unwrap();
        assert_eq!(decoded, envelope);
        let SignatureOrMultiSig::MultiSig(decoded_multisig) = decoded.signature else {
            panic!("expected multisig");
        };
        assert_eq!(decoded_multisig.signatures[0].0, Address::new([3; 32]));
        assert_eq!(decoded_multisig.distinct_authorized_signers(), 2);
    }

    #[test]
    fn certificate_round_trip_and_trailing_bytes() {
        let certificate = TransactionCertificate {
            envelope: TransactionEnvelope {
                transaction: sample_transaction(),
                signature: SignatureOrMultiSig::Signature(Signature::new([0x11; 64])),
            },
            signatures: vec![(Address::new([0xd1; 32]), Signature::new([0x22; 64]))],
        };
        let mut bytes = encode(&certificate);
        assert_eq!(decode::<TransactionCertificate>(&bytes).unwrap(), certificate);
        bytes.push(0);
        assert_eq!(
            decode::<TransactionCertificate>(&bytes),
            Err(FormatError::TrailingBytes(1))
        );
    }

    #[test]
    fn config_validation() {
        let a = Address::new([1; 32]);
        let b = Address::new([2; 32]);
        let ok = MultiSigConfig {
            authorized_signers: vec![a, b],
            quorum: 2,
            nonce: 0,
        };
        assert!(ok.validate().is_ok());
        let zero = MultiSigConfig { quorum: 0, ..ok.clone() };
        assert!(zero.validate().is_err());
        let too_high = MultiSigConfig { quorum: 3, ..ok.clone() };
        assert!(too_high.validate().is_err());
        let dup = MultiSigConfig {
            authorized_signers: vec![a, a],
            quorum: 1,
            nonce: 0,
        };
        assert!(dup.validate().is_err());
    }

    #[test]
    fn self_transfer_and_zero_amount_are_ordinary_transactions() {
        let tx = sample_transaction();
        let burn = Transaction {
            recipient: tx.sender,
            claim: ClaimType::token_transfer(TokenId::native(), Amount::ZERO, None),
            ..tx
        };
        let bytes = encode(&burn);
        assert_eq!(bytes.len(), 154);
        assert_eq!(&bytes[..32], &bytes[32..64]);
        assert_eq!(decode::<Transaction>(&bytes).unwrap(), burn);
    }

    #[test]
    fn transaction_json_shape() {
        let json = serde_json::to_value(sample_transaction()).unwrap();
        assert_eq!(json["nonce"], serde_json::json!(7));
        assert_eq!(
            json["timestamp_nanos"],
            serde_json::json!(1_700_000_000_000_000_000u64)
        );
        assert_eq!(json["claim"]["TokenTransfer"]["amount"], serde_json::json!("ffff"));
        assert_eq!(json["claim"]["TokenTransfer"]["user_data"], serde_json::Value::Null);
        assert_eq!(json["sender"].as_array().unwrap().len(), 32);
        let back: Transaction = serde_json::from_value(json).unwrap();
        assert_eq!(back, sample_transaction());
    }
}
