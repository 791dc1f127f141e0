//! Property-based tests for canonical encoding round trips.

use alloy_primitives::U256;
use fastset_types::{
    decode, encode, Address, Amount, ClaimType, FormatError, MultiSig, MultiSigConfig,
    Signature, SignatureOrMultiSig, TokenId, Transaction, TransactionCertificate,
    TransactionEnvelope,
};
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

fn arb_address() -> impl Strategy<Value = Address> {
    prop::array::uniform32(any::<u8>()).prop_map(Address::new)
}

fn arb_signature() -> impl Strategy<Value = Signature> {
    prop::collection::vec(any::<u8>(), 64)
        .prop_map(|bytes| Signature::from_slice(&bytes).expect("64 bytes"))
}

fn arb_amount() -> impl Strategy<Value = Amount> {
    prop::array::uniform32(any::<u8>()).prop_map(|bytes| Amount::new(U256::from_le_bytes(bytes)))
}

fn arb_transaction() -> impl Strategy<Value = Transaction> {
    (
        arb_address(),
        arb_address(),
        any::<u64>(),
        any::<u128>(),
        prop::array::uniform32(any::<u8>()),
        arb_amount(),
        prop::option::of(prop::array::uniform32(any::<u8>())),
    )
        .prop_map(
            |(sender, recipient, nonce, timestamp_nanos, token, amount, user_data)| Transaction {
                sender,
                recipient,
                nonce,
                timestamp_nanos,
                claim: ClaimType::token_transfer(TokenId::new(token), amount, user_data),
            },
        )
}

fn arb_signature_pairs(max: usize) -> impl Strategy<Value = Vec<(Address, Signature)>> {
    prop::collection::vec((arb_address(), arb_signature()), 0..max)
}

fn arb_authorization() -> impl Strategy<Value = SignatureOrMultiSig> {
    prop_oneof![
        arb_signature().prop_map(SignatureOrMultiSig::Signature),
        (
            prop::collection::vec(arb_address(), 0..5),
            any::<u64>(),
            any::<u64>(),
            arb_signature_pairs(4),
        )
            .prop_map(|(authorized_signers, quorum, nonce, signatures)| {
                SignatureOrMultiSig::MultiSig(MultiSig {
                    config: MultiSigConfig {
                        authorized_signers,
                        quorum,
                        nonce,
                    },
                    signatures,
                })
            }),
    ]
}

fn arb_certificate() -> impl Strategy<Value = TransactionCertificate> {
    (arb_transaction(), arb_authorization(), arb_signature_pairs(6)).prop_map(
        |(transaction, signature, signatures)| TransactionCertificate {
            envelope: TransactionEnvelope {
                transaction,
                signature,
            },
            signatures,
        },
    )
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: decoding an encoded transaction yields the same transaction
    #[test]
    fn prop_transaction_roundtrip(tx in arb_transaction()) {
        let bytes = encode(&tx);
        prop_assert_eq!(decode::<Transaction>(&bytes).unwrap(), tx);
    }

    /// Property: encoding is deterministic
    #[test]
    fn prop_encoding_is_deterministic(tx in arb_transaction()) {
        prop_assert_eq!(encode(&tx), encode(&tx.clone()));
    }

    /// Property: certificates with either authorization form survive a round trip
    #[test]
    fn prop_certificate_roundtrip(certificate in arb_certificate()) {
        let bytes = encode(&certificate);
        prop_assert_eq!(decode::<TransactionCertificate>(&bytes).unwrap(), certificate);
    }

    /// Property: every strict prefix of an encoding fails to decode
    #[test]
    fn prop_truncation_is_rejected(tx in arb_transaction(), cut in 1usize..40) {
        let bytes = encode(&tx);
        let end = bytes.len().saturating_sub(cut);
        let err = decode::<Transaction>(&bytes[..end]).unwrap_err();
        let is_unexpected_end = matches!(err, FormatError::UnexpectedEnd { .. });
        prop_assert!(is_unexpected_end);
    }

    /// Property: appending any byte is reported as trailing input
    #[test]
    fn prop_trailing_bytes_are_rejected(tx in arb_transaction(), extra in any::<u8>()) {
        let mut bytes = encode(&tx);
        bytes.push(extra);
        prop_assert_eq!(decode::<Transaction>(&bytes), Err(FormatError::TrailingBytes(1)));
    }

    /// Property: the JSON form round-trips too, including timestamps above u64
    #[test]
    fn prop_transaction_json_roundtrip(tx in arb_transaction()) {
        let json = serde_json::to_string(&tx).unwrap();
        let back: Transaction = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back, tx);
    }
}
