use fastset_types::{TransactionCertificate, TransactionEnvelope};

use crate::messages::{SubmitCertificateParams, SubmitTransactionParams};

impl From<TransactionEnvelope> for SubmitTransactionParams {
    fn from(value: TransactionEnvelope) -> Self {
        Self {
            transaction: value.transaction,
            signature: value.signature,
        }
    }
}

impl From<SubmitTransactionParams> for TransactionEnvelope {
    fn from(value: SubmitTransactionParams) -> Self {
        Self {
            transaction: value.transaction,
            signature: value.signature,
        }
    }
}

impl From<TransactionCertificate> for SubmitCertificateParams {
    fn from(value: TransactionCertificate) -> Self {
        Self {
            transaction: value.envelope.transaction,
            signature: value.envelope.signature,
            validator_signatures: value.signatures,
        }
    }
}

impl From<SubmitCertificateParams> for TransactionCertificate {
    fn from(value: SubmitCertificateParams) -> Self {
        Self {
            envelope: TransactionEnvelope {
                transaction: value.transaction,
                signature: value.signature,
            },
            signatures: value.validator_signatures,
        }
    }
}

#[cfg(test)]
mod tests {
    use fastset_types::{
        Address, Amount, ClaimType, Signature, SignatureOrMultiSig, TokenId, Transaction,
        TransactionCertificate, TransactionEnvelope,
    };
    use serde_json::json;

    use crate::messages::SubmitCertificateParams;

    #[test]
    fn certificate_params_flatten_the_envelope() {
        let certificate = TransactionCertificate {
            envelope: TransactionEnvelope {
                transaction: Transaction {
                    sender: Address::new([1; 32]),
                    recipient: Address::new([2; 32]),
                    nonce: 4,
                    timestamp_nanos: 9,
                    claim: ClaimType::token_transfer(TokenId::native(), Amount::from(8u64), None),
                },
                signature: SignatureOrMultiSig::Signature(Signature::new([3; 64])),
            },
            signatures: vec![(Address::new([5; 32]), Signature::new([6; 64]))],
        };
        let params = SubmitCertificateParams::from(certificate.clone());
        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(value["transaction"]["nonce"], json!(4));
        assert_eq!(value["signature"]["Signature"].as_array().unwrap().len(), 64);
        let pair = value["validator_signatures"][0].as_array().unwrap();
        assert_eq!(pair.len(), 2);
        assert_eq!(TransactionCertificate::from(params), certificate);
    }
}
