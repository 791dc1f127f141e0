//! Domain-separated signing.
//!
//! Every signed message is `type_name || "::" || canonical_bytes(value)`. The scheme used to
//! verify is always passed in explicitly.

pub use fastset_types::domain_message;
use fastset_types::{
    Address, Canonical, CryptoError, MultiSigError, Signable, Signature, SignatureOrMultiSig,
    SignatureScheme, Signer, Transaction, TransactionEnvelope,
};

use crate::multisig::verify_multisig;

pub fn sign_named<T: Canonical, S: Signer + ?Sized>(
    signer: &S,
    type_name: &str,
    value: &T,
) -> Result<Signature, CryptoError> {
    signer.sign_message(&domain_message(type_name, value))
}

pub fn verify_named<T: Canonical>(
    scheme: &dyn SignatureScheme,
    type_name: &str,
    value: &T,
    public_key: &Address,
    signature: &Signature,
) -> bool {
    scheme.verify(public_key, &domain_message(type_name, value), signature)
}

/// Signs `value` under its own type name.
pub fn sign_value<T: Signable, S: Signer + ?Sized>(
    signer: &S,
    value: &T,
) -> Result<Signature, CryptoError> {
    signer.sign_message(&value.signing_message())
}

pub fn verify_value<T: Signable>(
    scheme: &dyn SignatureScheme,
    value: &T,
    public_key: &Address,
    signature: &Signature,
) -> bool {
    scheme.verify(public_key, &value.signing_message(), signature)
}

/// Signs a single-key transaction, producing the envelope submitted to validators.
pub fn sign_transaction<S: Signer + ?Sized>(
    signer: &S,
    transaction: Transaction,
) -> Result<TransactionEnvelope, CryptoError> {
    let signature = sign_value(signer, &transaction)?;
    Ok(TransactionEnvelope {
        transaction,
        signature: SignatureOrMultiSig::Signature(signature),
    })
}

/// A validator attestation: the validator's signature over the whole envelope.
pub fn sign_attestation<S: Signer + ?Sized>(
    signer: &S,
    envelope: &TransactionEnvelope,
) -> Result<Signature, CryptoError> {
    sign_value(signer, envelope)
}

pub fn verify_attestation(
    scheme: &dyn SignatureScheme,
    envelope: &TransactionEnvelope,
    validator: &Address,
    signature: &Signature,
) -> bool {
    verify_value(scheme, envelope, validator, signature)
}

/// Checks the envelope's authorization against its transaction.
///
/// A plain signature must verify under the sender's key. A multisig is re-validated in full.
pub fn verify_envelope(
    scheme: &dyn SignatureScheme,
    envelope: &TransactionEnvelope,
) -> Result<(), MultiSigError> {
    match &envelope.signature {
        SignatureOrMultiSig::Signature(signature) => {
            let sender = envelope.transaction.sender;
            if verify_value(scheme, &envelope.transaction, &sender, signature) {
                Ok(())
            } else {
                Err(MultiSigError::InvalidSignature(sender))
            }
        }
        SignatureOrMultiSig::MultiSig(multisig) => {
            verify_multisig(scheme, multisig, &envelope.transaction)
        }
    }
}
