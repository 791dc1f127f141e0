//! Trait definitions for Signable values, signature schemes, and signers.

use crate::{
    codec::Canonical,
    error::CryptoError,
    ids::{Address, Signature},
};

/// A value signed under a type-name domain.
///
/// The signed message is `TYPE_NAME || "::" || canonical_bytes`, so the same bytes signed as
/// two different types never verify against each other.
pub trait Signable: Canonical {
    const TYPE_NAME: &'static str;

    fn signing_message(&self) -> Vec<u8> {
        domain_message(Self::TYPE_NAME, self)
    }
}

/// `type_name || "::" || canonical_bytes(value)`, the message signed for `value` under the
/// domain `type_name`.
pub fn domain_message<T: Canonical>(type_name: &str, value: &T) -> Vec<u8> {
    let mut message = Vec::with_capacity(type_name.len() + 2);
    message.extend_from_slice(type_name.as_bytes());
    message.extend_from_slice(b"::");
    value.encode_into(&mut message);
    message
}

/// Verification half of a signature scheme. Passed explicitly wherever signatures are checked.
pub trait SignatureScheme: Send + Sync {
    fn verify(&self, public_key: &Address, message: &[u8], signature: &Signature) -> bool;
}

pub trait Signer: Send + Sync {
    /// The signer's public key, which is also its account address.
    fn address(&self) -> Address;

    fn sign_message(&self, message: &[u8]) -> Result<Signature, CryptoError>;
}

impl<T: Signer + ?Sized> Signer for &T {
    fn address(&self) -> Address {
        (**self).address()
    }

    fn sign_message(&self, message: &[u8]) -> Result<Signature, CryptoError> {
        (**self).sign_message(message)
    }
}

#[cfg(test)]
mod tests {
    use super::{domain_message, Signable};
    use crate::{codec::Canonical, model::MultiSigConfig};

    #[test]
    fn signing_message_prefixes_type_name() {
        let config = MultiSigConfig {
            authorized_signers: vec![],
            quorum: 1,
            nonce: 3,
        };
        let message = config.signing_message();
        assert!(message.starts_with(b"MultiSigConfig::"));
        assert_eq!(&message[16..], config.to_canonical_bytes().as_slice());
        assert_eq!(domain_message(MultiSigConfig::TYPE_NAME, &config), message);
        assert!(domain_message("Transaction", &config).starts_with(b"Transaction::"));
    }
}
