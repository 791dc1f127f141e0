use std::fmt;

use ed25519_dalek::{
    Signature as DalekSignature, Signer as DalekSigner, SigningKey, Verifier as DalekVerifier,
    VerifyingKey,
};
use fastset_types::{Address, CryptoError, Signature, SignatureScheme, Signer};
use rand::rngs::OsRng;

/// Ed25519 verification. Stateless; pass it wherever a [`SignatureScheme`] is expected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ed25519Scheme;

impl Ed25519Scheme {
    pub fn verify_strict(
        &self,
        public_key: &Address,
        message: &[u8],
        signature: &Signature,
    ) -> Result<(), CryptoError> {
        let verifying_key = VerifyingKey::from_bytes(public_key.as_bytes())
            .map_err(|_| CryptoError::InvalidPublicKey(*public_key))?;
        let signature = DalekSignature::from_bytes(signature.as_bytes());
        verifying_key
            .verify(message, &signature)
            .map_err(|_| CryptoError::InvalidSignature)
    }
}

impl SignatureScheme for Ed25519Scheme {
    fn verify(&self, public_key: &Address, message: &[u8], signature: &Signature) -> bool {
        self.verify_strict(public_key, message, signature).is_ok()
    }
}

/// An Ed25519 signing key. The account address is the 32-byte public key.
#[derive(Clone)]
pub struct Ed25519KeyPair {
    signing_key: SigningKey,
}

impl Ed25519KeyPair {
    pub fn new(signing_key: SigningKey) -> Self {
        Self { signing_key }
    }

    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self::new(SigningKey::from_bytes(&seed))
    }

    pub fn generate() -> Self {
        Self::new(SigningKey::generate(&mut OsRng))
    }

    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    pub fn seed(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }
}

impl fmt::Debug for Ed25519KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ed25519KeyPair")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

impl Signer for Ed25519KeyPair {
    fn address(&self) -> Address {
        Address::new(self.public_key_bytes())
    }

    fn sign_message(&self, message: &[u8]) -> Result<Signature, CryptoError> {
        Ok(Signature::new(self.signing_key.sign(message).to_bytes()))
    }
}
