//! Crypto implementations: ed25519 signatures, domain-separated signing, multisig
//! aggregation, certificate assembly, and hashing.

pub mod assembler;
pub mod ed25519;
pub mod hashing;
pub mod multisig;
pub mod signing;

pub use assembler::{verify_certificate, CertificateAssembler, SharedAssembler};
pub use ed25519::{Ed25519KeyPair, Ed25519Scheme};
pub use hashing::{multisig_account_address, transaction_hash};
pub use multisig::{add_signature, is_quorum_satisfied, sign_into, verify_multisig, SharedMultiSig};
pub use signing::{
    domain_message, sign_attestation, sign_named, sign_transaction, sign_value,
    verify_attestation, verify_envelope, verify_named, verify_value,
};
