//! Error types for canonical decoding, signing, multisig aggregation, and validation.

use thiserror::Error;

use crate::ids::Address;

/// Canonical decoding failures. Never recovered from silently.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("unexpected end of input: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEnd { needed: usize, remaining: usize },
    #[error("invalid discriminant {value} for {type_name}")]
    InvalidDiscriminant { type_name: &'static str, value: u32 },
    #[error("invalid option tag {0}")]
    InvalidOptionTag(u8),
    #[error("invalid bool byte {0}")]
    InvalidBool(u8),
    #[error("non-canonical uleb128 encoding")]
    NonCanonicalUleb128,
    #[error("uleb128 value overflows u32")]
    Uleb128Overflow,
    #[error("sequence length {0} exceeds maximum")]
    LengthOverflow(u64),
    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid length for {kind}: expected {expected}, got {actual}")]
    InvalidLength {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("invalid public key {0}")]
    InvalidPublicKey(Address),
    #[error("invalid signature")]
    InvalidSignature,
    #[error("{0}")]
    Message(String),
}

/// Multisig construction and verification errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MultiSigError {
    #[error("signer {0} is not in the authorized signer set")]
    UnauthorizedSigner(Address),
    #[error("duplicate signature from signer {0}")]
    DuplicateSigner(Address),
    #[error("invalid signature from signer {0}")]
    InvalidSignature(Address),
    #[error("multisig quorum not met: required {required}, have {have}")]
    QuorumNotMet { required: u64, have: usize },
    #[error(transparent)]
    InvalidConfig(#[from] ValidationError),
}

/// Validator attestation collection errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AssemblyError {
    #[error("validator {0} is not a committee member")]
    UnknownValidator(Address),
    #[error("duplicate attestation from validator {0}")]
    DuplicateAttestation(Address),
    #[error("invalid attestation signature from validator {0}")]
    InvalidAttestation(Address),
    #[error("threshold not met: required {required}, have {have}")]
    ThresholdNotMet { required: usize, have: usize },
    #[error("certificate envelope does not match the envelope being certified")]
    EnvelopeMismatch,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid length for {kind}: expected {expected}, got {actual}")]
    InvalidLength {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("invalid hex: {0}")]
    InvalidHex(String),
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("invalid field `{0}`")]
    InvalidField(&'static str),
    #[error("{0}")]
    Message(String),
}
