//! Submission: drives one transaction from unsigned through attestation collection to a
//! certificate.
//!
//! ```text
//! Unsigned -> Signed -> SubmittedToNode(n) -> AttestationCollected(k) -> Certified
//! ```
//!
//! The authorizing signature, or the multisig quorum, is checked when the submission is
//! signed or wrapped, before anything reaches the network.
//!
//! Attestations are accepted on committee membership, deduplication and the validator's
//! signature over the envelope. The `transaction_hash` a validator reports is kept as
//! returned and never compared against a local digest.

use std::fmt;

use fastset_crypto::{
    sign_transaction, transaction_hash, verify_envelope, CertificateAssembler, SharedAssembler,
};
use fastset_rpc::SubmitTransactionResponse;
use fastset_types::{
    AssemblyError, Committee, CryptoError, MultiSigError, SignatureScheme, Signer, Transaction,
    TransactionCertificate, TransactionEnvelope, TransactionHash,
};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    Unsigned,
    Signed,
    /// Sent to this many validators; fewer than quorum have attested.
    SubmittedToNode(usize),
    /// Quorum reached with this many attestations.
    AttestationCollected(usize),
    Certified,
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsigned => f.write_str("unsigned"),
            Self::Signed => f.write_str("signed"),
            Self::SubmittedToNode(n) => write!(f, "submitted to {n} node(s)"),
            Self::AttestationCollected(k) => write!(f, "{k} attestation(s) collected"),
            Self::Certified => f.write_str("certified"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubmissionError {
    #[error("cannot {action} a submission that is {state}")]
    InvalidTransition {
        action: &'static str,
        state: SubmissionState,
    },
    #[error("attestation quorum not met: required {required}, have {have}")]
    QuorumNotMet { required: usize, have: usize },
    #[error(transparent)]
    Authorization(#[from] MultiSigError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Assembly(#[from] AssemblyError),
}

#[derive(Debug)]
pub struct Submission<S> {
    scheme: S,
    committee: Committee,
    transaction: Transaction,
    hash: TransactionHash,
    reported_hash: Option<TransactionHash>,
    envelope: Option<TransactionEnvelope>,
    assembler: Option<SharedAssembler<S>>,
    submitted: usize,
    certificate: Option<TransactionCertificate>,
}

impl<S: SignatureScheme + Clone> Submission<S> {
    pub fn new(scheme: S, committee: Committee, transaction: Transaction) -> Self {
        let hash = transaction_hash(&transaction);
        Self {
            scheme,
            committee,
            transaction,
            hash,
            reported_hash: None,
            envelope: None,
            assembler: None,
            submitted: 0,
            certificate: None,
        }
    }

    /// A submission for an envelope signed elsewhere, such as a multisig aggregate. The
    /// authorization is fully checked, so a multisig below its quorum is refused here.
    pub fn from_envelope(
        scheme: S,
        committee: Committee,
        envelope: TransactionEnvelope,
    ) -> Result<Self, SubmissionError> {
        let mut submission = Self::new(scheme, committee, envelope.transaction.clone());
        verify_envelope(&submission.scheme, &envelope)?;
        submission.attach(envelope);
        Ok(submission)
    }

    pub fn sign<Sg: Signer + ?Sized>(&mut self, signer: &Sg) -> Result<(), SubmissionError> {
        self.expect_state("sign", |state| state == SubmissionState::Unsigned)?;
        let envelope = sign_transaction(signer, self.transaction.clone())?;
        verify_envelope(&self.scheme, &envelope)?;
        self.attach(envelope);
        Ok(())
    }

    fn attach(&mut self, envelope: TransactionEnvelope) {
        let assembler =
            CertificateAssembler::new(self.scheme.clone(), self.committee.clone(), envelope.clone());
        self.assembler = Some(SharedAssembler::new(assembler));
        self.envelope = Some(envelope);
        debug!(tx_hash = %self.hash, "transaction signed");
    }

    pub fn state(&self) -> SubmissionState {
        if self.certificate.is_some() {
            return SubmissionState::Certified;
        }
        let Some(assembler) = &self.assembler else {
            return SubmissionState::Unsigned;
        };
        if assembler.is_complete() {
            SubmissionState::AttestationCollected(assembler.attestation_count())
        } else if self.submitted > 0 {
            SubmissionState::SubmittedToNode(self.submitted)
        } else {
            SubmissionState::Signed
        }
    }

    /// Local digest of the transaction's signing message. Used in logs and as the
    /// certificate store key.
    pub fn hash(&self) -> TransactionHash {
        self.hash
    }

    /// The transaction hash the network assigned, as first reported by a validator.
    pub fn reported_hash(&self) -> Option<TransactionHash> {
        self.reported_hash
    }

    /// Keeps the first hash a validator reports. Later, different values are logged only.
    pub fn note_reported_hash(&mut self, hash: TransactionHash) {
        match self.reported_hash {
            None => self.reported_hash = Some(hash),
            Some(first) if first != hash => {
                debug!(first = %first, other = %hash, "validators reported different hashes")
            }
            Some(_) => {}
        }
    }

    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    pub fn committee(&self) -> &Committee {
        &self.committee
    }

    pub fn envelope(&self) -> Option<&TransactionEnvelope> {
        self.envelope.as_ref()
    }

    pub fn certificate(&self) -> Option<&TransactionCertificate> {
        self.certificate.as_ref()
    }

    pub fn attestation_count(&self) -> usize {
        self.assembler
            .as_ref()
            .map(SharedAssembler::attestation_count)
            .unwrap_or(0)
    }

    /// Marks `count` more validators as contacted and returns the envelope to send them.
    pub fn begin_submit(&mut self, count: usize) -> Result<TransactionEnvelope, SubmissionError> {
        let state = self.state();
        let envelope = match (&self.envelope, state) {
            (Some(envelope), SubmissionState::Signed)
            | (Some(envelope), SubmissionState::SubmittedToNode(_))
            | (Some(envelope), SubmissionState::AttestationCollected(_)) => envelope.clone(),
            _ => {
                return Err(SubmissionError::InvalidTransition {
                    action: "submit",
                    state,
                })
            }
        };
        self.submitted += count;
        Ok(envelope)
    }

    /// Handle for recording attestations from concurrently running requests.
    pub fn attestation_sink(&self) -> Result<AttestationSink<S>, SubmissionError> {
        let state = self.state();
        match &self.assembler {
            Some(assembler) if state != SubmissionState::Certified => Ok(AttestationSink {
                assembler: assembler.clone(),
            }),
            _ => Err(SubmissionError::InvalidTransition {
                action: "collect attestations for",
                state,
            }),
        }
    }

    /// Records one validator response. Returns whether quorum is now met.
    pub fn record_attestation(
        &mut self,
        response: &SubmitTransactionResponse,
    ) -> Result<bool, SubmissionError> {
        let complete = self.attestation_sink()?.record(response)?;
        self.note_reported_hash(response.transaction_hash);
        Ok(complete)
    }

    /// Assembles the certificate. Refuses while fewer than quorum validators have attested.
    pub fn certify(&mut self) -> Result<TransactionCertificate, SubmissionError> {
        if let Some(certificate) = &self.certificate {
            return Ok(certificate.clone());
        }
        let state = self.state();
        let Some(assembler) = &self.assembler else {
            return Err(SubmissionError::InvalidTransition {
                action: "certify",
                state,
            });
        };
        if !assembler.is_complete() {
            return Err(SubmissionError::QuorumNotMet {
                required: self.committee.quorum(),
                have: assembler.attestation_count(),
            });
        }
        let certificate = assembler.certificate()?;
        info!(
            tx_hash = %self.hash,
            attestations = certificate.signatures.len(),
            "certificate assembled"
        );
        self.certificate = Some(certificate.clone());
        Ok(certificate)
    }

    fn expect_state(
        &self,
        action: &'static str,
        allowed: impl Fn(SubmissionState) -> bool,
    ) -> Result<(), SubmissionError> {
        let state = self.state();
        if allowed(state) {
            Ok(())
        } else {
            Err(SubmissionError::InvalidTransition { action, state })
        }
    }
}

/// Cloneable, mutex-guarded view of a submission's attestation set.
pub struct AttestationSink<S> {
    assembler: SharedAssembler<S>,
}

impl<S> Clone for AttestationSink<S> {
    fn clone(&self) -> Self {
        Self {
            assembler: self.assembler.clone(),
        }
    }
}

impl<S: SignatureScheme + Clone> AttestationSink<S> {
    /// Appends the attestation if it is new and valid. Returns whether quorum is met.
    pub fn record(&self, response: &SubmitTransactionResponse) -> Result<bool, SubmissionError> {
        Ok(self
            .assembler
            .add_attestation(response.validator, response.signature)?)
    }
}

#[cfg(test)]
mod tests {
    use fastset_crypto::{
        multisig_account_address, sign_attestation, sign_into, Ed25519KeyPair, Ed25519Scheme,
    };
    use fastset_rpc::SubmitTransactionResponse;
    use fastset_types::{
        Address, Amount, ClaimType, Committee, MultiSig, MultiSigConfig, MultiSigError,
        SignatureOrMultiSig, Signer, TokenId, Transaction, TransactionEnvelope, TransactionHash,
    };

    use super::{Submission, SubmissionError, SubmissionState};

    fn validators(n: u8) -> (Vec<Ed25519KeyPair>, Committee) {
        let keys: Vec<_> = (0..n).map(|i| Ed25519KeyPair::from_seed([0x41 + i; 32])).collect();
        let committee = Committee::new(keys.iter().map(|key| key.address()).collect()).unwrap();
        (keys, committee)
    }

    fn transfer(sender: Address) -> Transaction {
        Transaction {
            sender,
            recipient: Address::new([0xbb; 32]),
            nonce: 0,
            timestamp_nanos: 1,
            claim: ClaimType::token_transfer(TokenId::native(), Amount::from(0xffffu64), None),
        }
    }

    fn attest(
        validator: &Ed25519KeyPair,
        submission: &Submission<Ed25519Scheme>,
    ) -> SubmitTransactionResponse {
        SubmitTransactionResponse {
            validator: validator.address(),
            signature: sign_attestation(validator, submission.envelope().unwrap()).unwrap(),
            next_nonce: 1,
            transaction_hash: submission.hash(),
        }
    }

    #[test]
    fn walks_every_state_to_certified() {
        let (keys, committee) = validators(4);
        let alice = Ed25519KeyPair::from_seed([0x11; 32]);
        let mut submission = Submission::new(Ed25519Scheme, committee, transfer(alice.address()));
        assert_eq!(submission.state(), SubmissionState::Unsigned);
        assert!(submission.begin_submit(1).is_err());

        submission.sign(&alice).unwrap();
        assert_eq!(submission.state(), SubmissionState::Signed);
        assert!(matches!(
            submission.sign(&alice),
            Err(SubmissionError::InvalidTransition { .. })
        ));

        submission.begin_submit(4).unwrap();
        assert_eq!(submission.state(), SubmissionState::SubmittedToNode(4));
        assert!(!submission.record_attestation(&attest(&keys[0], &submission)).unwrap());
        assert!(!submission.record_attestation(&attest(&keys[1], &submission)).unwrap());
        assert!(matches!(
            submission.certify(),
            Err(SubmissionError::QuorumNotMet { required: 3, have: 2 })
        ));
        assert!(submission.record_attestation(&attest(&keys[2], &submission)).unwrap());
        assert_eq!(submission.state(), SubmissionState::AttestationCollected(3));

        let certificate = submission.certify().unwrap();
        assert_eq!(certificate.signatures.len(), 3);
        assert_eq!(submission.state(), SubmissionState::Certified);
        assert!(submission.attestation_sink().is_err());
    }

    #[test]
    fn duplicate_and_foreign_attestations_do_not_count() {
        let (keys, committee) = validators(4);
        let alice = Ed25519KeyPair::from_seed([0x11; 32]);
        let mut submission = Submission::new(Ed25519Scheme, committee, transfer(alice.address()));
        submission.sign(&alice).unwrap();

        let first = attest(&keys[0], &submission);
        submission.record_attestation(&first).unwrap();
        assert!(submission.record_attestation(&first).is_err());

        let outsider = Ed25519KeyPair::from_seed([0x77; 32]);
        let foreign = attest(&outsider, &submission);
        assert!(submission.record_attestation(&foreign).is_err());

        let mut forged = attest(&keys[1], &submission);
        forged.signature = attest(&keys[2], &submission).signature;
        assert!(submission.record_attestation(&forged).is_err());
        assert_eq!(submission.attestation_count(), 1);
    }

    #[test]
    fn network_assigned_hash_is_kept_as_reported() {
        let (keys, committee) = validators(1);
        let alice = Ed25519KeyPair::from_seed([0x11; 32]);
        let mut submission = Submission::new(Ed25519Scheme, committee, transfer(alice.address()));
        submission.sign(&alice).unwrap();

        let mut response = attest(&keys[0], &submission);
        response.transaction_hash = TransactionHash::new([0x5a; 32]);
        assert_ne!(response.transaction_hash, submission.hash());
        assert!(submission.record_attestation(&response).unwrap());
        assert_eq!(submission.attestation_count(), 1);
        assert_eq!(submission.reported_hash(), Some(TransactionHash::new([0x5a; 32])));

        let certificate = submission.certify().unwrap();
        assert_eq!(certificate.signatures, vec![(response.validator, response.signature)]);
    }

    #[test]
    fn externally_signed_self_transfer_is_accepted() {
        let (_, committee) = validators(1);
        let alice = Ed25519KeyPair::from_seed([0x11; 32]);
        let mut tx = transfer(alice.address());
        tx.recipient = alice.address();
        tx.claim = ClaimType::token_transfer(TokenId::native(), Amount::ZERO, None);
        let envelope = fastset_crypto::sign_transaction(&alice, tx).unwrap();
        let submission = Submission::from_envelope(Ed25519Scheme, committee, envelope).unwrap();
        assert_eq!(submission.state(), SubmissionState::Signed);
    }

    #[test]
    fn multisig_below_quorum_is_refused_locally() {
        let (_, committee) = validators(1);
        let signers: Vec<_> = (1..=3u8).map(|i| Ed25519KeyPair::from_seed([0x60 + i; 32])).collect();
        let config = MultiSigConfig {
            authorized_signers: signers.iter().map(|s| s.address()).collect(),
            quorum: 2,
            nonce: 0,
        };
        let tx = transfer(multisig_account_address(&config));
        let mut multisig = MultiSig::new(config);
        sign_into(&Ed25519Scheme, &mut multisig, &tx, &signers[0]).unwrap();
        let envelope = TransactionEnvelope {
            transaction: tx.clone(),
            signature: SignatureOrMultiSig::MultiSig(multisig.clone()),
        };
        let err = Submission::from_envelope(Ed25519Scheme, committee.clone(), envelope)
            .err()
            .expect("below quorum");
        assert!(matches!(
            err,
            SubmissionError::Authorization(MultiSigError::QuorumNotMet { required: 2, have: 1 })
        ));

        sign_into(&Ed25519Scheme, &mut multisig, &tx, &signers[2]).unwrap();
        let envelope = TransactionEnvelope {
            transaction: tx,
            signature: SignatureOrMultiSig::MultiSig(multisig),
        };
        let submission = Submission::from_envelope(Ed25519Scheme, committee, envelope).unwrap();
        assert_eq!(submission.state(), SubmissionState::Signed);
    }
}
