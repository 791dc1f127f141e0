//! CertificateAssembler: collects validator attestations until the committee quorum is met.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use fastset_types::{
    AssemblyError, Committee, Signature, SignatureScheme, TransactionCertificate,
    TransactionEnvelope, ValidatorName,
};
use tracing::{debug, warn};

use crate::signing::verify_attestation;

#[derive(Debug, Clone)]
pub struct CertificateAssembler<S> {
    scheme: S,
    committee: Committee,
    envelope: TransactionEnvelope,
    signatures: Vec<(ValidatorName, Signature)>,
    seen_validators: HashSet<ValidatorName>,
}

impl<S: SignatureScheme> CertificateAssembler<S> {
    pub fn new(scheme: S, committee: Committee, envelope: TransactionEnvelope) -> Self {
        Self {
            scheme,
            committee,
            envelope,
            signatures: Vec::new(),
            seen_validators: HashSet::new(),
        }
    }

    pub fn envelope(&self) -> &TransactionEnvelope {
        &self.envelope
    }

    pub fn committee(&self) -> &Committee {
        &self.committee
    }

    pub fn add_attestation(
        &mut self,
        validator: ValidatorName,
        signature: Signature,
    ) -> Result<(), AssemblyError> {
        if !self.committee.contains(&validator) {
            return Err(AssemblyError::UnknownValidator(validator));
        }
        if self.seen_validators.contains(&validator) {
            return Err(AssemblyError::DuplicateAttestation(validator));
        }
        if !verify_attestation(&self.scheme, &self.envelope, &validator, &signature) {
            return Err(AssemblyError::InvalidAttestation(validator));
        }
        self.seen_validators.insert(validator);
        self.signatures.push((validator, signature));
        debug!(
            validator = %validator,
            attestations = self.signatures.len(),
            quorum = self.committee.quorum(),
            "attestation accepted"
        );
        Ok(())
    }

    pub fn attestation_count(&self) -> usize {
        self.signatures.len()
    }

    pub fn has_attestation_from(&self, validator: &ValidatorName) -> bool {
        self.seen_validators.contains(validator)
    }

    /// Committee members that have not attested yet, in committee order.
    pub fn missing_validators(&self) -> Vec<ValidatorName> {
        self.committee
            .members()
            .iter()
            .filter(|member| !self.seen_validators.contains(*member))
            .copied()
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.signatures.len() >= self.committee.quorum()
    }

    pub fn finalize(self) -> Result<TransactionCertificate, AssemblyError> {
        if !self.is_complete() {
            return Err(AssemblyError::ThresholdNotMet {
                required: self.committee.quorum(),
                have: self.signatures.len(),
            });
        }
        Ok(TransactionCertificate {
            envelope: self.envelope,
            signatures: self.signatures,
        })
    }
}

/// Mutex-guarded assembler shared by concurrently running submissions.
#[derive(Debug)]
pub struct SharedAssembler<S> {
    inner: Arc<Mutex<CertificateAssembler<S>>>,
}

impl<S> Clone for SharedAssembler<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: SignatureScheme + Clone> SharedAssembler<S> {
    pub fn new(assembler: CertificateAssembler<S>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(assembler)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CertificateAssembler<S>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends the attestation if the validator is new. Returns whether quorum is now met.
    pub fn add_attestation(
        &self,
        validator: ValidatorName,
        signature: Signature,
    ) -> Result<bool, AssemblyError> {
        let mut assembler = self.lock();
        match assembler.add_attestation(validator, signature) {
            Ok(()) => Ok(assembler.is_complete()),
            Err(err) => {
                warn!(validator = %validator, error = %err, "attestation rejected");
                Err(err)
            }
        }
    }

    pub fn attestation_count(&self) -> usize {
        self.lock().attestation_count()
    }

    pub fn is_complete(&self) -> bool {
        self.lock().is_complete()
    }

    /// Builds the certificate from the attestations collected so far.
    pub fn certificate(&self) -> Result<TransactionCertificate, AssemblyError> {
        self.lock().clone().finalize()
    }
}

/// Checks a certificate against the committee: every signer is a distinct member, every
/// attestation verifies over the envelope, and the count reaches quorum.
pub fn verify_certificate(
    scheme: &dyn SignatureScheme,
    committee: &Committee,
    certificate: &TransactionCertificate,
) -> Result<(), AssemblyError> {
    let mut seen = HashSet::with_capacity(certificate.signatures.len());
    for (validator, signature) in &certificate.signatures {
        if !committee.contains(validator) {
            return Err(AssemblyError::UnknownValidator(*validator));
        }
        if !seen.insert(*validator) {
            return Err(AssemblyError::DuplicateAttestation(*validator));
        }
        if !verify_attestation(scheme, &certificate.envelope, validator, signature) {
            return Err(AssemblyError::InvalidAttestation(*validator));
        }
    }
    if seen.len() < committee.quorum() {
        return Err(AssemblyError::ThresholdNotMet {
            required: committee.quorum(),
            have: seen.len(),
        });
    }
    Ok(())
}
