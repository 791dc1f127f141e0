//! Multisig aggregation against a quorum threshold.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use fastset_types::{
    Address, MultiSig, MultiSigConfig, MultiSigError, Signature, SignatureOrMultiSig,
    SignatureScheme, Signer, Transaction, TransactionEnvelope,
};
use tracing::{debug, warn};

use crate::signing::{sign_value, verify_value};

/// Appends `signature` from `signer` after checking authorization, uniqueness, and validity
/// over `transaction`. The aggregate is unchanged on error.
pub fn add_signature(
    scheme: &dyn SignatureScheme,
    multisig: &mut MultiSig,
    transaction: &Transaction,
    signer: Address,
    signature: Signature,
) -> Result<(), MultiSigError> {
    if !multisig.config.is_authorized(&signer) {
        return Err(MultiSigError::UnauthorizedSigner(signer));
    }
    if multisig.has_signer(&signer) {
        return Err(MultiSigError::DuplicateSigner(signer));
    }
    if !verify_value(scheme, transaction, &signer, &signature) {
        return Err(MultiSigError::InvalidSignature(signer));
    }
    multisig.signatures.push((signer, signature));
    debug!(
        signer = %signer,
        signatures = multisig.signatures.len(),
        quorum = multisig.config.quorum,
        "multisig signature added"
    );
    Ok(())
}

/// Signs `transaction` with `signer` and appends the result.
pub fn sign_into<S: Signer + ?Sized>(
    scheme: &dyn SignatureScheme,
    multisig: &mut MultiSig,
    transaction: &Transaction,
    signer: &S,
) -> Result<(), MultiSigError> {
    let signature = sign_value(signer, transaction)
        .map_err(|_| MultiSigError::InvalidSignature(signer.address()))?;
    add_signature(scheme, multisig, transaction, signer.address(), signature)
}

pub fn is_quorum_satisfied(multisig: &MultiSig) -> bool {
    multisig.distinct_authorized_signers() as u64 >= multisig.config.quorum
}

/// Fully re-validates a received aggregate.
pub fn verify_multisig(
    scheme: &dyn SignatureScheme,
    multisig: &MultiSig,
    transaction: &Transaction,
) -> Result<(), MultiSigError> {
    multisig.config.validate()?;
    let mut seen = HashSet::with_capacity(multisig.signatures.len());
    for (signer, signature) in &multisig.signatures {
        if !multisig.config.is_authorized(signer) {
            return Err(MultiSigError::UnauthorizedSigner(*signer));
        }
        if !seen.insert(*signer) {
            return Err(MultiSigError::DuplicateSigner(*signer));
        }
        if !verify_value(scheme, transaction, signer, signature) {
            return Err(MultiSigError::InvalidSignature(*signer));
        }
    }
    if (seen.len() as u64) < multisig.config.quorum {
        return Err(MultiSigError::QuorumNotMet {
            required: multisig.config.quorum,
            have: seen.len(),
        });
    }
    Ok(())
}

/// Thread-safe multisig collector for one transaction.
#[derive(Clone)]
pub struct SharedMultiSig {
    transaction: Arc<Transaction>,
    scheme: Arc<dyn SignatureScheme>,
    inner: Arc<Mutex<MultiSig>>,
}

impl SharedMultiSig {
    pub fn new(
        config: MultiSigConfig,
        transaction: Transaction,
        scheme: Arc<dyn SignatureScheme>,
    ) -> Result<Self, MultiSigError> {
        config.validate()?;
        Ok(Self {
            transaction: Arc::new(transaction),
            scheme,
            inner: Arc::new(Mutex::new(MultiSig::new(config))),
        })
    }

    fn lock(&self) -> MutexGuard<'_, MultiSig> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    /// Appends the signature if the signer is new. Returns whether quorum is now satisfied.
    pub fn add_signature(&self, signer: Address, signature: Signature) -> Result<bool, MultiSigError> {
        let mut multisig = self.lock();
        let result = add_signature(
            self.scheme.as_ref(),
            &mut multisig,
            &self.transaction,
            signer,
            signature,
        );
        if let Err(err) = &result {
            warn!(signer = %signer, error = %err, "multisig signature rejected");
        }
        result.map(|()| is_quorum_satisfied(&multisig))
    }

    pub fn signer_count(&self) -> usize {
        self.lock().signatures.len()
    }

    pub fn is_quorum_satisfied(&self) -> bool {
        is_quorum_satisfied(&self.lock())
    }

    pub fn snapshot(&self) -> MultiSig {
        self.lock().clone()
    }

    /// The envelope carrying the aggregate, once quorum is met.
    pub fn envelope(&self) -> Result<TransactionEnvelope, MultiSigError> {
        let multisig = self.snapshot();
        if !is_quorum_satisfied(&multisig) {
            return Err(MultiSigError::QuorumNotMet {
                required: multisig.config.quorum,
                have: multisig.distinct_authorized_signers(),
            });
        }
        Ok(TransactionEnvelope {
            transaction: (*self.transaction).clone(),
            signature: SignatureOrMultiSig::MultiSig(multisig),
        })
    }
}
