//! CertManager: verified store of finished certificates, keyed by transaction hash.

use std::collections::HashMap;

use fastset_crypto::{transaction_hash, verify_certificate};
use fastset_types::{
    Address, AssemblyError, Committee, SignatureScheme, TransactionCertificate, TransactionHash,
};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CertManagerError {
    #[error("conflicting certificate for sender {sender} nonce {nonce}")]
    Conflicting { sender: Address, nonce: u64 },
    #[error(transparent)]
    Assembly(#[from] AssemblyError),
}

#[derive(Debug, Clone)]
pub struct CertManager<S> {
    scheme: S,
    committee: Committee,
    certificates: HashMap<TransactionHash, TransactionCertificate>,
    by_nonce: HashMap<(Address, u64), TransactionHash>,
}

impl<S: SignatureScheme> CertManager<S> {
    pub fn new(scheme: S, committee: Committee) -> Self {
        Self {
            scheme,
            committee,
            certificates: HashMap::new(),
            by_nonce: HashMap::new(),
        }
    }

    pub fn committee(&self) -> &Committee {
        &self.committee
    }

    /// Verifies the certificate against the committee and stores it. Storing the same
    /// certificate twice is a no-op; a different certificate for a used nonce is refused.
    pub fn record(
        &mut self,
        certificate: TransactionCertificate,
    ) -> Result<TransactionHash, CertManagerError> {
        verify_certificate(&self.scheme, &self.committee, &certificate)?;
        let tx = certificate.transaction();
        let hash = transaction_hash(tx);
        let key = (tx.sender, tx.nonce);
        match self.by_nonce.get(&key) {
            Some(existing) if *existing != hash => {
                return Err(CertManagerError::Conflicting {
                    sender: key.0,
                    nonce: key.1,
                })
            }
            Some(_) => return Ok(hash),
            None => {}
        }
        self.by_nonce.insert(key, hash);
        self.certificates.insert(hash, certificate);
        Ok(hash)
    }

    pub fn get(&self, hash: &TransactionHash) -> Option<&TransactionCertificate> {
        self.certificates.get(hash)
    }

    pub fn len(&self) -> usize {
        self.certificates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }

    /// Certificates sent by `sender`, ordered by nonce.
    pub fn certificates_for(&self, sender: &Address) -> Vec<&TransactionCertificate> {
        let mut found: Vec<_> = self
            .certificates
            .values()
            .filter(|certificate| certificate.transaction().sender == *sender)
            .collect();
        found.sort_by_key(|certificate| certificate.transaction().nonce);
        found
    }

    /// Drops the lowest-nonce certificates until at most `max_entries` remain.
    pub fn prune(&mut self, max_entries: usize) {
        if self.certificates.len() <= max_entries {
            return;
        }
        let mut keys: Vec<(u64, TransactionHash)> = self
            .certificates
            .iter()
            .map(|(hash, certificate)| (certificate.transaction().nonce, *hash))
            .collect();
        keys.sort_unstable();
        let excess = self.certificates.len() - max_entries;
        for (_, hash) in keys.into_iter().take(excess) {
            if let Some(certificate) = self.certificates.remove(&hash) {
                let tx = certificate.transaction();
                self.by_nonce.remove(&(tx.sender, tx.nonce));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use fastset_crypto::{sign_attestation, sign_transaction, Ed25519KeyPair, Ed25519Scheme};
    use fastset_types::{
        Address, Amount, AssemblyError, ClaimType, Committee, Signer, TokenId, Transaction,
        TransactionCertificate,
    };

    use super::{CertManager, CertManagerError};

    struct Fixture {
        validators: Vec<Ed25519KeyPair>,
        committee: Committee,
        alice: Ed25519KeyPair,
    }

    impl Fixture {
        fn new() -> Self {
            let validators: Vec<_> =
                (0..4u8).map(|i| Ed25519KeyPair::from_seed([0x41 + i; 32])).collect();
            let committee =
                Committee::new(validators.iter().map(|v| v.address()).collect()).unwrap();
            Self {
                validators,
                committee,
                alice: Ed25519KeyPair::from_seed([0x11; 32]),
            }
        }

        fn certificate(&self, nonce: u64, amount: u64, signers: usize) -> TransactionCertificate {
            let envelope = sign_transaction(
                &self.alice,
                Transaction {
                    sender: self.alice.address(),
                    recipient: Address::new([0xbb; 32]),
                    nonce,
                    timestamp_nanos: 5,
                    claim: ClaimType::token_transfer(
                        TokenId::native(),
                        Amount::from(amount),
                        None,
                    ),
                },
            )
            .unwrap();
            let signatures = self.validators[..signers]
                .iter()
                .map(|v| (v.address(), sign_attestation(v, &envelope).unwrap()))
                .collect();
            TransactionCertificate {
                envelope,
                signatures,
            }
        }
    }

    #[test]
    fn records_verified_certificates_idempotently() {
        let fixture = Fixture::new();
        let mut manager = CertManager::new(Ed25519Scheme, fixture.committee.clone());
        let certificate = fixture.certificate(0, 10, 3);
        let hash = manager.record(certificate.clone()).unwrap();
        assert_eq!(manager.record(certificate.clone()).unwrap(), hash);
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.get(&hash), Some(&certificate));
    }

    #[test]
    fn refuses_short_or_conflicting_certificates() {
        let fixture = Fixture::new();
        let mut manager = CertManager::new(Ed25519Scheme, fixture.committee.clone());
        let err = manager.record(fixture.certificate(0, 10, 2)).unwrap_err();
        assert!(matches!(
            err,
            CertManagerError::Assembly(AssemblyError::ThresholdNotMet { .. })
        ));

        manager.record(fixture.certificate(0, 10, 3)).unwrap();
        let err = manager.record(fixture.certificate(0, 11, 4)).unwrap_err();
        assert!(matches!(err, CertManagerError::Conflicting { nonce: 0, .. }));
    }

    #[test]
    fn prunes_oldest_nonces_first() {
        let fixture = Fixture::new();
        let mut manager = CertManager::new(Ed25519Scheme, fixture.committee.clone());
        for nonce in 0..4 {
            manager.record(fixture.certificate(nonce, 10, 3)).unwrap();
        }
        manager.prune(2);
        let remaining: Vec<u64> = manager
            .certificates_for(&fixture.alice.address())
            .iter()
            .map(|c| c.transaction().nonce)
            .collect();
        assert_eq!(remaining, vec![2, 3]);
    }
}
