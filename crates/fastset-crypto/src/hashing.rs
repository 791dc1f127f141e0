use fastset_types::{Address, MultiSigConfig, Signable, Transaction, TransactionHash};
use sha2::{Digest, Sha256};

/// SHA-256 of the domain-separated transaction message.
pub fn transaction_hash(transaction: &Transaction) -> TransactionHash {
    TransactionHash::new(sha256_32(&transaction.signing_message()))
}

/// Account address controlled by a multisig policy: SHA-256 of the domain-separated config.
pub fn multisig_account_address(config: &MultiSigConfig) -> Address {
    Address::new(sha256_32(&config.signing_message()))
}

fn sha256_32(bytes: &[u8]) -> [u8; 32] {
    let digest = Sha256::digest(bytes);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

#[cfg(test)]
mod tests {
    use fastset_types::{Address, Amount, ClaimType, MultiSigConfig, TokenId, Transaction};

    use super::{multisig_account_address, transaction_hash};

    fn sample_transaction() -> Transaction {
        Transaction {
            sender: Address::new([1; 32]),
            recipient: Address::new([2; 32]),
            nonce: 7,
            timestamp_nanos: 1_700_000_000_000_000_000,
            claim: ClaimType::token_transfer(TokenId::native(), Amount::from(0xffffu64), None),
        }
    }

    #[test]
    fn transaction_hash_golden_vector() {
        assert_eq!(
            transaction_hash(&sample_transaction()).to_hex(),
            "9309271cef418fa8599ed5214e547abf8a1259485269fddf39aa317ee199f307"
        );
    }

    #[test]
    fn transaction_hash_changes_with_any_field() {
        let base = sample_transaction();
        let mut bumped = base.clone();
        bumped.nonce += 1;
        assert_ne!(transaction_hash(&base), transaction_hash(&bumped));
        assert_eq!(transaction_hash(&base), transaction_hash(&base.clone()));
    }

    #[test]
    fn multisig_address_golden_vector() {
        let config = MultiSigConfig {
            authorized_signers: vec![Address::new([1; 32]), Address::new([2; 32])],
            quorum: 2,
            nonce: 0,
        };
        assert_eq!(
            multisig_account_address(&config).to_hex(),
            "69cf5ed708c5fc296ee27003c0ce301ce0db9f869873156c0b333da4f792819a"
        );
        let other = MultiSigConfig { nonce: 1, ..config.clone() };
        assert_ne!(multisig_account_address(&config), multisig_account_address(&other));
    }
}
