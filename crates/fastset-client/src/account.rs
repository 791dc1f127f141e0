//! LocalAccount: nonce reservation, pending transfers, and the last balances seen on the network.

use std::collections::{BTreeSet, HashMap};

use fastset_rpc::AccountInfoResponse;
use fastset_types::{Address, Amount, Balance, Nonce, TokenId, TransactionHash};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PendingStatus {
    Pending,
    Certified,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransfer {
    pub hash: TransactionHash,
    pub nonce: Nonce,
    pub token_id: TokenId,
    pub amount: Amount,
    pub status: PendingStatus,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccountError {
    #[error("nonce {0} is not reserved")]
    MissingReservation(Nonce),
    #[error("pending transfer {0} not found")]
    PendingNotFound(TransactionHash),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalAccount {
    pub address: Address,
    next_nonce: Nonce,
    reserved: BTreeSet<Nonce>,
    pending: HashMap<TransactionHash, PendingTransfer>,
    balances: HashMap<TokenId, Balance>,
}

impl LocalAccount {
    pub fn new(address: Address, next_nonce: Nonce) -> Self {
        Self {
            address,
            next_nonce,
            reserved: BTreeSet::new(),
            pending: HashMap::new(),
            balances: HashMap::new(),
        }
    }

    /// The nonce the network expects next, as far as this account knows.
    pub fn next_nonce(&self) -> Nonce {
        self.next_nonce
    }

    pub fn reserved(&self) -> impl Iterator<Item = Nonce> + '_ {
        self.reserved.iter().copied()
    }

    /// Hands out the lowest nonce that is neither committed nor reserved.
    pub fn reserve_nonce(&mut self) -> Nonce {
        let nonce = self
            .reserved
            .last()
            .map(|last| last.saturating_add(1))
            .unwrap_or(self.next_nonce)
            .max(self.next_nonce);
        self.reserved.insert(nonce);
        nonce
    }

    /// Gives a reserved nonce back, so the next reservation can reuse it.
    pub fn release_nonce(&mut self, nonce: Nonce) -> Result<(), AccountError> {
        if !self.reserved.remove(&nonce) {
            return Err(AccountError::MissingReservation(nonce));
        }
        Ok(())
    }

    /// Marks a reserved nonce as used by a certified transaction.
    pub fn commit_nonce(&mut self, nonce: Nonce) -> Result<(), AccountError> {
        if !self.reserved.remove(&nonce) {
            return Err(AccountError::MissingReservation(nonce));
        }
        self.next_nonce = self.next_nonce.max(nonce.saturating_add(1));
        Ok(())
    }

    /// Adopts the network's view after a query. Reservations below the new nonce are dropped.
    pub fn refresh(&mut self, info: &AccountInfoResponse) {
        self.sync_nonce(info.next_nonce);
        self.balances
            .insert(TokenId::native(), info.balance);
        for (token_id, balance) in &info.token_balance {
            self.balances.insert(*token_id, *balance);
        }
    }

    pub fn sync_nonce(&mut self, next_nonce: Nonce) {
        self.next_nonce = next_nonce;
        self.reserved.retain(|nonce| *nonce >= next_nonce);
    }

    pub fn balance(&self, token_id: &TokenId) -> Option<Balance> {
        self.balances.get(token_id).copied()
    }

    pub fn add_pending(&mut self, pending: PendingTransfer) {
        self.pending.insert(pending.hash, pending);
    }

    pub fn pending(&self, hash: &TransactionHash) -> Option<&PendingTransfer> {
        self.pending.get(hash)
    }

    pub fn set_status(
        &mut self,
        hash: &TransactionHash,
        status: PendingStatus,
    ) -> Result<(), AccountError> {
        let pending = self
            .pending
            .get_mut(hash)
            .ok_or(AccountError::PendingNotFound(*hash))?;
        pending.status = status;
        Ok(())
    }

    /// Drops finished transfers, keeping the ones still in flight.
    pub fn prune_finished(&mut self) {
        self.pending
            .retain(|_, pending| pending.status == PendingStatus::Pending);
    }
}

#[cfg(test)]
mod tests {
    use fastset_rpc::AccountInfoResponse;
    use fastset_types::{Address, Amount, Balance, TokenId, TransactionHash};

    use super::{AccountError, LocalAccount, PendingStatus, PendingTransfer};

    #[test]
    fn reserve_release_commit_nonce_flow() {
        let mut account = LocalAccount::new(Address::new([1; 32]), 0);
        assert_eq!(account.reserve_nonce(), 0);
        account.release_nonce(0).unwrap();
        assert_eq!(account.reserve_nonce(), 0);
        assert_eq!(account.reserve_nonce(), 1);

        account.commit_nonce(0).unwrap();
        assert_eq!(account.next_nonce(), 1);
        assert_eq!(account.reserved().collect::<Vec<_>>(), vec![1]);
        assert_eq!(account.commit_nonce(0), Err(AccountError::MissingReservation(0)));
        assert_eq!(account.reserve_nonce(), 2);
    }

    #[test]
    fn refresh_adopts_network_nonce_and_balances() {
        let mut account = LocalAccount::new(Address::new([1; 32]), 0);
        account.reserve_nonce();
        account.reserve_nonce();
        let info = AccountInfoResponse {
            sender: account.address,
            balance: Balance::from_amount(Amount::from(0xffu64)),
            next_nonce: 5,
            token_balance: vec![(TokenId::new([0xaa; 32]), Balance::negative(Amount::from(3u64)))],
            requested_certificates: None,
        };
        account.refresh(&info);
        assert_eq!(account.next_nonce(), 5);
        assert_eq!(account.reserved().count(), 0);
        assert_eq!(account.reserve_nonce(), 5);
        assert_eq!(
            account.balance(&TokenId::native()),
            Some(Balance::from_amount(Amount::from(0xffu64)))
        );
        assert!(account
            .balance(&TokenId::new([0xaa; 32]))
            .is_some_and(|balance| balance.is_negative()));
    }

    #[test]
    fn tracks_and_prunes_pending_transfers() {
        let mut account = LocalAccount::new(Address::new([1; 32]), 0);
        let hash = TransactionHash::new([9; 32]);
        account.add_pending(PendingTransfer {
            hash,
            nonce: 0,
            token_id: TokenId::native(),
            amount: Amount::from(1u64),
            status: PendingStatus::Pending,
        });
        account.prune_finished();
        assert!(account.pending(&hash).is_some());

        account.set_status(&hash, PendingStatus::Certified).unwrap();
        account.prune_finished();
        assert!(account.pending(&hash).is_none());
        assert!(account.set_status(&hash, PendingStatus::Failed).is_err());
    }
}
