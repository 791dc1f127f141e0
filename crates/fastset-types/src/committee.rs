use serde::{Deserialize, Serialize};

use crate::{error::ValidationError, ids::ValidatorName};

/// The known validator set and the number of attestations a certificate needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Committee {
    members: Vec<ValidatorName>,
    quorum: usize,
}

impl Committee {
    /// Builds a committee with the BFT quorum `n - floor((n - 1) / 3)`.
    pub fn new(members: Vec<ValidatorName>) -> Result<Self, ValidationError> {
        let quorum = Self::bft_quorum(members.len());
        Self::with_quorum(members, quorum)
    }

    pub fn with_quorum(
        members: Vec<ValidatorName>,
        quorum: usize,
    ) -> Result<Self, ValidationError> {
        if members.is_empty() {
            return Err(ValidationError::Message("committee has no members".to_string()));
        }
        for (index, member) in members.iter().enumerate() {
            if members[..index].contains(member) {
                return Err(ValidationError::Message(format!(
                    "duplicate committee member {member}"
                )));
            }
        }
        if quorum == 0 || quorum > members.len() {
            return Err(ValidationError::Message(format!(
                "quorum {quorum} out of range 1..={}",
                members.len()
            )));
        }
        Ok(Self { members, quorum })
    }

    pub fn bft_quorum(n: usize) -> usize {
        if n == 0 {
            return 0;
        }
        n - (n - 1) / 3
    }

    pub fn members(&self) -> &[ValidatorName] {
        &self.members
    }

    pub fn contains(&self, validator: &ValidatorName) -> bool {
        self.members.contains(validator)
    }

    pub fn quorum(&self) -> usize {
        self.quorum
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
