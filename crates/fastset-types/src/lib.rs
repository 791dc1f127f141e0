pub mod amount;
pub mod codec;
pub mod committee;
pub mod error;
pub mod ids;
pub mod model;
pub mod serde_helpers;
pub mod traits;

pub use amount::{Amount, Balance};
pub use codec::{decode, encode, Canonical, Reader};
pub use committee::Committee;
pub use error::{AssemblyError, CryptoError, FormatError, MultiSigError, ValidationError};
pub use ids::{
    Address, Nonce, Signature, TokenId, TransactionHash, UserData, ValidatorName, ADDRESS_HRP,
    NATIVE_TOKEN_ID,
};
pub use model::{
    ClaimType, MultiSig, MultiSigConfig, SignatureOrMultiSig, TokenTransfer, Transaction,
    TransactionCertificate, TransactionEnvelope,
};
pub use traits::{domain_message, Signable, SignatureScheme, Signer};
