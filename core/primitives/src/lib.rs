pub mod crypto;
pub mod tx;
pub mod types;

pub use crypto::CryptoError;
pub use tx::{CallTx, DeployTx, MigrationTx, NonceTx, SignedTx, TaggedTx, TxKind, VmKind};
pub use types::{Address, AddressParseError, ChainId, LocalAddress, PublicKey, Signature};
