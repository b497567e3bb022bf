pub mod chain;
pub mod contracts;
pub mod features;
pub mod sequence;
pub mod store;

pub use chain::{BlockContext, ChainState, StoreState};
pub use contracts::{register_contract, resolve_contract, ContractContext, ContractReader};
pub use features::{set_feature, FeatureSet};
pub use sequence::Sequence;
pub use store::{BufferedStore, KvStore, MemStore};
