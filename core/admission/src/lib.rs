pub mod auth;
pub mod config;
pub mod error;
pub mod gates;
pub mod handler;
pub mod metrics;
pub mod nonce;
pub mod oracle;
pub mod router;

pub use auth::{resolve_origin, sigtx_feature, AuthStage};
pub use config::{
    AccountResolution, AdmissionConfig, ChainEntry, KarmaParams, SigScheme, SwitchSchedule,
};
pub use error::AdmissionError;
pub use gates::{
    DeployAllowlistGate, DeployerWhitelistGate, KarmaGate, KillSwitchGate,
    DEPLOYER_WHITELIST_FEATURE,
};
pub use handler::{
    Next, PassKind, Pipeline, PipelineBuilder, PostTxHook, TxContext, TxEvent, TxHandler,
    TxMiddleware, TxResult,
};
pub use nonce::{next_sequence, NonceAdvanceHook, NonceStage};
pub use oracle::{AddressMapper, DeployPermissions, DeployerOracle, KarmaOracle};
pub use router::{MigrationDispatch, TxRouter, VmDispatch};
