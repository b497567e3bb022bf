use meridian_primitives::{Address, CryptoError, TxKind, VmKind};
use thiserror::Error;

/// Admission failures, ordered roughly by pipeline depth. Rejections carry
/// enough context to be returned to the submitter verbatim.
#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("malformed {layer} envelope")]
    Malformed {
        layer: &'static str,
        #[source]
        source: bincode::Error,
    },

    #[error(transparent)]
    Signature(#[from] CryptoError),

    #[error("unknown chain ID {0}")]
    UnknownChain(String),

    #[error("transaction has no origin")]
    MissingOrigin,

    #[error("sequence number does not match: expected {expected}, got {got}")]
    SequenceMismatch { expected: u64, got: u64 },

    #[error("deploy transactions not enabled")]
    DeployNotEnabled,

    #[error("call transactions not enabled")]
    CallNotEnabled,

    #[error("{origin} not authorized to {action}")]
    NotAuthorized {
        origin: Address,
        action: &'static str,
    },

    #[error("{origin} does not have enough karma to deploy: required {required}, got {got}")]
    InsufficientKarma {
        origin: Address,
        required: i64,
        got: i64,
    },

    #[error("call limit reached for {origin}: {count} calls this session, max {max}")]
    CallLimitReached {
        origin: Address,
        count: u64,
        max: u64,
    },

    #[error("no execution handler registered for {kind:?} (vm {vm:?})")]
    Unrouted { kind: TxKind, vm: Option<VmKind> },

    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),
}

impl AdmissionError {
    pub fn malformed(layer: &'static str, source: bincode::Error) -> Self {
        AdmissionError::Malformed { layer, source }
    }

    /// Stable label used by the rejection metrics.
    pub fn label(&self) -> &'static str {
        match self {
            AdmissionError::Malformed { .. } => "malformed",
            AdmissionError::Signature(_) => "signature",
            AdmissionError::UnknownChain(_) => "unknown_chain",
            AdmissionError::MissingOrigin => "missing_origin",
            AdmissionError::SequenceMismatch { .. } => "sequence_mismatch",
            AdmissionError::DeployNotEnabled => "deploy_disabled",
            AdmissionError::CallNotEnabled => "call_disabled",
            AdmissionError::NotAuthorized { .. } => "not_authorized",
            AdmissionError::InsufficientKarma { .. } => "insufficient_karma",
            AdmissionError::CallLimitReached { .. } => "call_limit",
            AdmissionError::Unrouted { .. } => "unrouted",
            AdmissionError::Collaborator(_) => "collaborator",
        }
    }
}
