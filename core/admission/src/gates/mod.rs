mod allowlist;
mod karma;
mod killswitch;
mod whitelist;

pub use allowlist::DeployAllowlistGate;
pub use karma::KarmaGate;
pub use killswitch::{HeightPredicate, KillSwitchGate};
pub use whitelist::{DeployerWhitelistGate, DEPLOYER_WHITELIST_FEATURE};

use crate::error::AdmissionError;
use meridian_primitives::{CallTx, DeployTx, TaggedTx, TxKind, VmKind};

/// What a gate needs to know about a transaction: its kind and, where the
/// kind implies one, the target VM. The payload itself stays opaque.
pub(crate) struct GateView {
    pub kind: TxKind,
    pub vm: Option<VmKind>,
}

pub(crate) fn gate_view(tx: &[u8]) -> Result<GateView, AdmissionError> {
    let tagged = TaggedTx::decode(tx).map_err(|e| AdmissionError::malformed("tagged", e))?;
    let vm = match tagged.kind {
        TxKind::Deploy => Some(
            DeployTx::decode(&tagged.body)
                .map_err(|e| AdmissionError::malformed("deploy", e))?
                .vm,
        ),
        TxKind::Call => Some(
            CallTx::decode(&tagged.body)
                .map_err(|e| AdmissionError::malformed("call", e))?
                .vm,
        ),
        TxKind::Migration => None,
    };
    Ok(GateView {
        kind: tagged.kind,
        vm,
    })
}
