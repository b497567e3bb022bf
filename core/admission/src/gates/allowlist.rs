use super::gate_view;
use crate::error::AdmissionError;
use crate::handler::{Next, TxContext, TxMiddleware, TxResult};
use crate::metrics;
use meridian_primitives::{Address, TxKind, VmKind};
use meridian_state::ChainState;
use tracing::debug;

/// Static allowlist for plugin-VM deploys, configured once at startup.
/// Predates the whitelist contract and kept for chains still running on
/// it. EVM deploys and every other kind pass through.
pub struct DeployAllowlistGate {
    allowed: Vec<Address>,
}

impl DeployAllowlistGate {
    pub fn new(allowed: Vec<Address>) -> Self {
        DeployAllowlistGate { allowed }
    }
}

impl TxMiddleware for DeployAllowlistGate {
    fn handle(
        &self,
        state: &mut dyn ChainState,
        ctx: &mut TxContext,
        tx: &[u8],
        next: Next<'_>,
    ) -> Result<TxResult, AdmissionError> {
        let view = gate_view(tx)?;
        if view.kind == TxKind::Deploy && view.vm == Some(VmKind::Plugin) {
            let origin = ctx.require_origin()?;
            if !self.allowed.iter().any(|candidate| candidate == origin) {
                debug!(%origin, "plugin deploy outside the static allowlist");
                let err = AdmissionError::NotAuthorized {
                    origin: origin.clone(),
                    action: "deploy plugin contracts",
                };
                metrics::TX_REJECTIONS_TOTAL
                    .with_label_values(&["deploy_allowlist", err.label()])
                    .inc();
                return Err(err);
            }
        }

        next.run(state, ctx, tx)
    }
}
