use super::gate_view;
use crate::error::AdmissionError;
use crate::handler::{Next, TxContext, TxMiddleware, TxResult};
use crate::metrics;
use crate::oracle::{DeployPermissions, DeployerOracle};
use meridian_primitives::{TxKind, VmKind};
use meridian_state::ChainState;
use std::sync::Arc;
use tracing::debug;

/// Feature flag that arms the whitelist check once the gate is wired in.
pub const DEPLOYER_WHITELIST_FEATURE: &str = "deployer-whitelist";

/// Per-account permission gate for deploys and migrations. Calls pass
/// through. While the feature flag is off the gate forwards everything,
/// which lets the gate ship ahead of the flag flip.
pub struct DeployerWhitelistGate {
    oracle: Arc<dyn DeployerOracle>,
}

impl DeployerWhitelistGate {
    pub fn new(oracle: Arc<dyn DeployerOracle>) -> Self {
        DeployerWhitelistGate { oracle }
    }
}

impl TxMiddleware for DeployerWhitelistGate {
    fn handle(
        &self,
        state: &mut dyn ChainState,
        ctx: &mut TxContext,
        tx: &[u8],
        next: Next<'_>,
    ) -> Result<TxResult, AdmissionError> {
        if !state.feature_enabled(DEPLOYER_WHITELIST_FEATURE, false) {
            return next.run(state, ctx, tx);
        }

        let view = gate_view(tx)?;
        let (required, action) = match (view.kind, view.vm) {
            (TxKind::Deploy, Some(VmKind::Evm)) => {
                (DeployPermissions::ALLOW_EVM_DEPLOY, "deploy EVM contracts")
            }
            (TxKind::Deploy, _) => (
                DeployPermissions::ALLOW_PLUGIN_DEPLOY,
                "deploy plugin contracts",
            ),
            (TxKind::Migration, _) => (DeployPermissions::ALLOW_MIGRATION, "migrate contracts"),
            (TxKind::Call, _) => return next.run(state, ctx, tx),
        };

        let origin = ctx.require_origin()?.clone();
        let permissions = self.oracle.permissions(&*state, &origin)?;
        if !permissions.allows(required) {
            debug!(%origin, action, "deployer whitelist rejection");
            let err = AdmissionError::NotAuthorized { origin, action };
            metrics::TX_REJECTIONS_TOTAL
                .with_label_values(&["deployer_whitelist", err.label()])
                .inc();
            return Err(err);
        }

        next.run(state, ctx, tx)
    }
}
