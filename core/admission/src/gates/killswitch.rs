use super::gate_view;
use crate::config::AdmissionConfig;
use crate::error::AdmissionError;
use crate::handler::{Next, TxContext, TxMiddleware, TxResult};
use crate::metrics;
use meridian_primitives::{Address, TxKind};
use meridian_state::ChainState;
use tracing::warn;

/// Height-parameterised enablement check, resolved per block.
pub type HeightPredicate = Box<dyn Fn(u64) -> bool + Send + Sync>;

/// Chain-wide kill switch for deploys and calls, with a bypass for the
/// designated oracle account. Migrations pass through untouched.
pub struct KillSwitchGate {
    deploy_enabled: HeightPredicate,
    call_enabled: HeightPredicate,
    oracle: Option<Address>,
}

impl KillSwitchGate {
    pub fn new(
        deploy_enabled: HeightPredicate,
        call_enabled: HeightPredicate,
        oracle: Option<Address>,
    ) -> Self {
        KillSwitchGate {
            deploy_enabled,
            call_enabled,
            oracle,
        }
    }

    pub fn from_config(config: &AdmissionConfig) -> Self {
        let deploy = config.deploy_switch;
        let call = config.call_switch;
        Self::new(
            Box::new(move |height| deploy.is_enabled(height)),
            Box::new(move |height| call.is_enabled(height)),
            config.oracle.clone(),
        )
    }

    fn is_oracle(&self, ctx: &TxContext) -> bool {
        match (&self.oracle, ctx.origin()) {
            (Some(oracle), Some(origin)) => oracle == origin,
            _ => false,
        }
    }
}

impl TxMiddleware for KillSwitchGate {
    fn handle(
        &self,
        state: &mut dyn ChainState,
        ctx: &mut TxContext,
        tx: &[u8],
        next: Next<'_>,
    ) -> Result<TxResult, AdmissionError> {
        let view = gate_view(tx)?;
        let height = state.block().height;

        if !self.is_oracle(ctx) {
            match view.kind {
                TxKind::Deploy if !(self.deploy_enabled)(height) => {
                    warn!(height, "deploy rejected by kill switch");
                    let err = AdmissionError::DeployNotEnabled;
                    metrics::TX_REJECTIONS_TOTAL
                        .with_label_values(&["kill_switch", err.label()])
                        .inc();
                    return Err(err);
                }
                TxKind::Call if !(self.call_enabled)(height) => {
                    warn!(height, "call rejected by kill switch");
                    let err = AdmissionError::CallNotEnabled;
                    metrics::TX_REJECTIONS_TOTAL
                        .with_label_values(&["kill_switch", err.label()])
                        .inc();
                    return Err(err);
                }
                _ => {}
            }
        }

        next.run(state, ctx, tx)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{addr, call_tx, deploy_tx, migration_tx, ok_terminal, FixedOrigin};
    use super::*;
    use crate::config::SwitchSchedule;
    use crate::handler::{PassKind, Pipeline};
    use meridian_primitives::{ChainId, VmKind};
    use meridian_state::{BlockContext, MemStore, StoreState};
    use std::sync::Arc;

    fn run_at_height(
        config: &AdmissionConfig,
        origin: Address,
        height: u64,
        tx: &[u8],
    ) -> Result<TxResult, AdmissionError> {
        let pipeline = Pipeline::builder(ok_terminal())
            .stage(Arc::new(FixedOrigin(origin)))
            .stage(Arc::new(KillSwitchGate::from_config(config)))
            .build();
        let mut store = MemStore::new();
        let mut state = StoreState::new(
            &mut store,
            BlockContext::new(height, 0, ChainId::new("meridian")),
        );
        pipeline.process(&mut state, PassKind::Speculative, tx)
    }

    #[test]
    fn test_switches_off_reject_deploy_and_call() {
        let config = AdmissionConfig {
            deploy_switch: SwitchSchedule { enabled: false, from_height: 0 },
            call_switch: SwitchSchedule { enabled: false, from_height: 0 },
            ..Default::default()
        };

        assert!(matches!(
            run_at_height(&config, addr(1), 1, &deploy_tx(VmKind::Evm)),
            Err(AdmissionError::DeployNotEnabled)
        ));
        assert!(matches!(
            run_at_height(&config, addr(1), 1, &call_tx(VmKind::Evm)),
            Err(AdmissionError::CallNotEnabled)
        ));
        // migrations are not covered by the switches
        run_at_height(&config, addr(1), 1, &migration_tx()).unwrap();
    }

    #[test]
    fn test_switch_schedule_height_boundary() {
        // deploys shut off from height 100
        let config = AdmissionConfig {
            deploy_switch: SwitchSchedule { enabled: false, from_height: 100 },
            ..Default::default()
        };

        run_at_height(&config, addr(1), 99, &deploy_tx(VmKind::Evm)).unwrap();
        assert!(matches!(
            run_at_height(&config, addr(1), 100, &deploy_tx(VmKind::Evm)),
            Err(AdmissionError::DeployNotEnabled)
        ));
    }

    #[test]
    fn test_oracle_bypasses_switches() {
        let oracle = addr(9);
        let config = AdmissionConfig {
            deploy_switch: SwitchSchedule { enabled: false, from_height: 0 },
            call_switch: SwitchSchedule { enabled: false, from_height: 0 },
            oracle: Some(oracle.clone()),
            ..Default::default()
        };

        run_at_height(&config, oracle, 1, &deploy_tx(VmKind::Plugin)).unwrap();
        assert!(run_at_height(&config, addr(1), 1, &call_tx(VmKind::Plugin)).is_err());
    }

    #[test]
    fn test_open_switches_pass_everything() {
        let config = AdmissionConfig::default();
        run_at_height(&config, addr(1), 1, &deploy_tx(VmKind::Evm)).unwrap();
        run_at_height(&config, addr(1), 1, &call_tx(VmKind::Plugin)).unwrap();
    }
}
