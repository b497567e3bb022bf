use super::gate_view;
use crate::config::KarmaParams;
use crate::error::AdmissionError;
use crate::handler::{Next, TxContext, TxMiddleware, TxResult};
use crate::metrics;
use crate::oracle::KarmaOracle;
use meridian_primitives::TxKind;
use meridian_state::ChainState;
use std::sync::Arc;
use tracing::debug;

/// Reputation throttle. Deploys need a minimum karma total; calls are
/// limited per session window. Call counting writes through the pass's
/// state handle, so a discarded pass discards the count as well.
pub struct KarmaGate {
    oracle: Arc<dyn KarmaOracle>,
    params: KarmaParams,
}

impl KarmaGate {
    pub fn new(oracle: Arc<dyn KarmaOracle>, params: KarmaParams) -> Self {
        KarmaGate { oracle, params }
    }
}

impl TxMiddleware for KarmaGate {
    fn handle(
        &self,
        state: &mut dyn ChainState,
        ctx: &mut TxContext,
        tx: &[u8],
        next: Next<'_>,
    ) -> Result<TxResult, AdmissionError> {
        let view = gate_view(tx)?;
        match view.kind {
            TxKind::Deploy => {
                let origin = ctx.require_origin()?.clone();
                let total = self.oracle.total(&*state, &origin)?;
                if total < self.params.min_karma_to_deploy {
                    let err = AdmissionError::InsufficientKarma {
                        origin,
                        required: self.params.min_karma_to_deploy,
                        got: total,
                    };
                    metrics::TX_REJECTIONS_TOTAL
                        .with_label_values(&["karma", err.label()])
                        .inc();
                    return Err(err);
                }
                debug!(%origin, total, "karma deploy check passed");
            }
            TxKind::Call => {
                let origin = ctx.require_origin()?.clone();
                let now = state.block().time_unix;
                let count = self.oracle.record_call(
                    state,
                    &origin,
                    now,
                    self.params.session_duration_secs,
                )?;
                if count > self.params.max_call_count {
                    let err = AdmissionError::CallLimitReached {
                        origin,
                        count,
                        max: self.params.max_call_count,
                    };
                    metrics::TX_REJECTIONS_TOTAL
                        .with_label_values(&["karma", err.label()])
                        .inc();
                    return Err(err);
                }
            }
            TxKind::Migration => {}
        }

        next.run(state, ctx, tx)
    }
}
