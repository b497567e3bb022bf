use crate::error::AdmissionError;
use crate::handler::{Next, PassKind, PostTxHook, TxContext, TxMiddleware, TxResult};
use crate::metrics;
use meridian_primitives::{Address, NonceTx};
use meridian_state::{ChainState, Sequence};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub const NONCE_KEY_PREFIX: &[u8] = b"nonce:";

pub fn nonce_key(origin: &Address) -> Vec<u8> {
    let mut key = NONCE_KEY_PREFIX.to_vec();
    key.extend_from_slice(&origin.key_bytes());
    key
}

/// Next sequence number `origin` is expected to use, without advancing
/// anything. Query surface for wallets and RPC frontends.
pub fn next_sequence(state: &dyn ChainState, origin: &Address) -> anyhow::Result<u64> {
    Ok(Sequence::new(nonce_key(origin)).value(state)? + 1)
}

#[derive(Debug, Default)]
struct NonceCache {
    height: u64,
    assigned: HashMap<String, u64>,
}

/// Nonce sequencing stage.
///
/// The durable per-account counter advances through the state handle, so
/// its fate follows the pass: speculative passes run over a discarded
/// overlay and never move it, commit passes persist it with the
/// transaction. On top of that sits a per-block cache that hands
/// consecutive sequence numbers to the speculative pass, letting several
/// transactions from one account queue up within a block. The commit pass
/// ignores cached values and trusts the durable counter alone.
///
/// Share one instance between the stage slot and a [`NonceAdvanceHook`];
/// the hook moves the cache forward after each admitted transaction.
pub struct NonceStage {
    cache: Mutex<NonceCache>,
}

impl NonceStage {
    pub fn new() -> Self {
        NonceStage {
            cache: Mutex::new(NonceCache::default()),
        }
    }

    fn expected_sequence(
        &self,
        state: &mut dyn ChainState,
        origin: &Address,
        pass: PassKind,
    ) -> Result<u64, AdmissionError> {
        let height = state.block().height;
        let mut cache = self.cache.lock();
        if cache.height != height {
            debug!(height, "nonce cache reset");
            cache.assigned.clear();
            cache.height = height;
        }

        let persisted = Sequence::new(nonce_key(origin)).next(state)?;
        let key = origin.to_string();
        let cached = cache.assigned.get(&key).copied().unwrap_or(0);

        if pass.is_speculative() && cached != 0 {
            Ok(cached)
        } else {
            cache.assigned.insert(key, persisted);
            Ok(persisted)
        }
    }

    fn advance(&self, origin: &Address) {
        let mut cache = self.cache.lock();
        let entry = cache.assigned.entry(origin.to_string()).or_insert(0);
        *entry += 1;
    }
}

impl Default for NonceStage {
    fn default() -> Self {
        Self::new()
    }
}

impl TxMiddleware for NonceStage {
    fn handle(
        &self,
        state: &mut dyn ChainState,
        ctx: &mut TxContext,
        tx: &[u8],
        next: Next<'_>,
    ) -> Result<TxResult, AdmissionError> {
        let origin = ctx.require_origin()?.clone();
        let nonce_tx = NonceTx::decode(tx).map_err(|e| AdmissionError::malformed("nonce", e))?;

        let expected = self.expected_sequence(state, &origin, ctx.pass())?;
        if nonce_tx.sequence != expected {
            metrics::SEQUENCE_MISMATCHES_TOTAL.inc();
            return Err(AdmissionError::SequenceMismatch {
                expected,
                got: nonce_tx.sequence,
            });
        }

        next.run(state, ctx, &nonce_tx.inner)
    }
}

/// Moves the nonce cache past an admitted transaction so the next
/// speculative pass expects the following sequence number.
pub struct NonceAdvanceHook {
    stage: Arc<NonceStage>,
}

impl NonceAdvanceHook {
    pub fn new(stage: Arc<NonceStage>) -> Self {
        NonceAdvanceHook { stage }
    }
}

impl PostTxHook for NonceAdvanceHook {
    fn after(
        &self,
        _state: &mut dyn ChainState,
        ctx: &TxContext,
        _tx: &[u8],
        _result: &TxResult,
    ) -> Result<(), AdmissionError> {
        let origin = ctx.require_origin()?;
        self.stage.advance(origin);
        Ok(())
    }
}
