use crate::genesis::{self, GenesisDoc};
use anyhow::Result;
use meridian_admission::{
    AdmissionConfig, AdmissionError, AuthStage, DeployAllowlistGate, DeployerWhitelistGate,
    KarmaGate, KillSwitchGate, NonceAdvanceHook, NonceStage, PassKind, Pipeline, TxHandler,
    TxResult,
};
use meridian_oracles::{DeployerWhitelist, IdentityMapper, KarmaLedger};
use meridian_primitives::{crypto, ChainId};
use meridian_state::{BlockContext, BufferedStore, KvStore, StoreState};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Assemble the admission pipeline from configuration: the signature stage,
/// the nonce stage, then whichever gates the config arms, with the nonce
/// advance hook behind the terminal handler.
pub fn build_pipeline(config: &AdmissionConfig, terminal: Arc<dyn TxHandler>) -> Pipeline {
    let nonce = Arc::new(NonceStage::new());
    let mut builder = Pipeline::builder(terminal)
        .stage(Arc::new(AuthStage::new(config, Arc::new(IdentityMapper))))
        .stage(nonce.clone())
        .stage(Arc::new(KillSwitchGate::from_config(config)));
    if config.whitelist_enabled {
        builder = builder.stage(Arc::new(DeployerWhitelistGate::new(Arc::new(
            DeployerWhitelist,
        ))));
    }
    if config.karma_enabled {
        builder = builder.stage(Arc::new(KarmaGate::new(
            Arc::new(KarmaLedger),
            config.karma.clone(),
        )));
    }
    if !config.deploy_allowlist.is_empty() {
        builder = builder.stage(Arc::new(DeployAllowlistGate::new(
            config.deploy_allowlist.clone(),
        )));
    }
    builder.hook(Arc::new(NonceAdvanceHook::new(nonce))).build()
}

/// The admission surface a consensus engine embeds.
///
/// Speculative passes run in a throwaway overlay and never touch the
/// backing store. Commit passes accumulate in a per-block overlay that
/// [`AdmissionService::commit`] flushes; a failed transaction contributes
/// nothing to it.
pub struct AdmissionService<S: KvStore> {
    store: S,
    chain_id: ChainId,
    block: BlockContext,
    pipeline: Pipeline,
    block_writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl<S: KvStore> AdmissionService<S> {
    pub fn new(store: S, chain_id: ChainId, pipeline: Pipeline) -> Self {
        let block = BlockContext::new(0, 0, chain_id.clone());
        AdmissionService {
            store,
            chain_id,
            block,
            pipeline,
            block_writes: BTreeMap::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn block(&self) -> &BlockContext {
        &self.block
    }

    /// Seed the backing store from a genesis document.
    pub fn apply_genesis(&mut self, doc: &GenesisDoc) -> Result<()> {
        genesis::apply(&mut self.store, &self.chain_id, doc)
    }

    /// Open a block. Writes left over from an uncommitted block are
    /// discarded.
    pub fn begin_block(&mut self, height: u64, time_unix: u64) {
        if !self.block_writes.is_empty() {
            warn!(
                height,
                pending = self.block_writes.len(),
                "discarding writes from an uncommitted block"
            );
            self.block_writes.clear();
        }
        self.block = BlockContext::new(height, time_unix, self.chain_id.clone());
        debug!(height, time_unix, "block opened");
    }

    /// Mempool admission. Runs the speculative pass in an overlay that is
    /// always dropped, whatever the outcome.
    pub fn check_tx(&mut self, tx: &[u8]) -> Result<TxResult, AdmissionError> {
        let mut overlay = BufferedStore::new(&mut self.store);
        let mut state = StoreState::new(&mut overlay, self.block.clone());
        self.pipeline.process(&mut state, PassKind::Speculative, tx)
    }

    /// Block application. On success the transaction's writes join the
    /// block overlay; on failure they are dropped and the overlay keeps
    /// only the writes of previously applied transactions.
    pub fn deliver_tx(&mut self, tx: &[u8]) -> Result<TxResult, AdmissionError> {
        let writes = std::mem::take(&mut self.block_writes);
        let mut block_overlay = BufferedStore::with_writes(&mut self.store, writes);

        let admitted = {
            let mut tx_overlay = BufferedStore::new(&mut block_overlay);
            let mut state = StoreState::new(&mut tx_overlay, self.block.clone());
            let outcome = self.pipeline.process(&mut state, PassKind::Commit, tx);
            drop(state);
            match outcome {
                Ok(result) => tx_overlay
                    .commit()
                    .map(|()| result)
                    .map_err(AdmissionError::Collaborator),
                Err(err) => Err(err),
            }
        };

        self.block_writes = block_overlay.into_writes();
        admitted
    }

    /// Flush the block overlay to the backing store and return a digest of
    /// the resulting application state.
    pub fn commit(&mut self) -> Result<[u8; 32]> {
        let writes = std::mem::take(&mut self.block_writes);
        let overlay = BufferedStore::with_writes(&mut self.store, writes);
        let flushed = overlay.pending();
        overlay.commit()?;

        let digest = self.app_digest()?;
        info!(
            height = self.block.height,
            writes = flushed,
            digest = %hex::encode(&digest[..8]),
            "block committed"
        );
        Ok(digest)
    }

    /// Keccak digest over every entry of the backing store, in key order.
    pub fn app_digest(&self) -> Result<[u8; 32]> {
        let mut data = Vec::new();
        for (key, value) in self.store.range(&[])? {
            data.extend_from_slice(&(key.len() as u32).to_be_bytes());
            data.extend_from_slice(&key);
            data.extend_from_slice(&(value.len() as u32).to_be_bytes());
            data.extend_from_slice(&value);
        }
        Ok(crypto::keccak256(&data))
    }
}
