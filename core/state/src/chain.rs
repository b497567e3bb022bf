use crate::features;
use crate::store::KvStore;
use anyhow::Result;
use meridian_primitives::ChainId;
use tracing::warn;

/// Consensus-supplied context for the block whose pass is in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockContext {
    pub height: u64,
    /// Block timestamp, seconds since the epoch.
    pub time_unix: u64,
    pub chain_id: ChainId,
}

impl BlockContext {
    pub fn new(height: u64, time_unix: u64, chain_id: ChainId) -> Self {
        BlockContext {
            height,
            time_unix,
            chain_id,
        }
    }
}

/// The transactional state view every pipeline stage works against. Writes
/// land in whatever store backs the view, so durability is decided by the
/// caller wiring in a buffered or a committed store.
pub trait ChainState {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()>;

    fn has(&self, key: &[u8]) -> Result<bool>;

    fn delete(&mut self, key: &[u8]) -> Result<()>;

    /// Entries under `prefix` in ascending key order.
    fn range(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;

    fn block(&self) -> &BlockContext;

    /// Feature flag lookup with a fallback for flags nothing has written.
    fn feature_enabled(&self, name: &str, default_on: bool) -> bool;
}

/// [`ChainState`] over any [`KvStore`].
pub struct StoreState<'a> {
    store: &'a mut dyn KvStore,
    block: BlockContext,
}

impl<'a> StoreState<'a> {
    pub fn new(store: &'a mut dyn KvStore, block: BlockContext) -> Self {
        StoreState { store, block }
    }
}

impl ChainState for StoreState<'_> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.store.get(key)
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.store.set(key, value)
    }

    fn has(&self, key: &[u8]) -> Result<bool> {
        self.store.has(key)
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.store.delete(key)
    }

    fn range(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        self.store.range(prefix)
    }

    fn block(&self) -> &BlockContext {
        &self.block
    }

    fn feature_enabled(&self, name: &str, default_on: bool) -> bool {
        match features::feature_enabled(&*self.store, name) {
            Ok(Some(enabled)) => enabled,
            Ok(None) => default_on,
            Err(err) => {
                warn!(feature = name, %err, "feature flag lookup failed");
                default_on
            }
        }
    }
}
