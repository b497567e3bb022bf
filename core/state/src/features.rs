use crate::chain::ChainState;
use crate::store::KvStore;
use anyhow::Result;
use std::collections::BTreeSet;

pub const FEATURE_PREFIX: &[u8] = b"feature:";

pub fn feature_key(name: &str) -> Vec<u8> {
    let mut key = FEATURE_PREFIX.to_vec();
    key.extend_from_slice(name.as_bytes());
    key
}

/// Record a feature flag position directly in a store.
pub fn set_feature(store: &mut dyn KvStore, name: &str, enabled: bool) -> Result<()> {
    store.set(&feature_key(name), &[enabled as u8])
}

/// Tri-state read: `None` when the flag was never written.
pub fn feature_enabled(store: &dyn KvStore, name: &str) -> Result<Option<bool>> {
    Ok(store
        .get(&feature_key(name))?
        .map(|v| v.first() == Some(&1)))
}

/// Immutable snapshot of every enabled flag, taken once per transaction so
/// a single decision set governs the whole pass even if flags flip
/// mid-block.
#[derive(Debug, Clone, Default)]
pub struct FeatureSet {
    enabled: BTreeSet<String>,
}

impl FeatureSet {
    pub fn snapshot(state: &dyn ChainState) -> Result<Self> {
        let mut enabled = BTreeSet::new();
        for (key, value) in state.range(FEATURE_PREFIX)? {
            if value.first() != Some(&1) {
                continue;
            }
            let name = String::from_utf8_lossy(&key[FEATURE_PREFIX.len()..]).into_owned();
            enabled.insert(name);
        }
        Ok(FeatureSet { enabled })
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.contains(name)
    }

    pub fn enable(&mut self, name: impl Into<String>) {
        self.enabled.insert(name.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.enabled.iter().map(String::as_str)
    }
}
