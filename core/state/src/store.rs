use anyhow::Result;
use std::collections::BTreeMap;

/// Ordered key/value storage beneath the chain state.
pub trait KvStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()>;

    fn delete(&mut self, key: &[u8]) -> Result<()>;

    fn has(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// All entries whose key starts with `prefix`, in ascending key order.
    fn range(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;
}

/// In-memory store backing tests and devnet nodes.
#[derive(Debug, Default, Clone)]
pub struct MemStore {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KvStore for MemStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.entries.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn range(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut out = Vec::new();
        for (k, v) in self.entries.range(prefix.to_vec()..) {
            if !k.starts_with(prefix) {
                break;
            }
            out.push((k.clone(), v.clone()));
        }
        Ok(out)
    }
}

/// Write overlay over a base store. Reads fall through to the base, writes
/// stay buffered until [`BufferedStore::commit`] flushes them down.
/// Dropping the overlay discards them.
pub struct BufferedStore<'a, S: KvStore + ?Sized> {
    base: &'a mut S,
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl<'a, S: KvStore + ?Sized> BufferedStore<'a, S> {
    pub fn new(base: &'a mut S) -> Self {
        BufferedStore {
            base,
            writes: BTreeMap::new(),
        }
    }

    /// Rebuild an overlay around writes taken from an earlier one.
    pub fn with_writes(base: &'a mut S, writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>) -> Self {
        BufferedStore { base, writes }
    }

    /// Number of buffered writes, tombstones included.
    pub fn pending(&self) -> usize {
        self.writes.len()
    }

    /// Surrender the buffered writes without flushing them.
    pub fn into_writes(self) -> BTreeMap<Vec<u8>, Option<Vec<u8>>> {
        self.writes
    }

    /// Flush buffered writes into the base store.
    pub fn commit(self) -> Result<()> {
        let BufferedStore { base, writes } = self;
        for (key, value) in writes {
            match value {
                Some(value) => base.set(&key, &value)?,
                None => base.delete(&key)?,
            }
        }
        Ok(())
    }
}

impl<'a, S: KvStore + ?Sized> KvStore for BufferedStore<'a, S> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.writes.get(key) {
            Some(Some(value)) => Ok(Some(value.clone())),
            Some(None) => Ok(None),
            None => self.base.get(key),
        }
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.writes.insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.writes.insert(key.to_vec(), None);
        Ok(())
    }

    fn range(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut merged: BTreeMap<Vec<u8>, Option<Vec<u8>>> = self
            .base
            .range(prefix)?
            .into_iter()
            .map(|(k, v)| (k, Some(v)))
            .collect();
        for (k, v) in self.writes.range(prefix.to_vec()..) {
            if !k.starts_with(prefix) {
                break;
            }
            merged.insert(k.clone(), v.clone());
        }
        Ok(merged
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k, v)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mem_store_basics() {
        let mut store = MemStore::new();
        assert!(store.is_empty());

        store.set(b"a", b"1").unwrap();
        assert_eq!(store.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert!(store.has(b"a").unwrap());
        assert!(!store.has(b"b").unwrap());

        store.delete(b"a").unwrap();
        assert_eq!(store.get(b"a").unwrap(), None);
    }

    #[test]
    fn test_mem_store_range_is_prefix_bounded_and_ordered() {
        let mut store = MemStore::new();
        store.set(b"acct:2", b"two").unwrap();
        store.set(b"acct:1", b"one").unwrap();
        store.set(b"accu", b"outside").unwrap();
        store.set(b"acct:3", b"three").unwrap();

        let entries = store.range(b"acct:").unwrap();
        let keys: Vec<_> = entries.iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(
            keys,
            vec![b"acct:1".to_vec(), b"acct:2".to_vec(), b"acct:3".to_vec()]
        );
    }

    #[test]
    fn test_buffered_store_reads_through() {
        let mut base = MemStore::new();
        base.set(b"k", b"base").unwrap();

        let overlay = BufferedStore::new(&mut base);
        assert_eq!(overlay.get(b"k").unwrap(), Some(b"base".to_vec()));
        assert_eq!(overlay.pending(), 0);
    }

    #[test]
    fn test_buffered_store_discards_on_drop() {
        let mut base = MemStore::new();
        {
            let mut overlay = BufferedStore::new(&mut base);
            overlay.set(b"k", b"buffered").unwrap();
            assert_eq!(overlay.get(b"k").unwrap(), Some(b"buffered".to_vec()));
        }
        assert_eq!(base.get(b"k").unwrap(), None);
    }

    #[test]
    fn test_buffered_store_commit_flushes() {
        let mut base = MemStore::new();
        base.set(b"gone", b"x").unwrap();

        let mut overlay = BufferedStore::new(&mut base);
        overlay.set(b"k", b"v").unwrap();
        overlay.delete(b"gone").unwrap();
        overlay.commit().unwrap();

        assert_eq!(base.get(b"k").unwrap(), Some(b"v".to_vec()));
        assert_eq!(base.get(b"gone").unwrap(), None);
    }

    #[test]
    fn test_buffered_store_tombstone_hides_base() {
        let mut base = MemStore::new();
        base.set(b"p:1", b"one").unwrap();
        base.set(b"p:2", b"two").unwrap();

        let mut overlay = BufferedStore::new(&mut base);
        overlay.delete(b"p:1").unwrap();
        overlay.set(b"p:3", b"three").unwrap();

        assert_eq!(overlay.get(b"p:1").unwrap(), None);
        assert!(!overlay.has(b"p:1").unwrap());

        let keys: Vec<_> = overlay
            .range(b"p:")
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec![b"p:2".to_vec(), b"p:3".to_vec()]);
    }

    #[test]
    fn test_buffered_store_overlay_wins_in_range() {
        let mut base = MemStore::new();
        base.set(b"p:1", b"old").unwrap();

        let mut overlay = BufferedStore::new(&mut base);
        overlay.set(b"p:1", b"new").unwrap();

        let entries = overlay.range(b"p:").unwrap();
        assert_eq!(entries, vec![(b"p:1".to_vec(), b"new".to_vec())]);
    }
}
