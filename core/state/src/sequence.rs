use crate::chain::ChainState;
use anyhow::{bail, Result};

/// Read-and-advance counter stored under a fixed key. An absent key reads
/// as zero, so the first advance yields 1.
#[derive(Debug, Clone)]
pub struct Sequence {
    key: Vec<u8>,
}

impl Sequence {
    pub fn new(key: Vec<u8>) -> Self {
        Sequence { key }
    }

    /// Current value without advancing.
    pub fn value(&self, state: &dyn ChainState) -> Result<u64> {
        match state.get(&self.key)? {
            Some(bytes) => {
                if bytes.len() != 8 {
                    bail!("corrupt sequence value under key {}", hex::encode(&self.key));
                }
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&bytes);
                Ok(u64::from_be_bytes(buf))
            }
            None => Ok(0),
        }
    }

    /// Advance the counter and return the new value.
    pub fn next(&self, state: &mut dyn ChainState) -> Result<u64> {
        let next = self.value(&*state)? + 1;
        state.set(&self.key, &next.to_be_bytes())?;
        Ok(next)
    }
}
