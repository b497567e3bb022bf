use anyhow::Result;
use meridian_admission::oracle::KarmaOracle;
use meridian_primitives::Address;
use meridian_state::{ChainState, ContractContext, ContractReader};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const CONTRACT_NAME: &str = "karma";

const TOTAL_PREFIX: &[u8] = b"total:";
const SESSION_PREFIX: &[u8] = b"session:";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct SessionCounter {
    count: u64,
    window_start: u64,
}

fn total_key(origin: &Address) -> Vec<u8> {
    let mut key = TOTAL_PREFIX.to_vec();
    key.extend_from_slice(&origin.key_bytes());
    key
}

fn session_key(origin: &Address) -> Vec<u8> {
    let mut key = SESSION_PREFIX.to_vec();
    key.extend_from_slice(&origin.key_bytes());
    key
}

/// Karma bookkeeping: a signed total per account plus a rolling session
/// counter for calls. Counter writes go through the caller's state
/// handle, so a discarded pass discards them too.
#[derive(Debug, Default, Clone)]
pub struct KarmaLedger;

impl KarmaLedger {
    pub fn set_karma(&self, state: &mut dyn ChainState, origin: &Address, total: i64) -> Result<()> {
        let mut ctx = ContractContext::new(state, CONTRACT_NAME);
        ctx.set(&total_key(origin), &total.to_be_bytes())?;
        Ok(())
    }

    pub fn add_karma(&self, state: &mut dyn ChainState, origin: &Address, delta: i64) -> Result<i64> {
        let current = self.karma(&*state, origin)?;
        let updated = current.saturating_add(delta);
        self.set_karma(state, origin, updated)?;
        Ok(updated)
    }

    /// Current total; accounts never written read as zero.
    pub fn karma(&self, state: &dyn ChainState, origin: &Address) -> Result<i64> {
        let ctx = ContractReader::new(state, CONTRACT_NAME);
        match ctx.get(&total_key(origin))? {
            Some(bytes) if bytes.len() == 8 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&bytes);
                Ok(i64::from_be_bytes(buf))
            }
            Some(_) => anyhow::bail!("corrupt karma total for {origin}"),
            None => Ok(0),
        }
    }
}

impl KarmaOracle for KarmaLedger {
    fn total(&self, state: &dyn ChainState, origin: &Address) -> Result<i64> {
        self.karma(state, origin)
    }

    fn record_call(
        &self,
        state: &mut dyn ChainState,
        origin: &Address,
        now_unix: u64,
        window_secs: u64,
    ) -> Result<u64> {
        let mut ctx = ContractContext::new(state, CONTRACT_NAME);
        let key = session_key(origin);
        let mut counter: SessionCounter = match ctx.get(&key)? {
            Some(bytes) => bincode::deserialize(&bytes)?,
            None => SessionCounter {
                count: 0,
                window_start: now_unix,
            },
        };

        if now_unix.saturating_sub(counter.window_start) >= window_secs {
            debug!(%origin, "karma session window rolled over");
            counter = SessionCounter {
                count: 0,
                window_start: now_unix,
            };
        }
        counter.count += 1;
        ctx.set(&key, &bincode::serialize(&counter)?)?;
        Ok(counter.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_primitives::{ChainId, LocalAddress};
    use meridian_state::{BlockContext, MemStore, StoreState};

    fn addr(byte: u8) -> Address {
        Address::new(ChainId::new("meridian"), LocalAddress::new([byte; 20]))
    }

    #[test]
    fn test_totals_read_back_and_accumulate() {
        let mut store = MemStore::new();
        let mut state =
            StoreState::new(&mut store, BlockContext::new(1, 0, ChainId::new("meridian")));
        let ledger = KarmaLedger;
        let origin = addr(1);

        assert_eq!(ledger.karma(&state, &origin).unwrap(), 0);

        ledger.set_karma(&mut state, &origin, 40).unwrap();
        assert_eq!(ledger.karma(&state, &origin).unwrap(), 40);

        assert_eq!(ledger.add_karma(&mut state, &origin, -15).unwrap(), 25);
        assert_eq!(ledger.total(&state, &origin).unwrap(), 25);
    }

    #[test]
    fn test_session_counter_rolls_over() {
        let mut store = MemStore::new();
        let mut state =
            StoreState::new(&mut store, BlockContext::new(1, 0, ChainId::new("meridian")));
        let ledger = KarmaLedger;
        let origin = addr(1);

        assert_eq!(ledger.record_call(&mut state, &origin, 100, 600).unwrap(), 1);
        assert_eq!(ledger.record_call(&mut state, &origin, 400, 600).unwrap(), 2);
        // window expired: count restarts from the new window
        assert_eq!(ledger.record_call(&mut state, &origin, 700, 600).unwrap(), 1);
    }

    #[test]
    fn test_session_counters_are_per_account() {
        let mut store = MemStore::new();
        let mut state =
            StoreState::new(&mut store, BlockContext::new(1, 0, ChainId::new("meridian")));
        let ledger = KarmaLedger;

        ledger.record_call(&mut state, &addr(1), 0, 600).unwrap();
        ledger.record_call(&mut state, &addr(1), 0, 600).unwrap();
        assert_eq!(ledger.record_call(&mut state, &addr(2), 0, 600).unwrap(), 1);
    }
}
