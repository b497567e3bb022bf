use anyhow::Result;
use meridian_primitives::Address;
use meridian_state::ChainState;
use serde::{Deserialize, Serialize};

/// Deploy and migration permission bits carried by a whitelist record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeployPermissions(u32);

impl DeployPermissions {
    pub const ALLOW_EVM_DEPLOY: u32 = 0x1;
    pub const ALLOW_PLUGIN_DEPLOY: u32 = 0x2;
    pub const ALLOW_MIGRATION: u32 = 0x4;
    pub const ALL: u32 = 0x7;

    pub fn new(bits: u32) -> Self {
        DeployPermissions(bits)
    }

    pub fn none() -> Self {
        DeployPermissions(0)
    }

    pub fn all() -> Self {
        DeployPermissions(Self::ALL)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn allows(self, flag: u32) -> bool {
        self.0 & flag != 0
    }
}

/// Cross-chain identity mapping consulted during mapped account
/// resolution.
pub trait AddressMapper: Send + Sync {
    /// Translate a foreign-chain address into the account it maps to. A
    /// missing mapping is an error.
    fn resolve(&self, state: &dyn ChainState, foreign: &Address) -> Result<Address>;
}

/// Read surface of the deployer whitelist.
pub trait DeployerOracle: Send + Sync {
    /// Permission flags for `origin`. Accounts without a record get zero
    /// flags, not an error.
    fn permissions(&self, state: &dyn ChainState, origin: &Address) -> Result<DeployPermissions>;
}

/// Karma totals and per-session call accounting.
pub trait KarmaOracle: Send + Sync {
    fn total(&self, state: &dyn ChainState, origin: &Address) -> Result<i64>;

    /// Record one call for `origin` in the session window containing
    /// `now_unix` and return the updated count. The oracle owns the window
    /// rollover.
    fn record_call(
        &self,
        state: &mut dyn ChainState,
        origin: &Address,
        now_unix: u64,
        window_secs: u64,
    ) -> Result<u64>;
}
