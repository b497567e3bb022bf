use anyhow::{bail, Result};
use meridian_admission::oracle::AddressMapper;
use meridian_primitives::Address;
use meridian_state::{ChainState, ContractContext, ContractReader};
use tracing::info;

pub const CONTRACT_NAME: &str = "address-mapper";

const MAPPING_PREFIX: &[u8] = b"mapping:";

fn mapping_key(from: &Address) -> Vec<u8> {
    let mut key = MAPPING_PREFIX.to_vec();
    key.extend_from_slice(&from.key_bytes());
    key
}

/// Bidirectional identity mapping between accounts on different chains.
/// Mapped account resolution walks the foreign address through this
/// contract to find the account it stands for.
#[derive(Debug, Default, Clone)]
pub struct IdentityMapper;

impl IdentityMapper {
    /// Register `a <-> b`. Both directions are written; remapping either
    /// side is an error.
    pub fn add_mapping(&self, state: &mut dyn ChainState, a: &Address, b: &Address) -> Result<()> {
        if a.chain_id == b.chain_id {
            bail!("cannot map two addresses on the same chain ({a}, {b})");
        }
        let mut ctx = ContractContext::new(state, CONTRACT_NAME);
        if ctx.has(&mapping_key(a))? {
            bail!("identity mapping already exists for {a}");
        }
        if ctx.has(&mapping_key(b))? {
            bail!("identity mapping already exists for {b}");
        }
        ctx.set(&mapping_key(a), &bincode::serialize(b)?)?;
        ctx.set(&mapping_key(b), &bincode::serialize(a)?)?;
        info!(from = %a, to = %b, "identity mapping added");
        Ok(())
    }

    pub fn has_mapping(&self, state: &dyn ChainState, addr: &Address) -> Result<bool> {
        ContractReader::new(state, CONTRACT_NAME).has(&mapping_key(addr))
    }

    /// The account `from` maps to. Missing mappings are an error.
    pub fn get_mapping(&self, state: &dyn ChainState, from: &Address) -> Result<Address> {
        let ctx = ContractReader::new(state, CONTRACT_NAME);
        match ctx.get(&mapping_key(from))? {
            Some(bytes) => Ok(bincode::deserialize(&bytes)?),
            None => bail!("no identity mapping found for {from}"),
        }
    }
}

impl AddressMapper for IdentityMapper {
    fn resolve(&self, state: &dyn ChainState, foreign: &Address) -> Result<Address> {
        self.get_mapping(state, foreign)
    }
}
