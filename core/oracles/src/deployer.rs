use anyhow::{bail, Result};
use meridian_admission::oracle::{DeployPermissions, DeployerOracle};
use meridian_primitives::Address;
use meridian_state::{ChainState, ContractContext, ContractReader};
use serde::{Deserialize, Serialize};
use tracing::info;

pub const CONTRACT_NAME: &str = "deployer-whitelist";

const RECORD_PREFIX: &[u8] = b"deployer:";
const MODIFY_TOKEN: &[u8] = b"modify";
const OWNER_ROLE: &str = "owner";

/// Persisted whitelist entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployerRecord {
    pub address: Address,
    pub permissions: DeployPermissions,
}

fn record_key(deployer: &Address) -> Vec<u8> {
    let mut key = RECORD_PREFIX.to_vec();
    key.extend_from_slice(&deployer.key_bytes());
    key
}

/// The deployer whitelist: management operations for an owner account
/// plus the read path the admission gate consumes.
#[derive(Debug, Default, Clone)]
pub struct DeployerWhitelist;

impl DeployerWhitelist {
    /// Install the contract. The owner receives every permission flag and
    /// the role that guards later modifications.
    pub fn init(&self, state: &mut dyn ChainState, owner: &Address) -> Result<()> {
        let mut ctx = ContractContext::new(state, CONTRACT_NAME);
        ctx.grant_permission(owner, MODIFY_TOKEN, OWNER_ROLE)?;
        let record = DeployerRecord {
            address: owner.clone(),
            permissions: DeployPermissions::all(),
        };
        ctx.set(&record_key(owner), &bincode::serialize(&record)?)?;
        info!(%owner, "deployer whitelist initialised");
        Ok(())
    }

    /// Add or update a deployer record. `caller` must hold the owner role.
    pub fn add_deployer(
        &self,
        state: &mut dyn ChainState,
        caller: &Address,
        deployer: &Address,
        permissions: DeployPermissions,
    ) -> Result<()> {
        let mut ctx = ContractContext::new(state, CONTRACT_NAME);
        if !ctx.has_permission(caller, MODIFY_TOKEN, &[OWNER_ROLE])? {
            bail!("{caller} is not authorized to modify the deployer whitelist");
        }
        let record = DeployerRecord {
            address: deployer.clone(),
            permissions,
        };
        ctx.set(&record_key(deployer), &bincode::serialize(&record)?)?;
        info!(%deployer, bits = permissions.bits(), "deployer added");
        Ok(())
    }

    /// Remove a deployer record. Removing an absent record is a no-op.
    pub fn remove_deployer(
        &self,
        state: &mut dyn ChainState,
        caller: &Address,
        deployer: &Address,
    ) -> Result<()> {
        let mut ctx = ContractContext::new(state, CONTRACT_NAME);
        if !ctx.has_permission(caller, MODIFY_TOKEN, &[OWNER_ROLE])? {
            bail!("{caller} is not authorized to modify the deployer whitelist");
        }
        ctx.delete(&record_key(deployer))?;
        info!(%deployer, "deployer removed");
        Ok(())
    }

    /// Record for `deployer`; a zero-flag record when none exists.
    pub fn get_deployer(
        &self,
        state: &dyn ChainState,
        deployer: &Address,
    ) -> Result<DeployerRecord> {
        let ctx = ContractReader::new(state, CONTRACT_NAME);
        match ctx.get(&record_key(deployer))? {
            Some(bytes) => Ok(bincode::deserialize(&bytes)?),
            None => Ok(DeployerRecord {
                address: deployer.clone(),
                permissions: DeployPermissions::none(),
            }),
        }
    }

    /// All records in key order.
    pub fn list_deployers(&self, state: &dyn ChainState) -> Result<Vec<DeployerRecord>> {
        let ctx = ContractReader::new(state, CONTRACT_NAME);
        let mut records = Vec::new();
        for (_, bytes) in ctx.range(RECORD_PREFIX)? {
            records.push(bincode::deserialize(&bytes)?);
        }
        Ok(records)
    }
}

impl DeployerOracle for DeployerWhitelist {
    fn permissions(&self, state: &dyn ChainState, origin: &Address) -> Result<DeployPermissions> {
        Ok(self.get_deployer(state, origin)?.permissions)
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

    fn state(store: &mut MemStore) -> StoreState<'_> {
        StoreState::new(store, BlockContext::new(1, 0, ChainId::new("meridian")))
    }

    #[test]
    fn test_init_grants_owner_everything() {
        let mut store = MemStore::new();
        let mut state = state(&mut store);
        let owner = addr(1);
        let whitelist = DeployerWhitelist;

        whitelist.init(&mut state, &owner).unwrap();

        let record = whitelist.get_deployer(&state, &owner).unwrap();
        assert_eq!(record.permissions, DeployPermissions::all());
        assert!(whitelist
            .permissions(&state, &owner)
            .unwrap()
            .allows(DeployPermissions::ALLOW_MIGRATION));
    }

    #[test]
    fn test_owner_manages_records() {
        let mut store = MemStore::new();
        let mut state = state(&mut store);
        let owner = addr(1);
        let dev = addr(2);
        let whitelist = DeployerWhitelist;

        whitelist.init(&mut state, &owner).unwrap();
        whitelist
            .add_deployer(
                &mut state,
                &owner,
                &dev,
                DeployPermissions::new(DeployPermissions::ALLOW_EVM_DEPLOY),
            )
            .unwrap();

        let record = whitelist.get_deployer(&state, &dev).unwrap();
        assert!(record.permissions.allows(DeployPermissions::ALLOW_EVM_DEPLOY));
        assert!(!record.permissions.allows(DeployPermissions::ALLOW_PLUGIN_DEPLOY));

        assert_eq!(whitelist.list_deployers(&state).unwrap().len(), 2);

        whitelist.remove_deployer(&mut state, &owner, &dev).unwrap();
        assert_eq!(
            whitelist.get_deployer(&state, &dev).unwrap().permissions,
            DeployPermissions::none()
        );
        assert_eq!(whitelist.list_deployers(&state).unwrap().len(), 1);
    }

    #[test]
    fn test_non_owner_cannot_modify() {
        let mut store = MemStore::new();
        let mut state = state(&mut store);
        let owner = addr(1);
        let stranger = addr(2);
        let whitelist = DeployerWhitelist;

        whitelist.init(&mut state, &owner).unwrap();
        let denied = whitelist.add_deployer(
            &mut state,
            &stranger,
            &stranger,
            DeployPermissions::all(),
        );
        assert!(denied.is_err());
        assert!(whitelist
            .remove_deployer(&mut state, &stranger, &owner)
            .is_err());
    }

    #[test]
    fn test_unknown_deployer_reads_as_zero_flags() {
        let mut store = MemStore::new();
        let mut state = state(&mut store);
        let whitelist = DeployerWhitelist;

        whitelist.init(&mut state, &addr(1)).unwrap();
        let record = whitelist.get_deployer(&state, &addr(9)).unwrap();
        assert_eq!(record.permissions, DeployPermissions::none());
    }
}
