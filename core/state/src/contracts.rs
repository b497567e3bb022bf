use crate::chain::{BlockContext, ChainState};
use anyhow::{bail, Result};
use meridian_primitives::Address;

const CONTRACT_PREFIX: &[u8] = b"contract:";
const REGISTRY_PREFIX: &[u8] = b"registry:";
const PERMISSION_PREFIX: &[u8] = b"perm:";

fn data_key(contract: &str, key: &[u8]) -> Vec<u8> {
    let mut out = CONTRACT_PREFIX.to_vec();
    out.extend_from_slice(contract.as_bytes());
    out.push(b':');
    out.extend_from_slice(key);
    out
}

fn permission_key(contract: &str, subject: &Address, token: &[u8], role: &str) -> Vec<u8> {
    let mut inner = PERMISSION_PREFIX.to_vec();
    inner.extend_from_slice(&subject.key_bytes());
    inner.push(0);
    inner.extend_from_slice(token);
    inner.push(0);
    inner.extend_from_slice(role.as_bytes());
    data_key(contract, &inner)
}

fn registry_key(name: &str) -> Vec<u8> {
    let mut out = REGISTRY_PREFIX.to_vec();
    out.extend_from_slice(name.as_bytes());
    out
}

fn check_permission(
    state: &dyn ChainState,
    contract: &str,
    subject: &Address,
    token: &[u8],
    roles: &[&str],
) -> Result<bool> {
    for role in roles {
        if state.has(&permission_key(contract, subject, token, role))? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Bind `name` to `address` in the global contract registry.
pub fn register_contract(state: &mut dyn ChainState, name: &str, address: &Address) -> Result<()> {
    state.set(&registry_key(name), &bincode::serialize(address)?)
}

/// Registry lookup. Unregistered names are an error.
pub fn resolve_contract(state: &dyn ChainState, name: &str) -> Result<Address> {
    match state.get(&registry_key(name))? {
        Some(bytes) => Ok(bincode::deserialize(&bytes)?),
        None => bail!("contract not registered: {name}"),
    }
}

/// Read-only view of one contract's namespaced slice of state.
pub struct ContractReader<'a> {
    state: &'a dyn ChainState,
    name: String,
}

impl<'a> ContractReader<'a> {
    pub fn new(state: &'a dyn ChainState, name: impl Into<String>) -> Self {
        ContractReader {
            state,
            name: name.into(),
        }
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.state.get(&data_key(&self.name, key))
    }

    pub fn has(&self, key: &[u8]) -> Result<bool> {
        self.state.has(&data_key(&self.name, key))
    }

    /// Entries under `prefix` with the namespace stripped from the keys.
    pub fn range(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let full = data_key(&self.name, prefix);
        let skip = full.len() - prefix.len();
        Ok(self
            .state
            .range(&full)?
            .into_iter()
            .map(|(k, v)| (k[skip..].to_vec(), v))
            .collect())
    }

    pub fn block(&self) -> &BlockContext {
        self.state.block()
    }

    /// True when `subject` holds any of `roles` for `token` under this
    /// contract.
    pub fn has_permission(&self, subject: &Address, token: &[u8], roles: &[&str]) -> Result<bool> {
        check_permission(self.state, &self.name, subject, token, roles)
    }

    pub fn resolve(&self, name: &str) -> Result<Address> {
        resolve_contract(self.state, name)
    }
}

/// Mutable view of one contract's namespaced slice of state, including its
/// permission grants.
pub struct ContractContext<'a> {
    state: &'a mut dyn ChainState,
    name: String,
}

impl<'a> ContractContext<'a> {
    pub fn new(state: &'a mut dyn ChainState, name: impl Into<String>) -> Self {
        ContractContext {
            state,
            name: name.into(),
        }
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.state.get(&data_key(&self.name, key))
    }

    pub fn has(&self, key: &[u8]) -> Result<bool> {
        self.state.has(&data_key(&self.name, key))
    }

    pub fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.state.set(&data_key(&self.name, key), value)
    }

    pub fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.state.delete(&data_key(&self.name, key))
    }

    pub fn range(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let full = data_key(&self.name, prefix);
        let skip = full.len() - prefix.len();
        Ok(self
            .state
            .range(&full)?
            .into_iter()
            .map(|(k, v)| (k[skip..].to_vec(), v))
            .collect())
    }

    pub fn block(&self) -> &BlockContext {
        self.state.block()
    }

    pub fn has_permission(&self, subject: &Address, token: &[u8], roles: &[&str]) -> Result<bool> {
        check_permission(&*self.state, &self.name, subject, token, roles)
    }

    pub fn grant_permission(&mut self, subject: &Address, token: &[u8], role: &str) -> Result<()> {
        self.state
            .set(&permission_key(&self.name, subject, token, role), &[1])
    }

    pub fn revoke_permission(&mut self, subject: &Address, token: &[u8], role: &str) -> Result<()> {
        self.state
            .delete(&permission_key(&self.name, subject, token, role))
    }

    pub fn resolve(&self, name: &str) -> Result<Address> {
        resolve_contract(&*self.state, name)
    }
}
