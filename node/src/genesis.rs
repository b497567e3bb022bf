use anyhow::{bail, Context, Result};
use meridian_admission::DeployPermissions;
use meridian_oracles::{deployer, karma, mapper, DeployerWhitelist, IdentityMapper, KarmaLedger};
use meridian_primitives::{Address, ChainId};
use meridian_state::{features, register_contract, BlockContext, KvStore, StoreState};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Genesis document: the admission-layer state seeded before the first
/// block. Loaded from JSON so operators can review and diff it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GenesisDoc {
    /// Block-zero timestamp, seconds since the epoch. Zero means now.
    pub time_unix: u64,

    /// Feature flags switched on at genesis, e.g. `auth:sigtx:ethereum`.
    pub features: Vec<String>,

    /// Owner of the deployer whitelist. Installs the whitelist contract
    /// when present.
    pub whitelist_owner: Option<Address>,

    /// Initial whitelist entries beyond the owner.
    pub deployers: Vec<GenesisDeployer>,

    /// Initial karma totals.
    pub karma: Vec<GenesisKarma>,

    /// Static cross-chain identity mappings.
    pub mappings: Vec<GenesisMapping>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisDeployer {
    pub address: Address,
    /// Raw permission bits, see [`DeployPermissions`].
    pub permissions: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisKarma {
    pub address: Address,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisMapping {
    pub from: Address,
    pub to: Address,
}

impl GenesisDoc {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading genesis document {}", path.display()))?;
        let doc = serde_json::from_str(&content)
            .with_context(|| format!("parsing genesis document {}", path.display()))?;
        Ok(doc)
    }
}

/// Seed `store` from a genesis document. Expects an empty store; applying a
/// document twice rewrites flags and records but fails on mappings that
/// already exist.
pub fn apply(store: &mut dyn KvStore, chain_id: &ChainId, doc: &GenesisDoc) -> Result<()> {
    if !doc.deployers.is_empty() && doc.whitelist_owner.is_none() {
        bail!("genesis lists deployers but no whitelist owner");
    }

    for feature in &doc.features {
        features::set_feature(store, feature, true)?;
    }

    let time = if doc.time_unix == 0 {
        chrono::Utc::now().timestamp() as u64
    } else {
        doc.time_unix
    };
    let mut state = StoreState::new(store, BlockContext::new(0, time, chain_id.clone()));

    for name in [deployer::CONTRACT_NAME, karma::CONTRACT_NAME, mapper::CONTRACT_NAME] {
        let address = Address::for_contract(chain_id.clone(), name);
        register_contract(&mut state, name, &address)?;
    }

    if let Some(owner) = &doc.whitelist_owner {
        let whitelist = DeployerWhitelist;
        whitelist.init(&mut state, owner)?;
        for entry in &doc.deployers {
            whitelist.add_deployer(
                &mut state,
                owner,
                &entry.address,
                DeployPermissions::new(entry.permissions),
            )?;
        }
    }

    let ledger = KarmaLedger;
    for entry in &doc.karma {
        ledger.set_karma(&mut state, &entry.address, entry.total)?;
    }

    let identities = IdentityMapper;
    for entry in &doc.mappings {
        identities.add_mapping(&mut state, &entry.from, &entry.to)?;
    }

    info!(
        features = doc.features.len(),
        deployers = doc.deployers.len(),
        karma = doc.karma.len(),
        mappings = doc.mappings.len(),
        "genesis state applied"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_admission::{sigtx_feature, DeployerOracle};
    use meridian_state::{resolve_contract, ChainState, MemStore};

    fn addr(chain: &str, byte: u8) -> Address {
        format!("{}:0x{}", chain, hex::encode([byte; 20]))
            .parse()
            .unwrap()
    }

    fn state_at_height_one(store: &mut MemStore) -> StoreState<'_> {
        StoreState::new(store, BlockContext::new(1, 0, ChainId::new("meridian")))
    }

    #[test]
    fn test_apply_seeds_flags_contracts_and_records() {
        let owner = addr("meridian", 1);
        let doc = GenesisDoc {
            time_unix: 1_700_000_000,
            features: vec![
                sigtx_feature("ethereum"),
                "deployer-whitelist".to_string(),
            ],
            whitelist_owner: Some(owner.clone()),
            deployers: vec![GenesisDeployer {
                address: addr("meridian", 2),
                permissions: DeployPermissions::ALLOW_EVM_DEPLOY,
            }],
            karma: vec![GenesisKarma {
                address: addr("meridian", 2),
                total: 40,
            }],
            mappings: vec![GenesisMapping {
                from: addr("ethereum", 3),
                to: addr("meridian", 3),
            }],
        };

        let mut store = MemStore::new();
        apply(&mut store, &ChainId::new("meridian"), &doc).unwrap();

        let state = state_at_height_one(&mut store);
        assert!(state.feature_enabled(&sigtx_feature("ethereum"), false));
        assert!(state.feature_enabled("deployer-whitelist", false));
        assert!(!state.feature_enabled("unset-flag", false));

        resolve_contract(&state, deployer::CONTRACT_NAME).unwrap();
        resolve_contract(&state, karma::CONTRACT_NAME).unwrap();
        resolve_contract(&state, mapper::CONTRACT_NAME).unwrap();

        let whitelist = DeployerWhitelist;
        assert_eq!(
            whitelist.permissions(&state, &owner).unwrap(),
            DeployPermissions::all()
        );
        assert!(whitelist
            .permissions(&state, &addr("meridian", 2))
            .unwrap()
            .allows(DeployPermissions::ALLOW_EVM_DEPLOY));

        assert_eq!(KarmaLedger.karma(&state, &addr("meridian", 2)).unwrap(), 40);
        assert_eq!(
            IdentityMapper.get_mapping(&state, &addr("ethereum", 3)).unwrap(),
            addr("meridian", 3)
        );
    }

    #[test]
    fn test_deployers_without_owner_rejected() {
        let doc = GenesisDoc {
            deployers: vec![GenesisDeployer {
                address: addr("meridian", 2),
                permissions: DeployPermissions::ALL,
            }],
            ..GenesisDoc::default()
        };

        let mut store = MemStore::new();
        let err = apply(&mut store, &ChainId::new("meridian"), &doc).unwrap_err();
        assert!(err.to_string().contains("no whitelist owner"));
    }

    #[test]
    fn test_doc_parses_from_json() {
        let text = r#"{
            "time_unix": 1700000000,
            "features": ["auth:sigtx:tron"],
            "whitelist_owner": "meridian:0x0101010101010101010101010101010101010101",
            "karma": [
                {"address": "meridian:0x0202020202020202020202020202020202020202", "total": 12}
            ],
            "mappings": [
                {
                    "from": "tron:0x0303030303030303030303030303030303030303",
                    "to": "meridian:0x0303030303030303030303030303030303030303"
                }
            ]
        }"#;
        let doc: GenesisDoc = serde_json::from_str(text).unwrap();

        assert_eq!(doc.features, vec!["auth:sigtx:tron".to_string()]);
        assert_eq!(doc.whitelist_owner, Some(addr("meridian", 1)));
        assert!(doc.deployers.is_empty());
        assert_eq!(doc.karma[0].total, 12);
        assert_eq!(doc.mappings[0].from, addr("tron", 3));
    }
}
