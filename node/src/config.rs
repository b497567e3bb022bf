use meridian_admission::AdmissionConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Node configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Chain configuration
    pub chain: ChainSection,

    /// Admission pipeline configuration
    pub admission: AdmissionConfig,

    /// Logging configuration
    pub log: LogSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainSection {
    /// Chain identifier, the prefix of every locally issued address
    pub chain_id: String,

    /// Genesis document applied when the store is empty
    pub genesis_file: Option<PathBuf>,
}

impl Default for ChainSection {
    fn default() -> Self {
        ChainSection {
            chain_id: "meridian".to_string(),
            genesis_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Default level filter, overridden by RUST_LOG
    pub level: String,

    /// Output format: pretty, compact or json
    pub format: String,
}

impl Default for LogSection {
    fn default() -> Self {
        LogSection {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl NodeConfig {
    /// Load from file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: NodeConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save to file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}
