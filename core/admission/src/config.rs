use meridian_primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Signature scheme a configured chain verifies under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SigScheme {
    /// 32-byte key, 64-byte signature, key attached to the envelope.
    Ed25519Native,
    /// 65-byte r||s||v signature over the eth personal-sign digest.
    EthRecoverable,
    /// Same shape as eth with the Tron message prefix.
    TronRecoverable,
}

/// How an origin verified for a foreign chain becomes a local account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccountResolution {
    /// Use the verified chain-qualified address as-is.
    Native,
    /// Translate through the identity-mapping oracle.
    Mapped,
}

/// One chain eligible for signature multiplexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainEntry {
    pub scheme: SigScheme,
    pub resolution: AccountResolution,
}

/// Height-parameterised on/off switch. `enabled` is the steady-state
/// position from `from_height` on; the opposite position applies below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchSchedule {
    pub enabled: bool,
    pub from_height: u64,
}

impl SwitchSchedule {
    pub fn always_on() -> Self {
        SwitchSchedule {
            enabled: true,
            from_height: 0,
        }
    }

    pub fn is_enabled(&self, height: u64) -> bool {
        if height >= self.from_height {
            self.enabled
        } else {
            !self.enabled
        }
    }
}

impl Default for SwitchSchedule {
    fn default() -> Self {
        Self::always_on()
    }
}

/// Karma gate parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KarmaParams {
    /// Karma total an account needs before it may deploy.
    pub min_karma_to_deploy: i64,
    /// Calls allowed per account within one session window.
    pub max_call_count: u64,
    pub session_duration_secs: u64,
}

impl Default for KarmaParams {
    fn default() -> Self {
        KarmaParams {
            min_karma_to_deploy: 10,
            max_call_count: 100,
            session_duration_secs: 600,
        }
    }
}

/// Configuration surface of the admission layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Foreign chains eligible for signature multiplexing, keyed by chain
    /// identifier. Each still needs its per-chain feature flag at runtime.
    pub chains: BTreeMap<String, ChainEntry>,
    pub deploy_switch: SwitchSchedule,
    pub call_switch: SwitchSchedule,
    /// Address exempt from the kill switches.
    pub oracle: Option<Address>,
    /// Wire the deployer-whitelist gate into the pipeline. The gate is
    /// still inert until the whitelist feature flag is enabled in state.
    pub whitelist_enabled: bool,
    pub karma_enabled: bool,
    pub karma: KarmaParams,
    /// Static allowlist for plugin-VM deploys; empty leaves the gate out.
    pub deploy_allowlist: Vec<Address>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_switch_schedule_positions() {
        let on = SwitchSchedule::always_on();
        assert!(on.is_enabled(0));
        assert!(on.is_enabled(1_000_000));

        // disabled from height 100 on, enabled below
        let cutoff = SwitchSchedule {
            enabled: false,
            from_height: 100,
        };
        assert!(cutoff.is_enabled(0));
        assert!(cutoff.is_enabled(99));
        assert!(!cutoff.is_enabled(100));
        assert!(!cutoff.is_enabled(500));

        // enabled only from height 50 on
        let activation = SwitchSchedule {
            enabled: true,
            from_height: 50,
        };
        assert!(!activation.is_enabled(49));
        assert!(activation.is_enabled(50));
    }

    #[test]
    fn test_default_config_has_no_gates_armed() {
        let config = AdmissionConfig::default();
        assert!(config.chains.is_empty());
        assert!(config.deploy_switch.is_enabled(0));
        assert!(config.call_switch.is_enabled(0));
        assert!(config.oracle.is_none());
        assert!(!config.whitelist_enabled);
        assert!(!config.karma_enabled);
        assert!(config.deploy_allowlist.is_empty());
    }
}
