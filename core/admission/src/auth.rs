use crate::config::{AccountResolution, AdmissionConfig, ChainEntry, SigScheme};
use crate::error::AdmissionError;
use crate::handler::{Next, TxContext, TxMiddleware, TxResult};
use crate::metrics;
use crate::oracle::AddressMapper;
use meridian_primitives::{crypto, Address, ChainId, CryptoError, SignedTx};
use meridian_state::{ChainState, FeatureSet};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Feature-flag namespace gating per-chain signature support.
pub const SIGTX_FEATURE_PREFIX: &str = "auth:sigtx:";

pub fn sigtx_feature(chain: &str) -> String {
    format!("{SIGTX_FEATURE_PREFIX}{chain}")
}

/// Verify one signed envelope under `scheme` and derive the
/// chain-qualified origin.
pub fn resolve_origin(
    scheme: SigScheme,
    chain_id: &ChainId,
    tx: &SignedTx,
) -> Result<Address, CryptoError> {
    let local = match scheme {
        SigScheme::Ed25519Native => {
            crypto::verify_ed25519(&tx.public_key, &tx.signature, &tx.inner)?
        }
        SigScheme::EthRecoverable => crypto::recover_eth(&tx.signature, &tx.inner)?,
        SigScheme::TronRecoverable => crypto::recover_tron(&tx.signature, &tx.inner)?,
    };
    Ok(Address::new(chain_id.clone(), local))
}

fn scheme_label(scheme: SigScheme) -> &'static str {
    match scheme {
        SigScheme::Ed25519Native => "ed25519",
        SigScheme::EthRecoverable => "eth",
        SigScheme::TronRecoverable => "tron",
    }
}

/// Signature stage. Picks the verification scheme from the envelope's
/// declared chain, verifies, resolves the account and attaches it as the
/// transaction origin.
pub struct AuthStage {
    chains: BTreeMap<String, ChainEntry>,
    mapper: Arc<dyn AddressMapper>,
}

impl AuthStage {
    pub fn new(config: &AdmissionConfig, mapper: Arc<dyn AddressMapper>) -> Self {
        AuthStage {
            chains: config.chains.clone(),
            mapper,
        }
    }

    /// Configured chains whose feature flag is on for this transaction.
    /// A non-empty set always includes the node's own chain, verified
    /// natively, unless the operator configured it explicitly.
    fn enabled_chains(&self, features: &FeatureSet, own: &ChainId) -> BTreeMap<String, ChainEntry> {
        let mut enabled: BTreeMap<String, ChainEntry> = self
            .chains
            .iter()
            .filter(|(id, _)| features.is_enabled(&sigtx_feature(id)))
            .map(|(id, entry)| (id.clone(), *entry))
            .collect();
        if !enabled.is_empty() {
            enabled
                .entry(own.as_str().to_string())
                .or_insert(ChainEntry {
                    scheme: SigScheme::Ed25519Native,
                    resolution: AccountResolution::Native,
                });
        }
        enabled
    }

    fn verify(
        &self,
        scheme: SigScheme,
        chain_id: &ChainId,
        tx: &SignedTx,
    ) -> Result<Address, AdmissionError> {
        resolve_origin(scheme, chain_id, tx).map_err(|err| {
            metrics::SIGNATURE_FAILURES_TOTAL
                .with_label_values(&[scheme_label(scheme)])
                .inc();
            warn!(chain = %chain_id, %err, "signature rejected");
            AdmissionError::from(err)
        })
    }
}

impl TxMiddleware for AuthStage {
    fn handle(
        &self,
        state: &mut dyn ChainState,
        ctx: &mut TxContext,
        tx: &[u8],
        next: Next<'_>,
    ) -> Result<TxResult, AdmissionError> {
        let signed = SignedTx::decode(tx).map_err(|e| AdmissionError::malformed("signed", e))?;
        let own = state.block().chain_id.clone();

        // one flag snapshot governs the whole transaction
        let features = FeatureSet::snapshot(&*state)?;
        let enabled = self.enabled_chains(&features, &own);

        let origin = if enabled.is_empty() {
            // multiplexing off: only the node's own chain is acceptable
            if signed.chain_id != own {
                return Err(AdmissionError::UnknownChain(signed.chain_id.to_string()));
            }
            self.verify(SigScheme::Ed25519Native, &own, &signed)?
        } else {
            let entry = enabled
                .get(signed.chain_id.as_str())
                .copied()
                .ok_or_else(|| AdmissionError::UnknownChain(signed.chain_id.to_string()))?;
            let verified = self.verify(entry.scheme, &signed.chain_id, &signed)?;
            match entry.resolution {
                AccountResolution::Native => verified,
                AccountResolution::Mapped => self.mapper.resolve(&*state, &verified)?,
            }
        };

        debug!(%origin, chain = %signed.chain_id, "origin resolved");
        ctx.set_origin(origin)?;
        next.run(state, ctx, &signed.inner)
    }
}
