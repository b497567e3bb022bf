use crate::crypto;
use crate::types::{Address, ChainId};
use ed25519_dalek::SigningKey;
use secp256k1::SecretKey;
use serde::{Deserialize, Serialize};

/// Outermost envelope: signature material plus the chain the signer
/// claims to originate from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedTx {
    pub chain_id: ChainId,
    /// Attached verification key for the native scheme; empty for the
    /// recoverable schemes.
    pub public_key: Vec<u8>,
    pub signature: Vec<u8>,
    pub inner: Vec<u8>,
}

/// Middle envelope carrying the account sequence number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NonceTx {
    pub sequence: u64,
    pub inner: Vec<u8>,
}

/// Innermost envelope: a kind tag over an opaque body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedTx {
    pub kind: TxKind,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxKind {
    Deploy,
    Call,
    Migration,
}

/// Execution engine a deploy or call targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VmKind {
    Plugin,
    Evm,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployTx {
    pub vm: VmKind,
    pub code: Vec<u8>,
    pub contract_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallTx {
    pub vm: VmKind,
    pub to: Address,
    pub input: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationTx {
    pub id: u32,
    pub input: Vec<u8>,
}

impl NonceTx {
    pub fn encode(&self) -> bincode::Result<Vec<u8>> {
        bincode::serialize(self)
    }

    pub fn decode(bytes: &[u8]) -> bincode::Result<Self> {
        bincode::deserialize(bytes)
    }
}

impl DeployTx {
    pub fn encode(&self) -> bincode::Result<Vec<u8>> {
        bincode::serialize(self)
    }

    pub fn decode(bytes: &[u8]) -> bincode::Result<Self> {
        bincode::deserialize(bytes)
    }
}

impl CallTx {
    pub fn encode(&self) -> bincode::Result<Vec<u8>> {
        bincode::serialize(self)
    }

    pub fn decode(bytes: &[u8]) -> bincode::Result<Self> {
        bincode::deserialize(bytes)
    }
}

impl MigrationTx {
    pub fn encode(&self) -> bincode::Result<Vec<u8>> {
        bincode::serialize(self)
    }

    pub fn decode(bytes: &[u8]) -> bincode::Result<Self> {
        bincode::deserialize(bytes)
    }
}

impl TaggedTx {
    pub fn encode(&self) -> bincode::Result<Vec<u8>> {
        bincode::serialize(self)
    }

    pub fn decode(bytes: &[u8]) -> bincode::Result<Self> {
        bincode::deserialize(bytes)
    }

    pub fn deploy(tx: &DeployTx) -> bincode::Result<Self> {
        Ok(TaggedTx {
            kind: TxKind::Deploy,
            body: bincode::serialize(tx)?,
        })
    }

    pub fn call(tx: &CallTx) -> bincode::Result<Self> {
        Ok(TaggedTx {
            kind: TxKind::Call,
            body: bincode::serialize(tx)?,
        })
    }

    pub fn migration(tx: &MigrationTx) -> bincode::Result<Self> {
        Ok(TaggedTx {
            kind: TxKind::Migration,
            body: bincode::serialize(tx)?,
        })
    }
}

impl SignedTx {
    pub fn encode(&self) -> bincode::Result<Vec<u8>> {
        bincode::serialize(self)
    }

    pub fn decode(bytes: &[u8]) -> bincode::Result<Self> {
        bincode::deserialize(bytes)
    }

    /// Wrap `tagged` in nonce and signature envelopes under the native
    /// ed25519 scheme.
    pub fn sign_native(
        key: &SigningKey,
        chain_id: ChainId,
        sequence: u64,
        tagged: &TaggedTx,
    ) -> anyhow::Result<SignedTx> {
        let nonce = NonceTx {
            sequence,
            inner: tagged.encode()?,
        };
        let inner = nonce.encode()?;
        let signature = crypto::sign_ed25519(key, &inner);
        Ok(SignedTx {
            chain_id,
            public_key: key.verifying_key().to_bytes().to_vec(),
            signature: signature.to_vec(),
            inner,
        })
    }

    /// Same envelope under the eth personal-sign scheme. The signer is
    /// recovered from the signature, so no public key travels with it.
    pub fn sign_eth(
        key: &SecretKey,
        chain_id: ChainId,
        sequence: u64,
        tagged: &TaggedTx,
    ) -> anyhow::Result<SignedTx> {
        let nonce = NonceTx {
            sequence,
            inner: tagged.encode()?,
        };
        let inner = nonce.encode()?;
        let signature = crypto::sign_recoverable_eth(key, &inner)?;
        Ok(SignedTx {
            chain_id,
            public_key: Vec::new(),
            signature,
            inner,
        })
    }

    pub fn sign_tron(
        key: &SecretKey,
        chain_id: ChainId,
        sequence: u64,
        tagged: &TaggedTx,
    ) -> anyhow::Result<SignedTx> {
        let nonce = NonceTx {
            sequence,
            inner: tagged.encode()?,
        };
        let inner = nonce.encode()?;
        let signature = crypto::sign_recoverable_tron(key, &inner)?;
        Ok(SignedTx {
            chain_id,
            public_key: Vec::new(),
            signature,
            inner,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LocalAddress;

    #[test]
    fn test_envelope_nesting_roundtrip() {
        let deploy = DeployTx {
            vm: VmKind::Evm,
            code: vec![0x60, 0x0a, 0x60, 0x00],
            contract_name: Some("counter".to_string()),
        };
        let tagged = TaggedTx::deploy(&deploy).unwrap();
        let key = crypto::generate_ed25519();
        let signed =
            SignedTx::sign_native(&key, ChainId::new("meridian"), 1, &tagged).unwrap();

        let bytes = signed.encode().unwrap();
        let outer = SignedTx::decode(&bytes).unwrap();
        assert_eq!(outer.chain_id, ChainId::new("meridian"));

        let nonce = NonceTx::decode(&outer.inner).unwrap();
        assert_eq!(nonce.sequence, 1);

        let inner = TaggedTx::decode(&nonce.inner).unwrap();
        assert_eq!(inner.kind, TxKind::Deploy);
        assert_eq!(DeployTx::decode(&inner.body).unwrap(), deploy);
    }

    #[test]
    fn test_native_envelope_verifies() {
        let key = crypto::generate_ed25519();
        let call = CallTx {
            vm: VmKind::Plugin,
            to: Address::new(ChainId::new("meridian"), LocalAddress::new([1u8; 20])),
            input: b"method".to_vec(),
        };
        let tagged = TaggedTx::call(&call).unwrap();
        let signed = SignedTx::sign_native(&key, ChainId::new("meridian"), 3, &tagged).unwrap();

        let local =
            crypto::verify_ed25519(&signed.public_key, &signed.signature, &signed.inner).unwrap();
        let expected = LocalAddress::from_public_key(&crate::types::PublicKey::new(
            key.verifying_key().to_bytes(),
        ));
        assert_eq!(local, expected);
    }

    #[test]
    fn test_eth_envelope_recovers_signer() {
        let key = crypto::generate_secp256k1();
        let migration = MigrationTx { id: 2, input: vec![] };
        let tagged = TaggedTx::migration(&migration).unwrap();
        let signed = SignedTx::sign_eth(&key, ChainId::new("eth"), 1, &tagged).unwrap();

        assert!(signed.public_key.is_empty());
        let local = crypto::recover_eth(&signed.signature, &signed.inner).unwrap();
        assert_eq!(local, crypto::secp256k1_address(&key));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(SignedTx::decode(&[0xff; 3]).is_err());
        assert!(NonceTx::decode(&[]).is_err());
    }
}
