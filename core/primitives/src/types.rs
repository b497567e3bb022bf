use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Chain identifier, e.g. "meridian", "eth", "tron".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChainId(String);

impl ChainId {
    pub fn new(id: impl Into<String>) -> Self {
        ChainId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ChainId {
    fn from(s: &str) -> Self {
        ChainId(s.to_string())
    }
}

impl From<String> for ChainId {
    fn from(s: String) -> Self {
        ChainId(s)
    }
}

#[derive(Debug, Error)]
pub enum AddressParseError {
    #[error("expected chain:0xhex address, got {0:?}")]
    Format(String),
    #[error("invalid hex in address: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("invalid address length: expected 20 bytes, got {0}")]
    Length(usize),
}

/// 20-byte account identifier, local to a single chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocalAddress([u8; 20]);

impl LocalAddress {
    pub fn new(bytes: [u8; 20]) -> Self {
        LocalAddress(bytes)
    }

    pub fn zero() -> Self {
        LocalAddress([0u8; 20])
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Derive from an ed25519 public key: keccak-256 of the 32 key bytes,
    /// last 20 bytes.
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        Self::keccak_tail(public_key.as_bytes())
    }

    /// Derive from a recovered secp256k1 point in uncompressed form: the
    /// 0x04 tag byte is skipped, the remaining 64 bytes are hashed with
    /// keccak-256, last 20 bytes.
    pub fn from_secp256k1_uncompressed(point: &[u8; 65]) -> Self {
        Self::keccak_tail(&point[1..])
    }

    /// Derive a deterministic address for a named system contract.
    pub fn from_contract_name(name: &str) -> Self {
        Self::keccak_tail(name.as_bytes())
    }

    pub fn from_hex(s: &str) -> Result<Self, AddressParseError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s)?;
        if bytes.len() != 20 {
            return Err(AddressParseError::Length(bytes.len()));
        }
        let mut out = [0u8; 20];
        out.copy_from_slice(&bytes);
        Ok(LocalAddress(out))
    }

    fn keccak_tail(data: &[u8]) -> Self {
        let mut hasher = Keccak256::new();
        hasher.update(data);
        let hash = hasher.finalize();
        let mut out = [0u8; 20];
        out.copy_from_slice(&hash[12..32]);
        LocalAddress(out)
    }
}

impl fmt::Display for LocalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Chain-qualified account address. Two addresses are equal only when both
/// the chain identifier and the local part match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    pub chain_id: ChainId,
    pub local: LocalAddress,
}

impl Address {
    pub fn new(chain_id: ChainId, local: LocalAddress) -> Self {
        Address { chain_id, local }
    }

    pub fn from_public_key(chain_id: ChainId, public_key: &PublicKey) -> Self {
        Address {
            chain_id,
            local: LocalAddress::from_public_key(public_key),
        }
    }

    /// Deterministic address for a named system contract on `chain_id`.
    pub fn for_contract(chain_id: ChainId, name: &str) -> Self {
        Address {
            chain_id,
            local: LocalAddress::from_contract_name(name),
        }
    }

    /// An address with a zero local part carries no usable identity.
    pub fn is_empty(&self) -> bool {
        self.local.is_zero()
    }

    /// Stable byte form used when the address is part of a store key.
    pub fn key_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.chain_id.as_str().len() + 21);
        out.extend_from_slice(self.chain_id.as_str().as_bytes());
        out.push(b':');
        out.extend_from_slice(self.local.as_bytes());
        out
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chain_id, self.local)
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (chain, local) = s
            .split_once(':')
            .ok_or_else(|| AddressParseError::Format(s.to_string()))?;
        if chain.is_empty() {
            return Err(AddressParseError::Format(s.to_string()));
        }
        Ok(Address {
            chain_id: ChainId::new(chain),
            local: LocalAddress::from_hex(local)?,
        })
    }
}

// Addresses travel as "chain:0xhex" strings in every serialized form so the
// config surface and the wire agree on one spelling.
impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Ed25519 public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey(pub [u8; 32]);

impl PublicKey {
    pub fn new(bytes: [u8; 32]) -> Self {
        PublicKey(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Ed25519 signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; 64]);

impl Signature {
    pub fn new(bytes: [u8; 64]) -> Self {
        Signature(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl Default for Signature {
    fn default() -> Self {
        Signature([0u8; 64])
    }
}

impl Serialize for Signature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes: Vec<u8> = Deserialize::deserialize(deserializer)?;
        if bytes.len() != 64 {
            return Err(serde::de::Error::custom("invalid signature length"));
        }
        let mut out = [0u8; 64];
        out.copy_from_slice(&bytes);
        Ok(Signature(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_address() -> Address {
        Address::new(
            ChainId::new("meridian"),
            LocalAddress::new([0xab; 20]),
        )
    }

    #[test]
    fn test_address_display_parse_roundtrip() {
        let addr = sample_address();
        let parsed: Address = addr.to_string().parse().unwrap();
        assert_eq!(parsed, addr);
    }

    #[test]
    fn test_address_parse_rejects_bad_forms() {
        assert!("nochain".parse::<Address>().is_err());
        assert!(":0xabababababababababababababababababababab"
            .parse::<Address>()
            .is_err());
        assert!("meridian:0x1234".parse::<Address>().is_err());
        assert!("meridian:0xzz".parse::<Address>().is_err());
    }

    #[test]
    fn test_address_equality_is_chain_qualified() {
        let local = LocalAddress::new([7u8; 20]);
        let a = Address::new(ChainId::new("meridian"), local);
        let b = Address::new(ChainId::new("eth"), local);
        assert_ne!(a, b);
        assert_ne!(a.key_bytes(), b.key_bytes());
    }

    #[test]
    fn test_empty_address() {
        let addr = Address::new(ChainId::new("meridian"), LocalAddress::zero());
        assert!(addr.is_empty());
        assert!(!sample_address().is_empty());
    }

    #[test]
    fn test_local_address_from_public_key_is_deterministic() {
        let pk = PublicKey::new([3u8; 32]);
        let a = LocalAddress::from_public_key(&pk);
        let b = LocalAddress::from_public_key(&pk);
        assert_eq!(a, b);
        assert!(!a.is_zero());

        let other = LocalAddress::from_public_key(&PublicKey::new([4u8; 32]));
        assert_ne!(a, other);
    }

    #[test]
    fn test_contract_addresses_differ_by_name() {
        let a = LocalAddress::from_contract_name("deployer-whitelist");
        let b = LocalAddress::from_contract_name("karma");
        assert_ne!(a, b);
    }

    #[test]
    fn test_address_serde_uses_string_form() {
        let addr = sample_address();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", addr));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn test_signature_serde_roundtrip() {
        let sig = Signature::new([9u8; 64]);
        let bytes = bincode::serialize(&sig).unwrap();
        let back: Signature = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, sig);
    }
}
