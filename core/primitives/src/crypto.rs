use crate::types::{LocalAddress, PublicKey, Signature};
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, Secp256k1, SecretKey};
use sha3::{Digest, Keccak256};
use thiserror::Error;

pub const PUBLIC_KEY_LENGTH: usize = 32;
pub const ED25519_SIGNATURE_LENGTH: usize = 64;
pub const RECOVERABLE_SIGNATURE_LENGTH: usize = 65;

const ETH_SIGN_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n32";
const TRON_SIGN_PREFIX: &[u8] = b"\x19TRON Signed Message:\n32";

#[derive(Debug, Error, PartialEq)]
pub enum CryptoError {
    #[error("invalid public key length: expected {expected}, got {got}")]
    PublicKeyLength { expected: usize, got: usize },
    #[error("invalid public key")]
    InvalidPublicKey,
    #[error("invalid signature length: expected {expected}, got {got}")]
    SignatureLength { expected: usize, got: usize },
    #[error("malformed signature")]
    MalformedSignature,
    #[error("signature verification failed")]
    VerificationFailed,
    #[error("public key recovery failed")]
    RecoveryFailed,
}

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Verify an ed25519 signature over `payload` and derive the signer's
/// local address from the attached public key.
pub fn verify_ed25519(
    public_key: &[u8],
    signature: &[u8],
    payload: &[u8],
) -> Result<LocalAddress, CryptoError> {
    if public_key.len() != PUBLIC_KEY_LENGTH {
        return Err(CryptoError::PublicKeyLength {
            expected: PUBLIC_KEY_LENGTH,
            got: public_key.len(),
        });
    }
    if signature.len() != ED25519_SIGNATURE_LENGTH {
        return Err(CryptoError::SignatureLength {
            expected: ED25519_SIGNATURE_LENGTH,
            got: signature.len(),
        });
    }

    let mut key_bytes = [0u8; 32];
    key_bytes.copy_from_slice(public_key);
    let verifying_key =
        VerifyingKey::from_bytes(&key_bytes).map_err(|_| CryptoError::InvalidPublicKey)?;

    let mut sig_bytes = [0u8; 64];
    sig_bytes.copy_from_slice(signature);
    let sig = ed25519_dalek::Signature::from_bytes(&sig_bytes);

    verifying_key
        .verify(payload, &sig)
        .map_err(|_| CryptoError::VerificationFailed)?;

    Ok(LocalAddress::from_public_key(&PublicKey::new(key_bytes)))
}

pub fn sign_ed25519(key: &SigningKey, payload: &[u8]) -> Signature {
    Signature::new(key.sign(payload).to_bytes())
}

/// Recover the signer of an Ethereum personal-sign signature. The signed
/// message is keccak-256 of the payload, wrapped in the eth prefix and
/// hashed again.
pub fn recover_eth(signature: &[u8], payload: &[u8]) -> Result<LocalAddress, CryptoError> {
    recover_prefixed(ETH_SIGN_PREFIX, signature, payload)
}

/// Same construction as [`recover_eth`] with the Tron message prefix.
pub fn recover_tron(signature: &[u8], payload: &[u8]) -> Result<LocalAddress, CryptoError> {
    recover_prefixed(TRON_SIGN_PREFIX, signature, payload)
}

fn personal_digest(prefix: &[u8], payload: &[u8]) -> [u8; 32] {
    let inner = keccak256(payload);
    let mut hasher = Keccak256::new();
    hasher.update(prefix);
    hasher.update(inner);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

fn recover_prefixed(
    prefix: &[u8],
    signature: &[u8],
    payload: &[u8],
) -> Result<LocalAddress, CryptoError> {
    if signature.len() != RECOVERABLE_SIGNATURE_LENGTH {
        return Err(CryptoError::SignatureLength {
            expected: RECOVERABLE_SIGNATURE_LENGTH,
            got: signature.len(),
        });
    }

    // accept both the raw {0,1} and the presentation {27,28} recovery byte
    let v = signature[64];
    let rec_id = if v >= 27 { v - 27 } else { v };
    let rec_id =
        RecoveryId::from_i32(rec_id as i32).map_err(|_| CryptoError::MalformedSignature)?;
    let rec_sig = RecoverableSignature::from_compact(&signature[..64], rec_id)
        .map_err(|_| CryptoError::MalformedSignature)?;

    let digest = personal_digest(prefix, payload);
    let message = Message::from_slice(&digest).map_err(|_| CryptoError::RecoveryFailed)?;

    let secp = Secp256k1::new();
    let recovered = secp
        .recover_ecdsa(&message, &rec_sig)
        .map_err(|_| CryptoError::RecoveryFailed)?;

    Ok(LocalAddress::from_secp256k1_uncompressed(
        &recovered.serialize_uncompressed(),
    ))
}

/// Produce an eth personal-sign signature as 65 bytes of r || s || v,
/// with v in presentation form.
pub fn sign_recoverable_eth(key: &SecretKey, payload: &[u8]) -> Result<Vec<u8>, CryptoError> {
    sign_prefixed(ETH_SIGN_PREFIX, key, payload)
}

pub fn sign_recoverable_tron(key: &SecretKey, payload: &[u8]) -> Result<Vec<u8>, CryptoError> {
    sign_prefixed(TRON_SIGN_PREFIX, key, payload)
}

fn sign_prefixed(prefix: &[u8], key: &SecretKey, payload: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let digest = personal_digest(prefix, payload);
    let message = Message::from_slice(&digest).map_err(|_| CryptoError::MalformedSignature)?;
    let secp = Secp256k1::new();
    let (rec_id, compact) = secp
        .sign_ecdsa_recoverable(&message, key)
        .serialize_compact();
    let mut out = Vec::with_capacity(RECOVERABLE_SIGNATURE_LENGTH);
    out.extend_from_slice(&compact);
    out.push(rec_id.to_i32() as u8 + 27);
    Ok(out)
}

pub fn generate_ed25519() -> SigningKey {
    SigningKey::from_bytes(&rand::random())
}

pub fn generate_secp256k1() -> SecretKey {
    // from_slice rejects the rare out-of-range scalar; resample
    loop {
        let bytes: [u8; 32] = rand::random();
        if let Ok(key) = SecretKey::from_slice(&bytes) {
            return key;
        }
    }
}

/// Local address controlled by a secp256k1 secret key.
pub fn secp256k1_address(key: &SecretKey) -> LocalAddress {
    let secp = Secp256k1::new();
    let public = secp256k1::PublicKey::from_secret_key(&secp, key);
    LocalAddress::from_secp256k1_uncompressed(&public.serialize_uncompressed())
}
