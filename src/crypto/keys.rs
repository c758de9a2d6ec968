//! Master key handling and the AES-256-GCM primitives the plugins share.
//!
//! The master key encryption key (KEK) is loaded from base64 configuration.
//! Ciphertexts carry the 16-byte authentication tag appended; nonces are 12
//! random bytes generated per seal and stored next to the ciphertext.

use crate::config::CryptoConfig;
use crate::errors::{Result, StrongroomError};
use base64::Engine;
use ring::aead::{self, Aad, BoundKey, Nonce, NonceSequence, UnboundKey, AES_256_GCM};
use ring::rand::{SecureRandom, SystemRandom};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of an AES-256 key in bytes
pub const KEY_SIZE: usize = 32;

/// Size of AES-256-GCM nonce in bytes
pub const NONCE_SIZE: usize = 12;

/// Size of AES-256-GCM tag in bytes
const TAG_SIZE: usize = 16;

/// The key-encryption key held by the plugins. Wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey {
    bytes: [u8; KEY_SIZE],
    version: String,
}

impl MasterKey {
    /// Decode a base64 key; it must be exactly 32 bytes
    pub fn from_base64(encoded: &str, version: impl Into<String>) -> Result<Self> {
        let mut decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| StrongroomError::config(format!("Invalid base64 in master key: {}", e)))?;

        if decoded.len() != KEY_SIZE {
            let len = decoded.len();
            decoded.zeroize();
            return Err(StrongroomError::config(format!(
                "Master key must be {} bytes (256 bits), got {} bytes",
                KEY_SIZE, len
            )));
        }

        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(&decoded);
        decoded.zeroize();

        Ok(Self {
            bytes,
            version: version.into(),
        })
    }

    /// Load the key named by the crypto configuration
    pub fn from_config(config: &CryptoConfig) -> Result<Self> {
        let encoded = config.master_key.as_deref().ok_or_else(|| {
            StrongroomError::config(
                "STRONGROOM_MASTER_KEY is not set. Generate a key with: openssl rand -base64 32",
            )
        })?;
        Self::from_base64(encoded, config.master_key_version.clone())
    }

    /// A fresh random key, for development setups and tests
    pub fn generate(version: impl Into<String>) -> Result<Self> {
        let mut bytes = [0u8; KEY_SIZE];
        SystemRandom::new()
            .fill(&mut bytes)
            .map_err(|_| StrongroomError::crypto("Failed to generate master key"))?;
        Ok(Self {
            bytes,
            version: version.into(),
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub(crate) fn bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterKey")
            .field("bytes", &"[REDACTED]")
            .field("version", &self.version)
            .finish()
    }
}

/// Single-use nonce sequence for AES-GCM
struct SingleNonce {
    nonce: Option<[u8; NONCE_SIZE]>,
}

impl SingleNonce {
    fn new(nonce_bytes: [u8; NONCE_SIZE]) -> Self {
        Self {
            nonce: Some(nonce_bytes),
        }
    }
}

impl NonceSequence for SingleNonce {
    fn advance(&mut self) -> std::result::Result<Nonce, ring::error::Unspecified> {
        self.nonce.take().map(Nonce::assume_unique_for_key).ok_or(ring::error::Unspecified)
    }
}

/// Random bytes from the system CSPRNG
pub(crate) fn random_bytes(len: usize) -> Result<Vec<u8>> {
    let mut bytes = vec![0u8; len];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| StrongroomError::crypto("Failed to generate random bytes"))?;
    Ok(bytes)
}

/// Encrypt under `key` with a fresh nonce, binding `aad`.
///
/// Returns the ciphertext (tag appended) and the nonce.
pub(crate) fn seal(key: &[u8], aad: &[u8], plaintext: &[u8]) -> Result<(Vec<u8>, [u8; NONCE_SIZE])> {
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    SystemRandom::new().fill(&mut nonce_bytes).map_err(|_| {
        tracing::error!("Failed to generate random nonce");
        StrongroomError::crypto("Failed to generate random nonce for encryption")
    })?;

    let unbound_key = UnboundKey::new(&AES_256_GCM, key)
        .map_err(|_| StrongroomError::crypto("Failed to create encryption key"))?;
    let mut sealing_key = aead::SealingKey::new(unbound_key, SingleNonce::new(nonce_bytes));

    let mut ciphertext = Vec::with_capacity(plaintext.len() + TAG_SIZE);
    ciphertext.extend_from_slice(plaintext);

    sealing_key
        .seal_in_place_append_tag(Aad::from(aad), &mut ciphertext)
        .map_err(|_| {
            tracing::error!("Encryption failed");
            StrongroomError::crypto("Failed to encrypt secret data")
        })?;

    Ok((ciphertext, nonce_bytes))
}

/// Reverse [`seal`]. Any tampering with ciphertext, nonce or `aad` fails with `Decryption`.
pub(crate) fn open(key: &[u8], nonce: &[u8], aad: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    if nonce.len() != NONCE_SIZE {
        return Err(StrongroomError::decryption(format!(
            "Invalid nonce length: expected {} bytes, got {} bytes",
            NONCE_SIZE,
            nonce.len()
        )));
    }

    if ciphertext.len() < TAG_SIZE {
        return Err(StrongroomError::decryption(
            "Ciphertext too short (missing authentication tag)",
        ));
    }

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    nonce_bytes.copy_from_slice(nonce);

    let unbound_key = UnboundKey::new(&AES_256_GCM, key)
        .map_err(|_| StrongroomError::decryption("Failed to create decryption key"))?;
    let mut opening_key = aead::OpeningKey::new(unbound_key, SingleNonce::new(nonce_bytes));

    let mut buffer = ciphertext.to_vec();
    let plaintext_len = opening_key
        .open_in_place(Aad::from(aad), &mut buffer)
        .map_err(|_| {
            tracing::warn!("Authentication failed while decrypting");
            StrongroomError::decryption("Ciphertext failed authentication")
        })?
        .len();

    buffer.truncate(plaintext_len);
    Ok(buffer)
}
