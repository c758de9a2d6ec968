//! The crypto plugin contract and the metadata format plugins store with each datum.

use crate::domain::{EncryptedDatum, Secret, Tenant};
use crate::errors::{Result, StrongroomError};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::keys::MasterKey;
use super::mime_types::{default_content_type, normalize_mime_type};

/// A pluggable encryption backend.
///
/// Plugins are stateless per call: `encrypt` never mutates its inputs or
/// persists anything, and `decrypt(encrypt(x)) == x` for every supported type.
pub trait CryptoPlugin: Send + Sync + fmt::Debug {
    /// Identifier used by the registry and recorded in `kek_metadata`
    fn name(&self) -> &'static str;

    /// Whether this plugin handles the given content type
    fn supports(&self, secret_type: &str) -> bool;

    /// Encrypt `unencrypted` for `secret`, returning an unsaved datum
    fn encrypt(&self, unencrypted: &[u8], secret: &Secret, tenant: &Tenant)
        -> Result<EncryptedDatum>;

    /// Recover the plaintext of `datum`, which must belong to `secret`
    fn decrypt(
        &self,
        secret_type: &str,
        secret: &Secret,
        datum: Option<&EncryptedDatum>,
        tenant: &Tenant,
    ) -> Result<Vec<u8>>;

    /// Fresh random key material sized for `secret_type`
    fn create(&self, secret_type: &str) -> Result<Vec<u8>>;
}

/// Key size in bytes for generated key material
pub fn key_length_for(secret_type: &str) -> usize {
    match secret_type {
        "application/aes-128-cbc" => 16,
        _ => 32,
    }
}

/// JSON stored in `EncryptedDatum::kek_metadata`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KekMetadata {
    pub plugin: String,
    pub algorithm: String,
    pub format_version: u32,
    pub kek_version: String,
    /// Base64 nonce of the payload ciphertext
    pub nonce: String,
    /// Base64 data key wrapped by the KEK (envelope plugins only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrapped_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrapped_key_nonce: Option<String>,
}

impl KekMetadata {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| StrongroomError::Serialization {
            source: e,
            context: "Failed to serialize KEK metadata".to_string(),
        })
    }

    /// Parse the metadata of a stored datum
    pub fn from_datum(datum: &EncryptedDatum) -> Result<Self> {
        let raw = datum
            .kek_metadata
            .as_deref()
            .ok_or_else(|| StrongroomError::decryption("Encrypted datum has no KEK metadata"))?;

        serde_json::from_str(raw)
            .map_err(|e| StrongroomError::decryption(format!("Unreadable KEK metadata: {}", e)))
    }

    /// Reject metadata written by another plugin, algorithm, format or KEK
    pub fn check_origin(
        &self,
        plugin: &str,
        algorithm: &str,
        format_version: u32,
        kek: &MasterKey,
    ) -> Result<()> {
        if self.plugin != plugin {
            return Err(StrongroomError::decryption(format!(
                "Datum was produced by plugin '{}', not '{}'",
                self.plugin, plugin
            )));
        }
        if self.algorithm != algorithm || self.format_version != format_version {
            return Err(StrongroomError::decryption(format!(
                "Unsupported algorithm {} (format {})",
                self.algorithm, self.format_version
            )));
        }
        if self.kek_version != kek.version() {
            return Err(StrongroomError::decryption(format!(
                "Datum was encrypted under KEK version '{}', current is '{}'",
                self.kek_version,
                kek.version()
            )));
        }
        Ok(())
    }
}

pub(crate) fn encode(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

pub(crate) fn decode(value: &str, what: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(value)
        .map_err(|e| StrongroomError::decryption(format!("Invalid base64 {}: {}", what, e)))
}

/// Secret id and content type for an encryption request.
///
/// The secret must already be stored so its id can be bound to the ciphertext.
pub(crate) fn encryption_target(
    plugin: &dyn CryptoPlugin,
    secret: &Secret,
) -> Result<(String, String)> {
    let secret_type = secret.secret_type.clone().ok_or_else(|| {
        StrongroomError::validation_field("Secret has no secret_type", "secret_type")
    })?;

    if !plugin.supports(&secret_type) {
        return Err(StrongroomError::crypto_unsupported(secret_type));
    }

    let secret_id = secret.base.id.clone().filter(|id| !id.is_empty()).ok_or_else(|| {
        StrongroomError::validation_field(
            "Secret must be stored before its material is encrypted",
            "id",
        )
    })?;

    Ok((secret_id, secret_type))
}

/// The datum to decrypt and the secret id it must be bound to.
pub(crate) fn decryption_target<'a>(
    secret_type: &str,
    secret: &Secret,
    datum: Option<&'a EncryptedDatum>,
) -> Result<(&'a EncryptedDatum, String)> {
    let secret_id = secret
        .base
        .id
        .clone()
        .ok_or_else(|| StrongroomError::decryption("Secret has no id"))?;

    let datum = datum.ok_or_else(|| {
        StrongroomError::decryption(format!("No encrypted data stored for secret '{}'", secret_id))
    })?;

    match &datum.secret_id {
        Some(owner) if owner.as_str() == secret_id => {}
        _ => {
            return Err(StrongroomError::decryption(format!(
                "Encrypted datum does not belong to secret '{}'",
                secret_id
            )))
        }
    }

    if let Some(stored) = datum.mime_type.as_deref() {
        if !readable_as(stored, secret_type) {
            return Err(StrongroomError::decryption(format!(
                "Datum holds '{}' material, cannot decrypt as '{}'",
                stored, secret_type
            )));
        }
    }

    Ok((datum, secret_id))
}

/// Material stored as `stored` can be read back as itself or as its advertised default content type
fn readable_as(stored: &str, requested: &str) -> bool {
    let requested = normalize_mime_type(requested);
    normalize_mime_type(stored) == requested || default_content_type(stored) == Some(requested.as_str())
}
