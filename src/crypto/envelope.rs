//! Envelope plugin: a random data key per datum, wrapped by the master key.
//!
//! The payload is sealed with the data key (DEK) and the secret id as
//! associated data. The DEK itself is sealed with the KEK and stored, together
//! with both nonces, in the datum's `kek_metadata`. Rotating the KEK therefore
//! only requires rewrapping the DEKs, not re-encrypting payloads.

use crate::domain::{EncryptedDatum, EntityStatus, Secret, SecretId, Tenant};
use crate::errors::{Result, StrongroomError};
use tracing::{debug, instrument};
use zeroize::Zeroizing;

use super::keys::{self, MasterKey, KEY_SIZE};
use super::plugin::{self, key_length_for, CryptoPlugin, KekMetadata};

pub const ENVELOPE_CRYPTO: &str = "envelope_crypto";

const ALGORITHM: &str = "AES-256-GCM+AES-256-GCM-KW";
const FORMAT_VERSION: u32 = 1;
const SUPPORTED_TYPES: &[&str] = &[
    "application/aes-256-cbc",
    "application/aes-128-cbc",
    "application/octet-stream",
    "text/plain",
];

#[derive(Debug, Clone)]
pub struct EnvelopeCryptoPlugin {
    kek: MasterKey,
}

impl EnvelopeCryptoPlugin {
    pub fn new(kek: MasterKey) -> Self {
        Self { kek }
    }

    fn wrap_aad(secret_id: &str) -> Vec<u8> {
        format!("{}:{}", ENVELOPE_CRYPTO, secret_id).into_bytes()
    }
}

impl CryptoPlugin for EnvelopeCryptoPlugin {
    fn name(&self) -> &'static str {
        ENVELOPE_CRYPTO
    }

    fn supports(&self, secret_type: &str) -> bool {
        SUPPORTED_TYPES.contains(&secret_type)
    }

    #[instrument(
        skip_all,
        fields(plugin = ENVELOPE_CRYPTO, secret_id = ?secret.base.id, tenant_id = ?tenant.base.id, len = unencrypted.len())
    )]
    fn encrypt(
        &self,
        unencrypted: &[u8],
        secret: &Secret,
        tenant: &Tenant,
    ) -> Result<EncryptedDatum> {
        let (secret_id, secret_type) = plugin::encryption_target(self, secret)?;

        let dek = Zeroizing::new(keys::random_bytes(KEY_SIZE)?);
        let (cipher_text, nonce) = keys::seal(&dek, secret_id.as_bytes(), unencrypted)?;
        let (wrapped_key, wrapped_key_nonce) =
            keys::seal(self.kek.bytes(), &Self::wrap_aad(&secret_id), &dek)?;

        let metadata = KekMetadata {
            plugin: ENVELOPE_CRYPTO.to_string(),
            algorithm: ALGORITHM.to_string(),
            format_version: FORMAT_VERSION,
            kek_version: self.kek.version().to_string(),
            nonce: plugin::encode(&nonce),
            wrapped_key: Some(plugin::encode(&wrapped_key)),
            wrapped_key_nonce: Some(plugin::encode(&wrapped_key_nonce)),
        };

        debug!(ciphertext_len = cipher_text.len(), "Encrypted secret material under a fresh data key");

        Ok(EncryptedDatum {
            secret_id: Some(SecretId::from(secret_id)),
            mime_type: Some(secret_type),
            cipher_text,
            kek_metadata: Some(metadata.to_json()?),
            status: Some(EntityStatus::Active.as_str().to_string()),
            ..Default::default()
        })
    }

    #[instrument(
        skip_all,
        fields(plugin = ENVELOPE_CRYPTO, secret_type = %secret_type, secret_id = ?secret.base.id, tenant_id = ?tenant.base.id)
    )]
    fn decrypt(
        &self,
        secret_type: &str,
        secret: &Secret,
        datum: Option<&EncryptedDatum>,
        tenant: &Tenant,
    ) -> Result<Vec<u8>> {
        let (datum, secret_id) = plugin::decryption_target(secret_type, secret, datum)?;

        let metadata = KekMetadata::from_datum(datum)?;
        metadata.check_origin(ENVELOPE_CRYPTO, ALGORITHM, FORMAT_VERSION, &self.kek)?;

        let (wrapped_key, wrapped_key_nonce) =
            match (&metadata.wrapped_key, &metadata.wrapped_key_nonce) {
                (Some(key), Some(nonce)) => (
                    plugin::decode(key, "wrapped key")?,
                    plugin::decode(nonce, "wrapped key nonce")?,
                ),
                _ => {
                    return Err(StrongroomError::decryption(
                        "KEK metadata is missing the wrapped data key",
                    ))
                }
            };

        let dek = Zeroizing::new(keys::open(
            self.kek.bytes(),
            &wrapped_key_nonce,
            &Self::wrap_aad(&secret_id),
            &wrapped_key,
        )?);

        if dek.len() != KEY_SIZE {
            return Err(StrongroomError::decryption("Unwrapped data key has the wrong size"));
        }

        let nonce = plugin::decode(&metadata.nonce, "nonce")?;
        keys::open(&dek, &nonce, secret_id.as_bytes(), &datum.cipher_text)
    }

    fn create(&self, secret_type: &str) -> Result<Vec<u8>> {
        if !self.supports(secret_type) {
            return Err(StrongroomError::crypto_unsupported(secret_type));
        }
        keys::random_bytes(key_length_for(secret_type))
    }
}
