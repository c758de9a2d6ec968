//! Single-key plugin: AES-256-GCM directly under the master key.

use crate::domain::{EncryptedDatum, EntityStatus, Secret, SecretId, Tenant};
use crate::errors::{Result, StrongroomError};
use tracing::{debug, instrument};

use super::keys::{self, MasterKey};
use super::plugin::{self, key_length_for, CryptoPlugin, KekMetadata};

pub const SIMPLE_CRYPTO: &str = "simple_crypto";

const ALGORITHM: &str = "AES-256-GCM";
const FORMAT_VERSION: u32 = 1;
const SUPPORTED_TYPES: &[&str] = &["application/aes-256-cbc"];

#[derive(Debug, Clone)]
pub struct SimpleCryptoPlugin {
    kek: MasterKey,
}

impl SimpleCryptoPlugin {
    pub fn new(kek: MasterKey) -> Self {
        Self { kek }
    }
}

impl CryptoPlugin for SimpleCryptoPlugin {
    fn name(&self) -> &'static str {
        SIMPLE_CRYPTO
    }

    fn supports(&self, secret_type: &str) -> bool {
        SUPPORTED_TYPES.contains(&secret_type)
    }

    #[instrument(
        skip_all,
        fields(plugin = SIMPLE_CRYPTO, secret_id = ?secret.base.id, tenant_id = ?tenant.base.id, len = unencrypted.len())
    )]
    fn encrypt(
        &self,
        unencrypted: &[u8],
        secret: &Secret,
        tenant: &Tenant,
    ) -> Result<EncryptedDatum> {
        let (secret_id, secret_type) = plugin::encryption_target(self, secret)?;

        let (cipher_text, nonce) = keys::seal(self.kek.bytes(), secret_id.as_bytes(), unencrypted)?;

        let metadata = KekMetadata {
            plugin: SIMPLE_CRYPTO.to_string(),
            algorithm: ALGORITHM.to_string(),
            format_version: FORMAT_VERSION,
            kek_version: self.kek.version().to_string(),
            nonce: plugin::encode(&nonce),
            wrapped_key: None,
            wrapped_key_nonce: None,
        };

        debug!(ciphertext_len = cipher_text.len(), "Encrypted secret material");

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
        fields(plugin = SIMPLE_CRYPTO, secret_type = %secret_type, secret_id = ?secret.base.id, tenant_id = ?tenant.base.id)
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
        metadata.check_origin(SIMPLE_CRYPTO, ALGORITHM, FORMAT_VERSION, &self.kek)?;
        let nonce = plugin::decode(&metadata.nonce, "nonce")?;

        keys::open(self.kek.bytes(), &nonce, secret_id.as_bytes(), &datum.cipher_text)
    }

    fn create(&self, secret_type: &str) -> Result<Vec<u8>> {
        if !self.supports(secret_type) {
            return Err(StrongroomError::crypto_unsupported(secret_type));
        }
        keys::random_bytes(key_length_for(secret_type))
    }
}
