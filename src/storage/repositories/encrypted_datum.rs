//! Lookup of the ciphertext that belongs to a secret.

use crate::domain::{EncryptedDatum, SecretId};
use crate::errors::Result;
use crate::storage::repository::Repository;

impl Repository<EncryptedDatum> {
    /// The live datum of a secret, if it has been encrypted.
    ///
    /// A secret owns at most one live datum; should several exist, the newest wins.
    pub async fn find_by_secret(&self, secret_id: &SecretId) -> Result<Option<EncryptedDatum>> {
        let mut data = self.list_by("secret_id", secret_id.as_str(), false).await?;
        Ok(data.pop())
    }
}
