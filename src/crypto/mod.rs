//! # Crypto plugins
//!
//! Secret storage never depends on a specific algorithm. A [`CryptoPlugin`]
//! turns plaintext into an [`EncryptedDatum`](crate::domain::EncryptedDatum)
//! and back, and the [`CryptoPluginRegistry`] picks the first enabled plugin
//! that supports a secret's content type.
//!
//! ## Module Organization
//!
//! - `keys`: master key loading and the AES-256-GCM primitives
//! - `plugin`: the plugin trait and the `kek_metadata` format
//! - `simple`, `envelope`: the shipped plugins
//! - `registry`: ordered plugin selection
//! - `mime_types`: content types offered for stored material

pub mod envelope;
pub mod keys;
pub mod mime_types;
pub mod plugin;
pub mod registry;
pub mod simple;

pub use envelope::{EnvelopeCryptoPlugin, ENVELOPE_CRYPTO};
pub use keys::MasterKey;
pub use mime_types::{augment_fields_with_content_types, default_content_type, normalize_mime_type};
pub use plugin::{key_length_for, CryptoPlugin, KekMetadata};
pub use registry::CryptoPluginRegistry;
pub use simple::{SimpleCryptoPlugin, SIMPLE_CRYPTO};
