//! Crypto plugin registry
//!
//! Holds the enabled plugins in configured order and picks the first one that
//! supports a secret's content type. Plugins are resolved from a static table of
//! known identifiers; there is no runtime discovery.

use super::envelope::{EnvelopeCryptoPlugin, ENVELOPE_CRYPTO};
use super::keys::MasterKey;
use super::plugin::CryptoPlugin;
use super::simple::{SimpleCryptoPlugin, SIMPLE_CRYPTO};
use crate::config::CryptoConfig;
use crate::errors::{Result, StrongroomError};
use std::sync::Arc;
use tracing::{debug, info};

type PluginConstructor = fn(&MasterKey) -> Arc<dyn CryptoPlugin>;

fn build_simple(kek: &MasterKey) -> Arc<dyn CryptoPlugin> {
    Arc::new(SimpleCryptoPlugin::new(kek.clone()))
}

fn build_envelope(kek: &MasterKey) -> Arc<dyn CryptoPlugin> {
    Arc::new(EnvelopeCryptoPlugin::new(kek.clone()))
}

/// Every plugin identifier the registry can build
const KNOWN_PLUGINS: &[(&str, PluginConstructor)] = &[
    (SIMPLE_CRYPTO, build_simple as PluginConstructor),
    (ENVELOPE_CRYPTO, build_envelope as PluginConstructor),
];

/// Ordered set of enabled crypto plugins
pub struct CryptoPluginRegistry {
    plugins: Vec<Arc<dyn CryptoPlugin>>,
}

impl std::fmt::Debug for CryptoPluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoPluginRegistry").field("plugins", &self.plugin_names()).finish()
    }
}

impl CryptoPluginRegistry {
    /// Registry over the given plugins, keeping their order
    pub fn new(plugins: Vec<Arc<dyn CryptoPlugin>>) -> Self {
        Self { plugins }
    }

    /// Build the plugins named in the configuration, in order
    pub fn from_config(config: &CryptoConfig) -> Result<Self> {
        if config.enabled_plugins.is_empty() {
            return Err(StrongroomError::config("At least one crypto plugin must be enabled"));
        }

        let kek = MasterKey::from_config(config)?;
        Self::from_names(&config.enabled_plugins, &kek)
    }

    /// Build the named plugins around one master key
    pub fn from_names<S: AsRef<str>>(names: &[S], kek: &MasterKey) -> Result<Self> {
        if names.is_empty() {
            return Err(StrongroomError::config("At least one crypto plugin must be enabled"));
        }

        let mut registry = Self::new(Vec::with_capacity(names.len()));
        for name in names {
            let name = name.as_ref();

            if registry.has_plugin(name) {
                return Err(StrongroomError::config(format!(
                    "Crypto plugin '{}' is enabled more than once",
                    name
                )));
            }

            let constructor = KNOWN_PLUGINS
                .iter()
                .find(|(known, _)| *known == name)
                .map(|(_, constructor)| *constructor)
                .ok_or_else(|| {
                    StrongroomError::config(format!(
                        "Unknown crypto plugin '{}'. Known plugins: {}",
                        name,
                        Self::known_plugins().join(", ")
                    ))
                })?;

            registry.register(constructor(kek));
        }

        Ok(registry)
    }

    /// Identifiers accepted by [`from_config`](Self::from_config)
    pub fn known_plugins() -> Vec<&'static str> {
        KNOWN_PLUGINS.iter().map(|(name, _)| *name).collect()
    }

    /// Append a plugin; it is consulted after every plugin already registered
    pub fn register(&mut self, plugin: Arc<dyn CryptoPlugin>) {
        info!(plugin = plugin.name(), position = self.plugins.len(), "Registering crypto plugin");
        self.plugins.push(plugin);
    }

    /// First plugin, in configured order, that supports `secret_type`
    pub fn select(&self, secret_type: &str) -> Result<Arc<dyn CryptoPlugin>> {
        let _span = crate::crypto_span!("select", "registry", secret_type = %secret_type).entered();

        match self.plugins.iter().find(|plugin| plugin.supports(secret_type)) {
            Some(plugin) => {
                debug!(plugin = plugin.name(), "Selected crypto plugin");
                Ok(Arc::clone(plugin))
            }
            None => {
                debug!("No crypto plugin supports secret type");
                Err(StrongroomError::crypto_unsupported(secret_type))
            }
        }
    }

    pub fn has_plugin(&self, name: &str) -> bool {
        self.plugins.iter().any(|plugin| plugin.name() == name)
    }

    pub fn plugin_names(&self) -> Vec<&'static str> {
        self.plugins.iter().map(|plugin| plugin.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}
