//! Locator context
//!
//! The [`Context`] owns the alias registry, the crypto registry and the
//! backend factories, and builds [`ResourceLocator`]s from URLs.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::alias::AliasRegistry;
use crate::backend::builtin_backend;
use crate::config::{Config, ConfigManager, KeyConfig, RetryConfig};
use crate::crypto::{CryptoRegistry, Decryptor, Encryptor};
use crate::error::{Error, Result};
use crate::locator::{LocatorOptions, ResourceLocator};
use crate::traits::{Backend, BackendFactory, Target};

/// Registries and defaults shared by the locators it creates
pub struct Context {
    aliases: AliasRegistry,
    crypto: CryptoRegistry,
    factories: HashMap<String, Arc<dyn BackendFactory>>,
    options: LocatorOptions,
    retry: RetryConfig,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Self {
            aliases: AliasRegistry::new(),
            crypto: CryptoRegistry::new(),
            factories: HashMap::new(),
            options: LocatorOptions::default(),
            retry: RetryConfig::default(),
        }
    }

    /// Load the configuration from its default location
    pub fn load() -> Result<Self> {
        Self::from_manager(&ConfigManager::new()?)
    }

    pub fn from_manager(manager: &ConfigManager) -> Result<Self> {
        let config = manager.load()?;
        Self::from_config(&config, manager.config_dir())
    }

    /// Build a context from configuration; relative key paths resolve
    /// against `config_dir`.
    pub fn from_config(config: &Config, config_dir: &Path) -> Result<Self> {
        config.validate()?;

        let mut context = Self::new();
        context.options.safe = config.safe;
        context.retry = config.retry;

        for (alias, url) in &config.aliases {
            context.aliases.register_url(alias.clone(), url.clone());
        }
        for key in &config.keys {
            context.register_key(key, config_dir)?;
        }
        Ok(context)
    }

    fn register_key(&self, key: &KeyConfig, config_dir: &Path) -> Result<()> {
        let read = |path: &Path| -> Result<String> {
            let path = config_dir.join(path);
            std::fs::read_to_string(&path)
                .map_err(|e| Error::Config(format!("cannot read key file {}: {e}", path.display())))
        };

        if let Some(path) = &key.private_key {
            let password = match &key.password_env {
                Some(var) => Some(
                    std::env::var(var)
                        .map_err(|_| Error::Config(format!("key password variable {var} is not set")))?,
                ),
                None => None,
            };
            let decryptor = Decryptor::from_pem(
                &read(path)?,
                password.as_deref().map(str::as_bytes),
                key.name.clone(),
            )?;
            self.crypto.register_decryptor(decryptor);
        } else if let Some(path) = &key.public_key {
            let encryptor = Encryptor::from_public_key_pem(&read(path)?, key.name.clone())?;
            self.crypto.register_encryptor(encryptor);
        }
        Ok(())
    }

    pub fn aliases(&self) -> &AliasRegistry {
        &self.aliases
    }

    pub fn aliases_mut(&mut self) -> &mut AliasRegistry {
        &mut self.aliases
    }

    /// Register or overwrite an alias
    pub fn register_url(&mut self, alias: impl Into<String>, url: impl Into<String>) {
        self.aliases.register_url(alias, url);
    }

    pub fn dealias_url(&self, url: &str) -> Result<String> {
        self.aliases.dealias_url(url)
    }

    pub fn crypto(&self) -> &CryptoRegistry {
        &self.crypto
    }

    /// Route a scheme to `factory`, taking precedence over built-in backends
    pub fn register_backend(&mut self, scheme: impl Into<String>, factory: Arc<dyn BackendFactory>) {
        let scheme = scheme.into().to_ascii_lowercase();
        tracing::debug!(scheme = %scheme, "Registering backend factory");
        self.factories.insert(scheme, factory);
    }

    pub fn options(&self) -> LocatorOptions {
        self.options
    }

    pub fn set_options(&mut self, options: LocatorOptions) {
        self.options = options;
    }

    pub fn retry(&self) -> RetryConfig {
        self.retry
    }

    pub fn set_retry(&mut self, retry: RetryConfig) {
        self.retry = retry;
    }

    /// Locator for `url` with the context's default options
    pub async fn locator(&self, url: &str) -> Result<ResourceLocator<'_>> {
        self.locator_with_options(url, self.options).await
    }

    /// Dealias `url` and bind it to its scheme's backend
    pub async fn locator_with_options(&self, url: &str, options: LocatorOptions) -> Result<ResourceLocator<'_>> {
        let url = self.aliases.dealias_url(url)?;
        let target = Target::new(url, options.safe, self.retry);

        let backend = self
            .create_backend(&target)
            .await
            .map_err(|e| Error::location(&target.url, e))?;
        tracing::debug!(
            url = %target.url,
            scheme = %target.parts.scheme,
            backend = backend.name(),
            "Created locator"
        );
        Ok(ResourceLocator::new(target, backend, &self.crypto))
    }

    async fn create_backend(&self, target: &Target) -> Result<Box<dyn Backend>> {
        match self.factories.get(&target.parts.scheme) {
            Some(factory) => factory.create(target).await,
            None => builtin_backend(target),
        }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut schemes: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        schemes.sort_unstable();
        f.debug_struct("Context")
            .field("aliases", &self.aliases.list())
            .field("crypto", &self.crypto)
            .field("backends", &schemes)
            .field("options", &self.options)
            .field("retry", &self.retry)
            .finish()
    }
}
