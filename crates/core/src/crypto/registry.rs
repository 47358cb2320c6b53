//! Name-keyed encryptor and decryptor registries with scoped override

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::decryptor::Decryptor;
use super::encryptor::{Encryptor, Metadata};
use super::envelope::{append_metadata, strip_metadata};
use crate::error::EncryptionError;

#[derive(Debug, Clone, Default)]
struct Registries {
    encryptors: HashMap<String, Arc<Encryptor>>,
    decryptors: HashMap<String, Arc<Decryptor>>,
}

#[derive(Debug, Default)]
struct State {
    current: Registries,
    saved: Vec<Registries>,
}

/// Options for [`CryptoRegistry::encrypt_with_registry`]
#[derive(Debug, Clone, Default)]
pub struct EncryptOptions {
    /// Symmetric key to use instead of a fresh random one
    pub key: Option<Vec<u8>>,
    /// IV to use instead of a fresh random one
    pub initialization_vector: Option<Vec<u8>>,
    /// Frame the metadata in front of the ciphertext
    pub append_metadata: bool,
}

impl EncryptOptions {
    /// Fresh key and IV, metadata framed inline
    pub fn inline() -> Self {
        Self {
            append_metadata: true,
            ..Default::default()
        }
    }
}

/// Registries of key holders available to the transform pipeline.
///
/// Shared by reference; interior locking lets callers push and pop scopes
/// while locators hold the registry.
#[derive(Debug, Default)]
pub struct CryptoRegistry {
    state: RwLock<State>,
}

impl CryptoRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an encryptor under its name, replacing any previous one
    pub fn register_encryptor(&self, encryptor: Encryptor) {
        tracing::debug!(name = %encryptor.name(), "Registering encryptor");
        self.write()
            .current
            .encryptors
            .insert(encryptor.name().to_string(), Arc::new(encryptor));
    }

    /// Register a decryptor and the encryptor of the same key pair
    pub fn register_decryptor(&self, decryptor: Decryptor) {
        tracing::debug!(name = %decryptor.name(), "Registering decryptor");
        let encryptor = decryptor.encryptor();
        let mut state = self.write();
        state
            .current
            .encryptors
            .insert(encryptor.name().to_string(), Arc::new(encryptor));
        state
            .current
            .decryptors
            .insert(decryptor.name().to_string(), Arc::new(decryptor));
    }

    pub fn encryptor(&self, name: &str) -> Result<Arc<Encryptor>, EncryptionError> {
        self.read()
            .current
            .encryptors
            .get(name)
            .cloned()
            .ok_or_else(|| EncryptionError::Registry(format!("no encryptor registered as '{name}'")))
    }

    pub fn decryptor(&self, name: &str) -> Result<Arc<Decryptor>, EncryptionError> {
        self.read()
            .current
            .decryptors
            .get(name)
            .cloned()
            .ok_or_else(|| EncryptionError::Registry(format!("no decryptor registered as '{name}'")))
    }

    /// Registered encryptor names, sorted
    pub fn encryptor_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().current.encryptors.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Registered decryptor names, sorted
    pub fn decryptor_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().current.decryptors.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Encrypt with the encryptor registered as `name`
    pub fn encrypt_with_registry(
        &self,
        data: &[u8],
        name: &str,
        options: &EncryptOptions,
    ) -> Result<(Vec<u8>, Metadata), EncryptionError> {
        let encryptor = self.encryptor(name)?;
        let (enciphered, metadata) = encryptor.encrypt(
            data,
            options.key.as_deref(),
            options.initialization_vector.as_deref(),
        )?;
        if options.append_metadata {
            Ok((append_metadata(&enciphered, &metadata), metadata))
        } else {
            Ok((enciphered, metadata))
        }
    }

    /// Decrypt with the decryptor named in the metadata.
    ///
    /// Without explicit metadata, `data` must carry it inline.
    pub fn decrypt_with_registry(&self, data: &[u8], metadata: Option<&Metadata>) -> Result<Vec<u8>, EncryptionError> {
        match metadata {
            Some(metadata) => self.decryptor(&metadata.name)?.decrypt(data, metadata),
            None => {
                let (enciphered, metadata) = strip_metadata(data)?;
                self.decryptor(&metadata.name)?.decrypt(&enciphered, &metadata)
            }
        }
    }

    /// Save both registries and start from empty ones
    pub fn push(&self) {
        let mut state = self.write();
        let saved = std::mem::take(&mut state.current);
        state.saved.push(saved);
        tracing::debug!(depth = state.saved.len(), "Pushed crypto registries");
    }

    /// Restore the registries saved by the matching [`push`](Self::push)
    pub fn pop(&self) -> Result<(), EncryptionError> {
        let mut state = self.write();
        let saved = state
            .saved
            .pop()
            .ok_or_else(|| EncryptionError::Registry("pop without matching push".to_string()))?;
        state.current = saved;
        tracing::debug!(depth = state.saved.len(), "Popped crypto registries");
        Ok(())
    }

    /// Number of saved scopes
    pub fn depth(&self) -> usize {
        self.read().saved.len()
    }

    /// Push now and pop when the returned guard is dropped
    pub fn scope(&self) -> RegistryScope<'_> {
        self.push();
        RegistryScope { registry: self }
    }
}

/// Guard returned by [`CryptoRegistry::scope`]
#[derive(Debug)]
pub struct RegistryScope<'a> {
    registry: &'a CryptoRegistry,
}

impl Deref for RegistryScope<'_> {
    type Target = CryptoRegistry;

    fn deref(&self) -> &CryptoRegistry {
        self.registry
    }
}

impl Drop for RegistryScope<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.registry.pop() {
            tracing::warn!(error = %e, "Crypto registry scope already popped");
        }
    }
}
