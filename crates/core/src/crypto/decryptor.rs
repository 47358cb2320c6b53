//! Private-key side of the hybrid scheme

use rsa::RsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};

use super::cipher::decipher;
use super::encryptor::{Encryptor, Metadata, key_name, key_padding, public_key_pem};
use crate::error::EncryptionError;

/// Default RSA modulus size for generated keys
pub const DEFAULT_KEY_BITS: usize = 4096;

/// Decrypts data encrypted for one RSA key pair
#[derive(Clone)]
pub struct Decryptor {
    private_key: RsaPrivateKey,
    name: String,
}

impl Decryptor {
    /// Generate a new private key as PKCS#8 PEM, encrypted when `password` is set
    pub fn generate_private_key(password: Option<&[u8]>, bits: usize) -> Result<String, EncryptionError> {
        let private_key = RsaPrivateKey::new(&mut rand::thread_rng(), bits)
            .map_err(|e| EncryptionError::Key(format!("failed to generate private key: {e}")))?;
        private_key_pem(&private_key, password)
    }

    /// Create a decryptor; the name defaults to [`key_name`] of the public key
    pub fn new(private_key: RsaPrivateKey, name: Option<String>) -> Result<Self, EncryptionError> {
        let name = match name {
            Some(name) => name,
            None => key_name(&public_key_pem(&private_key.to_public_key())?),
        };
        Ok(Self { private_key, name })
    }

    /// Load a decryptor from a PKCS#8 PEM, decrypting it with `password` if given
    pub fn from_pem(pem: &str, password: Option<&[u8]>, name: Option<String>) -> Result<Self, EncryptionError> {
        let private_key = match password {
            Some(password) => RsaPrivateKey::from_pkcs8_encrypted_pem(pem, password),
            None => RsaPrivateKey::from_pkcs8_pem(pem),
        }
        .map_err(|e| EncryptionError::Key(format!("invalid private key: {e}")))?;
        Self::new(private_key, name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The private key as PKCS#8 PEM
    pub fn private_key_pem(&self, password: Option<&[u8]>) -> Result<String, EncryptionError> {
        private_key_pem(&self.private_key, password)
    }

    /// The encryptor for this key pair, sharing its name
    pub fn encryptor(&self) -> Encryptor {
        Encryptor::with_name(self.private_key.to_public_key(), self.name.clone())
    }

    /// Unwrap the symmetric key from `metadata` and decrypt `data`
    pub fn decrypt(&self, data: &[u8], metadata: &Metadata) -> Result<Vec<u8>, EncryptionError> {
        let key = self
            .private_key
            .decrypt(key_padding(), &metadata.key)
            .map_err(|e| EncryptionError::Key(format!("failed to unwrap symmetric key: {e}")))?;
        decipher(data, &key, &metadata.initialization_vector)
    }
}

impl std::fmt::Debug for Decryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Decryptor({}, <redacted>)", self.name)
    }
}

fn private_key_pem(private_key: &RsaPrivateKey, password: Option<&[u8]>) -> Result<String, EncryptionError> {
    let pem = match password {
        Some(password) => private_key.to_pkcs8_encrypted_pem(rand::thread_rng(), password, LineEnding::LF),
        None => private_key.to_pkcs8_pem(LineEnding::LF),
    }
    .map_err(|e| EncryptionError::Key(format!("failed to encode private key: {e}")))?;
    Ok(pem.to_string())
}
