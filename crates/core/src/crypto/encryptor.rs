//! Public-key side of the hybrid scheme

use rsa::pkcs8::{DecodePublicKey, EncodePublicKey, LineEnding};
use rsa::{Oaep, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use sha2::Sha256;

use super::cipher::{encipher, generate_initialization_vector, generate_key};
use crate::error::EncryptionError;

/// Encryption metadata for one ciphertext.
///
/// `key` is the RSA-wrapped symmetric key. Serialized form uses hex strings
/// for the key and IV.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(with = "hex")]
    pub key: Vec<u8>,

    #[serde(with = "hex")]
    pub initialization_vector: Vec<u8>,

    /// Name of the key pair that can unwrap `key`
    pub name: String,
}

/// Encrypts data for the holder of one RSA private key
#[derive(Clone)]
pub struct Encryptor {
    public_key: RsaPublicKey,
    name: String,
}

impl Encryptor {
    /// Create an encryptor; the name defaults to [`key_name`] of the key
    pub fn new(public_key: RsaPublicKey, name: Option<String>) -> Result<Self, EncryptionError> {
        let name = match name {
            Some(name) => name,
            None => key_name(&public_key_pem(&public_key)?),
        };
        Ok(Self { public_key, name })
    }

    /// Load an encryptor from a SubjectPublicKeyInfo PEM
    pub fn from_public_key_pem(pem: &str, name: Option<String>) -> Result<Self, EncryptionError> {
        let public_key = RsaPublicKey::from_public_key_pem(pem)
            .map_err(|e| EncryptionError::Key(format!("invalid public key: {e}")))?;
        Self::new(public_key, name)
    }

    pub(super) fn with_name(public_key: RsaPublicKey, name: String) -> Self {
        Self { public_key, name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The public key as SubjectPublicKeyInfo PEM
    pub fn public_key_pem(&self) -> Result<String, EncryptionError> {
        public_key_pem(&self.public_key)
    }

    /// Encrypt `data`, generating the symmetric key and IV unless supplied.
    pub fn encrypt(
        &self,
        data: &[u8],
        key: Option<&[u8]>,
        initialization_vector: Option<&[u8]>,
    ) -> Result<(Vec<u8>, Metadata), EncryptionError> {
        let key = key.map_or_else(generate_key, <[u8]>::to_vec);
        let initialization_vector =
            initialization_vector.map_or_else(generate_initialization_vector, <[u8]>::to_vec);

        let enciphered = encipher(data, &key, &initialization_vector)?;
        let metadata = Metadata {
            key: self.wrap_key(&key)?,
            initialization_vector,
            name: self.name.clone(),
        };
        Ok((enciphered, metadata))
    }

    fn wrap_key(&self, key: &[u8]) -> Result<Vec<u8>, EncryptionError> {
        self.public_key
            .encrypt(&mut rand::thread_rng(), key_padding(), key)
            .map_err(|e| EncryptionError::Key(format!("failed to wrap symmetric key: {e}")))
    }
}

impl std::fmt::Debug for Encryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Encryptor({})", self.name)
    }
}

/// OAEP with SHA-256 for both the digest and MGF1, no label
pub(super) fn key_padding() -> Oaep {
    Oaep::new::<Sha256>()
}

pub(super) fn public_key_pem(public_key: &RsaPublicKey) -> Result<String, EncryptionError> {
    public_key
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| EncryptionError::Key(format!("failed to encode public key: {e}")))
}

/// Default key-pair name: hex SHA-1 of the public key PEM
pub fn key_name(public_key_pem: &str) -> String {
    hex::encode(Sha1::digest(public_key_pem.as_bytes()))
}
