//! Hybrid encryption envelope
//!
//! Payloads are encrypted with a fresh AES-256-CBC key, and that key is
//! wrapped with RSA-OAEP for the named key pair. The wrapped key, IV and key
//! name travel with the ciphertext so any holder of the private key can
//! decrypt without out-of-band metadata.

mod cipher;
mod decryptor;
mod encryptor;
mod envelope;
mod registry;

pub use cipher::{IV_LENGTH, KEY_LENGTH, decipher, encipher, generate_initialization_vector, generate_key};
pub use decryptor::{DEFAULT_KEY_BITS, Decryptor};
pub use encryptor::{Encryptor, Metadata, key_name};
pub use envelope::{append_metadata, strip_metadata};
pub use registry::{CryptoRegistry, EncryptOptions, RegistryScope};

#[cfg(test)]
pub(crate) mod testing {
    //! Shared key pairs; RSA generation is too slow to repeat per test.

    use std::sync::LazyLock;

    use super::Decryptor;

    static PRIVATE_KEY_PEM: LazyLock<String> =
        LazyLock::new(|| Decryptor::generate_private_key(None, 2048).expect("generate key"));

    static OTHER_PRIVATE_KEY_PEM: LazyLock<String> =
        LazyLock::new(|| Decryptor::generate_private_key(None, 2048).expect("generate key"));

    pub(crate) fn private_key_pem() -> &'static str {
        &PRIVATE_KEY_PEM
    }

    pub(crate) fn decryptor() -> Decryptor {
        Decryptor::from_pem(&PRIVATE_KEY_PEM, None, None).expect("load key")
    }

    pub(crate) fn other_decryptor() -> Decryptor {
        Decryptor::from_pem(&OTHER_PRIVATE_KEY_PEM, None, None).expect("load key")
    }
}
