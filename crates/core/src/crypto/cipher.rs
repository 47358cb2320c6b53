//! Symmetric half of the hybrid scheme: AES-256-CBC with PKCS#7 padding.

use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;

use crate::error::EncryptionError;

/// Symmetric key length in bytes (AES-256)
pub const KEY_LENGTH: usize = 32;

/// Initialization vector length in bytes (one AES block)
pub const IV_LENGTH: usize = 16;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Generate a fresh random symmetric key
pub fn generate_key() -> Vec<u8> {
    random_bytes(KEY_LENGTH)
}

/// Generate a fresh random initialization vector
pub fn generate_initialization_vector() -> Vec<u8> {
    random_bytes(IV_LENGTH)
}

fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// Pad and encrypt `data`
pub fn encipher(data: &[u8], key: &[u8], initialization_vector: &[u8]) -> Result<Vec<u8>, EncryptionError> {
    let cipher = Aes256CbcEnc::new_from_slices(key, initialization_vector)
        .map_err(|e| EncryptionError::Cipher(format!("invalid key or initialization vector: {e}")))?;
    Ok(cipher.encrypt_padded_vec_mut::<Pkcs7>(data))
}

/// Decrypt and unpad `data`.
///
/// A wrong key or IV almost always surfaces as a padding error; when the
/// padding happens to validate the output is garbage, never the plaintext.
pub fn decipher(data: &[u8], key: &[u8], initialization_vector: &[u8]) -> Result<Vec<u8>, EncryptionError> {
    let cipher = Aes256CbcDec::new_from_slices(key, initialization_vector)
        .map_err(|e| EncryptionError::Cipher(format!("invalid key or initialization vector: {e}")))?;
    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(data)
        .map_err(|_| EncryptionError::Cipher("invalid padding".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_material_is_random() {
        let key = generate_key();
        assert_eq!(key.len(), KEY_LENGTH);
        assert_ne!(key, generate_key());

        let iv = generate_initialization_vector();
        assert_eq!(iv.len(), IV_LENGTH);
        assert_ne!(iv, generate_initialization_vector());
    }

    #[test]
    fn test_cipher_roundtrip() {
        let key = generate_key();
        let iv = generate_initialization_vector();
        for len in [0usize, 1, 15, 16, 17, 100, 4096] {
            let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            let enciphered = encipher(&data, &key, &iv).unwrap();
            assert_eq!(enciphered.len(), (len / 16 + 1) * 16);
            assert_ne!(enciphered, data);
            assert_eq!(decipher(&enciphered, &key, &iv).unwrap(), data);
        }
    }

    #[test]
    fn test_tampered_key_or_iv_never_matches() {
        let key = generate_key();
        let iv = generate_initialization_vector();
        let data = b"attack at dawn, bring the spare batteries".repeat(8);
        let enciphered = encipher(&data, &key, &iv).unwrap();

        let with_other_key = decipher(&enciphered, &generate_key(), &iv);
        assert!(with_other_key.map_or(true, |d| d != data));

        let with_other_iv = decipher(&enciphered, &key, &generate_initialization_vector());
        assert!(with_other_iv.map_or(true, |d| d != data));
    }

    #[test]
    fn test_invalid_lengths() {
        let iv = generate_initialization_vector();
        assert!(matches!(
            encipher(b"x", &[0u8; 7], &iv),
            Err(EncryptionError::Cipher(_))
        ));
        assert!(matches!(
            decipher(&[0u8; 15], &generate_key(), &iv),
            Err(EncryptionError::Cipher(_))
        ));
    }
}
