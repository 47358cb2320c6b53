//! Self-describing ciphertext framing
//!
//! Layout: four parts in order (wrapped key, IV, key-pair name, ciphertext),
//! each prefixed by its length as an 8-byte big-endian integer.

use super::encryptor::Metadata;
use crate::error::EncryptionError;

const LENGTH_PREFIX: usize = 8;

/// Prepend `metadata` to `data`
pub fn append_metadata(data: &[u8], metadata: &Metadata) -> Vec<u8> {
    let parts: [&[u8]; 4] = [
        &metadata.key,
        &metadata.initialization_vector,
        metadata.name.as_bytes(),
        data,
    ];
    let total = parts.iter().map(|p| LENGTH_PREFIX + p.len()).sum();
    let mut framed = Vec::with_capacity(total);
    for part in parts {
        framed.extend_from_slice(&(part.len() as u64).to_be_bytes());
        framed.extend_from_slice(part);
    }
    framed
}

/// Split framed bytes back into ciphertext and metadata
pub fn strip_metadata(data: &[u8]) -> Result<(Vec<u8>, Metadata), EncryptionError> {
    let mut reader = PartReader { remaining: data };
    let key = reader.next_part("key")?;
    let initialization_vector = reader.next_part("initialization vector")?;
    let name = reader.next_part("name")?;
    let enciphered = reader.next_part("ciphertext")?;

    if !reader.remaining.is_empty() {
        return Err(EncryptionError::Metadata(format!(
            "{} trailing bytes after ciphertext",
            reader.remaining.len()
        )));
    }

    let name = std::str::from_utf8(name)
        .map_err(|e| EncryptionError::Metadata(format!("key name is not valid UTF-8: {e}")))?;

    let metadata = Metadata {
        key: key.to_vec(),
        initialization_vector: initialization_vector.to_vec(),
        name: name.to_string(),
    };
    Ok((enciphered.to_vec(), metadata))
}

struct PartReader<'a> {
    remaining: &'a [u8],
}

impl<'a> PartReader<'a> {
    fn next_part(&mut self, what: &str) -> Result<&'a [u8], EncryptionError> {
        let (prefix, rest) = self
            .remaining
            .split_at_checked(LENGTH_PREFIX)
            .ok_or_else(|| EncryptionError::Metadata(format!("truncated length prefix for {what}")))?;
        let length = prefix.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b));

        let (part, rest) = usize::try_from(length)
            .ok()
            .and_then(|length| rest.split_at_checked(length))
            .ok_or_else(|| {
                EncryptionError::Metadata(format!(
                    "{what} length {length} exceeds remaining {} bytes",
                    rest.len()
                ))
            })?;
        self.remaining = rest;
        Ok(part)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> Metadata {
        Metadata {
            key: vec![1, 2, 3],
            initialization_vector: vec![9; 16],
            name: "prod".into(),
        }
    }

    #[test]
    fn test_framing_layout() {
        let framed = append_metadata(b"xy", &metadata());
        assert_eq!(framed.len(), 4 * 8 + 3 + 16 + 4 + 2);
        assert_eq!(&framed[..8], &[0, 0, 0, 0, 0, 0, 0, 3]);
        assert_eq!(&framed[8..11], &[1, 2, 3]);
        assert_eq!(&framed[framed.len() - 2..], b"xy");
    }

    #[test]
    fn test_strip_recovers_parts() {
        let framed = append_metadata(b"ciphertext", &metadata());
        let (data, stripped) = strip_metadata(&framed).unwrap();
        assert_eq!(data, b"ciphertext");
        assert_eq!(stripped, metadata());
    }

    #[test]
    fn test_empty_ciphertext() {
        let framed = append_metadata(b"", &metadata());
        let (data, _) = strip_metadata(&framed).unwrap();
        assert!(data.is_empty());
    }

    #[test]
    fn test_truncated_envelope() {
        let framed = append_metadata(b"ciphertext", &metadata());
        for cut in [0, 4, 10, framed.len() - 1] {
            assert!(
                matches!(strip_metadata(&framed[..cut]), Err(EncryptionError::Metadata(_))),
                "cut at {cut} should fail"
            );
        }
    }

    #[test]
    fn test_length_overrun() {
        let mut framed = append_metadata(b"ciphertext", &metadata());
        framed[..8].copy_from_slice(&u64::MAX.to_be_bytes());
        let err = strip_metadata(&framed).unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn test_trailing_bytes() {
        let mut framed = append_metadata(b"ciphertext", &metadata());
        framed.push(0);
        let err = strip_metadata(&framed).unwrap_err();
        assert!(err.to_string().contains("trailing"));
    }

    #[test]
    fn test_invalid_utf8_name() {
        let mut framed = append_metadata(b"ciphertext", &metadata());
        // name bytes follow the key part and the IV part
        let name_offset = 8 + 3 + 8 + 16 + 8;
        framed[name_offset] = 0xff;
        let err = strip_metadata(&framed).unwrap_err();
        assert!(err.to_string().contains("UTF-8"));
    }
}
