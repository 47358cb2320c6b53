//! Transform and untransform pipeline
//!
//! Writes run the resource through [`transform`] before it reaches the
//! backend; reads run the fetched resource through [`untransform`]. Both are
//! driven entirely by locator parameters.
//!
//! Untransform steps always run in this order:
//!
//! 1. `encrypt=<name>`: strip the envelope and decrypt
//! 2. `compress=zip`: unpack into entry name to bytes
//! 3. `encode=<charset>`: decode bytes to text
//! 4. `type=json`: parse as JSON

use std::collections::BTreeMap;
use std::io::{Cursor, Read};

use crate::crypto::{CryptoRegistry, EncryptOptions};
use crate::error::{Error, Result};
use crate::params::{LocatorParameters, keys};
use crate::resource::Resource;

/// One step of the untransform plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UntransformStep {
    Decrypt,
    Unzip,
    Decode(String),
    ParseJson,
}

impl UntransformStep {
    pub fn name(&self) -> &'static str {
        match self {
            UntransformStep::Decrypt => "decrypt",
            UntransformStep::Unzip => "unzip",
            UntransformStep::Decode(_) => "decode",
            UntransformStep::ParseJson => "json",
        }
    }
}

/// The ordered steps `untransform` will apply for `parameters`
pub fn untransform_plan(parameters: &LocatorParameters) -> Vec<UntransformStep> {
    let mut steps = Vec::new();

    if parameters.contains(keys::ENCRYPT) {
        steps.push(UntransformStep::Decrypt);
    }

    match parameters.get(keys::COMPRESS) {
        Some("zip") => steps.push(UntransformStep::Unzip),
        Some(other) => tracing::warn!(compress = %other, "Ignoring unsupported compression"),
        None => {}
    }

    if let Some(encoding) = parameters.get(keys::ENCODE) {
        steps.push(UntransformStep::Decode(encoding.to_string()));
    }

    match parameters.get(keys::TYPE) {
        Some("json") => steps.push(UntransformStep::ParseJson),
        Some(other) => tracing::warn!(resource_type = %other, "Ignoring unsupported resource type"),
        None => {}
    }

    steps
}

/// Prepare a resource for storage
pub fn transform(
    resource: Option<Resource>,
    parameters: &LocatorParameters,
    registry: &CryptoRegistry,
) -> Result<Option<Resource>> {
    let Some(resource) = resource else {
        return Ok(None);
    };

    let Some(name) = parameters.get(keys::ENCRYPT) else {
        return Ok(Some(resource));
    };

    tracing::debug!(step = "encrypt", name = %name, "Transforming resource");
    let data = resource.into_bytes()?;
    let (encrypted, _) = registry.encrypt_with_registry(&data, name, &EncryptOptions::inline())?;
    Ok(Some(Resource::Bytes(encrypted)))
}

/// Recover a resource from its stored form
pub fn untransform(
    resource: Option<Resource>,
    parameters: &LocatorParameters,
    registry: &CryptoRegistry,
) -> Result<Option<Resource>> {
    let Some(mut resource) = resource else {
        return Ok(None);
    };

    for step in untransform_plan(parameters) {
        tracing::debug!(step = step.name(), input = resource.kind(), "Untransforming resource");
        resource = apply(&step, resource, registry)?;
    }
    Ok(Some(resource))
}

fn apply(step: &UntransformStep, resource: Resource, registry: &CryptoRegistry) -> Result<Resource> {
    match (step, resource) {
        (UntransformStep::Decrypt, Resource::Bytes(data)) => {
            Ok(Resource::Bytes(registry.decrypt_with_registry(&data, None)?))
        }
        (UntransformStep::Unzip, Resource::Bytes(data)) => unzip(data).map(Resource::Archive),
        (UntransformStep::Decode(label), Resource::Bytes(data)) => decode(&data, label).map(Resource::Text),
        (UntransformStep::ParseJson, Resource::Text(text)) => Ok(Resource::Json(serde_json::from_str(&text)?)),
        (UntransformStep::ParseJson, Resource::Bytes(data)) => Ok(Resource::Json(serde_json::from_slice(&data)?)),
        (step, resource) => Err(Error::Transform(format!(
            "cannot {} a {} resource",
            step.name(),
            resource.kind()
        ))),
    }
}

fn unzip(data: Vec<u8>) -> Result<BTreeMap<String, Vec<u8>>> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(data)).map_err(|e| Error::Transform(format!("invalid zip archive: {e}")))?;

    let mut entries = BTreeMap::new();
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| Error::Transform(format!("invalid zip entry {index}: {e}")))?;
        let mut contents = Vec::new();
        entry.read_to_end(&mut contents)?;
        entries.insert(entry.name().to_string(), contents);
    }
    Ok(entries)
}

/// Strictly decode bytes with the named charset
pub(crate) fn decode(data: &[u8], label: &str) -> Result<String> {
    let encoding = encoding_rs::Encoding::for_label(label.as_bytes())
        .ok_or_else(|| Error::Transform(format!("unknown text encoding: {label}")))?;
    encoding
        .decode_without_bom_handling_and_without_replacement(data)
        .map(|text| text.into_owned())
        .ok_or_else(|| Error::Transform(format!("resource is not valid {}", encoding.name())))
}

/// Encode text with the named charset
pub(crate) fn encode(text: &str, label: &str) -> Result<Vec<u8>> {
    let encoding = encoding_rs::Encoding::for_label(label.as_bytes())
        .ok_or_else(|| Error::Transform(format!("unknown text encoding: {label}")))?;
    // encoding_rs only encodes to ASCII-compatible encodings
    if encoding.output_encoding() != encoding {
        return Err(Error::Transform(format!("cannot encode text as {}", encoding.name())));
    }
    let (bytes, _, unmappable) = encoding.encode(text);
    if unmappable {
        return Err(Error::Transform(format!("text is not representable in {}", encoding.name())));
    }
    Ok(bytes.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use crate::crypto::testing;

    fn params(pairs: &[(&str, &str)]) -> LocatorParameters {
        pairs.iter().copied().collect()
    }

    fn zip_bytes() -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();
        writer.start_file("test.key", options).unwrap();
        writer.write_all(b"Key Content").unwrap();
        writer.start_file("test.pem", options).unwrap();
        writer.write_all(b"Pem Content").unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_plan_order() {
        let plan = untransform_plan(&params(&[
            ("type", "json"),
            ("encode", "utf-8"),
            ("compress", "zip"),
            ("encrypt", "prod"),
        ]));
        assert_eq!(
            plan,
            vec![
                UntransformStep::Decrypt,
                UntransformStep::Unzip,
                UntransformStep::Decode("utf-8".into()),
                UntransformStep::ParseJson,
            ]
        );
    }

    #[test]
    fn test_plan_ignores_unknown_values() {
        let plan = untransform_plan(&params(&[("compress", "gzip"), ("type", "yaml")]));
        assert!(plan.is_empty());
    }

    #[test]
    fn test_none_short_circuits() {
        let registry = CryptoRegistry::new();
        let parameters = params(&[("encrypt", "missing"), ("type", "json")]);
        assert_eq!(transform(None, &parameters, &registry).unwrap(), None);
        assert_eq!(untransform(None, &parameters, &registry).unwrap(), None);
    }

    #[test]
    fn test_no_parameters_is_identity() {
        let registry = CryptoRegistry::new();
        let resource = Resource::from("unchanged");
        let parameters = LocatorParameters::new();
        assert_eq!(
            transform(Some(resource.clone()), &parameters, &registry).unwrap(),
            Some(resource.clone())
        );
        assert_eq!(
            untransform(Some(resource.clone()), &parameters, &registry).unwrap(),
            Some(resource)
        );
    }

    #[test]
    fn test_zip_untransform() {
        let registry = CryptoRegistry::new();
        let result = untransform(
            Some(Resource::Bytes(zip_bytes())),
            &params(&[("compress", "zip")]),
            &registry,
        )
        .unwrap();

        let Some(Resource::Archive(entries)) = result else {
            panic!("expected archive, got {result:?}");
        };
        assert_eq!(entries.len(), 2);
        assert_eq!(entries["test.key"], b"Key Content");
        assert_eq!(entries["test.pem"], b"Pem Content");
    }

    #[test]
    fn test_invalid_zip() {
        let registry = CryptoRegistry::new();
        let err = untransform(
            Some(Resource::Bytes(b"not a zip".to_vec())),
            &params(&[("compress", "zip")]),
            &registry,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Transform(_)));
    }

    #[test]
    fn test_decode_and_parse_json() {
        let registry = CryptoRegistry::new();
        let result = untransform(
            Some(Resource::Bytes(r#"{"name": "café", "n": 3}"#.as_bytes().to_vec())),
            &params(&[("encode", "utf-8"), ("type", "json")]),
            &registry,
        )
        .unwrap();
        assert_eq!(
            result,
            Some(Resource::Json(serde_json::json!({"name": "café", "n": 3})))
        );
    }

    #[test]
    fn test_parse_json_from_bytes() {
        let registry = CryptoRegistry::new();
        let result = untransform(
            Some(Resource::Bytes(b"[1, 2, 3]".to_vec())),
            &params(&[("type", "json")]),
            &registry,
        )
        .unwrap();
        assert_eq!(result, Some(Resource::Json(serde_json::json!([1, 2, 3]))));
    }

    #[test]
    fn test_decode_latin1() {
        let registry = CryptoRegistry::new();
        let result = untransform(
            Some(Resource::Bytes(vec![0x63, 0x61, 0x66, 0xe9])),
            &params(&[("encode", "latin1")]),
            &registry,
        )
        .unwrap();
        assert_eq!(result, Some(Resource::Text("café".into())));
    }

    #[test]
    fn test_decode_is_strict() {
        let registry = CryptoRegistry::new();
        let err = untransform(
            Some(Resource::Bytes(vec![0xff, 0xfe, 0x00])),
            &params(&[("encode", "utf-8")]),
            &registry,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Transform(ref msg) if msg.contains("UTF-8")));

        let err = untransform(
            Some(Resource::Bytes(b"x".to_vec())),
            &params(&[("encode", "no-such-charset")]),
            &registry,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Transform(ref msg) if msg.contains("unknown")));
    }

    #[test]
    fn test_step_type_mismatch() {
        let registry = CryptoRegistry::new();
        let err = untransform(
            Some(Resource::Text("plain".into())),
            &params(&[("encrypt", "prod")]),
            &registry,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Transform(ref msg) if msg == "cannot decrypt a text resource"));

        let err = untransform(
            Some(Resource::Bytes(zip_bytes())),
            &params(&[("compress", "zip"), ("type", "json")]),
            &registry,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Transform(ref msg) if msg.contains("archive")));
    }

    #[test]
    fn test_encrypt_roundtrip() {
        let registry = CryptoRegistry::new();
        registry.register_decryptor(testing::decryptor());
        let parameters = params(&[
            ("encrypt", testing::decryptor().name()),
            ("encode", "utf-8"),
            ("type", "json"),
        ]);

        let document = serde_json::json!({"secret": true, "values": [1, 2]});
        let stored = transform(Some(Resource::Json(document.clone())), &parameters, &registry)
            .unwrap()
            .unwrap();
        let Resource::Bytes(ref bytes) = stored else {
            panic!("expected bytes, got {stored:?}");
        };
        assert!(!bytes.windows(6).any(|w| w == b"secret"));

        let restored = untransform(Some(stored), &parameters, &registry).unwrap();
        assert_eq!(restored, Some(Resource::Json(document)));
    }

    #[test]
    fn test_encrypt_unknown_name() {
        let registry = CryptoRegistry::new();
        let err = transform(
            Some(Resource::from("x")),
            &params(&[("encrypt", "unknown")]),
            &registry,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Encryption(crate::error::EncryptionError::Registry(_))
        ));
    }

    #[test]
    fn test_encode_text() {
        assert_eq!(encode("café", "utf-8").unwrap(), "café".as_bytes());
        assert_eq!(encode("café", "latin1").unwrap(), vec![0x63, 0x61, 0x66, 0xe9]);
        assert!(encode("x", "utf-16le").is_err());
        assert!(encode("日本", "ascii").is_err());
    }
}
