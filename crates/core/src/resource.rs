//! Payloads moved through locators

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// A resource value as stored or produced by the untransform pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    /// Raw bytes, as fetched from most backends
    Bytes(Vec<u8>),

    /// Decoded text
    Text(String),

    /// Unpacked archive: entry name to contents
    Archive(BTreeMap<String, Vec<u8>>),

    /// Parsed JSON document
    Json(serde_json::Value),

    /// Local copy of a remote resource
    Path(PathBuf),
}

impl Resource {
    /// Short name of the variant for log and error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Resource::Bytes(_) => "bytes",
            Resource::Text(_) => "text",
            Resource::Archive(_) => "archive",
            Resource::Json(_) => "json",
            Resource::Path(_) => "path",
        }
    }

    /// Serialised form of the resource for storage.
    ///
    /// Text is stored as UTF-8 and JSON as its compact encoding. Archives and
    /// paths have no byte form.
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            Resource::Bytes(bytes) => Ok(bytes),
            Resource::Text(text) => Ok(text.into_bytes()),
            Resource::Json(value) => Ok(serde_json::to_vec(&value)?),
            other => Err(Error::Transform(format!(
                "cannot convert {} resource to bytes",
                other.kind()
            ))),
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Resource::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Resource::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Resource::Json(value) => Some(value),
            _ => None,
        }
    }
}

impl From<Vec<u8>> for Resource {
    fn from(bytes: Vec<u8>) -> Self {
        Resource::Bytes(bytes)
    }
}

impl From<&[u8]> for Resource {
    fn from(bytes: &[u8]) -> Self {
        Resource::Bytes(bytes.to_vec())
    }
}

impl From<String> for Resource {
    fn from(text: String) -> Self {
        Resource::Text(text)
    }
}

impl From<&str> for Resource {
    fn from(text: &str) -> Self {
        Resource::Text(text.to_string())
    }
}

impl From<serde_json::Value> for Resource {
    fn from(value: serde_json::Value) -> Self {
        Resource::Json(value)
    }
}

impl From<BTreeMap<String, Vec<u8>>> for Resource {
    fn from(entries: BTreeMap<String, Vec<u8>>) -> Self {
        Resource::Archive(entries)
    }
}

impl From<PathBuf> for Resource {
    fn from(path: PathBuf) -> Self {
        Resource::Path(path)
    }
}
