//! Error types for datalayer-core
//!
//! A single crate-level error enum covers resolution, locator, transform and
//! backend failures. Encryption failures keep their own enum so callers can
//! branch on envelope vs. registry vs. cipher problems.

use thiserror::Error;

/// Result type alias for datalayer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for datalayer operations
#[derive(Debug, Error)]
pub enum Error {
    /// A locator operation failed. Always carries the offending URL.
    #[error("Location Error for URL {url}: {source}")]
    Location {
        url: String,
        #[source]
        source: Box<Error>,
    },

    /// The alias is not present in the registry
    #[error("Location Error for URL alias://{0}: alias is not registered")]
    AliasNotFound(String),

    /// Alias resolution revisited a name
    #[error(
        "Location Error for URL alias://{}: circular alias chain {}",
        .0.last().map(String::as_str).unwrap_or_default(),
        .0.join(" -> ")
    )]
    CircularAlias(Vec<String>),

    /// Encryption, envelope or key registry failure
    #[error(transparent)]
    Encryption(#[from] EncryptionError),

    /// The URL cannot be interpreted
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Local path resolves outside the working directory in safe mode
    #[error("Cannot target a file path outside the current working directory in safe mode: {0}")]
    UnsafePath(String),

    /// An untransform or transform step rejected the resource
    #[error("Transform error: {0}")]
    Transform(String),

    /// A locator parameter required by the backend is absent
    #[error("Missing locator parameter: {0}")]
    MissingParameter(String),

    /// The backend does not implement this operation
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Network failure talking to a remote backend
    #[error("Network error: {0}")]
    Network(String),

    /// Any other backend failure (external command, SDK)
    #[error("Backend error: {0}")]
    Backend(String),

    /// Configuration could not be loaded or applied
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Wrap `cause` as a location failure for `url`.
    ///
    /// Errors that are already located at the same URL are returned as is.
    pub fn location(url: impl Into<String>, cause: Error) -> Self {
        let url = url.into();
        if let Error::Location { url: inner, .. } = &cause
            && *inner == url
        {
            return cause;
        }
        Error::Location {
            url,
            source: Box::new(cause),
        }
    }

    /// The URL a location error refers to.
    ///
    /// Registry errors report a synthetic `alias://` URL.
    pub fn url(&self) -> Option<String> {
        match self {
            Error::Location { url, .. } => Some(url.clone()),
            Error::AliasNotFound(alias) => Some(format!("alias://{alias}")),
            Error::CircularAlias(chain) => chain.last().map(|alias| format!("alias://{alias}")),
            _ => None,
        }
    }

    /// Whether this is a location error or one of its registry specialisations
    pub fn is_location_error(&self) -> bool {
        matches!(
            self,
            Error::Location { .. } | Error::AliasNotFound(_) | Error::CircularAlias(_)
        )
    }

    /// The innermost cause of a location error, or the error itself
    pub fn cause(&self) -> &Error {
        match self {
            Error::Location { source, .. } => source.cause(),
            other => other,
        }
    }

    /// The encryption failure behind this error, if any
    pub fn encryption_error(&self) -> Option<&EncryptionError> {
        match self.cause() {
            Error::Encryption(e) => Some(e),
            _ => None,
        }
    }
}

/// Errors from the hybrid encryption envelope and its registries
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EncryptionError {
    /// Envelope framing is malformed or truncated
    #[error("Encryption Error (metadata): {0}")]
    Metadata(String),

    /// No encryptor or decryptor is registered under a name
    #[error("Encryption Error (registry): {0}")]
    Registry(String),

    /// Key material could not be parsed, generated, wrapped or unwrapped
    #[error("Encryption Error (key): {0}")]
    Key(String),

    /// Symmetric cipher failure, including invalid padding
    #[error("Encryption Error (cipher): {0}")]
    Cipher(String),
}
