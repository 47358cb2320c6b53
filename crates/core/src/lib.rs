//! datalayer-core: URI-addressed resource access
//!
//! This crate provides:
//! - A locator-parameter codec for URLs (`...?locator=1&encrypt=prod`)
//! - Alias registration and recursive alias resolution
//! - A transform/untransform pipeline (encrypt, unzip, decode, parse JSON)
//! - A hybrid RSA-OAEP + AES-256-CBC encryption envelope with named key registries
//! - File, constant, SSH and HTTP backends behind the [`Backend`] trait
//!
//! Object storage is provided by the `datalayer-s3` crate, registered on a
//! [`Context`] as a [`BackendFactory`].
//!
//! ```ignore
//! let mut context = Context::new();
//! context.register_url("data", "file:///srv/data/?locator=1&type=json");
//! let locator = context.locator("alias://data/report.json").await?;
//! let report = locator.get().await?;
//! ```

pub mod alias;
pub mod backend;
pub mod config;
pub mod context;
pub mod crypto;
pub mod error;
pub mod locator;
pub mod params;
pub mod resource;
pub mod retry;
pub mod traits;
pub mod transform;
pub mod url_parts;

pub use alias::{ALIAS_SCHEME, AliasRegistry, merge_urls};
pub use config::{Config, ConfigManager, KeyConfig, RetryConfig};
pub use context::Context;
pub use crypto::{CryptoRegistry, Decryptor, EncryptOptions, Encryptor, Metadata, RegistryScope};
pub use error::{EncryptionError, Error, Result};
pub use locator::{LocatorOptions, ResourceLocator};
pub use params::{LocatorParameters, append_locator_parameters, flag_value, strip_locator_parameters};
pub use resource::Resource;
pub use retry::{is_retryable_error, retry_with_backoff};
pub use traits::{Backend, BackendFactory, Target};
pub use transform::UntransformStep;
pub use url_parts::{UrlParts, join_url_path};
