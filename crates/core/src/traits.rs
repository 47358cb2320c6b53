//! Backend traits
//!
//! A [`Backend`] performs raw storage operations for one resolved URL. The
//! transform pipeline and error translation live above it, in
//! [`ResourceLocator`](crate::ResourceLocator), so implementations only move
//! bytes.

use async_trait::async_trait;

use crate::config::RetryConfig;
use crate::error::Result;
use crate::params::{LocatorParameters, strip_locator_parameters};
use crate::resource::Resource;
use crate::url_parts::UrlParts;

/// A resolved URL with everything a backend needs to act on it
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    /// Dealiased URL, locator parameters included
    pub url: String,

    /// The URL with locator parameters removed
    pub resource_url: String,

    /// Components of `resource_url`
    pub parts: UrlParts,

    pub parameters: LocatorParameters,

    /// Refuse local paths outside the working directory
    pub safe: bool,

    pub retry: RetryConfig,
}

impl Target {
    pub fn new(url: impl Into<String>, safe: bool, retry: RetryConfig) -> Self {
        let url = url.into();
        let (resource_url, parameters) = strip_locator_parameters(&url);
        let parts = UrlParts::parse(&resource_url);
        Self {
            url,
            resource_url,
            parts,
            parameters,
            safe,
            retry,
        }
    }

    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key)
    }

    pub fn flag(&self, key: &str) -> bool {
        self.parameters.flag(key)
    }
}

/// Raw storage operations for one URL
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Backend: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Read the stored resource; `None` when the backend has no value
    async fn fetch(&self) -> Result<Option<Resource>>;

    /// Write a resource; `None` stores an empty value where supported
    async fn store(&self, resource: Option<Resource>) -> Result<()>;

    async fn delete(&self) -> Result<()>;

    /// Child names of the location, or `None` when it does not exist
    async fn list(&self) -> Result<Option<Vec<String>>>;
}

/// Creates backends for a URL scheme
#[async_trait]
pub trait BackendFactory: Send + Sync {
    async fn create(&self, target: &Target) -> Result<Box<dyn Backend>>;
}
