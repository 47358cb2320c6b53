//! Resource locators
//!
//! A [`ResourceLocator`] binds one resolved URL to its backend and to the
//! crypto registry used by the transform pipeline. Every operation reports
//! failures as [`Error::Location`] carrying the URL.

use std::future::Future;

use crate::crypto::CryptoRegistry;
use crate::error::{Error, Result};
use crate::params::LocatorParameters;
use crate::resource::Resource;
use crate::traits::{Backend, Target};
use crate::transform::{UntransformStep, transform, untransform, untransform_plan};
use crate::url_parts::UrlParts;

/// Per-locator options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocatorOptions {
    /// Refuse local paths outside the working directory
    pub safe: bool,
}

impl Default for LocatorOptions {
    fn default() -> Self {
        Self { safe: true }
    }
}

/// Access to the resource at one URL
pub struct ResourceLocator<'a> {
    target: Target,
    backend: Box<dyn Backend>,
    crypto: &'a CryptoRegistry,
}

impl<'a> ResourceLocator<'a> {
    pub fn new(target: Target, backend: Box<dyn Backend>, crypto: &'a CryptoRegistry) -> Self {
        Self { target, backend, crypto }
    }

    /// The dealiased URL, locator parameters included
    pub fn url(&self) -> &str {
        &self.target.url
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn url_parts(&self) -> &UrlParts {
        &self.target.parts
    }

    pub fn locator_parameters(&self) -> &LocatorParameters {
        &self.target.parameters
    }

    pub fn get_locator_parameter(&self, key: &str) -> Option<&str> {
        self.target.parameter(key)
    }

    pub fn get_locator_flag(&self, key: &str) -> bool {
        self.target.flag(key)
    }

    /// Name of the backend this locator dispatches to
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Steps applied to fetched resources
    pub fn untransform_plan(&self) -> Vec<UntransformStep> {
        untransform_plan(&self.target.parameters)
    }

    pub fn transform(&self, resource: Option<Resource>) -> Result<Option<Resource>> {
        transform(resource, &self.target.parameters, self.crypto)
    }

    pub fn untransform(&self, resource: Option<Resource>) -> Result<Option<Resource>> {
        untransform(resource, &self.target.parameters, self.crypto)
    }

    /// Fetch and untransform the resource
    pub async fn get(&self) -> Result<Option<Resource>> {
        self.located(async {
            let fetched = self.backend.fetch().await?;
            self.untransform(fetched)
        })
        .await
    }

    /// Transform and store a resource
    pub async fn put(&self, resource: Option<Resource>) -> Result<()> {
        self.located(async {
            let transformed = self.transform(resource)?;
            self.backend.store(transformed).await
        })
        .await
    }

    pub async fn delete(&self) -> Result<()> {
        self.located(self.backend.delete()).await
    }

    /// Child names at the location, `None` when it does not exist
    pub async fn list(&self) -> Result<Option<Vec<String>>> {
        self.located(self.backend.list()).await
    }

    async fn located<T>(&self, operation: impl Future<Output = Result<T>>) -> Result<T> {
        operation.await.map_err(|e| {
            tracing::debug!(url = %self.target.url, backend = self.backend.name(), error = %e, "Locator operation failed");
            Error::location(&self.target.url, e)
        })
    }
}

impl std::fmt::Debug for ResourceLocator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceLocator")
            .field("url", &self.target.url)
            .field("backend", &self.backend.name())
            .finish()
    }
}
