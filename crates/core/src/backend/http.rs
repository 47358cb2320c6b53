//! Read-only HTTP backend, the fallback for unrecognised schemes

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::resource::Resource;
use crate::retry::{is_retryable_error, retry_with_backoff};
use crate::traits::{Backend, Target};

/// Fetches the URL, without its locator parameters, with a GET request
#[derive(Debug)]
pub struct HttpBackend {
    target: Target,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(target: &Target) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("datalayer/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(target, client))
    }

    pub fn with_client(target: &Target, client: reqwest::Client) -> Self {
        Self {
            target: target.clone(),
            client,
        }
    }

    async fn get_once(&self) -> Result<Vec<u8>> {
        let url = &self.target.resource_url;
        let response = self.client.get(url).send().await.map_err(network_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Network(format!("HTTP status {status}")));
        }

        let body = response.bytes().await.map_err(network_error)?;
        Ok(body.to_vec())
    }
}

fn network_error(error: reqwest::Error) -> Error {
    if error.is_timeout() {
        Error::Network(format!("Request timeout: {error}"))
    } else if error.is_connect() {
        Error::Network(format!("Connection refused: {error}"))
    } else {
        Error::Network(error.to_string())
    }
}

#[async_trait]
impl Backend for HttpBackend {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch(&self) -> Result<Option<Resource>> {
        tracing::debug!(url = %self.target.resource_url, "Fetching over HTTP");
        let body = retry_with_backoff(&self.target.retry, move || self.get_once(), is_retryable_error).await?;
        Ok(Some(Resource::Bytes(body)))
    }

    async fn store(&self, _resource: Option<Resource>) -> Result<()> {
        Err(Error::UnsupportedOperation(format!(
            "cannot put to {} locators",
            self.target.parts.scheme
        )))
    }

    async fn delete(&self) -> Result<()> {
        Err(Error::UnsupportedOperation(format!(
            "cannot delete {} locators",
            self.target.parts.scheme
        )))
    }

    async fn list(&self) -> Result<Option<Vec<String>>> {
        Err(Error::UnsupportedOperation(format!(
            "cannot list {} locators",
            self.target.parts.scheme
        )))
    }
}
