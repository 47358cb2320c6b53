//! S3 backend implementation
//!
//! Wraps aws-sdk-s3 and implements the `Backend` trait from datalayer-core.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;

use datalayer_core::{
    Backend, BackendFactory, Error, Resource, Result, RetryConfig, Target, is_retryable_error, retry_with_backoff,
};

use crate::target::S3Target;

/// Creates [`S3Backend`]s for `s3://` URLs
#[derive(Debug, Clone, Copy, Default)]
pub struct S3BackendFactory;

#[async_trait]
impl BackendFactory for S3BackendFactory {
    async fn create(&self, target: &Target) -> Result<Box<dyn Backend>> {
        Ok(Box::new(S3Backend::new(target).await?))
    }
}

/// Object operations on one bucket and key
pub struct S3Backend {
    inner: aws_sdk_s3::Client,
    target: S3Target,
    retry: RetryConfig,
}

impl S3Backend {
    /// Create a client for the target's region, endpoint and credentials
    pub async fn new(target: &Target) -> Result<Self> {
        let s3 = S3Target::parse(target)?;

        let mut loader =
            aws_config::defaults(aws_config::BehaviorVersion::latest()).region(aws_config::Region::new(s3.region.clone()));

        if let (Some(access_key), Some(secret_key)) = (&s3.access_key, &s3.secret_key) {
            let credentials = aws_credential_types::Credentials::new(
                access_key.clone(),
                secret_key.clone(),
                None, // session token
                None, // expiry
                "datalayer-static-credentials",
            );
            loader = loader.credentials_provider(credentials);
        }

        if let Some(endpoint) = &s3.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        let config = loader.load().await;

        // Custom endpoints are usually S3-compatible services that expect path-style addressing
        let s3_config = aws_sdk_s3::config::Builder::from(&config)
            .force_path_style(s3.endpoint.is_some())
            .build();

        tracing::debug!(url = %s3.display_url(), region = %s3.region, "Created S3 client");
        Ok(Self {
            inner: aws_sdk_s3::Client::from_conf(s3_config),
            target: s3,
            retry: target.retry,
        })
    }

    /// Get the underlying aws-sdk-s3 client
    pub fn inner(&self) -> &aws_sdk_s3::Client {
        &self.inner
    }

    pub fn target(&self) -> &S3Target {
        &self.target
    }

    /// Format AWS SDK error into a detailed error message
    fn format_sdk_error<E: std::fmt::Display>(error: &aws_sdk_s3::error::SdkError<E>) -> String {
        match error {
            aws_sdk_s3::error::SdkError::ServiceError(service_err) => {
                let err = service_err.err();
                let meta = service_err.raw();
                let mut msg = format!("Service error: {err} (status {})", meta.status().as_u16());
                if let Some(code) = meta.headers().get("x-amz-error-code")
                    && let Ok(code_str) = std::str::from_utf8(code.as_bytes())
                {
                    msg.push_str(&format!(" (code: {code_str})"));
                }
                msg
            }
            aws_sdk_s3::error::SdkError::ConstructionFailure(err) => {
                format!("Request construction failed: {err:?}")
            }
            aws_sdk_s3::error::SdkError::TimeoutError(_) => "Request timeout".to_string(),
            aws_sdk_s3::error::SdkError::DispatchFailure(err) => {
                format!("Network dispatch error: {err:?}")
            }
            aws_sdk_s3::error::SdkError::ResponseError(err) => {
                format!("Response error: {err:?}")
            }
            _ => error.to_string(),
        }
    }

    fn sdk_error<E: std::fmt::Display>(error: aws_sdk_s3::error::SdkError<E>) -> Error {
        Error::Network(Self::format_sdk_error(&error))
    }

    async fn get_object(&self) -> Result<Vec<u8>> {
        let response = self
            .inner
            .get_object()
            .bucket(&self.target.bucket)
            .key(&self.target.key)
            .send()
            .await
            .map_err(Self::sdk_error)?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| Error::Network(e.to_string()))?
            .into_bytes()
            .to_vec();

        Ok(data)
    }

    async fn put_object(&self, data: Vec<u8>) -> Result<()> {
        self.inner
            .put_object()
            .bucket(&self.target.bucket)
            .key(&self.target.key)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(Self::sdk_error)?;
        Ok(())
    }

    async fn delete_object(&self) -> Result<()> {
        self.inner
            .delete_object()
            .bucket(&self.target.bucket)
            .key(&self.target.key)
            .send()
            .await
            .map_err(Self::sdk_error)?;
        Ok(())
    }

    /// All keys under the prefix, following continuation tokens
    async fn list_keys(&self) -> Result<Option<Vec<String>>> {
        let mut keys = Vec::new();
        let mut found = false;
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .inner
                .list_objects_v2()
                .bucket(&self.target.bucket)
                .prefix(&self.target.key);
            if let Some(token) = &continuation_token {
                request = request.continuation_token(token);
            }

            let response = request.send().await.map_err(Self::sdk_error)?;
            for object in response.contents() {
                found = true;
                if let Some(key) = object.key() {
                    keys.push(key.to_string());
                }
            }

            match (response.is_truncated(), response.next_continuation_token()) {
                (Some(true), Some(token)) => continuation_token = Some(token.to_string()),
                _ => break,
            }
        }

        Ok(found.then(|| strip_prefix(&self.target.key, keys)))
    }
}

/// Keys relative to `prefix`, dropping the prefix object itself
fn strip_prefix(prefix: &str, keys: Vec<String>) -> Vec<String> {
    keys.into_iter()
        .filter_map(|key| key.strip_prefix(prefix).map(str::to_string))
        .filter(|name| !name.is_empty())
        .collect()
}

#[async_trait]
impl Backend for S3Backend {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn fetch(&self) -> Result<Option<Resource>> {
        let data = retry_with_backoff(&self.retry, move || self.get_object(), is_retryable_error).await?;
        Ok(Some(Resource::Bytes(data)))
    }

    async fn store(&self, resource: Option<Resource>) -> Result<()> {
        let data = match resource {
            Some(resource) => resource.into_bytes()?,
            None => Vec::new(),
        };
        retry_with_backoff(&self.retry, move || self.put_object(data.clone()), is_retryable_error).await
    }

    async fn delete(&self) -> Result<()> {
        retry_with_backoff(&self.retry, move || self.delete_object(), is_retryable_error).await
    }

    async fn list(&self) -> Result<Option<Vec<String>>> {
        retry_with_backoff(&self.retry, move || self.list_keys(), is_retryable_error).await
    }
}

impl std::fmt::Debug for S3Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Backend")
            .field("target", &self.target)
            .field("retry", &self.retry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datalayer_core::Context;
    use std::sync::Arc;

    #[test]
    fn test_strip_prefix() {
        let keys = vec![
            "reports/".to_string(),
            "reports/2024.csv".to_string(),
            "reports/q1/jan.csv".to_string(),
        ];
        assert_eq!(strip_prefix("reports/", keys), vec!["2024.csv", "q1/jan.csv"]);
        assert_eq!(
            strip_prefix("", vec!["a".to_string(), "b/c".to_string()]),
            vec!["a", "b/c"]
        );
    }

    #[tokio::test]
    async fn test_factory_requires_region() {
        let target = Target::new("s3://bucket/key", true, RetryConfig::default());
        let err = S3BackendFactory.create(&target).await.err().unwrap();
        assert!(matches!(err, Error::MissingParameter(_)));
    }

    #[tokio::test]
    async fn test_context_dispatch_reports_url() {
        let mut context = Context::new();
        context.register_backend("s3", Arc::new(S3BackendFactory));
        let err = context.locator("s3://bucket/key").await.unwrap_err();
        assert_eq!(err.url().as_deref(), Some("s3://bucket/key"));
        assert!(matches!(err.cause(), Error::MissingParameter(_)));
    }
}
