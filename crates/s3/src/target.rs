//! `s3://` URL interpretation
//!
//! `s3://ACCESS_KEY:SECRET_KEY@bucket/key/path?locator=1&region=us-east-1`
//! with an optional `endpoint` parameter for S3-compatible services.
//! Credentials are percent-decoded; without them the default AWS credential
//! chain applies.

use datalayer_core::params::keys;
use datalayer_core::{Error, Result, Target};

/// Bucket, key and connection settings for one object
#[derive(Clone, PartialEq, Eq)]
pub struct S3Target {
    pub bucket: String,
    /// Object key, or key prefix when listing
    pub key: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

impl S3Target {
    pub fn parse(target: &Target) -> Result<Self> {
        let parts = &target.parts;
        let bucket = parts
            .host
            .clone()
            .ok_or_else(|| Error::InvalidUrl(format!("s3 URL without bucket: {}", target.resource_url)))?;
        let key = parts.path.strip_prefix('/').unwrap_or(&parts.path).to_string();

        let region = target
            .parameter(keys::REGION)
            .ok_or_else(|| Error::MissingParameter(keys::REGION.to_string()))?
            .to_string();
        let endpoint = target.parameter(keys::ENDPOINT).map(str::to_string);

        Ok(Self {
            bucket,
            key,
            region,
            endpoint,
            access_key: parts.username.as_deref().map(decode).transpose()?,
            secret_key: parts.password.as_deref().map(decode).transpose()?,
        })
    }

    /// `s3://bucket/key` without credentials
    pub fn display_url(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key)
    }
}

impl std::fmt::Debug for S3Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Target")
            .field("bucket", &self.bucket)
            .field("key", &self.key)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn decode(raw: &str) -> Result<String> {
    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .map_err(|e| Error::InvalidUrl(format!("invalid percent-encoding in credentials: {e}")))
}
