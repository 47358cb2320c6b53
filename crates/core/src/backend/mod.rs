//! Built-in backends
//!
//! Object storage lives in the `datalayer-s3` crate and is plugged in through
//! a [`BackendFactory`](crate::BackendFactory) on the context.

mod constant;
mod file;
mod http;
mod ssh;

pub use constant::ConstantBackend;
pub use file::FileBackend;
pub use http::HttpBackend;
pub use ssh::SshBackend;

use crate::error::{Error, Result};
use crate::traits::{Backend, Target};

/// Schemes with a built-in backend besides the HTTP fallback
pub const FILE_SCHEMES: [&str; 2] = ["", "file"];
pub const SSH_SCHEME: &str = "ssh";
pub const CONSTANT_SCHEME: &str = "constant";
pub const S3_SCHEME: &str = "s3";

/// Create the built-in backend for the target's scheme
pub fn builtin_backend(target: &Target) -> Result<Box<dyn Backend>> {
    let scheme = target.parts.scheme.as_str();
    let backend: Box<dyn Backend> = match scheme {
        s if FILE_SCHEMES.contains(&s) => Box::new(FileBackend::new(target)),
        SSH_SCHEME => Box::new(SshBackend::new(target)?),
        CONSTANT_SCHEME => Box::new(ConstantBackend::new(target)),
        S3_SCHEME => {
            return Err(Error::UnsupportedOperation(
                "no backend registered for the s3 scheme".to_string(),
            ));
        }
        _ => Box::new(HttpBackend::new(target)?),
    };
    Ok(backend)
}

/// Parse an octal mode parameter such as `dirmode=755`
pub(crate) fn octal_parameter(target: &Target, key: &str) -> Result<Option<u32>> {
    target
        .parameter(key)
        .map(|raw| {
            let digits = raw.strip_prefix("0o").unwrap_or(raw);
            u32::from_str_radix(digits, 8).map_err(|_| Error::InvalidUrl(format!("{key} is not an octal mode: {raw}")))
        })
        .transpose()
}
