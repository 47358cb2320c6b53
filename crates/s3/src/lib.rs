//! datalayer-s3: S3 object-store backend for datalayer
//!
//! Register [`S3BackendFactory`] on a [`Context`](datalayer_core::Context)
//! to route `s3://` URLs through aws-sdk-s3:
//!
//! ```ignore
//! let mut context = Context::new();
//! datalayer_s3::register(&mut context);
//! let locator = context
//!     .locator("s3://bucket/reports/q1.json?locator=1&region=us-east-1&type=json")
//!     .await?;
//! ```

mod backend;
mod target;

use std::sync::Arc;

pub use backend::{S3Backend, S3BackendFactory};
pub use target::S3Target;

/// Route the `s3` scheme of `context` to [`S3BackendFactory`]
pub fn register(context: &mut datalayer_core::Context) {
    context.register_backend(datalayer_core::backend::S3_SCHEME, Arc::new(S3BackendFactory));
}
