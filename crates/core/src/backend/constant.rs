//! Literal constant backend (`constant://name?locator=1&constant=...`)

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::params::keys;
use crate::resource::Resource;
use crate::traits::{Backend, Target};
use crate::transform::encode;

/// Serves the `constant` locator parameter as the resource value.
///
/// With `decoding=<charset>` the text is encoded to bytes first, so the
/// untransform pipeline sees the same input a stored file would produce.
#[derive(Debug)]
pub struct ConstantBackend {
    target: Target,
}

impl ConstantBackend {
    pub fn new(target: &Target) -> Self {
        Self { target: target.clone() }
    }
}

#[async_trait]
impl Backend for ConstantBackend {
    fn name(&self) -> &'static str {
        "constant"
    }

    async fn fetch(&self) -> Result<Option<Resource>> {
        let Some(constant) = self.target.parameter(keys::CONSTANT) else {
            return Ok(None);
        };
        let resource = match self.target.parameter(keys::DECODING) {
            Some(charset) => Resource::Bytes(encode(constant, charset)?),
            None => Resource::Text(constant.to_string()),
        };
        Ok(Some(resource))
    }

    async fn store(&self, _resource: Option<Resource>) -> Result<()> {
        Err(Error::UnsupportedOperation("constant locators are read-only".to_string()))
    }

    async fn delete(&self) -> Result<()> {
        Err(Error::UnsupportedOperation("constant locators are read-only".to_string()))
    }

    async fn list(&self) -> Result<Option<Vec<String>>> {
        Ok(Some(vec![self.target.parts.path.clone()]))
    }
}
