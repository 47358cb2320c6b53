//! Local filesystem backend (`file://` or no scheme)

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use super::octal_parameter;
use crate::error::{Error, Result};
use crate::params::keys;
use crate::resource::Resource;
use crate::traits::{Backend, Target};
use crate::transform::{decode, encode};

const DEFAULT_DIRMODE: u32 = 0o777;

/// Reads and writes the local path named by the URL.
///
/// A path ending in `/` addresses a directory: `store` creates it and
/// `delete` removes the whole tree.
#[derive(Debug)]
pub struct FileBackend {
    target: Target,
}

impl FileBackend {
    pub fn new(target: &Target) -> Self {
        Self { target: target.clone() }
    }

    fn raw_path(&self) -> &str {
        &self.target.parts.path
    }

    fn is_directory(&self) -> bool {
        self.raw_path().ends_with('/')
    }

    /// The path to operate on, after the safe mode check
    fn checked_path(&self) -> Result<PathBuf> {
        let path = PathBuf::from(self.raw_path());
        if self.target.safe {
            let cwd = std::env::current_dir()?;
            if !is_strictly_inside(&cwd, &path) {
                return Err(Error::UnsafePath(self.raw_path().to_string()));
            }
        }
        Ok(path)
    }

    fn encoding(&self) -> Option<&str> {
        self.target.parameter(keys::ENCODING)
    }
}

#[async_trait]
impl Backend for FileBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn fetch(&self) -> Result<Option<Resource>> {
        let path = self.checked_path()?;
        let data = tokio::fs::read(&path).await?;
        let resource = match self.encoding() {
            Some(encoding) => Resource::Text(decode(&data, encoding)?),
            None => Resource::Bytes(data),
        };
        Ok(Some(resource))
    }

    async fn store(&self, resource: Option<Resource>) -> Result<()> {
        let path = self.checked_path()?;

        if self.is_directory() {
            let dirmode = octal_parameter(&self.target, keys::DIRMODE)?.unwrap_or(DEFAULT_DIRMODE);
            tracing::debug!(path = %path.display(), dirmode = %format!("{dirmode:o}"), "Creating directory");
            let mut builder = tokio::fs::DirBuilder::new();
            set_dir_mode(&mut builder, dirmode);
            builder.create(&path).await?;
            return Ok(());
        }

        let data = match (resource, self.encoding()) {
            (None, _) => Vec::new(),
            (Some(Resource::Text(text)), Some(encoding)) => encode(&text, encoding)?,
            (Some(resource), _) => resource.into_bytes()?,
        };

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        if let Some(filemode) = octal_parameter(&self.target, keys::FILEMODE)? {
            set_file_mode(&mut options, filemode);
        }

        let mut file = options.open(&path).await?;
        tokio::io::AsyncWriteExt::write_all(&mut file, &data).await?;
        tokio::io::AsyncWriteExt::flush(&mut file).await?;
        Ok(())
    }

    async fn delete(&self) -> Result<()> {
        let path = self.checked_path()?;
        if self.is_directory() {
            tokio::fs::remove_dir_all(&path).await?;
        } else {
            tokio::fs::remove_file(&path).await?;
        }
        Ok(())
    }

    async fn list(&self) -> Result<Option<Vec<String>>> {
        let path = self.checked_path()?;
        if !tokio::fs::try_exists(&path).await? {
            return Ok(None);
        }

        let mut entries = tokio::fs::read_dir(&path).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let mut name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type().await?.is_dir() {
                name.push('/');
            }
            names.push(name);
        }
        names.sort();
        Ok(Some(names))
    }
}

#[cfg(unix)]
fn set_dir_mode(builder: &mut tokio::fs::DirBuilder, mode: u32) {
    builder.mode(mode);
}

#[cfg(not(unix))]
fn set_dir_mode(_builder: &mut tokio::fs::DirBuilder, _mode: u32) {}

#[cfg(unix)]
fn set_file_mode(options: &mut tokio::fs::OpenOptions, mode: u32) {
    options.mode(mode);
}

#[cfg(not(unix))]
fn set_file_mode(_options: &mut tokio::fs::OpenOptions, _mode: u32) {}

/// Whether `path` lexically resolves to a descendant of `base`
fn is_strictly_inside(base: &Path, path: &Path) -> bool {
    let absolute = normalize(&base.join(path));
    absolute != base && absolute.starts_with(base)
}

fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
