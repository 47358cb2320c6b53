//! Remote shell backend (`ssh://user@host:port/path`)
//!
//! Copies go through the system `scp` and listings through `ssh` + `find`.
//! Fetched resources are local copies inside temporary directories that live
//! as long as the backend.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::process::Command;

use crate::error::{Error, Result};
use crate::params::keys;
use crate::resource::Resource;
use crate::traits::{Backend, Target};

#[derive(Debug)]
pub struct SshBackend {
    target: Target,
    destination: String,
    temp_dirs: Mutex<Vec<TempDir>>,
}

impl SshBackend {
    pub fn new(target: &Target) -> Result<Self> {
        let host = target
            .parts
            .host
            .as_deref()
            .ok_or_else(|| Error::InvalidUrl(format!("ssh URL without host: {}", target.resource_url)))?;
        let destination = match &target.parts.username {
            Some(user) => format!("{user}@{host}"),
            None => host.to_string(),
        };
        Ok(Self {
            target: target.clone(),
            destination,
            temp_dirs: Mutex::new(Vec::new()),
        })
    }

    /// Remote path relative to the login directory
    fn remote_path(&self) -> &str {
        let path = self.target.parts.path.strip_prefix('/').unwrap_or(&self.target.parts.path);
        let path = path.trim_end_matches('/');
        if path.is_empty() { "." } else { path }
    }

    fn is_recursive(&self) -> bool {
        self.target.parts.path.len() > 1 && self.target.parts.path.ends_with('/')
    }

    fn scp_args(&self, from: String, to: String, recursive: bool) -> Vec<String> {
        let mut args = Vec::new();
        if !self.target.flag(keys::VERBOSE) {
            args.push("-q".to_string());
        }
        if recursive {
            args.push("-r".to_string());
        }
        if let Some(port) = &self.target.parts.port {
            args.push("-P".to_string());
            args.push(port.clone());
        }
        args.push(from);
        args.push(to);
        args
    }

    fn ssh_list_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(port) = &self.target.parts.port {
            args.push("-p".to_string());
            args.push(port.clone());
        }
        args.push(self.destination.clone());
        args.push(format!(
            "cd {} && find . -type f && find . -type d | awk '{{print $0\"/\"}}'",
            shell_quote(self.remote_path())
        ));
        args
    }

    fn temp_dir(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("datalayer-ssh-");
        let dir = match self.target.parameter(keys::DIR) {
            Some(parent) => builder.tempdir_in(parent)?,
            None => builder.tempdir()?,
        };
        Ok(dir)
    }
}

#[async_trait]
impl Backend for SshBackend {
    fn name(&self) -> &'static str {
        "ssh"
    }

    async fn fetch(&self) -> Result<Option<Resource>> {
        let temp_dir = self.temp_dir()?;
        let remote_path = self.remote_path();
        let local_path = match Path::new(remote_path).file_name() {
            Some(name) => temp_dir.path().join(name),
            None => temp_dir.path().to_path_buf(),
        };

        let args = self.scp_args(
            format!("{}:{remote_path}", self.destination),
            local_path.to_string_lossy().into_owned(),
            self.is_recursive(),
        );
        run("scp", &args).await?;

        self.temp_dirs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(temp_dir);
        Ok(Some(Resource::Path(local_path)))
    }

    async fn store(&self, resource: Option<Resource>) -> Result<()> {
        let local_path: PathBuf = match resource {
            Some(Resource::Path(path)) => path,
            Some(other) => {
                return Err(Error::Transform(format!(
                    "cannot upload a {} resource over ssh, expected a local path",
                    other.kind()
                )));
            }
            None => return Err(Error::Transform("nothing to upload over ssh".to_string())),
        };
        let recursive = tokio::fs::metadata(&local_path).await?.is_dir();

        let args = self.scp_args(
            local_path.to_string_lossy().into_owned(),
            format!("{}:{}", self.destination, self.remote_path()),
            recursive,
        );
        run("scp", &args).await?;
        Ok(())
    }

    async fn delete(&self) -> Result<()> {
        Err(Error::UnsupportedOperation("ssh locators cannot delete".to_string()))
    }

    async fn list(&self) -> Result<Option<Vec<String>>> {
        let output = run("ssh", &self.ssh_list_args()).await?;
        Ok(Some(parse_listing(&String::from_utf8_lossy(&output))))
    }
}

async fn run(program: &str, args: &[String]) -> Result<Vec<u8>> {
    tracing::debug!(program = program, args = ?args, "Running remote shell command");
    let output = Command::new(program).args(args).output().await?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Backend(format!(
            "{program} exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }
    Ok(output.stdout)
}

/// Relative names from `find` output, directories suffixed with `/`
fn parse_listing(output: &str) -> Vec<String> {
    let mut names: Vec<String> = output
        .lines()
        .filter(|line| !matches!(*line, "" | "." | "./"))
        .map(|line| line.split_once("./").map_or(line, |(_, rest)| rest).to_string())
        .collect();
    names.sort();
    names
}

/// Quote `value` for a POSIX shell
fn shell_quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '@' | '%' | '+' | '=' | ':' | ',' | '.' | '/' | '-' | '_'));
    if safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}
