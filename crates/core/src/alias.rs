//! Alias management
//!
//! Aliases are named base URLs. An `alias://name/suffix?query` URL resolves to
//! the registered base for `name` with the suffix path, query, credentials and
//! locator parameters merged on top. A base URL may itself be an alias URL, in
//! which case resolution continues until a concrete scheme is reached.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::params::{append_locator_parameters, take_locator_parameters};
use crate::url_parts::{UrlParts, join_path};

/// Scheme of URLs that refer to a registered alias
pub const ALIAS_SCHEME: &str = "alias";

/// Registry of alias name to base URL
#[derive(Debug, Clone, Default)]
pub struct AliasRegistry {
    aliases: HashMap<String, String>,
}

impl AliasRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or overwrite an alias
    pub fn register_url(&mut self, alias: impl Into<String>, url: impl Into<String>) {
        let alias = alias.into();
        let url = url.into();
        tracing::debug!(alias = %alias, url = %url, "Registering alias");
        self.aliases.insert(alias, url);
    }

    /// The base URL registered for `alias`
    pub fn get_registered_url(&self, alias: &str) -> Result<&str> {
        self.aliases
            .get(alias)
            .map(String::as_str)
            .ok_or_else(|| Error::AliasNotFound(alias.to_string()))
    }

    /// Remove an alias, returning its base URL
    pub fn remove(&mut self, alias: &str) -> Result<String> {
        self.aliases
            .remove(alias)
            .ok_or_else(|| Error::AliasNotFound(alias.to_string()))
    }

    /// Registered alias names, sorted
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.aliases.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    /// Resolve `url` until its scheme is no longer `alias`.
    ///
    /// Non-alias URLs are returned unchanged. Each hop merges the alias URL's
    /// credentials, path, query and fragment onto the registered base URL.
    /// Revisiting an alias name fails with [`Error::CircularAlias`].
    pub fn dealias_url(&self, url: &str) -> Result<String> {
        let mut chain: Vec<String> = Vec::new();
        let mut current = url.to_string();

        loop {
            let parts = UrlParts::parse(&current);
            if parts.scheme != ALIAS_SCHEME {
                return Ok(current);
            }

            let alias = parts
                .host
                .clone()
                .ok_or_else(|| Error::InvalidUrl(format!("alias URL without alias name: {current}")))?;
            if chain.contains(&alias) {
                chain.push(alias);
                return Err(Error::CircularAlias(chain));
            }

            let base_url = self.get_registered_url(&alias)?;
            let to_merge = UrlParts {
                username: parts.username,
                password: parts.password,
                path: parts.path,
                query: parts.query,
                fragment: parts.fragment,
                ..Default::default()
            };
            current = merge_parts(base_url, to_merge);
            tracing::debug!(alias = %alias, url = %current, "Dealiased URL");
            chain.push(alias);
        }
    }
}

/// Merge `url` onto `base_url`.
///
/// Scheme, credentials, host, port and fragment of `url` win when non-empty.
/// The path of `url` is resolved relative to the base path, query pairs are
/// concatenated (base first, duplicates kept), and locator parameters are
/// overlaid per key with `url` winning.
pub fn merge_urls(base_url: &str, url: &str) -> String {
    merge_parts(base_url, UrlParts::parse(url))
}

fn merge_parts(base_url: &str, mut to_merge: UrlParts) -> String {
    let mut base = UrlParts::parse(base_url);
    let mut parameters = take_locator_parameters(&mut base).unwrap_or_default();
    let override_parameters = take_locator_parameters(&mut to_merge).unwrap_or_default();

    // Leading slashes never escape the base path
    let relative_path = if base.path.is_empty() {
        to_merge.path.as_str()
    } else {
        to_merge.path.trim_start_matches('/')
    };

    let merged = UrlParts {
        scheme: prefer(&to_merge.scheme, &base.scheme),
        username: prefer_some(&to_merge.username, &base.username),
        password: prefer_some(&to_merge.password, &base.password),
        host: prefer_some(&to_merge.host, &base.host),
        port: prefer_some(&to_merge.port, &base.port),
        path: join_path(&base.path, relative_path),
        query: join_queries(&base.query, &to_merge.query),
        fragment: prefer(&to_merge.fragment, &base.fragment),
        authority: base.authority || to_merge.authority,
    };

    parameters.merge(override_parameters);
    append_locator_parameters(&merged.to_string(), &parameters)
}

/// Concatenate raw query strings, base first
fn join_queries(base: &str, query: &str) -> String {
    match (base.is_empty(), query.is_empty()) {
        (true, _) => query.to_string(),
        (_, true) => base.to_string(),
        _ => format!("{base}&{query}"),
    }
}

fn prefer(value: &str, fallback: &str) -> String {
    if value.is_empty() { fallback } else { value }.to_string()
}

fn prefer_some(value: &Option<String>, fallback: &Option<String>) -> Option<String> {
    value
        .as_ref()
        .filter(|v| !v.is_empty())
        .or(fallback.as_ref())
        .cloned()
}
