//! Generic URL splitting and rendering
//!
//! `url::Url` rejects bare paths and normalises non-special schemes, so
//! locator URLs are split here with generic URI syntax instead. Every part is
//! kept verbatim, which lets scheme-less references, bare file paths and
//! `alias://` URLs survive a parse/render cycle byte for byte.

use std::fmt;

/// The components of a URL
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlParts {
    /// Lowercased scheme, empty when absent
    pub scheme: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub host: Option<String>,
    pub port: Option<String>,
    pub path: String,
    /// Raw query string without the leading `?`
    pub query: String,
    /// Raw fragment without the leading `#`
    pub fragment: String,
    /// Whether a `//` authority marker is present, even with an empty netloc
    pub authority: bool,
}

impl UrlParts {
    /// Split a URL into its components. Never fails; unrecognised input ends
    /// up in `path`.
    pub fn parse(url: &str) -> Self {
        let (rest, fragment) = url.split_once('#').unwrap_or((url, ""));
        let (rest, query) = rest.split_once('?').unwrap_or((rest, ""));
        let (scheme, rest) = split_scheme(rest);

        let mut parts = UrlParts {
            scheme,
            query: query.to_string(),
            fragment: fragment.to_string(),
            ..Default::default()
        };

        match rest.strip_prefix("//") {
            Some(after) => {
                let end = after.find('/').unwrap_or(after.len());
                parts.set_netloc(&after[..end]);
                parts.path = after[end..].to_string();
                parts.authority = true;
            }
            None => parts.path = rest.to_string(),
        }
        parts
    }

    fn set_netloc(&mut self, netloc: &str) {
        let hostport = match netloc.rsplit_once('@') {
            Some((userinfo, hostport)) => {
                match userinfo.split_once(':') {
                    Some((username, password)) => {
                        self.username = Some(username.to_string());
                        self.password = Some(password.to_string());
                    }
                    None => self.username = Some(userinfo.to_string()),
                }
                hostport
            }
            None => netloc,
        };

        let (host, port) = if hostport.starts_with('[') {
            match hostport.find(']') {
                Some(end) => (&hostport[..=end], hostport[end + 1..].strip_prefix(':')),
                None => (hostport, None),
            }
        } else {
            match hostport.rsplit_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (hostport, None),
            }
        };

        self.host = (!host.is_empty()).then(|| host.to_string());
        self.port = port.filter(|p| !p.is_empty()).map(str::to_string);
    }

    /// The rendered `user:password@host:port` authority
    pub fn netloc(&self) -> String {
        let mut netloc = String::new();
        if let Some(username) = &self.username {
            netloc.push_str(username);
            if let Some(password) = &self.password {
                netloc.push(':');
                netloc.push_str(password);
            }
            netloc.push('@');
        }
        if let Some(host) = &self.host {
            netloc.push_str(host);
        }
        if let Some(port) = &self.port {
            netloc.push(':');
            netloc.push_str(port);
        }
        netloc
    }

    /// Decoded query pairs, in order, duplicates preserved
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        parse_query(&self.query)
    }
}

impl fmt::Display for UrlParts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.scheme.is_empty() {
            write!(f, "{}:", self.scheme)?;
        }
        let netloc = self.netloc();
        if self.authority || !netloc.is_empty() {
            write!(f, "//{netloc}")?;
            if !self.path.is_empty() && !self.path.starts_with('/') {
                f.write_str("/")?;
            }
        } else if self.path.starts_with("//") {
            // Keep the path from being read back as an authority
            f.write_str("//")?;
        }
        f.write_str(&self.path)?;
        if !self.query.is_empty() {
            write!(f, "?{}", self.query)?;
        }
        if !self.fragment.is_empty() {
            write!(f, "#{}", self.fragment)?;
        }
        Ok(())
    }
}

fn split_scheme(url: &str) -> (String, &str) {
    if let Some((candidate, rest)) = url.split_once(':') {
        let mut chars = candidate.chars();
        let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
            && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if valid {
            return (candidate.to_ascii_lowercase(), rest);
        }
    }
    (String::new(), url)
}

/// Decode a form-urlencoded query string into ordered pairs
pub fn parse_query(query: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect()
}

/// Encode ordered pairs as a form-urlencoded query string
pub fn encode_query(pairs: &[(String, String)]) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

/// Resolve `reference` against `base` with URL-relative semantics.
///
/// An absolute reference replaces the base path; a relative one replaces the
/// last base segment. Dot segments are removed from the result.
pub fn join_path(base: &str, reference: &str) -> String {
    if base.is_empty() {
        return reference.to_string();
    }
    if reference.is_empty() {
        return base.to_string();
    }
    let merged = if reference.starts_with('/') {
        reference.to_string()
    } else {
        match base.rfind('/') {
            Some(i) => format!("{}{}", &base[..=i], reference),
            None => reference.to_string(),
        }
    };
    remove_dot_segments(&merged)
}

/// Join `path` onto the path of `url`, keeping every other component
pub fn join_url_path(url: &str, path: &str) -> String {
    let mut parts = UrlParts::parse(url);
    parts.path = join_path(&parts.path, path);
    parts.to_string()
}

fn remove_dot_segments(path: &str) -> String {
    let absolute = path.starts_with('/');
    let segments: Vec<&str> = path.split('/').collect();
    let last = segments.len() - 1;
    let mut output: Vec<&str> = Vec::with_capacity(segments.len());
    let mut trailing_slash = false;

    for (i, segment) in segments.iter().enumerate().skip(usize::from(absolute)) {
        match *segment {
            "." => trailing_slash = i == last,
            ".." => {
                output.pop();
                trailing_slash = i == last;
            }
            s => {
                output.push(s);
                trailing_slash = false;
            }
        }
    }

    let mut joined = output.join("/");
    if trailing_slash {
        joined.push('/');
    }
    if absolute {
        format!("/{joined}")
    } else {
        joined
    }
}
