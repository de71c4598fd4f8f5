//! Resolved configuration types shared across crates.
//!
//! These types represent fully-validated configuration state. Raw TOML
//! deserialization structs stay private in `gatehouse-config`; the loader
//! resolves them into these types at the parse boundary.

use std::fmt;

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BasePathError {
    #[error("base path must start with '/': {0:?}")]
    NotAbsolute(String),
    #[error("base path must not contain query, fragment or '..': {0:?}")]
    InvalidSegment(String),
}

/// URL prefix the welcome page is mounted under.
///
/// Invariant: starts with `/`, has no trailing `/` unless it is the root,
/// and contains no `?`, `#`, `..` or empty segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct BasePath(String);

impl BasePath {
    pub fn parse(raw: &str) -> Result<Self, BasePathError> {
        let trimmed = raw.trim();
        if !trimmed.starts_with('/') {
            return Err(BasePathError::NotAbsolute(raw.to_string()));
        }
        if trimmed.contains(['?', '#', '\\']) {
            return Err(BasePathError::InvalidSegment(raw.to_string()));
        }

        let segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();
        if segments.iter().any(|s| *s == "." || *s == "..") {
            return Err(BasePathError::InvalidSegment(raw.to_string()));
        }

        if segments.is_empty() {
            Ok(Self::root())
        } else {
            Ok(Self(format!("/{}", segments.join("/"))))
        }
    }

    #[must_use]
    pub fn root() -> Self {
        Self("/".to_string())
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The canonical page location, always ending in `/`.
    #[must_use]
    pub fn with_trailing_slash(&self) -> String {
        if self.is_root() {
            self.0.clone()
        } else {
            format!("{}/", self.0)
        }
    }

    /// Append a relative path below this base.
    #[must_use]
    pub fn join(&self, relative: &str) -> String {
        format!("{}{}", self.with_trailing_slash(), relative.trim_start_matches('/'))
    }
}

impl Default for BasePath {
    fn default() -> Self {
        Self::root()
    }
}

impl TryFrom<String> for BasePath {
    type Error = BasePathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl fmt::Display for BasePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Request scheme as seen by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scheme {
    #[default]
    Http,
    Https,
}

impl Scheme {
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "http" => Some(Self::Http),
            "https" => Some(Self::Https),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_secure(self) -> bool {
        matches!(self, Self::Https)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

/// Optional product features that change what the welcome page offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    AdminConsole,
}

impl Feature {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AdminConsole => "admin_console",
        }
    }
}
