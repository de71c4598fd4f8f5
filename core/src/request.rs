use std::fmt;

use gatehouse_types::Scheme;

use crate::origin::FORWARDING_HEADERS;

/// Everything the gate needs to know about an inbound request.
///
/// Built by the HTTP layer; the gate never touches transport types.
#[derive(Debug, Clone)]
pub struct WelcomeRequest {
    path: String,
    query: Option<String>,
    scheme: Scheme,
    remote_addr: String,
    local_addr: String,
    headers: Vec<(String, String)>,
}

impl WelcomeRequest {
    pub fn new(
        path: impl Into<String>,
        scheme: Scheme,
        remote_addr: impl Into<String>,
        local_addr: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            query: None,
            scheme,
            remote_addr: remote_addr.into(),
            local_addr: local_addr.into(),
            headers: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        let query = query.into();
        self.query = (!query.is_empty()).then_some(query);
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .push((name.into().to_ascii_lowercase(), value.into()));
        self
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    #[must_use]
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    #[must_use]
    pub fn remote_addr(&self) -> &str {
        &self.remote_addr
    }

    #[must_use]
    pub fn local_addr(&self) -> &str {
        &self.local_addr
    }

    /// First value of a header, matched case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// First cookie with `name` across all `Cookie` headers.
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .filter(|(key, _)| key == "cookie")
            .flat_map(|(_, value)| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| key.trim() == name)
            .map(|(_, value)| {
                let value = value.trim();
                value
                    .strip_prefix('"')
                    .and_then(|v| v.strip_suffix('"'))
                    .unwrap_or(value)
            })
    }

    /// Whether a proxy or load balancer put a forwarding header on the request.
    #[must_use]
    pub fn has_forwarding_header(&self) -> bool {
        FORWARDING_HEADERS
            .iter()
            .any(|name| self.header(name).is_some())
    }
}

/// A `Set-Cookie` directive produced by the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    pub name: &'static str,
    pub value: String,
    pub path: String,
    pub max_age_secs: u64,
    pub secure: bool,
    pub http_only: bool,
}

impl fmt::Display for SetCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={}; Path={}; Max-Age={}",
            self.name, self.value, self.path, self.max_age_secs
        )?;
        if self.secure {
            f.write_str("; Secure")?;
        }
        if self.http_only {
            f.write_str("; HttpOnly")?;
        }
        Ok(())
    }
}

/// Cookies to attach to the response, in the order they were set.
///
/// Collected separately from the reply so they reach the client even when the
/// gate returns an error after expiring a token.
#[derive(Debug, Clone, Default)]
pub struct ResponseCookies(Vec<SetCookie>);

impl ResponseCookies {
    pub fn push(&mut self, cookie: SetCookie) {
        self.0.push(cookie);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SetCookie> {
        self.0.iter()
    }

    /// Most recent directive for `name`.
    #[must_use]
    pub fn last(&self, name: &str) -> Option<&SetCookie> {
        self.0.iter().rev().find(|cookie| cookie.name == name)
    }
}
