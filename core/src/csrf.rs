//! Anti-forgery token for the administrator creation form.
//!
//! The token travels twice: in an HttpOnly cookie and in a hidden form field.
//! A submission is accepted only if both copies are identical, the token is
//! younger than [`TOKEN_TTL`], and it has not been consumed yet.
//!
//! The issue time is embedded in the token itself so expiry is checked by the
//! server instead of trusting the client to honor `Max-Age`. Consumed tokens
//! are remembered until their natural expiry so a replay is rejected even if
//! the client ignores the expiring cookie.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::request::{ResponseCookies, SetCookie, WelcomeRequest};

/// Cookie carrying the server-issued copy of the token.
pub const STATE_CHECKER_COOKIE: &str = "WELCOME_STATE_CHECKER";

/// Lifetime of an issued token.
pub const TOKEN_TTL: Duration = Duration::from_secs(300);

/// How far in the future an issue time may lie before the token is rejected.
const MAX_CLOCK_SKEW: Duration = Duration::from_secs(60);

const NONCE_LEN: usize = 24;
const TOKEN_LEN: usize = NONCE_LEN + 8;

/// Why a submission failed the anti-forgery check.
///
/// Only ever logged; callers surface every variant as the same "forbidden".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CsrfError {
    #[error("state checker cookie is missing")]
    Missing,
    #[error("submitted state checker does not match the cookie")]
    Mismatch,
    #[error("state checker is malformed")]
    Malformed,
    #[error("state checker has expired")]
    Expired,
    #[error("state checker was already used")]
    Replayed,
}

/// An issued anti-forgery token: 192 random bits followed by the issue time,
/// base64url encoded without padding.
#[derive(Clone, PartialEq, Eq)]
pub struct StateChecker(String);

impl StateChecker {
    #[must_use]
    pub fn generate(now: SystemTime) -> Self {
        let nonce: [u8; NONCE_LEN] = rand::random();
        let mut raw = [0u8; TOKEN_LEN];
        raw[..NONCE_LEN].copy_from_slice(&nonce);
        raw[NONCE_LEN..].copy_from_slice(&unix_secs(now).to_be_bytes());
        Self(URL_SAFE_NO_PAD.encode(raw))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

// Manual Debug impl to keep tokens out of logs.
impl std::fmt::Debug for StateChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StateChecker([REDACTED])")
    }
}

/// Issue time recorded in an encoded token.
fn issued_at(token: &str) -> Option<SystemTime> {
    let raw = URL_SAFE_NO_PAD.decode(token).ok()?;
    let secs: [u8; 8] = raw.get(NONCE_LEN..)?.try_into().ok()?;
    if raw.len() != TOKEN_LEN {
        return None;
    }
    UNIX_EPOCH.checked_add(Duration::from_secs(u64::from_be_bytes(secs)))
}

fn unix_secs(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[derive(Debug)]
pub struct CsrfGuard {
    ttl: Duration,
    /// Consumed token -> instant after which it would have expired anyway.
    spent: Mutex<HashMap<String, SystemTime>>,
}

impl Default for CsrfGuard {
    fn default() -> Self {
        Self::with_ttl(TOKEN_TTL)
    }
}

impl CsrfGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            spent: Mutex::new(HashMap::new()),
        }
    }

    /// Generate a token and set it as a cookie scoped to the request path.
    pub fn issue(
        &self,
        request: &WelcomeRequest,
        cookies: &mut ResponseCookies,
        now: SystemTime,
    ) -> StateChecker {
        let token = StateChecker::generate(now);
        cookies.push(self.cookie(request, token.as_str().to_string(), self.ttl.as_secs()));
        token
    }

    /// Check the submitted form value against the request cookie.
    pub fn validate(
        &self,
        request: &WelcomeRequest,
        submitted: Option<&str>,
        now: SystemTime,
    ) -> Result<(), CsrfError> {
        let cookie = request
            .cookie(STATE_CHECKER_COOKIE)
            .ok_or(CsrfError::Missing)?;
        let submitted = submitted.ok_or(CsrfError::Mismatch)?;
        if !bool::from(cookie.as_bytes().ct_eq(submitted.as_bytes())) {
            return Err(CsrfError::Mismatch);
        }

        let issued = issued_at(cookie).ok_or(CsrfError::Malformed)?;
        let age = match now.duration_since(issued) {
            Ok(age) => age,
            Err(ahead) if ahead.duration() <= MAX_CLOCK_SKEW => Duration::ZERO,
            Err(_) => return Err(CsrfError::Malformed),
        };
        if age > self.ttl {
            return Err(CsrfError::Expired);
        }

        let spent = self.spent.lock().unwrap_or_else(PoisonError::into_inner);
        if spent.contains_key(cookie) {
            return Err(CsrfError::Replayed);
        }
        Ok(())
    }

    /// Expire the cookie and mark the request's token as consumed.
    ///
    /// Checking and recording happen under one lock, so of several requests
    /// carrying the same token exactly one gets `Ok`; the rest see
    /// [`CsrfError::Replayed`].
    pub fn expire(
        &self,
        request: &WelcomeRequest,
        cookies: &mut ResponseCookies,
        now: SystemTime,
    ) -> Result<(), CsrfError> {
        cookies.push(self.cookie(request, String::new(), 0));

        let token = request
            .cookie(STATE_CHECKER_COOKIE)
            .ok_or(CsrfError::Missing)?;
        let expires = issued_at(token)
            .and_then(|issued| issued.checked_add(self.ttl))
            .ok_or(CsrfError::Malformed)?;

        let mut spent = self.spent.lock().unwrap_or_else(PoisonError::into_inner);
        spent.retain(|_, expires| *expires > now);
        match spent.insert(token.to_string(), expires) {
            Some(_) => Err(CsrfError::Replayed),
            None => Ok(()),
        }
    }

    fn cookie(&self, request: &WelcomeRequest, value: String, max_age_secs: u64) -> SetCookie {
        SetCookie {
            name: STATE_CHECKER_COOKIE,
            value,
            path: request.path().to_string(),
            max_age_secs,
            secure: request.scheme().is_secure(),
            http_only: true,
        }
    }
}
