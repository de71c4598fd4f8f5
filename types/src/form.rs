//! The initial-administrator creation form.
//!
//! `CreationForm` is the raw, untrusted submission. `validate` turns it into
//! `Credentials`, checking fields in a fixed order and stopping at the first
//! failure so the page can show exactly one message.

use std::fmt;

use thiserror::Error;

use crate::NonEmptyString;

/// Form field carrying the anti-forgery token.
pub const STATE_CHECKER_FIELD: &str = "stateChecker";

const USERNAME_FIELD: &str = "username";
const PASSWORD_FIELD: &str = "password";
const CONFIRMATION_FIELD: &str = "passwordConfirmation";

/// Raw URL-encoded submission. Only the first occurrence of each field counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreationForm {
    pub username: Option<String>,
    pub password: Option<String>,
    pub password_confirmation: Option<String>,
    pub state_checker: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("Username is missing")]
    MissingUsername,
    #[error("Password is missing")]
    MissingPassword,
    #[error("Password and confirmation doesn't match")]
    ConfirmationMismatch,
}

impl CreationForm {
    /// Build a form from decoded `(name, value)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut form = Self::default();
        for (name, value) in pairs {
            let slot = match name.as_ref() {
                USERNAME_FIELD => &mut form.username,
                PASSWORD_FIELD => &mut form.password,
                CONFIRMATION_FIELD => &mut form.password_confirmation,
                STATE_CHECKER_FIELD => &mut form.state_checker,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into());
            }
        }
        form
    }

    /// Validate in order: username (trimmed), password, confirmation.
    pub fn validate(&self) -> Result<Credentials, FieldError> {
        let username = self
            .username
            .as_deref()
            .map(str::trim)
            .and_then(|name| NonEmptyString::new(name).ok())
            .ok_or(FieldError::MissingUsername)?;

        let password = match self.password.as_deref() {
            Some(password) if !password.is_empty() => password,
            _ => return Err(FieldError::MissingPassword),
        };

        if self.password_confirmation.as_deref() != Some(password) {
            return Err(FieldError::ConfirmationMismatch);
        }

        Ok(Credentials {
            username: Username(username),
            password: Password(password.to_string()),
        })
    }
}

/// A trimmed, non-empty username.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Username(NonEmptyString);

impl Username {
    pub fn new(raw: &str) -> Result<Self, FieldError> {
        NonEmptyString::new(raw.trim())
            .map(Self)
            .map_err(|_| FieldError::MissingUsername)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-empty password, kept exactly as submitted (no trimming).
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    pub fn new(raw: impl Into<String>) -> Result<Self, FieldError> {
        let raw = raw.into();
        if raw.is_empty() {
            Err(FieldError::MissingPassword)
        } else {
            Ok(Self(raw))
        }
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

// Manual Debug impl to prevent leaking passwords in logs.
impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password([REDACTED])")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: Username,
    pub password: Password,
}
