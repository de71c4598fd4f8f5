//! Why the gate refused or failed a request.
//!
//! Variants map one-to-one onto HTTP outcomes in the server crate. Messages
//! are for logs; clients only ever see generic bodies.

use thiserror::Error;

use gatehouse_types::FieldError;

use crate::collaborators::{CreationError, StoreError, ThemeError};
use crate::csrf::CsrfError;
use crate::origin::HostResolutionError;

#[derive(Debug, Error)]
pub enum GateError {
    #[error("no welcome theme is available")]
    ThemeUnavailable,
    #[error(transparent)]
    HostResolution(#[from] HostResolutionError),
    #[error("rejected non-local attempt to create the initial admin user from {remote}")]
    NonLocalAttempt { remote: String },
    #[error("anti-forgery check failed: {0}")]
    Forbidden(#[from] CsrfError),
    #[error("invalid initial admin credentials: {0}")]
    InvalidCredentials(#[from] FieldError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Creation(#[from] CreationError),
    #[error(transparent)]
    Theme(#[from] ThemeError),
}

impl GateError {
    /// Failures caused by the deployment rather than the requester.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::HostResolution(_) | Self::Store(_) | Self::Creation(_) | Self::Theme(_)
        )
    }
}
