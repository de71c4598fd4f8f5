//! Services the gate consumes but does not implement.

use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;

use gatehouse_types::{Feature, Password, Username};
use thiserror::Error;

use crate::view::ViewModel;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
#[error("account store query failed")]
pub struct StoreError(#[source] pub BoxError);

#[derive(Debug, Error)]
pub enum CreationError {
    #[error("account {username:?} already exists")]
    Duplicate { username: String },
    #[error("account creation failed")]
    Backend(#[source] BoxError),
}

/// Persistent accounts. Both calls may block.
pub trait AccountStore: Send + Sync {
    /// Whether an administrator account exists.
    fn account_exists(&self) -> Result<bool, StoreError>;

    /// Create an administrator account.
    fn create_account(&self, username: &Username, password: &Password)
    -> Result<(), CreationError>;
}

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("template {name:?} not found in theme {theme:?}")]
    TemplateNotFound { theme: String, name: String },
    #[error("failed to read {path:?} from theme {theme:?}")]
    Io {
        theme: String,
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("theme {theme:?} is invalid: {reason}")]
    Invalid { theme: String, reason: String },
}

/// A static file served from a theme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

pub trait Theme: Send + Sync {
    fn name(&self) -> &str;

    fn properties(&self) -> &BTreeMap<String, String>;

    fn property(&self, key: &str) -> Option<&str> {
        self.properties().get(key).map(String::as_str)
    }

    fn render(&self, view: &ViewModel, template: &str) -> Result<String, ThemeError>;

    /// Look up a file below the theme's resource root; `Ok(None)` if absent.
    fn resource(&self, path: &str) -> Result<Option<Resource>, ThemeError>;
}

pub trait ThemeProvider: Send + Sync {
    /// The welcome theme, or `None` if it cannot be resolved.
    fn active_theme(&self) -> Option<Arc<dyn Theme>>;
}

pub trait FeatureFlags: Send + Sync {
    fn is_enabled(&self, feature: Feature) -> bool;
}

impl<F> FeatureFlags for F
where
    F: Fn(Feature) -> bool + Send + Sync,
{
    fn is_enabled(&self, feature: Feature) -> bool {
        self(feature)
    }
}
