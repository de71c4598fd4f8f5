//! Core domain logic for Gatehouse.
//!
//! The welcome page doubles as a one-time bootstrap gate: while no
//! administrator exists, a local visitor may create one through a form
//! protected by an anti-forgery token. After that the gate is inert.
//!
//! ```text
//! request -> WelcomeGate -> BootstrapState   (needed?)
//!                        -> origin::is_local (POST only)
//!                        -> CsrfGuard        (POST only)
//!                        -> AccountStore::create_account
//! ```
//!
//! Collaborators (account store, themes, feature flags) are traits in
//! [`collaborators`]; concrete implementations live in other crates.

pub mod collaborators;
pub mod csrf;
pub mod errors;
mod gate;
pub mod origin;
mod request;
mod state;
mod view;

pub use collaborators::{
    AccountStore, BoxError, CreationError, FeatureFlags, Resource, StoreError, Theme, ThemeError,
    ThemeProvider,
};
pub use csrf::{CsrfError, CsrfGuard, STATE_CHECKER_COOKIE, StateChecker, TOKEN_TTL};
pub use errors::GateError;
pub use gate::{GateSettings, PageStatus, RedirectKind, Reply, WelcomeGate};
pub use origin::{HostResolutionError, is_local, is_local_address};
pub use request::{ResponseCookies, SetCookie, WelcomeRequest};
pub use state::BootstrapState;
pub use view::ViewModel;

/// Template rendered for the welcome page.
pub const INDEX_TEMPLATE: &str = "index.html";
