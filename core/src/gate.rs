use std::sync::Arc;
use std::time::SystemTime;

use gatehouse_types::{
    CreationForm, Credentials, Feature, Password, USER_CREATED, Username,
};

use crate::INDEX_TEMPLATE;
use crate::collaborators::{AccountStore, FeatureFlags, Resource, Theme, ThemeProvider};
use crate::csrf::CsrfGuard;
use crate::errors::GateError;
use crate::origin;
use crate::request::{ResponseCookies, WelcomeRequest};
use crate::state::BootstrapState;
use crate::view::ViewModel;

const DEFAULT_ADMIN_CREATION_MESSAGE: &str = "or set the environment variables \
    GATEHOUSE_ADMIN and GATEHOUSE_ADMIN_PASSWORD before starting the server";

/// Deployment-specific values shown on or linked from the welcome page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateSettings {
    pub admin_url: String,
    pub local_admin_url: String,
    pub base_url: String,
    pub product_name: String,
    pub admin_creation_message: String,
    /// Resource prefix relative to the page (which always ends in `/`).
    pub resources_path: String,
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            admin_url: "/admin/".to_string(),
            local_admin_url: "http://localhost:8080/".to_string(),
            base_url: "/".to_string(),
            product_name: "Gatehouse".to_string(),
            admin_creation_message: DEFAULT_ADMIN_CREATION_MESSAGE.to_string(),
            resources_path: "welcome-content".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    /// 303, used to canonicalize the page URL.
    SeeOther,
    /// 302, used to forward to the admin console.
    Found,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStatus {
    Ok,
    BadRequest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Redirect { kind: RedirectKind, location: String },
    Page { status: PageStatus, body: String },
}

/// The welcome page and its one-time administrator bootstrap.
pub struct WelcomeGate {
    accounts: Arc<dyn AccountStore>,
    themes: Arc<dyn ThemeProvider>,
    features: Arc<dyn FeatureFlags>,
    settings: GateSettings,
    state: BootstrapState,
    csrf: CsrfGuard,
}

impl WelcomeGate {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        themes: Arc<dyn ThemeProvider>,
        features: Arc<dyn FeatureFlags>,
        settings: GateSettings,
    ) -> Self {
        Self {
            accounts,
            themes,
            features,
            settings,
            state: BootstrapState::new(),
            csrf: CsrfGuard::new(),
        }
    }

    #[must_use]
    pub fn settings(&self) -> &GateSettings {
        &self.settings
    }

    pub fn needs_bootstrap(&self) -> Result<bool, GateError> {
        Ok(self
            .state
            .needs_bootstrap(|| self.accounts.account_exists())?)
    }

    /// `GET`: canonicalize to a trailing slash so relative resource URLs
    /// resolve, then render.
    pub fn welcome_page(
        &self,
        request: &WelcomeRequest,
        cookies: &mut ResponseCookies,
    ) -> Result<Reply, GateError> {
        if !request.path().ends_with('/') {
            let mut location = format!("{}/", request.path());
            if let Some(query) = request.query() {
                location.push('?');
                location.push_str(query);
            }
            return Ok(Reply::Redirect {
                kind: RedirectKind::SeeOther,
                location,
            });
        }
        self.render_page(request, cookies, None, None)
    }

    /// `POST`: attempt to create the initial administrator.
    pub fn submit(
        &self,
        request: &WelcomeRequest,
        form: &CreationForm,
        cookies: &mut ResponseCookies,
    ) -> Result<Reply, GateError> {
        if !self.needs_bootstrap()? {
            return self.render_page(request, cookies, None, None);
        }
        tracing::debug!(path = request.path(), "Processing initial admin user form");

        if !self.is_local(request)? {
            tracing::warn!(
                remote = request.remote_addr(),
                "Rejected non-local attempt to create initial admin user"
            );
            return Err(GateError::NonLocalAttempt {
                remote: request.remote_addr().to_string(),
            });
        }

        if let Err(err) =
            self.csrf
                .validate(request, form.state_checker.as_deref(), SystemTime::now())
        {
            tracing::warn!(reason = %err, "Rejected initial admin user form");
            return Err(err.into());
        }

        let credentials = match form.validate() {
            Ok(credentials) => credentials,
            Err(field) => {
                return self.render_page(request, cookies, None, Some(&field.to_string()));
            }
        };

        if let Err(err) = self.csrf.expire(request, cookies, SystemTime::now()) {
            tracing::warn!(reason = %err, "Rejected initial admin user form");
            return Err(err.into());
        }
        self.create(&credentials)?;
        self.render_page(request, cookies, Some(USER_CREATED.as_str()), None)
    }

    /// Create the administrator outside the web flow (e.g. from environment
    /// variables at startup). Returns `false` if one already exists.
    pub fn create_initial_admin(&self, username: &str, password: &str) -> Result<bool, GateError> {
        if !self.needs_bootstrap()? {
            return Ok(false);
        }
        let credentials = Credentials {
            username: Username::new(username)?,
            password: Password::new(password)?,
        };
        self.create(&credentials)?;
        Ok(true)
    }

    /// Static file from the active theme. No theme means nothing to serve.
    pub fn resource(&self, path: &str) -> Result<Option<Resource>, GateError> {
        match self.themes.active_theme() {
            Some(theme) => Ok(theme.resource(path)?),
            None => Ok(None),
        }
    }

    fn create(&self, credentials: &Credentials) -> Result<(), GateError> {
        self.accounts
            .create_account(&credentials.username, &credentials.password)?;
        self.state.mark_satisfied();
        tracing::info!(username = %credentials.username, "Created initial admin user");
        Ok(())
    }

    fn render_page(
        &self,
        request: &WelcomeRequest,
        cookies: &mut ResponseCookies,
        success_message: Option<&str>,
        error_message: Option<&str>,
    ) -> Result<Reply, GateError> {
        let Some(theme) = self.themes.active_theme() else {
            tracing::error!("Welcome theme is unavailable; check the [theme] configuration");
            return Err(GateError::ThemeUnavailable);
        };

        let bootstrap = self.needs_bootstrap()?;
        let admin_console_enabled = self.features.is_enabled(Feature::AdminConsole);

        if redirect_to_admin(theme.as_ref())
            && !bootstrap
            && admin_console_enabled
            && success_message.is_none()
        {
            return Ok(Reply::Redirect {
                kind: RedirectKind::Found,
                location: self.settings.admin_url.clone(),
            });
        }

        let local_user = self.is_local(request)?;
        let mut view = ViewModel {
            bootstrap,
            admin_console_enabled,
            properties: theme.properties().clone(),
            admin_url: self.settings.admin_url.clone(),
            base_url: self.settings.base_url.clone(),
            product_name: self.settings.product_name.clone(),
            resources_path: self.settings.resources_path.clone(),
            local_user,
            success_message: success_message.map(str::to_string),
            error_message: error_message.map(str::to_string),
            ..ViewModel::default()
        };

        if bootstrap {
            view.local_admin_url = Some(self.settings.local_admin_url.clone());
            view.admin_user_creation_message = Some(self.settings.admin_creation_message.clone());
            if local_user {
                let token = self.csrf.issue(request, cookies, SystemTime::now());
                view.state_checker = Some(token.into_inner());
            }
        }

        let body = theme.render(&view, INDEX_TEMPLATE)?;
        let status = if error_message.is_some() {
            PageStatus::BadRequest
        } else {
            PageStatus::Ok
        };
        Ok(Reply::Page { status, body })
    }

    fn is_local(&self, request: &WelcomeRequest) -> Result<bool, GateError> {
        Ok(origin::is_local(
            request.remote_addr(),
            request.local_addr(),
            request.has_forwarding_header(),
        )?)
    }
}

fn redirect_to_admin(theme: &dyn Theme) -> bool {
    theme
        .property("redirectToAdmin")
        .is_some_and(|value| value.trim().eq_ignore_ascii_case("true"))
}
