//! Gatehouse - welcome page server binary.
//!
//! ```text
//! main() -> Settings::load() -> init_tracing()
//!        -> SqliteAccountStore + ThemeRegistry + Features -> WelcomeGate
//!        -> bootstrap_from_env()   (GATEHOUSE_ADMIN / GATEHOUSE_ADMIN_PASSWORD)
//!        -> gatehouse_server::serve() until Ctrl-C
//! ```

use anyhow::{Context, Result};
use std::{
    env,
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tokio::net::TcpListener;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use gatehouse_config::Settings;
use gatehouse_core::WelcomeGate;
use gatehouse_store::SqliteAccountStore;
use gatehouse_theme::{ThemeRegistry, ThemeSelection};

const ADMIN_ENV: &str = "GATEHOUSE_ADMIN";
const ADMIN_PASSWORD_ENV: &str = "GATEHOUSE_ADMIN_PASSWORD";

fn init_tracing(log_file: Option<&Path>) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file, init_warnings) = match log_file {
        Some(path) => open_log_file(path),
        None => (None, Vec::new()),
    };

    if let Some((log_path, file)) = file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        return;
    }

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
    for warning in init_warnings {
        tracing::warn!("{warning}");
    }
}

fn open_log_file(path: &Path) -> (Option<(PathBuf, fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && let Err(e) = fs::create_dir_all(parent)
    {
        warnings.push(format!(
            "Failed to create log dir {}: {e}",
            parent.display()
        ));
        return (None, warnings);
    }

    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => (Some((path.to_path_buf(), file)), warnings),
        Err(e) => {
            warnings.push(format!("Failed to open log file {}: {e}", path.display()));
            (None, warnings)
        }
    }
}

/// Create the administrator from `GATEHOUSE_ADMIN` / `GATEHOUSE_ADMIN_PASSWORD`
/// when both are set and none exists yet. Returns whether one was created.
fn bootstrap_from_env(gate: &WelcomeGate, var: impl Fn(&str) -> Option<String>) -> Result<bool> {
    let (Some(username), Some(password)) = (var(ADMIN_ENV), var(ADMIN_PASSWORD_ENV)) else {
        if var(ADMIN_ENV).is_some() || var(ADMIN_PASSWORD_ENV).is_some() {
            tracing::warn!(
                "Both {ADMIN_ENV} and {ADMIN_PASSWORD_ENV} must be set to create the initial admin user"
            );
        }
        return Ok(false);
    };

    let created = gate
        .create_initial_admin(&username, &password)
        .context("failed to create the initial admin user from the environment")?;
    if !created {
        tracing::info!("An admin user already exists; ignoring {ADMIN_ENV}");
    }
    Ok(created)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

#[tokio::main]
async fn main() -> Result<()> {
    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            init_tracing(None);
            return Err(e).context("failed to load configuration");
        }
    };
    init_tracing(settings.log_file.as_deref());

    let store = SqliteAccountStore::open(&settings.store_path).with_context(|| {
        format!(
            "failed to open account store at {}",
            settings.store_path.display()
        )
    })?;
    tracing::info!(
        path = %settings.store_path.display(),
        accounts = store.account_count()?,
        "Account store ready"
    );
    let selection = settings
        .theme_dir
        .clone()
        .map_or(ThemeSelection::Builtin, ThemeSelection::Directory);
    let themes = ThemeRegistry::new(&selection);

    let gate = Arc::new(WelcomeGate::new(
        Arc::new(store),
        Arc::new(themes),
        Arc::new(settings.features),
        settings.gate.clone(),
    ));

    let env_gate = Arc::clone(&gate);
    tokio::task::spawn_blocking(move || bootstrap_from_env(&env_gate, |key| env::var(key).ok()))
        .await??;

    let listener = TcpListener::bind(settings.bind)
        .await
        .with_context(|| format!("failed to bind {}", settings.bind))?;
    tracing::info!(
        addr = %listener.local_addr()?,
        base_path = %settings.base_path,
        "Serving welcome page"
    );

    let app = gatehouse_server::router(gate, &settings.base_path);
    gatehouse_server::serve(listener, app, shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}
