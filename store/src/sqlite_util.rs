//! Secure-filesystem preamble for the account database.
//!
//! - Secure directory creation and Unix permission tightening
//! - Secure SQLite database file creation with permission hardening
//! - SQLite WAL/SHM sidecar path computation

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::fs::OpenOptions;
use std::path::Path;

/// Open a SQLite database at `path` with secure directory and file permissions.
///
/// 1. Creates the parent directory if it doesn't exist
/// 2. Tightens directory permissions (Unix: 0o700, owner-only)
/// 3. Creates the DB file with secure permissions (Unix: 0o600)
/// 4. Opens the SQLite connection
pub(crate) fn open_secure_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        ensure_secure_dir(parent)?;
    }
    ensure_secure_db_files(path)?;

    Connection::open(path).with_context(|| format!("Failed to open database at {}", path.display()))
}

/// Create the directory (and parents) if missing, then on Unix tighten
/// permissions to 0o700 if it is owned by the current user.
pub(crate) fn ensure_secure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)
        .with_context(|| format!("Failed to create directory: {}", path.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::{MetadataExt, PermissionsExt};
        let metadata = std::fs::metadata(path)
            .with_context(|| format!("Failed to read directory metadata: {}", path.display()))?;

        let our_uid = unsafe { libc::getuid() };
        if metadata.uid() != our_uid {
            return Ok(());
        }

        let current_mode = metadata.permissions().mode() & 0o777;
        if current_mode & 0o077 != 0 {
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700)).with_context(
                || format!("Failed to set directory permissions: {}", path.display()),
            )?;
        }
    }
    Ok(())
}

/// Create the database file owner-only if missing and tighten permissions on
/// it and any WAL/SHM sidecars.
pub(crate) fn ensure_secure_db_files(path: &Path) -> Result<()> {
    if !path.exists() {
        let mut options = OpenOptions::new();
        options.create(true).truncate(false).read(true).write(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        options
            .open(path)
            .with_context(|| format!("Failed to create database file: {}", path.display()))?;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to set database permissions: {}", path.display()))?;
        for suffix in ["-wal", "-shm"] {
            let sidecar = sqlite_sidecar_path(path, suffix);
            if sidecar.exists() {
                let _ = std::fs::set_permissions(&sidecar, std::fs::Permissions::from_mode(0o600));
            }
        }
    }
    Ok(())
}

#[cfg(unix)]
fn sqlite_sidecar_path(path: &Path, suffix: &str) -> std::path::PathBuf {
    let file_name = path.file_name().map(|name| name.to_string_lossy());
    match file_name {
        Some(name) => path.with_file_name(format!("{name}{suffix}")),
        None => std::path::PathBuf::from(format!("{}{suffix}", path.display())),
    }
}
