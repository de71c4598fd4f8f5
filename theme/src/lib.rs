//! Welcome page themes.
//!
//! A theme directory looks like:
//!
//! ```text
//! theme.toml        # name = "...", [properties] key = "value"
//! index.html        # placeholder template
//! resources/        # static files served under the welcome-content route
//! ```
//!
//! The built-in theme has the same shape and is compiled into the binary.

mod mime;
pub mod template;

use std::collections::BTreeMap;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use gatehouse_core::{Resource, Theme, ThemeError, ThemeProvider, ViewModel};

pub use mime::mime_for_path;
pub use template::{Context, TemplateError};

pub const MANIFEST_FILE: &str = "theme.toml";
pub const RESOURCES_DIR: &str = "resources";
pub const BUILTIN_THEME: &str = "gatehouse";

const BUILTIN_MANIFEST: &str = include_str!("../assets/theme.toml");
const BUILTIN_INDEX: &str = include_str!("../assets/index.html");
const BUILTIN_RESOURCES: &[(&str, &[u8])] = &[(
    "welcome.css",
    include_bytes!("../assets/resources/welcome.css"),
)];

#[derive(Debug, Default, Deserialize)]
struct Manifest {
    name: Option<String>,
    #[serde(default)]
    properties: BTreeMap<String, String>,
}

enum Source {
    Builtin,
    Directory(PathBuf),
}

/// A theme loaded from `theme.toml` plus its templates and resources.
pub struct FileTheme {
    name: String,
    properties: BTreeMap<String, String>,
    source: Source,
}

impl FileTheme {
    /// The theme embedded in the binary.
    pub fn builtin() -> Result<Self, ThemeError> {
        let manifest = parse_manifest(BUILTIN_THEME, BUILTIN_MANIFEST)?;
        Ok(Self {
            name: manifest.name.unwrap_or_else(|| BUILTIN_THEME.to_string()),
            properties: manifest.properties,
            source: Source::Builtin,
        })
    }

    /// Load a theme from a directory. The manifest is read once; templates and
    /// resources are read from disk on every use.
    pub fn load(dir: impl Into<PathBuf>) -> Result<Self, ThemeError> {
        let dir = dir.into();
        let fallback_name = dir
            .file_name()
            .map_or_else(|| dir.display().to_string(), |n| n.to_string_lossy().into_owned());

        let manifest_path = dir.join(MANIFEST_FILE);
        let raw = std::fs::read_to_string(&manifest_path).map_err(|source| ThemeError::Io {
            theme: fallback_name.clone(),
            path: manifest_path.display().to_string(),
            source,
        })?;
        let manifest = parse_manifest(&fallback_name, &raw)?;

        Ok(Self {
            name: manifest.name.unwrap_or(fallback_name),
            properties: manifest.properties,
            source: Source::Directory(dir),
        })
    }

    fn template_text(&self, name: &str) -> Result<String, ThemeError> {
        let not_found = || ThemeError::TemplateNotFound {
            theme: self.name.clone(),
            name: name.to_string(),
        };
        match &self.source {
            Source::Builtin if name == gatehouse_core::INDEX_TEMPLATE => {
                Ok(BUILTIN_INDEX.to_string())
            }
            Source::Builtin => Err(not_found()),
            Source::Directory(dir) => {
                let rel = safe_relative(name).ok_or_else(not_found)?;
                let path = dir.join(rel);
                match std::fs::read_to_string(&path) {
                    Ok(text) => Ok(text),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => Err(not_found()),
                    Err(source) => Err(ThemeError::Io {
                        theme: self.name.clone(),
                        path: path.display().to_string(),
                        source,
                    }),
                }
            }
        }
    }
}

impl Theme for FileTheme {
    fn name(&self) -> &str {
        &self.name
    }

    fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    fn render(&self, view: &ViewModel, template: &str) -> Result<String, ThemeError> {
        let text = self.template_text(template)?;
        let value = serde_json::to_value(view).map_err(|e| ThemeError::Invalid {
            theme: self.name.clone(),
            reason: format!("view model is not serializable: {e}"),
        })?;
        template::render(&text, &Context::from_value(&value)).map_err(|e| ThemeError::Invalid {
            theme: self.name.clone(),
            reason: format!("{template}: {e}"),
        })
    }

    fn resource(&self, path: &str) -> Result<Option<Resource>, ThemeError> {
        let Some(rel) = safe_relative(path) else {
            tracing::debug!(theme = %self.name, path, "Rejected theme resource path");
            return Ok(None);
        };
        let content_type = mime_for_path(path);

        match &self.source {
            Source::Builtin => Ok(BUILTIN_RESOURCES
                .iter()
                .find(|(name, _)| Path::new(name) == rel)
                .map(|(_, bytes)| Resource {
                    bytes: bytes.to_vec(),
                    content_type,
                })),
            Source::Directory(dir) => {
                let file = dir.join(RESOURCES_DIR).join(rel);
                match std::fs::read(&file) {
                    Ok(bytes) => Ok(Some(Resource {
                        bytes,
                        content_type,
                    })),
                    Err(e)
                        if matches!(
                            e.kind(),
                            io::ErrorKind::NotFound | io::ErrorKind::IsADirectory
                        ) =>
                    {
                        Ok(None)
                    }
                    // Reading a directory fails with a generic error on some platforms.
                    Err(_) if file.is_dir() => Ok(None),
                    Err(source) => Err(ThemeError::Io {
                        theme: self.name.clone(),
                        path: file.display().to_string(),
                        source,
                    }),
                }
            }
        }
    }
}

fn parse_manifest(theme: &str, raw: &str) -> Result<Manifest, ThemeError> {
    toml::from_str(raw).map_err(|e| ThemeError::Invalid {
        theme: theme.to_string(),
        reason: format!("{MANIFEST_FILE}: {e}"),
    })
}

/// Accept only plain relative paths made of normal components.
fn safe_relative(path: &str) -> Option<PathBuf> {
    if path.is_empty() || path.contains('\\') || path.contains(':') {
        return None;
    }
    let candidate = Path::new(path);
    let mut clean = PathBuf::new();
    for component in candidate.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir
            | Component::ParentDir
            | Component::RootDir
            | Component::Prefix(_) => return None,
        }
    }
    if clean.as_os_str().is_empty() {
        None
    } else {
        Some(clean)
    }
}

/// Where the welcome theme comes from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ThemeSelection {
    #[default]
    Builtin,
    Directory(PathBuf),
}

/// Resolves the welcome theme once at startup.
///
/// A theme that fails to load leaves the registry empty; the gate then
/// answers every page request with "theme unavailable".
pub struct ThemeRegistry {
    active: Option<Arc<dyn Theme>>,
}

impl ThemeRegistry {
    #[must_use]
    pub fn new(selection: &ThemeSelection) -> Self {
        let loaded = match selection {
            ThemeSelection::Builtin => FileTheme::builtin(),
            ThemeSelection::Directory(dir) => FileTheme::load(dir),
        };
        match loaded {
            Ok(theme) => {
                tracing::info!(theme = %theme.name(), "Loaded welcome theme");
                Self::with_theme(Arc::new(theme))
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to load welcome theme");
                Self::empty()
            }
        }
    }

    #[must_use]
    pub fn with_theme(theme: Arc<dyn Theme>) -> Self {
        Self {
            active: Some(theme),
        }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self { active: None }
    }
}

impl ThemeProvider for ThemeRegistry {
    fn active_theme(&self) -> Option<Arc<dyn Theme>> {
        self.active.clone()
    }
}
