//! Template lookup.

use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("template name is empty")]
    EmptyName,
    #[error("template `{name}` is not resolvable at {path}: {source}")]
    NotResolvable {
        name: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Raw template markup and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedTemplate {
    pub html: String,
    /// Directory relative resources are resolved against.
    pub directory: PathBuf,
    /// The file the markup was read from.
    pub index_path: PathBuf,
}

/// Resolves a template name to its markup.
pub trait TemplateSource {
    fn load(&self, name: &str) -> Result<LoadedTemplate, TemplateError>;
}

/// Templates on disk. Absolute names are used as given, relative names are
/// resolved under `base`. A directory resolves to its `index.html`.
#[derive(Debug, Clone)]
pub struct DirectoryTemplates {
    base: PathBuf,
}

impl DirectoryTemplates {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }
}

impl TemplateSource for DirectoryTemplates {
    fn load(&self, name: &str) -> Result<LoadedTemplate, TemplateError> {
        if name.trim().is_empty() {
            return Err(TemplateError::EmptyName);
        }
        let target = if Path::new(name).is_absolute() {
            PathBuf::from(name)
        } else {
            self.base.join(name)
        };
        let not_resolvable = |path: &Path, source| TemplateError::NotResolvable {
            name: name.to_string(),
            path: path.to_path_buf(),
            source,
        };

        let metadata = fs::metadata(&target).map_err(|e| not_resolvable(&target, e))?;
        let (directory, index_path) = if metadata.is_dir() {
            let index = target.join("index.html");
            (target, index)
        } else {
            let directory = target.parent().map(Path::to_path_buf).unwrap_or_default();
            (directory, target)
        };
        let html = fs::read_to_string(&index_path).map_err(|e| not_resolvable(&index_path, e))?;

        log::debug!("loaded template `{name}` from {}", index_path.display());
        Ok(LoadedTemplate {
            html,
            directory,
            index_path,
        })
    }
}
