//! Where unit text comes from.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("unit name `{unit}` is not a valid path: {reason}")]
    InvalidName { unit: String, reason: &'static str },

    #[error("unit `{unit}` not found")]
    NotFound { unit: String },

    #[error("failed to read unit `{unit}` from {}: {message}", path.display())]
    Io {
        unit: String,
        path: PathBuf,
        message: String,
    },
}

/// Delivers the text of a named unit.
///
/// Implementations run on the loader's local task set, so they need not be
/// `Send`.
#[async_trait(?Send)]
pub trait ModuleSource {
    async fn fetch(&self, unit: &str) -> Result<String, FetchError>;
}

/// Reads `<root>/<unit>.<extension>` from disk.
///
/// The extension is not appended when the unit name already ends with it.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
    extension: String,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a unit name to the file it is read from.
    ///
    /// Names are `/`-separated relative paths; absolute names, empty
    /// segments, `.` and `..` are refused so a unit can never escape the
    /// root.
    pub fn unit_path(&self, unit: &str) -> Result<PathBuf, FetchError> {
        let invalid = |reason| FetchError::InvalidName {
            unit: unit.to_string(),
            reason,
        };

        if unit.is_empty() {
            return Err(invalid("empty name"));
        }
        if unit.starts_with('/') || Path::new(unit).is_absolute() {
            return Err(invalid("absolute path"));
        }
        if unit.split('/').any(|segment| segment.is_empty()) {
            return Err(invalid("empty path segment"));
        }
        if unit.split('/').any(|segment| segment == "." || segment == "..") {
            return Err(invalid("`.` and `..` segments are not allowed"));
        }

        let suffix = format!(".{}", self.extension);
        let file = if self.extension.is_empty() || unit.ends_with(&suffix) {
            unit.to_string()
        } else {
            format!("{unit}{suffix}")
        };
        Ok(self.root.join(file))
    }
}

#[async_trait(?Send)]
impl ModuleSource for DirectorySource {
    async fn fetch(&self, unit: &str) -> Result<String, FetchError> {
        let path = self.unit_path(unit)?;
        tokio::fs::read_to_string(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FetchError::NotFound {
                    unit: unit.to_string(),
                }
            } else {
                FetchError::Io {
                    unit: unit.to_string(),
                    path,
                    message: e.to_string(),
                }
            }
        })
    }
}

/// Units held in memory.
///
/// Each fetch yields to the scheduler once before answering, so deliveries
/// interleave with other tasks the way real I/O does.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    units: BTreeMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unit(mut self, unit: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(unit, text);
        self
    }

    pub fn insert(&mut self, unit: impl Into<String>, text: impl Into<String>) {
        self.units.insert(unit.into(), text.into());
    }
}

#[async_trait(?Send)]
impl ModuleSource for MemorySource {
    async fn fetch(&self, unit: &str) -> Result<String, FetchError> {
        tokio::task::yield_now().await;
        self.units
            .get(unit)
            .cloned()
            .ok_or_else(|| FetchError::NotFound {
                unit: unit.to_string(),
            })
    }
}
