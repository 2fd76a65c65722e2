use std::path::{Path, PathBuf};

use thiserror::Error;

/// Failure to load an external structured document.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not valid YAML: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{} must contain a mapping at the top level", path.display())]
    NotAMapping { path: PathBuf },
}

/// A YAML document embedded verbatim into a resource body.
///
/// Only the shape is checked here: the file parses and its root is a
/// mapping. Field-level validation belongs to whatever consumes the
/// embedded object.
#[derive(Debug, Clone, PartialEq)]
pub struct OpaqueDocument {
    source: PathBuf,
    value: serde_json::Value,
}

impl OpaqueDocument {
    /// Read and parse a document from disk.
    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        let content = std::fs::read_to_string(path).map_err(|source| DocumentError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &content)
    }

    /// Parse document text. `source` is only used in error messages.
    pub fn parse(source: &Path, content: &str) -> Result<Self, DocumentError> {
        let value: serde_json::Value =
            serde_yaml::from_str(content).map_err(|e| DocumentError::Parse {
                path: source.to_path_buf(),
                source: e,
            })?;
        Self::from_value(source, value)
    }

    pub fn from_value(source: &Path, value: serde_json::Value) -> Result<Self, DocumentError> {
        if !value.is_object() {
            return Err(DocumentError::NotAMapping {
                path: source.to_path_buf(),
            });
        }
        tracing::debug!(path = %source.display(), "Loaded document");
        Ok(Self {
            source: source.to_path_buf(),
            value,
        })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn value(&self) -> &serde_json::Value {
        &self.value
    }

    pub fn into_value(self) -> serde_json::Value {
        self.value
    }
}
