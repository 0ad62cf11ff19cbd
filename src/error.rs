//! Error types for packageless
//!
//! Defines all error types surfaced by the package lifecycle, from manifest
//! decoding to container engine calls.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for every packageless operation
#[derive(Debug, Error)]
pub enum PimError {
    #[error("Could not find package {name} with version '{version}' in the pim configuration")]
    PackageNotFound { name: String, version: String },

    #[error("Pim configuration not found: {}", .0.display())]
    ManifestNotFound(PathBuf),

    #[error("Package {0} is already installed")]
    AlreadyInstalled(String),

    #[error("Package {name} is not installed.{}", hint_suffix(.hint))]
    NotInstalled { name: String, hint: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Duplicate package '{0}' in pim configuration")]
    DuplicatePackage(String),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Filesystem error at {}: {message}", .path.display())]
    Filesystem { path: PathBuf, message: String },

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Container engine errors
#[derive(Debug, Error)]
pub struct EngineError {
    pub operation: EngineOperation,
    pub message: String,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.operation, self.message)
    }
}

impl EngineError {
    pub fn new(operation: EngineOperation, message: impl Into<String>) -> Self {
        EngineError {
            operation,
            message: message.into(),
        }
    }
}

/// The engine call that produced an [`EngineError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineOperation {
    PullImage,
    ListImages,
    CreateContainer,
    CopyFromContainer,
    RemoveContainer,
    RemoveImage,
    RunContainer,
    ExtractArchive,
}

impl fmt::Display for EngineOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineOperation::PullImage => "pull image",
            EngineOperation::ListImages => "list images",
            EngineOperation::CreateContainer => "create container",
            EngineOperation::CopyFromContainer => "copy from container",
            EngineOperation::RemoveContainer => "remove container",
            EngineOperation::RemoveImage => "remove image",
            EngineOperation::RunContainer => "run container",
            EngineOperation::ExtractArchive => "extract archive",
        };
        f.write_str(name)
    }
}

fn hint_suffix(hint: &str) -> String {
    if hint.is_empty() {
        String::new()
    } else {
        format!(" {}", hint)
    }
}

/// Result type alias for packageless operations
pub type PimResult<T> = Result<T, PimError>;

impl PimError {
    /// Wrap an I/O failure at `path`
    pub fn filesystem(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        PimError::Filesystem {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Not-installed error with the verb-specific hint appended
    pub fn not_installed(name: impl Into<String>, hint: impl Into<String>) -> Self {
        PimError::NotInstalled {
            name: name.into(),
            hint: hint.into(),
        }
    }

    /// True for the precondition failures reported when an image is absent
    pub fn is_not_installed(&self) -> bool {
        matches!(self, PimError::NotInstalled { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_error_names_operation() {
        let err = PimError::from(EngineError::new(EngineOperation::PullImage, "daemon unavailable"));
        assert_eq!(err.to_string(), "Engine error: pull image failed: daemon unavailable");
    }

    #[test]
    fn not_found_names_package_and_version() {
        let err = PimError::PackageNotFound {
            name: "python".to_string(),
            version: "3.8".to_string(),
        };
        assert!(err.to_string().contains("python"));
        assert!(err.to_string().contains("'3.8'"));
    }
}
