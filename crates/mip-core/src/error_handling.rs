//! Error types for the install chain.
//! Every failure inside resolve/fetch/verify/install is one of these values; none of them panic.

use std::fmt;

/// Main error type for mip operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MipError {
    /// No target directory could be located, or a relative URL had no base to resolve against
    Configuration { operation: String, source: String },
    /// A `file://` source (file or manifest) does not exist or cannot be opened
    SourceNotFound { path: String },
    /// The server answered with a non-200 status, or the request itself failed
    FetchFailed {
        url: String,
        status: Option<u16>,
        source: String,
    },
    /// The manifest could not be fetched or parsed
    ManifestUnavailable { url: String, source: String },
    /// A file or dependency failed after earlier files were already written
    PartialInstall {
        package: String,
        step: String,
        source: Box<MipError>,
    },
    /// Writing to the target directory failed
    Io {
        operation: String,
        path: Option<String>,
        source: String,
    },
}

impl MipError {
    pub fn configuration(operation: &str, source: impl Into<String>) -> Self {
        MipError::Configuration {
            operation: operation.to_string(),
            source: source.into(),
        }
    }

    pub fn io(operation: &str, path: &str, err: std::io::Error) -> Self {
        MipError::Io {
            operation: operation.to_string(),
            path: Some(path.to_string()),
            source: err.to_string(),
        }
    }

    /// HTTP status that caused this failure, looking through `PartialInstall` wrappers.
    pub fn status(&self) -> Option<u16> {
        match self {
            MipError::FetchFailed { status, .. } => *status,
            MipError::PartialInstall { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Innermost error, i.e. the step that actually failed.
    pub fn root_cause(&self) -> &MipError {
        match self {
            MipError::PartialInstall { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl fmt::Display for MipError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MipError::Configuration { operation, source } => {
                write!(f, "Configuration error in {}: {}", operation, source)
            }
            MipError::SourceNotFound { path } => write!(f, "File {} not found", path),
            MipError::FetchFailed { url, status, source } => {
                match status {
                    Some(code) => write!(f, "Error {} requesting {}", code, url)?,
                    None => write!(f, "Request to {} failed", url)?,
                }
                if !source.is_empty() {
                    write!(f, ": {}", source)?;
                }
                Ok(())
            }
            MipError::ManifestUnavailable { url, source } => {
                write!(f, "Package not found: {} ({})", url, source)
            }
            MipError::PartialInstall { package, step, source } => {
                write!(f, "{} may be partially installed: {} failed: {}", package, step, source)
            }
            MipError::Io { operation, path, source } => {
                write!(f, "I/O error in {}: {}", operation, source)?;
                if let Some(path) = path {
                    write!(f, " (path: {})", path)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for MipError {}

pub type Result<T> = std::result::Result<T, MipError>;
