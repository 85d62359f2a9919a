//! Error types for symbol analysis and whitelist generation.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while analyzing kernel binaries.
#[derive(Debug)]
pub enum Error {
    /// A symbol name was empty or contained whitespace.
    InvalidSymbol(String),
    /// The inspection tool printed a line that does not name a symbol.
    MalformedSymbolListing {
        /// Binary whose listing was being parsed.
        binary: PathBuf,
        /// The offending line, verbatim.
        line: String,
    },
    /// The inspection tool could not be run, failed, or timed out.
    InspectionFailed {
        /// Binary that was being inspected.
        binary: PathBuf,
        /// What went wrong.
        reason: String,
        /// Underlying I/O error, if any.
        source: Option<io::Error>,
    },
    /// Per-module whitelists were requested without a whitelist path.
    MissingWhitelistPath,
    /// Writing a whitelist document failed.
    WhitelistWriteFailed {
        /// Destination that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
    /// The directory to scan does not exist or is not a directory.
    RootNotFound(PathBuf),
    /// No `vmlinux` was found under the scanned directory.
    KernelImageNotFound(PathBuf),
    /// A module filter pattern could not be compiled.
    InvalidModuleFilter {
        /// The pattern as given.
        pattern: String,
        /// Parser error.
        source: glob::PatternError,
    },
    /// Directory traversal failed.
    Walk(walkdir::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSymbol(name) => write!(f, "invalid symbol name: {name:?}"),
            Self::MalformedSymbolListing { binary, line } => write!(
                f,
                "malformed symbol listing for {}: {line:?}",
                binary.display()
            ),
            Self::InspectionFailed { binary, reason, .. } => {
                write!(f, "failed to inspect {}: {reason}", binary.display())
            }
            Self::MissingWhitelistPath => {
                write!(f, "per-module whitelists require a whitelist path")
            }
            Self::WhitelistWriteFailed { path, source } => {
                write!(f, "writing {}: {source}", path.display())
            }
            Self::RootNotFound(path) => write!(f, "{} is not a directory", path.display()),
            Self::KernelImageNotFound(path) => {
                write!(f, "could not find a vmlinux under {}", path.display())
            }
            Self::InvalidModuleFilter { pattern, source } => {
                write!(f, "invalid module filter {pattern:?}: {source}")
            }
            Self::Walk(e) => write!(f, "directory walk error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InspectionFailed { source: Some(e), .. }
            | Self::WhitelistWriteFailed { source: e, .. } => Some(e),
            Self::InvalidModuleFilter { source, .. } => Some(source),
            Self::Walk(e) => Some(e),
            _ => None,
        }
    }
}

impl From<walkdir::Error> for Error {
    fn from(e: walkdir::Error) -> Self {
        Self::Walk(e)
    }
}
