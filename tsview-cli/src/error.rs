//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;
use tsview::cache::CacheError;
use tsview::config::ConfigFileError;
use tsview::fetch::FetchError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Preview cache error
    Cache(CacheError),
    /// Upstream preview service error
    Upstream(FetchError),
    /// Failed to write output file
    FileWrite { path: String, error: std::io::Error },
    /// Some frames of a bulk operation failed
    Incomplete { failed: usize, total: usize },
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        if let CliError::Upstream(FetchError::Transport(_)) = self {
            eprintln!();
            eprintln!("Make sure the preview service is running and that");
            eprintln!("upstream.base_url in config.ini points at it.");
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Cache(e) => write!(f, "Preview cache error: {}", e),
            CliError::Upstream(e) => write!(f, "Preview service error: {}", e),
            CliError::FileWrite { path, error } => {
                write!(f, "Failed to write file '{}': {}", path, error)
            }
            CliError::Incomplete { failed, total } => {
                write!(f, "{} of {} frames could not be cached", failed, total)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Cache(e) => Some(e),
            CliError::Upstream(e) => Some(e),
            CliError::FileWrite { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<CacheError> for CliError {
    fn from(e: CacheError) -> Self {
        CliError::Cache(e)
    }
}

impl From<FetchError> for CliError {
    fn from(e: FetchError) -> Self {
        CliError::Upstream(e)
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incomplete_message() {
        let err = CliError::Incomplete {
            failed: 2,
            total: 40,
        };
        assert_eq!(err.to_string(), "2 of 40 frames could not be cached");
    }

    #[test]
    fn test_fetch_error_conversion() {
        let err: CliError = FetchError::EmptyBody("http://x/preview".to_string()).into();
        assert!(matches!(err, CliError::Upstream(_)));
        assert!(std::error::Error::source(&err).is_some());
    }
}
