//! CLI error types with exit code handling
//!
//! Library errors are folded into a few user-facing categories, each with
//! its own exit code.

use conex_core::CoreError;
use conex_repo::RepoError;
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Bad flags, references, properties or input documents
    #[error("{message}")]
    #[diagnostic(code(conex::cli::input))]
    Input {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Saved profiles missing, duplicated or unreadable
    #[error("{message}")]
    #[diagnostic(code(conex::cli::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// The remote service refused or failed the request
    #[error("{message}")]
    #[diagnostic(code(conex::cli::server))]
    Server {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(conex::cli::io))]
    Io { message: String },

    /// Wrapped error for passthrough (stores the formatted message)
    #[error("{message}")]
    #[diagnostic(code(conex::cli::error))]
    Other { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Input { .. } => exit_codes::INPUT_ERROR,
            CliError::Config { .. } => exit_codes::CONFIG_ERROR,
            CliError::Server { .. } => exit_codes::SERVER_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Other { .. } => exit_codes::ERROR,
        }
    }

    /// Create an input error (user provided invalid input)
    pub fn input(message: impl Into<String>) -> Self {
        Self::Input {
            message: message.into(),
            help: None,
        }
    }

    /// Create an input error with help text
    pub fn input_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Input {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    fn server(message: impl Into<String>, help: Option<&str>) -> Self {
        Self::Server {
            message: message.into(),
            help: help.map(String::from),
        }
    }

    fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::input(format!("Invalid JSON: {}", err))
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::Io(_) | CoreError::Walk(_) => CliError::Io { message },
            CoreError::MissingChecksumSource => CliError::input_with_help(
                message,
                "Pass --server, or --url with --user and --password/--token",
            ),
            CoreError::ChecksumLookup { .. } => CliError::server(message, None),
            CoreError::Lipo { .. } => CliError::other(message),
            _ => CliError::input(message),
        }
    }
}

impl From<RepoError> for CliError {
    fn from(err: RepoError) -> Self {
        let message = err.to_string();
        match err {
            RepoError::Core(core) => CliError::from(core),
            RepoError::Io(io) => CliError::from(io),

            RepoError::ProfileAlreadyExists { .. }
            | RepoError::ProfileNotFound { .. }
            | RepoError::ProfileNotConfigured { .. }
            | RepoError::InvalidConfig { .. } => CliError::config(message),

            RepoError::InvalidConnection { .. }
            | RepoError::InvalidUrl { .. }
            | RepoError::InvalidSchedule { .. }
            | RepoError::MissingToken => CliError::input(message),

            RepoError::Unauthorized { .. } => CliError::server(
                message,
                Some("Check the saved server credentials or the --user and --password/--token flags"),
            ),
            RepoError::Forbidden { .. } => {
                CliError::server(message, Some("The user lacks permission for this operation"))
            }
            RepoError::NetworkError { .. } | RepoError::Timeout { .. } => {
                CliError::server(message, Some("Check the server url and your network connection"))
            }
            RepoError::BadRequest { .. }
            | RepoError::NotFound { .. }
            | RepoError::UnexpectedResponse { .. }
            | RepoError::RateLimited { .. }
            | RepoError::UnsupportedEdition { .. }
            | RepoError::BuildNotFound { .. } => CliError::server(message, None),

            RepoError::Serialization(_) | RepoError::Other(_) => CliError::other(message),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_errors_map_to_exit_codes() {
        let missing = CliError::from(RepoError::ProfileNotConfigured {
            command: "server",
            name: "prod".to_string(),
        });
        assert_eq!(missing.exit_code(), exit_codes::CONFIG_ERROR);

        let denied = CliError::from(RepoError::Unauthorized {
            message: "401: Bad credentials".to_string(),
        });
        assert_eq!(denied.exit_code(), exit_codes::SERVER_ERROR);
        assert_eq!(denied.to_string(), "401: Bad credentials");

        let flags = CliError::from(RepoError::InvalidConnection {
            message: "nope".to_string(),
        });
        assert_eq!(flags.exit_code(), exit_codes::INPUT_ERROR);
    }

    #[test]
    fn test_core_errors_keep_their_message() {
        let err = CliError::from(RepoError::Core(CoreError::NoArtifacts {
            reference: "zlib/1.3".to_string(),
            kind: "recipe".to_string(),
        }));
        assert_eq!(err.exit_code(), exit_codes::INPUT_ERROR);
        assert!(err.to_string().starts_with("There are no artifacts for the zlib/1.3 recipe."));

        let io = CliError::from(CoreError::Io(std::io::Error::other("disk full")));
        assert_eq!(io.exit_code(), exit_codes::IO_ERROR);
    }
}
