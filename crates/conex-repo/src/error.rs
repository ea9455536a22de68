//! Error types for server operations

use thiserror::Error;

/// Artifactory and Status Page operation errors
#[derive(Debug, Error)]
pub enum RepoError {
    // ============ Configuration Errors ============
    #[error("{label} '{name}' ({url}) already exist. You can remove it using `conex {command} remove {name}`")]
    ProfileAlreadyExists {
        label: &'static str,
        command: &'static str,
        name: String,
        url: String,
    },

    #[error("{label} '{name}' does not exist.")]
    ProfileNotFound { label: &'static str, name: String },

    #[error(
        "The {command} specified ({name}) is not configured. Use `conex {command} add {name}` to configure it."
    )]
    ProfileNotConfigured { command: &'static str, name: String },

    #[error("{message}")]
    InvalidConnection { message: String },

    #[error("Invalid URL: {url} - {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    // ============ HTTP Status Errors ============
    #[error("{message}")]
    BadRequest { message: String },

    #[error("{message}")]
    Unauthorized { message: String },

    #[error("{message}")]
    Forbidden { message: String },

    #[error("{message}")]
    NotFound { message: String },

    #[error("{message}")]
    UnexpectedResponse { status: u16, message: String },

    #[error("Rate limited by server. Retry after {retry_after} seconds")]
    RateLimited { retry_after: u64 },

    // ============ Network Errors ============
    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Request timeout after {seconds}s")]
    Timeout { seconds: u64 },

    // ============ Artifactory Errors ============
    #[error(
        "Direct graph promotion is only supported in Artifactory Pro. As an alternative, use conan download + conan upload with the pkglist feature"
    )]
    UnsupportedEdition { license: String },

    #[error("Build {name}/{number} not found")]
    BuildNotFound { name: String, number: String },

    // ============ Status Page Errors ============
    #[error("Status Page API token is required.")]
    MissingToken,

    #[error("{message}")]
    InvalidSchedule { message: String },

    // ============ IO Errors ============
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Core(#[from] conex_core::CoreError),

    // ============ Other ============
    #[error("{0}")]
    Other(String),
}

/// Result type for server operations
pub type Result<T> = std::result::Result<T, RepoError>;

impl RepoError {
    /// Whether the server answered 404
    pub fn is_not_found(&self) -> bool {
        matches!(self, RepoError::NotFound { .. })
    }

    /// Map a failed response status to an error, or `None` on success
    pub fn from_status(status: u16, message: String) -> Option<Self> {
        match status {
            200..=299 => None,
            400 => Some(RepoError::BadRequest { message }),
            401 => Some(RepoError::Unauthorized { message }),
            403 => Some(RepoError::Forbidden { message }),
            404 => Some(RepoError::NotFound { message }),
            _ => Some(RepoError::UnexpectedResponse { status, message }),
        }
    }
}

/// Human message of a response body
///
/// Artifactory JSON errors (`{"errors": [{"status", "message"}]}`) become
/// `"<status>: <message>"` and HTML pages become `"<code>: <reason>"`.
pub fn response_message(status: u16, reason: &str, content_type: Option<&str>, body: &str) -> String {
    let content_type = content_type.unwrap_or_default();
    if content_type.starts_with("application/json") {
        let first = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("errors")?.get(0).cloned());
        if let Some(error) = first {
            if let (Some(code), Some(message)) = (error.get("status"), error.get("message")) {
                let message = message.as_str().map(String::from).unwrap_or_else(|| message.to_string());
                return format!("{}: {}", code, message);
            }
        }
    } else if content_type.contains("text/html") {
        return format!("{}: {}", status, reason);
    }
    body.to_string()
}

impl From<reqwest::Error> for RepoError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RepoError::Timeout { seconds: 30 }
        } else if e.is_connect() {
            RepoError::NetworkError {
                message: format!("Connection failed: {}", e),
            }
        } else if let Some(status) = e.status() {
            RepoError::UnexpectedResponse {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            RepoError::NetworkError {
                message: e.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(e: serde_json::Error) -> Self {
        RepoError::Serialization(e.to_string())
    }
}

impl From<base64::DecodeError> for RepoError {
    fn from(e: base64::DecodeError) -> Self {
        RepoError::InvalidConfig {
            message: format!("profile file is not valid base64: {}", e),
        }
    }
}

impl From<url::ParseError> for RepoError {
    fn from(e: url::ParseError) -> Self {
        RepoError::InvalidUrl {
            url: String::new(),
            reason: e.to_string(),
        }
    }
}
