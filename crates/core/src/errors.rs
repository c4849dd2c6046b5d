use std::path::PathBuf;

/// Result type alias for warden operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for warden operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing, malformed, expired or mis-signed credential
    #[error("{message}")]
    Unauthorized { message: String },

    /// Resource outside an allow-list, or an operation the caller may not perform
    #[error("{message}")]
    Forbidden { resource: String, message: String },

    /// Well-formed request that is missing or carries an invalid parameter
    #[error("{message}")]
    BadRequest { message: String },

    /// Resource key with no matching definition
    #[error("{message}")]
    NotFound { resource: String, message: String },

    /// Request conflicts with the agent's current state
    #[error("{message}")]
    Conflict { message: String },

    /// Caller exceeded its request quota
    #[error("rate limit exceeded")]
    RateLimited,

    /// A collaborator that is disabled or unreachable
    #[error("{feature} not available: {message}")]
    Unavailable { feature: String, message: String },

    /// Configuration errors
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// File system operations
    #[error("file system {operation} operation failed for '{path}': {source}")]
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },

    /// Command execution errors
    #[error("{}", format_command_error(.command, .message, .exit_code))]
    CommandExecution {
        command: String,
        message: String,
        exit_code: Option<i32>,
    },

    /// Operation timeout errors
    #[error("operation '{operation}' timed out after {duration:?}")]
    Timeout {
        operation: String,
        duration: std::time::Duration,
    },

    /// Anything else that should never reach a caller verbatim
    #[error("internal error: {message}")]
    Internal { message: String },
}

/// Coarse classification that decides how a failure is reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    RateLimited,
    Unavailable,
    Internal,
}

fn format_command_error(command: &str, message: &str, exit_code: &Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("command '{command}' failed with exit code {code}: {message}"),
        None => format!("command '{command}' failed: {message}"),
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::FileSystem {
            path: PathBuf::new(),
            operation: "unknown".to_string(),
            source: error,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Json {
            message: error.to_string(),
            source: error,
        }
    }
}

impl Error {
    /// Classify this error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Unauthorized { .. } => ErrorKind::Unauthorized,
            Error::Forbidden { .. } => ErrorKind::Forbidden,
            Error::BadRequest { .. } => ErrorKind::BadRequest,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::Conflict { .. } => ErrorKind::Conflict,
            Error::RateLimited => ErrorKind::RateLimited,
            Error::Unavailable { .. } => ErrorKind::Unavailable,
            Error::Configuration { .. }
            | Error::FileSystem { .. }
            | Error::Json { .. }
            | Error::CommandExecution { .. }
            | Error::Timeout { .. }
            | Error::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Message safe to hand back to a remote caller.
    ///
    /// Internal failures collapse to a generic string; their detail belongs in
    /// the operator log only.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => "internal server error".to_string(),
            _ => self.to_string(),
        }
    }

    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Error::Unauthorized {
            message: message.into(),
        }
    }

    /// Create a forbidden error naming the rejected resource
    #[must_use]
    pub fn forbidden(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Forbidden {
            resource: resource.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Error::BadRequest {
            message: message.into(),
        }
    }

    /// Create a not-found error naming the missing resource
    #[must_use]
    pub fn not_found(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Error::NotFound {
            resource: resource.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Error::Conflict {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn unavailable(feature: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Unavailable {
            feature: feature.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Create a file system error with context
    #[must_use]
    pub fn file_system(
        path: impl Into<PathBuf>,
        operation: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Error::FileSystem {
            path: path.into(),
            operation: operation.into(),
            source,
        }
    }

    /// Create a command execution error
    #[must_use]
    pub fn command_execution(
        command: impl Into<String>,
        message: impl Into<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Error::CommandExecution {
            command: command.into(),
            message: message.into(),
            exit_code,
        }
    }

    /// Create a timeout error
    #[must_use]
    pub fn timeout(operation: impl Into<String>, duration: std::time::Duration) -> Self {
        Error::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal {
            message: message.into(),
        }
    }
}
