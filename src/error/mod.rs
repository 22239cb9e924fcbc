use std::fmt::Display;
use std::path::PathBuf;
use thiserror::Error;

pub mod codes;
pub mod helpers;

pub use codes::{describe_error_code, ErrorCode};
pub use helpers::{common, ErrorExt};

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// The unified error type for the whole pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("[E{code:04}] Configuration error: {message}")]
    Configuration {
        code: u16,
        message: String,
        key: Option<String>,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Transport error: {message}")]
    Transport {
        code: u16,
        message: String,
        url: Option<String>,
        status: Option<u16>,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Authentication error: {message}")]
    Authentication {
        code: u16,
        message: String,
        step: Option<String>,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Validation error: {message}")]
    Validation {
        code: u16,
        message: String,
        row: Option<usize>,
        field: Option<String>,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Storage error: {message}")]
    Storage {
        code: u16,
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] {message}")]
    Other {
        code: u16,
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },
}

impl PipelineError {
    /// Create a configuration error with default code
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            code: ErrorCode::CONFIG_GENERIC,
            message: message.into(),
            key: None,
            source: None,
        }
    }

    /// Create a configuration error with specific code and offending key
    pub fn config_with_code(code: u16, message: impl Into<String>, key: Option<String>) -> Self {
        Self::Configuration {
            code,
            message: message.into(),
            key,
            source: None,
        }
    }

    /// Create a transport error with default code
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            code: ErrorCode::TRANSPORT_GENERIC,
            message: message.into(),
            url: None,
            status: None,
            source: None,
        }
    }

    /// Create a transport error with specific code and target URL
    pub fn transport_with_code(code: u16, message: impl Into<String>, url: Option<String>) -> Self {
        Self::Transport {
            code,
            message: message.into(),
            url,
            status: None,
            source: None,
        }
    }

    /// Create a transport error for an error status answered by a server
    pub fn http_status(status: u16, url: impl Into<String>) -> Self {
        let url = url.into();
        Self::Transport {
            code: ErrorCode::TRANSPORT_STATUS,
            message: format!("HTTP {} from {}", status, url),
            url: Some(url),
            status: Some(status),
            source: None,
        }
    }

    /// Create an authentication error with default code
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            code: ErrorCode::AUTH_GENERIC,
            message: message.into(),
            step: None,
            source: None,
        }
    }

    /// Create an authentication error with specific code and login step
    pub fn authentication_with_code(
        code: u16,
        message: impl Into<String>,
        step: Option<String>,
    ) -> Self {
        Self::Authentication {
            code,
            message: message.into(),
            step,
            source: None,
        }
    }

    /// Create a validation error with default code
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            code: ErrorCode::VALIDATION_GENERIC,
            message: message.into(),
            row: None,
            field: None,
            source: None,
        }
    }

    /// Create a validation error with specific code and field
    pub fn validation_with_code(
        code: u16,
        message: impl Into<String>,
        field: Option<String>,
    ) -> Self {
        Self::Validation {
            code,
            message: message.into(),
            row: None,
            field,
            source: None,
        }
    }

    /// Create a storage error with default code
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            code: ErrorCode::STORAGE_GENERIC,
            message: message.into(),
            path: None,
            source: None,
        }
    }

    /// Create a storage error with specific code and path
    pub fn storage_with_code(code: u16, message: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self::Storage {
            code,
            message: message.into(),
            path,
            source: None,
        }
    }

    /// Create a generic other error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            code: ErrorCode::OTHER_GENERIC,
            message: message.into(),
            source: None,
        }
    }

    /// Add a source error to this error
    pub fn with_source(mut self, source: impl Into<BoxedSource>) -> Self {
        match &mut self {
            Self::Configuration { source: src, .. }
            | Self::Transport { source: src, .. }
            | Self::Authentication { source: src, .. }
            | Self::Validation { source: src, .. }
            | Self::Storage { source: src, .. }
            | Self::Other { source: src, .. } => {
                *src = Some(source.into());
            }
        }
        self
    }

    /// Prefix the error message with context
    pub fn with_context(mut self, context: impl Display) -> Self {
        match &mut self {
            Self::Configuration { message, .. }
            | Self::Transport { message, .. }
            | Self::Authentication { message, .. }
            | Self::Validation { message, .. }
            | Self::Storage { message, .. }
            | Self::Other { message, .. } => {
                *message = format!("{}: {}", context, message);
            }
        }
        self
    }

    /// Set the login step for an authentication error
    pub fn with_step(mut self, step: impl Into<String>) -> Self {
        if let Self::Authentication { step: ref mut s, .. } = self {
            *s = Some(step.into());
        }
        self
    }

    /// Set the data row (1-based) for a validation error
    pub fn with_row(mut self, row: usize) -> Self {
        if let Self::Validation { row: ref mut r, .. } = self {
            *r = Some(row);
        }
        self
    }

    /// Set the path for a storage error
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        if let Self::Storage { path: ref mut p, .. } = self {
            *p = Some(path.into());
        }
        self
    }

    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration { .. } => 2,
            Self::Transport { .. } => 3,
            Self::Authentication { .. } => 4,
            Self::Validation { .. } => 5,
            Self::Storage { .. } => 6,
            Self::Other { .. } => 1,
        }
    }

    /// Get the error code
    pub fn code(&self) -> u16 {
        match self {
            Self::Configuration { code, .. }
            | Self::Transport { code, .. }
            | Self::Authentication { code, .. }
            | Self::Validation { code, .. }
            | Self::Storage { code, .. }
            | Self::Other { code, .. } => *code,
        }
    }

    /// HTTP status carried by a transport error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => *status,
            _ => None,
        }
    }

    /// Whether the retry policy may attempt the failed operation again.
    ///
    /// Only transport failures qualify; a failed login leaves the token set
    /// in an unknown state and is never replayed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport { code, .. } if *code != ErrorCode::TRANSPORT_CLIENT_BUILD)
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Configuration { message, key, .. } => {
                if let Some(k) = key {
                    format!("Configuration problem with '{}': {}", k, message)
                } else {
                    format!("Configuration problem: {}", message)
                }
            }
            Self::Transport {
                message, status, ..
            } => {
                if let Some(s) = status {
                    format!("Network request failed ({}): {}", s, message)
                } else {
                    format!("Network request failed: {}", message)
                }
            }
            Self::Authentication { message, step, .. } => {
                if let Some(s) = step {
                    format!("Login failed at step '{}': {}", s, message)
                } else {
                    format!("Login failed: {}", message)
                }
            }
            Self::Validation {
                message,
                row,
                field,
                ..
            } => {
                let mut msg = String::from("Validation error");
                if let Some(r) = row {
                    msg.push_str(&format!(" in row {}", r));
                }
                if let Some(f) = field {
                    msg.push_str(&format!(" for '{}'", f));
                }
                format!("{}: {}", msg, message)
            }
            Self::Storage { message, path, .. } => {
                if let Some(p) = path {
                    format!("Storage error at {}: {}", p.display(), message)
                } else {
                    format!("Storage error: {}", message)
                }
            }
            Self::Other { message, .. } => message.clone(),
        }
    }

    /// Get a developer-friendly message with the full cause chain
    pub fn developer_message(&self) -> String {
        let mut out = self.to_string();
        let mut cause = std::error::Error::source(self);
        while let Some(err) = cause {
            out.push_str(&format!("\n  caused by: {}", err));
            cause = err.source();
        }
        out
    }
}

/// Type alias for Results using PipelineError
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Type alias for application Results (using anyhow for flexibility)
pub type AppResult<T> = anyhow::Result<T>;

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        let (code, message) = match err.kind() {
            ErrorKind::NotFound => (ErrorCode::STORAGE_NOT_FOUND, "File or directory not found"),
            ErrorKind::PermissionDenied => {
                (ErrorCode::STORAGE_PERMISSION_DENIED, "Permission denied")
            }
            _ => (ErrorCode::STORAGE_IO_ERROR, "IO operation failed"),
        };

        PipelineError::storage_with_code(code, message, None).with_source(err)
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::storage_with_code(
            ErrorCode::STORAGE_SERIALIZATION_ERROR,
            "Invalid JSON",
            None,
        )
        .with_source(err)
    }
}

impl From<toml::de::Error> for PipelineError {
    fn from(err: toml::de::Error) -> Self {
        PipelineError::config_with_code(
            ErrorCode::CONFIG_INVALID_TOML,
            format!("Invalid TOML: {}", err.message()),
            None,
        )
        .with_source(err)
    }
}

impl From<csv::Error> for PipelineError {
    fn from(err: csv::Error) -> Self {
        PipelineError::validation_with_code(
            ErrorCode::VALIDATION_INVALID_DATA,
            "Malformed CSV input",
            None,
        )
        .with_source(err)
    }
}

impl From<tera::Error> for PipelineError {
    fn from(err: tera::Error) -> Self {
        PipelineError::other(format!("Template rendering failed: {}", err)).with_source(err)
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        let code = if err.is_timeout() {
            ErrorCode::TRANSPORT_TIMEOUT
        } else if err.is_connect() {
            ErrorCode::TRANSPORT_CONNECT
        } else if err.is_body() || err.is_decode() {
            ErrorCode::TRANSPORT_BODY
        } else if err.is_builder() {
            ErrorCode::TRANSPORT_CLIENT_BUILD
        } else {
            ErrorCode::TRANSPORT_GENERIC
        };
        let url = err.url().map(|u| u.to_string());
        let status = err.status().map(|s| s.as_u16());
        PipelineError::Transport {
            code,
            message: err.to_string(),
            url,
            status,
            source: Some(Box::new(err)),
        }
    }
}
