use super::{ErrorCode, PipelineError};
use std::path::Path;

/// Extension trait for convenient error conversion
pub trait ErrorExt<T> {
    /// Convert to PipelineError with context
    fn to_pipeline(self, context: impl Into<String>) -> Result<T, PipelineError>;

    /// Convert to PipelineError with specific error type
    fn to_config_error(self, message: impl Into<String>) -> Result<T, PipelineError>;
    fn to_storage_error(self, message: impl Into<String>) -> Result<T, PipelineError>;
    fn to_auth_error(self, message: impl Into<String>) -> Result<T, PipelineError>;
}

impl<T, E> ErrorExt<T> for Result<T, E>
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    fn to_pipeline(self, context: impl Into<String>) -> Result<T, PipelineError> {
        self.map_err(|e| PipelineError::other(context).with_source(e))
    }

    fn to_config_error(self, message: impl Into<String>) -> Result<T, PipelineError> {
        self.map_err(|e| PipelineError::config(message).with_source(e))
    }

    fn to_storage_error(self, message: impl Into<String>) -> Result<T, PipelineError> {
        self.map_err(|e| PipelineError::storage(message).with_source(e))
    }

    fn to_auth_error(self, message: impl Into<String>) -> Result<T, PipelineError> {
        self.map_err(|e| {
            PipelineError::authentication_with_code(
                ErrorCode::AUTH_UNEXPECTED_RESPONSE,
                message,
                None,
            )
            .with_source(e)
        })
    }
}

/// Helper functions for common error scenarios
pub mod common {
    use super::*;

    /// Configuration file given explicitly but absent
    pub fn config_not_found(path: impl AsRef<Path>) -> PipelineError {
        PipelineError::config_with_code(
            ErrorCode::CONFIG_NOT_FOUND,
            format!("Configuration file not found: {}", path.as_ref().display()),
            None,
        )
    }

    /// A required setting has no value from any source
    pub fn missing_setting(key: &str, hint: &str) -> PipelineError {
        PipelineError::config_with_code(
            ErrorCode::CONFIG_MISSING_REQUIRED,
            format!("'{}' is required ({})", key, hint),
            Some(key.to_string()),
        )
    }

    /// A setting has a value that cannot be used
    pub fn invalid_setting(key: &str, reason: impl Into<String>) -> PipelineError {
        PipelineError::config_with_code(
            ErrorCode::CONFIG_INVALID_VALUE,
            reason,
            Some(key.to_string()),
        )
    }

    /// A token the next login step depends on could not be found
    pub fn token_missing(token: &str, step: &str) -> PipelineError {
        PipelineError::authentication_with_code(
            ErrorCode::AUTH_TOKEN_MISSING,
            format!("required token '{}' was not found", token),
            Some(step.to_string()),
        )
    }

    /// The identity provider answered with an error status
    pub fn provider_status(status: u16, step: &str) -> PipelineError {
        PipelineError::authentication_with_code(
            ErrorCode::AUTH_PROVIDER_STATUS,
            format!("identity provider answered with status {}", status),
            Some(step.to_string()),
        )
    }

    /// Create a validation error for a missing field
    pub fn missing_required_field(field: &str) -> PipelineError {
        PipelineError::validation_with_code(
            ErrorCode::VALIDATION_REQUIRED_FIELD,
            format!("Required field '{}' is missing or empty", field),
            Some(field.to_string()),
        )
    }

    /// Create a storage error for a file that could not be written
    pub fn write_failed(path: impl AsRef<Path>, err: std::io::Error) -> PipelineError {
        PipelineError::storage_with_code(
            ErrorCode::STORAGE_IO_ERROR,
            format!("Could not write {}", path.as_ref().display()),
            Some(path.as_ref().to_path_buf()),
        )
        .with_source(err)
    }

    /// Create a storage error for a file that could not be read
    pub fn read_failed(path: impl AsRef<Path>, err: std::io::Error) -> PipelineError {
        let code = if err.kind() == std::io::ErrorKind::NotFound {
            ErrorCode::STORAGE_NOT_FOUND
        } else {
            ErrorCode::STORAGE_IO_ERROR
        };
        PipelineError::storage_with_code(
            code,
            format!("Could not read {}", path.as_ref().display()),
            Some(path.as_ref().to_path_buf()),
        )
        .with_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_extension_trait() {
        let io_result: Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "test"));

        let err = io_result
            .to_storage_error("Failed to open file")
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::STORAGE_GENERIC);
    }

    #[test]
    fn test_common_error_helpers() {
        let err = common::missing_setting("sso.homepage_url", "set SNOW_HOMEPAGE_URL");
        assert_eq!(err.code(), ErrorCode::CONFIG_MISSING_REQUIRED);
        assert!(err.user_message().contains("sso.homepage_url"));

        let err = common::token_missing("sFT", "login page");
        assert_eq!(err.code(), ErrorCode::AUTH_TOKEN_MISSING);
        assert_eq!(err.exit_code(), 4);

        let err = common::read_failed(
            "missing.csv",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.code(), ErrorCode::STORAGE_NOT_FOUND);
    }
}
