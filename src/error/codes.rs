/// Error code registry
///
/// Error codes are organized by category:
/// - 1000-1999: Configuration errors
/// - 2000-2999: Transport errors
/// - 3000-3999: Authentication errors
/// - 4000-4999: Validation errors
/// - 5000-5999: Storage errors
/// - 9000-9999: Other errors
#[allow(dead_code)]
pub struct ErrorCode;

impl ErrorCode {
    // Configuration errors (1000-1999)
    pub const CONFIG_GENERIC: u16 = 1000;
    pub const CONFIG_NOT_FOUND: u16 = 1001;
    pub const CONFIG_INVALID_TOML: u16 = 1002;
    pub const CONFIG_MISSING_REQUIRED: u16 = 1004;
    pub const CONFIG_INVALID_VALUE: u16 = 1005;

    // Transport errors (2000-2999)
    pub const TRANSPORT_GENERIC: u16 = 2000;
    pub const TRANSPORT_CONNECT: u16 = 2001;
    pub const TRANSPORT_TIMEOUT: u16 = 2002;
    pub const TRANSPORT_STATUS: u16 = 2003;
    pub const TRANSPORT_CLIENT_BUILD: u16 = 2004;
    pub const TRANSPORT_BODY: u16 = 2005;

    // Authentication errors (3000-3999)
    pub const AUTH_GENERIC: u16 = 3000;
    pub const AUTH_TOKEN_MISSING: u16 = 3001;
    pub const AUTH_UNEXPECTED_RESPONSE: u16 = 3002;
    pub const AUTH_PROVIDER_STATUS: u16 = 3003;
    pub const AUTH_INVALID_CREDENTIALS: u16 = 3004;
    pub const AUTH_STEP_LIMIT: u16 = 3005;
    pub const AUTH_ASSERTION_REJECTED: u16 = 3006;

    // Validation errors (4000-4999)
    pub const VALIDATION_GENERIC: u16 = 4000;
    pub const VALIDATION_REQUIRED_FIELD: u16 = 4001;
    pub const VALIDATION_MISSING_COLUMN: u16 = 4002;
    pub const VALIDATION_INVALID_DATA: u16 = 4003;

    // Storage errors (5000-5999)
    pub const STORAGE_GENERIC: u16 = 5000;
    pub const STORAGE_IO_ERROR: u16 = 5001;
    pub const STORAGE_NOT_FOUND: u16 = 5002;
    pub const STORAGE_PERMISSION_DENIED: u16 = 5003;
    pub const STORAGE_SERIALIZATION_ERROR: u16 = 5004;

    // Other errors (9000-9999)
    pub const OTHER_GENERIC: u16 = 9000;
}

/// Describe an error code in human-readable terms
pub fn describe_error_code(code: u16) -> &'static str {
    match code {
        ErrorCode::CONFIG_GENERIC => "General configuration error",
        ErrorCode::CONFIG_NOT_FOUND => "Configuration file not found",
        ErrorCode::CONFIG_INVALID_TOML => "Invalid TOML syntax in configuration",
        ErrorCode::CONFIG_MISSING_REQUIRED => "Required configuration value missing",
        ErrorCode::CONFIG_INVALID_VALUE => "Invalid configuration value",

        ErrorCode::TRANSPORT_GENERIC => "General network error",
        ErrorCode::TRANSPORT_CONNECT => "Could not connect to the remote host",
        ErrorCode::TRANSPORT_TIMEOUT => "Request timed out",
        ErrorCode::TRANSPORT_STATUS => "Server answered with an error status",
        ErrorCode::TRANSPORT_CLIENT_BUILD => "HTTP client could not be built",
        ErrorCode::TRANSPORT_BODY => "Response body could not be read",

        ErrorCode::AUTH_GENERIC => "General authentication error",
        ErrorCode::AUTH_TOKEN_MISSING => "Required login token not found",
        ErrorCode::AUTH_UNEXPECTED_RESPONSE => "Unexpected identity provider response",
        ErrorCode::AUTH_PROVIDER_STATUS => "Identity provider returned an error status",
        ErrorCode::AUTH_INVALID_CREDENTIALS => "Invalid username or password",
        ErrorCode::AUTH_STEP_LIMIT => "Login did not finish within the step limit",
        ErrorCode::AUTH_ASSERTION_REJECTED => "Service rejected the SAML assertion",

        ErrorCode::VALIDATION_GENERIC => "General validation error",
        ErrorCode::VALIDATION_REQUIRED_FIELD => "Required field missing",
        ErrorCode::VALIDATION_MISSING_COLUMN => "Required column missing from input",
        ErrorCode::VALIDATION_INVALID_DATA => "Invalid input data",

        ErrorCode::STORAGE_GENERIC => "General storage error",
        ErrorCode::STORAGE_IO_ERROR => "I/O operation failed",
        ErrorCode::STORAGE_NOT_FOUND => "File not found",
        ErrorCode::STORAGE_PERMISSION_DENIED => "Permission denied",
        ErrorCode::STORAGE_SERIALIZATION_ERROR => "Serialization failed",

        _ => "Unknown error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_ranges_are_describable() {
        assert_eq!(
            describe_error_code(ErrorCode::AUTH_INVALID_CREDENTIALS),
            "Invalid username or password"
        );
        assert_eq!(describe_error_code(ErrorCode::TRANSPORT_STATUS), "Server answered with an error status");
        assert_eq!(describe_error_code(4242), "Unknown error");
    }
}
