//! Replaying a browser's SAML login against the identity provider

pub mod acquirer;
pub mod extractor;
pub mod payload;
pub mod saml_request;
pub mod tokens;

pub use acquirer::{AcquirerSettings, SessionAcquirer};
pub use extractor::{RegexExtractor, SamlAssertion, TokenExtractor, TokenMap};
pub use tokens::{LoginStep, Token, TokenSet};

use std::fmt;

/// Username and password for one login. Never serialized.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    username: String,
    password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_hides_password() {
        let credential = Credential::new("user@example.com", "hunter2");
        let rendered = format!("{:?}", credential);
        assert!(rendered.contains("user@example.com"));
        assert!(!rendered.contains("hunter2"));
    }
}
