use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info};

use crate::error::{common, Result};

/// The requests of the login exchange, in the order they are issued
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LoginStep {
    ProtectedResource,
    LoginPage,
    CredentialTypeProbe,
    StatusProbe,
    CredentialSubmit,
    KeepMeSignedIn,
    AssertionPost,
}

impl LoginStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoginStep::ProtectedResource => "protected resource",
            LoginStep::LoginPage => "login page",
            LoginStep::CredentialTypeProbe => "credential type probe",
            LoginStep::StatusProbe => "status probe",
            LoginStep::CredentialSubmit => "credential submit",
            LoginStep::KeepMeSignedIn => "keep me signed in",
            LoginStep::AssertionPost => "assertion post",
        }
    }
}

impl fmt::Display for LoginStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical token names, as echoed back to the identity provider
pub mod names {
    pub const FLOW_TOKEN: &str = "flowToken";
    pub const CANARY: &str = "canary";
    pub const API_CANARY: &str = "apiCanary";
    pub const CTX: &str = "ctx";
    pub const REQUEST_ID: &str = "hpgrequestid";
    pub const TENANT: &str = "tenant";
    pub const CORRELATION_ID: &str = "correlationId";
}

/// Steps that consume a token
pub fn consumers(name: &str) -> &'static [LoginStep] {
    use LoginStep::*;
    match name {
        names::FLOW_TOKEN => &[CredentialTypeProbe, CredentialSubmit, KeepMeSignedIn],
        names::CANARY | names::CTX | names::REQUEST_ID => &[CredentialSubmit, KeepMeSignedIn],
        names::API_CANARY | names::CORRELATION_ID => &[CredentialTypeProbe, StatusProbe],
        names::TENANT => &[CredentialSubmit],
        _ => &[],
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub name: String,
    pub value: String,
    /// Response the current value was taken from
    pub source: LoginStep,
    pub required_by: &'static [LoginStep],
    /// Incremented each time a newer value supersedes the old one
    pub generation: u32,
}

/// Tokens carried from one login step to the next.
///
/// A newer value for a token replaces the older one for every following
/// step. Values seen in informational responses are kept apart and never
/// replace anything.
#[derive(Debug, Clone, Default)]
pub struct TokenSet {
    tokens: BTreeMap<String, Token>,
    observed: Vec<(String, LoginStep)>,
}

impl TokenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value taken from `source`, superseding any older value.
    /// Returns true when an existing value was replaced by a different one.
    pub fn record(&mut self, name: &str, value: impl Into<String>, source: LoginStep) -> bool {
        let value = value.into();
        match self.tokens.get_mut(name) {
            Some(existing) if existing.value == value => {
                existing.source = source;
                false
            }
            Some(existing) => {
                existing.value = value;
                existing.source = source;
                existing.generation += 1;
                debug!(
                    "Token '{}' superseded by {} (generation {})",
                    name, source, existing.generation
                );
                true
            }
            None => {
                debug!("Token '{}' captured from {}", name, source);
                self.tokens.insert(
                    name.to_string(),
                    Token {
                        name: name.to_string(),
                        value,
                        source,
                        required_by: consumers(name),
                        generation: 0,
                    },
                );
                false
            }
        }
    }

    /// Note a value seen in a response whose tokens are informational only
    pub fn observe(&mut self, name: &str, source: LoginStep) {
        info!(
            "Response of {} carried '{}'; keeping the stored value",
            source, name
        );
        self.observed.push((name.to_string(), source));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.tokens.get(name).map(|t| t.value.as_str())
    }

    pub fn token(&self, name: &str) -> Option<&Token> {
        self.tokens.get(name)
    }

    /// A token the given step cannot do without
    pub fn require(&self, name: &str, step: LoginStep) -> Result<&str> {
        self.get(name)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| common::token_missing(name, step.as_str()))
    }

    pub fn observed(&self) -> &[(String, LoginStep)] {
        &self.observed
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tokens.keys().map(String::as_str)
    }
}
