use std::sync::Arc;
use tracing::{debug, trace};

use super::transport::{HttpRequest, HttpResponse, HttpTransport};
use crate::error::{PipelineError, Result};
use crate::retry::{retry_with_backoff, RetryPolicy, Sleeper, TokioSleeper};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    Authenticated,
}

/// A cookie-carrying client plus the retry policy applied to every call.
///
/// The transport is fixed at construction, so every request of a run,
/// before and after login, goes through the same cookie jar.
pub struct Session {
    transport: Arc<dyn HttpTransport>,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    state: SessionState,
    user_token: Option<String>,
}

impl Session {
    pub fn new(transport: Arc<dyn HttpTransport>, retry: RetryPolicy) -> Self {
        Self {
            transport,
            retry,
            sleeper: Arc::new(TokioSleeper),
            state: SessionState::Anonymous,
            user_token: None,
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == SessionState::Authenticated
    }

    /// Token the service expects in the `X-UserToken` header
    pub fn user_token(&self) -> Option<&str> {
        self.user_token.as_deref()
    }

    pub(crate) fn mark_authenticated(&mut self, user_token: Option<String>) {
        self.state = SessionState::Authenticated;
        self.user_token = user_token;
    }

    /// Send a request, retrying failures to reach the server. Any status the
    /// server answers with is returned to the caller.
    pub async fn send(&self, label: &str, request: HttpRequest) -> Result<HttpResponse> {
        debug!(
            "{}: {} {} headers={:?}",
            label,
            request.method,
            request.url,
            request.redacted_headers()
        );
        let response = retry_with_backoff(
            &self.retry,
            self.sleeper.as_ref(),
            label,
            PipelineError::is_transient,
            |_| self.transport.send(request.clone()),
        )
        .await?;
        trace!("{}: status {} from {}", label, response.status, response.url);
        Ok(response)
    }

    /// Like [`Session::send`], but an error status is a transport failure
    /// and goes through the retry policy too.
    pub async fn send_checked(&self, label: &str, request: HttpRequest) -> Result<HttpResponse> {
        debug!(
            "{}: {} {} headers={:?}",
            label,
            request.method,
            request.url,
            request.redacted_headers()
        );
        retry_with_backoff(
            &self.retry,
            self.sleeper.as_ref(),
            label,
            PipelineError::is_transient,
            |_| {
                let request = request.clone();
                async move {
                    let response = self.transport.send(request).await?;
                    if response.is_success() {
                        Ok(response)
                    } else {
                        Err(PipelineError::http_status(response.status, response.url))
                    }
                }
            },
        )
        .await
    }
}
