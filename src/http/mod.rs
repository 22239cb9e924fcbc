//! HTTP plumbing shared by the login flow and the report fetcher

pub mod client;
pub mod mock;
pub mod session;
pub mod transport;

pub use client::ReqwestTransport;
pub use mock::MockTransport;
pub use session::{Session, SessionState};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Method, RequestBody};

use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::error::Result;

/// Build the production session for a run
pub fn production_session(config: &PipelineConfig) -> Result<Session> {
    let transport = ReqwestTransport::from_config(config)?;
    Ok(Session::new(Arc::new(transport), config.retry.policy()?))
}
