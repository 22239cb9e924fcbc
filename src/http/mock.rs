use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::transport::{HttpRequest, HttpResponse, HttpTransport};
use crate::error::{PipelineError, Result};

/// Scripted transport: answers requests from a queue and keeps every
/// request it was sent.
#[derive(Clone, Default)]
pub struct MockTransport {
    responses: Arc<Mutex<VecDeque<Result<HttpResponse>>>>,
    call_history: Arc<Mutex<Vec<HttpRequest>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for the next unanswered request
    pub fn push_response(&self, response: HttpResponse) -> &Self {
        self.responses.lock().unwrap().push_back(Ok(response));
        self
    }

    /// Queue a transport failure for the next unanswered request
    pub fn push_error(&self, error: PipelineError) -> &Self {
        self.responses.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn call_count(&self) -> usize {
        self.call_history.lock().unwrap().len()
    }

    pub fn get_call_history(&self) -> Vec<HttpRequest> {
        self.call_history.lock().unwrap().clone()
    }

    /// Requests whose URL contains `fragment`
    pub fn calls_to(&self, fragment: &str) -> Vec<HttpRequest> {
        self.call_history
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url.contains(fragment))
            .cloned()
            .collect()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let url = request.url.clone();
        self.call_history.lock().unwrap().push(request);

        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(mut response)) => {
                if response.url.is_empty() {
                    response.url = url;
                }
                Ok(response)
            }
            Some(Err(err)) => Err(err),
            None => Err(PipelineError::transport(format!(
                "no scripted response left for {}",
                url
            ))),
        }
    }
}
