use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use crate::http_client::{HttpClient, HttpError, HttpRequest, HttpResponse};
use crate::{Symbol, UtcDateTime};

/// Replays queued responses in order and records every request.
#[derive(Debug)]
pub(crate) struct ScriptedHttpClient {
    responses: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedHttpClient {
    pub(crate) fn new(responses: Vec<Result<HttpResponse, HttpError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn recorded_requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .expect("request store should not be poisoned")
            .clone()
    }
}

impl HttpClient for ScriptedHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        self.requests
            .lock()
            .expect("request store should not be poisoned")
            .push(request);
        let response = self
            .responses
            .lock()
            .expect("response queue should not be poisoned")
            .pop_front()
            .unwrap_or_else(|| Err(HttpError::non_retryable("no scripted response left")));
        Box::pin(async move { response })
    }
}

pub(crate) fn symbol(raw: &str) -> Symbol {
    Symbol::parse(raw).expect("valid symbol")
}

pub(crate) fn at(raw: &str) -> UtcDateTime {
    UtcDateTime::parse(raw).expect("valid timestamp")
}
