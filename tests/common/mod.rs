#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use llm_connectors::http::{HttpRequest, HttpResponse, HttpTransport};
use llm_connectors::{LLMError, TransportErrorKind};
use serde_json::Value;
use tokio::time::Instant;

/// Replays scripted replies in order and records every request it receives.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<HttpResponse, LLMError>>>,
    seen: Mutex<Vec<(Instant, HttpRequest)>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_json(&self, status: u16, body: Value) -> &Self {
        self.push(Ok(HttpResponse {
            status,
            headers: HashMap::from([("x-request-id".to_string(), format!("req_{status}"))]),
            body: body.to_string().into_bytes(),
        }))
    }

    pub fn push_with_headers(&self, status: u16, headers: &[(&str, &str)], body: &str) -> &Self {
        self.push(Ok(HttpResponse {
            status,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: body.as_bytes().to_vec(),
        }))
    }

    pub fn push_transport_error(&self, kind: TransportErrorKind) -> &Self {
        self.push(Err(LLMError::transport(kind, format!("simulated {kind}"))))
    }

    fn push(&self, reply: Result<HttpResponse, LLMError>) -> &Self {
        self.replies.lock().expect("lock").push_back(reply);
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.seen
            .lock()
            .expect("lock")
            .iter()
            .map(|(_, request)| request.clone())
            .collect()
    }

    pub fn request_times(&self) -> Vec<Instant> {
        self.seen.lock().expect("lock").iter().map(|(at, _)| *at).collect()
    }

    pub fn request_count(&self) -> usize {
        self.seen.lock().expect("lock").len()
    }

    pub fn body_of(&self, index: usize) -> Value {
        let requests = self.requests();
        serde_json::from_slice(&requests[index].body).expect("request body is json")
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, LLMError> {
        self.seen.lock().expect("lock").push((Instant::now(), request));
        self.replies
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or_else(|| panic!("no scripted reply left"))
    }
}
