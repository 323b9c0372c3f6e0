//! Test double for the HTTP layer.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use client::{ClientError, RawResponse, RequestOptions, Requester};
use nodes::{ExecutionContext, ItemParameters};
use serde_json::{json, Value};

/// Records every request and answers with queued responses (`{}` once the
/// queue runs dry, an empty body for raw calls).
pub(crate) struct RecordingClient {
    responses: Mutex<VecDeque<Result<Value, ClientError>>>,
    raw_responses: Mutex<VecDeque<RawResponse>>,
    requests: Mutex<Vec<RequestOptions>>,
    user_key: String,
}

impl RecordingClient {
    pub(crate) fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            raw_responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            user_key: "credential-user".into(),
        }
    }

    pub(crate) fn respond(self, value: Value) -> Self {
        self.responses.lock().unwrap().push_back(Ok(value));
        self
    }

    pub(crate) fn respond_raw(self, content_type: &str, disposition: Option<&str>, body: &[u8]) -> Self {
        self.raw_responses.lock().unwrap().push_back(RawResponse {
            content_type: Some(content_type.to_owned()),
            content_disposition: disposition.map(str::to_owned),
            body: body.to_vec(),
        });
        self
    }

    pub(crate) fn fail(self, err: ClientError) -> Self {
        self.responses.lock().unwrap().push_back(Err(err));
        self
    }

    pub(crate) fn requests(&self) -> Vec<RequestOptions> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn only_request(&self) -> RequestOptions {
        let requests = self.requests();
        assert_eq!(requests.len(), 1, "expected exactly one request");
        requests[0].clone()
    }
}

#[async_trait]
impl Requester for RecordingClient {
    async fn request(&self, options: RequestOptions) -> Result<Value, ClientError> {
        self.requests.lock().unwrap().push(options);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(json!({})))
    }

    async fn request_raw(&self, options: RequestOptions) -> Result<RawResponse, ClientError> {
        self.requests.lock().unwrap().push(options);
        let mut responses = self.responses.lock().unwrap();
        if matches!(responses.front(), Some(Err(_))) {
            if let Some(Err(err)) = responses.pop_front() {
                return Err(err);
            }
        }
        drop(responses);
        Ok(self.raw_responses.lock().unwrap().pop_front().unwrap_or(RawResponse {
            content_type: None,
            content_disposition: None,
            body: Vec::new(),
        }))
    }

    fn user_key(&self) -> &str {
        &self.user_key
    }
}

/// One-item context over `params` talking to `client`.
pub(crate) fn context(params: Value, client: &Arc<RecordingClient>) -> ExecutionContext {
    context_with_item(json!({}), params, client)
}

/// Like [`context`], with `item` as the single input item.
pub(crate) fn context_with_item(item: Value, params: Value, client: &Arc<RecordingClient>) -> ExecutionContext {
    let params = ItemParameters::from_value(params).unwrap();
    ExecutionContext::new(vec![item], Arc::new(params)).with_client(client.clone())
}
