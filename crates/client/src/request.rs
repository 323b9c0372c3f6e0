//! Request description and response envelope handling.
//!
//! Every Feishu Project endpoint answers with the same envelope:
//!
//! ```json
//! { "err_code": 0, "err_msg": "", "err": {}, "data": ..., "pagination": ... }
//! ```
//!
//! File downloads are the exception: a successful download is the file
//! itself, so raw responses skip the envelope unless the server answered
//! with JSON.

use std::fmt;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Method, StatusCode};
use serde_json::Value;

use crate::ClientError;

/// MIME type used for uploads that do not declare one.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// One outgoing API call, relative to the credential's base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOptions {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
    pub form: Option<FormData>,
    pub query: Vec<(String, String)>,
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            body: None,
            form: None,
            query: Vec::new(),
            timeout: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Send a multipart form instead of a JSON body.
    pub fn form(mut self, form: FormData) -> Self {
        self.form = Some(form);
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Response timeout in milliseconds; `None` or `Some(0)` disables it.
    pub fn timeout_ms(mut self, millis: Option<u64>) -> Self {
        self.timeout = millis.filter(|&ms| ms > 0).map(Duration::from_millis);
        self
    }
}

/// A file attached to a multipart request under the `file` field.
#[derive(Clone, PartialEq)]
pub struct FilePart {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for FilePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilePart")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Multipart form body. Rebuilt for every send, so a request can be retried.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormData {
    pub file: Option<FilePart>,
    pub fields: Vec<(String, String)>,
}

impl FormData {
    pub fn file(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file: Some(FilePart {
                file_name: file_name.into(),
                mime_type: mime_type.into(),
                bytes,
            }),
            fields: Vec::new(),
        }
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub(crate) fn to_multipart(&self) -> Result<Form, ClientError> {
        let mut form = Form::new();
        if let Some(file) = &self.file {
            let part = Part::bytes(file.bytes.clone())
                .file_name(file.file_name.clone())
                .mime_str(&file.mime_type)?;
            form = form.part("file", part);
        }
        for (name, value) in &self.fields {
            form = form.text(name.clone(), value.clone());
        }
        Ok(form)
    }
}

/// Response as read off the wire, before any envelope handling.
#[derive(Debug, Clone)]
pub(crate) struct HttpReply {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub content_disposition: Option<String>,
    pub body: Vec<u8>,
}

/// Successful raw response body plus the headers that describe it.
#[derive(Clone, PartialEq)]
pub struct RawResponse {
    pub content_type: Option<String>,
    pub content_disposition: Option<String>,
    pub body: Vec<u8>,
}

impl RawResponse {
    /// Whether the server answered with JSON rather than a file.
    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.contains("application/json"))
    }

    /// Bare MIME type from `Content-Type`, without parameters.
    pub fn mime_type(&self) -> Option<String> {
        self.content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .map(str::trim)
            .filter(|ct| !ct.is_empty())
            .map(str::to_owned)
    }

    /// File name from `Content-Disposition`, quotes stripped.
    pub fn file_name(&self) -> Option<String> {
        let disposition = self.content_disposition.as_deref()?;
        disposition
            .split(';')
            .map(str::trim)
            .find_map(|part| {
                let (key, value) = part.split_once('=')?;
                key.trim().starts_with("filename").then(|| value.trim())
            })
            .map(|value| value.trim_start_matches("UTF-8''").replace(['"', '\''], ""))
            .filter(|name| !name.is_empty())
    }
}

impl fmt::Debug for RawResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawResponse")
            .field("content_type", &self.content_type)
            .field("content_disposition", &self.content_disposition)
            .field("len", &self.body.len())
            .finish()
    }
}

/// Turn an HTTP response into the unwrapped envelope payload or an error.
pub(crate) fn process_response(reply: HttpReply) -> Result<Value, ClientError> {
    if reply.status.is_success() {
        let res: Value = serde_json::from_slice(&reply.body)?;
        return unwrap_envelope(res);
    }
    Err(error_response(reply.status, &reply.body))
}

/// Raw mode: a 2xx body is returned as-is unless it is a JSON envelope
/// reporting a failure; errors are parsed the same way as in envelope mode.
pub(crate) fn process_raw_response(reply: HttpReply) -> Result<RawResponse, ClientError> {
    if !reply.status.is_success() {
        return Err(error_response(reply.status, &reply.body));
    }

    let raw = RawResponse {
        content_type: reply.content_type,
        content_disposition: reply.content_disposition,
        body: reply.body,
    };
    if raw.is_json() {
        if let Ok(res) = serde_json::from_slice::<Value>(&raw.body) {
            if res.get("err_code").is_some() {
                unwrap_envelope(res)?;
            }
        }
    }
    Ok(raw)
}

/// Error for a non-2xx response. The body may still be an API envelope
/// explaining why, even when it arrived as bytes.
fn error_response(status: StatusCode, bytes: &[u8]) -> ClientError {
    let parsed = serde_json::from_slice::<Value>(bytes)
        .ok()
        .filter(|v| v.get("err_code").is_some());

    match parsed {
        Some(body) => {
            let code = body.get("err_code").and_then(Value::as_i64).unwrap_or(-1);
            let err_msg = body
                .get("err_msg")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned();
            ClientError::http_envelope(code, &err_msg, body)
        }
        None => ClientError::Status {
            status: status.as_u16(),
            body: String::from_utf8_lossy(bytes).into_owned(),
        },
    }
}

/// Unwrap a successful (2xx) envelope.
///
/// - `err_code != 0` is an API error.
/// - With `pagination` present the whole envelope is returned.
/// - Otherwise `data`, falling back to the envelope if `data` is absent.
pub(crate) fn unwrap_envelope(res: Value) -> Result<Value, ClientError> {
    let code = res.get("err_code").and_then(Value::as_i64);
    if code != Some(0) {
        let err_msg = res
            .get("err_msg")
            .and_then(Value::as_str)
            .unwrap_or("undefined");
        let code = code.unwrap_or(-1);
        return Err(ClientError::envelope(code, err_msg));
    }

    if res.get("pagination").is_some_and(|p| !p.is_null()) {
        return Ok(res);
    }

    match res.get("data") {
        Some(data) if !data.is_null() => Ok(data.clone()),
        _ => Ok(res),
    }
}
