//! Authenticated Feishu Project API client.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderName, CONTENT_DISPOSITION, CONTENT_TYPE};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::request::{process_raw_response, process_response, HttpReply, RawResponse};
use crate::token::{PluginTokenManager, TokenProvider};
use crate::{ClientError, Credentials, RequestOptions};

/// Header carrying the acting user.
pub const USER_KEY_HEADER: &str = "X-USER-KEY";
/// Header carrying the plugin token.
pub const PLUGIN_TOKEN_HEADER: &str = "X-PLUGIN-TOKEN";

/// What operation handlers need from the HTTP layer.
#[async_trait]
pub trait Requester: Send + Sync {
    /// Issue one call and return the unwrapped envelope payload.
    async fn request(&self, options: RequestOptions) -> Result<Value, ClientError>;

    /// Issue one call and return the body untouched (file downloads).
    ///
    /// Failures are reported exactly as [`Requester::request`] reports them.
    async fn request_raw(&self, options: RequestOptions) -> Result<RawResponse, ClientError>;

    /// User key from the credentials, used when an operation leaves it blank.
    fn user_key(&self) -> &str;
}

/// Cheap to clone; all clones share the token cache.
#[derive(Clone)]
pub struct ProjectClient {
    http: reqwest::Client,
    base_url: Url,
    user_key: String,
    tokens: Arc<dyn TokenProvider>,
}

impl ProjectClient {
    pub fn new(credentials: Credentials) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("feishu-project-node/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let tokens = PluginTokenManager::new(http.clone(), credentials.clone())?;
        Ok(Self {
            http,
            base_url: credentials.base_url()?,
            user_key: credentials.user_key,
            tokens: Arc::new(tokens),
        })
    }

    /// Credential test: force a token exchange.
    pub async fn verify(&self) -> Result<(), ClientError> {
        self.tokens.clear().await;
        self.tokens.token().await.map(|_| ())
    }

    /// Send once with the current token; on a token error drop that token and
    /// send once more with a fresh one.
    async fn send_with_retry<T: Send>(
        &self,
        options: &RequestOptions,
        process: fn(HttpReply) -> Result<T, ClientError>,
    ) -> Result<T, ClientError> {
        let token = self.tokens.token().await?;
        match self.send(options, &token).await.and_then(process) {
            Err(err) if err.is_token_expired() => {
                warn!(
                    code = err.code().unwrap_or_default(),
                    url = %options.url,
                    "plugin token rejected, refreshing and retrying once"
                );
                self.tokens.invalidate(&token).await;
                let token = self.tokens.token().await?;
                self.send(options, &token).await.and_then(process)
            }
            other => other,
        }
    }

    async fn send(&self, options: &RequestOptions, token: &str) -> Result<HttpReply, ClientError> {
        let url = self.base_url.join(&options.url)?;
        debug!(method = %options.method, url = %url, "sending request");

        let mut req = self
            .http
            .request(options.method.clone(), url)
            .header(USER_KEY_HEADER, &self.user_key)
            .header(PLUGIN_TOKEN_HEADER, token);
        if !options.query.is_empty() {
            req = req.query(&options.query);
        }
        if let Some(form) = &options.form {
            req = req.multipart(form.to_multipart()?);
        } else if let Some(body) = &options.body {
            req = req.json(body);
        }
        if let Some(timeout) = options.timeout {
            req = req.timeout(timeout);
        }

        let res = req.send().await?;
        let header = |name: HeaderName| {
            res.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        };
        let content_type = header(CONTENT_TYPE);
        let content_disposition = header(CONTENT_DISPOSITION);
        let status = res.status();
        let body = res.bytes().await?.to_vec();

        Ok(HttpReply {
            status,
            content_type,
            content_disposition,
            body,
        })
    }
}

#[async_trait]
impl Requester for ProjectClient {
    async fn request(&self, options: RequestOptions) -> Result<Value, ClientError> {
        self.send_with_retry(&options, process_response).await
    }

    async fn request_raw(&self, options: RequestOptions) -> Result<RawResponse, ClientError> {
        self.send_with_retry(&options, process_raw_response).await
    }

    fn user_key(&self) -> &str {
        &self.user_key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::PLUGIN_TOKEN_PATH;
    use serde_json::json;
    use crate::FormData;
    use wiremock::matchers::{body_string_contains, header, header_regex, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_token(server: &MockServer, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path(PLUGIN_TOKEN_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "data": { "token": "tok" } })),
            )
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    fn client(server: &MockServer) -> ProjectClient {
        ProjectClient::new(Credentials::new(server.uri(), "plugin", "secret", "user-9")).unwrap()
    }

    #[tokio::test]
    async fn request_sends_auth_headers_and_unwraps_data() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;
        Mock::given(method("GET"))
            .and(path("/open_api/p1/work_item/all-types"))
            .and(header(USER_KEY_HEADER, "user-9"))
            .and(header(PLUGIN_TOKEN_HEADER, "tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "err_code": 0, "err_msg": "", "data": [{ "type_key": "story" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let out = client(&server)
            .request(RequestOptions::get("/open_api/p1/work_item/all-types"))
            .await
            .unwrap();
        assert_eq!(out, json!([{ "type_key": "story" }]));
    }

    #[tokio::test]
    async fn query_string_is_forwarded() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;
        Mock::given(method("GET"))
            .and(path("/open_api/p1/comments"))
            .and(query_param("page_num", "2"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "err_code": 0, "data": [] })),
            )
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .request(RequestOptions::get("/open_api/p1/comments").query("page_num", 2))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_and_retried_once() {
        let server = MockServer::start().await;
        mount_token(&server, 2).await;
        Mock::given(method("POST"))
            .and(path("/open_api/projects"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "err_code": 10022, "err_msg": "plugin token expired"
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/open_api/projects"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "err_code": 0, "data": ["p1"] })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let out = client(&server)
            .request(RequestOptions::post("/open_api/projects").body(json!({})))
            .await
            .unwrap();
        assert_eq!(out, json!(["p1"]));
    }

    #[tokio::test]
    async fn second_token_failure_surfaces_as_api_error() {
        let server = MockServer::start().await;
        mount_token(&server, 2).await;
        Mock::given(method("POST"))
            .and(path("/open_api/projects"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "err_code": 10211, "err_msg": "Token Info Is Invalid"
            })))
            .expect(2)
            .mount(&server)
            .await;

        let err = client(&server)
            .request(RequestOptions::post("/open_api/projects"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(10211));
    }

    #[tokio::test]
    async fn api_error_is_not_retried() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;
        Mock::given(method("POST"))
            .and(path("/open_api/projects/detail"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "err_code": 30001, "err_msg": "invalid param",
                "err": { "msg": "project_keys is empty", "log_id": "L1" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server)
            .request(RequestOptions::post("/open_api/projects/detail"))
            .await
            .unwrap_err();
        assert_eq!(err.description(), Some("project_keys is empty (log_id: L1)"));
        assert_eq!(err.details().unwrap()["err_code"], 30001);
    }

    #[tokio::test]
    async fn raw_request_returns_file_bytes() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;
        Mock::given(method("POST"))
            .and(path("/open_api/p1/work_item/story/9/file/download"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-disposition", "attachment; filename=\"spec.pdf\"")
                    .set_body_raw(b"%PDF-1.7".to_vec(), "application/pdf"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let raw = client(&server)
            .request_raw(
                RequestOptions::post("/open_api/p1/work_item/story/9/file/download")
                    .body(json!({ "uuid": "f1" })),
            )
            .await
            .unwrap();
        assert_eq!(raw.body, b"%PDF-1.7".to_vec());
        assert_eq!(raw.mime_type().as_deref(), Some("application/pdf"));
        assert_eq!(raw.file_name().as_deref(), Some("spec.pdf"));
    }

    #[tokio::test]
    async fn raw_request_parses_error_envelope_from_binary_body() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;
        Mock::given(method("POST"))
            .and(path("/open_api/p1/work_item/story/9/file/download"))
            .respond_with(ResponseTemplate::new(404).set_body_raw(
                br#"{"err_code":30005,"err_msg":"file not found","err":{"msg":"no such uuid"}}"#.to_vec(),
                "application/octet-stream",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server)
            .request_raw(RequestOptions::post("/open_api/p1/work_item/story/9/file/download"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(30005));
        assert_eq!(err.description(), Some("no such uuid"));
        assert!(err.details().is_some());
    }

    #[tokio::test]
    async fn raw_request_refreshes_expired_token() {
        let server = MockServer::start().await;
        mount_token(&server, 2).await;
        Mock::given(method("POST"))
            .and(path("/open_api/p1/file/download"))
            .respond_with(ResponseTemplate::new(401).set_body_raw(
                br#"{"err_code":10022,"err_msg":"plugin token expired"}"#.to_vec(),
                "application/octet-stream",
            ))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/open_api/p1/file/download"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(vec![1, 2, 3], "image/png"))
            .expect(1)
            .mount(&server)
            .await;

        let raw = client(&server)
            .request_raw(RequestOptions::post("/open_api/p1/file/download"))
            .await
            .unwrap();
        assert_eq!(raw.body, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn form_upload_is_sent_as_multipart() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;
        Mock::given(method("POST"))
            .and(path("/open_api/p1/file/upload"))
            .and(header_regex("content-type", "^multipart/form-data; boundary="))
            .and(body_string_contains("filename=\"notes.txt\""))
            .and(body_string_contains("hello attachment"))
            .and(body_string_contains("field_alias"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "err_code": 0, "data": "https://project.feishu.cn/file/abc"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let form = FormData::file("notes.txt", "text/plain", b"hello attachment".to_vec())
            .text("field_alias", "attachments");
        let out = client(&server)
            .request(RequestOptions::post("/open_api/p1/file/upload").form(form))
            .await
            .unwrap();
        assert_eq!(out, json!("https://project.feishu.cn/file/abc"));
    }

    #[tokio::test]
    async fn concurrent_rejections_refresh_the_token_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(PLUGIN_TOKEN_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "data": { "token": "tok-1" } })),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(PLUGIN_TOKEN_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "data": { "token": "tok-2" } })),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/open_api/projects"))
            .and(header(PLUGIN_TOKEN_HEADER, "tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "err_code": 10022, "err_msg": "plugin token expired"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/open_api/projects"))
            .and(header(PLUGIN_TOKEN_HEADER, "tok-2"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "err_code": 0, "data": ["p1"] })),
            )
            .expect(2)
            .mount(&server)
            .await;

        let client = client(&server);
        let (a, b) = tokio::join!(
            client.request(RequestOptions::post("/open_api/projects")),
            client.request(RequestOptions::post("/open_api/projects")),
        );
        assert_eq!(a.unwrap(), json!(["p1"]));
        assert_eq!(b.unwrap(), json!(["p1"]));
    }
}
