//! HTTP transport seam for the login and verification services.
//!
//! Both services speak JSON over POST. The [`HttpTransport`] trait is the only
//! place the crate touches the network; [`ReqwestTransport`] is the production
//! implementation.

use reqwest::header::{HeaderValue, CACHE_CONTROL};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, trace};

/// Errors raised before a complete HTTP response was received.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The server could not be reached.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The request could not be built or sent.
    #[error("request failed: {0}")]
    Request(String),

    /// The response body could not be read.
    #[error("failed to read response body: {0}")]
    Body(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            Self::Connect(err.to_string())
        } else if err.is_body() || err.is_decode() {
            Self::Body(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

/// A fully received HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Create a response from a status code and body bytes.
    #[must_use]
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status is in the 2xx range.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse the body as JSON.
    ///
    /// Returns `None` for an empty or whitespace-only body.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is present but is not valid JSON.
    pub fn json(&self) -> Result<Option<Value>, serde_json::Error> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        serde_json::from_slice(&self.body).map(Some)
    }
}

/// Sends JSON POST requests.
#[async_trait::async_trait]
pub trait HttpTransport: Send + Sync {
    /// POST `body` as JSON to `url` and return the full response.
    ///
    /// Non-2xx statuses are returned as responses, not errors.
    ///
    /// # Errors
    ///
    /// Returns an error if no response could be obtained.
    async fn post_json(&self, url: &str, body: &Value) -> Result<HttpResponse, TransportError>;
}

/// [`HttpTransport`] backed by a shared `reqwest` client.
///
/// No request timeout is configured; calls wait on the network stack.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with a fresh connection pool.
    #[must_use]
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("idverify/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_json(&self, url: &str, body: &Value) -> Result<HttpResponse, TransportError> {
        debug!(url, "POST");
        let response = self
            .client
            .post(url)
            .header(CACHE_CONTROL, HeaderValue::from_static("no-store"))
            .json(body)
            .send()
            .await?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await?;
        trace!(url, status, len = bytes.len(), "response received");
        Ok(HttpResponse::new(status, bytes.to_vec()))
    }
}

#[cfg(test)]
pub(crate) mod stub {
    //! Recording transport for tests.

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use serde_json::Value;

    use super::{HttpResponse, HttpTransport, TransportError};

    /// A request captured by [`StubTransport`].
    #[derive(Debug, Clone, PartialEq)]
    pub(crate) struct RecordedRequest {
        pub(crate) url: String,
        pub(crate) body: Value,
    }

    /// Replays queued responses in order and records every request.
    #[derive(Debug, Default)]
    pub(crate) struct StubTransport {
        responses: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
        requests: Mutex<Vec<RecordedRequest>>,
    }

    impl StubTransport {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn respond_json(self, status: u16, body: &Value) -> Self {
            self.respond(status, body.to_string())
        }

        pub(crate) fn respond(self, status: u16, body: impl Into<Vec<u8>>) -> Self {
            self.push(Ok(HttpResponse::new(status, body)))
        }

        pub(crate) fn fail(self, err: TransportError) -> Self {
            self.push(Err(err))
        }

        fn push(self, result: Result<HttpResponse, TransportError>) -> Self {
            self.responses
                .lock()
                .expect("stub lock poisoned")
                .push_back(result);
            self
        }

        pub(crate) fn requests(&self) -> Vec<RecordedRequest> {
            self.requests.lock().expect("stub lock poisoned").clone()
        }

        pub(crate) fn call_count(&self) -> usize {
            self.requests.lock().expect("stub lock poisoned").len()
        }
    }

    #[async_trait::async_trait]
    impl HttpTransport for StubTransport {
        async fn post_json(
            &self,
            url: &str,
            body: &Value,
        ) -> Result<HttpResponse, TransportError> {
            self.requests
                .lock()
                .expect("stub lock poisoned")
                .push(RecordedRequest {
                    url: url.to_string(),
                    body: body.clone(),
                });
            self.responses
                .lock()
                .expect("stub lock poisoned")
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Connect("no stub response queued".into())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn header_end(buf: &[u8]) -> Option<usize> {
        buf.windows(4).position(|w| w == b"\r\n\r\n")
    }

    /// Accept one connection, answer it, and hand back the raw request text.
    async fn serve_once(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.expect("accept");
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = stream.read(&mut chunk).await.expect("read");
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = header_end(&buf) {
                    let head = String::from_utf8_lossy(&buf[..pos]).to_ascii_lowercase();
                    let len = head
                        .lines()
                        .find_map(|l| l.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if buf.len() >= pos + 4 + len {
                        break;
                    }
                }
            }
            let response = format!(
                "{status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            stream
                .write_all(response.as_bytes())
                .await
                .expect("write");
            let _ = stream.shutdown().await;
            String::from_utf8_lossy(&buf).into_owned()
        });
        (format!("http://{addr}"), handle)
    }

    #[test]
    fn test_http_response_is_success() {
        assert!(HttpResponse::new(200, "").is_success());
        assert!(HttpResponse::new(204, "").is_success());
        assert!(!HttpResponse::new(401, "").is_success());
        assert!(!HttpResponse::new(500, "").is_success());
    }

    #[test]
    fn test_http_response_json_empty_body() {
        assert_eq!(HttpResponse::new(200, "").json().unwrap(), None);
        assert_eq!(HttpResponse::new(200, "  \n").json().unwrap(), None);
    }

    #[test]
    fn test_http_response_json_parses() {
        let resp = HttpResponse::new(200, r#"{"ok":true}"#);
        assert_eq!(resp.json().unwrap(), Some(json!({"ok": true})));
    }

    #[test]
    fn test_http_response_json_invalid() {
        assert!(HttpResponse::new(200, "<html>").json().is_err());
    }

    #[tokio::test]
    async fn test_reqwest_transport_posts_json() {
        let (base, server) = serve_once("HTTP/1.1 200 OK", r#"{"message":"hi"}"#).await;
        let transport = ReqwestTransport::new();

        let resp = transport
            .post_json(&format!("{base}/login"), &json!({"officerId": "O1"}))
            .await
            .expect("post");
        assert_eq!(resp.status, 200);
        assert_eq!(resp.json().unwrap(), Some(json!({"message": "hi"})));

        let request = server.await.expect("server task");
        let lower = request.to_ascii_lowercase();
        assert!(request.starts_with("POST /login HTTP/1.1"));
        assert!(lower.contains("content-type: application/json"));
        assert!(lower.contains("cache-control: no-store"));
        assert!(request.contains(r#"{"officerId":"O1"}"#));
    }

    #[tokio::test]
    async fn test_reqwest_transport_returns_error_statuses() {
        let (base, server) = serve_once("HTTP/1.1 401 Unauthorized", "").await;
        let transport = ReqwestTransport::new();

        let resp = transport
            .post_json(&format!("{base}/login"), &json!({}))
            .await
            .expect("post");
        assert_eq!(resp.status, 401);
        assert!(!resp.is_success());
        assert_eq!(resp.json().unwrap(), None);
        server.await.expect("server task");
    }

    #[tokio::test]
    async fn test_reqwest_transport_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        drop(listener);

        let transport = ReqwestTransport::new();
        let result = transport
            .post_json(&format!("http://{addr}/verify"), &json!({}))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_stub_transport_records_and_replays() {
        let stub = stub::StubTransport::new().respond(201, "{}");
        let resp = stub
            .post_json("http://svc/a", &json!({"k": 1}))
            .await
            .expect("queued response");
        assert_eq!(resp.status, 201);

        let exhausted = stub.post_json("http://svc/b", &json!(null)).await;
        assert!(matches!(exhausted, Err(TransportError::Connect(_))));

        let requests = stub.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].url, "http://svc/a");
        assert_eq!(requests[0].body, json!({"k": 1}));
    }
}
