//! Blocking HTTP transport over a shared async reqwest client.
//!
//! Uses async reqwest internally but presents a sync interface: every
//! extraction loop is pull-based and strictly sequential, so each call
//! simply blocks on the shared runtime.

use std::io;
use std::rc::Rc;
use std::sync::LazyLock;
use std::time::Duration;

use serde::de::DeserializeOwned;

/// Connect timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Whole-request timeout (report row pages can be large)
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Post => "POST",
        })
    }
}

/// Outbound request description
#[derive(Clone, Debug, PartialEq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((name.into(), value.to_string()));
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// `"METHOD url"` identity used in errors and events
    pub fn endpoint(&self) -> String {
        format!("{} {}", self.method, self.url)
    }

    /// First query value for `name`
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Status and fully-read body of a response
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.body)
    }
}

/// Failure before any HTTP status was received
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection reset/refused/aborted or timed out
    Connection(String),
    Other(String),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connection(msg) => write!(f, "connection: {msg}"),
            Self::Other(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for TransportError {}

/// Executes a single request with no retry of its own.
pub trait Transport {
    fn execute(&self, request: &Request) -> Result<Response, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Rc<T> {
    fn execute(&self, request: &Request) -> Result<Response, TransportError> {
        (**self).execute(request)
    }
}

/// Shared async HTTP client with connection pooling.
static SHARED_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .pool_max_idle_per_host(4)
        .build()
        .expect("failed to build HTTP client")
});

/// Get shared HTTP client.
pub fn http_client() -> &'static reqwest::Client {
    &SHARED_CLIENT
}

/// Shared tokio runtime for HTTP operations.
pub static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

/// Production transport: reqwest bridged to sync via [`SHARED_RUNTIME`]
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: http_client().clone(),
        }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for ReqwestTransport {
    fn execute(&self, request: &Request) -> Result<Response, TransportError> {
        SHARED_RUNTIME.handle().block_on(async {
            let method = match request.method {
                Method::Get => reqwest::Method::GET,
                Method::Post => reqwest::Method::POST,
            };
            let mut builder = self
                .client
                .request(method, &request.url)
                .timeout(REQUEST_TIMEOUT);
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if !request.query.is_empty() {
                builder = builder.query(&request.query);
            }
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }

            let response = builder.send().await.map_err(|e| classify(&e))?;
            let status = response.status().as_u16();
            let body = response.text().await.map_err(|e| classify(&e))?;
            Ok(Response { status, body })
        })
    }
}

/// Split reqwest failures into connection-class and everything else
fn classify(e: &reqwest::Error) -> TransportError {
    let message = e.to_string();
    if e.is_connect() || e.is_timeout() || has_reset_source(e) {
        TransportError::Connection(message)
    } else {
        TransportError::Other(message)
    }
}

fn has_reset_source(e: &(dyn std::error::Error + 'static)) -> bool {
    let mut source = e.source();
    while let Some(err) = source {
        if let Some(io_err) = err.downcast_ref::<io::Error>() {
            if is_reset_kind(io_err.kind()) {
                return true;
            }
        }
        source = err.source();
    }
    false
}

fn is_reset_kind(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_identity() {
        let req = Request::post("https://example.test/reports/1:run");
        assert_eq!(req.endpoint(), "POST https://example.test/reports/1:run");
    }

    #[test]
    fn query_builder_keeps_order() {
        let req = Request::get("https://example.test")
            .query("pageSize", 10_000)
            .query("pageToken", "abc");
        assert_eq!(req.query_value("pageSize"), Some("10000"));
        assert_eq!(req.query_value("pageToken"), Some("abc"));
        assert_eq!(req.query_value("missing"), None);
        assert_eq!(req.query[0].0, "pageSize");
    }

    #[test]
    fn response_success_range() {
        assert!(Response::new(200, "").is_success());
        assert!(Response::new(204, "").is_success());
        assert!(!Response::new(199, "").is_success());
        assert!(!Response::new(301, "").is_success());
        assert!(!Response::new(429, "").is_success());
    }

    #[test]
    fn response_json_decodes() {
        let resp = Response::new(200, r#"{"name":"operations/1"}"#);
        let v: serde_json::Value = resp.json().unwrap();
        assert_eq!(v["name"], "operations/1");
        assert!(Response::new(200, "not json").json::<serde_json::Value>().is_err());
    }

    #[test]
    fn reset_kinds() {
        assert!(is_reset_kind(io::ErrorKind::ConnectionReset));
        assert!(is_reset_kind(io::ErrorKind::BrokenPipe));
        assert!(!is_reset_kind(io::ErrorKind::NotFound));
    }
}
