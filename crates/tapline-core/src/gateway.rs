//! HTTP retry gateway: every outbound call goes through here
//!
//! Status mapping:
//! - 2xx → `Ok(Response)`
//! - 429 → retried with exponential backoff, then `MaxRetriesExceeded`
//! - 401/403 → `AuthorizationDenied`
//! - other non-2xx → `Http`
//! - connection-class transport failure → `TransientConnection`

use std::rc::Rc;

use serde::de::DeserializeOwned;

use crate::clock::{Clock, SystemClock};
use crate::error::TapError;
use crate::events::{LogObserver, Observer};
use crate::retry::{RetryPolicy, retry_with_backoff};
use crate::transport::{Request, Response, Transport, TransportError};

/// Longest body excerpt kept in `Http` error messages
const ERROR_BODY_PREVIEW: usize = 500;

pub struct HttpGateway {
    transport: Box<dyn Transport>,
    clock: Rc<dyn Clock>,
    observer: Rc<dyn Observer>,
    policy: RetryPolicy,
    headers: Vec<(String, String)>,
}

impl std::fmt::Debug for HttpGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGateway")
            .field("policy", &self.policy)
            .field("headers", &self.headers.len())
            .finish_non_exhaustive()
    }
}

impl HttpGateway {
    /// Gateway with the system clock, log observer and default policy
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            clock: Rc::new(SystemClock),
            observer: Rc::new(LogObserver),
            policy: RetryPolicy::default(),
            headers: Vec::new(),
        }
    }

    pub fn with_clock(mut self, clock: Rc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_observer(mut self, observer: Rc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Header attached to every request (credentials)
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn observer(&self) -> &dyn Observer {
        self.observer.as_ref()
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Send a request, retrying throttled responses.
    pub fn send(&self, mut request: Request) -> Result<Response, TapError> {
        for (name, value) in &self.headers {
            if !request.headers.iter().any(|(n, _)| n.eq_ignore_ascii_case(name)) {
                request.headers.push((name.clone(), value.clone()));
            }
        }
        let endpoint = request.endpoint();
        retry_with_backoff(
            &endpoint,
            &self.policy,
            self.clock.as_ref(),
            self.observer.as_ref(),
            |attempt| self.attempt(&request, &endpoint, attempt),
        )
    }

    /// Send and decode a JSON body; non-JSON is a `Decode` error.
    pub fn send_json<T: DeserializeOwned>(&self, request: Request) -> Result<T, TapError> {
        let endpoint = request.endpoint();
        let response = self.send(request)?;
        response.json().map_err(|e| TapError::Decode {
            endpoint,
            message: e.to_string(),
        })
    }

    fn attempt(&self, request: &Request, endpoint: &str, attempt: u32) -> Result<Response, TapError> {
        let response = match self.transport.execute(request) {
            Ok(r) => r,
            Err(TransportError::Connection(message)) => {
                return Err(TapError::TransientConnection {
                    endpoint: endpoint.to_string(),
                    message,
                });
            }
            Err(TransportError::Other(message)) => {
                return Err(TapError::Http {
                    endpoint: endpoint.to_string(),
                    status: None,
                    message,
                });
            }
        };

        match response.status {
            _ if response.is_success() => Ok(response),
            429 => Err(TapError::Throttled {
                endpoint: endpoint.to_string(),
                attempt,
            }),
            status @ (401 | 403) => Err(TapError::AuthorizationDenied {
                endpoint: endpoint.to_string(),
                status,
            }),
            status => Err(TapError::Http {
                endpoint: endpoint.to_string(),
                status: Some(status),
                message: preview(&response.body),
            }),
        }
    }
}

/// First few hundred characters of a body, on one line
pub fn preview(body: &str) -> String {
    let mut out: String = body.chars().take(ERROR_BODY_PREVIEW).collect();
    if out.len() < body.len() {
        out.push_str("...");
    }
    out.replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::testing::{Harness, MockTransport, connection_reset, json_ok, status};

    #[test]
    fn three_throttles_then_success_sleeps_2_4_8() {
        let h = Harness::new(MockTransport::scripted([
            status(429),
            status(429),
            status(429),
            json_ok(json!({"ok": true})),
        ]));
        let gw = h.gateway();

        let resp = gw.send(Request::get("https://api.test/v1/x")).unwrap();

        assert_eq!(resp.status, 200);
        assert_eq!(h.transport.request_count(), 4);
        assert_eq!(
            h.clock.sleeps(),
            vec![
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8)
            ]
        );
        assert_eq!(h.observer.count("retry_scheduled"), 3);
    }

    #[test]
    fn five_throttles_exceed_budget() {
        let h = Harness::new(MockTransport::new(|_| status(429)));
        let err = h
            .gateway()
            .send(Request::get("https://api.test/v1/x"))
            .unwrap_err();

        assert_eq!(h.transport.request_count(), 5);
        match err {
            TapError::MaxRetriesExceeded { endpoint, attempts } => {
                assert_eq!(endpoint, "GET https://api.test/v1/x");
                assert_eq!(attempts, 5);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn forbidden_is_authorization_denied_without_retry() {
        let h = Harness::new(MockTransport::scripted([status(403)]));
        let err = h.gateway().send(Request::get("https://api.test/a")).unwrap_err();
        assert!(err.is_authorization_denied());
        assert!(h.clock.sleeps().is_empty());
    }

    #[test]
    fn server_error_propagates_with_body_preview() {
        let h = Harness::new(MockTransport::scripted([Ok(Response::new(
            500,
            "upstream\nfailure",
        ))]));
        let err = h.gateway().send(Request::get("https://api.test/a")).unwrap_err();
        match err {
            TapError::Http {
                status, message, ..
            } => {
                assert_eq!(status, Some(500));
                assert_eq!(message, "upstream failure");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(h.transport.request_count(), 1);
    }

    #[test]
    fn connection_reset_is_transient() {
        let h = Harness::new(MockTransport::scripted([connection_reset()]));
        let err = h.gateway().send(Request::get("https://api.test/a")).unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn default_headers_attached_once() {
        let h = Harness::new(MockTransport::new(|_| json_ok(json!({}))));
        let gw = h.gateway().with_header("Authorization", "Bearer t");
        gw.send(Request::get("https://api.test/a")).unwrap();
        gw.send(Request::get("https://api.test/b").header("authorization", "Bearer other"))
            .unwrap();

        let reqs = h.transport.requests();
        assert_eq!(
            reqs[0].headers,
            vec![("Authorization".to_string(), "Bearer t".to_string())]
        );
        assert_eq!(reqs[1].headers.len(), 1);
        assert_eq!(reqs[1].headers[0].1, "Bearer other");
    }

    #[test]
    fn send_json_decode_error() {
        let h = Harness::new(MockTransport::scripted([Ok(Response::new(200, "<html>"))]));
        let err = h
            .gateway()
            .send_json::<serde_json::Value>(Request::post("https://api.test/r:run"))
            .unwrap_err();
        assert!(matches!(err, TapError::Decode { .. }));
    }

    #[test]
    fn preview_truncates_long_bodies() {
        let body = "x".repeat(600);
        let p = preview(&body);
        assert_eq!(p.len(), 503);
        assert!(p.ends_with("..."));
    }
}
