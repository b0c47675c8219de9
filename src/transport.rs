//! HTTP transport seam
//!
//! Every network call the gateway makes (manifest API, hash manifest, origin
//! resources) goes through `HttpTransport`, so tests can swap in an
//! in-memory transport. The production implementation wraps a blocking
//! `ureq` agent and runs each call on tokio's blocking pool.

use crate::error::{GateError, GateResult};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// A fully-read HTTP response
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Build a 200 response with the given body
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Build an empty response with the given status
    pub fn status(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// Add a header
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Abstract HTTP client interface
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Issue a GET and read the full body
    async fn get(&self, url: &str, headers: &[(String, String)]) -> GateResult<HttpResponse>;

    /// Issue a POST with a JSON body and read the full response body
    async fn post_json(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: Vec<u8>,
    ) -> GateResult<HttpResponse>;
}

/// `ureq`-backed transport with a single global timeout per call
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
    max_body_bytes: u64,
}

impl UreqTransport {
    /// Create a transport whose calls fail with `RequestTimeout` after `timeout`
    pub fn new(timeout: Duration, max_body_bytes: u64) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();
        Self {
            agent: config.into(),
            max_body_bytes,
        }
    }

    fn read_response(
        mut response: ureq::http::Response<ureq::Body>,
        max_body_bytes: u64,
    ) -> Result<HttpResponse, ureq::Error> {
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .body_mut()
            .with_config()
            .limit(max_body_bytes)
            .read_to_vec()?;
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[async_trait]
impl HttpTransport for UreqTransport {
    async fn get(&self, url: &str, headers: &[(String, String)]) -> GateResult<HttpResponse> {
        let agent = self.agent.clone();
        let max_body = self.max_body_bytes;
        let target = url.to_string();
        let headers = headers.to_vec();

        debug!("GET {}", url);
        let result = tokio::task::spawn_blocking(move || {
            let mut request = agent.get(&target);
            for (name, value) in &headers {
                request = request.header(name.as_str(), value.as_str());
            }
            request
                .call()
                .and_then(|response| Self::read_response(response, max_body))
        })
        .await
        .map_err(|e| GateError::Internal(format!("transport task failed: {}", e)))?;

        result.map_err(|e| map_ureq_error(url, e))
    }

    async fn post_json(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: Vec<u8>,
    ) -> GateResult<HttpResponse> {
        let agent = self.agent.clone();
        let max_body = self.max_body_bytes;
        let target = url.to_string();
        let headers = headers.to_vec();

        debug!("POST {} ({} bytes)", url, body.len());
        let result = tokio::task::spawn_blocking(move || {
            let mut request = agent
                .post(&target)
                .header("Content-Type", "application/json;charset=utf-8");
            for (name, value) in &headers {
                request = request.header(name.as_str(), value.as_str());
            }
            request
                .send(&body[..])
                .and_then(|response| Self::read_response(response, max_body))
        })
        .await
        .map_err(|e| GateError::Internal(format!("transport task failed: {}", e)))?;

        result.map_err(|e| map_ureq_error(url, e))
    }
}

/// Classify a transport failure into the gateway taxonomy
fn map_ureq_error(url: &str, err: ureq::Error) -> GateError {
    match err {
        ureq::Error::Timeout(_) => GateError::RequestTimeout(url.to_string()),
        ureq::Error::Io(e) if e.kind() == std::io::ErrorKind::TimedOut => {
            GateError::RequestTimeout(url.to_string())
        }
        ureq::Error::HostNotFound | ureq::Error::ConnectionFailed => {
            GateError::NetworkUnavailable(format!("cannot reach {}", url))
        }
        ureq::Error::Io(e) => GateError::NetworkUnavailable(format!("{}: {}", url, e)),
        other => GateError::RequestFailed(format!("{}: {}", url, other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_is_case_insensitive() {
        let response = HttpResponse::ok("x").with_header("Content-Type", "text/css");
        assert_eq!(response.header("content-type"), Some("text/css"));
        assert_eq!(response.header("X-Missing"), None);
    }

    #[test]
    fn success_range() {
        assert!(HttpResponse::ok("").is_success());
        assert!(!HttpResponse::status(404).is_success());
    }

    #[tokio::test]
    async fn unreachable_host_is_typed() {
        let transport = UreqTransport::new(Duration::from_secs(2), 1024);
        // Port 9 on localhost is the discard service and is normally closed.
        let err = transport.get("http://127.0.0.1:9/x", &[]).await.unwrap_err();
        assert!(matches!(
            err,
            GateError::NetworkUnavailable(_) | GateError::RequestTimeout(_) | GateError::RequestFailed(_)
        ));
    }
}
