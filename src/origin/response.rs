//! Response handed back to the embedded renderer

use crate::cache::CacheNamespace;
use crate::error::GateError;
use crate::integrity::Integrity;
use serde::Serialize;
use std::fmt;

/// Where the bytes of a successful response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    /// Value of the `X-Cache` header
    pub fn header_value(&self) -> &'static str {
        match self {
            Self::Hit => "HIT",
            Self::Miss => "MISS",
        }
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header_value())
    }
}

/// Failure details attached to an error response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetail {
    pub kind: &'static str,
    pub message: String,
    pub path: String,
}

/// A fully materialized response for one intercepted request
#[derive(Debug, Clone)]
pub struct InterceptResponse {
    pub status: u16,
    pub reason: &'static str,
    pub mime_type: String,
    pub charset: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub cache: Option<CacheStatus>,
    pub integrity: Option<Integrity>,
    pub namespace: Option<CacheNamespace>,
    pub error: Option<ErrorDetail>,
}

impl InterceptResponse {
    /// 200 response carrying resource bytes
    pub fn resource(
        body: Vec<u8>,
        mime_type: impl Into<String>,
        charset: impl Into<String>,
        cache: CacheStatus,
        integrity: Integrity,
        namespace: &CacheNamespace,
    ) -> Self {
        let mime_type = mime_type.into();
        let charset = charset.into();
        let headers = vec![
            (
                "Content-Type".to_string(),
                format!("{}; charset={}", mime_type, charset),
            ),
            ("X-Cache".to_string(), cache.header_value().to_string()),
            (
                "X-Integrity".to_string(),
                integrity.header_value().to_string(),
            ),
            ("X-Resource-Path".to_string(), namespace.to_string()),
        ];

        Self {
            status: 200,
            reason: reason_phrase(200),
            mime_type,
            charset,
            headers,
            body,
            cache: Some(cache),
            integrity: Some(integrity),
            namespace: Some(namespace.clone()),
            error: None,
        }
    }

    /// Plain-text error response for a failed request
    pub fn error(err: &GateError, path: &str, namespace: Option<&CacheNamespace>) -> Self {
        let status = err.status_code();
        let reason = reason_phrase(status);
        let body = format!("{} {}\n{}\npath: {}\n", status, reason, err, path).into_bytes();

        let mut headers = vec![
            (
                "Content-Type".to_string(),
                "text/plain; charset=UTF-8".to_string(),
            ),
            ("Cache-Control".to_string(), "no-store".to_string()),
            ("X-Error-Kind".to_string(), err.kind().to_string()),
        ];
        if let GateError::IntegrityMismatch { .. } = err {
            headers.push((
                "X-Integrity".to_string(),
                Integrity::Failed.header_value().to_string(),
            ));
        }
        if let Some(ns) = namespace {
            headers.push(("X-Resource-Path".to_string(), ns.to_string()));
        }

        Self {
            status,
            reason,
            mime_type: "text/plain".to_string(),
            charset: "UTF-8".to_string(),
            headers,
            body,
            cache: None,
            integrity: matches!(err, GateError::IntegrityMismatch { .. })
                .then_some(Integrity::Failed),
            namespace: namespace.cloned(),
            error: Some(ErrorDetail {
                kind: err.kind(),
                message: err.to_string(),
                path: path.to_string(),
            }),
        }
    }

    /// Set a header, replacing any existing value
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// HTTP reason phrase for the statuses the gateway produces
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        408 => "Request Timeout",
        410 => "Gone",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        s if (400..500).contains(&s) => "Client Error",
        s if s >= 500 => "Server Error",
        _ => "Unknown",
    }
}
