//! Network reachability probes

use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

/// Device/network capability query
///
/// Used only as a short-circuit before the manifest call; a probe that
/// says "reachable" when it is not just costs one failed request.
#[async_trait]
pub trait NetworkProbe: Send + Sync {
    async fn is_reachable(&self) -> bool;
}

/// Probe that opens a TCP connection to the origin host
pub struct TcpProbe {
    target: Option<String>,
    timeout: Duration,
}

impl TcpProbe {
    pub fn for_url(url: &str, timeout: Duration) -> Self {
        Self {
            target: host_port(url),
            timeout,
        }
    }
}

#[async_trait]
impl NetworkProbe for TcpProbe {
    async fn is_reachable(&self) -> bool {
        // Unparseable URLs are left for the real request to report.
        let Some(target) = &self.target else {
            return true;
        };
        let reachable = matches!(
            tokio::time::timeout(self.timeout, TcpStream::connect(target.as_str())).await,
            Ok(Ok(_))
        );
        debug!("Probe {} reachable={}", target, reachable);
        reachable
    }
}

/// Extract `host:port` from an http(s) URL
fn host_port(url: &str) -> Option<String> {
    let (scheme, rest) = url.split_once("://")?;
    let default_port = match scheme.to_ascii_lowercase().as_str() {
        "http" => 80,
        "https" => 443,
        _ => return None,
    };
    let authority = rest.split(['/', '?', '#']).next()?;
    let authority = authority.rsplit('@').next()?;
    if authority.is_empty() {
        return None;
    }

    let has_port = match authority.rfind(':') {
        Some(i) => !authority[i..].contains(']'),
        None => false,
    };
    if has_port {
        Some(authority.to_string())
    } else {
        Some(format!("{}:{}", authority, default_port))
    }
}
