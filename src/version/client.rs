//! Manifest API client seam

use crate::error::{GateError, GateResult};
use crate::origin::OriginEndpoint;
use crate::transport::HttpTransport;
use crate::version::manifest::{DeviceContext, RawManifestResponse};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Body marker some gateways return with a 200 while the backend is down
const UNAVAILABLE_MARKER: &str = "503 Service Temporarily Unavailable";

/// Performs the manifest call
///
/// `Ok(None)` means the call succeeded but returned no body.
#[async_trait]
pub trait VersionApiClient: Send + Sync {
    async fn fetch_manifest(
        &self,
        device: &DeviceContext,
    ) -> GateResult<Option<RawManifestResponse>>;
}

/// Posts the device context as JSON to `{origin}/NCB/{api_name}`
pub struct HttpVersionApiClient {
    endpoint: OriginEndpoint,
    transport: Arc<dyn HttpTransport>,
    api_name: String,
    timeout: Duration,
}

impl HttpVersionApiClient {
    pub fn new(
        endpoint: OriginEndpoint,
        transport: Arc<dyn HttpTransport>,
        api_name: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            endpoint,
            transport,
            api_name: api_name.into(),
            timeout,
        }
    }
}

#[async_trait]
impl VersionApiClient for HttpVersionApiClient {
    async fn fetch_manifest(
        &self,
        device: &DeviceContext,
    ) -> GateResult<Option<RawManifestResponse>> {
        let url = self.endpoint.api_url(&self.api_name);
        let body = serde_json::to_vec(device)?;
        let mut headers = self.endpoint.headers().to_vec();
        headers.push((
            "Accept".to_string(),
            "application/json,text/html;q=0.9,*/*;q=0.8".to_string(),
        ));

        let response = tokio::time::timeout(
            self.timeout,
            self.transport.post_json(&url, &headers, body),
        )
        .await
        .map_err(|_| GateError::RequestTimeout(url.clone()))??;

        match response.status {
            503 => return Err(GateError::ServerUnavailable(url)),
            408 | 504 => return Err(GateError::RequestTimeout(url)),
            s if !(200..300).contains(&s) => {
                return Err(GateError::RequestFailed(format!("HTTP {} from {}", s, url)))
            }
            _ => {}
        }

        let text = String::from_utf8_lossy(&response.body);
        if text.contains(UNAVAILABLE_MARKER) {
            return Err(GateError::ServerUnavailable(url));
        }
        let text = text.trim();
        if text.is_empty() || text == "null" {
            debug!("Manifest API returned no body");
            return Ok(None);
        }

        serde_json::from_str(text)
            .map(Some)
            .map_err(|e| GateError::RequestFailed(format!("invalid manifest JSON: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ApiConfig;
    use crate::testing::MemoryTransport;
    use crate::transport::HttpResponse;

    const URL: &str = "http://api.test/NCB/mAppVersionQuery";

    fn client(transport: Arc<MemoryTransport>) -> HttpVersionApiClient {
        HttpVersionApiClient::new(
            OriginEndpoint::new("http://api.test"),
            transport,
            "mAppVersionQuery",
            Duration::from_secs(5),
        )
    }

    async fn fetch(response: HttpResponse) -> GateResult<Option<RawManifestResponse>> {
        let transport = Arc::new(MemoryTransport::new());
        transport.route(URL, response);
        client(transport)
            .fetch_manifest(&DeviceContext::from_config(&ApiConfig::default()))
            .await
    }

    #[tokio::test]
    async fn parses_manifest() {
        let manifest = fetch(HttpResponse::ok(
            r#"{"resourcePath":"v1","resourceVersion":"1","resCode":"CIP0000000"}"#,
        ))
        .await
        .unwrap()
        .unwrap();
        assert_eq!(manifest.resource_namespace, "v1");
    }

    #[tokio::test]
    async fn posts_device_context() {
        let transport = Arc::new(MemoryTransport::new());
        transport.route(URL, HttpResponse::ok("null"));
        let result = client(Arc::clone(&transport))
            .fetch_manifest(&DeviceContext::from_config(&ApiConfig::default()))
            .await
            .unwrap();

        assert!(result.is_none());
        let body = transport.last_body(URL).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["channelNo"], "mb");
    }

    #[tokio::test]
    async fn status_mapping() {
        assert!(matches!(
            fetch(HttpResponse::status(503)).await,
            Err(GateError::ServerUnavailable(_))
        ));
        assert!(matches!(
            fetch(HttpResponse::status(408)).await,
            Err(GateError::RequestTimeout(_))
        ));
        assert!(matches!(
            fetch(HttpResponse::status(504)).await,
            Err(GateError::RequestTimeout(_))
        ));
        assert!(matches!(
            fetch(HttpResponse::status(500)).await,
            Err(GateError::RequestFailed(_))
        ));
    }

    #[tokio::test]
    async fn unavailable_page_with_200() {
        let page = "<html><title>503 Service Temporarily Unavailable</title></html>";
        assert!(matches!(
            fetch(HttpResponse::ok(page)).await,
            Err(GateError::ServerUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn slow_api_times_out() {
        let transport = Arc::new(MemoryTransport::new().with_latency(Duration::from_millis(300)));
        transport.route(URL, HttpResponse::ok("null"));
        let client = HttpVersionApiClient::new(
            OriginEndpoint::new("http://api.test"),
            transport,
            "mAppVersionQuery",
            Duration::from_millis(20),
        );

        let err = client
            .fetch_manifest(&DeviceContext::from_config(&ApiConfig::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::RequestTimeout(_)));
    }
}
