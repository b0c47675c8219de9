//! Origin URL layout and request headers

use crate::cache::CacheNamespace;
use crate::config::schema::OriginConfig;
use url::Url;

/// Where the origin lives and what every request to it carries
#[derive(Debug, Clone)]
pub struct OriginEndpoint {
    base_url: String,
    headers: Vec<(String, String)>,
}

impl OriginEndpoint {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            headers: Vec::new(),
        }
    }

    pub fn from_config(config: &OriginConfig) -> Self {
        let mut endpoint = Self::new(config.base_url.as_str());
        if !config.user_agent.is_empty() {
            endpoint = endpoint.with_header("User-Agent", &config.user_agent);
        }
        for (name, value) in &config.headers {
            endpoint = endpoint.with_header(name, value);
        }
        endpoint
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// `{base}/resources/{namespace}/resource_hashes`
    pub fn hash_manifest_url(&self, namespace: &CacheNamespace) -> String {
        let mut segments = vec!["resources"];
        segments.extend(namespace.as_str().split('/'));
        segments.push("resource_hashes");
        self.join(&segments, None)
    }

    /// `{base}/resources/{namespace}/www/{relative}[?query]`
    ///
    /// Each path segment is percent-encoded, so names containing spaces,
    /// `#`, `?` or `%` reach the origin as the same file.
    pub fn resource_url(
        &self,
        namespace: &CacheNamespace,
        relative: &str,
        query: Option<&str>,
    ) -> String {
        let mut segments = vec!["resources"];
        segments.extend(namespace.as_str().split('/'));
        segments.push("www");
        segments.extend(relative.split('/').filter(|s| !s.is_empty()));
        self.join(&segments, query.filter(|q| !q.is_empty()))
    }

    fn join(&self, segments: &[&str], query: Option<&str>) -> String {
        let mut url = match Url::parse(&self.base_url) {
            Ok(url) if !url.cannot_be_a_base() => url,
            _ => return self.join_raw(segments, query),
        };
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url.set_query(query);
        url.into()
    }

    /// Base URLs `url` cannot parse are joined verbatim
    fn join_raw(&self, segments: &[&str], query: Option<&str>) -> String {
        let mut url = format!("{}/{}", self.base_url, segments.join("/"));
        if let Some(q) = query {
            url.push('?');
            url.push_str(q);
        }
        url
    }

    /// `{base}/NCB/{api_name}`
    pub fn api_url(&self, api_name: &str) -> String {
        format!("{}/NCB/{}", self.base_url, api_name)
    }
}
