//! Version manifest and the device context sent to request it

use crate::cache::{CacheNamespace, NamespaceKey};
use crate::config::schema::ApiConfig;
use crate::error::{GateError, GateResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Manifest describing which bundle is current
///
/// Field names follow the manifest API's camelCase wire format. Fields the
/// gateway does not interpret are kept so a persisted manifest reloads with
/// every field intact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionManifest {
    /// Opaque version token
    #[serde(rename = "resourceVersion", default)]
    pub version: String,

    /// Directory namespace of the bundle on the origin
    #[serde(rename = "resourcePath", default)]
    pub resource_namespace: String,

    /// `"1"` when the host app must update before continuing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_flag: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub res_code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub res_msg: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub globle_seq_no: Option<String>,

    /// App version the server believes is installed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_app_version: Option<String>,

    /// Latest published app version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_app_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_msg: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privacy_info: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adv_imgs: Option<serde_json::Value>,

    /// Everything else the API returned
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A manifest response before business-code validation
pub type RawManifestResponse = VersionManifest;

impl VersionManifest {
    /// Whether the host app must update
    pub fn force_update(&self) -> bool {
        self.update_flag.as_deref() == Some("1")
    }

    /// Check the business code and required fields
    pub fn validate(&self, success_code: &str) -> GateResult<()> {
        let code = self.res_code.as_deref().unwrap_or_default();
        if code != success_code {
            return Err(GateError::ApiResponseError {
                code: code.to_string(),
                message: self.res_msg.clone().unwrap_or_default(),
            });
        }
        if self.version.trim().is_empty() {
            return Err(GateError::ApiResponseError {
                code: code.to_string(),
                message: "manifest has no resource version".to_string(),
            });
        }
        if self.resource_namespace.trim().is_empty() {
            return Err(GateError::ApiResponseError {
                code: code.to_string(),
                message: "manifest has no resource path".to_string(),
            });
        }
        Ok(())
    }

    /// Cache namespace named by the selected field
    pub fn namespace(&self, key: NamespaceKey) -> GateResult<CacheNamespace> {
        match key {
            NamespaceKey::ResourcePath => CacheNamespace::new(self.resource_namespace.as_str()),
            NamespaceKey::Version => CacheNamespace::new(self.version.as_str()),
        }
    }

    /// True when `newAppVersion` is newer than `current`
    ///
    /// Versions are parsed leniently (`v` prefix, missing minor/patch); if
    /// either side cannot be parsed no update is reported.
    pub fn app_update_available(&self, current: &str) -> bool {
        let Some(latest) = self.new_app_version.as_deref().and_then(lenient_version) else {
            return false;
        };
        lenient_version(current).is_some_and(|current| latest > current)
    }
}

fn lenient_version(raw: &str) -> Option<semver::Version> {
    let trimmed = raw.trim().trim_start_matches(['v', 'V']);
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(v) = semver::Version::parse(trimmed) {
        return Some(v);
    }

    let mut parts: Vec<u64> = Vec::with_capacity(3);
    for part in trimmed.split('.') {
        parts.push(part.parse().ok()?);
    }
    if parts.len() > 3 {
        return None;
    }
    parts.resize(3, 0);
    Some(semver::Version::new(parts[0], parts[1], parts[2]))
}

/// Device identity posted to the manifest API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceContext {
    pub channel_no: String,
    pub buss_type: u32,
    pub app_type: u32,
    pub bank_app_version: String,
    pub device_code: String,
    #[serde(rename = "termIP")]
    pub term_ip: String,
    pub oper_no: String,
}

impl DeviceContext {
    pub fn from_config(api: &ApiConfig) -> Self {
        Self {
            channel_no: api.channel_no.clone(),
            buss_type: 0,
            app_type: 0,
            bank_app_version: api.app_version.clone(),
            device_code: api.device_code.clone(),
            term_ip: api.term_ip.clone(),
            oper_no: api.oper_no.clone(),
        }
    }
}
