//! Version manifest resolution
//!
//! The manifest names the active bundle. It is fetched from the manifest
//! API, validated, persisted, and replayed from storage when the API cannot
//! be reached.

pub mod client;
pub mod manifest;
pub mod probe;
pub mod resolver;
pub mod store;

pub use client::{HttpVersionApiClient, VersionApiClient};
pub use manifest::{DeviceContext, RawManifestResponse, VersionManifest};
pub use probe::{NetworkProbe, TcpProbe};
pub use resolver::{ResolveOrigin, VersionResolver};
pub use store::{FileKeyValueStore, KeyValueStore, ManifestStore, MemoryKeyValueStore, MANIFEST_KEY};
