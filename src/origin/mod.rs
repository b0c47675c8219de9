//! Origin access and request interception

pub mod endpoint;
pub mod mime;
pub mod response;
pub mod server;

pub use endpoint::OriginEndpoint;
pub use response::{CacheStatus, ErrorDetail, InterceptResponse};
pub use server::{OriginFallbackServer, ServerOptions};
