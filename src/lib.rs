//! bundlegate - versioned web bundle cache with integrity-checked origin fallback
//!
//! A hybrid app's embedded renderer loads its front-end bundle through
//! [`Gateway`]: the version API decides which resource namespace is
//! current, cached files are served from disk, and misses are fetched from
//! the origin and checked against the namespace's hash manifest before
//! they are stored.

pub mod audit;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod integrity;
pub mod origin;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod transport;
pub mod ui;
pub mod version;

pub use error::{GateError, GateResult};
pub use gateway::{BlockingGateway, Gateway};
