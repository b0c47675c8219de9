//! Content integrity verification
//!
//! The origin publishes, per namespace, a hash manifest mapping digested
//! relative paths to digested content. Every byte served from cache or
//! origin is checked against it before it reaches the renderer.

pub mod coalesce;
pub mod digest;
pub mod index;
pub mod store;

pub use digest::HashAlgorithm;
pub use index::{HashIndex, Integrity, Verification};
pub use store::HashIndexStore;
