//! CLI command implementations

pub mod cache;
pub mod config;
pub mod get;
pub mod hashes;
pub mod resolve;
pub mod status;

pub use cache::execute as cache;
pub use config::execute as config;
pub use get::execute as get;
pub use hashes::execute as hashes;
pub use resolve::execute as resolve;
pub use status::execute as status;
