//! Versioned on-disk resource cache
//!
//! Resources are stored per namespace, one directory per deployed bundle.
//!
//! # Entry States
//!
//! | State | `get` | Description |
//! |-------|-------|-------------|
//! | Absent | `None` | Never written, evicted, or deleted after a failed check |
//! | Empty | `None` | Zero-length file left by an interrupted external write |
//! | Present | `Some` | Complete bytes, written via write-then-rename |

pub mod atomic;
pub mod lifecycle;
pub mod namespace;
pub mod store;

pub use lifecycle::CacheLifecycleManager;
pub use namespace::{normalize_relative, CacheNamespace, NamespaceKey};
pub use store::ResourceCache;

/// Format bytes as human-readable size
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_bytes_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }
}
