//! Write-then-rename file replacement
//!
//! Readers either see the previous file or the complete new one. The
//! temporary lives next to the target so the final rename stays on one
//! filesystem; if anything fails before the rename, dropping the
//! `NamedTempFile` removes it.

use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Atomically replace `path` with `data`, creating parent directories
pub fn write_atomic_blocking(path: &Path, data: &[u8]) -> io::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;
    std::fs::create_dir_all(parent)?;

    let mut temp = NamedTempFile::new_in(parent)?;
    temp.write_all(data)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Async wrapper running the write on the blocking pool
pub async fn write_atomic(path: &Path, data: Vec<u8>) -> io::Result<()> {
    let target = path.to_path_buf();
    tokio::task::spawn_blocking(move || write_atomic_blocking(&target, &data))
        .await
        .map_err(io::Error::other)?
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn creates_parents_and_replaces() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/file.json");

        write_atomic(&path, b"first".to_vec()).await.unwrap();
        write_atomic(&path, b"second".to_vec()).await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"second");
        let siblings: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .collect();
        assert_eq!(siblings.len(), 1, "temporary file left behind");
    }

    #[test]
    fn rejects_rootless_path() {
        let err = write_atomic_blocking(Path::new(""), b"x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
