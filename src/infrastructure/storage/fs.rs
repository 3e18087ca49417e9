//! Filesystem helpers shared by the file-backed stores

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::domain::DomainError;

/// Lowercase hex SHA-256 of `bytes`
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Hidden sibling path unique to this call, e.g. `.registry.json.<uuid>.tmp`
pub fn temp_sibling(path: &Path, suffix: &str) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let unique = uuid::Uuid::new_v4().simple().to_string();

    path.with_file_name(format!(".{}.{}.{}", file_name, &unique[..8], suffix))
}

/// Write `bytes` to a temp file next to `path`, fsync it and rename it into place.
///
/// Readers see either the old file or the new one, never a partial write.
pub async fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), DomainError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| DomainError::io(parent, e))?;
    }

    let tmp = temp_sibling(path, "tmp");

    if let Err(error) = write_synced(&tmp, bytes).await {
        remove_file_quietly(&tmp).await;
        return Err(error);
    }

    if let Err(error) = tokio::fs::rename(&tmp, path).await {
        remove_file_quietly(&tmp).await;
        return Err(DomainError::io(path, error));
    }

    debug!(path = %path.display(), bytes = bytes.len(), "Atomically wrote file");
    Ok(())
}

async fn write_synced(path: &Path, bytes: &[u8]) -> Result<(), DomainError> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| DomainError::io(path, e))?;

    file.write_all(bytes)
        .await
        .map_err(|e| DomainError::io(path, e))?;
    file.sync_all().await.map_err(|e| DomainError::io(path, e))?;

    Ok(())
}

/// Read a file, mapping a missing file to `None`
pub async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, DomainError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(DomainError::io(path, e)),
    }
}

/// Best-effort removal of a temp file
pub async fn remove_file_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove temporary file"),
    }
}

/// Best-effort removal of a temp directory
pub async fn remove_dir_quietly(path: &Path) {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove temporary directory"),
    }
}
