use crate::domain::record::Snapshot;
use crate::error::IngestError;
use std::path::{Path, PathBuf};

/// Writes the records as pretty-printed JSON to `<dir>/<snapshot file name>` and returns the path.
pub async fn write_snapshot(dir: &Path, snapshot: &Snapshot) -> Result<PathBuf, IngestError> {
    let path = dir.join(snapshot.file_name());
    let body = serde_json::to_vec_pretty(&snapshot.records)
        .map_err(|e| IngestError::fs(&path, std::io::Error::other(e)))?;

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| IngestError::fs(dir, e))?;
    tokio::fs::write(&path, body)
        .await
        .map_err(|e| IngestError::fs(&path, e))?;

    tracing::debug!(path = %path.display(), records = snapshot.records.len(), "staged snapshot");
    Ok(path)
}

pub async fn remove_staged(path: &Path) -> Result<(), IngestError> {
    tokio::fs::remove_file(path)
        .await
        .map_err(|e| IngestError::fs(path, e))
}
