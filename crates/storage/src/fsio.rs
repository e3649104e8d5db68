//! Filesystem helpers shared by the blob and metadata stores.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use uuid::Uuid;

use crate::error::StoreError;

/// Write a file atomically: stage the bytes in `temp_dir`, then rename
/// into place. Parent directories are created as needed.
pub(crate) async fn write_atomic(
    temp_dir: &Path,
    dest: &Path,
    data: &[u8],
) -> Result<(), StoreError> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::io(parent, e))?;
    }
    fs::create_dir_all(temp_dir)
        .await
        .map_err(|e| StoreError::io(temp_dir, e))?;

    let staged: PathBuf = temp_dir.join(format!("{}.tmp", Uuid::new_v4().simple()));
    fs::write(&staged, data)
        .await
        .map_err(|e| StoreError::io(&staged, e))?;

    if let Err(e) = fs::rename(&staged, dest).await {
        // Best-effort cleanup of the staged file.
        let _ = fs::remove_file(&staged).await;
        return Err(StoreError::io(dest, e));
    }
    Ok(())
}

/// Serialize a document as pretty JSON and write it atomically.
pub(crate) async fn write_json<T: Serialize>(
    temp_dir: &Path,
    dest: &Path,
    value: &T,
) -> Result<(), StoreError> {
    let data: Vec<u8> = serde_json::to_vec_pretty(value)?;
    write_atomic(temp_dir, dest, &data).await
}

/// Read and decode a JSON document. Returns `None` if the file does not
/// exist.
pub(crate) async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let data: Vec<u8> = match fs::read(path).await {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::io(path, e)),
    };
    let value: T = serde_json::from_slice(&data).map_err(|e| StoreError::corrupt(path, e))?;
    Ok(Some(value))
}

/// Decode every `.json` document under `dir`, descending `depth` levels
/// of subdirectories first. A missing directory yields an empty list.
pub(crate) async fn read_json_tree<T: DeserializeOwned>(
    dir: &Path,
    depth: usize,
) -> Result<Vec<T>, StoreError> {
    let mut frontier: Vec<PathBuf> = vec![dir.to_path_buf()];
    for _ in 0..depth {
        let mut next: Vec<PathBuf> = Vec::new();
        for current in frontier {
            for entry in list_dir(&current).await? {
                if entry.is_dir() {
                    next.push(entry);
                }
            }
        }
        frontier = next;
    }

    let mut documents: Vec<T> = Vec::new();
    for current in frontier {
        let mut files: Vec<PathBuf> = list_dir(&current)
            .await?
            .into_iter()
            .filter(|p| p.extension().map(|ext| ext == "json").unwrap_or(false))
            .collect();
        files.sort();
        for file in files {
            if let Some(value) = read_json(&file).await? {
                documents.push(value);
            }
        }
    }
    Ok(documents)
}

/// List directory entries. A missing directory yields an empty list.
async fn list_dir(dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
    let mut reader = match fs::read_dir(dir).await {
        Ok(reader) => reader,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StoreError::io(dir, e)),
    };
    let mut entries: Vec<PathBuf> = Vec::new();
    while let Some(entry) = reader
        .next_entry()
        .await
        .map_err(|e| StoreError::io(dir, e))?
    {
        entries.push(entry.path());
    }
    Ok(entries)
}
