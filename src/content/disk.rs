/// Filesystem-backed content source
use crate::{
    content::{ContentSource, DirEntryInfo},
    error::{GateError, GateResult},
};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;

/// Reads content straight from local disk
#[derive(Debug, Clone, Default)]
pub struct DiskContentSource;

impl DiskContentSource {
    pub fn new() -> Self {
        Self
    }
}

fn read_error(path: &Path, e: std::io::Error) -> GateError {
    GateError::Io(std::io::Error::new(
        e.kind(),
        format!("Failed to read {}: {}", path.display(), e),
    ))
}

#[async_trait]
impl ContentSource for DiskContentSource {
    async fn list_dir(&self, path: &Path) -> GateResult<Option<Vec<DirEntryInfo>>> {
        let mut reader = match fs::read_dir(path).await {
            Ok(reader) => reader,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(read_error(path, e)),
        };

        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await.map_err(|e| read_error(path, e))? {
            let file_type = entry.file_type().await.map_err(|e| read_error(path, e))?;
            // Links count as whatever they point at; dangling ones as files
            let is_dir = if file_type.is_symlink() {
                fs::metadata(entry.path())
                    .await
                    .map(|m| m.is_dir())
                    .unwrap_or(false)
            } else {
                file_type.is_dir()
            };
            entries.push(DirEntryInfo {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(Some(entries))
    }

    async fn read_to_string(&self, path: &Path) -> GateResult<Option<String>> {
        match fs::read_to_string(path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(read_error(path, e)),
        }
    }

    async fn read_bytes(&self, path: &Path) -> GateResult<Option<Vec<u8>>> {
        match fs::read(path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(read_error(path, e)),
        }
    }
}
