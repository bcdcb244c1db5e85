/// Content access
///
/// Every read of identity directories, locale files and assets goes through
/// a [`ContentSource`], so the backing store can be swapped or instrumented.

pub mod disk;

pub use disk::DiskContentSource;

use crate::error::GateResult;
use async_trait::async_trait;
use std::path::Path;

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntryInfo {
    pub name: String,
    pub is_dir: bool,
}

/// Read-only content backend
///
/// "Not found" is reported as `Ok(None)`; any other failure is an error.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// List a directory, sorted by name
    async fn list_dir(&self, path: &Path) -> GateResult<Option<Vec<DirEntryInfo>>>;

    /// Read a UTF-8 text file
    async fn read_to_string(&self, path: &Path) -> GateResult<Option<String>>;

    /// Read a file as raw bytes
    async fn read_bytes(&self, path: &Path) -> GateResult<Option<Vec<u8>>>;
}
