//! Job-scoped scratch files.
//!
//! Each file gets a random name inside the scratch directory, so worker
//! processes sharing a directory never collide. Files are removed when the
//! [`ScratchFile`] is dropped, which covers early returns and unwinding.

use std::path::{Path, PathBuf};

use tempfile::TempPath;
use tracing::warn;

use crate::error::MediaResult;

/// Directory holding scratch files, created on demand.
#[derive(Debug, Clone)]
pub struct ScratchSpace {
    dir: PathBuf,
}

impl ScratchSpace {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create an empty, uniquely named file ending in `suffix`.
    pub fn file(&self, suffix: &str) -> MediaResult<ScratchFile> {
        std::fs::create_dir_all(&self.dir)?;

        let path = tempfile::Builder::new()
            .prefix("burnin-")
            .suffix(suffix)
            .tempfile_in(&self.dir)?
            .into_temp_path();

        Ok(ScratchFile { path })
    }

    /// Create a scratch file holding `data`.
    pub async fn file_with(&self, suffix: &str, data: &[u8]) -> MediaResult<ScratchFile> {
        let file = self.file(suffix)?;
        file.write(data).await?;
        Ok(file)
    }
}

/// A file owned by one job execution.
#[derive(Debug)]
pub struct ScratchFile {
    path: TempPath,
}

impl ScratchFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the file contents.
    pub async fn write(&self, data: &[u8]) -> MediaResult<()> {
        tokio::fs::write(self.path(), data).await?;
        Ok(())
    }

    /// Read the whole file.
    pub async fn read(&self) -> MediaResult<Vec<u8>> {
        Ok(tokio::fs::read(self.path()).await?)
    }

    /// Delete the file now, reporting failures.
    pub fn close(self) -> MediaResult<()> {
        self.path.close()?;
        Ok(())
    }
}

/// Close every file, logging failures instead of returning them.
pub fn close_all<I>(files: I)
where
    I: IntoIterator<Item = ScratchFile>,
{
    for file in files {
        let path = file.path().to_path_buf();
        if let Err(e) = file.close() {
            warn!("Failed to remove scratch file {}: {}", path.display(), e);
        }
    }
}
