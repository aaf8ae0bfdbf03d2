use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::store::PageId;

/// Move a file from `src` to `dst`. Uses `rename` first and falls back to
/// copy + delete when the two paths are on different filesystems.
fn move_file(src: &Path, dst: &Path) -> Result<(), StoreError> {
    if std::fs::rename(src, dst).is_ok() {
        return Ok(());
    }

    std::fs::copy(src, dst).map_err(|e| StoreError::MoveFile {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source: e,
    })?;
    std::fs::remove_file(src).map_err(|e| StoreError::MoveFile {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

/// Directory holding one `page_{id}.png` per stored page.
#[derive(Debug, Clone)]
pub struct PageImages {
    directory: PathBuf,
}

impl PageImages {
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn ensure_directory(&self) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.directory).map_err(|e| StoreError::CreateDirectory {
            path: self.directory.clone(),
            source: e,
        })
    }

    pub fn path_for(&self, id: PageId) -> PathBuf {
        self.directory.join(format!("page_{}.png", id))
    }

    pub fn exists(&self, id: PageId) -> bool {
        self.path_for(id).exists()
    }

    /// Moves a staged raster into its final location for `id`.
    pub fn commit(&self, staged: &Path, id: PageId) -> Result<PathBuf, StoreError> {
        let target = self.path_for(id);
        move_file(staged, &target)?;
        Ok(target)
    }

    /// Removes the image for `id`. A missing file is not an error.
    pub fn remove(&self, id: PageId) -> Result<bool, StoreError> {
        let path = self.path_for(id);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::RemoveFile { path, source: e }),
        }
    }
}
