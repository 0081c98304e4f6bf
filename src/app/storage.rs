//! Temporary storage for fetched content
//!
//! Every registry owns one private temporary directory. Each transfer attempt
//! writes into its own file inside it, so a superseded attempt can never
//! clobber the bytes of the attempt that replaced it. Files are removed when
//! their [`TempStorage`] is dropped, the directory when the allocator is.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::{Builder, NamedTempFile, TempDir};
use tracing::{debug, error};

use crate::constants::storage;
use crate::errors::{StorageError, StorageResult};

/// Hands out fresh, exclusively owned temporary files
#[derive(Debug)]
pub struct StorageAllocator {
    dir: TempDir,
    file_prefix: String,
}

impl StorageAllocator {
    /// Create an allocator with a private directory under `root`
    ///
    /// `root` defaults to the system temporary directory and is created if
    /// missing.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::DirectoryNotAccessible` if the directory cannot be created
    pub fn new(root: Option<&Path>, file_prefix: &str) -> StorageResult<Self> {
        let root = root
            .map(Path::to_path_buf)
            .unwrap_or_else(std::env::temp_dir);

        std::fs::create_dir_all(&root).map_err(|e| {
            error!("Failed to create storage root {}: {}", root.display(), e);
            StorageError::DirectoryNotAccessible { path: root.clone() }
        })?;

        let dir = Builder::new()
            .prefix(storage::DIR_PREFIX)
            .tempdir_in(&root)
            .map_err(|e| {
                error!("Failed to create storage directory in {}: {}", root.display(), e);
                StorageError::DirectoryNotAccessible { path: root.clone() }
            })?;

        debug!("Created storage directory: {}", dir.path().display());

        Ok(Self {
            dir,
            file_prefix: file_prefix.to_string(),
        })
    }

    /// Directory holding every allocated file
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Allocate a new empty file
    pub fn allocate(&self) -> StorageResult<TempStorage> {
        let file = Builder::new()
            .prefix(&self.file_prefix)
            .tempfile_in(self.dir.path())
            .map_err(|e| StorageError::AllocationFailed {
                path: self.dir.path().to_path_buf(),
                reason: e.to_string(),
            })?;

        Ok(TempStorage { file })
    }
}

/// One temporary file backing a transfer attempt
#[derive(Debug)]
pub struct TempStorage {
    file: NamedTempFile,
}

impl TempStorage {
    /// Location of the file on disk
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Owned copy of the path
    pub fn to_path_buf(&self) -> PathBuf {
        self.file.path().to_path_buf()
    }

    /// Open an independent handle for writing the transfer
    pub(crate) fn open_writer(&self) -> io::Result<File> {
        self.file.reopen()
    }

    /// Open a read-only handle positioned at the start of the file
    pub fn open_reader(&self) -> io::Result<File> {
        File::open(self.file.path())
    }

    /// Current size of the file in bytes
    pub fn len(&self) -> io::Result<u64> {
        Ok(self.file.as_file().metadata()?.len())
    }
}
