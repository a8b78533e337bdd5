//! Read-only memory mapped buffers
//!
//! Every index type in this crate sits on top of a [`MappedFile`]. The mapping is
//! shared through an `Arc`, so cloning a table handle is cheap and the region is
//! unmapped only once the last handle is dropped.

use std::fs::File;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

use memmap2::{Mmap, MmapMut};

use crate::error::{ReadError, Result};

/// An immutable, shareable memory map
#[derive(Clone, Debug)]
pub struct MappedFile {
    /// Memory mapped contents, wrapped in Arc for thread-safe sharing
    mmap: Arc<Mmap>,
}

impl MappedFile {
    /// Memory-maps a file in read-only mode
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// * The file cannot be opened
    /// * The file is not a regular file
    /// * The file is empty
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        // Verify input file is a file before attempting to map
        let file = File::open(path.as_ref())?;
        if !file.metadata()?.is_file() {
            return Err(ReadError::IncompatibleFile.into());
        }

        // Safety: the file is open and index files are never modified while mapped
        let mmap = unsafe { Mmap::map(&file)? };
        if mmap.is_empty() {
            return Err(ReadError::EmptyFile.into());
        }

        tracing::debug!(
            path = %path.as_ref().display(),
            bytes = mmap.len(),
            "mapped index file"
        );
        Ok(Self {
            mmap: Arc::new(mmap),
        })
    }

    /// Copies a byte slice into an anonymous read-only mapping
    ///
    /// Useful for indexes that are produced in memory, or embedded in a binary,
    /// and should be served through the same code path as files on disk.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(ReadError::EmptyFile.into());
        }
        let mut anon = MmapMut::map_anon(bytes.len())?;
        anon.copy_from_slice(bytes);
        let mmap = anon.make_read_only()?;
        Ok(Self {
            mmap: Arc::new(mmap),
        })
    }

    /// Returns the mapped bytes
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.mmap
    }
}

impl Deref for MappedFile {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.mmap
    }
}
