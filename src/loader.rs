//! Loader: open a Binary Store from memory or from a file.
//!
//! Nothing is allocated or mapped until the footer has been validated
//! against the real buffer or file length. File loads read only the last
//! 31 bytes first (seek to end), then copy or map the whole file and check
//! the footer once more on the bytes actually obtained.
//!
//! # Example
//!
//! ```no_run
//! use prefixdb::loader::{load_file, LoadMode};
//!
//! let store = load_file("blocklist.pfdb", LoadMode::Mmap)?;
//! println!("{} records", store.layout().nodes_count);
//! # Ok::<(), prefixdb::PrefixDbError>(())
//! ```

use crate::error::{PrefixDbError, Result};
use crate::format::{self, FOOTER_SIZE};
use crate::store::{BinaryStore, Storage};
use memmap2::Mmap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use tracing::debug;

/// How a file-backed store holds its bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadMode {
    /// Read the whole file into an owned buffer
    #[default]
    Copy,
    /// Map the file read-only; pages are shared with the filesystem cache
    Mmap,
}

/// How a buffer-backed store holds its bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BufferMode {
    /// Copy the caller's bytes
    #[default]
    Copy,
    /// Reference the caller's bytes for the store's lifetime
    Borrow,
}

/// Validate `data` and open it as a store.
///
/// The result is tied to `data` even in [`BufferMode::Copy`]; use
/// [`copy_bytes`] for a store that outlives the caller's buffer.
pub fn load_bytes(data: &[u8], mode: BufferMode) -> Result<BinaryStore<'_>> {
    match mode {
        BufferMode::Copy => copy_bytes(data),
        BufferMode::Borrow => {
            let layout = format::parse_buffer(data)?;
            debug!(?mode, nodes_count = layout.nodes_count, "loaded store from buffer");
            Ok(BinaryStore::new(Storage::Borrowed(data), layout))
        }
    }
}

/// Validate `data` and copy it into a store owning its buffer
pub fn copy_bytes(data: &[u8]) -> Result<BinaryStore<'static>> {
    let layout = format::parse_buffer(data)?;
    let mut owned = Vec::new();
    owned.try_reserve_exact(data.len())?;
    owned.extend_from_slice(data);
    debug!(mode = ?BufferMode::Copy, nodes_count = layout.nodes_count, "loaded store from buffer");
    Ok(BinaryStore::new(Storage::Owned(owned), layout))
}

/// Validate and take ownership of `data` without copying
pub fn load_vec(data: Vec<u8>) -> Result<BinaryStore<'static>> {
    let layout = format::parse_buffer(&data)?;
    Ok(BinaryStore::new(Storage::Owned(data), layout))
}

fn access(path: &Path, action: &str, err: std::io::Error) -> PrefixDbError {
    PrefixDbError::Access(format!("cannot {} {}: {}", action, path.display(), err))
}

/// Validate and open the store in `path`
pub fn load_file<P: AsRef<Path>>(path: P, mode: LoadMode) -> Result<BinaryStore<'static>> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|e| access(path, "open", e))?;
    let len = file.metadata().map_err(|e| access(path, "stat", e))?.len();
    if len < FOOTER_SIZE as u64 {
        return Err(PrefixDbError::InvalidParameter(format!(
            "{} is {} bytes, too small for a database",
            path.display(),
            len
        )));
    }

    let mut tail = [0u8; FOOTER_SIZE];
    file.seek(SeekFrom::Start(len - FOOTER_SIZE as u64))
        .and_then(|_| file.read_exact(&mut tail))
        .map_err(|e| access(path, "read footer of", e))?;
    format::parse_footer(&tail, len)?;

    let storage = match mode {
        LoadMode::Mmap => {
            // SAFETY: the map is read-only; callers must not modify the file
            // while it is open, as for any shared mapping
            let map = unsafe { Mmap::map(&file) }.map_err(|e| access(path, "map", e))?;
            Storage::Mapped { map, _file: file }
        }
        LoadMode::Copy => {
            let mut data = Vec::new();
            data.try_reserve_exact(len as usize)?;
            file.seek(SeekFrom::Start(0))
                .and_then(|_| file.read_to_end(&mut data))
                .map_err(|e| access(path, "read", e))?;
            Storage::Owned(data)
        }
    };

    // The file may have changed between the footer read and now
    let layout = format::parse_buffer(storage.as_slice())?;
    debug!(
        path = %path.display(),
        ?mode,
        nodes_count = layout.nodes_count,
        bytes = layout.total_size,
        "loaded store from file"
    );
    Ok(BinaryStore::new(storage, layout))
}
