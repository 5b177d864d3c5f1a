//! File persistence for trie images.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use memmap2::Mmap;
use tempfile::NamedTempFile;
use tracing::info;

use dat_rs::DoubleArrayTrie;

use crate::error::Result;

/// Writes `trie` to `path` through a temporary file in the same directory,
/// renamed into place once complete.
pub(crate) fn write_trie(trie: &DoubleArrayTrie, path: &Path, sync: bool) -> Result<()> {
    let bytes = trie.to_bytes();
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(&bytes)?;
    if sync {
        tmp.as_file().sync_all()?;
    }
    tmp.persist(path).map_err(|e| e.error)?;
    info!(path = %path.display(), keys = trie.len(), bytes = bytes.len(), "saved trie");
    Ok(())
}

/// Maps `path` read-only and loads it into `trie`. On error `trie` is
/// untouched.
pub(crate) fn read_trie(trie: &mut DoubleArrayTrie, path: &Path) -> Result<()> {
    let file = File::open(path)?;
    // SAFETY: the map is only read while parsing and dropped before
    // returning; the loaded trie owns its own arrays.
    let map = unsafe { Mmap::map(&file)? };
    trie.load(&map)?;
    info!(path = %path.display(), keys = trie.len(), bytes = map.len(), "loaded trie");
    Ok(())
}
