//! Database handle
//!
//! A [`Database`] is the object every caller works with. It holds a mutable
//! [`NodeGraph`] while prefixes are being added, a validated [`BinaryStore`]
//! once serialized or loaded, or both. Any mutation drops the store, and
//! the next query or save serializes the graph again.
//!
//! # Examples
//!
//! ```
//! use prefixdb::{Database, Lookup};
//!
//! let mut db = Database::new();
//! db.insert_str("192.168.0.0/16")?;
//! db.insert_str("10.0.0.0/8")?;
//!
//! assert_eq!(db.search_str("192.168.3.4")?, Lookup::Match);
//! assert_eq!(db.search_str("172.16.0.1")?, Lookup::NoMatch);
//!
//! let bytes = db.to_vec()?;
//! let loaded = Database::load_bytes(&bytes, prefixdb::BufferMode::Borrow)?;
//! assert!(loaded.lookup(0x0A00_0001u32)?.is_match());
//! # Ok::<(), prefixdb::PrefixDbError>(())
//! ```

use crate::error::{PrefixDbError, Result};
use crate::file_reader;
use crate::format::Layout;
use crate::import;
use crate::loader::{self, BufferMode, LoadMode};
use crate::node_graph::NodeGraph;
use crate::serializer;
use crate::store::{Backing, BinaryStore, Lookup};
use crate::tree_builder::{check_length, parse_address, parse_prefix};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// IPv4 prefix database
#[derive(Debug)]
pub struct Database<'a> {
    graph: Option<NodeGraph>,
    store: Option<BinaryStore<'a>>,
    released: bool,
}

/// Summary of a database's current representation
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseStats {
    /// Footer geometry, when a serialized store is held
    pub layout: Option<Layout>,
    /// Where the store's bytes live
    pub backing: Option<Backing>,
    /// Live trie nodes, when a graph is held
    pub graph_nodes: Option<usize>,
    /// True when the graph has changes not yet serialized
    pub stale: bool,
}

/// Fluent file opener returned by [`Database::from_path`]
#[derive(Debug, Clone)]
pub struct DatabaseOpener {
    path: PathBuf,
    mode: LoadMode,
}

impl DatabaseOpener {
    /// Map the file instead of copying it
    pub fn mmap(mut self) -> Self {
        self.mode = LoadMode::Mmap;
        self
    }

    /// Read the file into an owned buffer (the default)
    pub fn copy(mut self) -> Self {
        self.mode = LoadMode::Copy;
        self
    }

    /// Pick the load mode explicitly
    pub fn mode(mut self, mode: LoadMode) -> Self {
        self.mode = mode;
        self
    }

    /// Validate and open the file
    pub fn open(self) -> Result<Database<'static>> {
        Database::load_file(&self.path, self.mode)
    }
}

impl Default for Database<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl Database<'static> {
    /// Open a store from a file
    pub fn load_file<P: AsRef<Path>>(path: P, mode: LoadMode) -> Result<Self> {
        let store = loader::load_file(path, mode)?;
        Ok(Self::from_store(store))
    }

    /// Open a store from a copy of `data`. The handle owns the copy and
    /// does not keep `data` borrowed.
    pub fn copy_bytes(data: &[u8]) -> Result<Self> {
        let store = loader::copy_bytes(data)?;
        Ok(Self::from_store(store))
    }

    /// Start configuring a file load
    pub fn from_path<P: AsRef<Path>>(path: P) -> DatabaseOpener {
        DatabaseOpener {
            path: path.as_ref().to_path_buf(),
            mode: LoadMode::default(),
        }
    }
}

impl<'a> Database<'a> {
    /// Empty database
    pub fn new() -> Self {
        Self {
            graph: Some(NodeGraph::new()),
            store: None,
            released: false,
        }
    }

    /// Open a store from caller memory. With [`BufferMode::Borrow`] the
    /// database keeps referencing `data`. The handle is tied to `data` in
    /// either mode; [`Database::copy_bytes`] gives an independent one.
    pub fn load_bytes(data: &'a [u8], mode: BufferMode) -> Result<Self> {
        let store = loader::load_bytes(data, mode)?;
        Ok(Self::from_store(store))
    }

    /// Wrap an already validated store
    pub fn from_store(store: BinaryStore<'a>) -> Self {
        Self {
            graph: None,
            store: Some(store),
            released: false,
        }
    }

    fn assert_live(&self) {
        assert!(!self.released, "prefix database used after release");
    }

    /// Graph ready for mutation. A loaded store is thawed first; the store
    /// is dropped once a graph exists.
    fn graph_mut(&mut self) -> Result<&mut NodeGraph> {
        self.assert_live();
        if self.graph.is_none() {
            if let Some(store) = &self.store {
                self.graph = Some(NodeGraph::thaw(store)?);
            }
        }
        self.store = None;
        Ok(self.graph.get_or_insert_with(NodeGraph::new))
    }

    /// Store the prefix `address/length` (length 1..=32)
    pub fn insert(&mut self, address: impl Into<u32>, length: u8) -> Result<()> {
        check_length(length)?;
        let address = address.into();
        self.graph_mut()?.insert(address, length)
    }

    /// Store a prefix written as `a.b.c.d` or `a.b.c.d/len`
    pub fn insert_str(&mut self, text: &str) -> Result<()> {
        let (address, length) = parse_prefix(text)?;
        self.insert(address, length)
    }

    /// Import a prefix list (one per line, `#` comments); returns how many
    /// prefixes were inserted. Stops at the first bad line, keeping the
    /// prefixes inserted before it.
    pub fn insert_file<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        self.assert_live();
        let path = path.as_ref();
        let reader = file_reader::open(path).map_err(|e| {
            PrefixDbError::Access(format!("cannot open {}: {}", path.display(), e))
        })?;
        let graph = self.graph_mut()?;
        import::import_lines(reader, |address, length| graph.insert(address, length))
    }

    /// Withdraw every address in `address/length`; returns false when no
    /// stored prefix overlapped it. A range with nothing stored leaves the
    /// serialized store current.
    pub fn remove(&mut self, address: impl Into<u32>, length: u8) -> Result<bool> {
        check_length(length)?;
        let address = address.into();
        if !self.overlaps(address, length) {
            return Ok(false);
        }
        self.graph_mut()?.remove(address, length)
    }

    fn overlaps(&self, address: u32, length: u8) -> bool {
        self.assert_live();
        match (&self.store, &self.graph) {
            (Some(store), _) => store.overlaps(address, length),
            (None, Some(graph)) => graph.overlaps(address, length),
            (None, None) => false,
        }
    }

    /// True when the graph holds changes not yet serialized
    pub fn is_stale(&self) -> bool {
        self.assert_live();
        self.store.is_none()
    }

    /// Serialized store, serializing the graph first if it changed
    pub fn store(&mut self) -> Result<&BinaryStore<'a>> {
        self.assert_live();
        let store = match self.store.take() {
            Some(store) => store,
            None => {
                let graph = self.graph.get_or_insert_with(NodeGraph::new);
                loader::load_vec(serializer::serialize(graph)?)?
            }
        };
        let store: &BinaryStore<'a> = self.store.insert(store);
        Ok(store)
    }

    /// Serialized bytes, borrowed from the handle
    pub fn to_bytes(&mut self) -> Result<&[u8]> {
        Ok(self.store()?.as_bytes())
    }

    /// Serialized bytes, copied into a new buffer
    pub fn to_vec(&mut self) -> Result<Vec<u8>> {
        let bytes = self.to_bytes()?;
        let mut data = Vec::new();
        data.try_reserve_exact(bytes.len())?;
        data.extend_from_slice(bytes);
        Ok(data)
    }

    /// Write the serialized database to `path`.
    ///
    /// The bytes go to `<path>.tmp` first and are renamed over `path`, so a
    /// reader never sees a half-written file.
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let data = self.to_bytes()?;

        let mut tmp = OsString::from(path.as_os_str());
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, data).map_err(|e| {
            PrefixDbError::Access(format!("cannot write {}: {}", tmp.display(), e))
        })?;
        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(PrefixDbError::Access(format!(
                "cannot replace {}: {}",
                path.display(),
                e
            )));
        }
        debug!(path = %path.display(), bytes = data.len(), "saved database");
        Ok(())
    }

    /// Query `address`, serializing first if the graph changed
    pub fn search(&mut self, address: impl Into<u32>) -> Result<Lookup> {
        let address = address.into();
        self.store()?.lookup(address)
    }

    /// Query a dotted-quad address
    pub fn search_str(&mut self, text: &str) -> Result<Lookup> {
        let address = parse_address(text)?;
        self.search(address)
    }

    /// Read-only query. Uses the serialized store when current and walks
    /// the graph otherwise; never serializes.
    pub fn lookup(&self, address: impl Into<u32>) -> Result<Lookup> {
        self.assert_live();
        let address = address.into();
        match (&self.store, &self.graph) {
            (Some(store), _) => store.lookup(address),
            (None, Some(graph)) => Ok(graph.lookup(address)),
            (None, None) => Ok(Lookup::NoMatch),
        }
    }

    /// Replace the whole representation with the store in `path`.
    /// On failure the current contents are left untouched.
    pub fn reload<P: AsRef<Path>>(&mut self, path: P, mode: LoadMode) -> Result<()> {
        self.assert_live();
        let store = loader::load_file(path, mode)?;
        self.graph = None;
        self.store = Some(store);
        Ok(())
    }

    /// Free both representations. Releasing twice is an error; any other
    /// use after release panics.
    pub fn release(&mut self) -> Result<()> {
        if self.released {
            return Err(PrefixDbError::Released);
        }
        self.graph = None;
        self.store = None;
        self.released = true;
        Ok(())
    }

    /// True once [`Database::release`] has run
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Summary of what the handle currently holds
    pub fn stats(&self) -> DatabaseStats {
        self.assert_live();
        DatabaseStats {
            layout: self.store.as_ref().map(|store| *store.layout()),
            backing: self.store.as_ref().map(BinaryStore::backing),
            graph_nodes: self.graph.as_ref().map(NodeGraph::len),
            stale: self.store.is_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::Ipv4Addr;
    use tempfile::{tempdir, NamedTempFile};

    fn sample() -> Database<'static> {
        let mut db = Database::new();
        db.insert_str("192.168.0.0/16").unwrap();
        db.insert_str("192.168.5.0/24").unwrap();
        db.insert_str("10.0.0.0/8").unwrap();
        db
    }

    #[test]
    fn test_search_serializes_once() {
        let mut db = sample();
        assert!(db.is_stale());
        assert!(db.search_str("192.168.3.4").unwrap().is_match());
        assert!(!db.is_stale());
        assert!(!db.search_str("172.16.0.1").unwrap().is_match());
        assert!(db.search_str("10.255.255.255").unwrap().is_match());
    }

    #[test]
    fn test_lookup_does_not_serialize() {
        let db = sample();
        assert!(db.lookup(Ipv4Addr::new(10, 1, 2, 3)).unwrap().is_match());
        assert!(db.is_stale());
    }

    #[test]
    fn test_mutation_invalidates_store() {
        let mut db = sample();
        db.store().unwrap();
        db.insert(Ipv4Addr::new(172, 16, 0, 0), 12).unwrap();
        assert!(db.is_stale());
        assert!(db.search_str("172.20.1.1").unwrap().is_match());
    }

    #[test]
    fn test_bad_length_keeps_store() {
        let mut db = sample();
        db.store().unwrap();
        assert!(db.insert(0u32, 0).is_err());
        assert!(db.insert(0u32, 33).is_err());
        assert!(!db.is_stale());
    }

    #[test]
    fn test_insert_after_load_keeps_loaded_prefixes() {
        let bytes = sample().to_vec().unwrap();
        let mut db = Database::load_bytes(&bytes, BufferMode::Borrow).unwrap();
        db.insert_str("172.16.0.0/12").unwrap();
        assert!(db.search_str("192.168.200.1").unwrap().is_match());
        assert!(db.search_str("172.31.0.1").unwrap().is_match());
    }

    #[test]
    fn test_remove_through_database() {
        let mut db = sample();
        assert!(db.remove(Ipv4Addr::new(192, 168, 5, 0), 24).unwrap());
        assert!(!db.search_str("192.168.5.1").unwrap().is_match());
        assert!(db.search_str("192.168.4.1").unwrap().is_match());
    }

    #[test]
    fn test_remove_missing_range_keeps_store() {
        let bytes = sample().to_vec().unwrap();
        let mut db = Database::load_bytes(&bytes, BufferMode::Borrow).unwrap();
        assert!(!db.remove(Ipv4Addr::new(172, 16, 0, 0), 12).unwrap());
        assert!(!db.is_stale());
        assert_eq!(db.stats().backing, Some(Backing::Borrowed));
        assert_eq!(db.stats().graph_nodes, None);

        let mut built = sample();
        built.store().unwrap();
        assert!(!built.remove(Ipv4Addr::new(11, 0, 0, 0), 8).unwrap());
        assert!(!built.is_stale());
        assert!(built.remove(Ipv4Addr::new(10, 1, 0, 0), 16).unwrap());
        assert!(built.is_stale());
    }

    #[test]
    fn test_copy_bytes_is_independent() {
        let bytes = sample().to_vec().unwrap();
        let mut db = Database::copy_bytes(&bytes).unwrap();
        drop(bytes);
        assert_eq!(db.stats().backing, Some(Backing::Owned));
        assert!(db.search_str("192.168.3.4").unwrap().is_match());
    }

    #[test]
    fn test_save_and_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.pfdb");
        sample().save(&path).unwrap();
        assert!(!dir.path().join("test.pfdb.tmp").exists());

        let mut db = Database::from_path(&path).mmap().open().unwrap();
        assert_eq!(db.stats().backing, Some(Backing::Mapped));
        assert!(db.search_str("192.168.3.4").unwrap().is_match());
    }

    #[test]
    fn test_insert_file() {
        let mut list = NamedTempFile::new().unwrap();
        writeln!(list, "# blocklist").unwrap();
        writeln!(list, "10.0.0.0/8").unwrap();
        writeln!(list).unwrap();
        writeln!(list, "1.2.3.4 # single host").unwrap();
        list.flush().unwrap();

        let mut db = Database::new();
        assert_eq!(db.insert_file(list.path()).unwrap(), 2);
        assert!(db.search_str("1.2.3.4").unwrap().is_match());
        assert!(!db.search_str("1.2.3.5").unwrap().is_match());
    }

    #[test]
    fn test_reload_failure_keeps_contents() {
        let mut db = sample();
        assert!(db.reload("/nonexistent/db.pfdb", LoadMode::Copy).is_err());
        assert!(db.search_str("10.0.0.1").unwrap().is_match());
    }

    #[test]
    fn test_release_twice() {
        let mut db = sample();
        db.release().unwrap();
        assert!(db.is_released());
        assert_eq!(db.release(), Err(PrefixDbError::Released));
    }

    #[test]
    #[should_panic(expected = "used after release")]
    fn test_use_after_release_panics() {
        let mut db = sample();
        db.release().unwrap();
        let _ = db.search_str("10.0.0.1");
    }

    #[test]
    fn test_empty_database() {
        let mut db = Database::new();
        assert_eq!(db.to_bytes().unwrap().len(), crate::format::FOOTER_SIZE);
        assert!(!db.search(u32::MAX).unwrap().is_match());
    }
}
