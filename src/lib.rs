//! PrefixDB - Embeddable IPv4 Prefix-Matching Database
//!
//! PrefixDB stores a set of IPv4 prefixes (`10.0.0.0/8`, `192.168.5.0/24`,
//! single hosts) and answers one question very fast: is this address covered
//! by any stored prefix? Typical uses are blocklists, allowlists and network
//! classification at the edge of a service.
//!
//! # Quick Start
//!
//! ```rust
//! use prefixdb::{Database, LoadMode};
//!
//! let mut db = Database::new();
//! db.insert_str("192.168.0.0/16")?;
//! db.insert_str("192.168.5.0/24")?; // already covered, nothing added
//! db.insert_str("10.0.0.0/8")?;
//!
//! assert!(db.search_str("192.168.3.4")?.is_match());
//! assert!(!db.search_str("172.16.0.1")?.is_match());
//!
//! # let tmp_path = std::env::temp_dir().join("prefixdb_doctest_quickstart.pfdb");
//! db.save(&tmp_path)?;
//! let mut mapped = Database::load_file(&tmp_path, LoadMode::Mmap)?;
//! assert!(mapped.search_str("10.255.255.255")?.is_match());
//! # drop(mapped);
//! # let _ = std::fs::remove_file(&tmp_path);
//! # Ok::<(), prefixdb::PrefixDbError>(())
//! ```
//!
//! # Architecture
//!
//! Prefixes are collected in a binary trie, one level per address bit. On
//! save (or on the first query after a change) the trie is compacted and
//! written out as a dense array of fixed-width records:
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │  NodeGraph (mutable binary trie)     │
//! │  insert / remove / covering rules    │
//! └──────────────────────────────────────┘
//!          ↓ compact, number, write
//! ┌──────────────────────────────────────┐
//! │  Records  [bit 0 field][bit 1 field] │
//! │  ...                                 │
//! │  Footer   31 bytes, magic "PFDB"     │
//! └──────────────────────────────────────┘
//!          ↓ copy, borrow or mmap()
//! ┌──────────────────────────────────────┐
//! │  BinaryStore: lookups walk the raw   │
//! │  bytes, at most 32 steps             │
//! └──────────────────────────────────────┘
//! ```
//!
//! Serialized databases are position independent and contain no pointers,
//! so a file can be memory-mapped and queried without any parsing beyond
//! the footer check. See [`format`] for the exact layout.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Module declarations
/// Path-keyed cache of loaded stores with time-debounced reloads
pub mod cache;
/// Database handle tying the trie and its serialized form together
pub mod database;
/// Error types for prefixdb operations
pub mod error;
/// Plain, gzip and stdin readers for prefix lists
pub mod file_reader;
pub mod format;
/// Bulk import of prefix lists
pub mod import;
pub mod loader;
pub mod node_graph;
pub mod serializer;
pub mod store;
pub mod tree_builder;

// Public C API
pub mod c_api;

// Re-exports for Rust consumers

/// Database handle and its helpers
pub use crate::database::{Database, DatabaseOpener, DatabaseStats};

pub use crate::cache::{CacheConfig, DatabaseCache};
pub use crate::error::{PrefixDbError, Result};
pub use crate::format::Layout;
pub use crate::loader::{BufferMode, LoadMode};
pub use crate::node_graph::NodeGraph;
pub use crate::store::{Backing, BinaryStore, Lookup};
pub use crate::tree_builder::{parse_address, parse_prefix};

// Version information
/// Library version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library major version
pub const VERSION_MAJOR: u32 = 1;

/// Library minor version
pub const VERSION_MINOR: u32 = 1;

/// Library patch version
pub const VERSION_PATCH: u32 = 0;
