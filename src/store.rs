//! Binary Store and Lookup Engine
//!
//! A [`BinaryStore`] is an immutable serialized database: owned bytes, a
//! borrowed slice of caller memory, or a read-only memory map of a file.
//! Lookups walk the positional records directly. Each step reads one
//! big-endian field of `records_size` bytes and either descends to another
//! record, stops with no match, or stops with a match. No tree is ever
//! rebuilt to answer a query.

use crate::error::{PrefixDbError, Result};
use crate::format::Layout;
use memmap2::Mmap;
use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::net::Ipv4Addr;

/// Outcome of a point query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Lookup {
    /// A stored prefix covers the address
    Match,
    /// No stored prefix covers the address
    NoMatch,
}

impl Lookup {
    /// True for [`Lookup::Match`]
    pub fn is_match(self) -> bool {
        self == Lookup::Match
    }
}

/// Decoded record field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pointer {
    /// Descend into this record
    Record(u32),
    /// Absent child: no match on this path
    DeadEnd,
    /// Terminal child: match
    Terminal,
}

/// Where the bytes of a store live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Backing {
    /// Heap buffer owned by the store
    Owned,
    /// Caller memory, borrowed for the store's lifetime
    Borrowed,
    /// Read-only shared mapping of a file
    Mapped,
}

pub(crate) enum Storage<'a> {
    Owned(Vec<u8>),
    Borrowed(&'a [u8]),
    /// The file stays open for as long as the mapping lives
    Mapped { map: Mmap, _file: File },
}

impl Storage<'_> {
    pub(crate) fn as_slice(&self) -> &[u8] {
        match self {
            Storage::Owned(data) => data.as_slice(),
            Storage::Borrowed(data) => data,
            Storage::Mapped { map, .. } => &map[..],
        }
    }
}

/// Immutable, validated serialized database
pub struct BinaryStore<'a> {
    storage: Storage<'a>,
    layout: Layout,
}

impl<'a> BinaryStore<'a> {
    /// `layout` must come from validating the footer of `storage`
    pub(crate) fn new(storage: Storage<'a>, layout: Layout) -> Self {
        Self { storage, layout }
    }

    /// Parsed footer fields
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// The serialized bytes, footer included
    pub fn as_bytes(&self) -> &[u8] {
        self.storage.as_slice()
    }

    /// Total byte length
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// True when the store has no records (nothing ever matches)
    pub fn is_empty(&self) -> bool {
        self.layout.nodes_count == 0
    }

    /// Where the bytes live
    pub fn backing(&self) -> Backing {
        match self.storage {
            Storage::Owned(_) => Backing::Owned,
            Storage::Borrowed(_) => Backing::Borrowed,
            Storage::Mapped { .. } => Backing::Mapped,
        }
    }

    /// Copy borrowed or mapped bytes into a store owning its buffer
    pub fn into_owned(self) -> Result<BinaryStore<'static>> {
        let storage = match self.storage {
            Storage::Owned(data) => Storage::Owned(data),
            other => {
                let bytes = other.as_slice();
                let mut data = Vec::new();
                data.try_reserve_exact(bytes.len())?;
                data.extend_from_slice(bytes);
                Storage::Owned(data)
            }
        };
        Ok(BinaryStore {
            storage,
            layout: self.layout,
        })
    }

    /// Raw value of the field for `bit` in `record`.
    ///
    /// Callers only pass records below `nodes_count`, which the footer check
    /// guarantees to lie inside the body. Fields wider than eight bytes
    /// saturate, which still decodes as a terminal sentinel.
    pub(crate) fn field(&self, record: u32, bit: usize) -> u64 {
        let start = self.layout.field_offset(record, bit);
        let end = start + self.layout.records_size as usize;
        self.as_bytes()[start..end]
            .iter()
            .fold(0u64, |acc, &byte| acc.saturating_mul(256).saturating_add(byte as u64))
    }

    pub(crate) fn pointer(&self, record: u32, bit: usize) -> Pointer {
        let value = self.field(record, bit);
        let nodes_count = self.layout.nodes_count as u64;
        if value == nodes_count {
            Pointer::DeadEnd
        } else if value > nodes_count {
            Pointer::Terminal
        } else {
            Pointer::Record(value as u32)
        }
    }

    /// Look up a 32-bit address
    pub fn lookup(&self, address: u32) -> Result<Lookup> {
        if self.is_empty() {
            return Ok(Lookup::NoMatch);
        }

        let mut record = 0u32;
        for depth in 0..32 {
            let bit = ((address >> (31 - depth)) & 1) as usize;
            match self.pointer(record, bit) {
                Pointer::DeadEnd => return Ok(Lookup::NoMatch),
                Pointer::Terminal => return Ok(Lookup::Match),
                Pointer::Record(next) => record = next,
            }
        }

        Err(PrefixDbError::Corrupt(format!(
            "lookup of {} did not resolve within 32 bits",
            Ipv4Addr::from(address)
        )))
    }

    /// True when some stored prefix shares an address with `address/length`.
    /// Walks at most `length` records.
    pub fn overlaps(&self, address: u32, length: u8) -> bool {
        if self.is_empty() {
            return false;
        }

        let mut record = 0u32;
        for depth in 0..length.min(32) {
            let bit = ((address >> (31 - depth)) & 1) as usize;
            match self.pointer(record, bit) {
                Pointer::DeadEnd => return false,
                Pointer::Terminal => return true,
                Pointer::Record(next) => record = next,
            }
        }
        true
    }

    /// Look up an [`Ipv4Addr`]
    pub fn lookup_addr(&self, address: Ipv4Addr) -> Result<Lookup> {
        self.lookup(u32::from(address))
    }
}

impl fmt::Debug for BinaryStore<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinaryStore")
            .field("backing", &self.backing())
            .field("layout", &self.layout)
            .finish()
    }
}
