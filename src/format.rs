//! Binary Store layout
//!
//! A serialized database is a body of `nodes_count` fixed-width records
//! followed by a 31-byte footer. All integers are big-endian.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │ record 0   [bit-0 field][bit-1 field]   2 * records_size B │
//! │ record 1   ...                                             │
//! │ record n-1                                                 │
//! ├────────────────────────────────────────────────────────────┤
//! │ footer     reserved[16] = 0                                │
//! │            field width in bits          u8  (multiple of 8)│
//! │            nodes_count                  u32 (!= 0xFFFFFFFF)│
//! │            format version               u16 (<= 0x0101)    │
//! │            total byte length            u32                │
//! │            magic "PFDB"                 u32                │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! A field holding a value below `nodes_count` is the id of the record to
//! descend into; `nodes_count` itself means no match on this path; anything
//! above it means match.
//!
//! The footer may come from an untrusted or memory-mapped file, so it is
//! read through [`Footer`], a byte-aligned `zerocopy` view, and every field
//! is checked against the real buffer length before anything else is read.

use crate::error::{PrefixDbError, Result};
use serde::Serialize;
use zerocopy::byteorder::{BigEndian, U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Size of the footer in bytes
pub const FOOTER_SIZE: usize = 31;

/// Format version written by this library; newer files are rejected
pub const FORMAT_VERSION: u16 = 0x0101;

/// Magic marker closing every file: "PFDB"
pub const MAGIC: u32 = 0x5046_4442;

/// Node count value reserved as an overflow sentinel
pub const RESERVED_NODES_COUNT: u32 = u32::MAX;

/// Distance above `nodes_count` of the terminal sentinel written for leaves.
/// Readers accept any value above `nodes_count`.
pub(crate) const TERMINAL_OFFSET: u64 = 16;

/// On-disk footer (31 bytes, no padding, alignment 1)
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct Footer {
    /// Must be all zero
    pub reserved: [u8; 16],
    /// Width of one record field in bits
    pub field_bits: u8,
    /// Number of records in the body
    pub nodes_count: U32<BigEndian>,
    /// Format version
    pub version: U16<BigEndian>,
    /// Length of the whole buffer, footer included
    pub total_size: U32<BigEndian>,
    /// [`MAGIC`]
    pub magic: U32<BigEndian>,
}

/// Validated geometry of a Binary Store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Layout {
    /// Number of internal-node records
    pub nodes_count: u32,
    /// Width of one record field in bytes
    pub records_size: u8,
    /// Format version found in (or written to) the footer
    pub version: u16,
    /// Total byte length, footer included
    pub total_size: u32,
}

impl Layout {
    /// Geometry for a freshly serialized tree with `nodes_count` records
    pub fn for_nodes(nodes_count: u32) -> Result<Self> {
        if nodes_count == RESERVED_NODES_COUNT {
            return Err(PrefixDbError::OutOfMemory(
                "node count reaches the reserved sentinel".to_string(),
            ));
        }
        let records_size = records_size_for(nodes_count);
        let total = body_size(nodes_count, records_size) + FOOTER_SIZE as u64;
        let total_size = u32::try_from(total).map_err(|_| {
            PrefixDbError::OutOfMemory(format!("serialized size {} exceeds 4 GiB", total))
        })?;
        Ok(Self {
            nodes_count,
            records_size,
            version: FORMAT_VERSION,
            total_size,
        })
    }

    /// Bytes in one record (two fields)
    pub fn record_bytes(&self) -> usize {
        2 * self.records_size as usize
    }

    /// Byte offset of the field for `bit` in record `id`
    pub fn field_offset(&self, id: u32, bit: usize) -> usize {
        id as usize * self.record_bytes() + bit * self.records_size as usize
    }

    /// Field value marking an absent child
    pub fn dead_end(&self) -> u64 {
        self.nodes_count as u64
    }

    /// Field value written for a terminal child
    pub fn terminal(&self) -> u64 {
        self.nodes_count as u64 + TERMINAL_OFFSET
    }

    /// Footer encoding this layout
    pub fn footer(&self) -> Footer {
        Footer {
            reserved: [0; 16],
            field_bits: self.records_size * 8,
            nodes_count: U32::new(self.nodes_count),
            version: U16::new(self.version),
            total_size: U32::new(self.total_size),
            magic: U32::new(MAGIC),
        }
    }
}

/// Smallest number of bytes able to hold `nodes_count + 16`
pub fn records_size_for(nodes_count: u32) -> u8 {
    let mut count = nodes_count as u64 + TERMINAL_OFFSET;
    let mut size = 0u8;
    loop {
        size += 1;
        count /= 256;
        if count == 0 {
            return size;
        }
    }
}

fn body_size(nodes_count: u32, records_size: u8) -> u64 {
    nodes_count as u64 * records_size as u64 * 2
}

fn reject(reason: String) -> PrefixDbError {
    PrefixDbError::InvalidParameter(reason)
}

/// Validate a footer against the length of the buffer it closes.
///
/// `tail` must be exactly the last [`FOOTER_SIZE`] bytes and `actual_len`
/// the length of the whole candidate buffer or file.
pub fn parse_footer(tail: &[u8], actual_len: u64) -> Result<Layout> {
    if actual_len < FOOTER_SIZE as u64 {
        return Err(reject(format!(
            "buffer too small: need at least {} bytes, got {}",
            FOOTER_SIZE, actual_len
        )));
    }
    let footer = Footer::read_from_bytes(tail)
        .map_err(|_| reject(format!("footer must be exactly {} bytes", FOOTER_SIZE)))?;

    if footer.reserved.iter().any(|&b| b != 0) {
        return Err(reject("reserved footer bytes are not zero".to_string()));
    }
    if footer.field_bits == 0 || footer.field_bits % 8 != 0 {
        return Err(reject(format!(
            "field width of {} bits is not a nonzero multiple of 8",
            footer.field_bits
        )));
    }
    let nodes_count = footer.nodes_count.get();
    if nodes_count == RESERVED_NODES_COUNT {
        return Err(reject("node count holds the reserved sentinel".to_string()));
    }
    let version = footer.version.get();
    if version > FORMAT_VERSION {
        return Err(reject(format!(
            "format version {:#06x} is newer than supported {:#06x}",
            version, FORMAT_VERSION
        )));
    }
    let total_size = footer.total_size.get();
    if total_size as u64 != actual_len {
        return Err(reject(format!(
            "footer declares {} bytes but buffer holds {}",
            total_size, actual_len
        )));
    }
    if footer.magic.get() != MAGIC {
        return Err(reject(format!(
            "bad magic marker {:#010x}",
            footer.magic.get()
        )));
    }
    let records_size = footer.field_bits / 8;
    if body_size(nodes_count, records_size) != actual_len - FOOTER_SIZE as u64 {
        return Err(reject(format!(
            "{} records of {} bytes do not fill a {} byte body",
            nodes_count,
            2 * records_size as usize,
            actual_len - FOOTER_SIZE as u64
        )));
    }

    Ok(Layout {
        nodes_count,
        records_size,
        version,
        total_size,
    })
}

/// Validate the footer closing `data`
pub fn parse_buffer(data: &[u8]) -> Result<Layout> {
    if data.len() < FOOTER_SIZE {
        return parse_footer(&[], data.len() as u64);
    }
    parse_footer(&data[data.len() - FOOTER_SIZE..], data.len() as u64)
}
