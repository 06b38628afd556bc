//! Bulk prefix-list import
//!
//! One prefix per line, `a.b.c.d` or `a.b.c.d/len`. Everything from the
//! first `#`, `\r` or `\n` on is dropped, surrounding whitespace is trimmed
//! and blank lines are skipped. The import stops at the first line that
//! fails and reports it with its 1-based line number.

use crate::error::{PrefixDbError, Result};
use crate::tree_builder::parse_prefix;
use std::io::BufRead;
use tracing::debug;

/// Strip the comment and line ending from a raw line
fn content(line: &[u8]) -> &[u8] {
    let end = memchr::memchr3(b'#', b'\r', b'\n', line).unwrap_or(line.len());
    line[..end].trim_ascii()
}

/// Feed every prefix in `reader` to `insert`; returns how many were inserted
pub fn import_lines<R, F>(mut reader: R, mut insert: F) -> Result<usize>
where
    R: BufRead,
    F: FnMut(u32, u8) -> Result<()>,
{
    let mut line = Vec::new();
    let mut line_number = 0usize;
    let mut inserted = 0usize;

    loop {
        line.clear();
        let read = reader.read_until(b'\n', &mut line).map_err(|e| {
            PrefixDbError::Access(format!("read failed after line {}: {}", line_number, e))
        })?;
        if read == 0 {
            break;
        }
        line_number += 1;

        let text = content(&line);
        if text.is_empty() {
            continue;
        }
        let at_line = |err: PrefixDbError| match err {
            PrefixDbError::InvalidParameter(msg) => {
                PrefixDbError::InvalidParameter(format!("line {}: {}", line_number, msg))
            }
            other => other,
        };
        let text = std::str::from_utf8(text).map_err(|_| {
            PrefixDbError::InvalidParameter(format!("line {}: not valid UTF-8", line_number))
        })?;
        let (address, length) = parse_prefix(text).map_err(at_line)?;
        insert(u32::from(address), length).map_err(at_line)?;
        inserted += 1;
    }

    debug!(lines = line_number, inserted, "imported prefix list");
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node_graph::NodeGraph;
    use std::io::Cursor;

    fn import(text: &str) -> (Result<usize>, NodeGraph) {
        let mut graph = NodeGraph::new();
        let result = import_lines(Cursor::new(text.as_bytes()), |address, length| {
            graph.insert(address, length)
        });
        (result, graph)
    }

    #[test]
    fn test_content_strips_comments_and_endings() {
        assert_eq!(content(b"10.0.0.0/8 # private\n"), b"10.0.0.0/8");
        assert_eq!(content(b"1.2.3.4\r\n"), b"1.2.3.4");
        assert_eq!(content(b"# only a comment"), b"");
        assert_eq!(content(b"   \t\n"), b"");
    }

    #[test]
    fn test_import_counts_prefixes() {
        let (result, graph) = import("10.0.0.0/8\n\n# comment\n192.168.1.1\r\n172.16.0.0/12");
        assert_eq!(result.unwrap(), 3);
        assert!(graph.lookup(0xC0A8_0101).is_match());
        assert!(!graph.lookup(0xC0A8_0102).is_match());
    }

    #[test]
    fn test_import_stops_at_first_error() {
        let (result, graph) = import("10.0.0.0/8\nnot-an-address\n11.0.0.0/8\n");
        match result {
            Err(PrefixDbError::InvalidParameter(msg)) => assert!(msg.starts_with("line 2:")),
            other => panic!("unexpected result {:?}", other),
        }
        assert!(graph.lookup(0x0A00_0001).is_match());
        assert!(!graph.lookup(0x0B00_0001).is_match());
    }

    #[test]
    fn test_import_rejects_bad_length() {
        let (result, _) = import("10.0.0.0/0\n");
        assert!(matches!(result, Err(PrefixDbError::InvalidParameter(_))));
    }

    #[test]
    fn test_empty_input() {
        let (result, graph) = import("");
        assert_eq!(result.unwrap(), 0);
        assert!(graph.is_empty());
    }
}
