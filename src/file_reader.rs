//! Line-oriented readers for prefix lists
//!
//! Prefix lists are plain text, one prefix per line. Lists shipped as gzip
//! (detected by a `.gz` extension or by the gzip magic bytes) are
//! decompressed on the fly, and the path `-` reads standard input.

use flate2::bufread::GzDecoder;
use std::fs::File;
use std::io::{self, stdin, BufRead, BufReader};
use std::path::Path;

/// Buffer size for list reading
const BUFFER_SIZE: usize = 64 * 1024;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Open a prefix list for buffered line reading.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or its first block cannot
/// be read.
pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Box<dyn BufRead + Send>> {
    let path = path.as_ref();

    if path.to_str() == Some("-") {
        return Ok(Box::new(BufReader::with_capacity(BUFFER_SIZE, stdin())));
    }

    let mut reader = BufReader::with_capacity(BUFFER_SIZE, File::open(path)?);
    let is_gzip = has_gz_extension(path) || reader.fill_buf()?.starts_with(&GZIP_MAGIC);

    if is_gzip {
        Ok(Box::new(BufReader::with_capacity(
            BUFFER_SIZE,
            GzDecoder::new(reader),
        )))
    } else {
        Ok(Box::new(reader))
    }
}

fn has_gz_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn read_all(path: &Path) -> Vec<String> {
        open(path)
            .unwrap()
            .lines()
            .collect::<io::Result<Vec<_>>>()
            .unwrap()
    }

    fn gzip(text: &str) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_plain_list() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "10.0.0.0/8").unwrap();
        writeln!(file, "192.168.0.0/16").unwrap();
        file.flush().unwrap();

        assert_eq!(read_all(file.path()), vec!["10.0.0.0/8", "192.168.0.0/16"]);
    }

    #[test]
    fn test_gzip_by_extension() {
        let mut file = NamedTempFile::with_suffix(".GZ").unwrap();
        file.write_all(&gzip("172.16.0.0/12\n")).unwrap();
        file.flush().unwrap();

        assert_eq!(read_all(file.path()), vec!["172.16.0.0/12"]);
    }

    #[test]
    fn test_gzip_by_magic_bytes() {
        let mut file = NamedTempFile::with_suffix(".txt").unwrap();
        file.write_all(&gzip("1.2.3.4\n5.6.7.0/24\n")).unwrap();
        file.flush().unwrap();

        assert_eq!(read_all(file.path()), vec!["1.2.3.4", "5.6.7.0/24"]);
    }

    #[test]
    fn test_empty_list() {
        let file = NamedTempFile::new().unwrap();
        assert!(read_all(file.path()).is_empty());
    }

    #[test]
    fn test_missing_list() {
        assert!(open("/nonexistent/prefixes.txt").is_err());
    }
}
