//! Text prefix file format.
//!
//! # Format
//! ```text
//! ## repository-prefixes/2.0          <- magic line, mandatory
//! # comment                            <- optional leading whitespace
//! @ unsupported                        <- optional directive, opts out
//! /org/apache                          <- one entry per line
//! ```
//!
//! # Design Decisions
//! - Remote files are hostile until proven otherwise: size, line length,
//!   charset and entry count are all capped before anything is kept.
//! - Gzip bodies are inflated through a bounded reader, a small compressed
//!   payload cannot expand past the size cap.
//! - A well-formed file without entries is not an error. Callers decide what
//!   an empty list means.

use std::collections::HashSet;
use std::io::Read;

use flate2::read::GzDecoder;

use crate::config::RoutingConfig;
use crate::error::{RoutingError, RoutingResult};
use crate::prefix::path;

/// First line of every prefix file.
pub const MAGIC: &str = "## repository-prefixes/2.0";

/// Directive marking a file whose owner publishes no usable index.
pub const UNSUPPORTED: &str = "@ unsupported";

const HEADER: &[&str] = &[
    "#",
    "# Prefix file for automatic routing.",
    "# Lists path prefixes known to exist in this repository. Requests for",
    "# paths outside of these prefixes are not worth looking up.",
    "# Generated content, manual edits will be overwritten.",
    "#",
];

/// Transport encoding of a prefix file body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncoding {
    Identity,
    Gzip,
}

impl ContentEncoding {
    /// Interpret a `Content-Encoding` header value.
    pub fn from_header(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.split(',').any(|e| {
                let e = e.trim();
                e.eq_ignore_ascii_case("gzip") || e.eq_ignore_ascii_case("x-gzip")
            }) =>
            {
                ContentEncoding::Gzip
            }
            _ => ContentEncoding::Identity,
        }
    }
}

/// Decoded content of a prefix file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PrefixFile {
    /// Normalized, de-duplicated entries in file order.
    pub entries: Vec<String>,
    /// The file carried the `@ unsupported` directive.
    pub unsupported: bool,
}

/// Reads and writes the text prefix format under fixed limits.
#[derive(Debug, Clone)]
pub struct PrefixFileCodec {
    max_size: usize,
    max_line_length: usize,
    max_entries: usize,
}

impl PrefixFileCodec {
    pub fn new(max_size: usize, max_line_length: usize, max_entries: usize) -> Self {
        Self {
            max_size,
            max_line_length,
            max_entries,
        }
    }

    pub fn from_config(config: &RoutingConfig) -> Self {
        Self::new(config.max_file_size, config.max_line_length, config.max_entries)
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Parse a prefix file body.
    pub fn read(&self, body: &[u8], encoding: ContentEncoding) -> RoutingResult<PrefixFile> {
        let inflated;
        let content: &[u8] = match encoding {
            ContentEncoding::Identity => body,
            ContentEncoding::Gzip => {
                inflated = self.inflate(body)?;
                &inflated
            }
        };

        if content.len() > self.max_size {
            return Err(RoutingError::InvalidInput(format!(
                "Prefix file size exceeds maximum allowed size ({} bytes), refusing to load the file.",
                self.max_size
            )));
        }
        if let Some(pos) = content
            .iter()
            .position(|b| !(b.is_ascii_graphic() || matches!(b, b' ' | b'\t' | b'\r' | b'\n')))
        {
            return Err(RoutingError::InvalidInput(format!(
                "Prefix file contains non-ASCII or control characters (at byte {}), refusing to load the file.",
                pos
            )));
        }
        // ASCII checked above
        let text = String::from_utf8_lossy(content);

        let mut lines = text.lines();
        match lines.next() {
            Some(first) if first.trim_end() == MAGIC => {}
            _ => {
                return Err(RoutingError::InvalidInput(
                    "Prefix file does not start with the expected magic header, refusing to load the file."
                        .to_string(),
                ))
            }
        }

        let mut file = PrefixFile::default();
        let mut seen = HashSet::new();
        for line in lines {
            if line.len() > self.max_line_length {
                return Err(RoutingError::InvalidInput(format!(
                    "Prefix file contains line longer than allowed ({} characters), refusing to load the file.",
                    self.max_line_length
                )));
            }
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line.starts_with('@') {
                if line == UNSUPPORTED {
                    file.unsupported = true;
                }
                continue;
            }
            let entry = path::normalize(line);
            if seen.insert(entry.clone()) {
                file.entries.push(entry);
            }
            if file.entries.len() > self.max_entries {
                return Err(RoutingError::InvalidInput(format!(
                    "Prefix file contains more entries than allowed ({}), refusing to load the file.",
                    self.max_entries
                )));
            }
        }
        Ok(file)
    }

    fn inflate(&self, body: &[u8]) -> RoutingResult<Vec<u8>> {
        let limit = self.max_size as u64 + 1;
        let mut inflated = Vec::new();
        GzDecoder::new(body)
            .take(limit)
            .read_to_end(&mut inflated)
            .map_err(|e| {
                RoutingError::InvalidInput(format!(
                    "Prefix file is not valid gzip content ({}), refusing to load the file.",
                    e
                ))
            })?;
        Ok(inflated)
    }

    /// Serialize entries in caller order, with the standard header.
    pub fn write(&self, file: &PrefixFile) -> RoutingResult<Vec<u8>> {
        let mut out = String::new();
        out.push_str(MAGIC);
        out.push('\n');
        for line in HEADER {
            out.push_str(line);
            out.push('\n');
        }
        if file.unsupported {
            out.push_str(UNSUPPORTED);
            out.push('\n');
        }
        for entry in &file.entries {
            let entry = path::normalize(entry);
            if entry.len() > self.max_line_length {
                return Err(RoutingError::InvalidInput(format!(
                    "Prefix entry longer than allowed ({} characters): {}...",
                    self.max_line_length,
                    entry.chars().take(32).collect::<String>()
                )));
            }
            if !entry.bytes().all(|b| b.is_ascii_graphic()) {
                return Err(RoutingError::InvalidInput(format!(
                    "Prefix entry contains non-printable or non-ASCII characters: {:?}",
                    entry
                )));
            }
            out.push_str(&entry);
            out.push('\n');
        }
        if out.len() > self.max_size {
            return Err(RoutingError::InvalidInput(format!(
                "Prefix file would exceed maximum allowed size ({} bytes).",
                self.max_size
            )));
        }
        Ok(out.into_bytes())
    }
}

impl Default for PrefixFileCodec {
    fn default() -> Self {
        Self::from_config(&RoutingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn sample(with_comments: bool) -> String {
        let mut s = String::new();
        s.push_str(MAGIC);
        s.push('\n');
        if with_comments {
            s.push_str("# This is mighty prefix file!\n");
        }
        s.push_str("/org/apache/maven\n");
        s.push_str("./org/sonatype\n");
        if with_comments {
            s.push_str("   # Added later\n\n");
        }
        s.push_str("/eu/flatwhite\n");
        s
    }

    #[test]
    fn test_read_plain() {
        let codec = PrefixFileCodec::default();
        let file = codec.read(sample(true).as_bytes(), ContentEncoding::Identity).unwrap();
        assert_eq!(
            file.entries,
            vec!["/org/apache/maven", "/org/sonatype", "/eu/flatwhite"]
        );
        assert!(!file.unsupported);
    }

    #[test]
    fn test_read_gzip() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(sample(false).as_bytes()).unwrap();
        let body = encoder.finish().unwrap();

        let codec = PrefixFileCodec::default();
        let file = codec.read(&body, ContentEncoding::Gzip).unwrap();
        assert_eq!(file.entries.len(), 3);
    }

    #[test]
    fn test_round_trip() {
        let codec = PrefixFileCodec::default();
        let first = codec.read(sample(true).as_bytes(), ContentEncoding::Identity).unwrap();
        let written = codec.write(&first).unwrap();
        let second = codec.read(&written, ContentEncoding::Identity).unwrap();
        assert_eq!(first, second);
        assert!(String::from_utf8(written).unwrap().starts_with(MAGIC));
    }

    #[test]
    fn test_missing_magic() {
        let codec = PrefixFileCodec::default();
        let err = codec
            .read(b"/org/apache\n/org/sonatype\n", ContentEncoding::Identity)
            .unwrap_err();
        assert!(matches!(err, RoutingError::InvalidInput(_)));
        assert!(codec.read(b"", ContentEncoding::Identity).is_err());
    }

    #[test]
    fn test_line_too_long() {
        let codec = PrefixFileCodec::default();
        let body = format!("{}\n{}\n", MAGIC, "/12345677890".repeat(25));
        let err = codec.read(body.as_bytes(), ContentEncoding::Identity).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("longer than allowed"));
        assert!(text.contains("refusing"));
    }

    #[test]
    fn test_non_ascii_rejected() {
        let codec = PrefixFileCodec::default();
        for entry in ["/org/пример", "/hu/árvíztűrő", "/bin\u{0001}ary"] {
            let body = format!("{}\n{}\n", MAGIC, entry);
            let err = codec.read(body.as_bytes(), ContentEncoding::Identity).unwrap_err();
            assert!(matches!(err, RoutingError::InvalidInput(_)), "{}", entry);
        }
    }

    #[test]
    fn test_oversized_garbage_rejected() {
        let codec = PrefixFileCodec::default();
        // deterministic pseudo random bytes, ~150KB
        let mut state: u32 = 0x2545_f491;
        let garbage: Vec<u8> = (0..150 * 1024)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state & 0xff) as u8
            })
            .collect();
        let err = codec.read(&garbage, ContentEncoding::Identity).unwrap_err();
        assert!(matches!(err, RoutingError::InvalidInput(_)));
    }

    #[test]
    fn test_large_legitimate_file_accepted() {
        let codec = PrefixFileCodec::default();
        let mut body = format!("{}\n", MAGIC);
        let mut i = 0;
        while body.len() < 100 * 1000 {
            body.push_str(&format!("/com/example{:06}/lib\n", i));
            i += 1;
        }
        let file = codec.read(body.as_bytes(), ContentEncoding::Identity).unwrap();
        assert_eq!(file.entries.len(), i);
    }

    #[test]
    fn test_gzip_bomb_capped() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(MAGIC.as_bytes()).unwrap();
        encoder.write_all(b"\n").unwrap();
        encoder.write_all(&vec![b'#'; 1024 * 1024]).unwrap();
        let body = encoder.finish().unwrap();
        assert!(body.len() < 16 * 1024);

        let codec = PrefixFileCodec::default();
        let err = codec.read(&body, ContentEncoding::Gzip).unwrap_err();
        assert!(err.to_string().contains("size"));
    }

    #[test]
    fn test_header_only_and_unsupported() {
        let codec = PrefixFileCodec::default();
        let empty = codec
            .read(format!("{}\n# nothing here\n\n", MAGIC).as_bytes(), ContentEncoding::Identity)
            .unwrap();
        assert!(empty.entries.is_empty());
        assert!(!empty.unsupported);

        let marked = codec
            .read(format!("{}\n{}\n", MAGIC, UNSUPPORTED).as_bytes(), ContentEncoding::Identity)
            .unwrap();
        assert!(marked.unsupported);

        let written = codec
            .write(&PrefixFile {
                entries: vec![],
                unsupported: true,
            })
            .unwrap();
        assert!(codec.read(&written, ContentEncoding::Identity).unwrap().unsupported);
    }

    #[test]
    fn test_content_encoding_header() {
        assert_eq!(ContentEncoding::from_header(Some("gzip")), ContentEncoding::Gzip);
        assert_eq!(ContentEncoding::from_header(Some("x-gzip")), ContentEncoding::Gzip);
        assert_eq!(ContentEncoding::from_header(Some("identity")), ContentEncoding::Identity);
        assert_eq!(ContentEncoding::from_header(None), ContentEncoding::Identity);
    }
}
