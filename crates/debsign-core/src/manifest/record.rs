//! Checksum record lines (`<digest> <size> [extra...] <name>`).

use std::ops::Range;

use serde::Serialize;

use crate::checksum::HashAlgorithm;
use crate::error::FormatError;

/// One file entry in a checksum field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
    pub digest: String,
    /// Columns between size and name (`section priority` in `.changes` Files).
    pub extra: Vec<String>,
    /// 1-based line number in the manifest text.
    pub line: usize,
}

/// Byte ranges of the rewritable tokens within a record line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RecordSpan {
    pub(crate) line: usize,
    pub(crate) digest: Range<usize>,
    pub(crate) size: Range<usize>,
}

fn tokens(text: &str) -> Vec<Range<usize>> {
    let mut out = Vec::new();
    let mut start = None;
    for (idx, ch) in text.char_indices() {
        match (ch.is_ascii_whitespace(), start) {
            (true, Some(s)) => {
                out.push(s..idx);
                start = None;
            }
            (false, None) => start = Some(idx),
            _ => {}
        }
    }
    if let Some(s) = start {
        out.push(s..text.len());
    }
    out
}

pub(crate) fn is_hex_digest(value: &str, algorithm: HashAlgorithm) -> bool {
    value.len() == algorithm.hex_len() && value.chars().all(|c| c.is_ascii_hexdigit())
}

/// Parse a record from `text`, the line content after any escape prefix.
///
/// `offset` is added to the returned spans so they index the stored line.
pub(crate) fn parse_record(
    algorithm: HashAlgorithm,
    line: usize,
    text: &str,
    offset: usize,
) -> Result<(FileEntry, RecordSpan), FormatError> {
    let malformed = |reason: String| FormatError::MalformedRecord {
        field: algorithm.field_name().to_string(),
        line: line + 1,
        reason,
    };

    let spans = tokens(text);
    let valid_width = match algorithm {
        HashAlgorithm::Md5 => spans.len() == 3 || spans.len() == 5,
        HashAlgorithm::Sha1 | HashAlgorithm::Sha256 => spans.len() == 3,
    };
    if !valid_width {
        return Err(malformed(format!("unexpected column count {}", spans.len())));
    }

    let digest = &text[spans[0].clone()];
    if !is_hex_digest(digest, algorithm) {
        return Err(malformed(format!("{digest:?} is not a {algorithm} digest")));
    }
    let size_text = &text[spans[1].clone()];
    let size: u64 = size_text
        .bytes()
        .all(|b| b.is_ascii_digit())
        .then(|| size_text.parse().ok())
        .flatten()
        .ok_or_else(|| malformed(format!("size {size_text:?} is not an integer")))?;

    let last = spans.len() - 1;
    let entry = FileEntry {
        name: text[spans[last].clone()].to_string(),
        size,
        digest: digest.to_string(),
        extra: spans[2..last]
            .iter()
            .map(|s| text[s.clone()].to_string())
            .collect(),
        line: line + 1,
    };
    let shift = |r: &Range<usize>| (r.start + offset)..(r.end + offset);
    let span = RecordSpan {
        line,
        digest: shift(&spans[0]),
        size: shift(&spans[1]),
    };
    Ok((entry, span))
}

/// Replace the digest and size tokens of `line`, leaving every other byte as is.
pub(crate) fn splice(line: &str, span: &RecordSpan, size: u64, digest: &str) -> String {
    let mut out = String::with_capacity(line.len() + 8);
    out.push_str(&line[..span.digest.start]);
    out.push_str(digest);
    out.push_str(&line[span.digest.end..span.size.start]);
    out.push_str(&size.to_string());
    out.push_str(&line[span.size.end..]);
    out
}
