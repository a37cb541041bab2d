//! Line-preserving deb822 scanner.
//!
//! The source text is kept as a list of lines including their terminators, so
//! concatenating them reproduces the input byte-for-byte. Fields only hold line
//! indices into that list.

use crate::error::FormatError;
use crate::signature::{SIGNATURE_BLOCK_BEGIN, SIGNED_MESSAGE_BEGIN};

/// A field occurrence: `Name: value` plus its continuation lines.
#[derive(Debug, Clone)]
pub(crate) struct Field {
    pub(crate) name: String,
    pub(crate) paragraph: usize,
    /// Index of the `Name:` line.
    pub(crate) line: usize,
    /// First-line value, trimmed.
    pub(crate) value: String,
    pub(crate) continuation: Vec<usize>,
}

#[derive(Debug, Clone)]
pub(crate) struct Document {
    pub(crate) lines: Vec<String>,
    pub(crate) signed: bool,
    /// Per-line byte offset of the parseable content (2 for dash-escaped lines).
    pub(crate) escape: Vec<usize>,
    pub(crate) fields: Vec<Field>,
}

/// Strip the line terminator.
pub(crate) fn content(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

impl Document {
    pub(crate) fn parse(text: &str) -> Result<Self, FormatError> {
        let lines: Vec<String> = text.split_inclusive('\n').map(str::to_owned).collect();
        let signed = text.starts_with(SIGNED_MESSAGE_BEGIN);
        let (start, end) = if signed {
            body_range(&lines)?
        } else {
            (0, lines.len())
        };

        let mut escape = vec![0; lines.len()];
        let mut fields: Vec<Field> = Vec::new();
        let mut paragraph = 0;
        let mut in_paragraph = false;
        let mut current: Option<usize> = None;

        for (idx, raw) in lines.iter().enumerate().take(end).skip(start) {
            let mut text = content(raw);
            if signed {
                if let Some(rest) = text.strip_prefix("- ") {
                    escape[idx] = 2;
                    text = rest;
                }
            }

            if text.trim().is_empty() {
                if in_paragraph {
                    paragraph += 1;
                    in_paragraph = false;
                }
                current = None;
                continue;
            }
            if text.starts_with('#') {
                continue;
            }
            if text.starts_with(' ') || text.starts_with('\t') {
                let field = current.ok_or_else(|| FormatError::Syntax {
                    line: idx + 1,
                    reason: "continuation line without a field".to_string(),
                })?;
                fields[field].continuation.push(idx);
                continue;
            }

            let (name, value) = text.split_once(':').ok_or_else(|| FormatError::Syntax {
                line: idx + 1,
                reason: "expected 'Field: value'".to_string(),
            })?;
            if name.is_empty() || name.chars().any(char::is_whitespace) {
                return Err(FormatError::Syntax {
                    line: idx + 1,
                    reason: format!("invalid field name {name:?}"),
                });
            }
            if fields
                .iter()
                .any(|f| f.paragraph == paragraph && f.name.eq_ignore_ascii_case(name))
            {
                return Err(FormatError::DuplicateField {
                    field: name.to_string(),
                });
            }

            in_paragraph = true;
            fields.push(Field {
                name: name.to_string(),
                paragraph,
                line: idx,
                value: value.trim().to_string(),
                continuation: Vec::new(),
            });
            current = Some(fields.len() - 1);
        }

        Ok(Self {
            lines,
            signed,
            escape,
            fields,
        })
    }

    /// Parseable content of a line (terminator and dash-escape removed).
    pub(crate) fn line_content(&self, idx: usize) -> &str {
        &content(&self.lines[idx])[self.escape[idx]..]
    }

    /// All occurrences of a field, case-insensitive.
    pub(crate) fn fields_named<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a Field> + 'a {
        let name = name.to_string();
        self.fields
            .iter()
            .filter(move |f| f.name.eq_ignore_ascii_case(&name))
    }
}

/// Body of a clear-signed message: after the armor headers, before the
/// signature block.
fn body_range(lines: &[String]) -> Result<(usize, usize), FormatError> {
    let header_end = lines
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, line)| content(line).trim().is_empty())
        .map(|(idx, _)| idx)
        .ok_or(FormatError::UnterminatedSignature)?;

    let body_end = lines
        .iter()
        .enumerate()
        .skip(header_end + 1)
        .find(|(_, line)| content(line).trim_end() == SIGNATURE_BLOCK_BEGIN)
        .map(|(idx, _)| idx)
        .ok_or(FormatError::UnterminatedSignature)?;

    Ok((header_end + 1, body_end))
}
