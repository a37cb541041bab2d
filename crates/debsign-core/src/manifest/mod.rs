//! Typed view over a `.changes` manifest.
//!
//! The manifest keeps its source text verbatim. Checksum records are parsed
//! into [`FileEntry`] values per [`HashAlgorithm`], and rewrites splice only
//! the digest and size tokens of a record line, so every untouched byte
//! survives [`Manifest::serialize`].

mod parse;
mod record;

use std::fmt;
use std::fs;
use std::path::Path;

use crate::checksum::HashAlgorithm;
use crate::error::{DebsignError, DebsignResult, FormatError};
use crate::fsutil::write_atomic;

use parse::Document;
use record::{is_hex_digest, parse_record, splice, RecordSpan};

pub use record::FileEntry;

/// Filename-suffix pattern selecting the description file's records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamePattern {
    suffix: String,
}

impl NamePattern {
    pub fn suffix(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        name.len() > self.suffix.len() && name.ends_with(&self.suffix)
    }

    pub fn as_str(&self) -> &str {
        &self.suffix
    }
}

impl Default for NamePattern {
    fn default() -> Self {
        Self::suffix(".dsc")
    }
}

impl fmt::Display for NamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "*{}", self.suffix)
    }
}

#[derive(Debug, Clone)]
struct Section {
    algorithm: HashAlgorithm,
    entries: Vec<FileEntry>,
    spans: Vec<RecordSpan>,
}

/// Parsed `.changes` manifest.
#[derive(Debug, Clone)]
pub struct Manifest {
    doc: Document,
    sections: Vec<Section>,
}

impl Manifest {
    /// Parse manifest text.
    ///
    /// Requires exactly one `Files`, `Checksums-Sha1` and `Checksums-Sha256`
    /// field across all paragraphs.
    pub fn parse(text: &str) -> DebsignResult<Self> {
        let doc = Document::parse(text)?;
        // Indexed by `HashAlgorithm as usize`.
        let mut sections = Vec::with_capacity(HashAlgorithm::ALL.len());

        for algorithm in HashAlgorithm::ALL {
            let name = algorithm.field_name();
            let mut found = doc.fields_named(name);
            let field = found.next().ok_or_else(|| FormatError::MissingField {
                field: name.to_string(),
            })?;
            if found.next().is_some() {
                return Err(FormatError::DuplicateField {
                    field: name.to_string(),
                }
                .into());
            }
            if !field.value.is_empty() {
                return Err(FormatError::MalformedRecord {
                    field: name.to_string(),
                    line: field.line + 1,
                    reason: "records must start on a continuation line".to_string(),
                }
                .into());
            }

            let mut section = Section {
                algorithm,
                entries: Vec::with_capacity(field.continuation.len()),
                spans: Vec::with_capacity(field.continuation.len()),
            };
            for &line in &field.continuation {
                let (entry, span) =
                    parse_record(algorithm, line, doc.line_content(line), doc.escape[line])?;
                section.entries.push(entry);
                section.spans.push(span);
            }
            sections.push(section);
        }

        Ok(Self { doc, sections })
    }

    /// Read and parse a manifest file.
    pub fn from_path(path: &Path) -> DebsignResult<Self> {
        let bytes = fs::read(path).map_err(|e| DebsignError::io(path, e))?;
        let text = String::from_utf8(bytes).map_err(|e| {
            let valid = &e.as_bytes()[..e.utf8_error().valid_up_to()];
            FormatError::Syntax {
                line: valid.iter().filter(|&&b| b == b'\n').count() + 1,
                reason: "manifest is not valid UTF-8".to_string(),
            }
        })?;
        Self::parse(&text)
    }

    /// Whether the text is a clear-signed message.
    pub fn is_signed(&self) -> bool {
        self.doc.signed
    }

    /// First-line value of a field, case-insensitive.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.doc.fields_named(name).next().map(|f| f.value.as_str())
    }

    /// Records of one algorithm family, in manifest order.
    pub fn entries(&self, algorithm: HashAlgorithm) -> &[FileEntry] {
        &self.section(algorithm).entries
    }

    /// The unique record whose name matches `pattern`.
    pub fn find_entry(
        &self,
        algorithm: HashAlgorithm,
        pattern: &NamePattern,
    ) -> DebsignResult<&FileEntry> {
        let idx = self.find_index(algorithm, pattern)?;
        Ok(&self.section(algorithm).entries[idx])
    }

    /// Replace size and digest of the record matching `pattern`.
    pub fn rewrite_entry(
        &mut self,
        algorithm: HashAlgorithm,
        pattern: &NamePattern,
        size: u64,
        digest: &str,
    ) -> DebsignResult<()> {
        if self.doc.signed {
            return Err(FormatError::SignedManifest.into());
        }
        let idx = self.find_index(algorithm, pattern)?;
        let digest = digest.to_ascii_lowercase();

        let section = &mut self.sections[algorithm as usize];
        let span = section.spans[idx].clone();
        if !is_hex_digest(&digest, algorithm) {
            return Err(FormatError::MalformedRecord {
                field: algorithm.field_name().to_string(),
                line: span.line + 1,
                reason: format!("replacement {digest:?} is not a {algorithm} digest"),
            }
            .into());
        }

        let rewritten = splice(&self.doc.lines[span.line], &span, size, &digest);
        let (entry, new_span) = parse_record(
            algorithm,
            span.line,
            parse::content(&rewritten),
            self.doc.escape[span.line],
        )?;
        tracing::debug!(
            field = algorithm.field_name(),
            name = %entry.name,
            size,
            "rewrote manifest record"
        );
        self.doc.lines[span.line] = rewritten;
        section.entries[idx] = entry;
        section.spans[idx] = new_span;
        Ok(())
    }

    /// The manifest text, identical to the source except for rewritten tokens.
    pub fn serialize(&self) -> String {
        self.doc.lines.concat()
    }

    /// Write [`Self::serialize`] to `path` via temp file and rename.
    pub fn persist(&self, path: &Path) -> DebsignResult<()> {
        write_atomic(path, self.serialize().as_bytes())
    }

    fn section(&self, algorithm: HashAlgorithm) -> &Section {
        let section = &self.sections[algorithm as usize];
        debug_assert_eq!(section.algorithm, algorithm);
        section
    }

    fn find_index(&self, algorithm: HashAlgorithm, pattern: &NamePattern) -> DebsignResult<usize> {
        let matches: Vec<usize> = self
            .section(algorithm)
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| pattern.matches(&e.name))
            .map(|(idx, _)| idx)
            .collect();

        match matches.as_slice() {
            [idx] => Ok(*idx),
            [] => Err(FormatError::EntryNotFound {
                field: algorithm.field_name().to_string(),
                pattern: pattern.as_str().to_string(),
            }
            .into()),
            many => Err(FormatError::AmbiguousEntry {
                field: algorithm.field_name().to_string(),
                pattern: pattern.as_str().to_string(),
                count: many.len(),
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHANGES: &str = "\
Format: 1.8
Date: Mon, 05 Oct 2026 12:00:00 +0900
Source: pkg
Binary: pkg
Architecture: source
Version: 1.0
Distribution: unstable
Maintainer: Example Maintainer <maint@example.org>
Changes:
 pkg (1.0) unstable; urgency=medium
 .
   * Initial release.
Checksums-Sha1:
 da39a3ee5e6b4b0d3255bfef95601890afd80709 612 pkg_1.0.dsc
 a9993e364706816aba3e25717850c26c9cd0d89d 2048 pkg_1.0.tar.xz
Checksums-Sha256:
 e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855 612 pkg_1.0.dsc
 ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad 2048 pkg_1.0.tar.xz
Files:
 d41d8cd98f00b204e9800998ecf8427e 612 devel optional pkg_1.0.dsc
 900150983cd24fb0d6963f7d28e17f72 2048 devel optional pkg_1.0.tar.xz
";

    #[test]
    fn round_trip_is_identity() {
        let manifest = Manifest::parse(CHANGES).unwrap();
        assert_eq!(manifest.serialize(), CHANGES);
        assert!(!manifest.is_signed());
    }

    #[test]
    fn exposes_entries_per_algorithm_in_order() {
        let manifest = Manifest::parse(CHANGES).unwrap();
        for algorithm in HashAlgorithm::ALL {
            let names: Vec<&str> = manifest
                .entries(algorithm)
                .iter()
                .map(|e| e.name.as_str())
                .collect();
            assert_eq!(names, vec!["pkg_1.0.dsc", "pkg_1.0.tar.xz"]);
        }
        let files = manifest.entries(HashAlgorithm::Md5);
        assert_eq!(files[1].extra, vec!["devel", "optional"]);
        assert_eq!(manifest.field("source"), Some("pkg"));
        assert_eq!(manifest.field("Changes"), Some(""));
    }

    #[test]
    fn find_entry_by_suffix() {
        let manifest = Manifest::parse(CHANGES).unwrap();
        let entry = manifest
            .find_entry(HashAlgorithm::Sha256, &NamePattern::default())
            .unwrap();
        assert_eq!(entry.size, 612);
        assert_eq!(
            entry.digest,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn find_entry_missing_and_ambiguous() {
        let manifest = Manifest::parse(CHANGES).unwrap();
        let err = manifest
            .find_entry(HashAlgorithm::Md5, &NamePattern::suffix(".deb"))
            .unwrap_err();
        assert!(matches!(
            err,
            DebsignError::Format(FormatError::EntryNotFound { .. })
        ));

        let err = manifest
            .find_entry(HashAlgorithm::Md5, &NamePattern::suffix("pkg_1.0"))
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, DebsignError::Format(FormatError::EntryNotFound { .. })));

        let ambiguous =
            Manifest::parse(&CHANGES.replace("pkg_1.0.tar.xz", "other_1.0.dsc")).unwrap();
        let err = ambiguous
            .find_entry(HashAlgorithm::Md5, &NamePattern::default())
            .unwrap_err();
        assert!(matches!(
            err,
            DebsignError::Format(FormatError::AmbiguousEntry { count: 2, .. })
        ));
    }

    #[test]
    fn rewrite_changes_only_target_tokens() {
        let mut manifest = Manifest::parse(CHANGES).unwrap();
        let sha256 = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";
        manifest
            .rewrite_entry(HashAlgorithm::Sha256, &NamePattern::default(), 1500, sha256)
            .unwrap();

        let expected = CHANGES.replace(
            " e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855 612 pkg_1.0.dsc",
            &format!(" {sha256} 1500 pkg_1.0.dsc"),
        );
        assert_eq!(manifest.serialize(), expected);

        let entry = manifest
            .find_entry(HashAlgorithm::Sha256, &NamePattern::default())
            .unwrap();
        assert_eq!(entry.size, 1500);
        assert_eq!(entry.digest, sha256);
        // Other families untouched.
        assert_eq!(
            manifest
                .find_entry(HashAlgorithm::Md5, &NamePattern::default())
                .unwrap()
                .size,
            612
        );
    }

    #[test]
    fn rewrite_twice_uses_fresh_spans() {
        let mut manifest = Manifest::parse(CHANGES).unwrap();
        let pattern = NamePattern::default();
        let md5 = "900150983cd24fb0d6963f7d28e17f72";
        manifest
            .rewrite_entry(HashAlgorithm::Md5, &pattern, 123_456_789, md5)
            .unwrap();
        manifest
            .rewrite_entry(HashAlgorithm::Md5, &pattern, 7, md5)
            .unwrap();
        assert!(manifest
            .serialize()
            .contains(&format!(" {md5} 7 devel optional pkg_1.0.dsc\n")));
    }

    #[test]
    fn rewrite_rejects_invalid_digest() {
        let mut manifest = Manifest::parse(CHANGES).unwrap();
        let err = manifest
            .rewrite_entry(HashAlgorithm::Sha1, &NamePattern::default(), 1, "xyz")
            .unwrap_err();
        assert!(matches!(
            err,
            DebsignError::Format(FormatError::MalformedRecord { .. })
        ));
        assert_eq!(manifest.serialize(), CHANGES);
    }

    #[test]
    fn missing_required_field_fails() {
        let text = CHANGES.replace("Checksums-Sha1:", "Checksums-Sha512:");
        let err = Manifest::parse(&text).unwrap_err();
        match err {
            DebsignError::Format(FormatError::MissingField { field }) => {
                assert_eq!(field, "Checksums-Sha1");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn field_repeated_across_paragraphs_fails() {
        let text = format!("{CHANGES}\nFiles:\n d41d8cd98f00b204e9800998ecf8427e 1 a b x.dsc\n");
        let err = Manifest::parse(&text).unwrap_err();
        assert!(matches!(
            err,
            DebsignError::Format(FormatError::DuplicateField { .. })
        ));
    }

    #[test]
    fn signed_manifest_parses_but_refuses_rewrite() {
        let signed = format!(
            "-----BEGIN PGP SIGNED MESSAGE-----\nHash: SHA512\n\n{CHANGES}-----BEGIN PGP SIGNATURE-----\n\niQ==\n-----END PGP SIGNATURE-----\n"
        );
        let mut manifest = Manifest::parse(&signed).unwrap();
        assert!(manifest.is_signed());
        assert_eq!(manifest.serialize(), signed);
        assert_eq!(
            manifest
                .find_entry(HashAlgorithm::Md5, &NamePattern::default())
                .unwrap()
                .size,
            612
        );
        let err = manifest
            .rewrite_entry(
                HashAlgorithm::Md5,
                &NamePattern::default(),
                1,
                "900150983cd24fb0d6963f7d28e17f72",
            )
            .unwrap_err();
        assert!(matches!(err, DebsignError::Format(FormatError::SignedManifest)));
    }

    #[test]
    fn non_utf8_manifest_is_a_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pkg_1.0_source.changes");
        let mut bytes = b"Format: 1.8\nSource: \xff\xfe\n".to_vec();
        bytes.extend_from_slice(CHANGES.as_bytes());
        std::fs::write(&path, bytes).unwrap();

        let err = Manifest::from_path(&path).unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert!(matches!(
            err,
            DebsignError::Format(FormatError::Syntax { line: 2, .. })
        ));
    }

    #[test]
    fn persist_writes_serialized_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pkg_1.0_source.changes");
        std::fs::write(&path, CHANGES).unwrap();

        let mut manifest = Manifest::from_path(&path).unwrap();
        manifest
            .rewrite_entry(
                HashAlgorithm::Md5,
                &NamePattern::default(),
                9,
                "900150983cd24fb0d6963f7d28e17f72",
            )
            .unwrap();
        manifest.persist(&path).unwrap();

        let reread = Manifest::from_path(&path).unwrap();
        assert_eq!(reread.serialize(), manifest.serialize());
        assert_eq!(
            reread
                .find_entry(HashAlgorithm::Md5, &NamePattern::default())
                .unwrap()
                .size,
            9
        );
    }

    #[test]
    fn name_pattern_requires_a_stem() {
        let pattern = NamePattern::default();
        assert!(pattern.matches("pkg_1.0.dsc"));
        assert!(!pattern.matches(".dsc"));
        assert!(!pattern.matches("pkg_1.0.dsc.asc"));
        assert_eq!(pattern.to_string(), "*.dsc");
    }
}
