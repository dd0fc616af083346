use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Workspace-wide result alias.
pub type Result<T> = color_eyre::eyre::Result<T>;

/// Enclosing name used for spans that live outside any named declaration.
pub const GLOBAL_SCOPE: &str = "<global>";

/// Separator between co-declared field names (`int a, b;` -> `a, b`).
pub const FIELD_NAME_SEPARATOR: &str = ", ";

/// A located, hashed excerpt of text-bearing source eligible for translation.
///
/// Serialized with the field names of the intermediate extraction files so the
/// same type can be written after `extract` and read back by `migrate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslatableSpan {
    /// Edge-trimmed source text.
    pub text: String,
    /// Identity hash, see [`identity_hash`].
    pub hash: String,
    /// Byte offset of the untrimmed span in the source file.
    #[serde(rename = "startPosition")]
    pub start: usize,
    /// Byte length of the untrimmed span.
    pub length: usize,
    /// Smallest enclosing named declaration, or [`GLOBAL_SCOPE`].
    #[serde(rename = "containingMethod")]
    pub enclosing: String,
    /// 1-based line of `start`; display only.
    #[serde(rename = "startLine")]
    pub start_line: usize,
}

impl TranslatableSpan {
    /// Build a span from the raw (untrimmed) slice at `start..start + raw.len()`.
    /// Trimming only affects `text`; offset and length keep the original extent.
    pub fn from_raw(raw: &str, start: usize, enclosing: impl Into<String>, start_line: usize) -> Self {
        let text = raw.trim().to_string();
        let hash = identity_hash(&text, start);
        Self {
            text,
            hash,
            start,
            length: raw.len(),
            enclosing: enclosing.into(),
            start_line,
        }
    }

    pub fn end(&self) -> usize {
        self.start + self.length
    }

    pub fn weak_hash(&self) -> String {
        weak_hash(&self.text)
    }
}

/// Review stage of a translation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Stage {
    #[default]
    Untranslated,
    Confirmed,
    /// Carried forward by a weak-hash match; needs another look.
    FuzzyCarried,
}

impl From<Stage> for u8 {
    fn from(s: Stage) -> u8 {
        match s {
            Stage::Untranslated => 0,
            Stage::Confirmed => 1,
            Stage::FuzzyCarried => 2,
        }
    }
}

impl TryFrom<u8> for Stage {
    type Error = String;

    fn try_from(v: u8) -> std::result::Result<Self, Self::Error> {
        match v {
            0 => Ok(Stage::Untranslated),
            1 => Ok(Stage::Confirmed),
            2 => Ok(Stage::FuzzyCarried),
            other => Err(format!("unknown stage {other}, expected 0, 1 or 2")),
        }
    }
}

/// Persisted translation unit, one element of a record file's JSON array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationRecord {
    pub key: String,
    pub original: String,
    #[serde(default)]
    pub translation: String,
    #[serde(default)]
    pub stage: Stage,
    #[serde(default)]
    pub context: String,
}

impl TranslationRecord {
    /// Fresh, untranslated record for a span of `rel_path`.
    pub fn untranslated(rel_path: &str, span: &TranslatableSpan) -> Self {
        Self {
            key: span.hash.clone(),
            original: span.text.clone(),
            translation: String::new(),
            stage: Stage::Untranslated,
            context: ContextDescriptor::for_span(rel_path, span).to_string(),
        }
    }

    /// Point this record at `span`, keeping translation and stage.
    pub fn rebind(&mut self, rel_path: &str, span: &TranslatableSpan) {
        self.key = span.hash.clone();
        self.original = span.text.clone();
        self.context = ContextDescriptor::for_span(rel_path, span).to_string();
    }

    pub fn has_translation(&self) -> bool {
        !self.translation.is_empty()
    }

    pub fn weak_hash(&self) -> String {
        weak_hash(&self.original)
    }
}

/// Positional metadata stored in a record's `context` field.
///
/// Layout (one field per line):
/// `File: {path}:{line}` / `Method: {enclosing}` / `Position: {offset}` / `Length: {length}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextDescriptor {
    pub path: String,
    pub line: usize,
    pub enclosing: String,
    pub offset: usize,
    pub length: usize,
}

impl ContextDescriptor {
    pub fn for_span(rel_path: &str, span: &TranslatableSpan) -> Self {
        Self {
            path: rel_path.to_string(),
            line: span.start_line,
            enclosing: span.enclosing.clone(),
            offset: span.start,
            length: span.length,
        }
    }

    pub fn end(&self) -> usize {
        self.offset + self.length
    }
}

impl fmt::Display for ContextDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "File: {}:{}\nMethod: {}\nPosition: {}\nLength: {}",
            self.path, self.line, self.enclosing, self.offset, self.length
        )
    }
}

/// Why a context string could not be turned into a [`ContextDescriptor`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("field `{field}` is not a number: {value:?}")]
    InvalidNumber { field: &'static str, value: String },
    #[error("`File` field has no line suffix: {0:?}")]
    MissingLine(String),
}

fn parse_number(field: &'static str, value: &str) -> std::result::Result<usize, ContextError> {
    value.parse().map_err(|_| ContextError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

impl FromStr for ContextDescriptor {
    type Err = ContextError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut file = None;
        let mut method = None;
        let mut position = None;
        let mut length = None;
        for line in s.lines() {
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match name.trim() {
                "File" => file = Some(value),
                "Method" => method = Some(value),
                "Position" => position = Some(value),
                "Length" => length = Some(value),
                _ => {}
            }
        }

        let file = file.ok_or(ContextError::MissingField("File"))?;
        let (path, line) = file
            .rsplit_once(':')
            .ok_or_else(|| ContextError::MissingLine(file.to_string()))?;
        Ok(Self {
            path: path.trim().to_string(),
            line: parse_number("File", line.trim())?,
            enclosing: method
                .ok_or(ContextError::MissingField("Method"))?
                .to_string(),
            offset: parse_number(
                "Position",
                position.ok_or(ContextError::MissingField("Position"))?,
            )?,
            length: parse_number("Length", length.ok_or(ContextError::MissingField("Length"))?)?,
        })
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Strong key: changes when either the text or its offset changes.
pub fn identity_hash(text: &str, start: usize) -> String {
    sha256_hex(format!("{text}|{start}").as_bytes())
}

/// Position-independent key used for cross-version fuzzy matching.
pub fn weak_hash(text: &str) -> String {
    sha256_hex(text.as_bytes())
}

/// Failure taxonomy shared by the pipeline crates.
#[derive(Debug, Error)]
pub enum DllLocError {
    #[error("no input: {0}")]
    InputMissing(String),
    #[error("failed to parse {path}: {reason}")]
    ParseFailure { path: PathBuf, reason: String },
    #[error("malformed records in {path}: {source}")]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("record {key}: unusable context: {source}")]
    ContextParse {
        key: String,
        #[source]
        source: ContextError,
    },
    #[error("{path}: {reason}")]
    ConsistencyFault { path: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_are_sha256_hex() {
        assert_eq!(
            weak_hash("foo"),
            "2c26b46b68ffc68ff99b453c1d30413413422d706483bfa0f98a5e886266e7ae"
        );
        assert_eq!(
            identity_hash("foo", 10),
            "c60c3da6e4c7fd448622ee39b0e0e848771fd19c6ee92b32b9ad48cf76e911e4"
        );
        assert_ne!(identity_hash("foo", 10), identity_hash("foo", 11));
    }

    #[test]
    fn span_trims_text_but_keeps_extent() {
        let span = TranslatableSpan::from_raw("  Hello \n", 40, "Greet", 3);
        assert_eq!(span.text, "Hello");
        assert_eq!(span.start, 40);
        assert_eq!(span.length, 9);
        assert_eq!(span.end(), 49);
        assert_eq!(span.hash, identity_hash("Hello", 40));
    }

    #[test]
    fn context_layout_is_fixed() {
        let ctx = ContextDescriptor {
            path: "Game/Ui/Menu.cs".into(),
            line: 12,
            enclosing: "Show".into(),
            offset: 345,
            length: 27,
        };
        let s = ctx.to_string();
        assert_eq!(
            s,
            "File: Game/Ui/Menu.cs:12\nMethod: Show\nPosition: 345\nLength: 27"
        );
        assert_eq!(s.parse::<ContextDescriptor>().unwrap(), ctx);
    }

    #[test]
    fn context_keeps_colons_in_method_names() {
        let ctx: ContextDescriptor = "File: A.cs:1\nMethod: op_Implicit::x\nPosition: 0\nLength: 4"
            .parse()
            .unwrap();
        assert_eq!(ctx.enclosing, "op_Implicit::x");
    }

    #[test]
    fn foreign_context_is_rejected() {
        assert_eq!(
            "PathID: 12\nScript: TextMeshPro".parse::<ContextDescriptor>(),
            Err(ContextError::MissingField("File"))
        );
        assert!(matches!(
            "File: A.cs:1\nMethod: M\nPosition: x\nLength: 4".parse::<ContextDescriptor>(),
            Err(ContextError::InvalidNumber { field: "Position", .. })
        ));
        assert!(matches!(
            "File: A.cs\nMethod: M\nPosition: 1\nLength: 4".parse::<ContextDescriptor>(),
            Err(ContextError::MissingLine(_))
        ));
    }

    #[test]
    fn record_json_shape() {
        let span = TranslatableSpan::from_raw("\"Hi\"", 5, "Main", 1);
        let mut rec = TranslationRecord::untranslated("A.cs", &span);
        rec.translation = "\"Salut\"".into();
        rec.stage = Stage::Confirmed;
        let v = serde_json::to_value(&rec).unwrap();
        assert_eq!(v["stage"], 1);
        assert_eq!(v["key"], span.hash.as_str());
        let back: TranslationRecord = serde_json::from_value(v).unwrap();
        assert_eq!(back, rec);

        let bad = serde_json::from_str::<TranslationRecord>(
            r#"{"key":"k","original":"o","translation":"","stage":7,"context":""}"#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn span_json_uses_intermediate_names() {
        let span = TranslatableSpan::from_raw("x", 1, GLOBAL_SCOPE, 1);
        let v = serde_json::to_value(&span).unwrap();
        for field in ["text", "hash", "startPosition", "length", "containingMethod", "startLine"] {
            assert!(v.get(field).is_some(), "missing {field}");
        }
    }
}
