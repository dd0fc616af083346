//! Analyzer adapter: finds C# sources, parses them with tree-sitter and lowers
//! the result into an index-addressed [`SyntaxTree`] the extractor can walk.

use dllloc_core::{DllLocError, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

mod lower;
mod oracle;
mod tree;

pub use lower::csharp_parser;
pub use oracle::{is_text_type, LiteralOracle, SemanticIndex, TypeOracle};
pub use tree::{NodeId, SyntaxKind, SyntaxNode, SyntaxTree};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// A source file discovered under the corpus root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Root-relative path with `/` separators; the file key used everywhere downstream.
    pub rel_path: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ParsedUnit {
    pub rel_path: String,
    pub tree: SyntaxTree,
}

pub fn rel_key(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Walk `root` for files with extension `ext`, sorted by relative path.
pub fn scan_sources(root: &Path, ext: &str) -> Result<Vec<SourceFile>> {
    if !root.is_dir() {
        return Err(DllLocError::InputMissing(format!("{} is not a directory", root.display())).into());
    }
    let mut out: Vec<SourceFile> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| match e {
            Ok(e) => Some(e),
            Err(err) => {
                tracing::warn!(event = "scan_walk_error", error = %err);
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|x| x.to_str())
                .is_some_and(|x| x.eq_ignore_ascii_case(ext))
        })
        .map(|e| SourceFile {
            rel_path: rel_key(root, e.path()),
            path: e.into_path(),
        })
        .collect();
    out.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(out)
}

/// Parse one unit. Offsets in the returned tree are byte offsets into `text`.
pub fn parse_unit(rel_path: &str, text: String) -> std::result::Result<ParsedUnit, DllLocError> {
    let failure = |reason: String| DllLocError::ParseFailure {
        path: PathBuf::from(rel_path),
        reason,
    };
    let mut parser = csharp_parser().map_err(|e| failure(e.to_string()))?;

    // Blank the BOM for the parser without moving any offset.
    let parsed = if text.as_bytes().starts_with(UTF8_BOM) {
        let blanked = format!("   {}", &text[UTF8_BOM.len()..]);
        parser.parse(&blanked, None)
    } else {
        parser.parse(&text, None)
    }
    .ok_or_else(|| failure("parser produced no tree".into()))?;

    let tree = lower::lower(&parsed, text);
    if tree.has_errors() {
        tracing::warn!(event = "parse_recovered", path = rel_path, "syntax errors, extracting what parsed");
    }
    Ok(ParsedUnit {
        rel_path: rel_path.to_string(),
        tree,
    })
}

/// Read and parse a discovered file.
pub fn read_unit(file: &SourceFile) -> std::result::Result<ParsedUnit, DllLocError> {
    let bytes = std::fs::read(&file.path).map_err(|e| DllLocError::ParseFailure {
        path: file.path.clone(),
        reason: e.to_string(),
    })?;
    let text = String::from_utf8(bytes).map_err(|e| DllLocError::ParseFailure {
        path: file.path.clone(),
        reason: format!("not valid UTF-8: {e}"),
    })?;
    parse_unit(&file.rel_path, text)
}
