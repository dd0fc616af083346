use crate::store::read_record_file;
use crate::util::json_files;
use crate::Result;
use dllloc_core::DllLocError;
use dllloc_domain::{CharsetReport, SCHEMA_VERSION};
use std::collections::BTreeSet;
use std::path::Path;

/// Distinct non-whitespace characters of every non-empty translation under
/// `records_dir` (searched recursively), plus those of `symbols` if given.
pub fn collect_chars(records_dir: &Path, symbols: Option<&Path>) -> Result<BTreeSet<char>> {
    if !records_dir.is_dir() {
        return Err(DllLocError::InputMissing(format!("{} is not a directory", records_dir.display())).into());
    }
    let mut chars = BTreeSet::new();
    for (_, path) in json_files(records_dir) {
        match read_record_file(&path) {
            Ok(records) => chars.extend(
                records
                    .iter()
                    .filter(|r| r.has_translation())
                    .flat_map(|r| r.translation.chars())
                    .filter(|c| !c.is_whitespace()),
            ),
            Err(err) => tracing::warn!(event = "charset_skip", path = %path.display(), error = %err),
        }
    }
    if let Some(symbols) = symbols {
        match std::fs::read_to_string(symbols) {
            Ok(text) => chars.extend(text.chars().filter(|c| !c.is_whitespace())),
            Err(err) => tracing::warn!(event = "charset_symbols_missing", path = %symbols.display(), error = %err),
        }
    }
    Ok(chars)
}

pub fn report(chars: &BTreeSet<char>) -> CharsetReport {
    CharsetReport {
        schema_version: SCHEMA_VERSION,
        chars: chars.iter().collect(),
        count: chars.len(),
    }
}
