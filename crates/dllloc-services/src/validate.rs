use crate::store::{self, CorpusKind};
use crate::{Result, ValidationMessage};
use dllloc_core::DllLocError;
use std::path::Path;

/// Validate the live records of `kind` under `records_dir`.
pub fn validate_records(
    records_dir: &Path,
    kind: CorpusKind,
    source_ext: &str,
) -> Result<Vec<ValidationMessage>> {
    let loaded = store::load_records(records_dir, kind, source_ext);
    if loaded.files.is_empty() {
        return Err(DllLocError::InputMissing(format!(
            "no readable {kind} records under {}",
            records_dir.display()
        ))
        .into());
    }
    let sets: Vec<_> = loaded
        .files
        .into_iter()
        .map(|(key, records)| (kind.record_rel(&key), records))
        .collect();
    dllloc_validate::validate(&sets)
}
