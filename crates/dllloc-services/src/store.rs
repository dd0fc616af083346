//! On-disk layout of translation record trees.
//!
//! `<dir>/<kind>/<mirrored path>.json` holds live records and
//! `<dir>/obsolete/<kind>/<mirrored path>.json` holds superseded ones.

use crate::util::{join_rel, json_files, json_rel, source_rel, write_json};
use crate::{FileMap, Result};
use color_eyre::eyre::eyre;
use dllloc_core::{DllLocError, TranslationRecord};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const OBSOLETE_DIR: &str = "obsolete";

/// Sub-corpus discriminator: one record subtree per artifact kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CorpusKind {
    /// Decompiled sources; `Foo.cs` records live in `Foo.json`.
    #[default]
    Source,
    /// Asset-archive strings; the asset name is kept and `.json` appended.
    Asset,
}

impl CorpusKind {
    pub fn dir_name(self) -> &'static str {
        match self {
            CorpusKind::Source => "source",
            CorpusKind::Asset => "asset",
        }
    }

    /// Record file (relative to the kind root) for a file key.
    pub fn record_rel(self, file_key: &str) -> String {
        match self {
            CorpusKind::Source => json_rel(file_key),
            CorpusKind::Asset => format!("{file_key}.json"),
        }
    }

    /// File key for a record file relative to the kind root.
    pub fn file_key(self, record_rel: &str, source_ext: &str) -> String {
        match self {
            CorpusKind::Source => source_rel(record_rel, source_ext),
            CorpusKind::Asset => record_rel
                .strip_suffix(".json")
                .unwrap_or(record_rel)
                .to_string(),
        }
    }

    pub fn live_root(self, dir: &Path) -> PathBuf {
        dir.join(self.dir_name())
    }

    pub fn obsolete_root(self, dir: &Path) -> PathBuf {
        dir.join(OBSOLETE_DIR).join(self.dir_name())
    }
}

impl fmt::Display for CorpusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for CorpusKind {
    type Err = color_eyre::eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "source" | "src" => Ok(CorpusKind::Source),
            "asset" | "assets" => Ok(CorpusKind::Asset),
            other => Err(eyre!("unknown corpus kind {other:?}, expected `source` or `asset`")),
        }
    }
}

/// Records of one subtree plus the number of files that could not be used.
#[derive(Debug, Clone, Default)]
pub struct LoadedRecords {
    pub files: FileMap<TranslationRecord>,
    pub unreadable: usize,
}

impl LoadedRecords {
    pub fn record_count(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }
}

pub fn read_record_file(path: &Path) -> std::result::Result<Vec<TranslationRecord>, DllLocError> {
    let bytes = std::fs::read(path).map_err(|e| DllLocError::ParseFailure {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    serde_json::from_slice(&bytes).map_err(|source| DllLocError::Serialization {
        path: path.to_path_buf(),
        source,
    })
}

fn load_tree(root: &Path, kind: CorpusKind, source_ext: &str) -> LoadedRecords {
    let mut loaded = LoadedRecords::default();
    for (rel, path) in json_files(root) {
        match read_record_file(&path) {
            Ok(records) => {
                loaded
                    .files
                    .insert(kind.file_key(&rel, source_ext), records);
            }
            Err(err) => {
                tracing::warn!(event = "records_unreadable", path = %path.display(), error = %err);
                loaded.unreadable += 1;
            }
        }
    }
    loaded
}

/// Re-key `loaded` onto the spelling in `keys` that shares its record file.
///
/// A `source` record file drops the extension, so `Menu.json` reads back as
/// `Menu.cs` even when the scanned source is `Menu.CS`.
pub fn align_keys<'a, T>(
    kind: CorpusKind,
    loaded: FileMap<T>,
    keys: impl IntoIterator<Item = &'a String>,
) -> FileMap<T> {
    let by_record: HashMap<String, &String> =
        keys.into_iter().map(|k| (kind.record_rel(k), k)).collect();
    loaded
        .into_iter()
        .map(|(key, records)| match by_record.get(&kind.record_rel(&key)) {
            Some(&aligned) if *aligned != key => {
                tracing::debug!(event = "records_rekeyed", from = %key, to = %aligned);
                (aligned.clone(), records)
            }
            _ => (key, records),
        })
        .collect()
}

/// Live records of `kind` under `dir`, keyed by source file key in file order.
pub fn load_records(dir: &Path, kind: CorpusKind, source_ext: &str) -> LoadedRecords {
    let loaded = load_tree(&kind.live_root(dir), kind, source_ext);
    tracing::debug!(
        event = "records_loaded",
        dir = %dir.display(),
        kind = %kind,
        files = loaded.files.len(),
        records = loaded.record_count(),
        unreadable = loaded.unreadable,
    );
    loaded
}

pub fn load_obsolete(dir: &Path, kind: CorpusKind, source_ext: &str) -> LoadedRecords {
    load_tree(&kind.obsolete_root(dir), kind, source_ext)
}

fn record_path(root: &Path, kind: CorpusKind, file_key: &str) -> Result<PathBuf> {
    join_rel(root, &kind.record_rel(file_key))
        .ok_or_else(|| eyre!("file key {file_key:?} escapes {}", root.display()))
}

/// Write live record files. Files with no records are not written.
pub fn write_records(dir: &Path, kind: CorpusKind, files: &FileMap<TranslationRecord>) -> Result<usize> {
    let root = kind.live_root(dir);
    let mut written = 0usize;
    for (key, records) in files.iter().filter(|(_, r)| !r.is_empty()) {
        write_json(&record_path(&root, kind, key)?, records)?;
        written += 1;
    }
    Ok(written)
}

/// Remove live record files for keys that no longer have records.
/// Record files that `files` still writes are never removed.
pub fn remove_records<'a>(
    dir: &Path,
    kind: CorpusKind,
    keys: impl IntoIterator<Item = &'a String>,
    files: &FileMap<TranslationRecord>,
) -> Result<usize> {
    let root = kind.live_root(dir);
    let kept: HashSet<String> = files
        .iter()
        .filter(|(_, r)| !r.is_empty())
        .map(|(k, _)| kind.record_rel(k))
        .collect();
    let mut removed = 0usize;
    for key in keys {
        if kept.contains(&kind.record_rel(key)) {
            continue;
        }
        let path = record_path(&root, kind, key)?;
        if path.is_file() {
            std::fs::remove_file(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Add `fresh` obsolete records to `prior` per file. A fresh record replaces
/// any prior record with the same key; records within `fresh` are all kept.
pub fn merge_obsolete(
    mut prior: FileMap<TranslationRecord>,
    fresh: FileMap<TranslationRecord>,
) -> FileMap<TranslationRecord> {
    for (key, records) in fresh {
        let slot = prior.entry(key).or_default();
        let replaced: HashSet<&str> = records.iter().map(|r| r.key.as_str()).collect();
        slot.retain(|r| !replaced.contains(r.key.as_str()));
        slot.extend(records);
    }
    prior
}

pub fn write_obsolete(dir: &Path, kind: CorpusKind, files: &FileMap<TranslationRecord>) -> Result<usize> {
    let root = kind.obsolete_root(dir);
    let mut written = 0usize;
    for (key, records) in files.iter().filter(|(_, r)| !r.is_empty()) {
        write_json(&record_path(&root, kind, key)?, records)?;
        written += 1;
    }
    Ok(written)
}
