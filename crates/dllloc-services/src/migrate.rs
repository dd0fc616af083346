use crate::store::{self, CorpusKind};
use crate::{FileMap, Result};
use dllloc_core::{Stage, TranslatableSpan, TranslationRecord};
use dllloc_domain::{MigrateFileStat, MigrateSummary, SCHEMA_VERSION};
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::Path;

/// Reconciliation result for one file.
#[derive(Debug, Clone, Default)]
pub struct FileMigration {
    /// One record per new span, in extraction order.
    pub records: Vec<TranslationRecord>,
    /// Old records no span claimed, in their original order.
    pub obsolete: Vec<TranslationRecord>,
    pub stat: MigrateFileStat,
}

#[derive(Debug, Clone, Default)]
pub struct Migration {
    pub records: FileMap<TranslationRecord>,
    pub obsolete: FileMap<TranslationRecord>,
    pub per_file: Vec<MigrateFileStat>,
}

impl Migration {
    pub fn summary(&self, unreadable: usize) -> MigrateSummary {
        let sum = |f: fn(&MigrateFileStat) -> usize| -> usize { self.per_file.iter().map(f).sum() };
        MigrateSummary {
            schema_version: SCHEMA_VERSION,
            files: self.per_file.len(),
            migrated: sum(|s| s.migrated),
            fuzzy: sum(|s| s.fuzzy),
            new: sum(|s| s.new),
            obsolete: sum(|s| s.obsolete),
            unreadable,
            per_file: self.per_file.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Claim {
    Exact(usize),
    Fuzzy(usize),
    New,
}

/// Reconcile one file's old records with its fresh spans.
///
/// Identity-hash matches are claimed first over the whole file, so a span at
/// its old position keeps its record even when an earlier span of equal text
/// would fuzzy-match it. Remaining spans then take the first unclaimed old
/// record of equal text.
///
/// This departs from a strictly sequential single pass, where an earlier
/// span's fuzzy claim could consume the record a later span matches exactly.
pub fn migrate_file(path: &str, old: &[TranslationRecord], spans: &[TranslatableSpan]) -> FileMigration {
    let mut by_key: HashMap<&str, usize> = HashMap::new();
    let mut by_text: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, rec) in old.iter().enumerate() {
        by_key.entry(rec.key.as_str()).or_insert(i);
        by_text.entry(rec.weak_hash()).or_default().push(i);
    }

    let mut consumed = vec![false; old.len()];
    let mut claims = vec![Claim::New; spans.len()];
    for (claim, span) in claims.iter_mut().zip(spans) {
        if let Some(&i) = by_key.get(span.hash.as_str()) {
            if !consumed[i] {
                consumed[i] = true;
                *claim = Claim::Exact(i);
            }
        }
    }
    for (claim, span) in claims.iter_mut().zip(spans) {
        if !matches!(claim, Claim::New) {
            continue;
        }
        let candidate = by_text
            .get(&span.weak_hash())
            .and_then(|idx| idx.iter().copied().find(|&i| !consumed[i]));
        if let Some(i) = candidate {
            consumed[i] = true;
            *claim = Claim::Fuzzy(i);
        }
    }

    let mut stat = MigrateFileStat {
        path: path.to_string(),
        ..Default::default()
    };
    let records = claims
        .iter()
        .zip(spans)
        .map(|(claim, span)| match *claim {
            Claim::Exact(i) => {
                stat.migrated += 1;
                let mut rec = old[i].clone();
                rec.rebind(path, span);
                rec
            }
            Claim::Fuzzy(i) => {
                stat.fuzzy += 1;
                let mut rec = old[i].clone();
                rec.rebind(path, span);
                if rec.stage != Stage::Untranslated {
                    rec.stage = Stage::FuzzyCarried;
                }
                rec
            }
            Claim::New => {
                stat.new += 1;
                TranslationRecord::untranslated(path, span)
            }
        })
        .collect();

    let obsolete: Vec<TranslationRecord> = old
        .iter()
        .zip(&consumed)
        .filter(|&(_, &used)| !used)
        .map(|(rec, _)| rec.clone())
        .collect();
    stat.obsolete = obsolete.len();

    FileMigration {
        records,
        obsolete,
        stat,
    }
}

/// Reconcile every file. Matching never crosses files; old files without a
/// fresh counterpart become wholly obsolete.
pub fn migrate(old: &FileMap<TranslationRecord>, new: &FileMap<TranslatableSpan>) -> Migration {
    let reconciled: Vec<(String, FileMigration)> = new
        .par_iter()
        .map(|(path, spans)| {
            let prior = old.get(path).map(Vec::as_slice).unwrap_or_default();
            (path.clone(), migrate_file(path, prior, spans))
        })
        .collect();

    let mut out = Migration::default();
    for (path, file) in reconciled {
        if !file.obsolete.is_empty() {
            out.obsolete.insert(path.clone(), file.obsolete);
        }
        out.records.insert(path, file.records);
        out.per_file.push(file.stat);
    }
    for (path, records) in old.iter().filter(|(p, _)| !new.contains_key(*p)) {
        if records.is_empty() {
            continue;
        }
        tracing::info!(event = "file_obsolete", path = %path, records = records.len());
        out.per_file.push(MigrateFileStat {
            path: path.clone(),
            obsolete: records.len(),
            ..Default::default()
        });
        out.obsolete.insert(path.clone(), records.clone());
    }
    out.per_file.sort_by(|a, b| a.path.cmp(&b.path));
    out
}

/// Load old records from `old_dir`, migrate against `spans` and write the
/// result (plus merged obsolete history) under `out_dir`.
pub fn migrate_dirs(
    old_dir: &Path,
    out_dir: &Path,
    kind: CorpusKind,
    source_ext: &str,
    spans: &FileMap<TranslatableSpan>,
) -> Result<MigrateSummary> {
    let old = store::load_records(old_dir, kind, source_ext);
    let old_files = store::align_keys(kind, old.files, spans.keys());
    let migration = migrate(&old_files, spans);

    let prior_obsolete = store::load_obsolete(old_dir, kind, source_ext);
    let prior = store::align_keys(
        kind,
        prior_obsolete.files,
        spans.keys().chain(migration.obsolete.keys()),
    );
    let obsolete = store::merge_obsolete(prior, migration.obsolete.clone());

    store::write_records(out_dir, kind, &migration.records)?;
    let stale = old_files
        .keys()
        .filter(|k| migration.records.get(*k).map_or(true, Vec::is_empty));
    let removed = store::remove_records(out_dir, kind, stale, &migration.records)?;
    store::write_obsolete(out_dir, kind, &obsolete)?;

    let summary = migration.summary(old.unreadable + prior_obsolete.unreadable);
    tracing::info!(
        event = "migrate_done",
        files = summary.files,
        migrated = summary.migrated,
        fuzzy = summary.fuzzy,
        new = summary.new,
        obsolete = summary.obsolete,
        removed,
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dllloc_core::{identity_hash, ContextDescriptor};

    fn span(text: &str, start: usize) -> TranslatableSpan {
        TranslatableSpan::from_raw(text, start, "M", 1)
    }

    fn old_rec(text: &str, start: usize, translation: &str, stage: Stage) -> TranslationRecord {
        let mut rec = TranslationRecord::untranslated("A.cs", &span(text, start));
        rec.translation = translation.into();
        rec.stage = stage;
        rec
    }

    #[test]
    fn exact_match_keeps_translation_and_stage() {
        let old = vec![old_rec("Hello", 42, "Bonjour", Stage::Confirmed)];
        let m = migrate_file("A.cs", &old, &[span("Hello", 42)]);
        assert_eq!(m.records.len(), 1);
        assert_eq!(m.records[0].translation, "Bonjour");
        assert_eq!(m.records[0].stage, Stage::Confirmed);
        assert_eq!(
            m.records[0].key,
            "c33a3965eefc61dc2c7eef1866619407b476bc3016f7aed527fc4aac511133f1"
        );
        assert_eq!(m.stat.migrated, 1);
        assert!(m.obsolete.is_empty());
    }

    #[test]
    fn moved_text_is_fuzzy_carried_and_demoted() {
        let old = vec![old_rec("Hello", 42, "Bonjour", Stage::Confirmed)];
        let m = migrate_file("A.cs", &old, &[span("Hello", 50)]);
        let rec = &m.records[0];
        assert_eq!(rec.translation, "Bonjour");
        assert_eq!(rec.stage, Stage::FuzzyCarried);
        assert_eq!(rec.key, identity_hash("Hello", 50));
        let ctx: ContextDescriptor = rec.context.parse().unwrap();
        assert_eq!(ctx.offset, 50);
        assert_eq!(m.stat.fuzzy, 1);
        assert!(m.obsolete.is_empty());
    }

    #[test]
    fn fuzzy_untranslated_stays_untranslated() {
        let old = vec![old_rec("Hello", 42, "", Stage::Untranslated)];
        let m = migrate_file("A.cs", &old, &[span("Hello", 7)]);
        assert_eq!(m.records[0].stage, Stage::Untranslated);
    }

    #[test]
    fn new_spans_start_empty_and_leftovers_are_obsolete() {
        let old = vec![
            old_rec("Gone", 1, "Parti", Stage::Confirmed),
            old_rec("Also gone", 9, "", Stage::Untranslated),
        ];
        let m = migrate_file("A.cs", &old, &[span("Fresh", 3)]);
        assert_eq!(m.records[0].translation, "");
        assert_eq!(m.records[0].stage, Stage::Untranslated);
        assert_eq!(m.stat.new, 1);
        let keys: Vec<_> = m.obsolete.iter().map(|r| r.original.as_str()).collect();
        assert_eq!(keys, vec!["Gone", "Also gone"]);
    }

    #[test]
    fn exact_match_wins_its_slot_over_an_earlier_fuzzy_claim() {
        let old = vec![old_rec("foo", 10, "FOO", Stage::Confirmed)];
        let m = migrate_file("A.cs", &old, &[span("foo", 5), span("foo", 10)]);
        assert_eq!(m.records[0].translation, "");
        assert_eq!(m.records[0].stage, Stage::Untranslated);
        assert_eq!(m.records[1].translation, "FOO");
        assert_eq!(m.records[1].stage, Stage::Confirmed);
        assert_eq!((m.stat.migrated, m.stat.fuzzy, m.stat.new), (1, 0, 1));
    }

    #[test]
    fn duplicate_text_takes_candidates_in_old_order_once() {
        let old = vec![
            old_rec("foo", 10, "one", Stage::Confirmed),
            old_rec("foo", 20, "two", Stage::Confirmed),
        ];
        let m = migrate_file("A.cs", &old, &[span("foo", 11), span("foo", 21), span("foo", 31)]);
        let t: Vec<_> = m.records.iter().map(|r| r.translation.as_str()).collect();
        assert_eq!(t, vec!["one", "two", ""]);
        assert!(m.obsolete.is_empty());
    }

    #[test]
    fn files_never_share_records() {
        let mut old = FileMap::new();
        old.insert("A.cs".to_string(), vec![old_rec("Hi", 1, "Salut", Stage::Confirmed)]);
        old.insert("Gone.cs".to_string(), vec![old_rec("x", 1, "", Stage::Untranslated)]);
        let mut new = FileMap::new();
        new.insert("B.cs".to_string(), vec![span("Hi", 1)]);
        new.insert("A.cs".to_string(), Vec::new());

        let m = migrate(&old, &new);
        assert_eq!(m.records["B.cs"][0].translation, "");
        assert_eq!(m.obsolete["A.cs"].len(), 1);
        assert_eq!(m.obsolete["Gone.cs"].len(), 1);
        let s = m.summary(0);
        assert_eq!((s.new, s.obsolete, s.files), (1, 2, 3));
    }

    #[test]
    fn migrate_dirs_writes_records_and_accumulates_obsolete() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let mut old = FileMap::new();
        old.insert(
            "A.cs".to_string(),
            vec![
                old_rec("keep", 1, "garde", Stage::Confirmed),
                old_rec("drop", 9, "jette", Stage::Confirmed),
            ],
        );
        old.insert("Gone.cs".to_string(), vec![old_rec("bye", 1, "", Stage::Untranslated)]);
        store::write_records(root, CorpusKind::Source, &old).unwrap();

        let mut spans = FileMap::new();
        spans.insert("A.cs".to_string(), vec![span("keep", 1)]);
        let summary = migrate_dirs(root, root, CorpusKind::Source, "cs", &spans).unwrap();
        assert_eq!((summary.migrated, summary.obsolete), (1, 2));
        assert!(!root.join("source/Gone.json").exists());

        // A second run against an empty file keeps earlier history.
        spans.insert("A.cs".to_string(), Vec::new());
        migrate_dirs(root, root, CorpusKind::Source, "cs", &spans).unwrap();
        let obsolete = store::load_obsolete(root, CorpusKind::Source, "cs");
        let a: Vec<_> = obsolete.files["A.cs"].iter().map(|r| r.original.as_str()).collect();
        assert_eq!(a, vec!["drop", "keep"]);
        assert_eq!(obsolete.files["Gone.cs"].len(), 1);
        assert!(!root.join("source/A.json").exists());
    }

    #[test]
    fn upper_case_extension_survives_an_unchanged_rerun() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let mut spans = FileMap::new();
        spans.insert("Menu.CS".to_string(), vec![span("Play", 5)]);
        let first = migrate_dirs(root, root, CorpusKind::Source, "cs", &spans).unwrap();
        assert_eq!(first.new, 1);

        let mut loaded = store::load_records(root, CorpusKind::Source, "cs");
        for rec in loaded.files.values_mut().flatten() {
            rec.translation = "Jouer".into();
            rec.stage = Stage::Confirmed;
        }
        store::write_records(root, CorpusKind::Source, &loaded.files).unwrap();

        let second = migrate_dirs(root, root, CorpusKind::Source, "cs", &spans).unwrap();
        assert_eq!((second.migrated, second.new, second.obsolete), (1, 0, 0));
        assert!(root.join("source/Menu.json").is_file());
        let back = store::load_records(root, CorpusKind::Source, "cs");
        let rec = back.files.values().flatten().next().unwrap();
        assert_eq!(rec.translation, "Jouer");
        assert_eq!(rec.stage, Stage::Confirmed);
        let ctx: ContextDescriptor = rec.context.parse().unwrap();
        assert_eq!(ctx.path, "Menu.CS");
    }
}
