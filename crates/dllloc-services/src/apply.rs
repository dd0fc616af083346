use crate::store::{self, CorpusKind};
use crate::util::{copy_tree, join_rel, write_atomic};
use crate::{FileMap, Result};
use dllloc_core::{ContextDescriptor, DllLocError, Stage, TranslationRecord};
use dllloc_domain::{ApplyFault, ApplySummary, SCHEMA_VERSION};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    /// Skip records still awaiting review (`stage = 2`).
    pub only_confirmed: bool,
}

/// One replacement, positioned against the original file bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub key: String,
    pub offset: usize,
    pub length: usize,
    pub translation: String,
}

/// Substitutions grouped by source file key, plus records that were dropped.
#[derive(Debug, Clone, Default)]
pub struct ApplyPlan {
    pub files: BTreeMap<String, Vec<Substitution>>,
    pub skipped: usize,
}

/// Turn records into positioned substitutions. Records without a translation
/// are ignored; records whose context does not parse are dropped and counted.
pub fn plan(records: &FileMap<TranslationRecord>, opts: &ApplyOptions) -> ApplyPlan {
    let mut out = ApplyPlan::default();
    for rec in records.values().flatten() {
        if !rec.has_translation() {
            continue;
        }
        if opts.only_confirmed && rec.stage == Stage::FuzzyCarried {
            tracing::debug!(event = "apply_skip_unreviewed", key = %rec.key);
            out.skipped += 1;
            continue;
        }
        let ctx = match rec.context.parse::<ContextDescriptor>() {
            Ok(ctx) => ctx,
            Err(source) => {
                let err = DllLocError::ContextParse {
                    key: rec.key.clone(),
                    source,
                };
                tracing::warn!(event = "apply_bad_context", error = %err);
                out.skipped += 1;
                continue;
            }
        };
        out.files.entry(ctx.path).or_default().push(Substitution {
            key: rec.key.clone(),
            offset: ctx.offset,
            length: ctx.length,
            translation: rec.translation.clone(),
        });
    }
    out
}

fn fault(path: &str, reason: String) -> DllLocError {
    DllLocError::ConsistencyFault {
        path: path.to_string(),
        reason,
    }
}

/// Single left-to-right pass over `original`. `subs` may come in any order.
///
/// Overlapping ranges, two substitutions at one offset, ranges past the end
/// and ranges that split a UTF-8 sequence are faults for the whole file, as
/// are offsets so large that the range end does not fit in `usize`.
pub fn substitute(path: &str, original: &str, subs: &[Substitution]) -> std::result::Result<String, DllLocError> {
    let mut ordered: Vec<&Substitution> = subs.iter().collect();
    ordered.sort_by_key(|s| s.offset);

    let mut out = String::with_capacity(original.len());
    let mut last = 0usize;
    let mut prev_offset = None;
    for sub in ordered {
        let Some(end) = sub.offset.checked_add(sub.length) else {
            return Err(fault(
                path,
                format!("record {} range {}+{} overflows", sub.key, sub.offset, sub.length),
            ));
        };
        if prev_offset == Some(sub.offset) {
            return Err(fault(path, format!("two records claim offset {} ({})", sub.offset, sub.key)));
        }
        if sub.offset < last {
            return Err(fault(
                path,
                format!("record {} at {} overlaps the previous range ending at {last}", sub.key, sub.offset),
            ));
        }
        if end > original.len() {
            return Err(fault(
                path,
                format!("record {} ends at {end}, past the file end {}", sub.key, original.len()),
            ));
        }
        if !original.is_char_boundary(sub.offset) || !original.is_char_boundary(end) {
            return Err(fault(path, format!("record {} splits a character", sub.key)));
        }
        out.push_str(&original[last..sub.offset]);
        out.push_str(&sub.translation);
        last = end;
        prev_offset = Some(sub.offset);
    }
    out.push_str(&original[last..]);
    Ok(out)
}

enum FileOutcome {
    Rewritten(usize),
    Missing(usize),
    Fault(ApplyFault),
    Cancelled,
}

fn file_fault(path: &str, error: String) -> FileOutcome {
    tracing::error!(event = "apply_fault", path, error = %error);
    FileOutcome::Fault(ApplyFault {
        path: path.to_string(),
        error,
    })
}

/// Every failure here stays with `path`; the rest of the batch carries on.
fn apply_file(root: &Path, out: &Path, path: &str, subs: &[Substitution]) -> FileOutcome {
    let (Some(src), Some(dst)) = (join_rel(root, path), join_rel(out, path)) else {
        tracing::warn!(event = "apply_path_rejected", path);
        return FileOutcome::Missing(subs.len());
    };
    if !dst.is_file() || !src.is_file() {
        tracing::warn!(event = "apply_file_missing", path, records = subs.len());
        return FileOutcome::Missing(subs.len());
    }
    let original = match std::fs::read(&src).map(String::from_utf8) {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => return file_fault(path, format!("not valid UTF-8: {e}")),
        Err(e) => return file_fault(path, format!("read {}: {e}", src.display())),
    };
    let rewritten = match substitute(path, &original, subs) {
        Ok(rewritten) => rewritten,
        Err(err) => return file_fault(path, err.to_string()),
    };
    if let Err(e) = write_atomic(&dst, rewritten.as_bytes()) {
        return file_fault(path, format!("write {}: {e}", dst.display()));
    }
    tracing::debug!(event = "apply_file", path, substitutions = subs.len());
    FileOutcome::Rewritten(subs.len())
}

/// Copy `root` to `out`, then rewrite the files that have substitutions.
/// `cancel` is checked before each file; files already written stay valid.
pub fn apply_plan(root: &Path, out: &Path, plan: &ApplyPlan, cancel: &AtomicBool) -> Result<ApplySummary> {
    if !root.is_dir() {
        return Err(DllLocError::InputMissing(format!("{} is not a directory", root.display())).into());
    }
    let files_copied = copy_tree(root, out)?;
    tracing::info!(event = "apply_copied", files = files_copied, out = %out.display());

    let outcomes: Vec<FileOutcome> = plan
        .files
        .par_iter()
        .map(|(path, subs)| {
            if cancel.load(Ordering::Relaxed) {
                return FileOutcome::Cancelled;
            }
            apply_file(root, out, path, subs)
        })
        .collect();

    let mut summary = ApplySummary {
        schema_version: SCHEMA_VERSION,
        files_copied,
        skipped_records: plan.skipped,
        ..Default::default()
    };
    for outcome in outcomes {
        match outcome {
            FileOutcome::Rewritten(n) => {
                summary.files_rewritten += 1;
                summary.substitutions += n;
            }
            FileOutcome::Missing(n) => summary.skipped_records += n,
            FileOutcome::Fault(f) => summary.faults.push(f),
            FileOutcome::Cancelled => summary.cancelled = true,
        }
    }
    tracing::info!(
        event = "apply_done",
        rewritten = summary.files_rewritten,
        substitutions = summary.substitutions,
        skipped = summary.skipped_records,
        faults = summary.faults.len(),
        cancelled = summary.cancelled,
    );
    Ok(summary)
}

/// Load the record tree of `kind` from `records_dir` and apply it.
pub fn apply_dirs(
    records_dir: &Path,
    root: &Path,
    out: &Path,
    kind: CorpusKind,
    source_ext: &str,
    opts: &ApplyOptions,
    cancel: &AtomicBool,
) -> Result<ApplySummary> {
    let loaded = store::load_records(records_dir, kind, source_ext);
    if loaded.files.is_empty() {
        return Err(DllLocError::InputMissing(format!(
            "no readable {kind} records under {}",
            records_dir.display()
        ))
        .into());
    }
    let plan = plan(&loaded.files, opts);
    apply_plan(root, out, &plan, cancel)
}
