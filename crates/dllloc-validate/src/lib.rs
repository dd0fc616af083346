use color_eyre::eyre::Result;
use dllloc_core::{Stage, TranslationRecord};
use regex::Regex;
use std::collections::{BTreeSet, HashMap};

/// Result of a single check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationMessage {
    pub key: String,
    /// Record file the record was loaded from.
    pub path: String,
    /// Machine-readable kind: "duplicate" | "empty" | "placeholder-mismatch" | "needs-review"
    pub kind: String,
    pub message: String,
    /// For duplicate: how many times the key was seen before this occurrence.
    pub duplicate_count: Option<usize>,
}

fn message(path: &str, rec: &TranslationRecord, kind: &str, text: String) -> ValidationMessage {
    ValidationMessage {
        key: rec.key.clone(),
        path: path.to_string(),
        kind: kind.into(),
        message: text,
        duplicate_count: None,
    }
}

fn placeholders(re: &Regex, text: &str) -> BTreeSet<String> {
    re.find_iter(text).map(|m| m.as_str().to_string()).collect()
}

/// Run every check over `sets`, given as (record file, records) pairs.
pub fn validate(sets: &[(String, Vec<TranslationRecord>)]) -> Result<Vec<ValidationMessage>> {
    let mut messages = Vec::new();
    let records = || sets.iter().flat_map(|(p, recs)| recs.iter().map(move |r| (p.as_str(), r)));

    // --- duplicate keys across the whole set ---
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for (path, rec) in records() {
        if let Some(&count) = seen.get(rec.key.as_str()) {
            let mut m = message(path, rec, "duplicate", format!("key seen {count} time(s) before"));
            m.duplicate_count = Some(count);
            messages.push(m);
        }
        *seen.entry(rec.key.as_str()).or_insert(0) += 1;
    }

    // --- empty originals ---
    for (path, rec) in records() {
        if rec.original.trim().is_empty() {
            messages.push(message(path, rec, "empty", "original text is empty".into()));
        }
    }

    // --- placeholders ---
    let re = Regex::new(r"(\{\w+\}|\{\d+\}|%s|%d)")?;
    for (path, rec) in records().filter(|(_, r)| r.has_translation()) {
        let expected = placeholders(&re, &rec.original);
        let actual = placeholders(&re, &rec.translation);
        if expected != actual {
            let missing: Vec<_> = expected.difference(&actual).cloned().collect();
            let extra: Vec<_> = actual.difference(&expected).cloned().collect();
            messages.push(message(
                path,
                rec,
                "placeholder-mismatch",
                format!("missing [{}], unexpected [{}]", missing.join(" "), extra.join(" ")),
            ));
        }
    }

    // --- fuzzy-carried records ---
    for (path, rec) in records().filter(|(_, r)| r.stage == Stage::FuzzyCarried) {
        messages.push(message(
            path,
            rec,
            "needs-review",
            "translation was carried over by text match".into(),
        ));
    }

    Ok(messages)
}
