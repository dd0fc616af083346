use crate::util::{join_rel, json_files, write_json};
use crate::{FileMap, Result};
use color_eyre::eyre::eyre;
use dllloc_core::{ContextDescriptor, DllLocError, TranslatableSpan, GLOBAL_SCOPE};
use dllloc_domain::{ExtractFileStat, ExtractSummary, SCHEMA_VERSION};
use dllloc_parsers_cs::{
    read_unit, scan_sources, LiteralOracle, NodeId, ParsedUnit, SemanticIndex, SyntaxKind,
    SyntaxNode, SyntaxTree, TypeOracle,
};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Only string literals; otherwise any expression the corpus index types as text.
    pub literals_only: bool,
    /// Types whose constructor bodies are emitted whole.
    pub exclude_types: Vec<String>,
    pub source_ext: String,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            literals_only: false,
            exclude_types: Vec::new(),
            source_ext: "cs".into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Spans per file key, ordered by offset.
    pub files: FileMap<TranslatableSpan>,
    /// Units skipped because they could not be read or parsed.
    pub failed: usize,
}

impl Extraction {
    pub fn span_count(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }

    pub fn summary(&self) -> ExtractSummary {
        ExtractSummary {
            schema_version: SCHEMA_VERSION,
            files: self.files.len(),
            failed: self.failed,
            spans: self.span_count(),
            per_file: self
                .files
                .iter()
                .map(|(path, spans)| ExtractFileStat {
                    path: path.clone(),
                    spans: spans.len(),
                })
                .collect(),
        }
    }
}

/// Extract every source unit under `root`.
pub fn extract(root: &Path, opts: &ExtractOptions) -> Result<Extraction> {
    let sources = scan_sources(root, &opts.source_ext)?;
    let parsed: Vec<_> = sources.par_iter().map(read_unit).collect();

    let mut units = Vec::with_capacity(parsed.len());
    let mut failed = 0usize;
    for res in parsed {
        match res {
            Ok(unit) => units.push(unit),
            Err(err) => {
                tracing::warn!(event = "unit_skipped", error = %err);
                failed += 1;
            }
        }
    }
    if units.is_empty() {
        return Err(DllLocError::InputMissing(format!(
            "no parseable .{} files under {}",
            opts.source_ext,
            root.display()
        ))
        .into());
    }

    let files = if opts.literals_only {
        extract_units(&units, &LiteralOracle, &opts.exclude_types)
    } else {
        let index = SemanticIndex::build(&units);
        extract_units(&units, &index, &opts.exclude_types)
    };
    let extraction = Extraction { files, failed };
    tracing::info!(
        event = "extract_done",
        files = extraction.files.len(),
        failed,
        spans = extraction.span_count(),
    );
    Ok(extraction)
}

/// Run the per-unit analysis in parallel over already parsed units.
pub fn extract_units(
    units: &[ParsedUnit],
    oracle: &dyn TypeOracle,
    exclude_types: &[String],
) -> FileMap<TranslatableSpan> {
    units
        .par_iter()
        .map(|unit| {
            let spans = extract_unit(&unit.tree, oracle, exclude_types);
            warn_duplicate_keys(&unit.rel_path, &spans);
            (unit.rel_path.clone(), spans)
        })
        .collect::<Vec<_>>()
        .into_iter()
        .collect()
}

fn is_statement_like(tree: &SyntaxTree, node: &SyntaxNode) -> bool {
    match node.kind {
        SyntaxKind::Statement => true,
        // Expression bodies of methods stand in for their missing statement.
        SyntaxKind::Other if node.grammar == "arrow_expression_clause" => node
            .parent
            .is_some_and(|p| {
                matches!(
                    tree.node(p).kind,
                    SyntaxKind::Method | SyntaxKind::Constructor | SyntaxKind::Destructor
                )
            }),
        _ => false,
    }
}

fn excluded_bodies(tree: &SyntaxTree, exclude_types: &[String]) -> Vec<(NodeId, NodeId)> {
    if exclude_types.is_empty() {
        return Vec::new();
    }
    tree.preorder()
        .filter(|&id| tree.node(id).kind == SyntaxKind::Constructor)
        .filter(|&ctor| {
            tree.ancestors(ctor)
                .find(|&a| tree.node(a).kind == SyntaxKind::TypeDecl)
                .and_then(|t| tree.node(t).name.as_deref())
                .is_some_and(|name| exclude_types.iter().any(|x| x == name))
        })
        .filter_map(|ctor| tree.child_by_field(ctor, "body").map(|body| (ctor, body)))
        .collect()
}

/// Analyse one tree: candidates, their enclosing statements, grouping and
/// topmost-only deduplication. Spans come back ordered by offset.
pub fn extract_unit(
    tree: &SyntaxTree,
    oracle: &dyn TypeOracle,
    exclude_types: &[String],
) -> Vec<TranslatableSpan> {
    let excluded = excluded_bodies(tree, exclude_types);

    let mut body_hits: HashSet<NodeId> = HashSet::new();
    // Group key: the smallest enclosing named member, `None` for global scope.
    let mut groups: BTreeMap<Option<NodeId>, Vec<NodeId>> = BTreeMap::new();
    for cand in tree.preorder().filter(|&n| oracle.is_text(tree, n)) {
        if let Some(&(_, body)) = excluded
            .iter()
            .find(|&&(_, body)| tree.is_ancestor_of(body, cand))
        {
            body_hits.insert(body);
            continue;
        }
        let target = tree
            .enclosing(cand, |n| is_statement_like(tree, n))
            .or_else(|| {
                tree.enclosing(cand, |n| {
                    matches!(n.kind, SyntaxKind::Field | SyntaxKind::Property)
                })
            });
        let Some(target) = target else {
            tracing::warn!(
                event = "candidate_without_statement",
                line = tree.node(cand).line,
                text = tree.text(cand),
            );
            continue;
        };
        let member = tree.enclosing(target, |n| n.kind.is_named_member());
        groups.entry(member).or_default().push(target);
    }

    let mut spans = Vec::new();
    for (member, mut targets) in groups {
        targets.sort_unstable();
        targets.dedup();
        let name = member
            .and_then(|m| tree.node(m).name.clone())
            .unwrap_or_else(|| GLOBAL_SCOPE.to_string());
        let topmost: Vec<NodeId> = targets
            .iter()
            .copied()
            .filter(|&t| !targets.iter().any(|&o| o != t && tree.is_ancestor_of(o, t)))
            .collect();
        spans.extend(topmost.into_iter().map(|t| span_for(tree, t, &name)));
    }
    for (ctor, body) in excluded {
        if body_hits.contains(&body) {
            let name = tree
                .node(ctor)
                .name
                .clone()
                .unwrap_or_else(|| GLOBAL_SCOPE.to_string());
            spans.push(span_for(tree, body, &name));
        }
    }
    spans.sort_by_key(|s| (s.start, s.length));
    spans
}

fn span_for(tree: &SyntaxTree, id: NodeId, enclosing: &str) -> TranslatableSpan {
    let node = tree.node(id);
    TranslatableSpan::from_raw(tree.text(id), node.range.start, enclosing, node.line)
}

fn warn_duplicate_keys(rel_path: &str, spans: &[TranslatableSpan]) {
    let mut seen: HashMap<&str, &TranslatableSpan> = HashMap::new();
    for span in spans {
        if let Some(first) = seen.insert(&span.hash, span) {
            tracing::warn!(
                event = "duplicate_key",
                key = %span.hash,
                first = %ContextDescriptor::for_span(rel_path, first),
                second = %ContextDescriptor::for_span(rel_path, span),
            );
        }
    }
}

/// Persist spans as intermediate files mirroring the source tree.
/// `.json` is appended to the full file key so the key reads back unchanged.
pub fn write_spans(out: &Path, files: &FileMap<TranslatableSpan>) -> Result<usize> {
    for (key, spans) in files {
        let path = join_rel(out, &format!("{key}.json"))
            .ok_or_else(|| eyre!("file key {key:?} escapes {}", out.display()))?;
        write_json(&path, spans)?;
    }
    Ok(files.len())
}

/// Load intermediate files written by [`write_spans`]. Malformed files are skipped.
pub fn load_spans(dir: &Path) -> Result<Extraction> {
    let mut extraction = Extraction::default();
    for (rel, path) in json_files(dir) {
        let parsed = std::fs::read(&path)
            .map_err(color_eyre::eyre::Report::from)
            .and_then(|bytes| {
                serde_json::from_slice::<Vec<TranslatableSpan>>(&bytes).map_err(|source| {
                    DllLocError::Serialization {
                        path: path.clone(),
                        source,
                    }
                    .into()
                })
            });
        match parsed {
            Ok(mut spans) => {
                spans.sort_by_key(|s| (s.start, s.length));
                let key = rel.strip_suffix(".json").unwrap_or(&rel).to_string();
                extraction.files.insert(key, spans);
            }
            Err(err) => {
                tracing::warn!(event = "spans_unreadable", path = %path.display(), error = %err);
                extraction.failed += 1;
            }
        }
    }
    if extraction.files.is_empty() {
        return Err(DllLocError::InputMissing(format!(
            "no readable extraction files under {}",
            dir.display()
        ))
        .into());
    }
    Ok(extraction)
}
