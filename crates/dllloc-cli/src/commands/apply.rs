use crate::ui::{corpus_kind, print_json};
use crate::OutputFormat;
use color_eyre::eyre::bail;
use dllloc_config::DllLocConfig;
use dllloc_services::apply::{apply_dirs, ApplyOptions};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

#[allow(clippy::too_many_arguments)]
pub fn run_apply(
    cfg: &DllLocConfig,
    records: PathBuf,
    root: PathBuf,
    out: PathBuf,
    kind: Option<String>,
    only_confirmed: bool,
    format: OutputFormat,
    use_color: bool,
) -> color_eyre::Result<()> {
    let kind = corpus_kind(kind, cfg)?;
    let opts = ApplyOptions {
        only_confirmed: only_confirmed
            || cfg
                .apply
                .as_ref()
                .and_then(|a| a.only_confirmed)
                .unwrap_or(false),
    };
    let never = AtomicBool::new(false);
    let summary = apply_dirs(&records, &root, &out, kind, cfg.source_ext(), &opts, &never)?;

    if format == OutputFormat::Json {
        print_json(&summary)?;
    } else {
        for f in &summary.faults {
            if use_color {
                use owo_colors::OwoColorize;
                eprintln!("{} {} {}", "✖".red(), f.path.blue(), f.error);
            } else {
                eprintln!("✖ {} {}", f.path, f.error);
            }
        }
        crate::ui_ok!(
            "{} file(s) copied, {} rewritten with {} substitution(s), {} record(s) skipped",
            summary.files_copied,
            summary.files_rewritten,
            summary.substitutions,
            summary.skipped_records
        );
    }
    if !summary.faults.is_empty() {
        bail!("{} file(s) left untranslated after consistency faults", summary.faults.len());
    }
    Ok(())
}
