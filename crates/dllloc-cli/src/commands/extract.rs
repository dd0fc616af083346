use crate::ui::print_json;
use crate::OutputFormat;
use dllloc_config::DllLocConfig;
use dllloc_services::extract::{extract, write_spans, ExtractOptions};
use std::path::PathBuf;

pub fn options(cfg: &DllLocConfig, literals_only: bool, exclude_types: Vec<String>) -> ExtractOptions {
    ExtractOptions {
        literals_only: literals_only || cfg.literals_only(),
        exclude_types: if exclude_types.is_empty() {
            cfg.exclude_types()
        } else {
            exclude_types
        },
        source_ext: cfg.source_ext().to_string(),
    }
}

pub fn run_extract(
    cfg: &DllLocConfig,
    root: PathBuf,
    out: Option<PathBuf>,
    literals_only: bool,
    exclude_types: Vec<String>,
    format: OutputFormat,
    use_color: bool,
) -> color_eyre::Result<()> {
    let opts = options(cfg, literals_only, exclude_types);
    tracing::debug!(event = "extract_args", root = %root.display(), literals_only = opts.literals_only, exclude = ?opts.exclude_types);

    let extraction = extract(&root, &opts)?;
    if let Some(out) = out.as_deref() {
        let written = write_spans(out, &extraction.files)?;
        tracing::info!(event = "spans_written", files = written, out = %out.display());
    }

    let summary = extraction.summary();
    if format == OutputFormat::Json {
        return print_json(&summary);
    }
    for f in summary.per_file.iter().filter(|f| f.spans > 0) {
        crate::ui_out!("  {:>5}  {}", f.spans, f.path);
    }
    if use_color {
        use owo_colors::OwoColorize;
        println!(
            "{} {} span(s) from {} file(s), {} skipped",
            "✔".green(),
            summary.spans.to_string().bold(),
            summary.files,
            summary.failed.to_string().yellow()
        );
    } else {
        crate::ui_ok!(
            "{} span(s) from {} file(s), {} skipped",
            summary.spans,
            summary.files,
            summary.failed
        );
    }
    Ok(())
}
