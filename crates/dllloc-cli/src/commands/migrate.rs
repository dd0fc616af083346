use crate::ui::{corpus_kind, print_json};
use crate::OutputFormat;
use dllloc_config::DllLocConfig;
use dllloc_services::extract::{extract, load_spans};
use dllloc_services::migrate::migrate_dirs;
use std::path::PathBuf;

pub struct MigrateArgs {
    pub root: Option<PathBuf>,
    pub spans: Option<PathBuf>,
    pub old: PathBuf,
    pub out: PathBuf,
    pub kind: Option<String>,
    pub literals_only: bool,
    pub exclude_types: Vec<String>,
}

pub fn run_migrate(
    cfg: &DllLocConfig,
    args: MigrateArgs,
    format: OutputFormat,
    use_color: bool,
) -> color_eyre::Result<()> {
    let kind = corpus_kind(args.kind, cfg)?;
    let extraction = match (args.spans, args.root) {
        (Some(dir), _) => load_spans(&dir)?,
        (None, Some(root)) => {
            let opts = super::extract::options(cfg, args.literals_only, args.exclude_types);
            extract(&root, &opts)?
        }
        (None, None) => color_eyre::eyre::bail!("either --root or --spans is required"),
    };

    let summary = migrate_dirs(&args.old, &args.out, kind, cfg.source_ext(), &extraction.files)?;
    if format == OutputFormat::Json {
        return print_json(&summary);
    }
    if summary.unreadable > 0 {
        crate::ui_warn!("{} old record file(s) could not be read", summary.unreadable);
    }
    for f in summary.per_file.iter().filter(|f| f.fuzzy + f.new + f.obsolete > 0) {
        crate::ui_out!(
            "  {}  migrated {} fuzzy {} new {} obsolete {}",
            f.path,
            f.migrated,
            f.fuzzy,
            f.new,
            f.obsolete
        );
    }
    let line = format!(
        "{} file(s): {} migrated, {} fuzzy, {} new, {} obsolete",
        summary.files, summary.migrated, summary.fuzzy, summary.new, summary.obsolete
    );
    if use_color {
        use owo_colors::OwoColorize;
        println!("{} {}", "✔".green(), line);
    } else {
        crate::ui_ok!("{line}");
    }
    Ok(())
}
