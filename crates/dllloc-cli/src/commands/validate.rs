use crate::ui::{corpus_kind, print_json};
use crate::OutputFormat;
use dllloc_config::DllLocConfig;
use dllloc_domain::{ValidationMsg, SCHEMA_VERSION};
use std::path::PathBuf;

pub fn run_validate(
    cfg: &DllLocConfig,
    records: PathBuf,
    kind: Option<String>,
    format: OutputFormat,
    use_color: bool,
) -> color_eyre::Result<()> {
    let kind = corpus_kind(kind, cfg)?;
    let msgs = dllloc_services::validate::validate_records(&records, kind, cfg.source_ext())?;

    if format == OutputFormat::Json {
        let items: Vec<ValidationMsg> = msgs
            .iter()
            .map(|m| ValidationMsg {
                schema_version: SCHEMA_VERSION,
                kind: m.kind.clone(),
                key: m.key.clone(),
                path: m.path.clone(),
                message: m.message.clone(),
            })
            .collect();
        return print_json(&items);
    }
    if msgs.is_empty() {
        if use_color {
            use owo_colors::OwoColorize;
            println!("{} no problems found", "✔".green());
        } else {
            crate::ui_ok!("no problems found");
        }
        return Ok(());
    }
    for m in msgs {
        if !use_color {
            println!("[{}] {} ({}) — {}", m.kind, m.key, m.path, m.message);
        } else {
            use owo_colors::OwoColorize;
            let tag = match m.kind.as_str() {
                "duplicate" => "⚠",
                "empty" => "✖",
                "placeholder-mismatch" => "✖",
                "needs-review" => "ℹ",
                _ => "•",
            };
            println!(
                "{} [{}] {} ({}) — {}",
                tag,
                m.kind,
                m.key.green(),
                m.path.blue(),
                m.message
            );
        }
    }
    Ok(())
}
