use crate::ui::print_json;
use crate::OutputFormat;
use dllloc_config::DllLocConfig;
use dllloc_services::charset::{collect_chars, report};
use std::path::PathBuf;

pub fn run_charset(
    cfg: &DllLocConfig,
    records: PathBuf,
    symbols: Option<PathBuf>,
    out: Option<PathBuf>,
    format: OutputFormat,
) -> color_eyre::Result<()> {
    let symbols = symbols.or_else(|| {
        cfg.charset
            .as_ref()
            .and_then(|c| c.symbols.as_ref())
            .map(PathBuf::from)
    });
    let chars = collect_chars(&records, symbols.as_deref())?;
    let report = report(&chars);

    if let Some(out) = out {
        dllloc_services::util::write_atomic(&out, report.chars.as_bytes())?;
        tracing::info!(event = "charset_written", path = %out.display(), count = report.count);
    }
    if format == OutputFormat::Json {
        return print_json(&report);
    }
    crate::ui_out!("{}", report.chars);
    crate::ui_ok!("{} distinct character(s)", report.count);
    Ok(())
}
