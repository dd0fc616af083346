use dllloc_config::DllLocConfig;
use std::fs;
use std::path::PathBuf;

pub fn run_schema(cfg: &DllLocConfig, out_dir: Option<PathBuf>) -> color_eyre::Result<()> {
    let out_dir = out_dir.unwrap_or_else(|| {
        PathBuf::from(
            cfg.schema
                .as_ref()
                .and_then(|s| s.out_dir.clone())
                .unwrap_or_else(|| "./docs/assets/schemas".to_string()),
        )
    });
    fs::create_dir_all(&out_dir)?;
    macro_rules! dump {
        ($ty:ty, $name:literal) => {{
            let schema = schemars::schema_for!($ty);
            let path = out_dir.join($name);
            let f = std::fs::File::create(&path)?;
            serde_json::to_writer_pretty(f, &schema)?;
        }};
    }
    dump!(dllloc_domain::ExtractSummary, "extract_summary.schema.json");
    dump!(dllloc_domain::MigrateSummary, "migrate_summary.schema.json");
    dump!(dllloc_domain::ApplySummary, "apply_summary.schema.json");
    dump!(dllloc_domain::ValidationMsg, "validation_msg.schema.json");
    dump!(dllloc_domain::CharsetReport, "charset_report.schema.json");
    crate::ui_ok!("schemas written to {}", out_dir.display());
    Ok(())
}
