// Console output helpers shared by the commands.

#[macro_export]
macro_rules! ui_ok {
    ($($arg:tt)*) => {{
        println!("✔ {}", format!($($arg)*));
    }};
}

#[macro_export]
macro_rules! ui_warn {
    ($($arg:tt)*) => {{
        eprintln!("⚠ {}", format!($($arg)*));
    }};
}

#[macro_export]
macro_rules! ui_out {
    ($($arg:tt)*) => {{
        println!($($arg)*);
    }};
}

/// Print `value` as one JSON document on stdout.
pub fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> color_eyre::Result<()> {
    serde_json::to_writer(std::io::stdout().lock(), value)?;
    println!();
    Ok(())
}

pub fn corpus_kind(
    arg: Option<String>,
    cfg: &dllloc_config::DllLocConfig,
) -> color_eyre::Result<dllloc_services::CorpusKind> {
    arg.or_else(|| cfg.migrate.as_ref().and_then(|m| m.kind.clone()))
        .map(|k| k.parse())
        .transpose()
        .map(Option::unwrap_or_default)
}
