use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::Result;
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

mod commands;
mod ui;

#[derive(Parser)]
#[command(
    name = "dllloc-cli",
    version,
    about = "Extract, migrate and re-insert translatable text of decompiled sources"
)]
struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Only log warnings and errors to the console
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Worker threads for per-file work (default: all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract translatable spans from a source tree
    Extract {
        #[arg(short, long)]
        root: PathBuf,
        /// Write intermediate span files here
        #[arg(long)]
        out: Option<PathBuf>,
        /// Only string literals instead of every text-typed expression
        #[arg(long)]
        literals_only: bool,
        /// Emit constructors of this type as one whole-body span (repeatable)
        #[arg(long = "exclude-type")]
        exclude_types: Vec<String>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Reconcile old translation records with a fresh extraction
    #[command(group(ArgGroup::new("input").required(true).args(["root", "spans"])))]
    Migrate {
        /// Source tree to extract from
        #[arg(short, long)]
        root: Option<PathBuf>,
        /// Directory of intermediate span files from `extract --out`
        #[arg(long)]
        spans: Option<PathBuf>,
        /// Old translation directory
        #[arg(long)]
        old: PathBuf,
        #[arg(long)]
        out: PathBuf,
        /// Record subtree: source | asset
        #[arg(long)]
        kind: Option<String>,
        #[arg(long)]
        literals_only: bool,
        #[arg(long = "exclude-type")]
        exclude_types: Vec<String>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Write translations back into a copy of the source tree
    Apply {
        #[arg(long)]
        records: PathBuf,
        #[arg(short, long)]
        root: PathBuf,
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        kind: Option<String>,
        /// Skip records carried over by text match that were not reviewed
        #[arg(long)]
        only_confirmed: bool,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Check a record tree for duplicates, empty originals and placeholder drift
    Validate {
        #[arg(long)]
        records: PathBuf,
        #[arg(long)]
        kind: Option<String>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Collect the characters used by all translations (font atlas input)
    Charset {
        #[arg(long)]
        records: PathBuf,
        /// Extra characters to always include
        #[arg(long)]
        symbols: Option<PathBuf>,
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Unpack a downloaded translation snapshot archive
    Unpack {
        #[arg(long)]
        archive: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },

    /// Dump JSON Schemas of the report types
    Schema {
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Extract { .. } => "extract",
            Commands::Migrate { .. } => "migrate",
            Commands::Apply { .. } => "apply",
            Commands::Validate { .. } => "validate",
            Commands::Charset { .. } => "charset",
            Commands::Unpack { .. } => "unpack",
            Commands::Schema { .. } => "schema",
        }
    }

    fn run(self, cfg: &dllloc_config::DllLocConfig, use_color: bool) -> Result<()> {
        match self {
            Commands::Extract {
                root,
                out,
                literals_only,
                exclude_types,
                format,
            } => commands::extract::run_extract(
                cfg,
                root,
                out,
                literals_only,
                exclude_types,
                format,
                use_color,
            ),
            Commands::Migrate {
                root,
                spans,
                old,
                out,
                kind,
                literals_only,
                exclude_types,
                format,
            } => commands::migrate::run_migrate(
                cfg,
                commands::migrate::MigrateArgs {
                    root,
                    spans,
                    old,
                    out,
                    kind,
                    literals_only,
                    exclude_types,
                },
                format,
                use_color,
            ),
            Commands::Apply {
                records,
                root,
                out,
                kind,
                only_confirmed,
                format,
            } => commands::apply::run_apply(
                cfg,
                records,
                root,
                out,
                kind,
                only_confirmed,
                format,
                use_color,
            ),
            Commands::Validate {
                records,
                kind,
                format,
            } => commands::validate::run_validate(cfg, records, kind, format, use_color),
            Commands::Charset {
                records,
                symbols,
                out,
                format,
            } => commands::charset::run_charset(cfg, records, symbols, out, format),
            Commands::Unpack { archive, out } => commands::unpack::run_unpack(archive, out),
            Commands::Schema { out_dir } => commands::schema::run_schema(cfg, out_dir),
        }
    }
}

fn init_tracing(quiet: bool) -> WorkerGuard {
    let file_appender = rolling::daily("logs", "dllloc.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let default_level = if quiet { "warn" } else { "info" };
    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        );

    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(file_writer)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();
    guard
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    let _guard = init_tracing(cli.quiet);

    let cfg = dllloc_config::load_config()?;
    if let Some(threads) = cli.threads.or(cfg.threads) {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()?;
    }

    let use_color = !cli.no_color
        && std::io::stdout().is_terminal()
        && std::env::var_os("NO_COLOR").is_none();

    let name = cli.cmd.name();
    tracing::debug!(event = "command_start", command = name);
    let result = cli.cmd.run(&cfg, use_color);
    match &result {
        Ok(()) => tracing::debug!(event = "command_done", command = name),
        Err(e) => tracing::error!(event = "command_failed", command = name, error = %e),
    }
    result
}
