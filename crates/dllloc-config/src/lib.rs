use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "dllloc.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DllLocConfig {
    /// Extension of source files to scan, without the dot.
    pub source_ext: Option<String>,
    pub threads: Option<usize>,
    pub extract: Option<ExtractCfg>,
    pub migrate: Option<MigrateCfg>,
    pub apply: Option<ApplyCfg>,
    pub charset: Option<CharsetCfg>,
    pub schema: Option<SchemaCfg>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractCfg {
    pub literals_only: Option<bool>,
    /// Types whose constructors are extracted as one whole-body span.
    pub exclude_types: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MigrateCfg {
    /// Corpus kind subtree: "source" or "asset".
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplyCfg {
    pub only_confirmed: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CharsetCfg {
    pub symbols: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchemaCfg {
    pub out_dir: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("{path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl DllLocConfig {
    pub fn source_ext(&self) -> &str {
        self.source_ext.as_deref().unwrap_or("cs")
    }

    pub fn literals_only(&self) -> bool {
        self.extract
            .as_ref()
            .and_then(|e| e.literals_only)
            .unwrap_or(false)
    }

    pub fn exclude_types(&self) -> Vec<String> {
        self.extract
            .as_ref()
            .and_then(|e| e.exclude_types.clone())
            .unwrap_or_default()
    }
}

/// Search order: CWD/dllloc.toml, then `<config dir>/dllloc/dllloc.toml`.
/// Values found earlier win field by field.
pub fn load_config() -> Result<DllLocConfig, ConfigError> {
    let mut candidates = Vec::new();
    if let Ok(p) = std::env::current_dir() {
        candidates.push(p.join(CONFIG_FILE_NAME));
    }
    if let Some(base) = dirs::config_dir() {
        candidates.push(base.join("dllloc").join(CONFIG_FILE_NAME));
    }
    load_config_from(&candidates)
}

/// Merge the given files in priority order. Missing files are ignored; a file
/// that exists but does not parse is an error so typos do not go unnoticed.
pub fn load_config_from(paths: &[PathBuf]) -> Result<DllLocConfig, ConfigError> {
    let mut merged = DllLocConfig::default();
    for path in paths {
        if let Some(cfg) = read_one(path)? {
            tracing::debug!(event = "config_loaded", path = %path.display());
            merged = merge(merged, cfg);
        }
    }
    Ok(merged)
}

fn read_one(path: &Path) -> Result<Option<DllLocConfig>, ConfigError> {
    let Ok(s) = std::fs::read_to_string(path) else {
        return Ok(None);
    };
    toml::from_str::<DllLocConfig>(&s)
        .map(Some)
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

fn merge(mut a: DllLocConfig, b: DllLocConfig) -> DllLocConfig {
    if a.source_ext.is_none() {
        a.source_ext = b.source_ext;
    }
    if a.threads.is_none() {
        a.threads = b.threads;
    }
    a.extract = merge_opt(a.extract, b.extract, merge_extract);
    a.migrate = merge_opt(a.migrate, b.migrate, merge_migrate);
    a.apply = merge_opt(a.apply, b.apply, merge_apply);
    a.charset = merge_opt(a.charset, b.charset, merge_charset);
    a.schema = merge_opt(a.schema, b.schema, merge_schema);
    a
}

fn merge_opt<T: Default>(a: Option<T>, b: Option<T>, f: fn(T, T) -> T) -> Option<T> {
    match (a, b) {
        (Some(a), Some(b)) => Some(f(a, b)),
        (None, Some(b)) => Some(b),
        (Some(a), None) => Some(a),
        (None, None) => None,
    }
}

fn merge_extract(mut a: ExtractCfg, b: ExtractCfg) -> ExtractCfg {
    if a.literals_only.is_none() {
        a.literals_only = b.literals_only;
    }
    if a.exclude_types.is_none() {
        a.exclude_types = b.exclude_types;
    }
    a
}
fn merge_migrate(mut a: MigrateCfg, b: MigrateCfg) -> MigrateCfg {
    if a.kind.is_none() {
        a.kind = b.kind;
    }
    a
}
fn merge_apply(mut a: ApplyCfg, b: ApplyCfg) -> ApplyCfg {
    if a.only_confirmed.is_none() {
        a.only_confirmed = b.only_confirmed;
    }
    a
}
fn merge_charset(mut a: CharsetCfg, b: CharsetCfg) -> CharsetCfg {
    if a.symbols.is_none() {
        a.symbols = b.symbols;
    }
    a
}
fn merge_schema(mut a: SchemaCfg, b: SchemaCfg) -> SchemaCfg {
    if a.out_dir.is_none() {
        a.out_dir = b.out_dir;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn earlier_files_win_per_field() {
        let dir = tempdir().unwrap();
        let local = dir.path().join("local.toml");
        let global = dir.path().join("global.toml");
        fs::write(&local, "[extract]\nliterals_only = true\n").unwrap();
        fs::write(
            &global,
            "source_ext = \"txt\"\n[extract]\nliterals_only = false\nexclude_types = [\"ItemTable\"]\n",
        )
        .unwrap();

        let cfg = load_config_from(&[local, global]).unwrap();
        assert!(cfg.literals_only());
        assert_eq!(cfg.exclude_types(), vec!["ItemTable".to_string()]);
        assert_eq!(cfg.source_ext(), "txt");
    }

    #[test]
    fn missing_files_yield_defaults() {
        let dir = tempdir().unwrap();
        let cfg = load_config_from(&[dir.path().join("nope.toml")]).unwrap();
        assert_eq!(cfg.source_ext(), "cs");
        assert!(!cfg.literals_only());
        assert!(cfg.exclude_types().is_empty());
    }

    #[test]
    fn broken_file_is_reported() {
        let dir = tempdir().unwrap();
        let p = dir.path().join("bad.toml");
        fs::write(&p, "[extract\nliterals_only = 1").unwrap();
        assert!(matches!(
            load_config_from(&[p]),
            Err(ConfigError::Parse { .. })
        ));
    }
}
