use crate::Result;
use serde::Serialize;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Write `bytes` to a sibling temp file, then rename over `path`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Pretty JSON, non-ASCII kept as-is.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut buf = serde_json::to_vec_pretty(value)?;
    buf.push(b'\n');
    write_atomic(path, &buf)
}

/// `Game/Foo.cs` -> `Game/Foo.json`; names without an extension get `.json` appended.
pub fn json_rel(rel: &str) -> String {
    let (dir, name) = rel.rsplit_once('/').map_or(("", rel), |(d, n)| (d, n));
    let stem = match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    };
    if dir.is_empty() {
        format!("{stem}.json")
    } else {
        format!("{dir}/{stem}.json")
    }
}

/// Inverse of [`json_rel`] for sources with extension `ext`.
pub fn source_rel(json_rel: &str, ext: &str) -> String {
    let stem = json_rel.strip_suffix(".json").unwrap_or(json_rel);
    format!("{stem}.{ext}")
}

/// Join a `/`-separated relative key under `base`, refusing keys that could leave it.
pub fn join_rel(base: &Path, rel: &str) -> Option<PathBuf> {
    let rel = Path::new(rel);
    rel.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        .then(|| base.join(rel))
}

/// JSON files under `dir` as (relative key, path), sorted by key. A missing dir yields nothing.
pub fn json_files(dir: &Path) -> Vec<(String, PathBuf)> {
    if !dir.is_dir() {
        return Vec::new();
    }
    let mut out: Vec<(String, PathBuf)> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|x| x == "json"))
        .map(|e| (dllloc_parsers_cs::rel_key(dir, e.path()), e.into_path()))
        .collect();
    out.sort();
    out
}

/// Copy every file under `src` to the same relative location under `dst`.
/// `dst` may live inside `src`; it is not descended into.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<usize> {
    let dst_abs = std::fs::create_dir_all(dst)
        .and_then(|_| dst.canonicalize())
        .unwrap_or_else(|_| dst.to_path_buf());
    let mut copied = 0usize;
    for entry in WalkDir::new(src)
        .into_iter()
        .filter_entry(|e| e.path().canonicalize().map_or(true, |p| p != dst_abs))
    {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry.path().strip_prefix(src)?;
        let target = dst.join(rel);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(entry.path(), &target)?;
        copied += 1;
    }
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_rel_replaces_extension() {
        assert_eq!(json_rel("Game/Ui/Menu.cs"), "Game/Ui/Menu.json");
        assert_eq!(json_rel("Top.cs"), "Top.json");
        assert_eq!(json_rel("v1.2/Readme"), "v1.2/Readme.json");
        assert_eq!(source_rel("Game/Ui/Menu.json", "cs"), "Game/Ui/Menu.cs");
    }

    #[test]
    fn join_rel_refuses_escapes() {
        let base = Path::new("/out");
        assert_eq!(join_rel(base, "a/b.cs"), Some(PathBuf::from("/out/a/b.cs")));
        assert_eq!(join_rel(base, "../x.cs"), None);
        assert_eq!(join_rel(base, "/etc/passwd"), None);
    }

    #[test]
    fn copy_tree_skips_nested_destination() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src/a")).unwrap();
        std::fs::write(dir.path().join("src/a/x.cs"), "x").unwrap();
        std::fs::write(dir.path().join("src/y.cs"), "y").unwrap();
        let dst = dir.path().join("src/out");
        assert_eq!(copy_tree(&dir.path().join("src"), &dst).unwrap(), 2);
        assert_eq!(copy_tree(&dir.path().join("src"), &dst).unwrap(), 2);
        assert_eq!(std::fs::read_to_string(dst.join("a/x.cs")).unwrap(), "x");
    }

    #[test]
    fn write_atomic_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("deep/er/file.txt");
        write_atomic(&p, b"one").unwrap();
        write_atomic(&p, b"two").unwrap();
        assert_eq!(std::fs::read(&p).unwrap(), b"two");
    }
}
