//! Unpacking of a fetched translation snapshot archive.

use crate::Result;
use color_eyre::eyre::eyre;
use std::fs;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct SnapshotFile {
    pub rel_path: PathBuf,
    pub size: u64,
}

#[derive(Debug, Clone, Default)]
pub struct SnapshotPlan {
    pub files: Vec<SnapshotFile>,
    pub total_bytes: u64,
}

fn open_archive<R: Read + Seek>(reader: R) -> Result<zip::ZipArchive<R>> {
    zip::ZipArchive::new(reader).map_err(|e| eyre!("invalid snapshot archive: {e}"))
}

/// List the files of an archive. Entries whose name would leave the target
/// directory make the whole archive invalid.
pub fn plan<R: Read + Seek>(reader: R) -> Result<SnapshotPlan> {
    let mut zip = open_archive(reader)?;
    let mut plan = SnapshotPlan::default();
    for i in 0..zip.len() {
        let entry = zip.by_index(i)?;
        if !entry.is_file() {
            continue;
        }
        let rel_path = entry
            .enclosed_name()
            .ok_or_else(|| eyre!("archive entry {:?} escapes the target directory", entry.name()))?;
        plan.total_bytes += entry.size();
        plan.files.push(SnapshotFile {
            rel_path,
            size: entry.size(),
        });
    }
    plan.files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(plan)
}

/// Unpack every file of the archive at `archive` under `out`.
pub fn unpack(archive: &Path, out: &Path) -> Result<SnapshotPlan> {
    let bytes = fs::read(archive)?;
    let plan = plan(std::io::Cursor::new(&bytes))?;
    let mut zip = open_archive(std::io::Cursor::new(&bytes))?;
    fs::create_dir_all(out)?;
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        if !entry.is_file() {
            continue;
        }
        let Some(rel) = entry.enclosed_name() else {
            continue;
        };
        let out_path = out.join(rel);
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut buf = Vec::new();
        entry.read_to_end(&mut buf)?;
        crate::util::write_atomic(&out_path, &buf)?;
    }
    tracing::info!(
        event = "snapshot_unpacked",
        files = plan.files.len(),
        bytes = plan.total_bytes,
        out = %out.display(),
    );
    Ok(plan)
}
