use std::path::PathBuf;

pub fn run_unpack(archive: PathBuf, out: PathBuf) -> color_eyre::Result<()> {
    let plan = dllloc_services::snapshot::unpack(&archive, &out)?;
    for f in &plan.files {
        crate::ui_out!("  {:>8}  {}", f.size, f.rel_path.display());
    }
    crate::ui_ok!(
        "{} file(s), {} byte(s) unpacked to {}",
        plan.files.len(),
        plan.total_bytes,
        out.display()
    );
    Ok(())
}
