use assert_cmd::prelude::*;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

const MENU: &str = r#"class Menu {
    void Draw() {
        Label("Play");
        Label("Quit");
    }
}
"#;

fn bin_cmd(cwd: &Path) -> Command {
    let mut cmd = Command::cargo_bin("dllloc-cli").expect("binary built");
    cmd.current_dir(cwd).env("NO_COLOR", "1").env_remove("RUST_LOG");
    cmd
}

fn workspace() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("src/Game")).unwrap();
    fs::write(dir.path().join("src/Game/Menu.cs"), MENU).unwrap();
    fs::create_dir_all(dir.path().join("old")).unwrap();
    dir
}

fn run_json(cwd: &Path, args: &[&str]) -> Value {
    let assert = bin_cmd(cwd).args(args).assert().success();
    serde_json::from_slice(&assert.get_output().stdout).expect("json on stdout")
}

fn records_path(cwd: &Path) -> std::path::PathBuf {
    cwd.join("rec/source/Game/Menu.json")
}

fn translate(cwd: &Path, original: &str, translation: &str) {
    let path = records_path(cwd);
    let mut records: Vec<Value> = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    for r in records.iter_mut().filter(|r| r["original"] == original) {
        r["translation"] = translation.into();
        r["stage"] = 1.into();
    }
    fs::write(&path, serde_json::to_vec_pretty(&records).unwrap()).unwrap();
}

#[test]
fn help_lists_commands() {
    let dir = tempfile::tempdir().unwrap();
    bin_cmd(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("extract"))
        .stdout(predicate::str::contains("migrate"))
        .stdout(predicate::str::contains("apply"));
}

#[test]
fn extract_reports_spans() {
    let dir = workspace();
    let summary = run_json(
        dir.path(),
        &["extract", "--root", "src", "--literals-only", "--out", "spans", "--format", "json"],
    );
    assert_eq!(summary["spans"], 2);
    assert_eq!(summary["files"], 1);
    assert_eq!(summary["schema_version"], 1);
    let spans: Value =
        serde_json::from_slice(&fs::read(dir.path().join("spans/Game/Menu.cs.json")).unwrap()).unwrap();
    assert_eq!(spans[0]["text"], "Label(\"Play\");");
    assert_eq!(spans[0]["containingMethod"], "Draw");
    assert_eq!(spans[0]["startLine"], 3);
}

#[test]
fn extract_without_sources_fails() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("empty")).unwrap();
    bin_cmd(dir.path())
        .args(["extract", "--root", "empty"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no input"));
}

#[test]
fn full_pipeline_survives_regeneration() {
    let dir = workspace();
    let cwd = dir.path();

    let first = run_json(
        cwd,
        &["migrate", "--root", "src", "--old", "old", "--out", "rec", "--literals-only", "--format", "json"],
    );
    assert_eq!(first["new"], 2);
    assert!(records_path(cwd).is_file());

    translate(cwd, "Label(\"Play\");", "Label(\"Jouer\");");
    let applied = run_json(
        cwd,
        &["apply", "--records", "rec", "--root", "src", "--out", "out", "--format", "json"],
    );
    assert_eq!(applied["substitutions"], 1);
    let out = fs::read_to_string(cwd.join("out/Game/Menu.cs")).unwrap();
    assert_eq!(out, MENU.replace("Label(\"Play\")", "Label(\"Jouer\")"));

    // Regenerated source: everything shifts down by one line.
    fs::write(cwd.join("src/Game/Menu.cs"), format!("using System;\n{MENU}")).unwrap();
    let second = run_json(
        cwd,
        &["migrate", "--root", "src", "--old", "rec", "--out", "rec", "--literals-only", "--format", "json"],
    );
    assert_eq!(second["fuzzy"], 2);
    assert_eq!(second["obsolete"], 0);

    let msgs = run_json(cwd, &["validate", "--records", "rec", "--format", "json"]);
    assert!(msgs
        .as_array()
        .unwrap()
        .iter()
        .any(|m| m["kind"] == "needs-review"));

    let reviewed_only = run_json(
        cwd,
        &["apply", "--records", "rec", "--root", "src", "--out", "out2", "--only-confirmed", "--format", "json"],
    );
    assert_eq!(reviewed_only["substitutions"], 0);
    assert_eq!(reviewed_only["skipped_records"], 1);

    run_json(
        cwd,
        &["apply", "--records", "rec", "--root", "src", "--out", "out3", "--format", "json"],
    );
    let out = fs::read_to_string(cwd.join("out3/Game/Menu.cs")).unwrap();
    assert!(out.starts_with("using System;\n"));
    assert!(out.contains("Label(\"Jouer\");"));
    assert!(out.contains("Label(\"Quit\");"));
}

#[test]
fn apply_fault_exits_non_zero_and_keeps_copy() {
    let dir = workspace();
    let cwd = dir.path();
    fs::create_dir_all(cwd.join("rec/source/Game")).unwrap();
    fs::write(
        records_path(cwd),
        r#"[{"key":"k","original":"x","translation":"y","stage":1,
             "context":"File: Game/Menu.cs:1\nMethod: Draw\nPosition: 9999\nLength: 3"}]"#,
    )
    .unwrap();

    bin_cmd(cwd)
        .args(["apply", "--records", "rec", "--root", "src", "--out", "out"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Game/Menu.cs"));
    assert_eq!(fs::read_to_string(cwd.join("out/Game/Menu.cs")).unwrap(), MENU);
}

#[test]
fn charset_writes_sorted_characters() {
    let dir = workspace();
    let cwd = dir.path();
    fs::create_dir_all(cwd.join("rec/source")).unwrap();
    fs::write(
        cwd.join("rec/source/A.json"),
        r#"[{"key":"k","original":"o","translation":"cab ba","stage":1,"context":""}]"#,
    )
    .unwrap();
    fs::write(cwd.join("symbols.txt"), "?").unwrap();

    bin_cmd(cwd)
        .args(["charset", "--records", "rec", "--symbols", "symbols.txt", "--out", "chars.txt"])
        .assert()
        .success()
        .stdout(predicate::str::contains("4 distinct"));
    assert_eq!(fs::read_to_string(cwd.join("chars.txt")).unwrap(), "?abc");
}

#[test]
fn schema_dumps_report_types() {
    let dir = tempfile::tempdir().unwrap();
    bin_cmd(dir.path())
        .args(["schema", "--out-dir", "schemas"])
        .assert()
        .success();
    for name in [
        "extract_summary.schema.json",
        "migrate_summary.schema.json",
        "apply_summary.schema.json",
        "validation_msg.schema.json",
        "charset_report.schema.json",
    ] {
        assert!(dir.path().join("schemas").join(name).is_file(), "{name}");
    }
}
