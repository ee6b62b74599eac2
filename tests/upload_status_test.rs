use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

fn evlock(tmp: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("evlock").expect("binary builds");
    cmd.current_dir(tmp.path())
        .env("EVLOCK_DATA_DIR", tmp.path().join("data"))
        .env("EVLOCK_CONFIG_PATH", tmp.path().join("no-config.toml"));
    cmd
}

#[test]
fn upload_stores_under_originals_with_collision_suffix() {
    let tmp = tempdir().expect("tempdir");
    let source = tmp.path().join("a.txt");
    fs::write(&source, b"evidence body").expect("write source");

    evlock(&tmp)
        .arg("upload")
        .arg(&source)
        .assert()
        .success()
        .stdout(predicate::str::contains("data/originals/a.txt"));

    evlock(&tmp)
        .arg("upload")
        .arg(&source)
        .assert()
        .success()
        .stdout(predicate::str::contains("data/originals/a (2).txt"));

    let originals = tmp.path().join("data/originals");
    assert!(originals.join("a.txt").is_file());
    assert!(originals.join("a (2).txt").is_file());
}

#[test]
fn status_lists_records_and_layout() {
    let tmp = tempdir().expect("tempdir");
    let source = tmp.path().join("clip.mp4");
    fs::write(&source, b"\x00fake video").expect("write source");

    evlock(&tmp).arg("upload").arg(&source).assert().success();

    evlock(&tmp)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("records=1 cases=0"))
        .stdout(predicate::str::contains("clip.mp4"))
        .stdout(predicate::str::contains("[new]"));
}

#[test]
fn verify_reports_healthy_layout_and_flags_unknown_env() {
    let tmp = tempdir().expect("tempdir");

    evlock(&tmp)
        .arg("verify")
        .assert()
        .success()
        .stdout(predicate::str::contains("ledger ok: records=0 cases=0"));

    evlock(&tmp)
        .env("EVLOCK_DELTE_SECRET", "typo")
        .arg("verify")
        .assert()
        .failure()
        .stderr(predicate::str::contains("EVLOCK_DELTE_SECRET"));
}
