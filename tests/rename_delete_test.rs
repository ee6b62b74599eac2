use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

const SECRET: &str = "it-is-ours-now";

fn evlock(tmp: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("evlock").expect("binary builds");
    cmd.current_dir(tmp.path())
        .env("EVLOCK_DATA_DIR", tmp.path().join("data"))
        .env("EVLOCK_CONFIG_PATH", tmp.path().join("no-config.toml"))
        .env("EVLOCK_DELETE_SECRET", SECRET);
    cmd
}

fn seed_asset_with_report(tmp: &tempfile::TempDir, asset: &str) {
    let source = tmp.path().join(asset);
    fs::write(&source, b"bytes").expect("write source");
    evlock(tmp).arg("upload").arg(&source).assert().success();

    let reports = tmp.path().join("data/reports");
    fs::create_dir_all(&reports).expect("reports dir");
    let body = format!(
        "=====================================\n\
         File Name: {asset}\n\
         File Path: data/originals/{asset}\n\
         -------------------------------------\n\
         Summary:\n\nquiet day\n"
    );
    fs::write(reports.join(format!("Analysis of {asset}.txt")), body).expect("write report");
}

#[test]
fn rename_cascades_across_reports_and_back_references() {
    let tmp = tempdir().expect("tempdir");
    seed_asset_with_report(&tmp, "clip.mp4");

    evlock(&tmp)
        .args(["rename", "clip.mp4", "dockcam", "--secret", SECRET])
        .assert()
        .success()
        .stdout(predicate::str::contains("renamed to dockcam.mp4"))
        .stdout(predicate::str::contains(
            "data/reports/Analysis of clip.mp4.txt -> data/reports/Analysis of dockcam.mp4.txt",
        ));

    let data = tmp.path().join("data");
    assert!(data.join("originals/dockcam.mp4").is_file());
    assert!(!data.join("originals/clip.mp4").exists());
    let report = data.join("reports/Analysis of dockcam.mp4.txt");
    assert!(report.is_file());
    let body = fs::read_to_string(report).expect("read report");
    assert!(body.contains("File Path: data/originals/dockcam.mp4"));
}

#[test]
fn rename_requires_the_configured_secret() {
    let tmp = tempdir().expect("tempdir");
    seed_asset_with_report(&tmp, "clip.mp4");

    evlock(&tmp)
        .args(["rename", "clip.mp4", "dockcam"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unauthorized"));

    evlock(&tmp)
        .args(["rename", "clip.mp4", "dockcam", "--secret", "wrong"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unauthorized"));

    // nothing moved
    assert!(tmp.path().join("data/originals/clip.mp4").is_file());
}

#[test]
fn delete_removes_asset_and_every_derived_report() {
    let tmp = tempdir().expect("tempdir");
    seed_asset_with_report(&tmp, "clip.mp4");

    evlock(&tmp)
        .args(["delete", "clip.mp4", "--secret", SECRET])
        .assert()
        .success()
        .stdout(predicate::str::contains("deleted data/originals/clip.mp4"))
        .stdout(predicate::str::contains(
            "deleted data/reports/Analysis of clip.mp4.txt",
        ));

    assert!(!tmp.path().join("data/originals/clip.mp4").exists());
    assert!(
        !tmp.path()
            .join("data/reports/Analysis of clip.mp4.txt")
            .exists()
    );
}

#[test]
fn second_delete_is_a_not_found_no_op() {
    let tmp = tempdir().expect("tempdir");
    seed_asset_with_report(&tmp, "clip.mp4");

    evlock(&tmp)
        .args(["delete", "clip.mp4", "--secret", SECRET])
        .assert()
        .success();

    evlock(&tmp)
        .args(["delete", "clip.mp4", "--secret", SECRET])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn deleting_a_report_drags_its_asset_along() {
    let tmp = tempdir().expect("tempdir");
    seed_asset_with_report(&tmp, "door.png");

    evlock(&tmp)
        .args([
            "delete",
            "Analysis of door.png.txt",
            "--kind",
            "report",
            "--secret",
            SECRET,
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("deleted data/originals/door.png"));

    assert!(!tmp.path().join("data/originals/door.png").exists());
}

#[test]
fn reveal_fails_closed_outside_the_storage_root() {
    let tmp = tempdir().expect("tempdir");
    fs::create_dir_all(tmp.path().join("data")).expect("data dir");

    // best-effort command: reports the failure without failing
    evlock(&tmp)
        .args(["reveal", "data/../../etc/passwd"])
        .assert()
        .success()
        .stdout(predicate::str::contains("could not reveal"));
}
