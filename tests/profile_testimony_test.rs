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
fn profile_save_list_delete_round_trip() {
    let tmp = tempdir().expect("tempdir");

    evlock(&tmp)
        .args([
            "profile",
            "save",
            "Alice",
            "--details",
            "tall, red coat, glasses",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("data/profiles/Alice.profile.json"));

    evlock(&tmp)
        .args(["profile", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("profiles=1"))
        .stdout(predicate::str::contains("Alice: tall, red coat, glasses"));

    evlock(&tmp)
        .args(["profile", "delete", "Alice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("deleted data/profiles/Alice.profile.json"));

    evlock(&tmp)
        .args(["profile", "delete", "Alice"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn testimony_save_writes_a_formatted_record() {
    let tmp = tempdir().expect("tempdir");

    evlock(&tmp)
        .args([
            "testimony",
            "save",
            "--text",
            "It began on a Monday in March.",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("data/testimonies/My Testimony.txt"));

    let body = fs::read_to_string(tmp.path().join("data/testimonies/My Testimony.txt"))
        .expect("read testimony");
    assert!(body.contains("Type: User"));
    assert!(body.contains("It began on a Monday in March."));

    evlock(&tmp)
        .args([
            "testimony",
            "save",
            "--witness",
            "Carol",
            "--text",
            "I saw the van leave twice.",
            "--summary",
            "saw the van",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "data/testimonies/Witness Testimony - Carol.txt",
        ));
}
