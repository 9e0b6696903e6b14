use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn sideload() -> Command {
    let mut cmd = Command::cargo_bin("kodegen_bundler_sideload").unwrap();
    cmd.env_remove("KODEGEN_SIDELOAD_SCRATCH");
    cmd
}

#[test]
fn test_help_lists_flags() {
    sideload()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--vtool"))
        .stdout(predicate::str::contains("--scratch-dir"))
        .stdout(predicate::str::contains("SOURCE"))
        .stdout(predicate::str::contains("DESTINATION"));
}

#[test]
fn test_missing_arguments_is_usage_error() {
    sideload()
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("SOURCE"));
}

#[test]
fn test_negative_minimum_os_is_rejected() {
    let temp = TempDir::new().unwrap();
    let app = temp.path().join("Foo.app");
    std::fs::create_dir_all(&app).unwrap();

    sideload()
        .arg("--minimum-os=-1")
        .arg(&app)
        .arg(temp.path().join("out"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid arguments"));

    assert!(!temp.path().join("out").exists());
}

#[test]
fn test_missing_source_reports_bundle_not_found() {
    let temp = TempDir::new().unwrap();
    sideload()
        .arg("--scratch-dir")
        .arg(temp.path().join("scratch"))
        .arg(temp.path().join("Nope.app"))
        .arg(temp.path().join("out"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no .app bundle found"));

    assert!(!temp.path().join("out").exists());
}

#[test]
fn test_corrupt_archive_reports_extraction_failure() {
    let temp = TempDir::new().unwrap();
    let ipa = temp.path().join("Broken.ipa");
    std::fs::write(&ipa, b"not a zip").unwrap();

    sideload()
        .arg("--quiet")
        .arg("--scratch-dir")
        .arg(temp.path().join("scratch"))
        .arg(&ipa)
        .arg(temp.path().join("out"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("failed to extract"));

    let leftover = std::fs::read_dir(temp.path().join("scratch"))
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(leftover, 0);
}
