use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

fn pwf(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("pwf").unwrap();
    cmd.env("PWF_CONFIG", home.path().join("no-config.json"))
        .env_remove("PWF_HOME")
        .env_remove("RUST_LOG");
    cmd
}

fn archive(home: &TempDir) -> std::path::PathBuf {
    let root = home.path().join("pictures");
    pwf(home)
        .arg("init")
        .arg("--example")
        .arg(&root)
        .assert()
        .success()
        .stdout(predicate::str::ends_with("OK\n"));
    root
}

fn write(path: &Path, data: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, data).unwrap();
}

#[test]
fn help_lists_subcommands() {
    let home = tempdir().unwrap();
    pwf(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("protect"))
        .stdout(predicate::str::contains("import"));
}

#[test]
fn clean_event_prints_ok() {
    let home = tempdir().unwrap();
    let root = archive(&home);
    pwf(&home)
        .arg("check")
        .arg(root.join("0_new/2024-10-30_example_event"))
        .assert()
        .success()
        .stdout("OK\n")
        .stderr(predicate::str::contains("check duplicates..."));
}

#[test]
fn illegal_names_fail_with_exit_code_one() {
    let home = tempdir().unwrap();
    let root = archive(&home);
    let event = root.join("0_new/2024-10-30_example_event");
    write(&event.join("jpg/my photo.jpg"), b"unique");

    pwf(&home)
        .arg("check")
        .arg(&event)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("OK").not())
        .stderr(predicate::str::contains("jpg/my photo.jpg"))
        .stderr(predicate::str::contains(
            "ERROR: Found illegal chars in file or folder names!",
        ));

    pwf(&home)
        .args(["check", "--fix"])
        .arg(&event)
        .assert()
        .success()
        .stdout("OK\n");
    assert!(event.join("jpg/my_photo.jpg").exists());
}

#[test]
fn dry_run_fix_renames_nothing() {
    let home = tempdir().unwrap();
    let root = archive(&home);
    let event = root.join("0_new/2024-10-30_example_event");
    write(&event.join("jpg/a & b.jpg"), b"unique");

    pwf(&home)
        .args(["check", "-f", "-n"])
        .arg(&event)
        .assert()
        .success()
        .stderr(predicate::str::contains("Dry-run: would do the following:"))
        .stderr(predicate::str::contains("-> 'a_und_b.jpg'"));
    assert!(event.join("jpg/a & b.jpg").exists());
}

#[test]
fn duplicates_are_listed() {
    let home = tempdir().unwrap();
    let root = archive(&home);
    let event = root.join("0_new/2024-10-30_example_event");
    fs::copy(event.join("jpg/DSC_1234.jpg"), event.join("jpg/DSC_9999.jpg")).unwrap();

    pwf(&home)
        .arg("check")
        .arg(&event)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Found identical files:"))
        .stderr(predicate::str::contains("DSC_9999.jpg"))
        .stderr(predicate::str::contains("ERROR: Found duplicate files!"));
}

#[test]
fn configuration_errors_exit_with_one() {
    let home = tempdir().unwrap();
    let root = archive(&home);
    let event = root.join("0_new/2024-10-30_example_event");

    pwf(&home)
        .args(["check", "-i", "dup", "-o", "cs"])
        .arg(&event)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("mutually exclusive"));

    pwf(&home)
        .args(["check", "-i", "bogus"])
        .arg(&event)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unknown check 'bogus'"));

    pwf(&home)
        .args(["check", "-i", "path"])
        .arg(&event)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not allowed in 0_new"));
}

#[test]
fn narrowing_staging_checks_warns() {
    let home = tempdir().unwrap();
    let root = archive(&home);
    pwf(&home)
        .args(["check", "-o", "name"])
        .arg(root.join("0_new/2024-10-30_example_event"))
        .assert()
        .success()
        .stderr(predicate::str::contains(
            "Skipping 'dup' checks in 0_new is strongly discouraged!",
        ))
        .stderr(predicate::str::contains("Skipping 'path' checks in 0_new"));
}

#[test]
fn broken_config_file_is_reported() {
    let home = tempdir().unwrap();
    let root = archive(&home);
    let config = home.path().join("config.json");
    fs::write(&config, r#"{"legal_characters": "_/"}"#).unwrap();

    pwf(&home)
        .env("PWF_CONFIG", &config)
        .arg("check")
        .arg(root.join("0_new/2024-10-30_example_event"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid configuration"));
}

#[test]
fn missing_path_is_a_precondition_failure() {
    let home = tempdir().unwrap();
    pwf(&home)
        .arg("check")
        .arg(home.path().join("nowhere"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Path does not exist"));
}

#[test]
fn init_refuses_existing_root() {
    let home = tempdir().unwrap();
    let root = archive(&home);
    pwf(&home)
        .arg("init")
        .arg(&root)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn stats_summarise_media() {
    let home = tempdir().unwrap();
    let root = archive(&home);
    pwf(&home)
        .arg("stats")
        .arg(root.join("0_new"))
        .assert()
        .success()
        .stdout(predicate::str::contains("RAW images:  2 (59.6 KiB)"))
        .stdout(predicate::str::contains("JPG images:  3 (61.5 KiB)"))
        .stdout(predicate::str::contains("Videos:      0 (0 B)"))
        .stdout(predicate::str::ends_with("OK\n"));
}

#[cfg(unix)]
#[test]
fn stage_import_and_verify() {
    let home = tempdir().unwrap();
    let root = archive(&home);

    pwf(&home)
        .arg("stage")
        .arg(root.join("0_new/2023-05-01_hike"))
        .assert()
        .success();
    write(&root.join("0_new/2023-05-01_hike/jpg/DSC_0001.jpg"), b"hike");

    pwf(&home)
        .args(["import", "-n"])
        .arg(root.join("0_new/2023-05-01_hike"))
        .assert()
        .success()
        .stderr(predicate::str::contains("Dry-run, doing nothing..."));
    assert!(root.join("0_new/2023-05-01_hike").is_dir());

    pwf(&home)
        .arg("import")
        .arg(root.join("0_new/2023-05-01_hike"))
        .assert()
        .success()
        .stderr(predicate::str::contains("Move: 0_new/2023-05-01_hike -> 1_original/2023/2023-05-01_hike"))
        .stdout("OK\n");
    assert!(root.join("1_original/2023.md5").is_file());

    pwf(&home)
        .arg("check")
        .arg(root.join("1_original/2023"))
        .assert()
        .success()
        .stdout("OK\n");

    // an unprotected archive fails the protection check
    pwf(&home)
        .args(["protect", "-u"])
        .arg(root.join("1_original/2023"))
        .assert()
        .success();
    pwf(&home)
        .arg("check")
        .arg(root.join("1_original/2023"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Not protected: d"))
        .stderr(predicate::str::contains("Found unprotected files or directories!"));

    pwf(&home)
        .arg("protect")
        .arg(root.join("1_original/2023"))
        .assert()
        .success();
    pwf(&home)
        .args(["check", "-o", "cs"])
        .arg(root.join("1_original/2023/2023-05-01_hike"))
        .assert()
        .success();

    pwf(&home)
        .args(["protect", "-u", "-a"])
        .arg(&root)
        .assert()
        .success();
}

#[test]
fn archive_root_from_environment() {
    let home = tempdir().unwrap();
    let root = archive(&home);
    let event = "0_new/2024-10-30_example_event";

    pwf(&home)
        .env("PWF_HOME", &root)
        .current_dir(home.path())
        .arg("check")
        .arg(event)
        .assert()
        .success()
        .stdout("OK\n");
}
