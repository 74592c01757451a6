#![allow(deprecated)] // cargo_bin! macro doesn't exist yet in assert_cmd 2.1

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

/// Temporary sandbox and config directory for one test.
struct TestEnv {
    temp: TempDir,
}

impl TestEnv {
    fn new() -> Self {
        Self {
            temp: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    fn storage_root(&self) -> PathBuf {
        self.temp.path().join("storage")
    }

    fn config_dir(&self) -> PathBuf {
        self.temp.path().join("config")
    }

    fn oxnav(&self) -> Command {
        let mut cmd = Command::cargo_bin("oxnav").unwrap();
        cmd.env("OXNAV_CONFIG_DIR", self.config_dir())
            .env("OXNAV_STORAGE_ROOT", self.storage_root())
            .env_remove("OXNAV_CONFIG")
            .env_remove("OXNAV_PREFERENCES")
            .env_remove("RUST_LOG");
        cmd
    }
}

// ============================================================================
// Basic CLI tests
// ============================================================================

#[test]
fn test_help() {
    TestEnv::new()
        .oxnav()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("path-addressable file navigation"))
        .stdout(predicate::str::contains("ls"))
        .stdout(predicate::str::contains("cat"))
        .stdout(predicate::str::contains("write"));
}

#[test]
fn test_version() {
    TestEnv::new()
        .oxnav()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("oxnav"));
}

#[test]
fn test_missing_subcommand_is_usage_error() {
    TestEnv::new().oxnav().assert().code(2);
}

// ============================================================================
// Reading and writing
// ============================================================================

#[test]
fn test_write_then_cat() {
    let env = TestEnv::new();

    env.oxnav()
        .args(["write", "notes/today.txt"])
        .write_stdin("remember the milk\n")
        .assert()
        .success();
    assert!(env.storage_root().join("notes").is_dir());

    env.oxnav()
        .args(["cat", "notes/today.txt"])
        .assert()
        .success()
        .stdout("remember the milk\n");
}

#[test]
fn test_cat_creates_missing_file() {
    let env = TestEnv::new();

    env.oxnav()
        .args(["cat", "a/b/new.txt"])
        .assert()
        .success()
        .stdout("");
    assert!(env.storage_root().join("a/b/new.txt").is_file());
}

#[test]
fn test_cat_directory_path_fails() {
    let env = TestEnv::new();

    env.oxnav()
        .args(["cat", "notes/"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Not a file path"));
}

#[test]
fn test_write_to_directory_path_is_usage_error() {
    let env = TestEnv::new();

    env.oxnav()
        .args(["write", "notes/"])
        .write_stdin("x")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("file name"));
}

#[test]
fn test_write_cannot_leave_storage_root() {
    let env = TestEnv::new();

    env.oxnav()
        .args(["write", "../escaped/pwned.txt"])
        .write_stdin("x")
        .assert()
        .code(1);
    assert!(!env.temp.path().join("escaped").exists());
    assert!(!env.storage_root().join("escaped").exists());
}

// ============================================================================
// Listing
// ============================================================================

#[test]
fn test_ls_lists_children() {
    let env = TestEnv::new();
    env.oxnav().args(["mkdir", "docs"]).assert().success();
    env.oxnav()
        .args(["write", "readme.txt"])
        .write_stdin("hi")
        .assert()
        .success();

    env.oxnav()
        .arg("ls")
        .assert()
        .success()
        .stdout(predicate::str::contains("docs/"))
        .stdout(predicate::str::contains("readme.txt"))
        .stdout(predicate::str::contains("..").not());
}

#[test]
fn test_ls_nav_shows_parent_at_root() {
    let env = TestEnv::new();
    env.oxnav().args(["mkdir", "docs"]).assert().success();

    env.oxnav()
        .args(["ls", "--nav"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("..\n"));

    env.oxnav()
        .args(["ls", "--nav", "docs"])
        .assert()
        .success()
        .stdout("");
}

#[test]
fn test_ls_json() {
    let env = TestEnv::new();
    env.oxnav()
        .args(["write", "a.txt"])
        .write_stdin("a")
        .assert()
        .success();

    let output = env
        .oxnav()
        .args(["ls", "--json", "--nav"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let entries = json["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["id"], "__up");
    assert_eq!(entries[0]["is_up_navigation"], true);
    assert_eq!(entries[1]["display_name"], "a.txt");
    assert_eq!(entries[1]["handle"]["kind"], "file");
    assert_eq!(entries[1]["id"].as_str().unwrap().len(), 32);
}

#[test]
fn test_ls_ids_are_stable() {
    let env = TestEnv::new();
    env.oxnav().args(["mkdir", "x"]).assert().success();

    let first = env.oxnav().args(["ls", "--json"]).output().unwrap();
    let second = env.oxnav().args(["ls", "--json"]).output().unwrap();
    assert_eq!(first.stdout, second.stdout);
}

#[test]
fn test_ls_missing_directory_is_not_found() {
    let env = TestEnv::new();

    env.oxnav()
        .args(["ls", "nowhere"])
        .assert()
        .code(7);
    assert!(!env.storage_root().join("nowhere").exists());
}

#[test]
fn test_mkdir_empty_path_is_usage_error() {
    TestEnv::new()
        .oxnav()
        .args(["mkdir", ""])
        .assert()
        .code(2);
}

// ============================================================================
// Root selection and configuration
// ============================================================================

#[test]
fn test_root_remember_applies_to_next_invocation() {
    let env = TestEnv::new();
    env.oxnav().args(["mkdir", "projects"]).assert().success();

    env.oxnav()
        .args(["root", "--remember", "projects"])
        .assert()
        .success()
        .stdout(predicate::str::contains("projects/"));
    assert!(env.config_dir().join("preferences.json").is_file());

    env.oxnav()
        .args(["write", "plan.md"])
        .write_stdin("step one")
        .assert()
        .success();
    assert!(env.storage_root().join("projects/plan.md").is_file());

    let output = env.oxnav().args(["root", "--json"]).output().unwrap();
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["source"], "remembered");
}

#[test]
fn test_vanished_root_falls_back() {
    let env = TestEnv::new();
    env.oxnav().args(["mkdir", "gone"]).assert().success();
    env.oxnav()
        .args(["root", "--remember", "gone"])
        .assert()
        .success();
    std::fs::remove_dir(env.storage_root().join("gone")).unwrap();

    let output = env.oxnav().args(["root", "--json"]).output().unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["source"], "fallback");
    assert_eq!(json["root"], json["default_root"]);

    let prefs = std::fs::read_to_string(env.config_dir().join("preferences.json")).unwrap();
    assert!(!prefs.contains("gone"));
}

#[test]
fn test_config_file_sets_storage_root() {
    let env = TestEnv::new();
    let custom = env.temp.path().join("custom");
    std::fs::create_dir_all(env.config_dir()).unwrap();
    std::fs::write(
        env.config_dir().join("config.toml"),
        format!("storage_root = {:?}\n", custom.display().to_string()),
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("oxnav").unwrap();
    cmd.env("OXNAV_CONFIG_DIR", env.config_dir())
        .env_remove("OXNAV_STORAGE_ROOT")
        .env_remove("OXNAV_CONFIG")
        .env_remove("OXNAV_PREFERENCES")
        .args(["write", "x.txt"])
        .write_stdin("x")
        .assert()
        .success();
    assert!(custom.join("x.txt").is_file());
}

#[test]
fn test_invalid_config_file_fails() {
    let env = TestEnv::new();
    std::fs::create_dir_all(env.config_dir()).unwrap();
    std::fs::write(env.config_dir().join("config.toml"), "batch_size = \"many\"").unwrap();

    env.oxnav()
        .arg("ls")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to parse config file"));
}
