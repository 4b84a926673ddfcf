// Integration testing can be done either by calling library functions directly or by invoking your CLI as a subprocess.
use predicates::prelude::*;
use std::{fs, path::Path};

const SCAFFOLD_FILES: usize = 19;

fn kickstack() -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::cargo_bin("kickstack").unwrap();
    cmd.env("NO_COLOR", "1").env("CLICOLOR", "0");
    cmd
}

fn env_value(path: &Path, key: &str) -> Option<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .filter_map(|line| line.split_once('='))
        .find(|(name, _)| *name == key)
        .map(|(_, value)| value.to_string())
}

fn snapshot(root: &Path) -> Vec<(std::path::PathBuf, Vec<u8>)> {
    walkdir::WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| (entry.path().to_path_buf(), fs::read(entry.path()).unwrap()))
        .collect()
}

#[test]
fn no_arguments_scaffolds_the_current_directory() {
    let dir = tempfile::tempdir().unwrap();

    kickstack()
        .current_dir(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "Files created: {} |",
            SCAFFOLD_FILES
        )))
        .stdout(predicate::str::contains("docker compose up --build"));

    assert!(dir.path().join("docker-compose.yml").is_file());
    assert!(dir.path().join("backend/app").is_dir());
    assert!(dir.path().join("frontend/app").is_dir());
    assert_eq!(
        env_value(&dir.path().join(".env"), "POSTGRES_DB").as_deref(),
        Some("app")
    );
    assert_eq!(
        env_value(&dir.path().join(".env.example"), "POSTGRES_DB").as_deref(),
        Some("app")
    );
}

#[test]
fn second_run_without_force_skips_every_file() {
    let dir = tempfile::tempdir().unwrap();

    kickstack().current_dir(dir.path()).assert().success();
    let before = snapshot(dir.path());

    kickstack()
        .current_dir(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "Files created: 0 | overwritten: 0 | skipped (already existed): {} | failed: 0",
            SCAFFOLD_FILES
        )));

    assert_eq!(snapshot(dir.path()), before);
}

#[test]
fn force_restores_a_hand_edited_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = dir.path().join("docker-compose.yml");

    kickstack().arg("--root").arg(dir.path()).assert().success();
    let generated = fs::read(&manifest).unwrap();

    fs::write(&manifest, "services: {}\n").unwrap();

    kickstack()
        .arg("--root")
        .arg(dir.path())
        .arg("--force")
        .assert()
        .success()
        .stdout(predicate::str::contains("overwrite"));

    assert_eq!(fs::read(&manifest).unwrap(), generated);
}

#[test]
fn relative_root_is_created_when_absent() {
    let dir = tempfile::tempdir().unwrap();

    kickstack()
        .current_dir(dir.path())
        .args(["--root", "projects/hack"])
        .assert()
        .success();

    assert!(dir.path().join("projects/hack/docker-compose.yml").is_file());
    assert!(dir.path().join("projects/hack/frontend/tsconfig.json").is_file());
}

#[test]
fn overrides_flow_into_both_env_files() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("kickstack.toml");
    fs::write(&config, "POSTGRES_DB = \"hack\"\nBACKEND_PORT = 8100\n").unwrap();
    let root = dir.path().join("repo");

    kickstack()
        .arg("--root")
        .arg(&root)
        .arg("--config")
        .arg(&config)
        .args(["--set", "BACKEND_PORT=9000"])
        .assert()
        .success();

    for file in [".env", ".env.example"] {
        let path = root.join(file);
        assert_eq!(env_value(&path, "POSTGRES_DB").as_deref(), Some("hack"));
        assert_eq!(env_value(&path, "BACKEND_PORT").as_deref(), Some("9000"));
        assert_eq!(
            env_value(&path, "NEXT_PUBLIC_API_URL").as_deref(),
            Some("http://localhost:9000")
        );
    }
}

#[test]
fn invalid_override_fails_before_any_write() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("repo");

    kickstack()
        .arg("--root")
        .arg(&root)
        .args(["--set", "REDIS_PORT=6379"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("REDIS_PORT"));

    assert!(!root.exists());
}

#[test]
fn malformed_force_flag_is_a_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("repo");

    kickstack()
        .arg("--root")
        .arg(&root)
        .arg("--force=yes")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--force"));

    assert!(!root.exists());
}

#[test]
fn failed_file_makes_the_run_exit_non_zero() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("README.md")).unwrap();

    kickstack()
        .arg("--root")
        .arg(dir.path())
        .arg("--force")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("fail"))
        .stdout(predicate::str::contains("failed: 1"));

    assert!(dir.path().join("docker-compose.yml").is_file());
}

#[test]
fn dry_run_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("repo");

    kickstack()
        .arg("--root")
        .arg(&root)
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("docker-compose.yml (create)"))
        .stdout(predicate::str::contains("Dry run: nothing was written"));

    assert!(!root.exists());
}
