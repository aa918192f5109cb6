//! Integration tests for the basictools CLI

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Binary isolated from the user's configuration and environment overrides
fn basictools(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("basictools").unwrap();
    cmd.current_dir(dir)
        .env("HOME", dir)
        .env_remove("BASICTOOLS_PARALLEL__WORKERS")
        .env_remove("BASICTOOLS_LOGGING__ROOT_DIR")
        .env_remove("RUST_LOG");
    cmd
}

fn write_run_output(dir: &Path, name: &str, data: &str) {
    fs::create_dir_all(dir).unwrap();
    let content = format!(
        r#"{{"datetime": "01-01-2026 00:00:00", "data": {data}, "logs": {{}}, "path": "", "ENV": {{}}}}"#
    );
    fs::write(dir.join(format!("{name}.out.json")), content).unwrap();
}

#[test]
fn test_cli_help() {
    let temp = TempDir::new().unwrap();
    basictools(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Parallel dispatch"))
        .stdout(predicate::str::contains("collects JSON run records"));

    basictools(temp.path())
        .arg("-h")
        .assert()
        .success()
        .stdout(predicate::str::contains("Parallel dispatch"));
}

#[test]
fn test_cli_version() {
    let temp = TempDir::new().unwrap();
    basictools(temp.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("basictools"));
}

#[test]
fn test_invalid_subcommand() {
    let temp = TempDir::new().unwrap();
    basictools(temp.path())
        .arg("invalid-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_version_get_and_set() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("__init__.py"),
        "__author__ = 'someone'\n__version__ = '0.1.2'\n",
    )
    .unwrap();

    basictools(temp.path())
        .args(["version", "get"])
        .assert()
        .success()
        .stdout("0.1.2\n");

    basictools(temp.path())
        .args(["version", "set", "1.0.0rc1"])
        .assert()
        .success();

    let content = fs::read_to_string(temp.path().join("__init__.py")).unwrap();
    assert_eq!(content, "__author__ = 'someone'\n__version__ = '1.0.0rc1'\n");
}

#[test]
fn test_version_bump_segments_and_dry_run() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("pkg.py");
    fs::write(&file, "VERSION = '1.2.3'\n").unwrap();

    basictools(temp.path())
        .args(["version", "bump", "--file", "pkg.py", "--attr", "VERSION"])
        .args(["--segment", "minor", "--dry-run"])
        .assert()
        .success()
        .stdout("1.3.3\n");
    assert_eq!(fs::read_to_string(&file).unwrap(), "VERSION = '1.2.3'\n");

    basictools(temp.path())
        .args(["version", "bump", "--file", "pkg.py", "--attr", "VERSION"])
        .args(["--segment", "major=2"])
        .assert()
        .success()
        .stdout("3.2.3\n");
    assert_eq!(fs::read_to_string(&file).unwrap(), "VERSION = '3.2.3'\n");
}

#[test]
fn test_version_bump_from_commit_message() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("__init__.py"), "__version__ = '0.4.0'\n").unwrap();

    basictools(temp.path())
        .args(["version", "bump", "--message", "feat: add the collect command"])
        .assert()
        .success()
        .stdout("0.5.0\n");
}

#[test]
fn test_version_infer() {
    let temp = TempDir::new().unwrap();
    basictools(temp.path())
        .args(["version", "infer", "BREAKING: drop the old loader"])
        .assert()
        .success()
        .stdout("major\n");

    basictools(temp.path())
        .args(["version", "infer", "nothing to see"])
        .assert()
        .success()
        .stdout("pre\n");
}

#[test]
fn test_version_get_missing_file_fails() {
    let temp = TempDir::new().unwrap();
    basictools(temp.path())
        .args(["version", "get", "--file", "absent.py"])
        .assert()
        .failure();
}

#[test]
fn test_slurm_generate() {
    let temp = TempDir::new().unwrap();
    basictools(temp.path())
        .args(["slurm", "generate", "--root", "~/exp", "--user", "jdoe"])
        .args(["--script", "job.sh", "-n", "2", "--cancel", "42"])
        .assert()
        .success()
        .stdout(
            "cd ~/exp\ngit pull\nls\nsbatch job.sh\nsbatch job.sh\nscancel 42\nsqueue -u jdoe\n",
        );
}

#[test]
fn test_slurm_hosts() {
    let temp = TempDir::new().unwrap();
    basictools(temp.path())
        .args(["slurm", "hosts"])
        .assert()
        .success()
        .stdout(predicate::str::contains("beluga.computecanada.ca"))
        .stdout(predicate::str::contains("cedar"));
}

#[test]
fn test_collect_rows_with_required_column() {
    let temp = TempDir::new().unwrap();
    let runs = temp.path().join("runs");
    write_run_output(&runs.join("a"), "first", r#"{"accuracy": 0.9, "seed": 1}"#);
    write_run_output(&runs.join("b"), "second", r#"{"seed": 2}"#);
    write_run_output(&runs.join("c"), "third", r#"{"accuracy": null, "seed": 3}"#);

    let output = basictools(temp.path())
        .args(["collect", "runs", "--require", "accuracy", "--workers", "2", "--no-progress"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let rows: Vec<serde_json::Value> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["seed"], 1);
    assert!(rows[0]["_file"].as_str().unwrap().ends_with("first.out.json"));
}

#[test]
fn test_collect_custom_file_column_inline() {
    let temp = TempDir::new().unwrap();
    write_run_output(&temp.path().join("runs"), "only", r#"{"loss": 0.1}"#);

    let output = basictools(temp.path())
        .args(["collect", "runs", "--file-column", "source", "--workers", "inline"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let rows: Vec<serde_json::Value> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].get("_file").is_none());
    assert!(rows[0]["source"].as_str().unwrap().ends_with("only.out.json"));
}

#[test]
fn test_collect_rejects_missing_dir() {
    let temp = TempDir::new().unwrap();
    basictools(temp.path())
        .args(["collect", "nowhere"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a directory"));
}

#[test]
fn test_record_writes_run_output() {
    let temp = TempDir::new().unwrap();
    basictools(temp.path())
        .args(["record", "--dir", "runs", "accuracy=0.9", "model=resnet"])
        .assert()
        .success();

    let saved: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(temp.path().join("runs/run_output.out.json")).unwrap())
            .unwrap();
    assert_eq!(saved["data"]["accuracy"], 0.9);
    assert_eq!(saved["data"]["model"], "resnet");

    // A second call keeps earlier entries and can be collected
    basictools(temp.path())
        .args(["record", "--dir", "runs", "seed=3"])
        .assert()
        .success();
    let output = basictools(temp.path())
        .args(["collect", "runs", "--no-progress"])
        .output()
        .unwrap();
    let rows: Vec<serde_json::Value> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["seed"], 3);
    assert_eq!(rows[0]["model"], "resnet");
}

#[test]
fn test_record_honors_configured_filename_and_batch_save() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("basictools.toml"),
        "[run_output]\nfilename = \"metrics\"\nsave_every_set = false\n",
    )
    .unwrap();

    basictools(temp.path())
        .args(["record", "loss=0.25"])
        .assert()
        .success();
    let saved: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(temp.path().join("metrics.out.json")).unwrap())
            .unwrap();
    assert_eq!(saved["data"]["loss"], 0.25);

    basictools(temp.path())
        .args(["record", "--filename", "other", "loss=0.5"])
        .assert()
        .success();
    assert!(temp.path().join("other.out.json").exists());
}

#[test]
fn test_record_rejects_malformed_entry() {
    let temp = TempDir::new().unwrap();
    basictools(temp.path())
        .args(["record", "no-separator"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("KEY=VALUE"));
}

#[cfg(unix)]
#[test]
fn test_lock_runs_command_and_releases() {
    let temp = TempDir::new().unwrap();
    basictools(temp.path())
        .args(["lock", "--path", "job.lck", "--", "sh", "-c", "test -f job.lck && echo held"])
        .assert()
        .success()
        .stdout("held\n");
    assert!(!temp.path().join("job.lck").exists());
}

#[cfg(unix)]
#[test]
fn test_lock_propagates_exit_code() {
    let temp = TempDir::new().unwrap();
    basictools(temp.path())
        .args(["lock", "--path", "job.lck", "--", "sh", "-c", "exit 3"])
        .assert()
        .code(3);
    assert!(!temp.path().join("job.lck").exists());
}

#[test]
fn test_lock_times_out_when_held() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("busy.lck"), "Process: other\n").unwrap();

    basictools(temp.path())
        .args(["lock", "--path", "busy.lck", "--wait-ms", "10", "--timeout-ms", "50"])
        .args(["--", "true"])
        .assert()
        .failure();
    assert!(temp.path().join("busy.lck").exists());
}

#[test]
fn test_config_get_uses_repo_file_and_env() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("basictools.toml"),
        "[lock]\nprocess_name = \"trainer\"\n",
    )
    .unwrap();

    basictools(temp.path())
        .args(["config", "get", "lock.process_name"])
        .assert()
        .success()
        .stdout("trainer\n");

    basictools(temp.path())
        .env("BASICTOOLS_PARALLEL__UNIT", "runs")
        .args(["config", "get", "parallel.unit"])
        .assert()
        .success()
        .stdout("runs\n");

    basictools(temp.path())
        .args(["config", "get", "missing.key"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_config_show_is_json() {
    let temp = TempDir::new().unwrap();
    let output = basictools(temp.path())
        .args(["config", "show"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let config: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(config["run_output"]["file_column"], "_file");
}
