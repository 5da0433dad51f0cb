//! CLI integration tests — run the actual cadence binary.
//! Marked `#[ignore]` to skip in normal `cargo test`.

use std::path::{Path, PathBuf};
use std::process::Command;

/// A throwaway project dir whose `.cadence/config.toml` points storage and
/// history at files inside it.
fn sandbox(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("cadence-{name}-{}", uuid::Uuid::now_v7()));
    std::fs::create_dir_all(dir.join(".cadence")).unwrap();
    let config = format!(
        "[storage]\npath = \"{}\"\n\n[history]\npath = \"{}\"\n\n[user]\nuser_id = \"cli-test\"\n",
        dir.join("cadence.db").display(),
        dir.join("history.jsonl").display(),
    );
    std::fs::write(dir.join(".cadence").join("config.toml"), config).unwrap();
    dir
}

fn cadence(dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_cadence"));
    cmd.current_dir(dir);
    cmd
}

#[test]
#[ignore]
fn test_cli_list_json() {
    let dir = sandbox("list");
    let output = cadence(&dir)
        .args(["list", "--json"])
        .output()
        .expect("failed to execute");
    assert!(
        output.status.success(),
        "cadence list failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    let habits: Vec<serde_json::Value> =
        serde_json::from_str(stdout.trim()).expect("invalid JSON output");
    assert!(habits.is_empty());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
#[ignore]
fn test_cli_delete_requires_confirm() {
    let dir = sandbox("delete");
    let output = cadence(&dir)
        .args(["delete", "deadbeef"])
        .output()
        .expect("failed to execute");
    assert!(
        !output.status.success(),
        "delete without --confirm should fail"
    );
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
#[ignore]
fn test_cli_habit_lifecycle() {
    let dir = sandbox("lifecycle");

    let add = cadence(&dir)
        .args(["add", "Read", "-c", "Learning", "--json"])
        .output()
        .expect("failed to execute");
    assert!(
        add.status.success(),
        "add failed: {}",
        String::from_utf8_lossy(&add.stderr)
    );
    let habit: serde_json::Value =
        serde_json::from_str(String::from_utf8_lossy(&add.stdout).trim()).unwrap();
    assert_eq!(habit["category"], "learning");
    let id = habit["id"].as_str().unwrap()[..8].to_string();

    let done = cadence(&dir)
        .args(["done", &id, "--minutes", "20", "--json"])
        .output()
        .expect("failed to execute");
    assert!(
        done.status.success(),
        "done failed: {}",
        String::from_utf8_lossy(&done.stderr)
    );
    let outcome: serde_json::Value =
        serde_json::from_str(String::from_utf8_lossy(&done.stdout).trim()).unwrap();
    assert_eq!(outcome["streak"], 1);
    assert_eq!(outcome["duration"], 1200);

    // Second completion on the same day is rejected.
    let again = cadence(&dir)
        .args(["done", &id])
        .output()
        .expect("failed to execute");
    assert!(!again.status.success());

    let today = cadence(&dir)
        .args(["today", "--json"])
        .output()
        .expect("failed to execute");
    let daily: serde_json::Value =
        serde_json::from_str(String::from_utf8_lossy(&today.stdout).trim()).unwrap();
    assert_eq!(daily["completed"], 1);

    let delete = cadence(&dir)
        .args(["delete", &id, "--confirm"])
        .output()
        .expect("failed to execute");
    assert!(delete.status.success());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
#[ignore]
fn test_cli_unknown_prefix_fails() {
    let dir = sandbox("prefix");
    let output = cadence(&dir)
        .args(["show", "ffffffff"])
        .output()
        .expect("failed to execute");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("no habit found"));
    let _ = std::fs::remove_dir_all(&dir);
}
