//! CLI integration tests for the `dqa` binary. Only offline commands are
//! exercised here; pipeline behavior is covered in `pipeline.rs` against the
//! library with stub providers.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn dqa_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("dqa");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    fs::create_dir_all(root.join("uploads")).unwrap();

    let config_content = format!(
        r#"[storage]
uploads_dir = "{root}/uploads"
index_dir = "{root}/index"

[model]
endpoint = "https://api.example.com/v1"
name = "small-latest"

[server]
bind = "127.0.0.1:7431"
"#,
        root = root.display()
    );

    let config_path = root.join("dqa.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_dqa(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = dqa_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run dqa binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_status_before_ingest() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_dqa(&config_path, &["status"]);
    assert!(
        success,
        "status failed: stdout={}, stderr={}",
        stdout, stderr
    );
    assert!(stdout.contains("not built"));
    assert!(stdout.contains("ingest"));
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let bogus = tmp.path().join("missing.toml");

    let (_, stderr, success) = run_dqa(&bogus, &["status"]);
    assert!(!success);
    assert!(stderr.contains("config"));
}

#[test]
fn test_invalid_provider_rejected() {
    let (_tmp, config_path) = setup_test_env();
    let mut content = fs::read_to_string(&config_path).unwrap();
    content.push_str("\n[embedding]\nprovider = \"cohere\"\n");
    fs::write(&config_path, content).unwrap();

    let (_, stderr, success) = run_dqa(&config_path, &["status"]);
    assert!(!success);
    assert!(stderr.contains("provider"));
}

#[test]
fn test_ask_requires_model_api_key() {
    let (_tmp, config_path) = setup_test_env();

    let binary = dqa_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(["ask", "Is claim X covered?", "--general"])
        .env_remove("MODEL_API_KEY")
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("MODEL_API_KEY"));
}
