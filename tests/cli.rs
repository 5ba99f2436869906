//! CLI tests: run the built `ragline` binary against a temp config with
//! providers disabled, so nothing leaves the machine.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn ragline_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop();
    path.pop();
    path.push("ragline");
    path
}

fn setup_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    fs::create_dir_all(root.join("config")).unwrap();
    fs::create_dir_all(root.join("docs")).unwrap();
    fs::write(root.join("docs").join("a.md"), "Alpha notes about the project.").unwrap();

    let config = format!(
        r#"[store]
path = "{}"

[chunking]
chunk_size = 200
chunk_overlap = 40

[logging]
level = "warn"
"#,
        root.join("data").join("ragline.sqlite").display()
    );
    let config_path = root.join("config").join("ragline.toml");
    fs::write(&config_path, config).unwrap();
    (tmp, config_path)
}

fn run_ragline(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(ragline_binary())
        .arg("--config")
        .arg(config_path)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run ragline: {}", e));
    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

#[test]
fn status_on_fresh_store_is_empty() {
    let (_tmp, config) = setup_env();
    let (stdout, stderr, ok) = run_ragline(&config, &["status"]);
    assert!(ok, "stderr: {}", stderr);
    assert!(stdout.contains("(empty)"), "got: {}", stdout);
}

#[test]
fn clear_on_fresh_store_succeeds() {
    let (_tmp, config) = setup_env();
    let (stdout, stderr, ok) = run_ragline(&config, &["clear"]);
    assert!(ok, "stderr: {}", stderr);
    assert!(stdout.contains("Index cleared successfully"));
}

#[test]
fn query_without_index_reports_uninitialized_store() {
    let (_tmp, config) = setup_env();
    let (_, stderr, ok) = run_ragline(&config, &["query", "what is alpha?", "--citations"]);
    assert!(!ok);
    assert!(stderr.contains("not initialized"), "got: {}", stderr);
}

#[test]
fn index_with_disabled_embeddings_fails_cleanly() {
    let (tmp, config) = setup_env();
    let docs = tmp.path().join("docs");
    let (_, stderr, ok) = run_ragline(
        &config,
        &["index", "--source", docs.to_str().unwrap()],
    );
    assert!(!ok);
    assert!(stderr.contains("Failed to index"), "got: {}", stderr);
    assert!(stderr.contains("embedding"), "got: {}", stderr);
}

#[test]
fn invalid_config_is_rejected() {
    let (tmp, _) = setup_env();
    let bad = tmp.path().join("config").join("bad.toml");
    fs::write(
        &bad,
        "[store]\npath = \"x.sqlite\"\n[chunking]\nchunk_size = 10\nchunk_overlap = 10\n",
    )
    .unwrap();
    let (_, stderr, ok) = run_ragline(&bad, &["status"]);
    assert!(!ok);
    assert!(stderr.contains("chunk_overlap"), "got: {}", stderr);
}

#[test]
fn completions_need_no_config() {
    let output = Command::new(ragline_binary())
        .args(["--config", "/nonexistent/ragline.toml", "completions", "bash"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("ragline"));
}
