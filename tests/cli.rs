use std::path::PathBuf;
use std::process::Command;

fn assistant_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("assistant");
    path
}

fn run_assistant(args: &[&str]) -> (String, String, bool) {
    let binary = assistant_binary();
    let output = Command::new(&binary)
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run assistant binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_help_lists_commands() {
    let (stdout, stderr, success) = run_assistant(&["--help"]);
    assert!(success, "help failed: {}", stderr);
    assert!(stdout.contains("serve"));
    assert!(stdout.contains("chat"));
    assert!(stdout.contains("add"));
}

#[test]
fn test_add_against_missing_backend() {
    let (stdout, _stderr, success) =
        run_assistant(&["add", "The sky is blue.", "--backend", "http://127.0.0.1:1"]);
    assert!(!success);
    assert!(stdout.contains("Error connecting to backend."));
}

#[test]
fn test_add_blank_text() {
    let (stdout, _stderr, success) =
        run_assistant(&["add", "   ", "--backend", "http://127.0.0.1:1"]);
    assert!(!success);
    assert!(stdout.contains("Please enter some text."));
}

#[test]
fn test_serve_rejects_invalid_config() {
    let tmp = tempfile::tempdir().unwrap();
    let config_path = tmp.path().join("assistant.toml");
    std::fs::write(&config_path, "[retrieval]\ntop_k = 0\n").unwrap();

    let (_stdout, stderr, success) =
        run_assistant(&["--config", config_path.to_str().unwrap(), "serve"]);
    assert!(!success);
    assert!(stderr.contains("top_k"), "stderr: {}", stderr);
}
